//! The append-only `change_log` table (§3, §4.2): one row per successful
//! local mutation, read by the Syncer (push) and by the audit surface.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryWire};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upsert,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Operation {
        match s {
            "delete" => Operation::Delete,
            _ => Operation::Upsert,
        }
    }
}

/// One row of `change_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub sequence: i64,
    pub table_name: String,
    pub entity_id: String,
    pub operation: Operation,
    /// Canonical JSON post-image for `upsert`; `None` for `delete`.
    pub payload: Option<serde_json::Value>,
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

fn row_to_entry(row: &Row) -> rusqlite::Result<ChangeLogEntry> {
    let payload_text: Option<String> = row.get("payload")?;
    let operation: String = row.get("operation")?;
    Ok(ChangeLogEntry {
        sequence: row.get("sequence")?,
        table_name: row.get("table_name")?,
        entity_id: row.get("entity_id")?,
        operation: Operation::parse(&operation),
        payload: payload_text
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        source_id: row.get("source_id")?,
        created_at: row.get("created_at")?,
        received_at: row.get("received_at")?,
    })
}

/// Append one `upsert` row recording `entry`'s full post-image. Always
/// called inside the same transaction as the data mutation it records.
///
/// `source_id` is this *store's* identity from `sync_meta` — the
/// originating client of the local write — not necessarily
/// `entry.source_id`, which names whichever client first created the
/// lore entry and may differ once entries move between stores.
pub fn append_upsert(tx: &Transaction, entry: &Entry, source_id: &str, created_at: DateTime<Utc>) -> Result<i64> {
    let payload = serde_json::to_string(&EntryWire::from(entry))?;
    tx.execute(
        "INSERT INTO change_log (table_name, entity_id, operation, payload, source_id, created_at, received_at)
         VALUES ('lore_entries', ?1, 'upsert', ?2, ?3, ?4, ?4)",
        params![entry.id, payload, source_id, created_at],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Append one `delete` row with a null payload.
pub fn append_delete(
    tx: &Transaction,
    entity_id: &str,
    source_id: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO change_log (table_name, entity_id, operation, payload, source_id, created_at, received_at)
         VALUES ('lore_entries', ?1, 'delete', NULL, ?2, ?3, ?3)",
        params![entity_id, source_id, created_at],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Read entries strictly greater than `after_seq`, authored by
/// `source_id`, ordered by sequence ascending, capped at `limit`. Used by
/// [`crate::sync::Syncer::push`] to select the next outbound batch.
pub fn read_since(conn: &Connection, source_id: &str, after_seq: i64, limit: i64) -> Result<Vec<ChangeLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, table_name, entity_id, operation, payload, source_id, created_at, received_at
         FROM change_log
         WHERE source_id = ?1 AND sequence > ?2
         ORDER BY sequence ASC
         LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(params![source_id, after_seq, limit], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Read entries for `table_name`/`entity_id`, newest first — the audit
/// lookup path named in §4.2 ("Indexes: (table_name, entity_id) for audit
/// lookups").
pub fn read_for_entity(conn: &Connection, table_name: &str, entity_id: &str) -> Result<Vec<ChangeLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, table_name, entity_id, operation, payload, source_id, created_at, received_at
         FROM change_log
         WHERE table_name = ?1 AND entity_id = ?2
         ORDER BY sequence DESC",
    )?;
    let rows = stmt
        .query_map(params![table_name, entity_id], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The highest sequence currently present in `change_log`, or `0` if
/// empty. Used to assert `last_push_seq` never exceeds it (§8).
pub fn max_sequence(conn: &Connection) -> Result<i64> {
    let max: Option<i64> = conn.query_row("SELECT MAX(sequence) FROM change_log", [], |r| r.get(0))?;
    Ok(max.unwrap_or(0))
}

/// Total row count, used by `stats`/testing to assert change-log rows
/// equal the number of successful mutations.
pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM change_log", [], |r| r.get(0))?)
}
