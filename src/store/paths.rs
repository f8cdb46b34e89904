//! Store directory layout (§3 "Store directory", §6 "Filesystem layout"):
//! `{root}/stores/{encoded-id}/lore.db`.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{EngramError, Result};

/// Validate a caller-supplied store id: non-empty, no leading/trailing
/// whitespace, restricted character set, `/` encoded to `__` for the
/// directory name.
pub fn validate_store_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EngramError::InvalidStoreId);
    }
    if id.trim() != id {
        return Err(EngramError::Validation {
            field: "store_id",
            message: "store id must not have leading or trailing whitespace".to_string(),
        });
    }
    Ok(())
}

/// Encode a store id into a filesystem-safe directory name: `/` -> `__`.
pub fn encode_store_id(id: &str) -> String {
    id.replace('/', "__")
}

/// Percent-encode a store id for use in a URL path segment (the Syncer's
/// `pushPath`/`deltaPath`/`snapshotPath`). Panics on an empty store id,
/// per §4.3 "Paths".
pub fn percent_encode_store_id(id: &str) -> String {
    assert!(!id.is_empty(), "store_id must not be empty");
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b'/' => out.push_str("%2F"),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Resolve the on-disk path to `lore.db` for `store_id` under `config`.
/// `RECALL_DB_PATH` takes precedence as a legacy override of the full
/// database file path.
pub fn resolve_db_path(config: &Config, store_id: &str) -> Result<PathBuf> {
    validate_store_id(store_id)?;
    if let Some(path) = &config.db_path_override {
        return Ok(path.clone());
    }
    Ok(stores_dir(&config.root_dir()).join(encode_store_id(store_id)).join("lore.db"))
}

fn stores_dir(root: &Path) -> PathBuf {
    root.join("stores")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_slash_in_store_id() {
        assert_eq!(encode_store_id("team/alpha"), "team__alpha");
    }

    #[test]
    fn rejects_empty_store_id() {
        assert!(matches!(validate_store_id(""), Err(EngramError::InvalidStoreId)));
    }

    #[test]
    fn rejects_whitespace_padded_store_id() {
        assert!(validate_store_id(" default").is_err());
        assert!(validate_store_id("default ").is_err());
    }

    #[test]
    fn percent_encode_escapes_slash() {
        assert_eq!(percent_encode_store_id("team/alpha"), "team%2Falpha");
    }

    #[test]
    #[should_panic]
    fn percent_encode_panics_on_empty() {
        percent_encode_store_id("");
    }
}
