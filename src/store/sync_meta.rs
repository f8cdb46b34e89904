//! Typed accessors over the `sync_meta` key-value table (§3): `source_id`,
//! `last_push_seq`, `last_pull_seq`, `schema_version`, `last_compaction_seq`.
//! `source_id` is read once at open and cached for the store handle's
//! lifetime per §9 "Global state"; the rest are read fresh each time since
//! they change during sync.

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM sync_meta WHERE key = ?1", [key], |r| r.get(0))
        .optional()?)
}

fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Read the process-external, never-regenerated client identifier.
pub fn source_id(conn: &Connection) -> Result<String> {
    Ok(get(conn, "source_id")?.unwrap_or_default())
}

pub fn last_push_seq(conn: &Connection) -> Result<i64> {
    Ok(get(conn, "last_push_seq")?.and_then(|v| v.parse().ok()).unwrap_or(0))
}

pub fn set_last_push_seq(conn: &Connection, seq: i64) -> Result<()> {
    set(conn, "last_push_seq", &seq.to_string())
}

pub fn last_pull_seq(conn: &Connection) -> Result<i64> {
    Ok(get(conn, "last_pull_seq")?.and_then(|v| v.parse().ok()).unwrap_or(0))
}

pub fn set_last_pull_seq(conn: &Connection, seq: i64) -> Result<()> {
    set(conn, "last_pull_seq", &seq.to_string())
}

pub fn last_compaction_seq(conn: &Connection) -> Result<i64> {
    Ok(get(conn, "last_compaction_seq")?.and_then(|v| v.parse().ok()).unwrap_or(0))
}

pub fn set_last_compaction_seq(conn: &Connection, seq: i64) -> Result<()> {
    set(conn, "last_compaction_seq", &seq.to_string())
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(get(conn, "schema_version")?.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Diagnostic record of the most recent sync failure. Spec names no
/// dedicated error-log table, so `fail_sync` persists this alongside the
/// other cursors for operators inspecting `sync_meta` directly.
pub fn set_last_sync_error(conn: &Connection, detail: &str) -> Result<()> {
    set(conn, "last_sync_error", detail)
}

pub fn last_sync_error(conn: &Connection) -> Result<Option<String>> {
    get(conn, "last_sync_error")
}

/// The `push_id` of a batch already sent to the hub but not yet completed
/// locally (§4.3 "Push"). Persisted so a retry after a crash between the
/// hub's 2xx and the local cursor advance reuses the same `push_id`
/// instead of minting a new one for the same batch.
pub fn pending_push_id(conn: &Connection) -> Result<Option<String>> {
    get(conn, "pending_push_id")
}

pub fn set_pending_push_id(conn: &Connection, push_id: &str) -> Result<()> {
    set(conn, "pending_push_id", push_id)
}

pub fn clear_pending_push_id(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM sync_meta WHERE key = 'pending_push_id'", [])?;
    Ok(())
}
