//! Versioned, forward-only schema migrations (§4.1).
//!
//! Migration 1 carries the original `lore_entries`, `metadata`, and
//! `sync_queue` tables. Migration 2 adds `change_log`, `push_idempotency`,
//! `sync_meta`, and seeds `sync_meta` with a fresh `source_id` and zeroed
//! cursors. `sync_queue` is retained for backward-compatibility reads only
//! (§9 Open Question 1); new code writes `change_log` exclusively.

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
    )?;

    let current = current_version(conn)?;
    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i64> {
    let version: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS lore_entries (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    context TEXT,
    category TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.5,
    embedding BLOB,
    embedding_status TEXT NOT NULL DEFAULT 'pending',
    source_id TEXT NOT NULL,
    sources TEXT,
    validation_count INTEGER NOT NULL DEFAULT 0,
    last_validated_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    synced_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_lore_entries_deleted_at ON lore_entries(deleted_at);
CREATE INDEX IF NOT EXISTS idx_lore_entries_category ON lore_entries(category);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Legacy pre-change-log sync bookkeeping. Read-only for new code (§9 Open
-- Question 1): queued rows are never synthesized here, only drained by
-- code predating the change_log table.
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    operation TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#,
    )?;
    tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (1, datetime('now'))",
        [],
    )?;
    tx.commit()?;
    Ok(())
}

fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS change_log (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    operation TEXT NOT NULL CHECK(operation IN ('upsert','delete')),
    payload TEXT,
    source_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_log_entity ON change_log(table_name, entity_id);
CREATE INDEX IF NOT EXISTS idx_change_log_source_seq ON change_log(source_id, sequence);

CREATE TABLE IF NOT EXISTS push_idempotency (
    push_id TEXT PRIMARY KEY,
    response TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_push_idempotency_expires ON push_idempotency(expires_at);

CREATE TABLE IF NOT EXISTS sync_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#,
    )?;

    let source_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO sync_meta (key, value) VALUES ('source_id', ?1)
         ON CONFLICT(key) DO NOTHING",
        [&source_id],
    )?;
    for (key, value) in [
        ("schema_version", CURRENT_SCHEMA_VERSION.to_string()),
        ("last_push_seq", "0".to_string()),
        ("last_pull_seq", "0".to_string()),
        ("last_compaction_seq", "0".to_string()),
    ] {
        tx.execute(
            "INSERT INTO sync_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
            rusqlite::params![key, value],
        )?;
    }

    tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (2, datetime('now'))",
        [],
    )?;
    tx.commit()?;
    Ok(())
}
