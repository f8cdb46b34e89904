//! `lore_entries` row <-> [`Entry`] conversions shared by record, get,
//! query, feedback, delete, import, and inbound-delta application.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, Transaction};

use crate::embedding;
use crate::entry::{Category, EmbeddingStatus, Entry};
use crate::error::Result;

pub const SELECT_COLUMNS: &str = "id, content, context, category, confidence, embedding, \
     embedding_status, source_id, sources, validation_count, last_validated_at, \
     created_at, updated_at, deleted_at, synced_at";

pub fn row_to_entry(row: &Row) -> rusqlite::Result<Entry> {
    let category_s: String = row.get("category")?;
    let embedding_status_s: String = row.get("embedding_status")?;
    let embedding_bytes: Option<Vec<u8>> = row.get("embedding")?;
    let sources_s: Option<String> = row.get("sources")?;

    Ok(Entry {
        id: row.get("id")?,
        content: row.get("content")?,
        context: row.get("context")?,
        category: Category::parse(&category_s).unwrap_or(Category::PatternOutcome),
        confidence: row.get("confidence")?,
        embedding: embedding_bytes.map(|b| embedding::unpack(&b)),
        embedding_status: EmbeddingStatus::parse(&embedding_status_s),
        source_id: row.get("source_id")?,
        sources: sources_s
            .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok()),
        validation_count: row.get("validation_count")?,
        last_validated_at: row.get("last_validated_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
        synced_at: row.get("synced_at")?,
    })
}

/// Insert a brand-new row. Fails with a unique-constraint violation if
/// `entry.id` already exists (surfaced unwrapped per §4.1).
pub fn insert(tx: &Transaction, entry: &Entry) -> Result<()> {
    let sources_json = entry.sources.as_ref().map(|s| serde_json::to_string(s)).transpose()?;
    let embedding_bytes = entry.embedding.as_ref().map(|v| embedding::pack(v));
    tx.execute(
        &format!(
            "INSERT INTO lore_entries ({SELECT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            entry.id,
            entry.content,
            entry.context,
            entry.category.as_str(),
            entry.confidence,
            embedding_bytes,
            entry.embedding_status.as_str(),
            entry.source_id,
            sources_json,
            entry.validation_count,
            entry.last_validated_at,
            entry.created_at,
            entry.updated_at,
            entry.deleted_at,
            entry.synced_at,
        ],
    )?;
    Ok(())
}

/// Insert-or-replace the full row, used by snapshot/import/inbound-delta
/// application where the entire entry is authoritative.
pub fn upsert_full(tx: &Transaction, entry: &Entry) -> Result<()> {
    let sources_json = entry.sources.as_ref().map(|s| serde_json::to_string(s)).transpose()?;
    let embedding_bytes = entry.embedding.as_ref().map(|v| embedding::pack(v));
    tx.execute(
        &format!(
            "INSERT INTO lore_entries ({SELECT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                context = excluded.context,
                category = excluded.category,
                confidence = excluded.confidence,
                embedding = excluded.embedding,
                embedding_status = excluded.embedding_status,
                source_id = excluded.source_id,
                sources = excluded.sources,
                validation_count = excluded.validation_count,
                last_validated_at = excluded.last_validated_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                synced_at = excluded.synced_at"
        ),
        params![
            entry.id,
            entry.content,
            entry.context,
            entry.category.as_str(),
            entry.confidence,
            embedding_bytes,
            entry.embedding_status.as_str(),
            entry.source_id,
            sources_json,
            entry.validation_count,
            entry.last_validated_at,
            entry.created_at,
            entry.updated_at,
            entry.deleted_at,
            entry.synced_at,
        ],
    )?;
    Ok(())
}

/// Insert-or-update preserving `created_at` from the existing row, used by
/// the `merge` import strategy and (conceptually) anywhere a caller wants
/// upsert-but-keep-creation-time semantics.
pub fn upsert_preserving_created_at(tx: &Transaction, entry: &Entry) -> Result<()> {
    let existing_created_at: Option<DateTime<Utc>> = tx
        .query_row(
            "SELECT created_at FROM lore_entries WHERE id = ?1",
            [&entry.id],
            |r| r.get(0),
        )
        .ok();
    let mut entry = entry.clone();
    if let Some(created_at) = existing_created_at {
        entry.created_at = created_at;
    }
    upsert_full(tx, &entry)
}

pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Entry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM lore_entries WHERE id = ?1 AND deleted_at IS NULL"),
            [id],
            row_to_entry,
        )
        .ok();
    Ok(entry)
}

/// Fetch a row regardless of soft-delete state, used by import/merge
/// strategies that need to know whether an id exists at all.
pub fn get_any(conn: &Connection, id: &str) -> Result<Option<Entry>> {
    let entry = conn
        .query_row(&format!("SELECT {SELECT_COLUMNS} FROM lore_entries WHERE id = ?1"), [id], row_to_entry)
        .ok();
    Ok(entry)
}

pub fn soft_delete(tx: &Transaction, id: &str, now: DateTime<Utc>) -> Result<bool> {
    let changed = tx.execute(
        "UPDATE lore_entries SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        params![id, now],
    )?;
    Ok(changed > 0)
}

/// Apply an inbound delete delta: set `deleted_at` to the local ingestion
/// time (`received_at`), per §4.3 pull semantics.
pub fn apply_inbound_delete(tx: &Transaction, id: &str, received_at: DateTime<Utc>) -> Result<()> {
    tx.execute(
        "UPDATE lore_entries SET deleted_at = ?2 WHERE id = ?1",
        params![id, received_at],
    )?;
    Ok(())
}

/// Apply an inbound upsert delta built from a wire payload. `embedding`
/// and `synced_at` never travel over the wire, so any existing row's
/// values for those two columns are preserved rather than clobbered.
pub fn apply_inbound_upsert(tx: &Transaction, mut entry: Entry) -> Result<()> {
    if let Some(existing) = get_any(tx, &entry.id)? {
        entry.embedding = existing.embedding;
        entry.synced_at = existing.synced_at;
    }
    upsert_full(tx, &entry)
}
