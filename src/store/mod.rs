//! The durable lore store: a single SQLite file, guarded by a read-write
//! lock, exposing every persistent operation named in §4.1.

pub mod paths;
mod rows;
mod schema;
mod sync_meta;

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::change_log::{self, ChangeLogEntry, Operation};
use crate::confidence::{self, FeedbackSignal};
use crate::config::Config;
use crate::entry::{Category, EmbeddingStatus, Entry, NewEntry};
use crate::error::{EngramError, Result};
use crate::id;
use crate::import::{self, ImportAction, ImportStats, MergeStrategy};

/// How long a cached push response stays valid locally, mirroring the
/// hub's own idempotency window (§4.3 "Idempotency").
const PUSH_IDEMPOTENCY_TTL_HOURS: i64 = 24;

/// JSON shape persisted in `push_idempotency.response`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedPushResponse {
    accepted: i64,
    remote_sequence: i64,
}

/// Candidate row count fetched between cancellation checks during
/// [`Store::query`] (§5 "query (pre-scan and between candidate chunks...)").
const QUERY_CANCEL_CHUNK: u32 = 256;

/// A single store handle. Cheap to share behind an `Arc`: all mutable
/// state lives behind the internal lock, not in `&mut self` methods.
pub struct Store {
    conn: RwLock<Option<Connection>>,
    db_path: PathBuf,
    source_id: RwLock<String>,
}

/// Filters accepted by [`Store::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Maximum candidates to return when no ranking is requested. Ignored
    /// (candidates are returned unlimited) when `require_embedding` is
    /// set, since a [`crate::ranker::Ranker`] performs the final
    /// top-k cut over embeddings the store does not score itself.
    pub top_k: usize,
    pub min_confidence: Option<f64>,
    pub categories: Option<Vec<Category>>,
    /// `true` when the caller intends to rank candidates against a query
    /// vector; restricts results to rows carrying a non-null embedding.
    pub require_embedding: bool,
}

/// Aggregate counters surfaced by [`Store::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entry_count: i64,
    pub change_log_count: i64,
    pub last_push_seq: i64,
    pub last_pull_seq: i64,
}

impl Store {
    /// Open (creating if absent) the database at `db_path`, running
    /// migrations, and caching `source_id` for this handle's lifetime
    /// (§9 "Global state").
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let mut conn = open_connection(&db_path)?;
        schema::run_migrations(&mut conn)?;
        let source_id = sync_meta::source_id(&conn)?;
        Ok(Store {
            conn: RwLock::new(Some(conn)),
            db_path,
            source_id: RwLock::new(source_id),
        })
    }

    /// Open the store named by `config.store_id` at its resolved path
    /// under `config`'s root directory (§3 "Store directory", §6
    /// "Filesystem layout").
    pub fn open_for_config(config: &Config) -> Result<Self> {
        let db_path = paths::resolve_db_path(config, &config.store_id)?;
        Self::open(db_path)
    }

    /// This store's stable identity, as recorded in `sync_meta`.
    pub fn source_id(&self) -> String {
        self.source_id.read().unwrap().clone()
    }

    pub fn last_push_seq(&self) -> Result<i64> {
        self.with_read(|conn| sync_meta::last_push_seq(conn))
    }

    pub fn last_pull_seq(&self) -> Result<i64> {
        self.with_read(|conn| sync_meta::last_pull_seq(conn))
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.with_read(|conn| sync_meta::schema_version(conn))
    }

    /// Validate and persist a new entry inside one transaction alongside
    /// its change-log row (§4.1 "Record operation").
    pub fn record(&self, new: NewEntry) -> Result<Entry> {
        crate::entry::validate(&new.content, new.context.as_deref(), new.category, new.confidence)?;
        let category = new.category.expect("validated: category is required");
        let now = Utc::now();
        let id = new.id.filter(|s| !s.is_empty()).unwrap_or_else(id::new_id);
        let confidence = new.confidence.unwrap_or(0.5);
        let embedding_status = if new.embedding.is_some() {
            EmbeddingStatus::Complete
        } else {
            EmbeddingStatus::Pending
        };

        let entry = Entry {
            id,
            content: new.content,
            context: new.context,
            category,
            confidence,
            embedding: new.embedding,
            embedding_status,
            source_id: new.source_id,
            sources: new.sources,
            validation_count: 0,
            last_validated_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            synced_at: None,
        };

        let source_id = self.source_id();
        self.with_write(|tx| {
            rows::insert(tx, &entry)?;
            change_log::append_upsert(tx, &entry, &source_id, now)?;
            Ok(())
        })?;
        Ok(entry)
    }

    /// Resolve by id, filtering soft-deleted rows (§4.1 "Get").
    pub fn get(&self, id: &str) -> Result<Entry> {
        self.with_read(|conn| rows::get_by_id(conn, id))?.ok_or(EngramError::NotFound)
    }

    /// Return filtered candidates for ranking or direct display (§4.1
    /// "Query"). See [`QueryParams::require_embedding`] for how `top_k`
    /// is resolved. `cancel`, if supplied, is checked once before the scan
    /// starts and again between each chunk of candidate rows (§5).
    pub fn query(&self, params: &QueryParams, cancel: Option<&CancellationToken>) -> Result<Vec<Entry>> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Ok(Vec::new());
        }
        if let Some(categories) = &params.categories {
            if categories.is_empty() {
                return Ok(Vec::new());
            }
        }

        self.with_read(|conn| {
            let mut sql = format!(
                "SELECT {} FROM lore_entries WHERE deleted_at IS NULL",
                rows::SELECT_COLUMNS
            );
            let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if params.require_embedding {
                sql.push_str(" AND embedding IS NOT NULL");
            }
            if let Some(min_confidence) = params.min_confidence {
                sql.push_str(" AND confidence >= ?");
                bind.push(Box::new(min_confidence));
            }
            if let Some(categories) = &params.categories {
                let placeholders = categories.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                sql.push_str(&format!(" AND category IN ({placeholders})"));
                for c in categories {
                    bind.push(Box::new(c.as_str()));
                }
            }
            if !params.require_embedding {
                sql.push_str(" LIMIT ?");
                bind.push(Box::new(params.top_k as i64));
            }

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
            let mut rows_iter = stmt.query(param_refs.as_slice())?;
            let mut entries = Vec::new();
            let mut scanned: u32 = 0;
            while let Some(row) = rows_iter.next()? {
                entries.push(rows::row_to_entry(row)?);
                scanned += 1;
                if scanned % QUERY_CANCEL_CHUNK == 0 && cancel.is_some_and(CancellationToken::is_cancelled) {
                    break;
                }
            }
            Ok(entries)
        })
    }

    /// Apply a feedback signal to an entry's confidence (§4.7). `not_relevant`
    /// still appends exactly one change-log row (§9 Open Question 3) but
    /// leaves `updated_at` untouched.
    pub fn apply_feedback(&self, id: &str, signal: FeedbackSignal) -> Result<Entry> {
        let now = Utc::now();
        let source_id = self.source_id();
        self.with_write(|tx| {
            let mut entry = rows::get_by_id(tx, id)?.ok_or(EngramError::NotFound)?;
            let transition = confidence::apply(entry.confidence, signal);
            entry.confidence = transition.new_confidence;
            if transition.validation_count_incremented {
                entry.validation_count += 1;
                entry.last_validated_at = Some(now);
            }
            if !matches!(signal, FeedbackSignal::NotRelevant) {
                entry.updated_at = now;
            }
            rows::upsert_full(tx, &entry)?;
            change_log::append_upsert(tx, &entry, &source_id, now)?;
            Ok(entry)
        })
    }

    /// Soft-delete an entry (§4.1 "Delete").
    pub fn delete(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        let source_id = self.source_id();
        self.with_write(|tx| {
            if !rows::soft_delete(tx, id, now)? {
                return Err(EngramError::NotFound);
            }
            change_log::append_delete(tx, id, &source_id, now)?;
            Ok(())
        })
    }

    /// Apply one inbound delta batch from [`crate::sync::Syncer::pull`]
    /// (§4.3). Never appends to the local change log, and advances
    /// `last_pull_seq` to `last_sequence` in the same transaction.
    pub fn apply_inbound_batch(&self, entries: &[ChangeLogEntry], last_sequence: i64) -> Result<()> {
        let received_at = Utc::now();
        self.with_write(|tx| {
            for delta in entries {
                match delta.operation {
                    Operation::Upsert => {
                        let payload = delta.payload.clone().ok_or_else(|| EngramError::Validation {
                            field: "payload",
                            message: "upsert delta is missing its payload".to_string(),
                        })?;
                        let wire: crate::entry::EntryWire = serde_json::from_value(payload)?;
                        rows::apply_inbound_upsert(tx, wire.into_entry())?;
                    }
                    Operation::Delete => {
                        rows::apply_inbound_delete(tx, &delta.entity_id, received_at)?;
                    }
                }
            }
            sync_meta::set_last_pull_seq(tx, last_sequence)?;
            Ok(())
        })
    }

    /// The next outbound batch for this store's own `source_id`, used by
    /// [`crate::sync::Syncer::push`].
    pub fn pending_sync(&self, limit: i64) -> Result<Vec<ChangeLogEntry>> {
        let source_id = self.source_id();
        self.with_read(|conn| {
            let after = sync_meta::last_push_seq(conn)?;
            change_log::read_since(conn, &source_id, after, limit)
        })
    }

    /// The `push_id` to use for the next request against the current
    /// pending batch (§4.3 "Push"). Reuses whatever `push_id` is already
    /// recorded as pending so a retry after a crash between the hub's 2xx
    /// and [`Store::complete_push`] resends the same id instead of minting
    /// a fresh one the hub has never seen.
    pub fn push_id_for_pending_batch(&self) -> Result<Uuid> {
        self.with_write(|tx| {
            if let Some(existing) = sync_meta::pending_push_id(tx)? {
                if let Ok(id) = existing.parse() {
                    return Ok(id);
                }
            }
            let id = Uuid::new_v4();
            sync_meta::set_pending_push_id(tx, &id.to_string())?;
            Ok(id)
        })
    }

    /// Look up a cached response for `push_id`, if one was recorded and
    /// hasn't expired (§4.3 "Idempotency").
    pub fn cached_push_response(&self, push_id: Uuid) -> Result<Option<(i64, i64)>> {
        self.with_read(|conn| {
            let row: Option<(String, DateTime<Utc>)> = conn
                .query_row(
                    "SELECT response, expires_at FROM push_idempotency WHERE push_id = ?1",
                    params![push_id.to_string()],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((response, expires_at)) = row else {
                return Ok(None);
            };
            if expires_at <= Utc::now() {
                return Ok(None);
            }
            let cached: CachedPushResponse = serde_json::from_str(&response)?;
            Ok(Some((cached.accepted, cached.remote_sequence)))
        })
    }

    /// Persist the hub's 2xx response under `push_id` with a TTL, mirroring
    /// the hub's own idempotency cache locally (§4.3 "Idempotency").
    pub fn cache_push_response(&self, push_id: Uuid, accepted: i64, remote_sequence: i64) -> Result<()> {
        let body = serde_json::to_string(&CachedPushResponse { accepted, remote_sequence })?;
        let expires_at = Utc::now() + chrono::Duration::hours(PUSH_IDEMPOTENCY_TTL_HOURS);
        self.with_write(|tx| {
            tx.execute(
                "INSERT INTO push_idempotency (push_id, response, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(push_id) DO UPDATE SET response = excluded.response, expires_at = excluded.expires_at",
                params![push_id.to_string(), body, expires_at],
            )?;
            Ok(())
        })
    }

    /// Advance `last_push_seq`, mark `synced_ids` with `synced_at`, clear
    /// any legacy `sync_queue` rows for them, and clear the pending
    /// `push_id` marker, all in one transaction (§4.3 "Push").
    pub fn complete_push(&self, highest_sequence: i64, synced_ids: &[String]) -> Result<()> {
        let now = Utc::now();
        self.with_write(|tx| {
            sync_meta::set_last_push_seq(tx, highest_sequence)?;
            for entry_id in synced_ids {
                tx.execute(
                    "UPDATE lore_entries SET synced_at = ?2 WHERE id = ?1",
                    params![entry_id, now],
                )?;
                tx.execute("DELETE FROM sync_queue WHERE entity_id = ?1", params![entry_id])?;
            }
            sync_meta::clear_pending_push_id(tx)?;
            Ok(())
        })
    }

    /// Drop the pending `push_id` marker on a fatal (schema mismatch or
    /// validation) outcome, so the next attempt mints a fresh id rather
    /// than reusing one the hub has already rejected.
    pub fn clear_pending_push(&self) -> Result<()> {
        self.with_write(|tx| sync_meta::clear_pending_push_id(tx))
    }

    /// Record a sync failure for diagnostics without advancing any cursor.
    pub fn fail_sync(&self, detail: &str) -> Result<()> {
        self.with_write(|tx| sync_meta::set_last_sync_error(tx, detail))
    }

    pub fn last_sync_error(&self) -> Result<Option<String>> {
        self.with_read(sync_meta::last_sync_error)
    }

    /// Streaming, cancellable import of an export file under one merge
    /// strategy (§4.4). `dry_run` produces counters without mutating.
    pub fn import(
        &self,
        bytes: &[u8],
        strategy: MergeStrategy,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<ImportStats> {
        let (_header, lore_bytes) = import::parse_header(bytes)?;
        let source_id = self.source_id();
        let now = Utc::now();
        let mut stats = ImportStats::default();

        for streamed in import::stream_entries(lore_bytes.as_slice(), cancel) {
            stats.total += 1;
            let wire = match streamed.result {
                Ok(w) => w,
                Err(message) => {
                    stats.errors.push(crate::import::ImportEntryError {
                        index: streamed.index,
                        message,
                    });
                    continue;
                }
            };

            let action = self.with_write(|tx| {
                let exists = rows::get_any(tx, &wire.id)?.is_some();
                let action = import::decide_action(strategy, exists);
                if dry_run || action == ImportAction::Skip {
                    return Ok(action);
                }

                let mut entry = wire.clone().into_entry();
                match (action, strategy) {
                    (ImportAction::Create, _) => rows::insert(tx, &entry)?,
                    (ImportAction::Merge, MergeStrategy::Replace) => {
                        entry.deleted_at = None;
                        rows::upsert_full(tx, &entry)?;
                    }
                    (ImportAction::Merge, _) => rows::upsert_preserving_created_at(tx, &entry)?,
                    (ImportAction::Skip, _) => unreachable!("handled above"),
                }
                change_log::append_upsert(tx, &entry, &source_id, now)?;
                Ok(action)
            })?;

            match action {
                ImportAction::Create => stats.created += 1,
                ImportAction::Merge => stats.merged += 1,
                ImportAction::Skip => stats.skipped += 1,
            }
        }

        Ok(stats)
    }

    /// Atomically replace the entire live entry set from a foreign
    /// database image (§4.3 "Bootstrap snapshot"). Writes `image_bytes`
    /// to a temp file, opens it read-only, and copies every row inside a
    /// transaction that first truncates `lore_entries`/`sync_queue`.
    pub fn replace_from_snapshot(&self, image_bytes: &[u8], latest_sequence: Option<i64>) -> Result<()> {
        let tmp = tempfile::NamedTempFile::new()?;
        std::fs::write(tmp.path(), image_bytes)?;
        let source_conn =
            Connection::open_with_flags(tmp.path(), rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let entries: Vec<Entry> = {
            let mut stmt =
                source_conn.prepare(&format!("SELECT {} FROM lore_entries", rows::SELECT_COLUMNS))?;
            stmt.query_map([], rows::row_to_entry)?.collect::<rusqlite::Result<Vec<_>>>()?
        };
        // The hub's image carries its own notion of the latest sequence for
        // this store in `sync_meta`; fall back to reading it when the
        // caller didn't supply one explicitly.
        let latest_sequence = latest_sequence.or_else(|| sync_meta::last_push_seq(&source_conn).ok());
        drop(source_conn);

        self.with_write(|tx| {
            tx.execute_batch("DELETE FROM lore_entries; DELETE FROM sync_queue;")?;
            for entry in &entries {
                rows::upsert_full(tx, entry)?;
            }
            if let Some(seq) = latest_sequence {
                sync_meta::set_last_pull_seq(tx, seq)?;
            }
            Ok(())
        })
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.with_read(|conn| {
            Ok(conn
                .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
                .optional()?)
        })
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.with_write(|tx| {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.with_read(|conn| {
            let entry_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM lore_entries WHERE deleted_at IS NULL", [], |r| r.get(0))?;
            Ok(StoreStats {
                entry_count,
                change_log_count: change_log::count(conn)?,
                last_push_seq: sync_meta::last_push_seq(conn)?,
                last_pull_seq: sync_meta::last_pull_seq(conn)?,
            })
        })
    }

    /// Close the underlying connection. Every operation after this fails
    /// with [`EngramError::StoreClosed`] (§4.1).
    pub fn close(&self) {
        *self.conn.write().unwrap() = None;
    }

    /// Destructive reinitialize (§4.3 "Reinitialize" force path): drop the
    /// on-disk file and its WAL/SHM siblings, then recreate an empty,
    /// freshly-migrated database with a newly generated `source_id`.
    pub fn reopen_fresh(&self) -> Result<()> {
        *self.conn.write().unwrap() = None;

        if self.db_path != Path::new(":memory:") {
            let _ = std::fs::remove_file(&self.db_path);
            let _ = std::fs::remove_file(with_suffix(&self.db_path, "-wal"));
            let _ = std::fs::remove_file(with_suffix(&self.db_path, "-shm"));
        }

        let mut conn = open_connection(&self.db_path)?;
        schema::run_migrations(&mut conn)?;
        let source_id = sync_meta::source_id(&conn)?;
        *self.conn.write().unwrap() = Some(conn);
        *self.source_id.write().unwrap() = source_id;
        Ok(())
    }

    fn with_read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.read().unwrap();
        let conn = guard.as_ref().ok_or(EngramError::StoreClosed)?;
        f(conn)
    }

    fn with_write<T>(&self, f: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.write().unwrap();
        let conn = guard.as_mut().ok_or(EngramError::StoreClosed)?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(db_path)?)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Category, NewEntry};

    fn open_temp() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("lore.db")).unwrap();
        (store, dir)
    }

    fn sample_entry() -> NewEntry {
        NewEntry {
            content: "ORM N+1 without eager loading".to_string(),
            category: Some(Category::DependencyBehavior),
            confidence: Some(0.7),
            source_id: "test-client".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn record_and_query_scenario() {
        let (store, _dir) = open_temp();
        let entry = store.record(sample_entry()).unwrap();
        assert_eq!(entry.id.len(), 26);
        assert!(crate::id::looks_like_id(&entry.id));
        assert_eq!(entry.confidence, 0.7);
        assert_eq!(entry.validation_count, 0);

        let results = store
            .query(
                &QueryParams {
                    top_k: 10,
                    min_confidence: None,
                    categories: None,
                    require_embedding: false,
                },
                None,
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, entry.id);
    }

    #[test]
    fn query_honors_a_precancelled_token() {
        let (store, _dir) = open_temp();
        store.record(sample_entry()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = store
            .query(
                &QueryParams {
                    top_k: 10,
                    min_confidence: None,
                    categories: None,
                    require_embedding: false,
                },
                Some(&cancel),
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn feedback_helpful_scenario() {
        let (store, _dir) = open_temp();
        let entry = store.record(sample_entry()).unwrap();
        let updated = store.apply_feedback(&entry.id, FeedbackSignal::Helpful).unwrap();
        assert!((updated.confidence - 0.78).abs() < 1e-9);
        assert_eq!(updated.validation_count, 1);
        assert!(updated.last_validated_at.is_some());

        let entity_log = change_log::read_for_entity(
            store.conn.read().unwrap().as_ref().unwrap(),
            "lore_entries",
            &entry.id,
        )
        .unwrap();
        assert_eq!(entity_log.len(), 2);
        let payload = entity_log[0].payload.as_ref().unwrap();
        assert_eq!(payload["confidence"], serde_json::json!(0.78));
    }

    #[test]
    fn not_relevant_leaves_updated_at_unchanged() {
        let (store, _dir) = open_temp();
        let entry = store.record(sample_entry()).unwrap();
        let before = entry.updated_at;
        let updated = store.apply_feedback(&entry.id, FeedbackSignal::NotRelevant).unwrap();
        assert_eq!(updated.updated_at, before);
        assert_eq!(updated.confidence, entry.confidence);
    }

    #[test]
    fn delete_then_query_scenario() {
        let (store, _dir) = open_temp();
        let entry = store.record(sample_entry()).unwrap();
        store.delete(&entry.id).unwrap();

        assert!(matches!(store.get(&entry.id), Err(EngramError::NotFound)));
        let log = change_log::read_for_entity(
            store.conn.read().unwrap().as_ref().unwrap(),
            "lore_entries",
            &entry.id,
        )
        .unwrap();
        assert_eq!(log.len(), 2);
        assert!(matches!(log[0].operation, Operation::Delete));
        assert!(log[0].payload.is_none());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let (store, _dir) = open_temp();
        store.close();
        assert!(matches!(store.record(sample_entry()), Err(EngramError::StoreClosed)));
        assert!(matches!(store.get("anything"), Err(EngramError::StoreClosed)));
    }

    #[test]
    fn import_with_skip_scenario() {
        let (store, _dir) = open_temp();
        store
            .record(NewEntry {
                id: Some("X".to_string()),
                content: "original".to_string(),
                category: Some(Category::PatternOutcome),
                source_id: "seed".to_string(),
                ..Default::default()
            })
            .unwrap();

        let export = serde_json::json!({
            "version": 1,
            "exported_at": "2024-01-01T00:00:00Z",
            "store_id": "default",
            "metadata": {},
            "lore": [
                {
                    "id": "X", "content": "updated", "context": null,
                    "category": "PATTERN_OUTCOME", "confidence": 0.5,
                    "embedding_status": "pending", "source_id": "other",
                    "sources": null, "validation_count": 0,
                    "last_validated_at": null,
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z", "deleted_at": null
                },
                {
                    "id": "Y", "content": "new", "context": null,
                    "category": "PATTERN_OUTCOME", "confidence": 0.5,
                    "embedding_status": "pending", "source_id": "other",
                    "sources": null, "validation_count": 0,
                    "last_validated_at": null,
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z", "deleted_at": null
                }
            ]
        });
        let bytes = serde_json::to_vec(&export).unwrap();
        let cancel = CancellationToken::new();
        let stats = store.import(&bytes, MergeStrategy::Skip, false, &cancel).unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.merged, 0);
        assert_eq!(store.get("X").unwrap().content, "original");
        assert_eq!(store.get("Y").unwrap().content, "new");
    }

    #[test]
    fn bootstrap_replacement_scenario() {
        let (store, _dir) = open_temp();
        store
            .record(NewEntry {
                id: Some("A".to_string()),
                content: "local".to_string(),
                category: Some(Category::PatternOutcome),
                source_id: "local".to_string(),
                ..Default::default()
            })
            .unwrap();

        let snapshot_dir = tempfile::tempdir().unwrap();
        let snapshot_store = Store::open(snapshot_dir.path().join("snapshot.db")).unwrap();
        for snapshot_id in ["B", "C"] {
            snapshot_store
                .record(NewEntry {
                    id: Some(snapshot_id.to_string()),
                    content: snapshot_id.to_string(),
                    category: Some(Category::PatternOutcome),
                    source_id: "hub".to_string(),
                    ..Default::default()
                })
                .unwrap();
        }
        let image = std::fs::read(snapshot_dir.path().join("snapshot.db")).unwrap();
        snapshot_store.close();

        store.replace_from_snapshot(&image, Some(42)).unwrap();

        assert!(matches!(store.get("A"), Err(EngramError::NotFound)));
        assert!(store.get("B").is_ok());
        assert!(store.get("C").is_ok());
        assert_eq!(store.last_pull_seq().unwrap(), 42);
    }

    /// A push that crashed after the hub confirmed it but before local
    /// completion ran must be replayed from the cache, not resent: mint
    /// the pending `push_id` and cache a response for it exactly as
    /// `Syncer::push` would have just before a crash, then assert a
    /// real `Syncer::push` call completes locally from the cache without
    /// any network request.
    #[test]
    fn push_idempotency_replays_cached_response_without_resending() {
        use crate::sync::Syncer;
        use httpmock::Method::POST;
        use httpmock::MockServer;
        use std::sync::Arc;

        let (store, _dir) = open_temp();
        store.record(sample_entry()).unwrap();
        store.record(sample_entry()).unwrap();
        store.record(sample_entry()).unwrap();
        let batch = store.pending_sync(100).unwrap();
        let highest = batch.last().unwrap().sequence;

        let push_id = store.push_id_for_pending_batch().unwrap();
        store.cache_push_response(push_id, 3, 42).unwrap();
        assert_eq!(store.push_id_for_pending_batch().unwrap(), push_id);

        let server = MockServer::start();
        let push_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/stores/default/sync/push");
            then.status(500);
        });

        let store = Arc::new(store);
        let syncer = Syncer::with_hub(Arc::clone(&store), "default", server.base_url(), "test-key").unwrap();
        let report = syncer.push(100, None).unwrap();

        push_mock.assert_hits(0);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.remote_sequence, 42);
        assert_eq!(store.last_push_seq().unwrap(), highest);
        assert!(store.pending_sync(100).unwrap().is_empty());
    }

    #[test]
    fn apply_inbound_batch_does_not_append_to_change_log() {
        let (store, _dir) = open_temp();
        let before = change_log::count(store.conn.read().unwrap().as_ref().unwrap()).unwrap();

        let wire = crate::entry::EntryWire {
            id: "remote-1".to_string(),
            content: "from the hub".to_string(),
            context: None,
            category: Category::PatternOutcome,
            confidence: 0.5,
            embedding_status: EmbeddingStatus::Pending,
            source_id: "hub-client".to_string(),
            sources: None,
            validation_count: 0,
            last_validated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let delta = ChangeLogEntry {
            sequence: 1,
            table_name: "lore_entries".to_string(),
            entity_id: "remote-1".to_string(),
            operation: Operation::Upsert,
            payload: Some(serde_json::to_value(&wire).unwrap()),
            source_id: "hub-client".to_string(),
            created_at: Utc::now(),
            received_at: Utc::now(),
        };
        store.apply_inbound_batch(&[delta], 1).unwrap();

        let after = change_log::count(store.conn.read().unwrap().as_ref().unwrap()).unwrap();
        assert_eq!(before, after);
        assert!(store.get("remote-1").is_ok());
        assert_eq!(store.last_pull_seq().unwrap(), 1);
    }
}
