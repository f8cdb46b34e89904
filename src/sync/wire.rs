//! JSON wire shapes for the hub protocol (§6). snake_case field names
//! throughout, matching the teacher's `SyncRequest`/`SyncResponse` pair
//! generalized to push/delta/snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::EntryWire;

/// One outbound change-log row, as embedded in a push request. A thin
/// projection of [`crate::change_log::ChangeLogEntry`]: the wire shape
/// never includes `received_at`, which is purely local bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEntry {
    pub sequence: i64,
    pub table_name: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncPushRequest {
    pub push_id: Uuid,
    pub source_id: String,
    pub schema_version: i64,
    pub entries: Vec<PushEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncPushResponse {
    pub accepted: i64,
    pub remote_sequence: i64,
}

/// The 409 body: a fatal, non-retriable schema disagreement.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaMismatchResponse {
    pub client_version: i64,
    pub server_version: i64,
    pub detail: String,
}

/// One entry-level error inside a 422 validation response.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEntryError {
    pub sequence: i64,
    pub table_name: String,
    pub entity_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushValidationResponse {
    pub accepted: i64,
    pub errors: Vec<PushEntryError>,
}

/// One inbound delta entry (`GET .../sync/delta`).
#[derive(Debug, Clone, Deserialize)]
pub struct SyncDeltaEntry {
    pub sequence: i64,
    pub table_name: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: Option<serde_json::Value>,
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncDeltaResponse {
    pub entries: Vec<SyncDeltaEntry>,
    pub last_sequence: i64,
    pub latest_sequence: i64,
    pub has_more: bool,
}

/// The export-file / sync wire shape for a complete entry, reused from
/// the canonical entry projection.
pub type WireEntry = EntryWire;

impl SyncDeltaEntry {
    /// Project into [`crate::change_log::ChangeLogEntry`] so
    /// [`crate::store::Store::apply_inbound_batch`] can consume it with
    /// the same machinery as a locally-read change-log row.
    pub fn into_change_log_entry(self) -> crate::change_log::ChangeLogEntry {
        crate::change_log::ChangeLogEntry {
            sequence: self.sequence,
            table_name: self.table_name,
            entity_id: self.entity_id,
            operation: crate::change_log::Operation::parse(&self.operation),
            payload: self.payload,
            source_id: self.source_id,
            created_at: self.created_at,
            received_at: self.received_at,
        }
    }
}
