use thiserror::Error;

/// Error kinds produced by the store, syncer, and import pipeline.
///
/// Mirrors the teacher's `SyncError` shape (a flat enum with `#[from]` for
/// underlying library errors) generalized to the full taxonomy of kinds
/// named by the wire and validation contracts this crate implements.
#[derive(Error, Debug)]
pub enum EngramError {
    #[error("entry not found")]
    NotFound,

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("content exceeds maximum length of 4000 characters")]
    ContentTooLong,

    #[error("context exceeds maximum length of 1000 characters")]
    ContextTooLong,

    #[error("content must not be empty")]
    EmptyContent,

    #[error("confidence must be within [0.0, 1.0]")]
    InvalidConfidence,

    #[error("store is closed")]
    StoreClosed,

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("hub is not configured; running offline")]
    Offline,

    #[error("operation cancelled")]
    Cancelled,

    #[error("schema mismatch: client={client_version} server={server_version}: {detail}")]
    SchemaMismatch {
        client_version: i64,
        server_version: i64,
        detail: String,
    },

    #[error("session reference not found: {0}")]
    SessionRefNotFound(String),

    #[error("validation failed on field `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    #[error("sync operation `{operation}` failed with status {status}: {source}")]
    Sync {
        operation: &'static str,
        status: u16,
        #[source]
        source: Box<EngramError>,
    },

    #[error("store id must be non-empty")]
    InvalidStoreId,

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, EngramError>;

impl EngramError {
    /// Stable kind tag used by JSON error output and exit-code translation
    /// at whatever CLI surface ends up consuming this crate.
    pub fn kind(&self) -> &'static str {
        match self {
            EngramError::NotFound => "not_found",
            EngramError::InvalidCategory(_) => "invalid_category",
            EngramError::ContentTooLong => "content_too_long",
            EngramError::ContextTooLong => "context_too_long",
            EngramError::EmptyContent => "empty_content",
            EngramError::InvalidConfidence => "invalid_confidence",
            EngramError::StoreClosed => "store_closed",
            EngramError::SyncFailed(_) => "sync_failed",
            EngramError::Offline => "offline",
            EngramError::Cancelled => "cancelled",
            EngramError::SchemaMismatch { .. } => "model_mismatch",
            EngramError::SessionRefNotFound(_) => "session_ref_not_found",
            EngramError::Validation { .. } => "validation",
            EngramError::Sync { .. } => "sync",
            EngramError::InvalidStoreId => "validation",
            EngramError::Sqlite(_) => "sqlite",
            EngramError::Io(_) => "io",
            EngramError::Json(_) => "json",
            EngramError::Http(_) => "http",
        }
    }
}
