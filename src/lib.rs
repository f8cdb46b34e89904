//! A local-first experiential knowledge store for autonomous agents.
//!
//! Agents record short "lore" entries (insights, gotchas, decisions)
//! tagged with a category and a confidence score, retrieve entries
//! relevant to a new task, and reinforce or weaken them via feedback. An
//! optional hub receives pushed changes and serves deltas so multiple
//! clients converge on shared knowledge. See [`store::Store`] for the
//! persistence engine and [`sync::Syncer`] for the hub protocol.

pub mod cancel;
pub mod change_log;
pub mod confidence;
pub mod config;
pub mod embedding;
pub mod entry;
pub mod error;
pub mod id;
pub mod import;
pub mod logging;
pub mod ranker;
pub mod session;
pub mod store;
pub mod sync;

pub use change_log::{ChangeLogEntry, Operation};
pub use confidence::FeedbackSignal;
pub use config::Config;
pub use entry::{Category, EmbeddingStatus, Entry, EntryWire, NewEntry};
pub use error::{EngramError, Result};
pub use import::{ImportStats, MergeStrategy};
pub use ranker::{BruteForceRanker, Ranker, Scored};
pub use session::SessionRegistry;
pub use store::{QueryParams, Store, StoreStats};
pub use sync::{PullReport, PushReport, Syncer};
