//! Typed configuration bound from the environment table in §6. Full
//! argument parsing, subcommands, and an MCP tool surface are external
//! collaborators (§1 Non-goals); this struct is the seam they call into.

use std::env;
use std::path::PathBuf;

/// Default root directory for store files when `RECALL_DB_PATH` is unset.
pub const DEFAULT_ROOT_DIR: &str = ".recall";

/// Reserved store id used when the caller makes no explicit selection.
pub const DEFAULT_STORE_ID: &str = "default";

/// Resolved configuration for one client process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store id (`ENGRAM_STORE`), defaulting to [`DEFAULT_STORE_ID`].
    pub store_id: String,
    /// Hub base URL (`ENGRAM_URL`). `None` means offline mode.
    pub hub_url: Option<String>,
    /// Hub bearer token (`ENGRAM_API_KEY`).
    pub api_key: Option<String>,
    /// Legacy absolute database path override (`RECALL_DB_PATH`).
    pub db_path_override: Option<PathBuf>,
    /// Stable client identifier (`RECALL_SOURCE_ID`), defaulting to the
    /// local hostname.
    pub client_id: String,
    /// Verbose logging toggle (`RECALL_DEBUG`: any non-empty value).
    pub debug: bool,
    /// Debug log destination (`RECALL_DEBUG_LOG`); `None` means stderr.
    pub debug_log: Option<PathBuf>,
}

impl Config {
    /// Bind configuration from process environment variables, per §6.
    pub fn from_env() -> Self {
        Self {
            store_id: env::var("ENGRAM_STORE").unwrap_or_else(|_| DEFAULT_STORE_ID.to_string()),
            hub_url: env::var("ENGRAM_URL").ok().filter(|s| !s.is_empty()),
            api_key: env::var("ENGRAM_API_KEY").ok().filter(|s| !s.is_empty()),
            db_path_override: env::var("RECALL_DB_PATH").ok().map(PathBuf::from),
            client_id: env::var("RECALL_SOURCE_ID").unwrap_or_else(|_| default_client_id()),
            debug: env::var("RECALL_DEBUG").is_ok_and(|v| !v.is_empty()),
            debug_log: env::var("RECALL_DEBUG_LOG").ok().map(PathBuf::from),
        }
    }

    /// `true` when a hub URL and API key are both present, i.e. the
    /// client can construct a [`crate::sync::Syncer`].
    pub fn sync_enabled(&self) -> bool {
        self.hub_url.is_some() && self.api_key.is_some()
    }

    /// Default root directory for store files, `${HOME}/.recall/`. Does
    /// not apply the `RECALL_DB_PATH` override; see
    /// [`crate::store::paths::resolve_db_path`] for the full resolution
    /// that does, since that override replaces the database *file* path,
    /// not just the root directory.
    pub fn root_dir(&self) -> PathBuf {
        dirs_home().join(DEFAULT_ROOT_DIR)
    }
}

fn default_client_id() -> String {
    hostname_best_effort().unwrap_or_else(|| "unknown-host".to_string())
}

fn hostname_best_effort() -> Option<String> {
    // Avoid a dedicated `hostname` dependency for a single best-effort read;
    // `HOSTNAME` is set in most POSIX shells, falling back to a generated id.
    env::var("HOSTNAME").ok().filter(|s| !s.is_empty())
}

fn dirs_home() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_enabled_requires_both_url_and_key() {
        let mut cfg = Config {
            store_id: "default".into(),
            hub_url: None,
            api_key: None,
            db_path_override: None,
            client_id: "host".into(),
            debug: false,
            debug_log: None,
        };
        assert!(!cfg.sync_enabled());
        cfg.hub_url = Some("https://hub.example".into());
        assert!(!cfg.sync_enabled());
        cfg.api_key = Some("secret".into());
        assert!(cfg.sync_enabled());
    }

    #[test]
    fn root_dir_ignores_legacy_override() {
        let cfg = Config {
            store_id: "default".into(),
            hub_url: None,
            api_key: None,
            db_path_override: Some(PathBuf::from("/tmp/custom.db")),
            client_id: "host".into(),
            debug: false,
            debug_log: None,
        };
        assert_ne!(cfg.root_dir(), PathBuf::from("/tmp/custom.db"));
    }
}
