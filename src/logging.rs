//! `tracing-subscriber` initialization honoring `RECALL_DEBUG` /
//! `RECALL_DEBUG_LOG` (§6). Grounded in the pack's `tracing` usage pattern
//! (`vsevex-carry`, `dylanbstorey-arawn`, `blocksense-network-agents-workflow`):
//! install a single global subscriber once at process start, then use
//! `tracing::{debug,info,warn,error}` call sites throughout.

use std::fs::OpenOptions;
use std::sync::{Mutex, Once};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init(config: &Config) {
    INIT.call_once(|| {
        let filter = if config.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let builder = tracing_subscriber::fmt().with_env_filter(filter);

        match &config.debug_log {
            Some(path) => {
                if let Ok(file) = OpenOptions::new().create(true).append(true).open(path) {
                    builder.with_writer(Mutex::new(file)).init();
                    return;
                }
                // Fall through to stderr if the log destination can't be opened.
                builder.init();
            }
            None => builder.init(),
        }
    });
}
