//! Background sync plus on-demand push/pull/bootstrap (§4.3). Generalizes
//! the teacher's callback-injected `SyncClient::sync_cycle` into a
//! concrete HTTP-backed client, since here the "push"/"pull" functions are
//! a fixed wire contract rather than caller-supplied closures.

pub mod client;
pub mod wire;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use backoff::ExponentialBackoff;

use crate::cancel::CancellationToken;
use crate::error::{EngramError, Result};
use crate::store::Store;

use client::{HubClient, PushOutcome};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PushReport {
    pub accepted: i64,
    pub remote_sequence: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    pub applied: usize,
}

struct BackgroundHandle {
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Client-side half of the sync protocol. `None` `client` means the hub
/// is unconfigured; every network operation then returns
/// [`EngramError::Offline`] cheaply (§4.3 "Lifecycle").
pub struct Syncer {
    store: Arc<Store>,
    client: Option<HubClient>,
    store_id: String,
    sync_interval: Duration,
    background: Mutex<Option<BackgroundHandle>>,
}

impl Syncer {
    pub fn new(store: Arc<Store>, store_id: impl Into<String>) -> Self {
        Self {
            store,
            client: None,
            store_id: store_id.into(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            background: Mutex::new(None),
        }
    }

    /// Construct with a hub configured, per §4.3 "created when the client
    /// is configured with a hub URL and API key".
    pub fn with_hub(
        store: Arc<Store>,
        store_id: impl Into<String>,
        hub_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            client: Some(HubClient::new(hub_url, api_key)?),
            store_id: store_id.into(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            background: Mutex::new(None),
        })
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn is_online(&self) -> bool {
        self.client.is_some()
    }

    /// Drain the next batch of local changes to the hub, keyed by a
    /// `push_id` that survives retries of the same batch so the hub can
    /// deduplicate (§4.3 "Push"). If the hub already confirmed this
    /// `push_id` (a prior attempt's response was cached but local
    /// completion never ran), the cached response is replayed without any
    /// network call. `cancel`, if supplied, is checked before the request
    /// and between retry attempts (§5).
    pub fn push(&self, limit: i64, cancel: Option<&CancellationToken>) -> Result<PushReport> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(EngramError::Cancelled);
        }
        let client = self.client.as_ref().ok_or(EngramError::Offline)?;
        let batch = self.store.pending_sync(limit)?;
        if batch.is_empty() {
            return Ok(PushReport::default());
        }

        let push_id = self.store.push_id_for_pending_batch()?;
        if let Some((accepted, remote_sequence)) = self.store.cached_push_response(push_id)? {
            let highest = batch.last().expect("non-empty batch").sequence;
            let ids: Vec<String> = batch.iter().map(|e| e.entity_id.clone()).collect();
            self.store.complete_push(highest, &ids)?;
            return Ok(PushReport { accepted, remote_sequence });
        }

        let entries = batch
            .iter()
            .map(|e| wire::PushEntry {
                sequence: e.sequence,
                table_name: e.table_name.clone(),
                entity_id: e.entity_id.clone(),
                operation: e.operation.as_str().to_string(),
                payload: e.payload.clone(),
                created_at: e.created_at,
            })
            .collect();
        let request = wire::SyncPushRequest {
            push_id,
            source_id: self.store.source_id(),
            schema_version: self.store.schema_version()?,
            entries,
        };

        match self.push_with_retry(client, &request, cancel)? {
            PushOutcome::Accepted(response) => {
                let highest = batch.last().expect("non-empty batch").sequence;
                let ids: Vec<String> = batch.iter().map(|e| e.entity_id.clone()).collect();
                self.store.cache_push_response(push_id, response.accepted, response.remote_sequence)?;
                self.store.complete_push(highest, &ids)?;
                Ok(PushReport {
                    accepted: response.accepted,
                    remote_sequence: response.remote_sequence,
                })
            }
            PushOutcome::SchemaMismatch { client_version, server_version, detail } => {
                self.store.clear_pending_push()?;
                Err(EngramError::SchemaMismatch { client_version, server_version, detail })
            }
            PushOutcome::Validation { accepted, errors } => {
                let detail = format!(
                    "{accepted} accepted, {} entries rejected: {}",
                    errors.len(),
                    errors
                        .iter()
                        .map(|e| format!("{}:{}", e.entity_id, e.code))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.store.clear_pending_push()?;
                self.store.fail_sync(&detail)?;
                Err(EngramError::SyncFailed(detail))
            }
        }
    }

    /// Pull delta batches until `has_more` is false (§4.3 "Pull (delta)").
    /// `cancel`, if supplied, is checked between batches and between retry
    /// attempts within a batch (§5); a cancellation mid-pull stops cleanly
    /// and reports whatever was applied so far rather than erroring.
    pub fn pull(&self, limit: i64, cancel: Option<&CancellationToken>) -> Result<PullReport> {
        let client = self.client.as_ref().ok_or(EngramError::Offline)?;
        let mut applied = 0;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                break;
            }
            let after = self.store.last_pull_seq()?;
            let response = match self.pull_with_retry(client, after, limit, cancel) {
                Ok(response) => response,
                Err(EngramError::Cancelled) => break,
                Err(e) => return Err(e),
            };
            applied += response.entries.len();
            let deltas: Vec<_> =
                response.entries.into_iter().map(wire::SyncDeltaEntry::into_change_log_entry).collect();
            self.store.apply_inbound_batch(&deltas, response.last_sequence)?;
            if !response.has_more {
                break;
            }
        }
        Ok(PullReport { applied })
    }

    /// Download and install a full snapshot (§4.3 "Bootstrap snapshot").
    /// `cancel`, if supplied, is checked before the request and between
    /// retry attempts (§5).
    pub fn bootstrap(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(EngramError::Cancelled);
        }
        let client = self.client.as_ref().ok_or(EngramError::Offline)?;
        let image = self.snapshot_with_retry(client, cancel)?;
        self.store.replace_from_snapshot(&image, None)
    }

    /// Destructive reinitialize (§4.3 "Reinitialize"). Refuses when
    /// unpushed local changes exist unless `force` is set.
    pub fn reinitialize(&self, force: bool) -> Result<()> {
        if !force && !self.store.pending_sync(1)?.is_empty() {
            return Err(EngramError::SyncFailed(
                "refusing to reinitialize: unpushed local changes exist".to_string(),
            ));
        }
        self.store.reopen_fresh()?;
        match self.bootstrap(None) {
            Ok(()) => Ok(()),
            Err(EngramError::Offline) if force => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Start the periodic push-then-pull background task (§9 "a dedicated
    /// background task"). A no-op if already running or offline.
    pub fn start_background(self: &Arc<Self>) {
        if !self.is_online() {
            return;
        }
        let mut guard = self.background.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let syncer = Arc::clone(self);
        let interval = self.sync_interval;
        let handle = thread::spawn(move || loop {
            match shutdown_rx.recv_timeout(interval) {
                Ok(()) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            if let Err(e) = syncer.push(DEFAULT_BATCH_LIMIT, None) {
                tracing::warn!(error = %e, "background push failed");
            }
            if let Err(e) = syncer.pull(DEFAULT_BATCH_LIMIT, None) {
                tracing::warn!(error = %e, "background pull failed");
            }
        });
        *guard = Some(BackgroundHandle { shutdown: shutdown_tx, handle });
    }

    /// Signal the background task to stop and join it.
    pub fn stop_background(&self) {
        let mut guard = self.background.lock().unwrap();
        if let Some(bg) = guard.take() {
            let _ = bg.shutdown.send(());
            let _ = bg.handle.join();
        }
    }

    fn push_with_retry(
        &self,
        client: &HubClient,
        request: &wire::SyncPushRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<PushOutcome> {
        let store_id = &self.store_id;
        backoff::retry(ExponentialBackoff::default(), || {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(backoff::Error::permanent(EngramError::Cancelled));
            }
            client.push(store_id, request).map_err(classify_for_retry)
        })
        .map_err(unwrap_backoff_error)
    }

    fn pull_with_retry(
        &self,
        client: &HubClient,
        after: i64,
        limit: i64,
        cancel: Option<&CancellationToken>,
    ) -> Result<wire::SyncDeltaResponse> {
        let store_id = &self.store_id;
        backoff::retry(ExponentialBackoff::default(), || {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(backoff::Error::permanent(EngramError::Cancelled));
            }
            client.delta(store_id, after, limit).map_err(classify_for_retry)
        })
        .map_err(unwrap_backoff_error)
    }

    fn snapshot_with_retry(&self, client: &HubClient, cancel: Option<&CancellationToken>) -> Result<Vec<u8>> {
        let store_id = &self.store_id;
        backoff::retry(ExponentialBackoff::default(), || {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(backoff::Error::permanent(EngramError::Cancelled));
            }
            client.snapshot(store_id).map_err(classify_for_retry)
        })
        .map_err(unwrap_backoff_error)
    }
}

/// 409/422 never reach here (the client surfaces them as `Ok` variants);
/// everything [`HubClient`] returns as an `Err` is a transport-level
/// failure worth retrying under backoff.
fn classify_for_retry(err: EngramError) -> backoff::Error<EngramError> {
    tracing::warn!(error = %err, "sync request failed, retrying with backoff");
    backoff::Error::transient(err)
}

fn unwrap_backoff_error(err: backoff::Error<EngramError>) -> EngramError {
    match err {
        backoff::Error::Permanent(e) => e,
        backoff::Error::Transient { err, .. } => err,
    }
}
