//! Thin `reqwest::blocking` wrapper over the hub's three endpoints
//! (§6). One shared, connection-pooled client per [`super::Syncer`]
//! (§5 "Shared resources").

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::error::{EngramError, Result};
use crate::store::paths::percent_encode_store_id;

use super::wire::{SyncDeltaResponse, SyncPushRequest, SyncPushResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single push attempt, distinguishing the three response
/// shapes named in §6 so the caller can decide retry/advance/abort.
pub enum PushOutcome {
    Accepted(SyncPushResponse),
    SchemaMismatch { client_version: i64, server_version: i64, detail: String },
    Validation { accepted: i64, errors: Vec<super::wire::PushEntryError> },
}

/// HTTP transport to one hub, bound to one store.
pub struct HubClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl HubClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn push_path(&self, store_id: &str) -> String {
        format!("{}/api/v1/stores/{}/sync/push", self.base_url, percent_encode_store_id(store_id))
    }

    fn delta_path(&self, store_id: &str) -> String {
        format!("{}/api/v1/stores/{}/sync/delta", self.base_url, percent_encode_store_id(store_id))
    }

    fn snapshot_path(&self, store_id: &str) -> String {
        format!("{}/api/v1/stores/{}/sync/snapshot", self.base_url, percent_encode_store_id(store_id))
    }

    pub fn push(&self, store_id: &str, request: &SyncPushRequest) -> Result<PushOutcome> {
        let response = self
            .http
            .post(self.push_path(store_id))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()?;

        match response.status() {
            StatusCode::OK => Ok(PushOutcome::Accepted(response.json()?)),
            StatusCode::CONFLICT => {
                let body: super::wire::SchemaMismatchResponse = response.json()?;
                Ok(PushOutcome::SchemaMismatch {
                    client_version: body.client_version,
                    server_version: body.server_version,
                    detail: body.detail,
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body: super::wire::PushValidationResponse = response.json()?;
                Ok(PushOutcome::Validation {
                    accepted: body.accepted,
                    errors: body.errors,
                })
            }
            status => Err(EngramError::Sync {
                operation: "push",
                status: status.as_u16(),
                source: Box::new(EngramError::SyncFailed(format!("unexpected status {status}"))),
            }),
        }
    }

    pub fn delta(&self, store_id: &str, after: i64, limit: i64) -> Result<SyncDeltaResponse> {
        let response = self
            .http
            .get(self.delta_path(store_id))
            .bearer_auth(&self.api_key)
            .query(&[("after", after), ("limit", limit)])
            .send()?;
        if !response.status().is_success() {
            return Err(EngramError::Sync {
                operation: "delta",
                status: response.status().as_u16(),
                source: Box::new(EngramError::SyncFailed("delta pull failed".to_string())),
            });
        }
        Ok(response.json()?)
    }

    pub fn snapshot(&self, store_id: &str) -> Result<Vec<u8>> {
        let response = self.http.get(self.snapshot_path(store_id)).bearer_auth(&self.api_key).send()?;
        if !response.status().is_success() {
            return Err(EngramError::Sync {
                operation: "snapshot",
                status: response.status().as_u16(),
                source: Box::new(EngramError::SyncFailed("snapshot download failed".to_string())),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

pub fn new_push_id() -> Uuid {
    Uuid::new_v4()
}
