//! Transport to the sync endpoint.

use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncResponse;
use offline_store::StoredRecord;
use std::time::Duration;

/// Header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Delivers one batch of records to the server
///
/// Implementations map failures onto the sync error taxonomy:
/// `Transport` when no response arrived, `InvalidRequest` when the request
/// could not be built, `ServerRejection` for a non-success status,
/// `InvalidResponse` for an unreadable body.
#[trait_variant::make(Send)]
pub trait SyncTransport: Send + Sync {
    async fn submit(&self, batch: &[StoredRecord], token: &str) -> SyncResult<SyncResponse>;
}

/// JSON-over-HTTP transport
#[derive(Debug, Clone)]
pub struct HttpSyncTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpSyncTransport {
    /// Create a transport posting to the given URL
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SyncTransport for HttpSyncTransport {
    async fn submit(&self, batch: &[StoredRecord], token: &str) -> SyncResult<SyncResponse> {
        tracing::debug!("[Sync] Posting {} records to {}", batch.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(CSRF_HEADER, token)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SyncError::ServerRejection {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
