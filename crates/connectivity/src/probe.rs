//! Active connectivity probes.

use crate::error::{ConnectivityError, ConnectivityResult};
use crate::state::Reachability;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::time::Duration;

/// Default bound on a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can tell whether the server is really reachable
///
/// Implementations must never report `Online` without having received a
/// successful answer from the server.
#[trait_variant::make(Send)]
pub trait ConnectivityProbe: Send + Sync {
    /// Run one bounded probe
    async fn probe(&self) -> Reachability;
}

/// Probe issuing a `HEAD` request for a small same-origin resource
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe for the given URL with the default 5 second bound
    pub fn new(url: impl Into<String>) -> ConnectivityResult<Self> {
        Self::with_timeout(url, DEFAULT_PROBE_TIMEOUT)
    }

    /// Create a probe with a custom bound
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> ConnectivityResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe bound
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the request and report why it did not succeed
    ///
    /// The request is dropped (and so aborted) when the bound elapses.
    pub async fn check(&self) -> ConnectivityResult<()> {
        let request = self
            .client
            .head(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ConnectivityError::Timeout(self.timeout))??;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectivityError::Status(response.status().as_u16()))
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> Reachability {
        match self.check().await {
            Ok(()) => Reachability::Online,
            Err(e) => {
                tracing::debug!("[Connection Check] Failed: {}", e);
                Reachability::Offline
            }
        }
    }
}
