//! Error types for connectivity probing.

use std::time::Duration;
use thiserror::Error;

/// Reasons a probe did not confirm connectivity
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The HTTP client could not be built
    #[error("Client setup failed: {0}")]
    Client(String),

    /// The request failed before a response arrived
    #[error("Request failed: {0}")]
    Request(String),

    /// No response within the probe timeout
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("Probe returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ConnectivityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ConnectivityError::Client(err.to_string())
        } else {
            ConnectivityError::Request(err.to_string())
        }
    }
}

/// Result type for connectivity checks
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectivityError::Status(503);
        assert_eq!(err.to_string(), "Probe returned status 503");

        let err = ConnectivityError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Probe timed out after 5s");
    }
}
