//! Error types for synchronization.

use offline_store::StorageError;
use thiserror::Error;

/// Errors that can occur during a sync pass
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No response from the server (unreachable, reset, timeout)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("Server rejected sync with status {status}")]
    ServerRejection { status: u16, body: String },

    /// The request could not be built, e.g. a token that is not a valid header
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The server answered successfully but the body was not understood
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// The background host refused the registration
    #[error("Background registration failed: {0}")]
    Registration(String),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl SyncError {
    /// Whether the host should retry a background run that failed with this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// Whether the local store is unusable until the user intervenes
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_fatal())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            SyncError::InvalidRequest(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidResponse(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
