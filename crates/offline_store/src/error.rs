//! Error types for the record store.

use crate::record::RecordId;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The host denied access to durable storage
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// No record with this key exists in the collection
    #[error("Record {id} not found in {collection}")]
    RecordNotFound { collection: String, id: RecordId },

    /// The collection was never created by a schema upgrade
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// An inline-keyed record is missing its key field
    #[error("Record for {collection} is missing key field '{field}'")]
    MissingKey { collection: String, field: String },

    /// A record with the same key already exists
    #[error("Duplicate key {id} in {collection}")]
    DuplicateKey { collection: String, id: RecordId },

    /// The stored database was written by a newer schema
    #[error("Schema version mismatch: stored {stored}, supported {supported}")]
    VersionMismatch { stored: u32, supported: u32 },

    /// Operation not valid for the collection's key rule
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl StorageError {
    /// Whether the whole store is unusable, as opposed to a single failed operation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::VersionMismatch { .. }
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
