//! Record storage abstraction.
//!
//! This module defines the `RecordStore` trait that provides a unified interface
//! for durable, keyed storage of records organised into named collections.
//! Implementations can keep the data in memory (tests) or on disk.

use crate::error::StorageResult;
use crate::record::{Collection, Payload, RecordId, StoredRecord};

/// Trait for record storage backends
///
/// Every operation opens the store lazily, so callers never have to call
/// `open` first. All mutations of one store instance are serialised, which
/// makes `mark_synced` a transactional read-modify-write even when a
/// foreground and a background sync share the store.
///
/// # Example
///
/// ```ignore
/// use offline_store::{Collection, MemoryRecordStore, RecordStore};
///
/// let store = MemoryRecordStore::new();
/// let id = store.insert(Collection::TrainingData, payload).await?;
/// let pending = store.filter_by_synced(Collection::TrainingData, false).await?;
/// ```
#[trait_variant::make(Send)]
pub trait RecordStore: Send + Sync {
    /// Open or create the store at the current schema version
    ///
    /// Idempotent. Fails with `StorageError::Unavailable` when the host
    /// denies access to durable storage.
    async fn open(&self) -> StorageResult<()>;

    /// Release the store; the next operation reopens it
    async fn close(&self) -> StorageResult<()>;

    /// Insert a new record
    ///
    /// Sets `timestamp` to now and `synced` to false, returns the key.
    async fn insert(&self, collection: Collection, payload: Payload) -> StorageResult<RecordId>;

    /// Insert or replace a record of an inline-keyed collection
    async fn put(&self, collection: Collection, payload: Payload) -> StorageResult<RecordId>;

    /// All records of a collection, ordered by key
    async fn get_all(&self, collection: Collection) -> StorageResult<Vec<StoredRecord>>;

    /// A single record, `None` if absent
    async fn get_by_id(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> StorageResult<Option<StoredRecord>>;

    /// Records with the given sync flag, in insertion order
    async fn filter_by_synced(
        &self,
        collection: Collection,
        synced: bool,
    ) -> StorageResult<Vec<StoredRecord>>;

    /// Number of records in a collection
    async fn count(&self, collection: Collection) -> StorageResult<usize>;

    /// Flag a record as acknowledged by the server
    ///
    /// Idempotent. Fails with `StorageError::RecordNotFound` if absent.
    async fn mark_synced(&self, collection: Collection, id: RecordId) -> StorageResult<()>;

    /// Delete a record; fails with `StorageError::RecordNotFound` if absent
    async fn delete_by_id(&self, collection: Collection, id: RecordId) -> StorageResult<()>;

    /// Delete exactly the records flagged synced at one consistent read
    ///
    /// Returns the number of deleted records.
    async fn clear_where_synced(&self, collection: Collection) -> StorageResult<usize>;

    /// Delete every record of a collection
    async fn clear_all(&self, collection: Collection) -> StorageResult<()>;
}
