//! In-memory record store implementation.
//!
//! This module provides `MemoryRecordStore`, an in-memory implementation of the
//! `RecordStore` trait. It's primarily intended for testing and for hosts that
//! do not need persistence across restarts.
//!
//! # Features
//!
//! - No I/O overhead
//! - Data survives `close`/`open` cycles of the same instance
//! - Can simulate a host that denies storage access
//!
//! # Example
//!
//! ```ignore
//! use offline_store::{Collection, MemoryRecordStore, RecordStore};
//!
//! let store = MemoryRecordStore::new();
//! let id = store.insert(Collection::TrainingData, payload).await?;
//! store.mark_synced(Collection::TrainingData, id).await?;
//! ```

use crate::database::{now_millis, Database};
use crate::error::{StorageError, StorageResult};
use crate::record::{Collection, Payload, RecordId, StoredRecord};
use crate::storage::RecordStore;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// In-memory implementation of `RecordStore`
pub struct MemoryRecordStore {
    /// The database image; the mutex is the single-writer lock
    db: Mutex<Database>,
    /// Whether the store is currently open
    open: AtomicBool,
    /// Simulates a host that refuses storage access
    deny_access: AtomicBool,
}

impl MemoryRecordStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            db: Mutex::new(Database::empty()),
            open: AtomicBool::new(false),
            deny_access: AtomicBool::new(false),
        }
    }

    /// Create a store whose host denies access to storage
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_deny_access(true);
        store
    }

    /// Toggle simulated denial of storage access
    pub fn set_deny_access(&self, deny: bool) {
        self.deny_access.store(deny, Ordering::SeqCst);
    }

    /// Check whether the store is open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, db: &mut Database) -> StorageResult<()> {
        if self.deny_access.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "host denied access to storage".to_string(),
            ));
        }
        if db.needs_upgrade() {
            db.upgrade()?;
        }
        if !self.open.swap(true, Ordering::SeqCst) {
            tracing::debug!("[MemoryStore] Opened at version {}", db.version());
        }
        Ok(())
    }

    async fn read<R, F>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&Database) -> StorageResult<R> + Send,
    {
        let mut db = self.db.lock().await;
        self.ensure_open(&mut db)?;
        f(&db)
    }

    async fn write<R, F>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&mut Database) -> StorageResult<R> + Send,
    {
        let mut db = self.db.lock().await;
        self.ensure_open(&mut db)?;
        f(&mut db)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn open(&self) -> StorageResult<()> {
        self.read(|_| Ok(())).await
    }

    async fn close(&self) -> StorageResult<()> {
        let _db = self.db.lock().await;
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(&self, collection: Collection, payload: Payload) -> StorageResult<RecordId> {
        self.write(|db| db.insert(collection, payload, now_millis()))
            .await
    }

    async fn put(&self, collection: Collection, payload: Payload) -> StorageResult<RecordId> {
        self.write(|db| db.put(collection, payload, now_millis()))
            .await
    }

    async fn get_all(&self, collection: Collection) -> StorageResult<Vec<StoredRecord>> {
        self.read(|db| db.get_all(collection)).await
    }

    async fn get_by_id(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> StorageResult<Option<StoredRecord>> {
        self.read(|db| db.get_by_id(collection, id)).await
    }

    async fn filter_by_synced(
        &self,
        collection: Collection,
        synced: bool,
    ) -> StorageResult<Vec<StoredRecord>> {
        self.read(|db| db.filter_by_synced(collection, synced)).await
    }

    async fn count(&self, collection: Collection) -> StorageResult<usize> {
        self.read(|db| db.count(collection)).await
    }

    async fn mark_synced(&self, collection: Collection, id: RecordId) -> StorageResult<()> {
        self.write(|db| db.mark_synced(collection, id)).await
    }

    async fn delete_by_id(&self, collection: Collection, id: RecordId) -> StorageResult<()> {
        self.write(|db| db.delete_by_id(collection, id)).await
    }

    async fn clear_where_synced(&self, collection: Collection) -> StorageResult<usize> {
        self.write(|db| db.clear_where_synced(collection)).await
    }

    async fn clear_all(&self, collection: Collection) -> StorageResult<()> {
        self.write(|db| db.clear_all(collection)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(exercise: serde_json::Value) -> Payload {
        json!({ "uebung_id": exercise, "gewicht": "60", "wiederholungen": "8" })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_lazy_open() {
        let store = MemoryRecordStore::new();
        assert!(!store.is_open());

        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = MemoryRecordStore::new();
        store.open().await.unwrap();
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();
        store.open().await.unwrap();

        assert_eq!(store.count(Collection::TrainingData).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_close() {
        let store = MemoryRecordStore::new();
        let id = store.insert(Collection::TrainingData, set(json!(5))).await.unwrap();
        store.close().await.unwrap();
        assert!(!store.is_open());

        let record = store.get_by_id(Collection::TrainingData, id).await.unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryRecordStore::unavailable();
        let result = store.open().await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));

        let result = store.get_all(Collection::TrainingData).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));

        store.set_deny_access(false);
        assert!(store.open().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_sets_defaults() {
        let store = MemoryRecordStore::new();
        let id = store.insert(Collection::TrainingData, set(json!(3))).await.unwrap();

        let record = store
            .get_by_id(Collection::TrainingData, id)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.synced);
        assert!(record.timestamp > 0);
        assert_eq!(record.field("uebung_id"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_mark_synced_idempotent() {
        let store = MemoryRecordStore::new();
        let id = store.insert(Collection::TrainingData, set(json!(3))).await.unwrap();

        store.mark_synced(Collection::TrainingData, id).await.unwrap();
        let once = store.get_all(Collection::TrainingData).await.unwrap();

        store.mark_synced(Collection::TrainingData, id).await.unwrap();
        let twice = store.get_all(Collection::TrainingData).await.unwrap();

        assert_eq!(once, twice);
        assert!(twice[0].synced);
    }

    #[tokio::test]
    async fn test_mark_synced_missing_record() {
        let store = MemoryRecordStore::new();
        let result = store
            .mark_synced(Collection::TrainingData, RecordId::new(42))
            .await;
        assert!(matches!(result, Err(StorageError::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = MemoryRecordStore::new();
        let id = store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();

        store.delete_by_id(Collection::TrainingData, id).await.unwrap();
        assert_eq!(store.count(Collection::TrainingData).await.unwrap(), 0);

        let again = store.delete_by_id(Collection::TrainingData, id).await;
        assert!(matches!(again, Err(StorageError::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn test_clear_all_only_touches_one_collection() {
        let store = MemoryRecordStore::new();
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();
        store
            .put(
                Collection::Exercises,
                json!({"id": 1, "bezeichnung": "Bankdrücken"}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        store.clear_all(Collection::TrainingData).await.unwrap();
        assert_eq!(store.count(Collection::TrainingData).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Exercises).await.unwrap(), 1);
    }
}
