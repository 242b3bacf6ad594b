//! File-based record store implementation.
//!
//! This module provides `FileRecordStore`, a persistent implementation of the
//! `RecordStore` trait that keeps the whole database in one JSON document.
//!
//! # Directory Structure
//!
//! ```text
//! data/
//! └── HomeGymDB.json        # Versioned database document
//! ```
//!
//! # Durability
//!
//! Every mutation is applied to a copy of the database image, written to a
//! temporary file, synced and atomically renamed over the previous document.
//! Only after the rename succeeds does the in-memory image change, so a
//! failed write leaves both the file and the image untouched.
//!
//! # Example
//!
//! ```ignore
//! use offline_store::{Collection, FileRecordStore, RecordStore};
//!
//! let store = FileRecordStore::new("./data");
//! let id = store.insert(Collection::TrainingData, payload).await?;
//! // The record is on disk once `insert` returns.
//! ```

use crate::database::{now_millis, Database, DATABASE_NAME};
use crate::error::{StorageError, StorageResult};
use crate::record::{Collection, Payload, RecordId, StoredRecord};
use crate::storage::RecordStore;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File-based implementation of `RecordStore`
pub struct FileRecordStore {
    /// Directory holding the database document
    base_path: PathBuf,
    /// Database name, also the file stem
    name: String,
    /// Loaded image; `None` while closed
    db: Mutex<Option<Database>>,
}

impl FileRecordStore {
    /// Create a store under the given directory using the default database name
    ///
    /// Nothing is touched on disk until the store is opened.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self::with_name(base_path, DATABASE_NAME)
    }

    /// Create a store with a custom database name
    pub fn with_name(base_path: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            name: name.into(),
            db: Mutex::new(None),
        }
    }

    /// Path of the database document
    pub fn database_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.json", self.name))
    }

    /// Load the document from disk, creating or upgrading it as needed
    async fn load(&self) -> StorageResult<Database> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", self.base_path.display(), e)))?;

        let path = self.database_path();
        let mut db = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Database>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Database::empty(),
            Err(e) => {
                return Err(StorageError::Unavailable(format!("{}: {}", path.display(), e)));
            }
        };

        if db.needs_upgrade() {
            db.upgrade()?;
            self.persist(&db).await?;
        } else {
            // Rejects documents written by a newer schema
            db.upgrade()?;
        }

        tracing::debug!("[FileStore] Opened {} at version {}", path.display(), db.version());
        Ok(db)
    }

    /// Write the document through a temp file and an atomic rename
    async fn persist(&self, db: &Database) -> StorageResult<()> {
        let path = self.database_path();
        let temp_path = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(db)?;
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn read<R, F>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&Database) -> StorageResult<R> + Send,
    {
        let mut guard = self.db.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(StorageError::Unavailable("store is not open".to_string())),
        }
    }

    async fn write<R, F>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&mut Database) -> StorageResult<R> + Send,
        R: Send,
    {
        let mut guard = self.db.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let mut next = match guard.as_ref() {
            Some(db) => db.clone(),
            None => return Err(StorageError::Unavailable("store is not open".to_string())),
        };

        let result = f(&mut next)?;
        self.persist(&next).await?;
        *guard = Some(next);
        Ok(result)
    }
}

impl RecordStore for FileRecordStore {
    async fn open(&self) -> StorageResult<()> {
        self.read(|_| Ok(())).await
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self.db.lock().await;
        if guard.take().is_some() {
            tracing::debug!("[FileStore] Closed {}", self.database_path().display());
        }
        Ok(())
    }

    async fn insert(&self, collection: Collection, payload: Payload) -> StorageResult<RecordId> {
        let id = self
            .write(|db| db.insert(collection, payload, now_millis()))
            .await?;
        tracing::debug!("[FileStore] Saved to {}: {}", collection, id);
        Ok(id)
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
        self.write(|db| db.mark_synced(collection, id)).await?;
        tracing::debug!("[FileStore] Marked as synced: {}", id);
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: RecordId) -> StorageResult<()> {
        self.write(|db| db.delete_by_id(collection, id)).await?;
        tracing::debug!("[FileStore] Deleted {} from {}", id, collection);
        Ok(())
    }

    async fn clear_where_synced(&self, collection: Collection) -> StorageResult<usize> {
        let deleted = self.write(|db| db.clear_where_synced(collection)).await?;
        tracing::debug!("[FileStore] Cleared {} synced records from {}", deleted, collection);
        Ok(deleted)
    }

    async fn clear_all(&self, collection: Collection) -> StorageResult<()> {
        self.write(|db| db.clear_all(collection)).await?;
        tracing::debug!("[FileStore] Cleared all records from {}", collection);
        Ok(())
    }
}
