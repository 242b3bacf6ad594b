//! Offline Store - durable keyed storage for data logged while offline
//!
//! This crate keeps workout sets (and cached exercise and plan definitions)
//! on the device until the server has acknowledged them. Records live in
//! named collections of a versioned database; training records get a
//! surrogate key that is never reused and a timestamp that never goes
//! backwards.
//!
//! # Modules
//!
//! - `record`: Record, key and collection types
//! - `storage`: The `RecordStore` trait
//! - `memory_store`: In-memory backend for tests
//! - `file_store`: Durable JSON-document backend
//! - `error`: Error types for storage operations

mod database;
pub mod error;
pub mod file_store;
pub mod memory_store;
pub mod record;
pub mod storage;

pub use database::{DATABASE_NAME, SCHEMA_VERSION};
pub use error::{StorageError, StorageResult};
pub use file_store::FileRecordStore;
pub use memory_store::MemoryRecordStore;
pub use record::{Collection, KeyRule, Payload, RecordId, StoredRecord};
pub use storage::RecordStore;
