//! In-memory image of the versioned database.
//!
//! Both store backends keep one `Database` behind an async mutex and apply
//! every operation to it. The file backend additionally writes the image to
//! disk after each mutation.

use crate::error::{StorageError, StorageResult};
use crate::record::{Collection, KeyRule, Payload, RecordId, StoredRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fixed database name
pub const DATABASE_NAME: &str = "HomeGymDB";

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Records and key bookkeeping for one collection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct CollectionData {
    /// Next surrogate key; only ever grows
    next_id: u64,
    /// Last timestamp handed out, keeps insert order monotonic
    last_timestamp: i64,
    /// Secondary lookups declared at creation
    indexes: Vec<String>,
    /// Records ordered by key
    records: BTreeMap<u64, StoredRecord>,
}

impl CollectionData {
    fn new(collection: Collection) -> Self {
        Self {
            next_id: 1,
            last_timestamp: 0,
            indexes: collection.indexes().iter().map(|s| s.to_string()).collect(),
            records: BTreeMap::new(),
        }
    }

    /// Issue a timestamp that never goes backwards
    fn issue_timestamp(&mut self, now: i64) -> i64 {
        let ts = now.max(self.last_timestamp);
        self.last_timestamp = ts;
        ts
    }
}

/// The full persisted database
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Database {
    name: String,
    version: u32,
    collections: BTreeMap<String, CollectionData>,
}

impl Database {
    /// Create an empty database at version 0; `upgrade` creates the collections
    pub(crate) fn empty() -> Self {
        Self {
            name: DATABASE_NAME.to_string(),
            version: 0,
            collections: BTreeMap::new(),
        }
    }

    pub(crate) fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn needs_upgrade(&self) -> bool {
        self.version < SCHEMA_VERSION
    }

    /// Bring the schema to `SCHEMA_VERSION`
    ///
    /// Creates any collection that does not exist yet. Existing collections
    /// and their records are kept.
    pub(crate) fn upgrade(&mut self) -> StorageResult<()> {
        if self.version > SCHEMA_VERSION {
            return Err(StorageError::VersionMismatch {
                stored: self.version,
                supported: SCHEMA_VERSION,
            });
        }
        if self.version == SCHEMA_VERSION {
            return Ok(());
        }

        for collection in Collection::ALL {
            if !self.collections.contains_key(collection.name()) {
                self.collections
                    .insert(collection.name().to_string(), CollectionData::new(collection));
            }
        }

        tracing::info!(
            "[{}] Database upgraded from version {} to {}",
            self.name,
            self.version,
            SCHEMA_VERSION
        );
        self.version = SCHEMA_VERSION;
        Ok(())
    }

    fn data(&self, collection: Collection) -> StorageResult<&CollectionData> {
        self.collections
            .get(collection.name())
            .ok_or_else(|| StorageError::UnknownCollection(collection.name().to_string()))
    }

    fn data_mut(&mut self, collection: Collection) -> StorageResult<&mut CollectionData> {
        self.collections
            .get_mut(collection.name())
            .ok_or_else(|| StorageError::UnknownCollection(collection.name().to_string()))
    }

    pub(crate) fn insert(
        &mut self,
        collection: Collection,
        mut payload: Payload,
        now: i64,
    ) -> StorageResult<RecordId> {
        let key = inline_key(collection, &mut payload)?;
        strip_reserved(&mut payload);

        let data = self.data_mut(collection)?;
        let id = match key {
            Some(id) => {
                if data.records.contains_key(&id.value()) {
                    return Err(StorageError::DuplicateKey {
                        collection: collection.name().to_string(),
                        id,
                    });
                }
                id
            }
            None => {
                let id = RecordId::new(data.next_id);
                data.next_id += 1;
                id
            }
        };

        let timestamp = data.issue_timestamp(now);
        data.records.insert(
            id.value(),
            StoredRecord {
                id,
                timestamp,
                synced: false,
                payload,
            },
        );
        Ok(id)
    }

    pub(crate) fn put(
        &mut self,
        collection: Collection,
        mut payload: Payload,
        now: i64,
    ) -> StorageResult<RecordId> {
        let id = inline_key(collection, &mut payload)?.ok_or_else(|| {
            StorageError::InvalidOperation(format!(
                "put requires an inline key, {} uses auto-increment keys",
                collection
            ))
        })?;
        strip_reserved(&mut payload);

        let data = self.data_mut(collection)?;
        let timestamp = data.issue_timestamp(now);
        data.records.insert(
            id.value(),
            StoredRecord {
                id,
                timestamp,
                synced: false,
                payload,
            },
        );
        Ok(id)
    }

    pub(crate) fn get_all(&self, collection: Collection) -> StorageResult<Vec<StoredRecord>> {
        Ok(self.data(collection)?.records.values().cloned().collect())
    }

    pub(crate) fn get_by_id(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> StorageResult<Option<StoredRecord>> {
        Ok(self.data(collection)?.records.get(&id.value()).cloned())
    }

    pub(crate) fn filter_by_synced(
        &self,
        collection: Collection,
        synced: bool,
    ) -> StorageResult<Vec<StoredRecord>> {
        Ok(self
            .data(collection)?
            .records
            .values()
            .filter(|record| record.synced == synced)
            .cloned()
            .collect())
    }

    pub(crate) fn count(&self, collection: Collection) -> StorageResult<usize> {
        Ok(self.data(collection)?.records.len())
    }

    pub(crate) fn mark_synced(&mut self, collection: Collection, id: RecordId) -> StorageResult<()> {
        let data = self.data_mut(collection)?;
        let record = data
            .records
            .get_mut(&id.value())
            .ok_or_else(|| StorageError::RecordNotFound {
                collection: collection.name().to_string(),
                id,
            })?;
        record.synced = true;
        Ok(())
    }

    pub(crate) fn delete_by_id(&mut self, collection: Collection, id: RecordId) -> StorageResult<()> {
        let data = self.data_mut(collection)?;
        data.records
            .remove(&id.value())
            .map(|_| ())
            .ok_or_else(|| StorageError::RecordNotFound {
                collection: collection.name().to_string(),
                id,
            })
    }

    pub(crate) fn clear_where_synced(&mut self, collection: Collection) -> StorageResult<usize> {
        let data = self.data_mut(collection)?;
        let before = data.records.len();
        data.records.retain(|_, record| !record.synced);
        Ok(before - data.records.len())
    }

    pub(crate) fn clear_all(&mut self, collection: Collection) -> StorageResult<()> {
        self.data_mut(collection)?.records.clear();
        Ok(())
    }
}

/// Extract the key of an inline-keyed record, `None` for auto-increment
fn inline_key(collection: Collection, payload: &mut Payload) -> StorageResult<Option<RecordId>> {
    match collection.key_rule() {
        KeyRule::AutoIncrement => Ok(None),
        KeyRule::Inline(field) => {
            let missing = || StorageError::MissingKey {
                collection: collection.name().to_string(),
                field: field.to_string(),
            };
            let id = match payload.remove(field) {
                Some(Value::Number(n)) => n.as_u64().ok_or_else(missing)?,
                Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| missing())?,
                _ => return Err(missing()),
            };
            Ok(Some(RecordId::new(id)))
        }
    }
}

fn strip_reserved(payload: &mut Payload) {
    for field in StoredRecord::RESERVED_FIELDS {
        payload.remove(field);
    }
}

/// Current wall-clock time in milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_db() -> Database {
        let mut db = Database::empty();
        db.upgrade().unwrap();
        db
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_upgrade_creates_collections() {
        let db = open_db();
        assert_eq!(db.version(), SCHEMA_VERSION);
        for collection in Collection::ALL {
            assert_eq!(db.count(collection).unwrap(), 0);
        }
    }

    #[test]
    fn test_upgrade_rejects_newer_schema() {
        let mut db = Database::empty();
        db.version = SCHEMA_VERSION + 1;
        assert!(matches!(
            db.upgrade(),
            Err(StorageError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut db = open_db();
        let a = db.insert(Collection::TrainingData, payload(json!({"uebung_id": 1})), 10).unwrap();
        let b = db.insert(Collection::TrainingData, payload(json!({"uebung_id": 2})), 11).unwrap();
        db.delete_by_id(Collection::TrainingData, b).unwrap();
        let c = db.insert(Collection::TrainingData, payload(json!({"uebung_id": 3})), 12).unwrap();

        assert_eq!(a, RecordId::new(1));
        assert_eq!(b, RecordId::new(2));
        assert_eq!(c, RecordId::new(3));
    }

    #[test]
    fn test_timestamp_never_goes_backwards() {
        let mut db = open_db();
        let a = db.insert(Collection::TrainingData, Payload::new(), 500).unwrap();
        let b = db.insert(Collection::TrainingData, Payload::new(), 100).unwrap();

        let first = db.get_by_id(Collection::TrainingData, a).unwrap().unwrap();
        let second = db.get_by_id(Collection::TrainingData, b).unwrap().unwrap();
        assert_eq!(first.timestamp, 500);
        assert_eq!(second.timestamp, 500);
    }

    #[test]
    fn test_insert_strips_reserved_fields() {
        let mut db = open_db();
        let id = db
            .insert(
                Collection::TrainingData,
                payload(json!({"id": 99, "synced": true, "timestamp": 1, "uebung_id": 4})),
                42,
            )
            .unwrap();

        let record = db.get_by_id(Collection::TrainingData, id).unwrap().unwrap();
        assert_eq!(record.id, RecordId::new(1));
        assert!(!record.synced);
        assert_eq!(record.timestamp, 42);
        assert_eq!(record.payload.len(), 1);
    }

    #[test]
    fn test_inline_key_collections() {
        let mut db = open_db();
        let id = db
            .insert(Collection::Exercises, payload(json!({"id": 17, "name": "Squat"})), 1)
            .unwrap();
        assert_eq!(id, RecordId::new(17));

        let dup = db.insert(Collection::Exercises, payload(json!({"id": 17})), 2);
        assert!(matches!(dup, Err(StorageError::DuplicateKey { .. })));

        let missing = db.insert(Collection::Plans, payload(json!({"name": "Push"})), 3);
        assert!(matches!(missing, Err(StorageError::MissingKey { .. })));

        db.put(Collection::Exercises, payload(json!({"id": 17, "name": "Front Squat"})), 4)
            .unwrap();
        let record = db.get_by_id(Collection::Exercises, id).unwrap().unwrap();
        assert_eq!(record.field("name"), Some(&json!("Front Squat")));
    }

    #[test]
    fn test_put_rejects_auto_increment() {
        let mut db = open_db();
        let result = db.put(Collection::TrainingData, payload(json!({"id": 1})), 0);
        assert!(matches!(result, Err(StorageError::InvalidOperation(_))));
    }

    #[test]
    fn test_clear_where_synced() {
        let mut db = open_db();
        let a = db.insert(Collection::TrainingData, Payload::new(), 1).unwrap();
        let _b = db.insert(Collection::TrainingData, Payload::new(), 2).unwrap();
        let c = db.insert(Collection::TrainingData, Payload::new(), 3).unwrap();
        db.mark_synced(Collection::TrainingData, a).unwrap();
        db.mark_synced(Collection::TrainingData, c).unwrap();

        assert_eq!(db.clear_where_synced(Collection::TrainingData).unwrap(), 2);
        let remaining = db.get_all(Collection::TrainingData).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining[0].synced);
    }
}
