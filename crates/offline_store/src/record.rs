//! Record and collection types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque application data carried by a record
pub type Payload = Map<String, Value>;

/// Key of a stored record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Create a record id from its raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A record as held by the store
///
/// On the wire the payload fields sit next to `id`, `timestamp` and `synced`
/// in one flat JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Key assigned by the store (or taken from the payload for inline keys)
    pub id: RecordId,
    /// Insert time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Whether the server has acknowledged this record
    pub synced: bool,
    /// Application data
    #[serde(flatten)]
    pub payload: Payload,
}

impl StoredRecord {
    /// Field names owned by the store; stripped from incoming payloads
    pub const RESERVED_FIELDS: [&'static str; 3] = ["id", "timestamp", "synced"];

    /// Look up a payload field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// How records of a collection are keyed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRule {
    /// Surrogate key issued by the store, never reused
    AutoIncrement,
    /// Key read from the named payload field
    Inline(&'static str),
}

/// Named collections of the store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Workout sets logged on this device
    TrainingData,
    /// Cached exercise definitions
    Exercises,
    /// Cached plan definitions
    Plans,
}

impl Collection {
    /// Every collection created by the current schema
    pub const ALL: [Collection; 3] = [
        Collection::TrainingData,
        Collection::Exercises,
        Collection::Plans,
    ];

    /// Stable name used in the persisted layout
    pub fn name(&self) -> &'static str {
        match self {
            Collection::TrainingData => "trainingData",
            Collection::Exercises => "exercises",
            Collection::Plans => "plans",
        }
    }

    /// Keying rule for this collection
    pub fn key_rule(&self) -> KeyRule {
        match self {
            Collection::TrainingData => KeyRule::AutoIncrement,
            Collection::Exercises | Collection::Plans => KeyRule::Inline("id"),
        }
    }

    /// Secondary lookups maintained for this collection
    pub fn indexes(&self) -> &'static [&'static str] {
        match self {
            Collection::TrainingData => &["timestamp", "synced"],
            Collection::Exercises | Collection::Plans => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
