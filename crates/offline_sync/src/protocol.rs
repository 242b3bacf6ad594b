//! Wire types of the sync endpoint and the pass report.

use offline_store::RecordId;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Outcome of one submitted record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Local id of the record
    pub id: RecordId,
    /// Whether the server stored the record
    pub success: bool,
    /// Reason for a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordOutcome {
    pub fn accepted(id: RecordId) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    pub fn rejected(id: RecordId, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Body of a successful sync response
///
/// Unknown fields (e.g. the server-side ids of created sets) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub synced_count: usize,
    #[serde(default)]
    pub results: Vec<RecordOutcome>,
}

impl SyncResponse {
    /// Build a response from per-record outcomes
    pub fn from_outcomes(results: Vec<RecordOutcome>) -> Self {
        let synced_count = results.iter().filter(|r| r.success).count();
        Self {
            success: true,
            synced_count,
            results,
        }
    }
}

/// Counts of one sync pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records acknowledged and marked synced
    pub synced: usize,
    /// Records the server rejected; they stay unsynced
    pub failed: usize,
    /// Invalid records purged without being sent
    pub skipped: usize,
}

impl SyncReport {
    /// Whether the pass touched nothing worth reporting
    pub fn is_empty(&self) -> bool {
        self.synced == 0 && self.failed == 0
    }
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.synced += other.synced;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// How a pass request ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran; counts cover every round it ran
    Completed(SyncReport),
    /// Another pass was running and will pick up this request
    Coalesced,
}

/// Events published by background passes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEvent {
    /// A background pass synchronized records
    SyncComplete { synced_count: usize },
}
