use chrono::{DateTime, Utc};
use serde::Serialize;

use super::upload::UploadRecord;

/// An object found in a storage backend listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// A violation of the record/blob existence invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// Bytes in the backend with no record.
    OrphanedBlob(StoredObject),
    /// A record whose bytes are missing from the backend.
    DanglingRecord(UploadRecord),
}

impl Inconsistency {
    pub fn storage_key(&self) -> &str {
        match self {
            Inconsistency::OrphanedBlob(object) => &object.key,
            Inconsistency::DanglingRecord(record) => &record.storage_key,
        }
    }
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub orphans_removed: usize,
    pub dangling_removed: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.orphans_removed == 0 && self.dangling_removed == 0 && self.failures == 0
    }
}
