//! Upload record store

#[cfg(any(test, feature = "test-helpers"))]
mod memory;
mod postgres;

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::InMemoryUploadRecordStore;
pub use postgres::{PgUploadRecordRepository, UploadRow};

use async_trait::async_trait;
use stowage_core::{AppError, NewUploadRecord, UploadRecord};

/// Durable metadata index keyed by storage key.
#[async_trait]
pub trait UploadRecordStore: Send + Sync {
    /// Insert a record. Fails with `AppError::DuplicateKey` when the storage
    /// key is already taken.
    async fn create(&self, record: NewUploadRecord) -> Result<UploadRecord, AppError>;

    async fn get_by_storage_key(&self, storage_key: &str)
        -> Result<Option<UploadRecord>, AppError>;

    /// All records, oldest first.
    async fn list_all(&self) -> Result<Vec<UploadRecord>, AppError>;

    /// Remove a record. Fails with `AppError::NotFound` when no row matched.
    async fn delete(&self, storage_key: &str) -> Result<(), AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}
