//! In-memory record store for testing without a database

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stowage_core::{AppError, NewUploadRecord, UploadRecord};
use uuid::Uuid;

use super::UploadRecordStore;

/// Mock record store keyed by storage key.
///
/// `fail_creates` / `fail_deletes` make the next calls fail with a database
/// style error so callers can exercise partial-failure paths.
/// `collide_next_creates(n)` makes the next `n` creates report `DuplicateKey`.
#[derive(Clone, Default)]
pub struct InMemoryUploadRecordStore {
    records: Arc<Mutex<HashMap<String, UploadRecord>>>,
    fail_creates: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    collide_creates: Arc<AtomicUsize>,
}

impl InMemoryUploadRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, UploadRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record as-is (bypasses duplicate checks and failure flags).
    pub fn insert(&self, record: UploadRecord) {
        self.records().insert(record.storage_key.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn collide_next_creates(&self, count: usize) {
        self.collide_creates.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadRecordStore for InMemoryUploadRecordStore {
    async fn create(&self, record: NewUploadRecord) -> Result<UploadRecord, AppError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("record store unavailable".to_string()));
        }

        let collided = self
            .collide_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut records = self.records();
        if collided || records.contains_key(&record.storage_key) {
            return Err(AppError::DuplicateKey(record.storage_key));
        }

        let created = UploadRecord {
            id: Uuid::new_v4(),
            original_filename: record.original_filename,
            storage_key: record.storage_key,
            uploaded_at: Utc::now(),
        };
        records.insert(created.storage_key.clone(), created.clone());
        Ok(created)
    }

    async fn get_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<UploadRecord>, AppError> {
        Ok(self.records().get(storage_key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<UploadRecord>, AppError> {
        let mut all: Vec<UploadRecord> = self.records().values().cloned().collect();
        all.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }

    async fn delete(&self, storage_key: &str) -> Result<(), AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("record store unavailable".to_string()));
        }

        self.records()
            .remove(storage_key)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Upload not found: {}", storage_key)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(key: &str) -> NewUploadRecord {
        NewUploadRecord {
            original_filename: "report.pdf".to_string(),
            storage_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = InMemoryUploadRecordStore::new();
        let a = store.create(new_record("a_report.pdf")).await.unwrap();
        let b = store.create(new_record("b_report.pdf")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(
            store.get_by_storage_key("a_report.pdf").await.unwrap(),
            Some(a)
        );
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = InMemoryUploadRecordStore::new();
        store.create(new_record("a_report.pdf")).await.unwrap();

        assert!(matches!(
            store.create(new_record("a_report.pdf")).await,
            Err(AppError::DuplicateKey(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_collide_next_creates() {
        let store = InMemoryUploadRecordStore::new();
        store.collide_next_creates(2);

        assert!(matches!(
            store.create(new_record("a_report.pdf")).await,
            Err(AppError::DuplicateKey(_))
        ));
        assert!(matches!(
            store.create(new_record("b_report.pdf")).await,
            Err(AppError::DuplicateKey(_))
        ));
        store.create(new_record("c_report.pdf")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = InMemoryUploadRecordStore::new();
        assert!(matches!(
            store.delete("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_flags() {
        let store = InMemoryUploadRecordStore::new();
        store.create(new_record("a_report.pdf")).await.unwrap();

        store.fail_creates(true);
        assert!(store.create(new_record("b_report.pdf")).await.is_err());

        store.fail_deletes(true);
        assert!(store.delete("a_report.pdf").await.is_err());
        store.fail_deletes(false);
        store.delete("a_report.pdf").await.unwrap();
        assert!(store.is_empty());
    }
}
