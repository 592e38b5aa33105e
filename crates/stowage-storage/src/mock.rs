//! In-memory storage for testing without a filesystem or network

use crate::keys::validate_key;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::{StorageBackend, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock storage holding objects in a map.
///
/// Behaves like the local backend (direct reads allowed) unless built with
/// `object_store_like`, in which case reads return `Unsupported`.
#[derive(Clone)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, (Bytes, DateTime<Utc>)>>>,
    backend: StorageBackend,
    fail_puts: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    collide_puts: Arc<AtomicUsize>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            backend: StorageBackend::Local,
            fail_puts: Arc::new(AtomicBool::new(false)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
            collide_puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn object_store_like() -> Self {
        Self {
            backend: StorageBackend::ObjectStore,
            ..Self::new()
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, (Bytes, DateTime<Utc>)>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an object directly with an explicit modification time.
    pub fn insert(&self, key: &str, data: Bytes, last_modified: DateTime<Utc>) {
        self.objects().insert(key.to_string(), (data, last_modified));
    }

    /// Drop an object behind the caller's back.
    pub fn remove(&self, key: &str) {
        self.objects().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// The next `count` puts report `AlreadyExists`, as if the key were taken.
    pub fn collide_next_puts(&self, count: usize) {
        self.collide_puts.store(count, Ordering::SeqCst);
    }

    fn read(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        if self.backend == StorageBackend::ObjectStore {
            return Err(StorageError::Unsupported(
                "direct reads are not served by this backend".to_string(),
            ));
        }
        self.objects()
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put(&self, storage_key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout(format!("put {}", storage_key)));
        }
        let collided = self
            .collide_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut objects = self.objects();
        if collided || objects.contains_key(storage_key) {
            return Err(StorageError::AlreadyExists(storage_key.to_string()));
        }
        objects.insert(storage_key.to_string(), (data, Utc::now()));
        Ok(())
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Bytes> {
        self.read(storage_key)
    }

    async fn get_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let data = self.read(storage_key)?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!("delete {}", storage_key)));
        }
        self.objects()
            .remove(storage_key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    fn locate(&self, storage_key: &str) -> String {
        format!("mock://{}", storage_key)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        Ok(self.contains(storage_key))
    }

    async fn list_objects(&self) -> StorageResult<Vec<StoredObject>> {
        let mut objects: Vec<StoredObject> = self
            .objects()
            .iter()
            .map(|(key, (data, last_modified))| StoredObject {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: *last_modified,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
