use crate::keys::validate_key;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::{StorageBackend, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, ObjectStoreExt,
    PutMode, PutOptions, PutPayload, RetryConfig,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stowage_core::ObjectStoreSettings;

/// Bounded retry for object-store calls.
///
/// Each attempt is capped by `attempt_timeout`. Timeouts and transport errors
/// are retried with exponential backoff; `NotFound` and permission errors are
/// returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ObjectStoreSettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(settings.timeout_secs),
            ..Default::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// S3-compatible object storage implementation
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_url: String,
    retry: RetryPolicy,
}

impl ObjectStoreStorage {
    /// Connect to an S3 bucket, or any S3-compatible provider when
    /// `settings.endpoint` is set (e.g., "http://localhost:9000" for MinIO).
    ///
    /// Explicit credentials take precedence; otherwise the usual `AWS_*`
    /// environment variables are used.
    pub fn new_s3(settings: &ObjectStoreSettings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(settings.region.clone())
            .with_bucket_name(settings.bucket.clone())
            .with_client_options(
                ClientOptions::new().with_timeout(Duration::from_secs(settings.timeout_secs)),
            )
            // Retries are driven by `RetryPolicy` so attempts stay bounded and logged in one place.
            .with_retry(RetryConfig {
                max_retries: 0,
                ..Default::default()
            });

        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            builder = builder
                .with_access_key_id(access_key.clone())
                .with_secret_access_key(secret_key.clone());
        }

        if let Some(ref endpoint) = settings.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::with_store(Arc::new(store), settings))
    }

    /// Wrap an existing store (e.g. `object_store::memory::InMemory` in tests).
    pub fn with_store(store: Arc<dyn ObjectStore>, settings: &ObjectStoreSettings) -> Self {
        ObjectStoreStorage {
            store,
            bucket: settings.bucket.clone(),
            base_url: Self::base_url(settings),
            retry: RetryPolicy::from_settings(settings),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base of every `locate` URL.
    ///
    /// * `public_url` set: `{public_url}`
    /// * `endpoint` set: `{endpoint}/{bucket}` (path style)
    /// * otherwise: `https://{bucket}.s3.amazonaws.com`
    fn base_url(settings: &ObjectStoreSettings) -> String {
        if let Some(ref public_url) = settings.public_url {
            public_url.trim_end_matches('/').to_string()
        } else if let Some(ref endpoint) = settings.endpoint {
            format!("{}/{}", endpoint.trim_end_matches('/'), settings.bucket)
        } else {
            format!("https://{}.s3.amazonaws.com", settings.bucket)
        }
    }

    fn classify(err: ObjectStoreError, storage_key: &str) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            ObjectStoreError::AlreadyExists { .. } => {
                StorageError::AlreadyExists(storage_key.to_string())
            }
            ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
                StorageError::ConfigError(err.to_string())
            }
            ObjectStoreError::NotSupported { .. } => StorageError::Unsupported(err.to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }

    /// Run `op` under the retry policy.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        storage_key: &str,
        op: F,
    ) -> StorageResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ObjectStoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.retry.attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => Self::classify(e, storage_key),
                Err(_) => StorageError::Timeout(format!(
                    "{} {} exceeded {:?} after {} attempt(s)",
                    operation, storage_key, self.retry.attempt_timeout, attempt
                )),
            };

            if !err.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = self.retry.backoff(attempt);
            tracing::warn!(
                error = %err,
                bucket = %self.bucket,
                key = %storage_key,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Object store operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let location = Path::from(storage_key);
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            mode: PutMode::Create,
            attributes,
            ..Default::default()
        };

        let result = self
            .with_retry("put", storage_key, || {
                self.store.put_opts(
                    &location,
                    PutPayload::from(data.clone()),
                    options.clone(),
                )
            })
            .await;

        if let Err(ref e) = result {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store put failed"
            );
        }
        result?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store put successful"
        );

        Ok(())
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Bytes> {
        validate_key(storage_key)?;
        Err(StorageError::Unsupported(format!(
            "direct reads are not served by the object store; fetch {}",
            self.locate(storage_key)
        )))
    }

    async fn get_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        validate_key(storage_key)?;
        Err(StorageError::Unsupported(format!(
            "direct reads are not served by the object store; fetch {}",
            self.locate(storage_key)
        )))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key);
        let start = std::time::Instant::now();

        // S3 deletes are idempotent, so probe first to report missing objects.
        self.with_retry("head", storage_key, || self.store.head(&location))
            .await?;

        let result = self
            .with_retry("delete", storage_key, || self.store.delete(&location))
            .await;

        if let Err(ref e) = result {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store delete failed"
            );
        }
        result?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store delete successful"
        );

        Ok(())
    }

    fn locate(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(storage_key))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key);
        match self
            .with_retry("head", storage_key, || self.store.head(&location))
            .await
        {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_objects(&self) -> StorageResult<Vec<StoredObject>> {
        let metas = self
            .with_retry("list", "*", || {
                self.store.list(None).try_collect::<Vec<_>>()
            })
            .await?;

        let mut objects: Vec<StoredObject> = metas
            .into_iter()
            .map(|meta| StoredObject {
                key: meta.location.to_string(),
                size: meta.size,
                last_modified: meta.last_modified,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::ObjectStore
    }
}

#[cfg(all(test, feature = "storage-object-store"))]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings() -> ObjectStoreSettings {
        ObjectStoreSettings {
            bucket: "stowage-test".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            public_url: None,
            access_key: None,
            secret_key: None,
            timeout_secs: 5,
            max_attempts: 3,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(50),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn in_memory() -> (Arc<InMemory>, ObjectStoreStorage) {
        let memory = Arc::new(InMemory::new());
        let storage = ObjectStoreStorage::with_store(memory.clone(), &settings());
        (memory, storage)
    }

    #[test]
    fn test_locate_default_template() {
        let (_, storage) = in_memory();
        assert_eq!(
            storage.locate("abc_report.pdf"),
            "https://stowage-test.s3.amazonaws.com/abc_report.pdf"
        );
    }

    #[test]
    fn test_locate_with_endpoint_and_public_url() {
        let mut with_endpoint = settings();
        with_endpoint.endpoint = Some("http://localhost:9000/".to_string());
        let storage = ObjectStoreStorage::with_store(Arc::new(InMemory::new()), &with_endpoint);
        assert_eq!(
            storage.locate("abc_report.pdf"),
            "http://localhost:9000/stowage-test/abc_report.pdf"
        );

        let mut with_public = with_endpoint.clone();
        with_public.public_url = Some("https://cdn.example.com/files/".to_string());
        let storage = ObjectStoreStorage::with_store(Arc::new(InMemory::new()), &with_public);
        assert_eq!(
            storage.locate("abc_report.pdf"),
            "https://cdn.example.com/files/abc_report.pdf"
        );
    }

    #[tokio::test]
    async fn test_put_sets_content_type() {
        let (memory, storage) = in_memory();

        storage
            .put(
                "abc_report.pdf",
                Bytes::from_static(b"%PDF-1.7"),
                "application/pdf",
            )
            .await
            .unwrap();

        let result = memory.get(&Path::from("abc_report.pdf")).await.unwrap();
        assert_eq!(
            result.attributes.get(&Attribute::ContentType),
            Some(&AttributeValue::from("application/pdf".to_string()))
        );
        assert_eq!(result.bytes().await.unwrap().as_ref(), b"%PDF-1.7");
        assert!(storage.exists("abc_report.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let (memory, storage) = in_memory();

        storage
            .put("k_photo.png", Bytes::from_static(b"original"), "image/png")
            .await
            .unwrap();
        let second = storage
            .put("k_photo.png", Bytes::from_static(b"colliding-upload"), "image/png")
            .await;

        assert!(matches!(second, Err(StorageError::AlreadyExists(ref key)) if key == "k_photo.png"));
        let stored = memory.get(&Path::from("k_photo.png")).await.unwrap();
        assert_eq!(stored.bytes().await.unwrap().as_ref(), b"original");
    }

    #[tokio::test]
    async fn test_direct_reads_unsupported() {
        let (_, storage) = in_memory();
        storage
            .put("abc_photo.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert!(matches!(
            storage.get("abc_photo.png").await,
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            storage.get_stream("abc_photo.png").await,
            Err(StorageError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let (_, storage) = in_memory();
        storage
            .put("abc_photo.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        storage.delete("abc_photo.png").await.unwrap();
        assert!(!storage.exists("abc_photo.png").await.unwrap());
        assert!(matches!(
            storage.delete("abc_photo.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_objects() {
        let (_, storage) = in_memory();
        for key in ["b_two.gif", "a_one.png"] {
            storage
                .put(key, Bytes::from_static(b"1234"), "image/png")
                .await
                .unwrap();
        }

        let objects = storage.list_objects().await.unwrap();
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a_one.png", "b_two.gif"]);
        assert!(objects.iter().all(|o| o.size == 4));
    }

    #[tokio::test]
    async fn test_retry_exhausts_on_backend_errors() {
        let (_, storage) = in_memory();
        let storage = storage.with_retry_policy(fast_retry());
        let calls = AtomicU32::new(0);

        let result: StorageResult<()> = storage
            .with_retry("put", "abc_photo.png", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ObjectStoreError::Generic {
                        store: "test",
                        source: "connection reset".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(StorageError::BackendError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_error() {
        let (_, storage) = in_memory();
        let storage = storage.with_retry_policy(fast_retry());
        let calls = AtomicU32::new(0);

        let result = storage
            .with_retry("put", "abc_photo.png", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ObjectStoreError::Generic {
                            store: "test",
                            source: "connection reset".into(),
                        })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_times_out() {
        let (_, storage) = in_memory();
        let storage = storage.with_retry_policy(fast_retry());
        let calls = AtomicU32::new(0);

        let result: StorageResult<()> = storage
            .with_retry("put", "abc_photo.png", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let (_, storage) = in_memory();
        let storage = storage.with_retry_policy(fast_retry());
        let calls = AtomicU32::new(0);

        let result: StorageResult<()> = storage
            .with_retry("head", "abc_photo.png", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ObjectStoreError::NotFound {
                        path: "abc_photo.png".to_string(),
                        source: "missing".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(10), Duration::from_secs(2));
    }
}
