#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-object-store")]
use crate::ObjectStoreStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use stowage_core::Config;

/// Create the configured storage backend. Called once at startup.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-object-store")]
        StorageBackend::ObjectStore => {
            let settings = config.object_store().ok_or_else(|| {
                StorageError::ConfigError("OBJECT_STORE_BUCKET not configured".to_string())
            })?;

            let storage = ObjectStoreStorage::new_s3(&settings)?;
            tracing::info!(
                bucket = %settings.bucket,
                region = %settings.region,
                endpoint = ?settings.endpoint,
                "Using object store backend"
            );
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-object-store"))]
        StorageBackend::ObjectStore => Err(StorageError::ConfigError(
            "Object store backend not available (storage-object-store feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, config.local_public_base_url()).await?;
            tracing::info!(path = %base_path, "Using local storage backend");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
