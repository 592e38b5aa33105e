//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::{StorageBackend, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use stowage_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Storage operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether a caller may reasonably retry the operation later.
    ///
    /// Only network-level failures of the object store qualify; local disk
    /// errors and configuration problems do not go away on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::BackendError(_) | StorageError::Timeout(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::AlreadyExists(key) => AppError::DuplicateKey(key),
            StorageError::Unsupported(msg) => AppError::UnsupportedOperation(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::BackendUnavailable {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Both backends (local filesystem, object store) implement this trait and
/// are used as `Arc<dyn Storage>`. The backend is picked once at startup, so
/// callers never branch on the concrete type.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under a new `storage_key`. `content_type` is recorded as
    /// object metadata where the backend supports it.
    ///
    /// Existing bytes are never overwritten: a taken key fails with
    /// `StorageError::AlreadyExists`.
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Read a whole file.
    ///
    /// The object store does not serve bytes directly and returns
    /// `StorageError::Unsupported`; clients fetch from `locate` instead.
    async fn get(&self, storage_key: &str) -> StorageResult<Bytes>;

    /// Read a file as a stream. Same support rules as `get`.
    async fn get_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete a file. Returns `StorageError::NotFound` when nothing was stored
    /// under the key.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Resolvable URL for a key. Pure; performs no I/O.
    fn locate(&self, storage_key: &str) -> String;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Every object currently held by the backend (used by reconciliation).
    async fn list_objects(&self) -> StorageResult<Vec<StoredObject>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::ErrorMetadata;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: AppError = StorageError::NotFound("abc_photo.png".to_string()).into();
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_already_exists_maps_to_duplicate_key() {
        let err: AppError = StorageError::AlreadyExists("abc_photo.png".to_string()).into();
        assert!(matches!(err, AppError::DuplicateKey(ref key) if key == "abc_photo.png"));
    }

    #[test]
    fn test_unsupported_maps_to_unsupported_operation() {
        let err: AppError = StorageError::Unsupported("direct read".to_string()).into();
        assert!(matches!(err, AppError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_timeouts_are_retryable_backend_errors() {
        let err: AppError = StorageError::Timeout("put abc after 3 attempts".to_string()).into();
        assert!(matches!(
            err,
            AppError::BackendUnavailable {
                retryable: true,
                ..
            }
        ));
    }

    #[test]
    fn test_local_io_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = StorageError::IoError(io).into();
        assert!(matches!(
            err,
            AppError::BackendUnavailable {
                retryable: false,
                ..
            }
        ));
        assert!(err.is_sensitive());
    }
}
