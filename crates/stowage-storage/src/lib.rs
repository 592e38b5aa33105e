//! Stowage Storage Library
//!
//! The `Storage` trait and its two implementations: a local filesystem
//! directory and an S3-compatible object store.
//!
//! # Storage key format
//!
//! Keys form a flat namespace: a single path component made of
//! `[A-Za-z0-9._-]`, as produced by the filename policy in `stowage-core`.
//! Keys containing `..`, path separators or control characters are rejected by
//! every backend before any I/O happens.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
#[cfg(feature = "storage-object-store")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockStorage;
#[cfg(feature = "storage-object-store")]
pub use s3::{ObjectStoreStorage, RetryPolicy};
pub use stowage_core::{StorageBackend, StoredObject};
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
