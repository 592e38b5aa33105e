//! Stowage Core Library
//!
//! Domain models, error types, configuration and the filename policy shared by
//! the storage, database, API and CLI crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, LogFormat, ObjectStoreSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    Inconsistency, NewUploadRecord, StoredObject, SweepReport, UploadRecord, UploadResponse,
};
pub use storage_types::StorageBackend;
pub use validation::{FilenameError, FilenamePolicy};
