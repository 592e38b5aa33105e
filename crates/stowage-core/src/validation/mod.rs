//! Validation modules

pub mod filename;

pub use filename::{FilenameError, FilenamePolicy, ALLOWED_FILE_TYPES};
