//! Error types module
//!
//! All request-level failures are unified under `AppError`. Each variant
//! self-describes its HTTP presentation through `ErrorMetadata`.
//!
//! Consistency violations between the record store and the storage backend
//! (orphaned blobs, dangling records) are not errors: they are reported as
//! `Inconsistency` values by the reconciliation sweep.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unsupported file type '.{extension}' for file '{filename}'")]
    UnsupportedFileType { filename: String, extension: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Duplicate storage key: {0}")]
    DuplicateKey(String),

    #[error("Storage backend unavailable: {message}")]
    BackendUnavailable { message: String, retryable: bool },

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to store '{filename}'")]
    FileFailed {
        filename: String,
        #[source]
        source: Box<AppError>,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::UnsupportedFileType { .. } => (
            400,
            "UNSUPPORTED_FILE_TYPE",
            false,
            Some("Upload a .png, .gif, .jpg, .jpeg, .doc, .docx or .pdf file"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the storage key exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedOperation(_) => (
            404,
            "UNSUPPORTED_OPERATION",
            false,
            Some("Fetch the file from its url instead"),
            false,
            LogLevel::Debug,
        ),
        AppError::DuplicateKey(_) => (
            409,
            "DUPLICATE_KEY",
            true,
            Some("Retry the upload"),
            false,
            LogLevel::Warn,
        ),
        AppError::BackendUnavailable { retryable, .. } => (
            503,
            "BACKEND_UNAVAILABLE",
            *retryable,
            if *retryable {
                Some("Retry after a short delay")
            } else {
                Some("Contact support if this error persists")
            },
            true,
            LogLevel::Error,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::FileFailed { source, .. } => app_error_static_metadata(source),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::UnsupportedFileType { .. } => "UnsupportedFileType",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::UnsupportedOperation(_) => "UnsupportedOperation",
            AppError::DuplicateKey(_) => "DuplicateKey",
            AppError::BackendUnavailable { .. } => "BackendUnavailable",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
            AppError::FileFailed { source, .. } => source.error_type(),
        }
    }

    /// Name of the file this error is attributed to, if any.
    pub fn filename(&self) -> Option<&str> {
        match self {
            AppError::UnsupportedFileType { filename, .. } | AppError::FileFailed { filename, .. } => {
                Some(filename)
            }
            _ => None,
        }
    }

    /// Attribute this error to a specific file of a batch.
    pub fn for_file(self, filename: impl Into<String>) -> Self {
        match self {
            err @ (AppError::UnsupportedFileType { .. } | AppError::FileFailed { .. }) => err,
            other => AppError::FileFailed {
                filename: filename.into(),
                source: Box::new(other),
            },
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::UnsupportedFileType {
                filename,
                extension,
            } => {
                if extension.is_empty() {
                    format!("File '{}' has no extension", filename)
                } else {
                    format!(
                        "File type '.{}' is not allowed (file '{}')",
                        extension, filename
                    )
                }
            }
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::UnsupportedOperation(ref msg) => msg.clone(),
            AppError::DuplicateKey(_) => "Storage key collision, please retry".to_string(),
            AppError::BackendUnavailable { .. } => "Storage backend unavailable".to_string(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
            AppError::FileFailed { filename, source } => {
                format!("{}: {}", filename, source.client_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_unsupported_file_type() {
        let err = AppError::UnsupportedFileType {
            filename: "notes.txt".to_string(),
            extension: "txt".to_string(),
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "UNSUPPORTED_FILE_TYPE");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains(".txt"));
        assert!(err.client_message().contains("notes.txt"));
        assert!(!err.is_sensitive());
        assert_eq!(err.filename(), Some("notes.txt"));
    }

    #[test]
    fn test_error_metadata_missing_extension() {
        let err = AppError::UnsupportedFileType {
            filename: "README".to_string(),
            extension: String::new(),
        };
        assert_eq!(err.client_message(), "File 'README' has no extension");
    }

    #[test]
    fn test_error_metadata_not_found_and_unsupported_operation() {
        let not_found = AppError::NotFound("Upload not found".to_string());
        assert_eq!(not_found.http_status_code(), 404);
        assert_eq!(not_found.error_code(), "NOT_FOUND");
        assert_eq!(not_found.client_message(), "Upload not found");

        let unsupported = AppError::UnsupportedOperation("direct read".to_string());
        assert_eq!(unsupported.http_status_code(), 404);
        assert_eq!(unsupported.error_code(), "UNSUPPORTED_OPERATION");
        assert_eq!(unsupported.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_backend_unavailable_hides_details() {
        let err = AppError::BackendUnavailable {
            message: "timeout talking to http://minio:9000/secret-bucket".to_string(),
            retryable: true,
        };
        assert_eq!(err.http_status_code(), 503);
        assert!(err.is_recoverable());
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Storage backend unavailable");

        let fatal = AppError::BackendUnavailable {
            message: "permission denied: /var/lib/stowage".to_string(),
            retryable: false,
        };
        assert!(!fatal.is_recoverable());
        assert!(!fatal.client_message().contains("/var/lib"));
    }

    #[test]
    fn test_file_failed_delegates_to_source() {
        let err = AppError::BackendUnavailable {
            message: "connection reset".to_string(),
            retryable: true,
        }
        .for_file("report.pdf");

        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "BACKEND_UNAVAILABLE");
        assert_eq!(err.error_type(), "BackendUnavailable");
        assert_eq!(err.filename(), Some("report.pdf"));
        assert_eq!(
            err.client_message(),
            "report.pdf: Storage backend unavailable"
        );
        assert!(err.detailed_message().contains("connection reset"));
    }

    #[test]
    fn test_for_file_does_not_double_wrap() {
        let err = AppError::Internal("boom".to_string())
            .for_file("a.png")
            .for_file("b.png");
        assert_eq!(err.filename(), Some("a.png"));
    }

    #[test]
    fn test_error_metadata_suggested_actions() {
        let err1 = AppError::DuplicateKey("abc_photo.png".to_string());
        assert_eq!(err1.suggested_action(), Some("Retry the upload"));

        let err2 = AppError::NotFound("test".to_string());
        assert_eq!(
            err2.suggested_action(),
            Some("Verify the storage key exists")
        );

        let err3 = AppError::InvalidInput("test".to_string());
        assert_eq!(
            err3.suggested_action(),
            Some("Check request parameters and try again")
        );
    }
}
