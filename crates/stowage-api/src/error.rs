//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; anything that
//! converts into `AppError` renders with the same status, body and logging.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stowage_core::{AppError, ErrorMetadata, LogLevel};
use stowage_storage::StorageError;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from stowage-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Malformed multipart bodies are client errors; a body cut off by the
/// request size limit is reported as too large.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl HttpAppError {
    /// Response body for this error; details are omitted when `hide_details`
    /// is set or the error may carry internal information.
    pub fn to_body(&self, hide_details: bool) -> ErrorResponse {
        let app_error = &self.0;
        let hide = hide_details || app_error.is_sensitive();

        ErrorResponse {
            error: app_error.client_message(),
            details: (!hide).then(|| app_error.detailed_message()),
            error_type: (!hide).then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(&self.0);

        (status, Json(self.to_body(is_production_env()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("a_photo.png".to_string()).into();
        assert!(matches!(app_err, AppError::NotFound(_)));
    }

    #[test]
    fn test_from_storage_error_unsupported() {
        let HttpAppError(app_err) = StorageError::Unsupported("reads".to_string()).into();
        assert!(matches!(app_err, AppError::UnsupportedOperation(_)));
        assert_eq!(app_err.http_status_code(), 404);
    }

    #[test]
    fn test_from_storage_error_timeout_is_retryable() {
        let HttpAppError(app_err) = StorageError::Timeout("put".to_string()).into();
        assert!(matches!(
            app_err,
            AppError::BackendUnavailable {
                retryable: true,
                ..
            }
        ));
        assert_eq!(app_err.http_status_code(), 503);
    }

    #[test]
    fn test_unsupported_type_body() {
        let err = HttpAppError(AppError::UnsupportedFileType {
            filename: "payload.exe".to_string(),
            extension: "exe".to_string(),
        });
        let body = serde_json::to_value(err.to_body(false)).unwrap();

        assert_eq!(body["code"], "UNSUPPORTED_FILE_TYPE");
        assert_eq!(body["recoverable"], false);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("exe"));
        assert!(message.contains("payload.exe"));
        assert!(body.get("details").is_some());
    }

    #[test]
    fn test_sensitive_error_hides_details() {
        let err = HttpAppError(AppError::BackendUnavailable {
            message: "connect to http://10.0.0.7:9000 refused".to_string(),
            retryable: true,
        });
        let body = serde_json::to_value(err.to_body(false)).unwrap();

        assert_eq!(body["code"], "BACKEND_UNAVAILABLE");
        assert!(body.get("details").is_none());
        assert!(body.get("error_type").is_none());
        assert!(!body.to_string().contains("10.0.0.7"));
    }

    #[test]
    fn test_production_hides_details() {
        let err = HttpAppError(AppError::NotFound("Upload not found: x".to_string()));
        let body = serde_json::to_value(err.to_body(true)).unwrap();

        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_file_failed_renders_as_source() {
        let err = HttpAppError(AppError::FileFailed {
            filename: "scan.jpg".to_string(),
            source: Box::new(AppError::BackendUnavailable {
                message: "timed out".to_string(),
                retryable: true,
            }),
        });
        assert_eq!(err.0.http_status_code(), 503);

        let body = serde_json::to_value(err.to_body(false)).unwrap();
        assert_eq!(body["code"], "BACKEND_UNAVAILABLE");
        assert!(body["error"].as_str().unwrap().contains("scan.jpg"));
    }
}
