use crate::constants::FILES_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::IncomingFile;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::StreamExt;
use std::sync::Arc;
use stowage_core::{AppError, UploadResponse};

#[utoipa::path(
    get,
    path = "/api/v0/uploads",
    tag = "uploads",
    responses(
        (status = 200, description = "All stored files, oldest first", body = Vec<UploadResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_uploads"))]
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UploadResponse>>, HttpAppError> {
    let records = state.uploads.list().await?;
    let responses = records
        .into_iter()
        .map(|record| state.uploads.to_response(record))
        .collect();
    Ok(Json(responses))
}

#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body(
        content = inline(Object),
        content_type = "multipart/form-data",
        description = "One or more parts named `files`"
    ),
    responses(
        (status = 200, description = "Files stored", body = Vec<UploadResponse>),
        (status = 400, description = "Unsupported file type or malformed body", body = ErrorResponse),
        (status = 413, description = "Request too large", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_files"))]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadResponse>>, HttpAppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            tracing::debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Part '{}' has no filename", FILES_FIELD))
            })?;
        let data = field.bytes().await?;

        files.push(IncomingFile { filename, data });
    }

    let records = state.uploads.upload(files).await?;
    let responses = records
        .into_iter()
        .map(|record| state.uploads.to_response(record))
        .collect();
    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/api/v0/uploads/{storage_key}",
    tag = "uploads",
    params(
        ("storage_key" = String, Path, description = "Storage key returned at upload")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown key, or the backend does not serve files directly", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "download_upload"))]
pub async fn download_upload(
    State(state): State<Arc<AppState>>,
    Path(storage_key): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let retrieved = state.uploads.retrieve_stream(&storage_key).await?;

    let body_stream = retrieved.stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, retrieved.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&retrieved.record.original_filename),
        )
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/api/v0/uploads/{storage_key}",
    tag = "uploads",
    params(
        ("storage_key" = String, Path, description = "Storage key returned at upload")
    ),
    responses(
        (status = 200, description = "File deleted", body = bool),
        (status = 404, description = "Unknown key", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_upload"))]
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(storage_key): Path<String>,
) -> Result<Json<bool>, HttpAppError> {
    state.uploads.delete(&storage_key).await?;
    Ok(Json(true))
}

/// `attachment` disposition carrying the original name: an ASCII fallback in
/// `filename` and the exact name in `filename*`.
fn content_disposition(original_filename: &str) -> String {
    let fallback: String = original_filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == original_filename {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(original_filename)
        )
    }
}
