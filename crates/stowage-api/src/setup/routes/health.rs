//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "ready", "timeout", or "not_ready: {error}".
async fn run_check<F, T, E>(f: F) -> (bool, String)
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(TIMEOUT, f).await {
        Ok(Ok(_)) => (true, "ready".to_string()),
        Ok(Err(e)) => (false, format!("not_ready: {}", e)),
        Err(_) => (false, "timeout".to_string()),
    }
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - record store and storage backend respond.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (database_ready, database) = run_check(state.uploads.records().ping()).await;
    if !database_ready {
        tracing::error!(status = %database, "Database readiness check failed");
    }

    let (storage_ready, storage) =
        run_check(state.uploads.storage().exists("health-check-non-existent-key")).await;
    if !storage_ready {
        tracing::error!(status = %storage, "Storage readiness check failed");
    }

    let ready = database_ready && storage_ready;
    let (status_code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "database": database,
            "storage": storage,
            "storage_backend": state.uploads.storage().backend_type().to_string(),
        })),
    )
}
