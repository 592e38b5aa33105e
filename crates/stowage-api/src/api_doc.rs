//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use stowage_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "File upload service. Files are stored on local disk or in an S3-compatible object store and addressed by a generated storage key. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::uploads::list_uploads,
        handlers::uploads::upload_files,
        handlers::uploads::download_upload,
        handlers::uploads::delete_upload,
    ),
    components(schemas(models::UploadResponse, error::ErrorResponse)),
    tags(
        (name = "uploads", description = "Upload, list, download and delete files")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
