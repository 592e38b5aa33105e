pub use stowage_core::constants::{API_PREFIX, UPLOADS_PATH};

/// Multipart field carrying uploaded files.
pub const FILES_FIELD: &str = "files";

pub const OPENAPI_PATH: &str = "/api/openapi.json";
