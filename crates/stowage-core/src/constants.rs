/// Prefix shared by every versioned API route.
pub const API_PREFIX: &str = "/api/v0";

/// Path (below `API_PREFIX`) under which stored files are addressed by key.
pub const UPLOADS_PATH: &str = "/uploads";

/// Timestamp layout used for `uploadedAt` in serialized records.
pub const UPLOADED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Route for a single stored file, relative to the server root.
pub fn upload_route(storage_key: &str) -> String {
    format!(
        "{}{}/{}",
        API_PREFIX,
        UPLOADS_PATH,
        urlencoding::encode(storage_key)
    )
}
