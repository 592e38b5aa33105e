//! Filename policy: the closed extension allowlist and storage key derivation.
//!
//! A storage key is `{token}_{sanitized}` where `token` is a UUID v4 in simple
//! (32 hex digit) form and `sanitized` is the client filename reduced to
//! `[A-Za-z0-9._-]`. Uniqueness comes from the token alone; the sanitized name
//! is kept for traceability.

use uuid::Uuid;

use crate::error::AppError;

/// Extension (lowercase, no dot) to MIME type.
pub const ALLOWED_FILE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("pdf", "application/pdf"),
];

const MAX_SANITIZED_LENGTH: usize = 200;
const FALLBACK_NAME: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("unsupported file type '.{extension}' for '{filename}'")]
    UnsupportedType { filename: String, extension: String },
}

impl From<FilenameError> for AppError {
    fn from(err: FilenameError) -> Self {
        match err {
            FilenameError::UnsupportedType {
                filename,
                extension,
            } => AppError::UnsupportedFileType {
                filename,
                extension,
            },
        }
    }
}

/// Stateless entry point for the policy.
pub struct FilenamePolicy;

impl FilenamePolicy {
    /// Returns the MIME type for an allowed filename. Matching is case-insensitive.
    pub fn validate(original_filename: &str) -> Result<&'static str, FilenameError> {
        let extension = extension_of(original_filename)
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        ALLOWED_FILE_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| *mime)
            .ok_or_else(|| FilenameError::UnsupportedType {
                filename: original_filename.to_string(),
                extension,
            })
    }

    /// Reduces a client filename to a single safe path component.
    pub fn sanitize(original_filename: &str) -> String {
        let mut sanitized = String::with_capacity(original_filename.len());
        for c in last_component(original_filename).chars() {
            let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            };
            if c == '.' && sanitized.ends_with('.') {
                continue;
            }
            sanitized.push(c);
        }

        let trimmed = sanitized.trim_start_matches(['.', '_', '-']);
        // Only ASCII remains, so byte truncation is char-safe.
        let truncated = &trimmed[..trimmed.len().min(MAX_SANITIZED_LENGTH)];

        if truncated.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            truncated.to_string()
        }
    }

    /// Derives a fresh storage key. Two calls never return the same key.
    pub fn derive_storage_key(original_filename: &str) -> String {
        format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            Self::sanitize(original_filename)
        )
    }
}

fn last_component(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Extension after the last dot; leading dots do not start an extension.
fn extension_of(filename: &str) -> Option<&str> {
    let name = last_component(filename).trim_start_matches('.');
    name.rfind('.').map(|idx| &name[idx + 1..])
}
