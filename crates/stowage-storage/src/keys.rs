use crate::traits::{StorageError, StorageResult};

const MAX_KEY_LENGTH: usize = 1024;

/// Reject keys that could escape the flat key namespace.
pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey(
            "Storage key is empty or too long".to_string(),
        ));
    }

    if storage_key.contains("..")
        || storage_key.starts_with('.')
        || storage_key.contains(['/', '\\'])
        || storage_key.chars().any(char::is_control)
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }

    Ok(())
}
