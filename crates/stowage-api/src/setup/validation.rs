//! Configuration validation
//!
//! Re-checks the parsed configuration at startup and warns about settings that
//! are legal but likely unintended.

use anyhow::Result;
use stowage_core::{Config, StorageBackend};

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();

    if !is_production && config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS allows all origins; set CORS_ORIGINS before deploying");
    }

    if config.reconcile_interval_secs() > 0 && config.reconcile_grace_secs() == 0 {
        tracing::warn!(
            "RECONCILE_GRACE_SECS is 0 - the background sweep may remove blobs of in-flight uploads"
        );
    }

    if config.storage_backend() == StorageBackend::ObjectStore
        && config.local_storage_path().is_some()
    {
        tracing::warn!("LOCAL_STORAGE_PATH is ignored when using the object store backend");
    }

    Ok(())
}
