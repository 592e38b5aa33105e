//! Application bootstrap: configuration checks, telemetry, database,
//! storage, services and routes.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::services::{ReconciliationService, UploadService};
use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use stowage_core::Config;
use stowage_db::{PgUploadRecordRepository, UploadRecordStore};

/// Initialize the application and return the shared state and router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    init_logging(&config)?;

    validation::validate_config(&config).context("Configuration validation failed")?;

    tracing::info!(
        environment = %config.environment(),
        storage_backend = %config.storage_backend(),
        "Starting stowage API"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let records: Arc<dyn UploadRecordStore> = Arc::new(PgUploadRecordRepository::new(pool));

    let uploads = Arc::new(UploadService::new(storage.clone(), records.clone()));
    start_reconciliation(&config, storage, records);

    let state = Arc::new(AppState::new(uploads));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

fn init_logging(config: &Config) -> Result<()> {
    crate::telemetry::init_telemetry(config.log_format())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))
}

fn start_reconciliation(
    config: &Config,
    storage: Arc<dyn stowage_storage::Storage>,
    records: Arc<dyn UploadRecordStore>,
) {
    let interval_secs = config.reconcile_interval_secs();
    if interval_secs == 0 {
        tracing::info!("Background reconciliation disabled");
        return;
    }

    let service = Arc::new(ReconciliationService::new(
        storage,
        records,
        Duration::from_secs(config.reconcile_grace_secs()),
    ));
    service.start(Duration::from_secs(interval_secs));
    tracing::info!(
        interval_secs,
        grace_secs = config.reconcile_grace_secs(),
        "Background reconciliation started"
    );
}
