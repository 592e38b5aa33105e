//! Out-of-band detection and repair of record/blob mismatches.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use stowage_core::{AppError, Inconsistency, StoredObject, SweepReport, UploadRecord};
use stowage_db::UploadRecordStore;
use stowage_storage::{Storage, StorageError};
use tokio::time::interval;

#[derive(Clone)]
pub struct ReconciliationService {
    storage: Arc<dyn Storage>,
    records: Arc<dyn UploadRecordStore>,
    /// Blobs younger than this may belong to an upload whose record is not
    /// written yet and are never reported as orphans.
    grace: chrono::Duration,
}

impl ReconciliationService {
    pub fn new(
        storage: Arc<dyn Storage>,
        records: Arc<dyn UploadRecordStore>,
        grace: Duration,
    ) -> Self {
        Self {
            storage,
            records,
            grace: chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Backend objects with no record, older than the grace period.
    #[tracing::instrument(skip(self), fields(reconcile.operation = "list_orphans"))]
    pub async fn list_orphans(&self, now: DateTime<Utc>) -> Result<Vec<StoredObject>, AppError> {
        let known: HashSet<String> = self
            .records
            .list_all()
            .await?
            .into_iter()
            .map(|record| record.storage_key)
            .collect();

        let cutoff = now.checked_sub_signed(self.grace).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let orphans: Vec<StoredObject> = self
            .storage
            .list_objects()
            .await?
            .into_iter()
            .filter(|object| !known.contains(&object.key) && object.last_modified <= cutoff)
            .collect();

        tracing::debug!(count = orphans.len(), "Orphaned blobs found");
        Ok(orphans)
    }

    /// Records whose bytes are missing from the backend.
    #[tracing::instrument(skip(self), fields(reconcile.operation = "list_dangling"))]
    pub async fn list_dangling(&self) -> Result<Vec<UploadRecord>, AppError> {
        let mut dangling = Vec::new();
        for record in self.records.list_all().await? {
            if !self.storage.exists(&record.storage_key).await? {
                dangling.push(record);
            }
        }

        tracing::debug!(count = dangling.len(), "Dangling records found");
        Ok(dangling)
    }

    /// Both kinds of inconsistency, orphans first.
    pub async fn inconsistencies(&self, now: DateTime<Utc>) -> Result<Vec<Inconsistency>, AppError> {
        let mut found: Vec<Inconsistency> = self
            .list_orphans(now)
            .await?
            .into_iter()
            .map(Inconsistency::OrphanedBlob)
            .collect();
        found.extend(
            self.list_dangling()
                .await?
                .into_iter()
                .map(Inconsistency::DanglingRecord),
        );
        Ok(found)
    }

    /// Remove orphaned blobs and dangling records. Individual failures are
    /// counted and logged; the sweep continues with the next item.
    #[tracing::instrument(skip(self), fields(reconcile.operation = "sweep"))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();

        for object in self.list_orphans(now).await? {
            // A record may have been created since the listing.
            match self.records.get_by_storage_key(&object.key).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(storage_key = %object.key, error = %e, "Failed to re-check orphan");
                    report.failures += 1;
                    continue;
                }
            }

            match self.storage.delete(&object.key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    tracing::info!(
                        storage_key = %object.key,
                        size_bytes = object.size,
                        "Removed orphaned blob"
                    );
                    report.orphans_removed += 1;
                }
                Err(e) => {
                    tracing::error!(storage_key = %object.key, error = %e, "Failed to remove orphaned blob");
                    report.failures += 1;
                }
            }
        }

        for record in self.list_dangling().await? {
            match self.records.delete(&record.storage_key).await {
                Ok(()) | Err(AppError::NotFound(_)) => {
                    tracing::info!(
                        storage_key = %record.storage_key,
                        record_id = %record.id,
                        "Removed dangling record"
                    );
                    report.dangling_removed += 1;
                }
                Err(e) => {
                    tracing::error!(storage_key = %record.storage_key, error = %e, "Failed to remove dangling record");
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            orphans_removed = report.orphans_removed,
            dangling_removed = report.dangling_removed,
            failures = report.failures,
            "Reconciliation sweep completed"
        );
        Ok(report)
    }

    /// Start the background sweep loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(every);
            // The first tick completes immediately; skip it so startup is not
            // slowed by a full listing.
            sweep_interval.tick().await;

            loop {
                sweep_interval.tick().await;

                tracing::debug!("Starting scheduled reconciliation sweep");

                match self.sweep(Utc::now()).await {
                    Ok(report) if report.is_clean() => {
                        tracing::debug!("Reconciliation sweep found nothing to repair");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        })
    }
}
