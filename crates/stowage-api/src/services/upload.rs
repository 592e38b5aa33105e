//! Upload lifecycle: filename policy, byte storage and record store.
//!
//! Bytes are always written before the record is created, and removed before
//! the record is deleted. A failure between the two steps leaves an orphaned
//! blob or a dangling record, which the reconciliation service reports.

use bytes::Bytes;
use std::sync::Arc;
use stowage_core::{AppError, FilenamePolicy, NewUploadRecord, UploadRecord, UploadResponse};
use stowage_db::UploadRecordStore;
use stowage_storage::{ByteStream, Storage, StorageError};

/// Attempts at deriving a fresh storage key when storage or the record store
/// reports the key as taken.
const MAX_KEY_ATTEMPTS: usize = 3;

/// One file of an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// A record together with its bytes, read in full.
#[derive(Debug, Clone)]
pub struct RetrievedFile {
    pub record: UploadRecord,
    pub content_type: &'static str,
    pub data: Bytes,
}

/// A record together with a stream over its bytes.
pub struct RetrievedStream {
    pub record: UploadRecord,
    pub content_type: &'static str,
    pub stream: ByteStream,
}

#[derive(Clone)]
pub struct UploadService {
    storage: Arc<dyn Storage>,
    records: Arc<dyn UploadRecordStore>,
}

impl UploadService {
    pub fn new(storage: Arc<dyn Storage>, records: Arc<dyn UploadRecordStore>) -> Self {
        Self { storage, records }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn records(&self) -> &Arc<dyn UploadRecordStore> {
        &self.records
    }

    /// Serialize a record with its locator resolved against the live backend.
    pub fn to_response(&self, record: UploadRecord) -> UploadResponse {
        let url = self.storage.locate(&record.storage_key);
        UploadResponse::from_record(record, url)
    }

    /// Store a batch of files.
    ///
    /// Every filename is checked against the allowlist before anything is
    /// written, so a disallowed file rejects the whole batch without side
    /// effects. Files are then stored one by one; a failure aborts the request
    /// but keeps the records already created for earlier files.
    #[tracing::instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn upload(&self, files: Vec<IncomingFile>) -> Result<Vec<UploadRecord>, AppError> {
        if files.is_empty() {
            return Err(AppError::InvalidInput(
                "No files were provided in the 'files' field".to_string(),
            ));
        }

        let content_types = files
            .iter()
            .map(|file| FilenamePolicy::validate(&file.filename))
            .collect::<Result<Vec<_>, _>>()?;

        let mut created = Vec::with_capacity(files.len());
        for (file, content_type) in files.into_iter().zip(content_types) {
            let filename = file.filename.clone();
            let record = self
                .store_one(file, content_type)
                .await
                .map_err(|e| e.for_file(filename))?;
            created.push(record);
        }

        tracing::info!(stored = created.len(), "Upload batch stored");
        Ok(created)
    }

    /// Write one file under a fresh key, then record it.
    ///
    /// Puts never overwrite, so a taken key fails before any bytes move. A key
    /// that is free in storage but already recorded (a dangling record) gets
    /// the just-written blob removed again. Both cases retry with a new key.
    async fn store_one(
        &self,
        file: IncomingFile,
        content_type: &'static str,
    ) -> Result<UploadRecord, AppError> {
        let IncomingFile { filename, data } = file;
        let size_bytes = data.len();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let storage_key = FilenamePolicy::derive_storage_key(&filename);

            match self
                .storage
                .put(&storage_key, data.clone(), content_type)
                .await
            {
                Ok(()) => {}
                Err(StorageError::AlreadyExists(_)) if attempt < MAX_KEY_ATTEMPTS => {
                    tracing::warn!(
                        storage_key = %storage_key,
                        attempt,
                        "Storage key already holds bytes, deriving a new key"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let new_record = NewUploadRecord {
                original_filename: filename.clone(),
                storage_key: storage_key.clone(),
            };

            match self.records.create(new_record).await {
                Ok(record) => {
                    tracing::info!(
                        storage_key = %record.storage_key,
                        original_filename = %record.original_filename,
                        size_bytes,
                        "File uploaded"
                    );
                    return Ok(record);
                }
                Err(AppError::DuplicateKey(key)) => {
                    if let Err(e) = self.storage.delete(&storage_key).await {
                        tracing::warn!(
                            storage_key = %storage_key,
                            error = %e,
                            "Failed to remove bytes written under a recorded key; blob left for reconciliation"
                        );
                    }
                    if attempt >= MAX_KEY_ATTEMPTS {
                        return Err(AppError::DuplicateKey(key));
                    }
                    tracing::warn!(
                        storage_key = %storage_key,
                        attempt,
                        "Storage key already recorded, deriving a new key"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        storage_key = %storage_key,
                        error = %e,
                        "Record creation failed after bytes were stored; blob left for reconciliation"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn find(&self, storage_key: &str) -> Result<UploadRecord, AppError> {
        self.records
            .get_by_storage_key(storage_key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload not found: {}", storage_key)))
    }

    /// Read a stored file in full.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, storage_key: &str) -> Result<RetrievedFile, AppError> {
        let record = self.find(storage_key).await?;
        let content_type = content_type_of(&record);
        let data = self
            .storage
            .get(storage_key)
            .await
            .map_err(|e| read_error(&record, e))?;

        Ok(RetrievedFile {
            record,
            content_type,
            data,
        })
    }

    /// Open a stream over a stored file.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_stream(&self, storage_key: &str) -> Result<RetrievedStream, AppError> {
        let record = self.find(storage_key).await?;
        let content_type = content_type_of(&record);
        let stream = self
            .storage
            .get_stream(storage_key)
            .await
            .map_err(|e| read_error(&record, e))?;

        Ok(RetrievedStream {
            record,
            content_type,
            stream,
        })
    }

    /// Delete a stored file: bytes first, then the record.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, storage_key: &str) -> Result<(), AppError> {
        self.find(storage_key).await?;

        match self.storage.delete(storage_key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(
                    storage_key = %storage_key,
                    "Bytes already missing, removing dangling record"
                );
            }
            Err(e) => return Err(e.into()),
        }

        self.records.delete(storage_key).await?;

        tracing::info!(storage_key = %storage_key, "File deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<UploadRecord>, AppError> {
        self.records.list_all().await
    }
}

/// Content type for a record, from the allowlist. Records always carry an
/// allowed name, the fallback covers rows written by other tools.
fn content_type_of(record: &UploadRecord) -> &'static str {
    FilenamePolicy::validate(&record.original_filename).unwrap_or("application/octet-stream")
}

fn read_error(record: &UploadRecord, err: StorageError) -> AppError {
    if let StorageError::NotFound(_) = err {
        tracing::warn!(
            storage_key = %record.storage_key,
            record_id = %record.id,
            "Record exists but bytes are missing"
        );
    }
    err.into()
}
