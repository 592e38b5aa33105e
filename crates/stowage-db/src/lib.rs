//! Database repositories for the upload record store
//!
//! `UploadRecordStore` is the narrow interface the services depend on.
//! `PgUploadRecordRepository` backs it with Postgres; the in-memory variant
//! (feature `test-helpers`) lets service and HTTP tests run without a database.

pub mod uploads;

pub use uploads::{PgUploadRecordRepository, UploadRecordStore};

#[cfg(any(test, feature = "test-helpers"))]
pub use uploads::InMemoryUploadRecordStore;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::PgPool;

/// Embedded schema migrations (`migrations/` at the workspace root).
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
