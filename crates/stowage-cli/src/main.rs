//! Stowage operator CLI: inspect uploads and reconcile the record store with
//! the storage backend.
//!
//! Reads the same environment as the API server (DATABASE_URL,
//! STORAGE_BACKEND, ...).

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use stowage_api::ReconciliationService;
use stowage_cli::{
    inconsistencies_table, init_tracing, objects_table, records_table, sweep_summary,
};
use stowage_core::{Config, SweepReport};
use stowage_db::{PgUploadRecordRepository, UploadRecordStore};
use stowage_storage::create_storage;

#[derive(Parser)]
#[command(name = "stowage-cli", about = "Stowage operator CLI")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List all upload records
    List,
    /// List blobs in the storage backend that have no record
    Orphans,
    /// List records whose bytes are missing from the storage backend
    Dangling,
    /// List orphaned blobs and dangling records together
    Check,
    /// Remove orphaned blobs and dangling records
    Sweep {
        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;
    let records: Arc<dyn UploadRecordStore> = Arc::new(PgUploadRecordRepository::new(pool));
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;

    let reconciliation = ReconciliationService::new(
        storage,
        records.clone(),
        Duration::from_secs(config.reconcile_grace_secs()),
    );
    let now = Utc::now();

    match cli.command {
        Commands::List => {
            let all = records.list_all().await?;
            match cli.format {
                OutputFormat::Json => print_json(&all)?,
                OutputFormat::Table => print!("{}", records_table(&all)),
            }
        }
        Commands::Orphans => {
            let orphans = reconciliation.list_orphans(now).await?;
            match cli.format {
                OutputFormat::Json => print_json(&orphans)?,
                OutputFormat::Table => print!("{}", objects_table(&orphans)),
            }
        }
        Commands::Dangling => {
            let dangling = reconciliation.list_dangling().await?;
            match cli.format {
                OutputFormat::Json => print_json(&dangling)?,
                OutputFormat::Table => {
                    if dangling.is_empty() {
                        println!("No dangling records found.");
                    } else {
                        print!("{}", records_table(&dangling));
                    }
                }
            }
        }
        Commands::Check => {
            let found = reconciliation.inconsistencies(now).await?;
            match cli.format {
                OutputFormat::Json => print_json(&found)?,
                OutputFormat::Table => print!("{}", inconsistencies_table(&found)),
            }
        }
        Commands::Sweep { dry_run } => {
            let report = if dry_run {
                SweepReport {
                    orphans_removed: reconciliation.list_orphans(now).await?.len(),
                    dangling_removed: reconciliation.list_dangling().await?.len(),
                    failures: 0,
                }
            } else {
                reconciliation.sweep(now).await?
            };
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Table => print!("{}", sweep_summary(&report, dry_run)),
            }
            if report.failures > 0 {
                anyhow::bail!("{} item(s) could not be removed", report.failures);
            }
        }
    }

    Ok(())
}
