//! Helpers for the stowage operator CLI: tracing setup and table rendering.

use chrono::{DateTime, Utc};
use std::fmt::Write;
use stowage_core::constants::UPLOADED_AT_FORMAT;
use stowage_core::{Inconsistency, StoredObject, SweepReport, UploadRecord};

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays
/// parseable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(UPLOADED_AT_FORMAT).to_string()
}

pub fn records_table(records: &[UploadRecord]) -> String {
    if records.is_empty() {
        return "No uploads found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36} {:<30} {:<50} {:>19}",
        "ID", "Original Filename", "Storage Key", "Uploaded At"
    );
    let _ = writeln!(out, "{}", "-".repeat(138));
    for record in records {
        let _ = writeln!(
            out,
            "{:<36} {:<30} {:<50} {:>19}",
            record.id,
            truncate_string(&record.original_filename, 30),
            truncate_string(&record.storage_key, 50),
            timestamp(&record.uploaded_at)
        );
    }
    let _ = writeln!(out, "\nTotal: {}", records.len());
    out
}

pub fn objects_table(objects: &[StoredObject]) -> String {
    if objects.is_empty() {
        return "No orphaned blobs found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<50} {:>12} {:>19}",
        "Storage Key", "Size (bytes)", "Last Modified"
    );
    let _ = writeln!(out, "{}", "-".repeat(83));
    for object in objects {
        let _ = writeln!(
            out,
            "{:<50} {:>12} {:>19}",
            truncate_string(&object.key, 50),
            object.size,
            timestamp(&object.last_modified)
        );
    }
    let _ = writeln!(out, "\nTotal: {}", objects.len());
    out
}

pub fn inconsistencies_table(found: &[Inconsistency]) -> String {
    if found.is_empty() {
        return "Storage and records are consistent.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {:<50}", "Kind", "Storage Key");
    let _ = writeln!(out, "{}", "-".repeat(67));
    for item in found {
        let kind = match item {
            Inconsistency::OrphanedBlob(_) => "orphaned blob",
            Inconsistency::DanglingRecord(_) => "dangling record",
        };
        let _ = writeln!(out, "{:<16} {:<50}", kind, truncate_string(item.storage_key(), 50));
    }
    let _ = writeln!(out, "\nTotal: {}", found.len());
    out
}

pub fn sweep_summary(report: &SweepReport, dry_run: bool) -> String {
    if dry_run {
        return format!(
            "Dry run: {} orphaned blob(s) and {} dangling record(s) would be removed\n",
            report.orphans_removed, report.dangling_removed
        );
    }
    format!(
        "Removed {} orphaned blob(s) and {} dangling record(s); {} failure(s)\n",
        report.orphans_removed, report.dangling_removed, report.failures
    )
}
