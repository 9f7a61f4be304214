//! CSV rollup for archiving the snapshot log.
//!
//! Moves logged snapshots into a long-lived CSV archive without risking
//! data loss: the CSV is synced before the log is renamed away.

use crate::wal::SnapshotRecord;
use crate::Result;
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    user_id: String,
    created_at: String,
    target_calories: f64,
    target_protein_g: f64,
    target_carbs_g: f64,
    target_fat_g: f64,
    ema_current: f64,
    adjustment_factor: f64,
    bmr: f64,
    tdee: f64,
}

impl From<&SnapshotRecord> for CsvRow {
    fn from(record: &SnapshotRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            user_id: record.user_id.clone(),
            created_at: record.created_at.to_rfc3339(),
            target_calories: record.output.target_calories,
            target_protein_g: record.output.target_protein_g,
            target_carbs_g: record.output.target_carbs_g,
            target_fat_g: record.output.target_fat_g,
            ema_current: record.output.ema_current,
            adjustment_factor: record.output.adjustment_factor,
            bmr: record.output.bmr,
            tdee: record.output.tdee,
        }
    }
}

/// Roll up logged snapshots into CSV and archive the log atomically
///
/// This function:
/// 1. Reads all snapshots from the log
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the log to .processed
/// 5. Returns the number of snapshots processed
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = crate::wal::read_snapshots(wal_path)?;

    if records.is_empty() {
        tracing::info!("No snapshots in log to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a brand-new archive gets a header row
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} snapshots to CSV", records.len());

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived snapshot log to {:?}", processed_path);

    Ok(records.len())
}

/// Clean up old processed logs
///
/// This removes all .processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed log: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed snapshot logs", count);
    }

    Ok(count)
}
