//! Append-only snapshot log.
//!
//! Every computed set of adaptive targets is appended to a JSONL (JSON
//! Lines) file with file locking, keyed by user and creation time.
//! Records are never rewritten.

use crate::{AdaptiveOutput, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One persisted adaptive targets computation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub output: AdaptiveOutput,
}

impl SnapshotRecord {
    pub fn new(user_id: impl Into<String>, created_at: DateTime<Utc>, output: AdaptiveOutput) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at,
            output,
        }
    }
}

/// Snapshot sink trait for persisting snapshots
pub trait SnapshotSink {
    fn append(&mut self, record: &SnapshotRecord) -> Result<()>;
}

/// JSONL-based snapshot sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SnapshotSink for JsonlSink {
    fn append(&mut self, record: &SnapshotRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended snapshot {} for {} to log", record.id, record.user_id);
        Ok(())
    }
}

/// Read all snapshots from a log file
///
/// Lines that fail to parse (e.g. a torn final write) are skipped.
pub fn read_snapshots(path: &Path) -> Result<Vec<SnapshotRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SnapshotRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse snapshot at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} snapshots from log", records.len());
    Ok(records)
}

/// Most recent snapshot for a user
pub fn latest_snapshot<'a>(records: &'a [SnapshotRecord], user_id: &str) -> Option<&'a SnapshotRecord> {
    records
        .iter()
        .filter(|r| r.user_id == user_id)
        .max_by_key(|r| r.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_output() -> AdaptiveOutput {
        AdaptiveOutput {
            target_calories: 1989.63,
            target_protein_g: 176.0,
            target_carbs_g: 197.05,
            target_fat_g: 55.27,
            ema_current: 80.0,
            adjustment_factor: -250.0,
            bmr: 1767.5,
            tdee: 2739.63,
        }
    }

    #[test]
    fn test_append_and_read_single_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("snapshots.wal");

        let record = SnapshotRecord::new("alice", Utc::now(), create_test_output());

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&record).unwrap();

        let records = read_snapshots(&log_path).unwrap();
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn test_record_is_flat_json() {
        let record = SnapshotRecord::new("alice", Utc::now(), create_test_output());
        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["target_calories"], 1989.63);
        assert_eq!(value["user_id"], "alice");
    }

    #[test]
    fn test_read_empty_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_snapshots(&temp_dir.path().join("nonexistent.wal")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("snapshots.wal");

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&SnapshotRecord::new("alice", Utc::now(), create_test_output()))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        write!(file, "{{\"id\":\"torn").unwrap();

        assert_eq!(read_snapshots(&log_path).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_snapshot_per_user() {
        let now = Utc::now();
        let records = vec![
            SnapshotRecord::new("alice", now - Duration::days(2), create_test_output()),
            SnapshotRecord::new("bob", now, create_test_output()),
            SnapshotRecord::new("alice", now - Duration::days(1), create_test_output()),
        ];

        let latest = latest_snapshot(&records, "alice").unwrap();
        assert_eq!(latest.id, records[2].id);
        assert!(latest_snapshot(&records, "carol").is_none());
    }
}
