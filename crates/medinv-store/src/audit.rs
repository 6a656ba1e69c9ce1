//! # Audit Log
//!
//! Append-only trail of operator and pipeline actions.
//!
//! ```text
//! [03/09/2026 14:05] Add: Added item 'Ibuprofen' with ID 3
//! [03/09/2026 14:07] Update: Updated item 'Ibuprofen'
//! [03/09/2026 14:20] Dispense: Identity 0 took one dose of 'Ibuprofen' (ID 3), 19 left
//! ```
//!
//! Entries are never rewritten or removed. Timestamps are local time.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use medinv_core::{InventoryRecord, LogEntry};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreResult;

/// Text shown when there is no log file yet.
pub const NO_LOGS_MESSAGE: &str = "No logs available.";

/// Append-only audit log file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record_added(&self, record: &InventoryRecord) -> StoreResult<LogEntry> {
        let entry = LogEntry::added(now(), record);
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn record_updated(&self, original_name: &str) -> StoreResult<LogEntry> {
        let entry = LogEntry::updated(now(), original_name);
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn record_deleted(&self, name: &str) -> StoreResult<LogEntry> {
        let entry = LogEntry::deleted(now(), name);
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn record_dispensed(&self, record: &InventoryRecord, identity: usize) -> StoreResult<LogEntry> {
        let entry = LogEntry::dispensed(now(), record, identity);
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    /// Writes an entry as-is. Callers normally use the `record_*` helpers.
    pub async fn write_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        let mut line = entry.to_line();
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(action = %entry.action, "Audit entry written");
        Ok(())
    }

    /// Whole log text, or [`NO_LOGS_MESSAGE`] if the file does not exist.
    pub async fn read_text(&self) -> StoreResult<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NO_LOGS_MESSAGE.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed entries, oldest first. Lines that do not parse are skipped.
    pub async fn entries(&self) -> StoreResult<Vec<LogEntry>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match LogEntry::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(line = index + 1, "Unparseable audit line"),
            }
        }
        Ok(entries)
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use medinv_core::AuditAction;

    use super::*;

    fn record() -> InventoryRecord {
        InventoryRecord {
            id: 3,
            name: "Ibuprofen".to_string(),
            dose_count: 19,
            expiry: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_missing_log_reads_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("database_logs.txt"));

        assert_eq!(log.read_text().await.unwrap(), NO_LOGS_MESSAGE);
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("database_logs.txt"));

        log.record_added(&record()).await.unwrap();
        log.record_updated("Ibuprofen").await.unwrap();
        log.record_dispensed(&record(), 0).await.unwrap();
        log.record_deleted("Ibuprofen").await.unwrap();

        let entries = log.entries().await.unwrap();
        let actions: Vec<_> = entries.iter().map(|e| e.action.clone()).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Add,
                AuditAction::Update,
                AuditAction::Dispense,
                AuditAction::Delete
            ]
        );
        assert_eq!(entries[0].details, "Added item 'Ibuprofen' with ID 3");

        let text = log.read_text().await.unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().all(|l| l.starts_with('[')));
    }
}
