//! # Record Store
//!
//! The local inventory file: one JSON document per line.
//!
//! ## Mutation Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Read / Mutate / Write                                │
//! │                                                                         │
//! │  append / update / remove                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock.lock().await  ← one writer at a time                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  load()  → records + rejected lines                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mutate in memory (allocate id / patch / remove)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  quarantine rejected lines → inventory.txt.rejected                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  inventory.txt.XXXX (temp, same dir) → write → flush → fsync           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rename over inventory.txt  ← readers see old or new, never half       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Corrupt Lines
//! Under [`CorruptLinePolicy::Skip`] an unparseable line is logged and left
//! out of the result. It is copied to `<store>.rejected` before the next
//! rewrite so it survives. Under [`CorruptLinePolicy::Fail`] reading stops
//! with [`StoreError::CorruptRecord`].

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use medinv_core::validation::{validate_description, validate_dose_count, validate_name};
use medinv_core::{CoreResult, InventoryRecord, NewRecord};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Configuration
// =============================================================================

/// What to do with a line that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptLinePolicy {
    /// Warn, exclude, quarantine on the next rewrite.
    #[default]
    Skip,
    /// Raise `CorruptRecord`.
    Fail,
}

/// A line excluded by [`CorruptLinePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct RejectedLine {
    line: usize,
    raw: String,
}

#[derive(Debug, Default)]
struct Loaded {
    records: Vec<InventoryRecord>,
    rejected: Vec<RejectedLine>,
}

// =============================================================================
// Record Store
// =============================================================================

/// Durable local store of [`InventoryRecord`]s.
///
/// ## Usage
/// ```rust,ignore
/// let store = RecordStore::new("inventory.txt");
///
/// let record = store.append(new_record).await?;
/// let updated = store.update(record.id, |r| { r.dose_count = 10; Ok(()) }).await?;
/// let all = store.read_all().await?;
/// ```
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    policy: CorruptLinePolicy,
    lock: Mutex<()>,
}

impl RecordStore {
    /// Creates a store backed by `path` with the default (skip) policy.
    ///
    /// The file is not touched until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordStore {
            path: path.into(),
            policy: CorruptLinePolicy::default(),
            lock: Mutex::new(()),
        }
    }

    /// Sets the corrupt-line policy.
    pub fn with_policy(mut self, policy: CorruptLinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the quarantine file for skipped lines.
    pub fn rejected_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".rejected");
        PathBuf::from(name)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Parses every persisted record.
    ///
    /// A missing file is an empty store.
    pub async fn read_all(&self) -> StoreResult<Vec<InventoryRecord>> {
        Ok(self.load().await?.records)
    }

    /// Next free id: `max(ids) + 1`, or `1` for an empty store.
    pub async fn next_id(&self) -> StoreResult<i64> {
        next_id_of(&self.read_all().await?)
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<InventoryRecord>> {
        Ok(self.read_all().await?.into_iter().find(|r| r.id == id))
    }

    /// First record whose name matches exactly.
    pub async fn find_by_name(&self, name: &str) -> StoreResult<Option<InventoryRecord>> {
        let name = name.trim();
        Ok(self.read_all().await?.into_iter().find(|r| r.name == name))
    }

    /// Case-insensitive search over each record's rendered block.
    pub async fn search(&self, query: &str) -> StoreResult<Vec<InventoryRecord>> {
        let records = self.read_all().await?;
        let matches: Vec<_> = records
            .into_iter()
            .filter(|r| r.matches_query(query))
            .collect();

        debug!(query = %query, count = matches.len(), "Search returned records");
        Ok(matches)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replaces the whole store atomically.
    pub async fn write_all(&self, records: &[InventoryRecord]) -> StoreResult<()> {
        let _guard = self.lock.lock().await;

        let loaded = self.load().await?;
        self.quarantine(&loaded.rejected).await?;
        self.persist(records).await
    }

    /// Adds a record, allocating its id inside the lock.
    pub async fn append(&self, mut new: NewRecord) -> StoreResult<InventoryRecord> {
        new.name = validate_name(&new.name)?;
        new.description = new.description.as_deref().map(validate_description).transpose()?;
        validate_dose_count(new.dose_count)?;

        let _guard = self.lock.lock().await;

        let Loaded { mut records, rejected } = self.load().await?;
        let record = InventoryRecord::from_new(next_id_of(&records)?, new);
        records.push(record.clone());

        self.quarantine(&rejected).await?;
        self.persist(&records).await?;

        info!(id = record.id, name = %record.name, "Record added");
        Ok(record)
    }

    /// Applies `mutator` to the record with `id` and persists the result.
    ///
    /// If the mutator fails nothing is written.
    pub async fn update<F>(&self, id: i64, mutator: F) -> StoreResult<InventoryRecord>
    where
        F: FnOnce(&mut InventoryRecord) -> CoreResult<()>,
    {
        let _guard = self.lock.lock().await;

        let Loaded { mut records, rejected } = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })?;

        mutator(record)?;
        validate_dose_count(record.dose_count)?;
        let updated = record.clone();

        self.quarantine(&rejected).await?;
        self.persist(&records).await?;

        info!(id, dose_count = updated.dose_count, "Record updated");
        Ok(updated)
    }

    /// Removes the record with `id` and returns it.
    pub async fn remove(&self, id: i64) -> StoreResult<InventoryRecord> {
        let _guard = self.lock.lock().await;

        let Loaded { mut records, rejected } = self.load().await?;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })?;
        let removed = records.remove(index);

        self.quarantine(&rejected).await?;
        self.persist(&records).await?;

        info!(id, name = %removed.name, "Record removed");
        Ok(removed)
    }

    // =========================================================================
    // File Handling
    // =========================================================================

    async fn load(&self) -> StoreResult<Loaded> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file missing, treating as empty");
                return Ok(Loaded::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut loaded = Loaded::default();
        for (index, raw) in text.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let line = index + 1;

            let parsed = serde_json::from_str::<InventoryRecord>(raw)
                .map_err(|e| e.to_string())
                .and_then(|record| match record.id {
                    id if id < 1 => Err(format!("_id must be at least 1, got {}", id)),
                    _ => Ok(record),
                });

            match parsed {
                Ok(record) => loaded.records.push(record),
                Err(reason) => match self.policy {
                    CorruptLinePolicy::Fail => {
                        return Err(StoreError::CorruptRecord { line, reason });
                    }
                    CorruptLinePolicy::Skip => {
                        warn!(line, error = %reason, "Skipping corrupt record line");
                        loaded.rejected.push(RejectedLine {
                            line,
                            raw: raw.to_string(),
                        });
                    }
                },
            }
        }

        Ok(loaded)
    }

    /// Appends skipped lines to the quarantine file.
    async fn quarantine(&self, rejected: &[RejectedLine]) -> StoreResult<()> {
        if rejected.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for entry in rejected {
            body.push_str(&entry.raw);
            body.push('\n');
        }

        let path = self.rejected_path();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;

        let lines: Vec<usize> = rejected.iter().map(|r| r.line).collect();
        warn!(path = %path.display(), ?lines, "Quarantined corrupt lines before rewrite");
        Ok(())
    }

    /// Temp file in the same directory, fsync, rename over the store.
    async fn persist(&self, records: &[InventoryRecord]) -> StoreResult<()> {
        let mut body = String::new();
        for record in records {
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, body.as_bytes())).await??;

        debug!(path = %self.path.display(), count = records.len(), "Store rewritten");
        Ok(())
    }
}

fn next_id_of(records: &[InventoryRecord]) -> StoreResult<i64> {
    match records.iter().map(|r| r.id).max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted { max }),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
