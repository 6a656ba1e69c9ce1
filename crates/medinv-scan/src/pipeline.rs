//! # Dispense Pipeline
//!
//! One dose leaves the cabinet when a known face and a fresh tag read
//! happen in the same cycle.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. BiometricMatcher::match_identities()    → [] ? NoMatch             │
//! │  2. TagScanner::scan(5s)                    → TimedOut / Duplicate ... │
//! │  3. RecordStore::update(tag_id, decrement)  → OutOfStock / NotFound    │
//! │  4. AuditLog: Dispense entry                                           │
//! │  5. SyncHandle::request_sync()              (fire-and-forget)          │
//! │  6. cool down (2s)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use medinv_core::{CoreError, InventoryRecord};
use medinv_store::{AuditLog, RecordStore, StoreError};
use medinv_sync::SyncHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ScanError, ScanResult};
use crate::reader::{ScanOutcome, TagScanner};

/// Recognises operators in front of the cabinet.
pub trait BiometricMatcher: Send + Sync {
    /// Indices of the known identities currently visible. May block.
    fn match_identities(&self) -> ScanResult<Vec<usize>>;
}

/// What one dispense cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No known identity in view; no scan was attempted.
    NoMatch,
    Dispensed { identity: usize, record: InventoryRecord },
    OutOfStock { id: i64, name: String },
    /// The tag names a record that is not in the store.
    UnknownRecord(i64),
    Duplicate(i64),
    TimedOut,
    /// The scan was cancelled from outside.
    Cancelled,
}

/// Pipeline timings.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub scan_timeout: Duration,
    pub cooldown: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            scan_timeout: Duration::from_secs(5),
            cooldown: Duration::from_secs(2),
        }
    }
}

pub struct DispensePipeline {
    store: Arc<RecordStore>,
    audit: Arc<AuditLog>,
    sync: SyncHandle,
    scanner: TagScanner,
    matcher: Arc<dyn BiometricMatcher>,
    config: PipelineConfig,
}

impl DispensePipeline {
    pub fn new(
        store: Arc<RecordStore>,
        audit: Arc<AuditLog>,
        sync: SyncHandle,
        scanner: TagScanner,
        matcher: Arc<dyn BiometricMatcher>,
        config: PipelineConfig,
    ) -> Self {
        DispensePipeline {
            store,
            audit,
            sync,
            scanner,
            matcher,
            config,
        }
    }

    /// Runs one cycle without a cooldown.
    pub async fn run_cycle(&self) -> ScanResult<CycleOutcome> {
        self.cycle(&CancellationToken::new()).await
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// Cycle errors are logged; the loop keeps going.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            scan_timeout_ms = self.config.scan_timeout.as_millis() as u64,
            "Dispense pipeline started"
        );

        while !shutdown.is_cancelled() {
            match self.cycle(&shutdown).await {
                Ok(CycleOutcome::Dispensed { identity, record }) => {
                    info!(identity, id = record.id, doses_left = record.dose_count, "Dose dispensed");
                }
                Ok(CycleOutcome::OutOfStock { id, name }) => {
                    warn!(id, name = %name, "Tag scanned for an empty record");
                }
                Ok(CycleOutcome::UnknownRecord(id)) => warn!(id, "Tag names an unknown record"),
                Ok(other) => debug!(outcome = ?other, "Dispense cycle finished"),
                Err(e) if e.is_hardware() => warn!(error = %e, "Tag read failed"),
                Err(e) => error!(error = %e, "Dispense cycle failed"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.cooldown) => {}
            }
        }

        info!("Dispense pipeline stopped");
    }

    async fn cycle(&self, cancel: &CancellationToken) -> ScanResult<CycleOutcome> {
        let matcher = self.matcher.clone();
        let identities = tokio::task::spawn_blocking(move || matcher.match_identities())
            .await
            .map_err(|e| ScanError::Matcher(e.to_string()))??;

        let Some(&identity) = identities.first() else {
            return Ok(CycleOutcome::NoMatch);
        };
        debug!(identity, matches = identities.len(), "Identity matched, scanning for tag");

        let event = match self.scanner.scan_linked(self.config.scan_timeout, cancel).await? {
            ScanOutcome::Tag(event) => event,
            ScanOutcome::Duplicate(id) => return Ok(CycleOutcome::Duplicate(id)),
            ScanOutcome::TimedOut => return Ok(CycleOutcome::TimedOut),
            ScanOutcome::NoEvent => return Ok(CycleOutcome::Cancelled),
        };

        let record = match self
            .store
            .update(event.tag_id, |r| r.decrement_dose().map(|_| ()))
            .await
        {
            Ok(record) => record,
            Err(StoreError::NotFound { id }) => return Ok(CycleOutcome::UnknownRecord(id)),
            Err(StoreError::Core(CoreError::OutOfStock { id, name })) => {
                return Ok(CycleOutcome::OutOfStock { id, name });
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.audit.record_dispensed(&record, identity).await {
            error!(error = %e, id = record.id, "Failed to write dispense audit entry");
        }
        self.sync.request_sync();

        Ok(CycleOutcome::Dispensed { identity, record })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
