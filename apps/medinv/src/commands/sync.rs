//! # Sync Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status   - device, files, record count, remote and engine state       │
//! │  sync     - one probe / connect / full-replace cycle, then its status  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use medinv_core::{SyncState, SyncStatus};
use serde::Serialize;

use crate::error::CommandResult;
use crate::state::AppState;

/// What `medinv status` prints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub device_id: String,
    pub device_name: String,
    pub data_file: PathBuf,
    pub log_file: PathBuf,
    pub record_count: usize,

    /// `None` when no remote is configured.
    pub remote_url: Option<String>,
    pub state: SyncState,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub async fn status(state: &AppState) -> CommandResult<StatusReport> {
    let config = state.config();
    let record_count = state.store().read_all().await?.len();
    let SyncStatus {
        state: sync_state,
        last_sync,
        last_error,
    } = state.sync_status();

    Ok(StatusReport {
        device_id: config.device.id.clone(),
        device_name: config.device.name.clone(),
        data_file: config.store.data_file.clone(),
        log_file: config.store.log_file.clone(),
        record_count,
        remote_url: state.has_remote().then(|| config.remote_url().unwrap_or_default().to_string()),
        state: sync_state,
        last_sync,
        last_error,
    })
}

/// Runs one full cycle and returns the resulting status.
pub async fn sync_now(state: &AppState) -> CommandResult<SyncStatus> {
    state.sync_now().await
}
