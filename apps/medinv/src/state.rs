//! # Application State
//!
//! Everything a command needs, built once from [`MedinvConfig`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             AppState                                    │
//! │                                                                         │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────────────────────────┐ │
//! │  │ RecordStore  │ │  AuditLog    │ │ SyncEngine (if remote_url set)   │ │
//! │  │ inventory.txt│ │ database_    │ │                                  │ │
//! │  │              │ │ logs.txt     │ │  one-shot: cycle on flush()      │ │
//! │  │              │ │              │ │  station:  spawned loop +        │ │
//! │  │              │ │              │ │            SyncHandle nudges     │ │
//! │  └──────────────┘ └──────────────┘ └──────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A one-shot command process starts `Offline` and exits long before a
//! periodic tick, so mutations mark the state dirty and [`AppState::flush`]
//! runs a single full cycle before exit. Once [`AppState::start_sync`] has
//! spawned the loop, mutations nudge the running engine instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use medinv_core::SyncStatus;
use medinv_store::{AuditLog, RecordStore};
use medinv_sync::{HttpMirror, MedinvConfig, SyncEngine, SyncHandle, TcpProbe};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CommandError, CommandResult};

pub struct AppState {
    config: Arc<MedinvConfig>,
    store: Arc<RecordStore>,
    audit: Arc<AuditLog>,
    engine: Option<Arc<SyncEngine>>,
    sync: SyncHandle,
    pending_sync: AtomicBool,
}

impl AppState {
    /// Opens the local files and, when a remote is configured, builds the
    /// sync engine with the TCP probe and HTTP mirror.
    pub fn from_config(config: MedinvConfig) -> CommandResult<Self> {
        let config = Arc::new(config);
        let store = Arc::new(
            RecordStore::new(&config.store.data_file).with_policy(config.store.corrupt_lines),
        );
        let audit = Arc::new(AuditLog::new(&config.store.log_file));

        let engine = if config.is_sync_enabled() {
            let mirror = HttpMirror::from_config(&config)?;
            let probe = TcpProbe::from_config(&config);
            info!(remote = ?config.remote_url(), "Remote sync enabled");
            Some(Arc::new(SyncEngine::new(
                config.clone(),
                store.clone(),
                Arc::new(probe),
                Arc::new(mirror),
            )))
        } else {
            debug!("Remote sync disabled");
            None
        };

        Ok(Self::from_parts(config, store, audit, engine))
    }

    pub fn from_parts(
        config: Arc<MedinvConfig>,
        store: Arc<RecordStore>,
        audit: Arc<AuditLog>,
        engine: Option<Arc<SyncEngine>>,
    ) -> Self {
        AppState {
            config,
            store,
            audit,
            engine,
            sync: SyncHandle::disabled(),
            pending_sync: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MedinvConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn has_remote(&self) -> bool {
        self.engine.is_some()
    }

    pub fn sync_handle(&self) -> &SyncHandle {
        &self.sync
    }

    /// Current engine status. `Offline` when no remote is configured.
    pub fn sync_status(&self) -> SyncStatus {
        match (&self.engine, self.sync.is_enabled()) {
            (_, true) => self.sync.status(),
            (Some(engine), false) => engine.status(),
            (None, false) => SyncStatus::default(),
        }
    }

    /// Spawns the periodic sync loop. Does nothing without a remote.
    pub fn start_sync(&mut self, shutdown: CancellationToken) {
        if let Some(ref engine) = self.engine {
            self.sync = engine.clone().spawn(shutdown);
        }
    }

    /// Waits for the sync loop to stop after its token was cancelled.
    pub async fn stop_sync(&self) {
        self.sync.join().await;
    }

    /// Called after every local mutation.
    pub fn nudge_sync(&self) {
        if self.sync.is_enabled() {
            self.sync.request_sync();
        } else if self.engine.is_some() {
            self.pending_sync.store(true, Ordering::Release);
        }
    }

    /// Runs a full probe / connect / sync cycle and waits for it.
    pub async fn sync_now(&self) -> CommandResult<SyncStatus> {
        if self.sync.is_enabled() {
            return Ok(self.sync.run_now().await?);
        }

        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| CommandError::config("Remote sync is not configured (set sync.remote_url)"))?;

        self.pending_sync.store(false, Ordering::Release);
        Ok(engine.run_cycle().await)
    }

    /// Mirrors mutations made by a one-shot command before the process exits.
    ///
    /// Remote failures are logged, never returned: the local change already
    /// succeeded.
    pub async fn flush(&self) {
        if !self.pending_sync.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(ref engine) = self.engine else {
            return;
        };

        let status = engine.run_cycle().await;
        match status.last_error {
            Some(ref e) => warn!(state = %status.state, error = %e, "Changes kept locally, remote not updated"),
            None if status.is_online() => debug!("Remote mirror updated"),
            None => info!("Offline, changes kept locally until the next sync"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use medinv_core::{InventoryRecord, SyncState};
    use medinv_sync::{ConnectivityProbe, RemoteMirror, SyncResult};

    use super::*;

    pub(crate) struct FixedProbe(pub bool);

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn probe(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingMirror {
        pub inserted: AtomicUsize,
    }

    #[async_trait]
    impl RemoteMirror for CountingMirror {
        async fn connect(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn delete_all(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn insert_many(&self, records: &[InventoryRecord]) -> SyncResult<()> {
            self.inserted.fetch_add(records.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    /// State over a temp dir. `online` of `None` means no remote at all.
    pub(crate) fn test_state(
        dir: &tempfile::TempDir,
        online: Option<bool>,
    ) -> (AppState, Arc<CountingMirror>) {
        let mut config = MedinvConfig::default();
        config.store.data_file = dir.path().join("inventory.txt");
        config.store.log_file = dir.path().join("database_logs.txt");
        let config = Arc::new(config);

        let store = Arc::new(RecordStore::new(&config.store.data_file));
        let audit = Arc::new(AuditLog::new(&config.store.log_file));
        let mirror = Arc::new(CountingMirror::default());

        let engine = online.map(|online| {
            Arc::new(SyncEngine::new(
                config.clone(),
                store.clone(),
                Arc::new(FixedProbe(online)),
                mirror.clone(),
            ))
        });

        (AppState::from_parts(config, store, audit, engine), mirror)
    }

    #[tokio::test]
    async fn test_from_config_without_remote() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MedinvConfig::default();
        config.store.data_file = dir.path().join("inventory.txt");

        let state = AppState::from_config(config).unwrap();
        assert!(!state.has_remote());
        assert_eq!(state.sync_status().state, SyncState::Offline);
        assert!(state.sync_now().await.is_err());
    }

    #[tokio::test]
    async fn test_flush_runs_one_cycle_after_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mirror) = test_state(&dir, Some(true));

        state.flush().await;
        assert_eq!(state.sync_status().state, SyncState::Offline);

        state.nudge_sync();
        state.flush().await;
        assert_eq!(state.sync_status().state, SyncState::Online);
        assert_eq!(mirror.inserted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawned_loop_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _mirror) = test_state(&dir, Some(false));
        let shutdown = CancellationToken::new();

        state.start_sync(shutdown.clone());
        assert!(state.sync_handle().is_enabled());

        let status = state.sync_now().await.unwrap();
        assert_eq!(status.state, SyncState::Offline);

        shutdown.cancel();
        state.stop_sync().await;
    }
}
