//! # Sync Engine
//!
//! Mirrors the local store into the remote whenever connectivity allows.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Cycle (every 60s)                           │
//! │                                                                         │
//! │                       probe() == false                                  │
//! │          ┌──────────────────────────────────────────────┐              │
//! │          ▼                                              │              │
//! │   ┌─────────────┐   probe() && connect() ok    ┌─────────────┐         │
//! │   │   OFFLINE   │ ───────────────────────────► │   ONLINE    │         │
//! │   │  (initial)  │                              │             │         │
//! │   └─────────────┘ ◄─── connect() failed ──┐    └──────┬──────┘         │
//! │          │                                │           │                │
//! │          └──── probe() && connect() ──────┘           │ probe() ok     │
//! │                                                       ▼                │
//! │                                             delete_all()               │
//! │                                             insert_many(records)       │
//! │                                                                         │
//! │  Out-of-band: every local mutation calls request_sync(), which syncs   │
//! │  only if already ONLINE. Remote failures are logged and stored in      │
//! │  last_error; they never reach the caller and never change the state.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cycles and out-of-band attempts share one lock, so two delete/insert
//! sequences never interleave on the remote.

use std::sync::Arc;

use chrono::Utc;
use medinv_core::{SyncState, SyncStatus};
use medinv_store::RecordStore;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MedinvConfig;
use crate::connectivity::ConnectivityProbe;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteMirror;

/// Pending out-of-band requests beyond this are coalesced.
const COMMAND_BUFFER: usize = 8;

// =============================================================================
// Engine
// =============================================================================

/// The Offline/Online state machine and full-replace sync.
pub struct SyncEngine {
    config: Arc<MedinvConfig>,
    store: Arc<RecordStore>,
    probe: Arc<dyn ConnectivityProbe>,
    mirror: Arc<dyn RemoteMirror>,
    status_tx: watch::Sender<SyncStatus>,
    cycle_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        config: Arc<MedinvConfig>,
        store: Arc<RecordStore>,
        probe: Arc<dyn ConnectivityProbe>,
        mirror: Arc<dyn RemoteMirror>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::default());

        SyncEngine {
            config,
            store,
            probe,
            mirror,
            status_tx,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Runs one probe / connect / sync cycle.
    pub async fn run_cycle(&self) -> SyncStatus {
        let _guard = self.cycle_lock.lock().await;

        if !self.probe.probe().await {
            if self.status().is_online() {
                info!("Connectivity lost, going offline");
            } else {
                debug!("No connectivity, staying offline");
            }
            self.set_state(SyncState::Offline);
            return self.status();
        }

        if !self.status().is_online() {
            match self.mirror.connect().await {
                Ok(()) => {
                    info!("Remote session opened, going online");
                    self.set_state(SyncState::Online);
                }
                Err(e) => {
                    warn!(error = %e, "Remote connect failed, staying offline");
                    self.record_error(&e);
                    return self.status();
                }
            }
        }

        self.sync_locked().await;
        self.status()
    }

    /// Syncs only if already online. Never probes or connects.
    pub async fn sync_if_online(&self) -> SyncStatus {
        let _guard = self.cycle_lock.lock().await;

        if !self.status().is_online() {
            debug!("Offline, skipping out-of-band sync");
            return self.status();
        }

        self.sync_locked().await;
        self.status()
    }

    /// Starts the periodic loop. The first cycle runs immediately.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> SyncHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let status_rx = self.subscribe();

        let task = tokio::spawn(self.run(cmd_rx, shutdown));

        SyncHandle {
            cmd_tx: Some(cmd_tx),
            status_rx,
            task: Some(Arc::new(Mutex::new(Some(task)))),
        }
    }

    async fn run(self: Arc<Self>, mut cmd_rx: mpsc::Receiver<SyncCommand>, shutdown: CancellationToken) {
        info!(
            device_id = %self.config.device_id(),
            interval_secs = self.config.sync.interval_secs,
            "Sync engine started"
        );

        let mut interval = tokio::time::interval(self.config.sync.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Sync engine shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.run_cycle().await;
                }

                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        SyncCommand::SyncIfOnline => {
                            self.sync_if_online().await;
                        }
                        SyncCommand::RunCycle(reply) => {
                            let status = self.run_cycle().await;
                            let _ = reply.send(status);
                        }
                    }
                }
            }
        }

        info!("Sync engine stopped");
    }

    // =========================================================================
    // Full Sync
    // =========================================================================

    /// Caller must hold `cycle_lock`.
    async fn sync_locked(&self) {
        match self.full_sync().await {
            Ok(count) => {
                info!(count, "Remote mirror replaced");
                self.status_tx.send_modify(|s| {
                    s.last_sync = Some(Utc::now());
                    s.last_error = None;
                });
            }
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "Sync failed");
                self.record_error(&e);
            }
        }
    }

    async fn full_sync(&self) -> SyncResult<usize> {
        let records = self.store.read_all().await?;

        self.mirror.delete_all().await?;
        if !records.is_empty() {
            self.mirror.insert_many(&records).await?;
        }

        Ok(records.len())
    }

    fn set_state(&self, state: SyncState) {
        self.status_tx.send_if_modified(|s| {
            if s.state == state {
                return false;
            }
            s.state = state;
            true
        });
    }

    fn record_error(&self, err: &SyncError) {
        let message = err.to_string();
        self.status_tx.send_modify(|s| s.last_error = Some(message));
    }
}

// =============================================================================
// Handle
// =============================================================================

#[derive(Debug)]
enum SyncCommand {
    SyncIfOnline,
    RunCycle(oneshot::Sender<SyncStatus>),
}

/// Cloneable handle to a running (or disabled) engine.
#[derive(Clone)]
pub struct SyncHandle {
    cmd_tx: Option<mpsc::Sender<SyncCommand>>,
    status_rx: watch::Receiver<SyncStatus>,
    task: Option<Arc<Mutex<Option<JoinHandle<()>>>>>,
}

impl SyncHandle {
    /// Handle for a device without a remote. Requests are ignored and the
    /// status stays `Offline`.
    pub fn disabled() -> Self {
        let (_, status_rx) = watch::channel(SyncStatus::default());
        SyncHandle {
            cmd_tx: None,
            status_rx,
            task: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cmd_tx.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        self.status_rx.borrow().clone()
    }

    /// Fire-and-forget nudge after a local mutation.
    ///
    /// Never blocks and never fails; if requests are already queued this
    /// one is folded into them.
    pub fn request_sync(&self) {
        let Some(ref tx) = self.cmd_tx else {
            return;
        };

        match tx.try_send(SyncCommand::SyncIfOnline) {
            Ok(()) => debug!("Out-of-band sync requested"),
            Err(mpsc::error::TrySendError::Full(_)) => debug!("Sync already pending"),
            Err(mpsc::error::TrySendError::Closed(_)) => debug!("Sync engine stopped, request dropped"),
        }
    }

    /// Runs a full cycle now and waits for the result.
    pub async fn run_now(&self) -> SyncResult<SyncStatus> {
        let tx = self
            .cmd_tx
            .as_ref()
            .ok_or_else(|| SyncError::InvalidConfig("remote sync is not configured".into()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SyncCommand::RunCycle(reply_tx))
            .await
            .map_err(|_| SyncError::ShuttingDown)?;

        reply_rx.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Waits for the engine task to finish after its token was cancelled.
    pub async fn join(&self) {
        let Some(ref task) = self.task else {
            return;
        };

        if let Some(handle) = task.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Sync engine task failed");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use medinv_core::{InventoryRecord, NewRecord};

    use super::*;

    struct ScriptedProbe {
        online: AtomicBool,
    }

    impl ScriptedProbe {
        fn new(online: bool) -> Arc<Self> {
            Arc::new(ScriptedProbe {
                online: AtomicBool::new(online),
            })
        }

        fn set(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ConnectivityProbe for ScriptedProbe {
        async fn probe(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct RecordingMirror {
        calls: StdMutex<Vec<String>>,
        fail_connect: AtomicBool,
        fail_delete: AtomicBool,
        slow_delete: AtomicBool,
    }

    impl RecordingMirror {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RemoteMirror for RecordingMirror {
        async fn connect(&self) -> SyncResult<()> {
            self.push("connect".into());
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(SyncError::ConnectionFailed("refused".into()));
            }
            Ok(())
        }

        async fn delete_all(&self) -> SyncResult<()> {
            self.push("delete_all".into());
            if self.slow_delete.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(SyncError::Remote {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(())
        }

        async fn insert_many(&self, records: &[InventoryRecord]) -> SyncResult<()> {
            self.push(format!("insert_many({})", records.len()));
            Ok(())
        }
    }

    async fn store_with(dir: &tempfile::TempDir, count: usize) -> Arc<RecordStore> {
        let store = Arc::new(RecordStore::new(dir.path().join("inventory.txt")));
        for i in 0..count {
            store
                .append(NewRecord {
                    name: format!("Item {}", i),
                    dose_count: 1,
                    expiry: None,
                    description: None,
                })
                .await
                .unwrap();
        }
        store
    }

    fn engine(
        store: Arc<RecordStore>,
        probe: Arc<ScriptedProbe>,
        mirror: Arc<RecordingMirror>,
    ) -> SyncEngine {
        SyncEngine::new(Arc::new(MedinvConfig::default()), store, probe, mirror)
    }

    #[tokio::test]
    async fn test_probe_false_stays_offline_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 2).await, ScriptedProbe::new(false), mirror.clone());

        let status = engine.run_cycle().await;
        assert_eq!(status.state, SyncState::Offline);
        assert!(mirror.calls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_stays_offline_and_is_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        mirror.fail_connect.store(true, Ordering::SeqCst);
        let engine = engine(store_with(&dir, 2).await, ScriptedProbe::new(true), mirror.clone());

        let status = engine.run_cycle().await;
        assert_eq!(status.state, SyncState::Offline);
        assert!(status.last_error.is_some());
        assert_eq!(mirror.calls(), vec!["connect"]);
    }

    #[tokio::test]
    async fn test_online_cycle_replaces_remote() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 2).await, ScriptedProbe::new(true), mirror.clone());

        let status = engine.run_cycle().await;
        assert_eq!(status.state, SyncState::Online);
        assert!(status.last_sync.is_some());
        assert_eq!(mirror.calls(), vec!["connect", "delete_all", "insert_many(2)"]);

        // already online: no reconnect
        engine.run_cycle().await;
        assert_eq!(
            mirror.calls()[3..],
            ["delete_all".to_string(), "insert_many(2)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_store_skips_insert() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 0).await, ScriptedProbe::new(true), mirror.clone());

        engine.run_cycle().await;
        assert_eq!(mirror.calls(), vec!["connect", "delete_all"]);
    }

    #[tokio::test]
    async fn test_sync_if_online_requires_online() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 1).await, ScriptedProbe::new(true), mirror.clone());

        engine.sync_if_online().await;
        assert!(mirror.calls().is_empty());

        engine.run_cycle().await;
        engine.sync_if_online().await;
        assert_eq!(
            mirror.calls(),
            vec!["connect", "delete_all", "insert_many(1)", "delete_all", "insert_many(1)"]
        );
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_state_and_records_error() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 1).await, ScriptedProbe::new(true), mirror.clone());
        engine.run_cycle().await;

        mirror.fail_delete.store(true, Ordering::SeqCst);
        let status = engine.sync_if_online().await;
        assert_eq!(status.state, SyncState::Online);
        assert!(status.last_error.as_deref().unwrap_or("").contains("503"));

        mirror.fail_delete.store(false, Ordering::SeqCst);
        let status = engine.sync_if_online().await;
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_losing_connectivity_goes_offline() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ScriptedProbe::new(true);
        let mirror = Arc::new(RecordingMirror::default());
        let engine = engine(store_with(&dir, 1).await, probe.clone(), mirror.clone());

        assert!(engine.run_cycle().await.is_online());
        probe.set(false);
        assert!(!engine.run_cycle().await.is_online());

        // back online requires a new connect
        probe.set(true);
        engine.run_cycle().await;
        assert_eq!(mirror.calls().iter().filter(|c| *c == "connect").count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = Arc::new(engine(store_with(&dir, 1).await, ScriptedProbe::new(true), mirror.clone()));
        engine.run_cycle().await;
        mirror.slow_delete.store(true, Ordering::SeqCst);

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move { engine.sync_if_online().await }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let calls = mirror.calls();
        for pair in calls[1..].chunks(2) {
            assert_eq!(pair, ["delete_all".to_string(), "insert_many(1)".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_spawned_engine_runs_first_cycle_and_accepts_requests() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Arc::new(RecordingMirror::default());
        let engine = Arc::new(engine(store_with(&dir, 1).await, ScriptedProbe::new(true), mirror.clone()));
        let token = CancellationToken::new();

        let handle = engine.spawn(token.clone());
        let status = handle.run_now().await.unwrap();
        assert!(status.is_online());
        assert!(handle.status().is_online());

        let before = mirror.calls().len();
        handle.request_sync();
        for _ in 0..50 {
            if mirror.calls().len() > before {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(mirror.calls().len() > before);

        token.cancel();
        handle.join().await;
        assert!(matches!(handle.run_now().await, Err(SyncError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_disabled_handle() {
        let handle = SyncHandle::disabled();
        assert!(!handle.is_enabled());
        handle.request_sync();
        assert_eq!(handle.status().state, SyncState::Offline);
        assert!(handle.run_now().await.is_err());
    }
}
