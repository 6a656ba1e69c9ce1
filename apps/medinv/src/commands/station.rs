//! # Station Commands
//!
//! The long-running cabinet mode and single dispense cycles.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  medinv run [--operator N]                                              │
//! │                                                                         │
//! │   ┌───────────────┐        ┌──────────────────────────────────────┐    │
//! │   │ SyncEngine    │◄───────│ DispensePipeline (only with          │    │
//! │   │ loop (60s)    │ nudge  │ --operator and scan.reader_path)     │    │
//! │   └───────────────┘        └──────────────────────────────────────┘    │
//! │           ▲                                  ▲                          │
//! │           └───────── shutdown token ─────────┘                          │
//! │                     (SIGINT / SIGTERM)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Face recognition is not part of this build. The operator identity is
//! given on the command line and [`FixedIdentityMatcher`] reports it as
//! matched on every cycle.

use std::sync::Arc;

use medinv_core::DedupWindow;
use medinv_scan::{
    BiometricMatcher, CycleOutcome, DispensePipeline, LineTagSource, PipelineConfig, ScanResult,
    TagScanner, TagScannerConfig, TagSource,
};
use medinv_sync::SyncHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{CommandError, CommandResult};
use crate::state::AppState;

/// Matcher for a station whose operator identified themselves up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentityMatcher {
    identity: usize,
}

impl FixedIdentityMatcher {
    pub fn new(identity: usize) -> Self {
        FixedIdentityMatcher { identity }
    }
}

impl BiometricMatcher for FixedIdentityMatcher {
    fn match_identities(&self) -> ScanResult<Vec<usize>> {
        Ok(vec![self.identity])
    }
}

/// Opens the tag reader named by `scan.reader_path`.
pub fn open_reader(state: &AppState) -> CommandResult<Arc<dyn TagSource>> {
    let path = state
        .config()
        .scan
        .reader_path
        .as_deref()
        .ok_or_else(|| CommandError::config("No tag reader configured (set scan.reader_path)"))?;

    Ok(Arc::new(LineTagSource::open_path(path)?))
}

fn build_pipeline(
    state: &AppState,
    source: Arc<dyn TagSource>,
    sync: SyncHandle,
    operator: usize,
) -> DispensePipeline {
    let scan = &state.config().scan;
    let scanner = TagScanner::new(
        source,
        DedupWindow::new(scan.dedup_config()),
        TagScannerConfig {
            format: scan.tag_format(),
            poll_interval: scan.poll_interval(),
            warmup: scan.warmup(),
        },
    );

    DispensePipeline::new(
        state.store().clone(),
        state.audit().clone(),
        sync,
        scanner,
        Arc::new(FixedIdentityMatcher::new(operator)),
        PipelineConfig {
            scan_timeout: scan.timeout(),
            cooldown: scan.cooldown(),
        },
    )
}

/// Runs one dispense cycle for `operator`.
pub async fn dispense_once(
    state: &AppState,
    source: Arc<dyn TagSource>,
    operator: usize,
) -> CommandResult<CycleOutcome> {
    let pipeline = build_pipeline(state, source, state.sync_handle().clone(), operator);
    let outcome = pipeline.run_cycle().await?;

    if matches!(outcome, CycleOutcome::Dispensed { .. }) {
        state.nudge_sync();
    }
    Ok(outcome)
}

/// Runs the sync loop, plus the dispense loop when `operator` is given,
/// until `shutdown` is cancelled.
pub async fn run_station(
    state: &mut AppState,
    operator: Option<usize>,
    shutdown: CancellationToken,
) -> CommandResult<()> {
    let source = operator.map(|_| open_reader(state)).transpose()?;

    state.start_sync(shutdown.clone());
    info!(
        device_id = %state.config().device_id(),
        remote = state.has_remote(),
        dispensing = operator.is_some(),
        "Station running, Ctrl-C to stop"
    );

    match (operator, source) {
        (Some(operator), Some(source)) => {
            let pipeline = build_pipeline(state, source, state.sync_handle().clone(), operator);
            pipeline.run(shutdown.clone()).await;
        }
        _ => shutdown.cancelled().await,
    }

    state.stop_sync().await;
    info!("Station stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use medinv_core::NewRecord;
    use medinv_scan::TagSession;

    use super::*;
    use crate::error::ErrorCode;
    use crate::state::tests::test_state;

    struct Replay(Mutex<VecDeque<String>>);

    struct ReplaySession(Option<String>);

    impl TagSource for Replay {
        fn open(&self) -> ScanResult<Box<dyn TagSession>> {
            Ok(Box::new(ReplaySession(self.0.lock().unwrap().pop_front())))
        }
    }

    impl TagSession for ReplaySession {
        fn poll(&mut self, wait: Duration) -> ScanResult<Option<String>> {
            if self.0.is_none() {
                std::thread::sleep(wait);
            }
            Ok(self.0.take())
        }
    }

    fn replay(payloads: &[&str]) -> Arc<dyn TagSource> {
        Arc::new(Replay(Mutex::new(
            payloads.iter().map(|p| p.to_string()).collect(),
        )))
    }

    async fn seed(state: &AppState, doses: i64) {
        state
            .store()
            .append(NewRecord {
                name: "Morphine".into(),
                dose_count: doses,
                expiry: None,
                description: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispense_once_decrements_and_marks_sync() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mirror) = test_state(&dir, Some(true));
        seed(&state, 2).await;

        let outcome = dispense_once(&state, replay(&["enNFCNASAMED%lot%1"]), 4)
            .await
            .unwrap();
        match outcome {
            CycleOutcome::Dispensed { identity, record } => {
                assert_eq!(identity, 4);
                assert_eq!(record.dose_count, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        state.flush().await;
        assert_eq!(mirror.inserted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispense_once_out_of_stock() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);
        seed(&state, 0).await;

        let outcome = dispense_once(&state, replay(&["enNFCNASAMED%lot%1"]), 0)
            .await
            .unwrap();
        assert!(matches!(outcome, CycleOutcome::OutOfStock { id: 1, .. }));
    }

    #[tokio::test]
    async fn test_malformed_tag_is_hardware_error() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        let err = dispense_once(&state, replay(&["NFCNASAMED%lot"]), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::HardwareError);
    }

    #[tokio::test]
    async fn test_open_reader_requires_path() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        let err = open_reader(&state).err().unwrap();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_run_station_sync_only_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _) = test_state(&dir, Some(false));
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), run_station(&mut state, None, shutdown))
            .await
            .unwrap()
            .unwrap();
    }
}
