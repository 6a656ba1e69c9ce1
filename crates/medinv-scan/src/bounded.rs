//! # Bounded Scanner
//!
//! Runs a blocking hardware worker with a deadline.
//!
//! ## Deadline Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller                         blocking worker (spawn_blocking)       │
//! │    │                                   │                                │
//! │    │── spawn(worker, token.clone()) ──►│ loop {                         │
//! │    │                                   │   if token.is_cancelled()     │
//! │    │   timeout(5s, join)               │       → return Ok(None)       │
//! │    │                                   │   poll hardware (≈100ms)      │
//! │    │                                   │ }                              │
//! │    │                                   │                                │
//! │    ├── worker finished first ─────────►│ Completed / NoEvent / Err     │
//! │    │                                   │                                │
//! │    └── deadline first                  │                                │
//! │          token.cancel() ──────────────►│ sees cancel on next poll      │
//! │          await join ◄──────────────────│ exits, releases hardware      │
//! │          TimedOut                      │                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A worker error or panic is only reported after the worker thread has
//! terminated. An error that arrives after the deadline is logged and
//! dropped, since the caller already has its `TimedOut`.

use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ScanError, ScanResult};

/// Default worker poll granularity.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a bounded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundedOutcome<T> {
    /// The worker produced a value before the deadline.
    Completed(T),
    /// The worker finished without producing anything.
    NoEvent,
    /// The deadline passed; the worker was cancelled and has exited.
    TimedOut,
}

/// Deadline runner for blocking workers.
#[derive(Debug, Clone, Copy)]
pub struct BoundedScanner {
    poll_interval: Duration,
}

impl Default for BoundedScanner {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl BoundedScanner {
    pub fn new(poll_interval: Duration) -> Self {
        BoundedScanner { poll_interval }
    }

    /// How often workers are expected to check their token.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Runs `worker` on a blocking thread for at most `timeout`.
    pub async fn run<T, F>(&self, timeout: Duration, worker: F) -> ScanResult<BoundedOutcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> ScanResult<Option<T>> + Send + 'static,
    {
        self.run_linked(timeout, &CancellationToken::new(), worker).await
    }

    /// Like [`run`](Self::run), but the worker is also cancelled when
    /// `parent` is.
    pub async fn run_linked<T, F>(
        &self,
        timeout: Duration,
        parent: &CancellationToken,
        worker: F,
    ) -> ScanResult<BoundedOutcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> ScanResult<Option<T>> + Send + 'static,
    {
        let token = parent.child_token();
        // dropping this future mid-scan still stops the worker
        let _cancel_on_drop = token.clone().drop_guard();

        let worker_token = token.clone();
        let mut handle = tokio::task::spawn_blocking(move || worker(worker_token));

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => finish(joined),
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Scan deadline reached, cancelling worker");
                token.cancel();

                match handle.await {
                    Ok(Ok(Some(_))) => debug!("Worker produced a value after the deadline, discarded"),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Worker failed after cancellation, discarded"),
                    Err(e) => warn!(error = %e, "Worker panicked after cancellation"),
                }

                Ok(BoundedOutcome::TimedOut)
            }
        }
    }
}

fn finish<T>(joined: Result<ScanResult<Option<T>>, JoinError>) -> ScanResult<BoundedOutcome<T>> {
    match joined {
        Ok(Ok(Some(value))) => Ok(BoundedOutcome::Completed(value)),
        Ok(Ok(None)) => Ok(BoundedOutcome::NoEvent),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(ScanError::WorkerPanicked(e.to_string())),
    }
}

/// Sleeps for `total` in `step` slices. Returns false if cancelled.
pub fn sleep_cancellable(total: Duration, step: Duration, token: &CancellationToken) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if token.is_cancelled() {
            return false;
        }
        let slice = remaining.min(step);
        std::thread::sleep(slice);
        remaining -= slice;
    }
    !token.is_cancelled()
}
