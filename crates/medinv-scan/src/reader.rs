//! # Tag Reader
//!
//! Hardware seam plus the tag scanner that sits on top of it.
//!
//! ## Scan Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TagScanner::scan(timeout)                                              │
//! │       │                                                                 │
//! │       ▼  (blocking worker, bounded by BoundedScanner)                  │
//! │  TagSource::open()  → TagSession          hardware on                  │
//! │       │                                                                 │
//! │  warm-up (1s, cancellable)                                             │
//! │       │                                                                 │
//! │  loop: session.poll(100ms)                                             │
//! │       │   payload ─► parse_payload ─┬─ Unknown   → keep polling        │
//! │       │                             ├─ Malformed → ScanError           │
//! │       │                             └─ Record(id)                      │
//! │       │                                   │                             │
//! │       │                             DedupWindow::should_accept         │
//! │       │                                   ├─ true  → Tag(ScanEvent)    │
//! │       │                                   └─ false → Duplicate(id)     │
//! │       ▼                                                                 │
//! │  session dropped                          hardware off                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use medinv_core::tag::{parse_payload, ParsedTag, TagFormat};
use medinv_core::{DedupWindow, ScanEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bounded::{sleep_cancellable, BoundedOutcome, BoundedScanner};
use crate::error::{ScanError, ScanResult};

// =============================================================================
// Hardware Seam
// =============================================================================

/// Something that can be switched on to read tags.
pub trait TagSource: Send + Sync {
    /// Switches the reader on. Dropping the session switches it off.
    fn open(&self) -> ScanResult<Box<dyn TagSession>>;
}

/// An open reader.
pub trait TagSession: Send {
    /// Waits up to `wait` for one raw payload.
    fn poll(&mut self, wait: Duration) -> ScanResult<Option<String>>;
}

// =============================================================================
// Line Tag Source
// =============================================================================

/// Reads one payload per line from a device or pipe (a serial NFC bridge
/// printing NDEF text records).
///
/// A driver thread owns the reader for the life of the source. Lines that
/// arrive while no session is open are discarded when the next session
/// opens.
#[derive(Debug)]
pub struct LineTagSource {
    lines: Arc<Mutex<Receiver<std::io::Result<String>>>>,
}

impl LineTagSource {
    /// Opens `path` and starts the driver thread.
    pub fn open_path(path: &Path) -> ScanResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| ScanError::Hardware(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Tag reader opened");
        Ok(Self::from_reader(std::io::BufReader::new(file)))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Tag reader driver stopped");
        });

        LineTagSource {
            lines: Arc::new(Mutex::new(rx)),
        }
    }
}

impl TagSource for LineTagSource {
    fn open(&self) -> ScanResult<Box<dyn TagSession>> {
        let stale = {
            let rx = self.lines.lock().unwrap_or_else(|p| p.into_inner());
            rx.try_iter().count()
        };
        if stale > 0 {
            trace!(stale, "Discarded reads from before the session");
        }

        Ok(Box::new(LineTagSession {
            lines: self.lines.clone(),
        }))
    }
}

struct LineTagSession {
    lines: Arc<Mutex<Receiver<std::io::Result<String>>>>,
}

impl TagSession for LineTagSession {
    fn poll(&mut self, wait: Duration) -> ScanResult<Option<String>> {
        let rx = self.lines.lock().unwrap_or_else(|p| p.into_inner());

        match rx.recv_timeout(wait) {
            Ok(Ok(line)) => {
                let line = line.trim();
                Ok((!line.is_empty()).then(|| line.to_string()))
            }
            Ok(Err(e)) => Err(ScanError::Hardware(e.to_string())),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ScanError::Hardware("tag reader closed".into())),
        }
    }
}

// =============================================================================
// Tag Scanner
// =============================================================================

/// What one scan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A fresh read of one of our tags.
    Tag(ScanEvent),
    /// Our tag, but read again inside the dedup window.
    Duplicate(i64),
    /// The worker stopped without a read (cancelled from outside).
    NoEvent,
    /// Nothing within the deadline.
    TimedOut,
}

/// Tunables for [`TagScanner`].
#[derive(Debug, Clone)]
pub struct TagScannerConfig {
    pub format: TagFormat,
    pub poll_interval: Duration,
    pub warmup: Duration,
}

impl Default for TagScannerConfig {
    fn default() -> Self {
        TagScannerConfig {
            format: TagFormat::default(),
            poll_interval: crate::bounded::DEFAULT_POLL_INTERVAL,
            warmup: Duration::from_secs(1),
        }
    }
}

/// Bounded, deduplicated tag reads.
pub struct TagScanner {
    source: Arc<dyn TagSource>,
    dedup: Arc<Mutex<DedupWindow>>,
    config: TagScannerConfig,
    bounded: BoundedScanner,
}

impl TagScanner {
    pub fn new(source: Arc<dyn TagSource>, dedup: DedupWindow, config: TagScannerConfig) -> Self {
        let bounded = BoundedScanner::new(config.poll_interval);
        TagScanner {
            source,
            dedup: Arc::new(Mutex::new(dedup)),
            config,
            bounded,
        }
    }

    /// Scans for one tag for at most `timeout`.
    pub async fn scan(&self, timeout: Duration) -> ScanResult<ScanOutcome> {
        self.scan_linked(timeout, &CancellationToken::new()).await
    }

    /// Scans for one tag; also stops when `parent` is cancelled.
    pub async fn scan_linked(&self, timeout: Duration, parent: &CancellationToken) -> ScanResult<ScanOutcome> {
        let source = self.source.clone();
        let dedup = self.dedup.clone();
        let config = self.config.clone();

        let outcome = self
            .bounded
            .run_linked(timeout, parent, move |token| scan_worker(source.as_ref(), &dedup, &config, &token))
            .await?;

        Ok(match outcome {
            BoundedOutcome::Completed(outcome) => outcome,
            BoundedOutcome::NoEvent => ScanOutcome::NoEvent,
            BoundedOutcome::TimedOut => ScanOutcome::TimedOut,
        })
    }
}

fn scan_worker(
    source: &dyn TagSource,
    dedup: &Mutex<DedupWindow>,
    config: &TagScannerConfig,
    token: &CancellationToken,
) -> ScanResult<Option<ScanOutcome>> {
    let mut session = source.open()?;

    if !sleep_cancellable(config.warmup, config.poll_interval, token) {
        return Ok(None);
    }

    while !token.is_cancelled() {
        let Some(payload) = session.poll(config.poll_interval)? else {
            continue;
        };

        match parse_payload(&payload, &config.format) {
            ParsedTag::Unknown => {
                trace!("Ignoring foreign tag");
            }
            ParsedTag::Malformed(reason) => {
                warn!(reason = %reason, "Malformed tag payload");
                return Err(ScanError::MalformedPayload(reason));
            }
            ParsedTag::Record(tag_id) => {
                let accepted = dedup
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .should_accept(tag_id, Instant::now());

                if !accepted {
                    debug!(tag_id, "Duplicate tag read");
                    return Ok(Some(ScanOutcome::Duplicate(tag_id)));
                }

                debug!(tag_id, "Tag accepted");
                return Ok(Some(ScanOutcome::Tag(ScanEvent {
                    tag_id,
                    observed_at: Utc::now(),
                })));
            }
        }
    }

    Ok(None)
}

// =============================================================================
// Unit Tests
// =============================================================================
