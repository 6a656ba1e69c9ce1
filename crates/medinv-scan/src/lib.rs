//! # medinv-scan: Hardware-Triggered Dispensing
//!
//! Blocking hardware reads run on dedicated threads under a deadline; the
//! async side only ever sees a value, a typed error, or `TimedOut`.
//!
//! ## Module Organization
//!
//! - [`bounded`] - Deadline runner with cooperative cancellation
//! - [`reader`] - Tag source seam, line reader, tag scanner
//! - [`pipeline`] - Biometric + tag dispense cycle
//! - [`error`] - Scan error types

pub mod bounded;
pub mod error;
pub mod pipeline;
pub mod reader;

pub use bounded::{BoundedOutcome, BoundedScanner};
pub use error::{ScanError, ScanResult};
pub use pipeline::{BiometricMatcher, CycleOutcome, DispensePipeline, PipelineConfig};
pub use reader::{LineTagSource, ScanOutcome, TagScanner, TagScannerConfig, TagSession, TagSource};
