//! # Scan Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Hardware           reader could not be opened or stopped answering    │
//! │  MalformedPayload   our marker, unreadable id (a bad read)             │
//! │  WorkerPanicked     blocking worker died                               │
//! │  Matcher            biometric matcher failed                           │
//! │  Store              decrement could not be persisted                   │
//! │                                                                         │
//! │  A timeout is NOT an error: it is ScanOutcome::TimedOut.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Hardware read failed: {0}")]
    Hardware(String),

    #[error("Malformed tag payload: {0}")]
    MalformedPayload(String),

    #[error("Scan worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Biometric matcher failed: {0}")]
    Matcher(String),

    #[error("Store error: {0}")]
    Store(#[from] medinv_store::StoreError),
}

impl ScanError {
    /// Read failures the operator can retry by presenting the tag again.
    pub fn is_hardware(&self) -> bool {
        matches!(self, ScanError::Hardware(_) | ScanError::MalformedPayload(_))
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Hardware(err.to_string())
    }
}
