//! # Store Error Types
//!
//! Error types for record store and audit log operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / serde_json::Error / CoreError                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds line numbers and record ids           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CommandError (in the CLI) ← Printed for the operator                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use medinv_core::CoreError;
use thiserror::Error;

/// Record store and audit log errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A persisted line could not be parsed.
    ///
    /// Only raised under [`CorruptLinePolicy::Fail`](crate::CorruptLinePolicy).
    #[error("Corrupt record on line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    /// No record with this id.
    #[error("Record not found: {id}")]
    NotFound { id: i64 },

    /// The largest stored id is `i64::MAX`; no id is left to allocate.
    #[error("No record ids left after {max}")]
    IdSpaceExhausted { max: i64 },

    /// File system failure (permissions, disk full, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A domain rule rejected the mutation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The temp file could not be renamed over the store.
    #[error("Failed to replace store file: {0}")]
    Persist(String),

    /// A blocking file task did not finish.
    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

impl From<medinv_core::ValidationError> for StoreError {
    fn from(err: medinv_core::ValidationError) -> Self {
        StoreError::Core(CoreError::Validation(err))
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Persist(err.error.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
