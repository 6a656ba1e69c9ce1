//! # Command Error Type
//!
//! Unified error type for operator commands.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  medinv update --id 7 --doses abc                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  CommandResult<T>                                                │  │
//! │  │         │                                                        │  │
//! │  │  ValidationError ─── "Doses has invalid format" ───┐             │  │
//! │  │  StoreError::NotFound ─── "Record not found: 7" ───┤             │  │
//! │  │  SyncError / ScanError ────────────────────────────┤             │  │
//! │  │                                                    ▼             │  │
//! │  │                                            CommandError          │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  stderr: "error [VALIDATION_ERROR]: Doses has invalid format: ..."     │
//! │  exit status 1                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use medinv_core::{CoreError, ValidationError};
use medinv_scan::ScanError;
use medinv_store::StoreError;
use medinv_sync::SyncError;
use serde::Serialize;
use thiserror::Error;

/// Result type for command functions.
pub type CommandResult<T> = Result<T, CommandError>;

/// Error returned from operator commands.
///
/// With `--json` this is what the caller receives on stderr:
/// ```json
/// { "code": "NOT_FOUND", "message": "Record not found: 7" }
/// ```
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CommandError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No record with the requested id or name
    NotFound,

    /// Operator input failed validation
    ValidationError,

    /// Dispense refused because the record has no doses left
    OutOfStock,

    /// Local store or audit log could not be read or written
    StorageError,

    /// Remote mirror failure
    SyncError,

    /// Tag reader or biometric matcher failure
    HardwareError,

    /// Configuration could not be loaded or is invalid
    ConfigError,

    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::OutOfStock => "OUT_OF_STOCK",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::SyncError => "SYNC_ERROR",
            ErrorCode::HardwareError => "HARDWARE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CommandError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        CommandError::new(ErrorCode::NotFound, format!("{} not found: {}", what, key))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CommandError::new(ErrorCode::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        CommandError::new(ErrorCode::ConfigError, message)
    }
}

impl From<ValidationError> for CommandError {
    fn from(err: ValidationError) -> Self {
        CommandError::validation(err.to_string())
    }
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OutOfStock { id, name } => CommandError::new(
                ErrorCode::OutOfStock,
                format!("Record {} ('{}') has no doses left", id, name),
            ),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => CommandError::not_found("Record", id),
            StoreError::Core(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Store operation failed");
                CommandError::new(ErrorCode::StorageError, other.to_string())
            }
        }
    }
}

impl From<SyncError> for CommandError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Store(e) => e.into(),
            e if e.is_config_error() => CommandError::config(e.to_string()),
            e => CommandError::new(ErrorCode::SyncError, e.to_string()),
        }
    }
}

impl From<ScanError> for CommandError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Store(e) => e.into(),
            e => CommandError::new(ErrorCode::HardwareError, e.to_string()),
        }
    }
}
