//! # Error Types
//!
//! Domain-specific error types for medinv-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medinv-core errors (this file)                                        │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Operator input failures                        │
//! │                                                                         │
//! │  medinv-store   └── StoreError   - Record file / audit log failures    │
//! │  medinv-sync    └── SyncError    - Probe / remote mirror failures      │
//! │  medinv-scan    └── ScanError    - Hardware read failures              │
//! │  apps/medinv    └── CommandError - What the operator sees              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → CommandError         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A dose decrement would drive the count below zero.
    ///
    /// ## When This Occurs
    /// ```text
    /// Tag scanned for record 7 (Doses: 0)
    ///      │
    ///      ▼
    /// OutOfStock { id: 7, name: "Ibuprofen" }
    ///      │
    ///      ▼
    /// Pipeline logs and skips the decrement
    /// ```
    #[error("Record {id} ('{name}') has no doses left")]
    OutOfStock { id: i64, name: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., non-numeric dose count, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OutOfStock {
            id: 7,
            name: "Ibuprofen".to_string(),
        };
        assert_eq!(err.to_string(), "Record 7 ('Ibuprofen') has no doses left");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(validation_err.to_string(), "name is required");

        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
