//! # Validation Module
//!
//! Operator input validation for MedInv.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI argument parsing (clap)                                  │
//! │  └── Presence of arguments                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Name required / length                                            │
//! │  ├── Dose count integer ≥ 0                                            │
//! │  └── Expiry MM/DD/YYYY                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: RecordStore                                                  │
//! │  └── Unique id allocation under the store lock                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medinv_core::validation::{parse_dose_count, parse_expiry};
//!
//! assert_eq!(parse_dose_count(" 12 ").unwrap(), 12);
//! assert!(parse_expiry("04/30/2027").is_ok());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{NewRecord, RecordPatch};
use crate::DATE_FORMAT;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted item name.
pub const MAX_NAME_LEN: usize = 200;

/// Longest accepted search query.
pub const MAX_QUERY_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item name and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
/// - No control characters (a name lands inside a single audit line)
pub fn validate_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    reject_control_chars("name", name)?;
    Ok(name.to_string())
}

/// Validates a free-text description and returns it trimmed.
pub fn validate_description(description: &str) -> ValidationResult<String> {
    let description = description.trim();
    reject_control_chars("description", description)?;
    Ok(description.to_string())
}

fn reject_control_chars(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain line breaks or control characters".to_string(),
        });
    }
    Ok(())
}

/// Validates a search query.
///
/// Empty is allowed and matches everything. Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Parses a dose count typed by the operator.
///
/// ## Rules
/// - Must be an integer
/// - Must be ≥ 0
///
/// ```rust
/// use medinv_core::validation::parse_dose_count;
///
/// assert!(parse_dose_count("0").is_ok());
/// assert!(parse_dose_count("-1").is_err());
/// assert!(parse_dose_count("ten").is_err());
/// ```
pub fn parse_dose_count(raw: &str) -> ValidationResult<i64> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(ValidationError::Required {
            field: "doses".to_string(),
        });
    }

    let doses: i64 = raw.parse().map_err(|_| ValidationError::InvalidFormat {
        field: "doses".to_string(),
        reason: "must be a whole number".to_string(),
    })?;

    validate_dose_count(doses)?;
    Ok(doses)
}

/// Validates an already-numeric dose count.
pub fn validate_dose_count(doses: i64) -> ValidationResult<()> {
    if doses < 0 {
        return Err(ValidationError::OutOfRange {
            field: "doses".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses an expiry date in `MM/DD/YYYY`.
pub fn parse_expiry(raw: &str) -> ValidationResult<NaiveDate> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(ValidationError::Required {
            field: "expiry".to_string(),
        });
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ValidationError::InvalidFormat {
        field: "expiry".to_string(),
        reason: "expected MM/DD/YYYY".to_string(),
    })
}

// =============================================================================
// Form Validators
// =============================================================================

/// Builds a [`NewRecord`] from raw operator input.
///
/// Empty optional inputs become `None`.
pub fn new_record_from_input(
    name: &str,
    doses: &str,
    expiry: Option<&str>,
    description: Option<&str>,
) -> ValidationResult<NewRecord> {
    Ok(NewRecord {
        name: validate_name(name)?,
        dose_count: parse_dose_count(doses)?,
        expiry: non_empty(expiry).map(parse_expiry).transpose()?,
        description: non_empty(description).map(validate_description).transpose()?,
    })
}

/// Builds a [`RecordPatch`] from raw operator input.
///
/// Only non-empty inputs are applied, matching the edit form.
pub fn patch_from_input(
    name: Option<&str>,
    doses: Option<&str>,
    expiry: Option<&str>,
    description: Option<&str>,
) -> ValidationResult<RecordPatch> {
    Ok(RecordPatch {
        name: non_empty(name).map(validate_name).transpose()?,
        dose_count: non_empty(doses).map(parse_dose_count).transpose()?,
        expiry: non_empty(expiry).map(parse_expiry).transpose()?,
        description: non_empty(description).map(validate_description).transpose()?,
    })
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
