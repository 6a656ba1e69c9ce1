//! # medinv-core: Pure Domain Logic for MedInv
//!
//! Everything in this crate is deterministic and free of I/O. Time is
//! always passed in by the caller, never read from the clock, so the
//! dedup window and the audit formatter are testable without sleeping.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedInv Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   apps/medinv (operator CLI)      medinv-scan (NFC pipeline)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ medinv-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ validation│  │    tag    │  │   dedup   │  │   │
//! │  │   │ Inventory │  │  name     │  │  marker   │  │  2s band  │  │   │
//! │  │   │  Record   │  │  doses    │  │  split    │  │  bounded  │  │   │
//! │  │   │ LogEntry  │  │  expiry   │  │  index    │  │  map      │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          medinv-store (JSON lines + audit log on disk)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (InventoryRecord, LogEntry, SyncStatus, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Operator input validation
//! - [`tag`] - Hardware tag payload parser
//! - [`dedup`] - Time-windowed duplicate suppression
//!
//! ## Example Usage
//!
//! ```rust
//! use medinv_core::tag::{parse_payload, ParsedTag, TagFormat};
//!
//! let format = TagFormat::default();
//! assert_eq!(parse_payload("enNFCNASAMED%lot7%12", &format), ParsedTag::Record(12));
//! assert_eq!(parse_payload("some other tag", &format), ParsedTag::Unknown);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dedup;
pub mod error;
pub mod tag;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use dedup::{DedupConfig, DedupWindow};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Date format used for expiry dates on disk and in operator input.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Timestamp format of audit log lines (`[MM/DD/YYYY HH:MM]`).
pub const LOG_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Width of the dashed separator between rendered records.
pub const RECORD_SEPARATOR_WIDTH: usize = 40;
