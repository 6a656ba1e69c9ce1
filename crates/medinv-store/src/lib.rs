//! # medinv-store: Local Storage for MedInv
//!
//! The record store is the single mutable resource shared by the operator
//! surface, the sync engine and the dispense pipeline. Every mutation goes
//! through one async lock and ends in an atomic rename.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedInv Data Flow                                 │
//! │                                                                         │
//! │  CLI command / dispense pipeline                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  medinv-store (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────────────┐        ┌──────────────────────┐     │   │
//! │  │   │     RecordStore      │        │       AuditLog       │     │   │
//! │  │   │    (records.rs)      │        │      (audit.rs)      │     │   │
//! │  │   │                      │        │                      │     │   │
//! │  │   │ read / mutate /      │        │ append-only lines    │     │   │
//! │  │   │ atomic rewrite       │        │ [MM/DD/YYYY HH:MM]   │     │   │
//! │  │   └──────────┬───────────┘        └──────────┬───────────┘     │   │
//! │  └──────────────┼───────────────────────────────┼─────────────────┘   │
//! │                 ▼                               ▼                      │
//! │          inventory.txt                  database_logs.txt              │
//! │          inventory.txt.rejected                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`records`] - JSON-lines record store
//! - [`audit`] - Audit log
//! - [`error`] - Store error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod error;
pub mod records;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditLog, NO_LOGS_MESSAGE};
pub use error::{StoreError, StoreResult};
pub use records::{CorruptLinePolicy, RecordStore};
