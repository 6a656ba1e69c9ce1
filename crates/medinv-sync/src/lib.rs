//! # medinv-sync: Opportunistic Remote Mirroring
//!
//! The local store is always the source of truth. This crate copies it to
//! a remote collection whenever the network is reachable, and stays out of
//! the way when it is not.
//!
//! ## Sync Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Flow                                       │
//! │                                                                         │
//! │  Local mutation (add / update / delete / dispense)                     │
//! │       │                                                                 │
//! │       ├──► RecordStore (atomic rewrite)     ← always succeeds first    │
//! │       │                                                                 │
//! │       └──► SyncHandle::request_sync()       ← fire-and-forget          │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  SyncEngine loop ◄──── interval tick (60s) ──── probe / connect        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RemoteMirror: delete_all() + insert_many(all records)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `MedinvConfig` (TOML + environment)
//! - [`connectivity`] - Reachability probe
//! - [`remote`] - Remote mirror trait and HTTP client
//! - [`engine`] - Offline/Online state machine and background loop
//! - [`error`] - Sync error types

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::MedinvConfig;
pub use connectivity::{ConnectivityProbe, TcpProbe};
pub use engine::{SyncEngine, SyncHandle};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpMirror, RemoteMirror};
