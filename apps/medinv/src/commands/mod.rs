//! # Commands Module
//!
//! One function per operator action. Each takes `&AppState`, returns a
//! value for the CLI to print, and never bypasses the record store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  config.rs     init_config, show_config                                │
//! │  inventory.rs  add_record, update_record, delete_record, list_records  │
//! │  logs.rs       read_logs, recent_entries                               │
//! │  sync.rs       status, sync_now                                        │
//! │  station.rs    dispense_once, run_station                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod inventory;
pub mod logs;
pub mod station;
pub mod sync;
