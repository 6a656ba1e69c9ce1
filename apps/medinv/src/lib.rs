//! # MedInv Operator Library
//!
//! Everything behind the `medinv` binary.
//!
//! ## Module Organization
//! ```text
//! medinv_lib/
//! ├── lib.rs          ◄─── You are here (dispatch, tracing, signals)
//! ├── cli.rs          ◄─── clap definitions
//! ├── state.rs        ◄─── AppState: store, audit log, sync engine
//! ├── commands/
//! │   ├── config.rs   ◄─── init / show config
//! │   ├── inventory.rs◄─── add / update / delete / list
//! │   ├── logs.rs     ◄─── audit log viewing
//! │   ├── sync.rs     ◄─── status / sync now
//! │   └── station.rs  ◄─── dispense / run
//! └── error.rs        ◄─── CommandError for every command
//! ```
//!
//! ## Command Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse the command line                                              │
//! │  2. Initialize tracing (stderr, RUST_LOG or "info,medinv=debug")       │
//! │  3. Load MedinvConfig: defaults → medinv.toml → MEDINV_* → validate     │
//! │  4. Build AppState                                                      │
//! │  5. Run the command and print its result                               │
//! │  6. One-shot commands: mirror any local change before exit             │
//! │     run: loop until SIGINT / SIGTERM, then stop the sync engine        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod state;

use medinv_core::{InventoryRecord, LogEntry};
use medinv_scan::CycleOutcome;
use medinv_sync::MedinvConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};
use commands::{config, inventory, logs, station, sync};
use error::{CommandError, CommandResult, ErrorCode};
use state::AppState;

/// Runs one parsed command line to completion.
pub async fn run(cli: Cli) -> CommandResult<()> {
    let json = cli.json;

    if let Commands::Config { ref action } = cli.command {
        return match action {
            ConfigAction::Init { force } => {
                let path = config::init_config(cli.config.clone(), *force)?;
                println!("Config written to {}", path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let config = config::show_config(cli.config.clone())?;
                print_json(&config)
            }
        };
    }

    let config = MedinvConfig::load(cli.config.clone())?;
    let mut state = AppState::from_config(config)?;

    match cli.command {
        Commands::Add(ref args) => {
            let record = inventory::add_record(&state, &args.form()).await?;
            print_record(&record, "Added", json)?;
        }
        Commands::Update(ref args) => {
            let target = args.target.record_ref()?;
            let record = inventory::update_record(&state, &target, &args.form()).await?;
            print_record(&record, "Updated", json)?;
        }
        Commands::Delete(ref target) => {
            let record = inventory::delete_record(&state, &target.record_ref()?).await?;
            print_record(&record, "Deleted", json)?;
        }
        Commands::List { ref search } => {
            let records = inventory::list_records(&state, search.as_deref()).await?;
            print_records(&records, json)?;
        }
        Commands::Logs { tail } => match (tail, json) {
            (None, false) => print!("{}", ensure_newline(logs::read_logs(&state).await?)),
            (tail, _) => {
                let entries = logs::recent_entries(&state, tail.unwrap_or(usize::MAX)).await?;
                print_entries(&entries, json)?;
            }
        },
        Commands::Status => {
            let report = sync::status(&state).await?;
            if json {
                print_json(&report)?;
            } else {
                println!("Device:   {} ({})", report.device_name, report.device_id);
                println!("Store:    {} ({} records)", report.data_file.display(), report.record_count);
                println!("Log:      {}", report.log_file.display());
                match report.remote_url {
                    Some(ref url) => println!("Remote:   {} [{}]", url, report.state),
                    None => println!("Remote:   not configured"),
                }
            }
        }
        Commands::Sync => {
            let status = sync::sync_now(&state).await?;
            if json {
                print_json(&status)?;
            } else {
                println!("State:     {}", status.state);
                match status.last_sync {
                    Some(at) => println!("Last sync: {}", at.to_rfc3339()),
                    None => println!("Last sync: never"),
                }
                if let Some(ref e) = status.last_error {
                    println!("Error:     {}", e);
                }
            }
        }
        Commands::Dispense { operator } => {
            let source = station::open_reader(&state)?;
            let outcome = station::dispense_once(&state, source, operator).await?;
            println!("{}", describe_outcome(&outcome));
        }
        Commands::Run { operator } => {
            let shutdown = install_signal_handler();
            station::run_station(&mut state, operator, shutdown).await?;
        }
        Commands::Config { .. } => {}
    }

    state.flush().await;
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::new(ErrorCode::Internal, e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_record(record: &InventoryRecord, verb: &str, json: bool) -> CommandResult<()> {
    if json {
        return print_json(record);
    }
    println!("{} item '{}' (ID {})", verb, record.name, record.id);
    print!("{}", record.render_block());
    Ok(())
}

fn print_records(records: &[InventoryRecord], json: bool) -> CommandResult<()> {
    if json {
        return print_json(records);
    }
    if records.is_empty() {
        println!("No records found.");
    }
    for record in records {
        print!("{}", record.render_block());
    }
    Ok(())
}

#[derive(Serialize)]
struct EntryView<'a> {
    timestamp: String,
    action: String,
    details: &'a str,
}

fn print_entries(entries: &[LogEntry], json: bool) -> CommandResult<()> {
    if json {
        let views: Vec<_> = entries
            .iter()
            .map(|e| EntryView {
                timestamp: e.timestamp.format(medinv_core::LOG_TIMESTAMP_FORMAT).to_string(),
                action: e.action.to_string(),
                details: &e.details,
            })
            .collect();
        return print_json(&views);
    }
    for entry in entries {
        println!("{}", entry.to_line());
    }
    Ok(())
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn describe_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::NoMatch => "No operator matched".to_string(),
        CycleOutcome::Dispensed { identity, record } => format!(
            "Identity {} took one dose of '{}' (ID {}), {} left",
            identity, record.name, record.id, record.dose_count
        ),
        CycleOutcome::OutOfStock { id, name } => format!("'{}' (ID {}) has no doses left", name, id),
        CycleOutcome::UnknownRecord(id) => format!("Tag names unknown record {}", id),
        CycleOutcome::Duplicate(id) => format!("Tag {} was just read, ignored", id),
        CycleOutcome::TimedOut => "No tag presented in time".to_string(),
        CycleOutcome::Cancelled => "Scan cancelled".to_string(),
    }
}

/// Prints a failed command to stderr.
pub fn report_error(err: &CommandError, json: bool) {
    if json {
        if let Ok(text) = serde_json::to_string(err) {
            eprintln!("{}", text);
            return;
        }
    }
    eprintln!("error [{}]: {}", err.code.as_str(), err.message);
}

// =============================================================================
// Process Setup
// =============================================================================

/// Initializes the tracing subscriber. Diagnostics go to stderr so command
/// output on stdout stays clean.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages from every crate
/// - `RUST_LOG=medinv_sync=trace` - Trace the sync engine only
/// - Default: `info,medinv=debug`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medinv=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns a token cancelled on SIGINT (Ctrl-C) or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("Received SIGINT, shutting down"),
                        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
                    let _ = ctrl_c.await;
                    info!("Received SIGINT, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("Received Ctrl-C, shutting down");
        }

        trigger.cancel();
        debug!("Signal handler finished");
    });

    token
}
