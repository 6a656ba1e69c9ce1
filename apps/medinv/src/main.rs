//! # MedInv Entry Point
//!
//! ```text
//! medinv add --name Ibuprofen --doses 20 --expiry 04/30/2027
//! medinv list --search fever
//! medinv update --item Ibuprofen --doses 18
//! medinv delete --id 3
//! medinv logs --tail 20
//! medinv status | sync
//! medinv run --operator 0
//! ```
//!
//! The actual setup is in lib.rs so commands can be tested without the
//! binary.

use clap::Parser;
use medinv_lib::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    medinv_lib::init_tracing();

    if let Err(e) = medinv_lib::run(cli).await {
        medinv_lib::report_error(&e, json);
        std::process::exit(1);
    }
}
