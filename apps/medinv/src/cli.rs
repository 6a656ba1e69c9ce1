//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::inventory::{RecordForm, RecordRef};
use crate::error::{CommandError, CommandResult};

/// MedInv - offline-first medical inventory.
#[derive(Parser, Debug)]
#[command(name = "medinv", version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: platform config dir, medinv.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a record.
    Add(AddArgs),
    /// Edit a record. Only the fields given are changed.
    Update(UpdateArgs),
    /// Delete a record.
    Delete(TargetArgs),
    /// List records, optionally filtered.
    List {
        /// Case-insensitive text to look for
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Show the audit log.
    Logs {
        /// Only the last N entries
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Show device, store and sync status.
    Status,
    /// Run one sync cycle now.
    Sync,
    /// Run one dispense cycle against the configured tag reader.
    Dispense {
        /// Operator identity index
        #[arg(long)]
        operator: usize,
    },
    /// Run the station until Ctrl-C: sync loop, plus dispensing with --operator.
    Run {
        /// Operator identity index; enables the dispense loop
        #[arg(long)]
        operator: Option<usize>,
    },
    /// Manage the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub doses: String,

    /// MM/DD/YYYY
    #[arg(long)]
    pub expiry: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

impl AddArgs {
    pub fn form(&self) -> RecordForm {
        RecordForm {
            name: Some(self.name.clone()),
            doses: Some(self.doses.clone()),
            expiry: self.expiry.clone(),
            description: self.description.clone(),
        }
    }
}

/// Selects a record by id or exact item name.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    #[arg(long)]
    pub id: Option<i64>,

    /// Exact item name
    #[arg(long)]
    pub item: Option<String>,
}

impl TargetArgs {
    pub fn record_ref(&self) -> CommandResult<RecordRef> {
        match (self.id, &self.item) {
            (Some(id), _) => Ok(RecordRef::Id(id)),
            (None, Some(item)) => Ok(RecordRef::Name(item.clone())),
            (None, None) => Err(CommandError::validation("Either --id or --item is required")),
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// New item name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub doses: Option<String>,

    /// MM/DD/YYYY
    #[arg(long)]
    pub expiry: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

impl UpdateArgs {
    pub fn form(&self) -> RecordForm {
        RecordForm {
            name: self.name.clone(),
            doses: self.doses.clone(),
            expiry: self.expiry.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_by_item_name() {
        let cli = Cli::parse_from([
            "medinv", "update", "--item", "Saline", "--doses", "12", "--json",
        ]);
        assert!(cli.json);
        let Commands::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.target.record_ref().unwrap(), RecordRef::Name("Saline".into()));
        assert_eq!(args.form().doses.as_deref(), Some("12"));
        assert!(args.form().name.is_none());
    }

    #[test]
    fn test_delete_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["medinv", "delete"]).is_err());
        assert!(Cli::try_parse_from(["medinv", "delete", "--id", "1", "--item", "X"]).is_err());

        let cli = Cli::try_parse_from(["medinv", "delete", "--id", "3"]).unwrap();
        let Commands::Delete(target) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(target.record_ref().unwrap(), RecordRef::Id(3));
    }
}
