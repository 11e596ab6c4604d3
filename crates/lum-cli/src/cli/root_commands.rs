use std::path::PathBuf;

use clap::{Args, Subcommand};
use lum_core::enums::ConflictStrategy;

use super::subcommands::{AccountCommands, GuestCommands, SessionCommands};

/// Root commands of the `lum` binary.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Migrate a guest's learning data into an account
    Migrate(MigrateArgs),
    /// Guest profile management
    Guest {
        #[command(subcommand)]
        action: GuestCommands,
    },
    /// Account inspection
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Migration session logs
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
    /// Serve the HTTP migration entrypoint
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Guest profile to migrate
    #[arg(long)]
    pub guest: String,

    /// Target account
    #[arg(long)]
    pub account: String,

    /// Guest dataset JSON file; defaults to the stored guest profile
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Conflict strategy: merge_with_preference, guest_priority, existing_priority, create_duplicate
    #[arg(long)]
    pub strategy: Option<ConflictStrategy>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address, overriding `server.bind`
    #[arg(long)]
    pub bind: Option<String>,
}
