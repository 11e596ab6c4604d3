use std::path::PathBuf;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum GuestCommands {
    /// Store a guest dataset read from a JSON file
    Import {
        /// Guest profile id
        guest_id: String,
        /// Path to the guest dataset JSON
        file: PathBuf,
    },
    /// Report whether a guest still has content worth migrating
    Eligibility {
        /// Guest profile id
        guest_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AccountCommands {
    /// Show everything an account owns
    Show {
        /// Account id
        account_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Print the JSONL log of a migration session
    Report {
        /// Session id (mig-...)
        session_id: String,
        /// Only entries at this level or above: info, warning, error
        #[arg(long)]
        level: Option<String>,
    },
}
