use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Download bank transactions from an open-banking aggregator and import
/// them into a personal-finance ledger.
#[derive(Parser, Debug)]
pub struct Args {
    /// Path to the import configuration file
    #[clap(long, default_value = "import.json")]
    pub config: PathBuf,

    /// Directory holding job status files and download artifacts
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List banks available in the configured country
    Banks,

    /// List aggregator accounts with their candidate ledger counterparts
    Accounts {
        /// Bank-connection reference to list accounts for (defaults to the
        /// first requisition in the configuration)
        #[clap(long)]
        requisition: Option<String>,
    },

    /// Download transactions for all configured accounts
    Download {
        /// Reuse a specific download identifier instead of generating one
        #[clap(long)]
        identifier: Option<String>,
    },

    /// Send a prior download to the ledger
    Sync {
        /// Identifier of the download to send
        #[clap(long)]
        download: String,
    },

    /// Download and sync in one go
    Run,

    /// Show the status and per-line logs of a download or sync job
    Status {
        /// Job identifier
        #[clap(long)]
        job: String,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
