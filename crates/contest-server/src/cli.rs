//! Command line arguments

use clap::{Parser, Subcommand};

use crate::model::constants::DEFAULT_CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(name = "contest", version, about = "Contest submissions and one-vote-per-voter tallies")]
pub struct Cli {
    /// Configuration file; missing files are ignored
    #[arg(short = 'c', long = "config", env = "CONTEST_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,
    /// Storage backend: memory, file or embedded
    #[arg(short = 's', long = "storage", global = true)]
    pub storage_mode: Option<String>,
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Register a new submission
    Create {
        #[arg(long)]
        contestant: String,
        #[arg(long)]
        title: String,
        #[arg(long = "media-ref")]
        media_ref: String,
        /// Use this id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },
    /// Replace the title and media reference of a submission
    Update {
        id: String,
        #[arg(long)]
        caller: String,
        #[arg(long)]
        title: String,
        #[arg(long = "media-ref")]
        media_ref: String,
    },
    /// Cast a vote
    Vote {
        id: String,
        #[arg(long)]
        voter: String,
    },
    /// Show one submission
    Get { id: String },
    /// List submissions in creation order
    List,
    /// Whether a voter has voted on a submission
    Voted {
        id: String,
        #[arg(long)]
        voter: String,
    },
    /// List the vote receipts of a submission
    Receipts { id: String },
    /// Compare a submission's tally with its receipts
    Audit { id: String },
    /// Totals for the whole store
    Stats,
}
