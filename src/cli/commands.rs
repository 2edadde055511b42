//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Unattended ingestion pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "ingest-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, default_value = "pipeline.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile, discover, transform and persist
    Run {
        /// Process at most this many work units, overriding the config
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Show the work a run would do without transforming or writing
    Plan {
        /// Cap the work list, overriding the config
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Read the store and report processed and failing items
    Status,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single-line JSON document
    Json,
    /// Human-readable output
    Pretty,
}
