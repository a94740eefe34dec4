//! Command-line interface of xfaas.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// xfaas - run one task on several serverless providers and compare the results.
#[derive(Parser, Debug)]
#[command(name = "xfaas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "xfaas.toml")]
    pub config: PathBuf,

    /// Verbose logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default configuration.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Dispatches one task and prints the consensus report.
    Dispatch {
        /// Task kind (default: `[task] kind`).
        #[arg(short, long)]
        kind: Option<String>,

        /// Shot count (default: `[task] shots`).
        #[arg(short, long)]
        shots: Option<u32>,

        /// Extra task parameter as key=value; repeatable.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Restrict the round to these providers; repeatable.
        #[arg(short, long = "provider", value_name = "ID")]
        providers: Vec<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Do not persist the report.
        #[arg(long)]
        no_save: bool,
    },

    /// Lists configured providers and whether they are reachable.
    Status,

    /// Diagnoses configuration problems.
    Doctor,

    /// Lists stored reports.
    History {
        /// Number of reports to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Shows version.
    Version,
}
