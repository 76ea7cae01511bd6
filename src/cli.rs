//! Command-line interface
//!
//! clap derive definitions for the `ingest-watch` binary.

use clap::{Parser, Subcommand, ValueEnum};

/// Watch server-side document ingestion tasks from the terminal.
///
/// Attaches to a running ingestion task on the knowledge-base backend and
/// streams its progress until the task completes, fails, or is cancelled.
#[derive(Parser, Debug)]
#[command(name = "ingest-watch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a task's progress until it reaches a terminal status
    Watch {
        /// Task identifier issued by the upload endpoint
        task_id: String,

        /// Path to configuration file
        #[arg(short, long, env = "INGEST_WATCH_CONFIG")]
        config: Option<String>,

        /// Language for step labels
        #[arg(long, value_enum, default_value_t = LabelLanguage::En)]
        labels: LabelLanguage,
    },

    /// Request cancellation of a task and wait for the outcome
    Cancel {
        /// Task identifier issued by the upload endpoint
        task_id: String,

        /// Path to configuration file
        #[arg(short, long, env = "INGEST_WATCH_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Which label table `watch` prints steps from
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLanguage {
    /// English labels
    En,
    /// Traditional Chinese labels
    Zh,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Print the effective configuration as TOML
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    Init {
        /// Where to create the file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Load a configuration file and report whether it is valid
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}
