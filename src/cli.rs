//! CLI definitions for extharness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// extharness CLI.
#[derive(Debug, Parser)]
#[command(name = "extharness")]
#[command(about = "Lifecycle-driven test harness for message-passing extensions")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "EXTHARNESS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run test cases against the loopback runtime
    Run {
        /// Only run these cases (repeatable)
        #[arg(long = "case", value_name = "NAME")]
        cases: Vec<String>,
    },

    /// List registered test cases
    List,
}
