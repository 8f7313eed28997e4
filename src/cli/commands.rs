//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the HTTP service (default)
//! - check: run the health probes once and report

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// topdog - demo service with a concurrent health checker
#[derive(Parser, Debug)]
#[command(name = "topdog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Location of static files
    #[arg(long = "static", global = true)]
    pub static_path: Option<PathBuf>,

    /// Location of backend API
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the health endpoint over HTTP
    Serve {
        /// Service port
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve cached results refreshed in the background
        #[arg(long)]
        scheduled: bool,
    },

    /// Run every health probe once and report
    Check {
        /// Print the raw JSON result set
        #[arg(long)]
        json: bool,
    },
}
