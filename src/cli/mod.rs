//! CLI module for topdog - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for serving the health
//! endpoint and running a one-shot check.

pub mod commands;

pub use commands::Cli;
