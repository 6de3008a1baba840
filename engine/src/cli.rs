//! CLI interface for Neuroljus
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the engine binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Neuroljus hybrid response engine
///
/// A non-diagnostic, assistive conversational engine for caregiving and
/// autism-support contexts. Responses come from a deterministic local rule
/// engine or, in delegated mode, from an external model constrained by a
/// composed safety policy.
#[derive(Parser, Debug)]
#[command(name = "neuroljus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation session
    Chat {
        /// Response mode to start in (local or delegated)
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,
    },

    /// Run the telemetry feed and print snapshot lines
    Feed {
        /// Number of polls before exiting (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
    },

    /// Run system diagnostics
    Doctor,
}
