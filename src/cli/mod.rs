use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

mod commands;
pub use commands::*;

#[derive(Parser)]
#[command(name = "mediabar")]
#[command(about = "Track what is currently playing via media-control")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/mediabar/config.toml)
    #[arg(long, global = true, env = "MEDIABAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Media tool executable
    #[arg(long, global = true, env = "MEDIABAR_COMMAND")]
    pub command_path: Option<PathBuf>,

    /// Poll interval in seconds
    #[arg(long, global = true, env = "MEDIABAR_INTERVAL")]
    pub interval: Option<u64>,

    /// Directory for the daemon socket, pid and log files
    #[arg(long, global = true, env = "MEDIABAR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            command_path: self.command_path.clone(),
            interval_secs: self.interval,
            data_dir: self.data_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query the media tool once and print what is playing
    Get {
        /// Print the raw state as JSON
        #[arg(long)]
        json: bool,
        /// Write the decoded artwork to this file
        #[arg(long)]
        artwork: Option<PathBuf>,
    },

    /// Poll in the foreground and print every change
    Watch {
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
        /// Exit after this many events
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,
    },

    /// Show the daemon's current status
    Status {
        /// Print the full status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the daemon to poll right now
    Refresh,

    /// Daemon management
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Check that the media tool is installed
    Check,
}

#[derive(Subcommand)]
pub enum DaemonCommands {
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Run daemon in foreground (internal use)
    Run,
}
