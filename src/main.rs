mod cli;
mod config;
mod daemon;
mod ipc;
mod media;
mod models;
mod scheduler;
mod store;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{App, Cli, Commands, DaemonCommands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let app = App::new(&cli)?;

    match cli.command {
        Commands::Get { json, artwork } => {
            app.get(json, artwork.as_deref())?;
        }
        Commands::Watch { json, limit } => {
            app.watch(json, limit)?;
        }
        Commands::Status { json } => {
            app.status(json)?;
        }
        Commands::Refresh => {
            app.refresh()?;
        }
        Commands::Daemon { command } => match command {
            DaemonCommands::Start => {
                app.daemon_start()?;
            }
            DaemonCommands::Stop => {
                app.daemon_stop()?;
            }
            DaemonCommands::Status => {
                app.daemon_status()?;
            }
            DaemonCommands::Run => {
                app.daemon_run()?;
            }
        },
        Commands::Check => {
            app.check()?;
        }
    }

    Ok(())
}
