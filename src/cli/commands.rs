use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::Config;
use crate::daemon::Daemon;
use crate::ipc::DaemonClient;
use crate::media::{CommandExecutor, MediaSource, artwork};
use crate::models::{MediaState, ServiceStatus};
use crate::scheduler::PollScheduler;
use crate::store::StateStore;

pub struct App {
    pub config: Config,
    config_file: Option<PathBuf>,
}

impl App {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?.apply(cli.overrides());

        Ok(Self {
            config,
            config_file: cli.config.clone(),
        })
    }

    fn client(&self) -> DaemonClient {
        DaemonClient::new(self.config.socket_path())
    }

    fn running_client(&self) -> Result<DaemonClient> {
        let client = self.client();
        if !client.is_daemon_running() {
            bail!("Daemon is not running. Start it with: mediabar daemon start");
        }
        Ok(client)
    }

    fn executor(&self) -> CommandExecutor {
        CommandExecutor::from_config(&self.config.command)
    }

    // Command implementations

    pub fn get(&self, json: bool, artwork_path: Option<&Path>) -> Result<()> {
        let state = self.executor().fetch()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&state)?);
        } else {
            print_state(&state);
        }

        if let Some(path) = artwork_path {
            let artwork = artwork::decode(&state)?;
            let path = if path.is_dir() {
                path.join(format!("artwork.{}", artwork.extension()))
            } else {
                path.to_path_buf()
            };
            fs::write(&path, &artwork.bytes)
                .with_context(|| format!("Failed to write artwork to {}", path.display()))?;
            eprintln!(
                "Saved {} artwork ({} bytes) to {}",
                artwork.mime_type,
                artwork.bytes.len(),
                path.display()
            );
        }

        Ok(())
    }

    pub fn watch(&self, json: bool, limit: Option<u64>) -> Result<()> {
        let store = StateStore::new();
        let events = store.subscribe();
        let scheduler = PollScheduler::new(self.executor(), store, self.config.poll.interval());
        scheduler.start();

        let mut seen: u64 = 0;
        for event in events.iter() {
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                println!("{event}");
            }

            seen += 1;
            if limit.is_some_and(|limit| seen >= limit) {
                break;
            }
        }

        scheduler.stop();
        Ok(())
    }

    pub fn status(&self, json: bool) -> Result<()> {
        let status = self.running_client()?.get_status()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print_status(&status);
        }

        Ok(())
    }

    pub fn refresh(&self) -> Result<()> {
        if self.running_client()?.refresh()? {
            println!("Refresh requested");
        } else {
            println!("A fetch is already in progress");
        }
        Ok(())
    }

    pub fn daemon_start(&self) -> Result<()> {
        Daemon::start_detached(&self.config, self.config_file.as_deref())?;
        println!("Daemon started");
        Ok(())
    }

    pub fn daemon_stop(&self) -> Result<()> {
        Daemon::stop(&self.config)?;
        println!("Daemon stopped");
        Ok(())
    }

    pub fn daemon_status(&self) -> Result<()> {
        if Daemon::is_running(&self.config) {
            println!("Daemon is running");
            if let Ok(pid) = fs::read_to_string(self.config.pid_path()) {
                println!("PID: {}", pid.trim());
            }
        } else {
            println!("Daemon is not running");
        }
        Ok(())
    }

    pub fn daemon_run(&self) -> Result<()> {
        Daemon::new(self.config.clone()).run()
    }

    pub fn check(&self) -> Result<()> {
        let path = &self.config.command.path;

        let metadata = fs::metadata(path).with_context(|| {
            format!(
                "media-control not found at {}. Install it with: brew install media-control",
                path.display()
            )
        })?;

        if !metadata.is_file() {
            bail!("{} is not a file", path.display());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                bail!("{} is not executable", path.display());
            }
        }

        println!("media-control found at {}", path.display());
        Ok(())
    }
}

fn print_state(state: &MediaState) {
    if state.is_empty() {
        println!("No Media Playing");
        return;
    }

    println!("Title:    {}", state.display_title());
    println!("Artist:   {}", state.display_artist());
    println!("Album:    {}", state.display_album());
    println!(
        "Status:   {}",
        if state.is_playing() { "Playing" } else { "Paused" }
    );
    if state.duration.is_some() {
        println!(
            "Progress: {} / {} ({:.0}%)",
            state.formatted_elapsed_time(),
            state.formatted_duration(),
            state.progress() * 100.0
        );
    }
    if let Some(genre) = &state.genre {
        println!("Genre:    {genre}");
    }
    if let Some(track) = state.track_number {
        println!("Track:    {track}");
    }
    if let Some(app) = &state.bundle_identifier {
        println!("App:      {app}");
    }
    if state.has_artwork() {
        println!(
            "Artwork:  {}",
            state.artwork_mime_type.as_deref().unwrap_or("yes")
        );
    }
}

fn print_status(status: &ServiceStatus) {
    println!("{}", status.status_text());

    if !status.is_loading && status.last_error.is_none() && !status.current_state.is_empty() {
        println!();
        print_state(&status.current_state);
    }

    if let Some(updated_at) = status.updated_at {
        println!();
        println!(
            "Last change: {} (revision {})",
            updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            status.revision
        );
    }
}
