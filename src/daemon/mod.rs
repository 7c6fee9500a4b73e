use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info};

use crate::config::Config;
use crate::ipc::{DaemonCommand, DaemonResponse};
use crate::media::CommandExecutor;
use crate::scheduler::PollScheduler;
use crate::store::StateStore;

/// Background service that keeps polling the media tool and answers status
/// requests over a local socket.
pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<()> {
        use interprocess::local_socket::prelude::*;
        use interprocess::local_socket::{GenericFilePath, ListenerOptions};

        self.config.ensure_dirs()?;
        let socket_path = self.config.socket_path();

        // Remove stale socket
        if socket_path.exists() {
            fs::remove_file(&socket_path)?;
        }

        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string())?;

        let name = socket_path.as_os_str().to_fs_name::<GenericFilePath>()?;
        let listener = ListenerOptions::new()
            .name(name)
            .create_sync()
            .with_context(|| "Failed to create socket listener")?;

        info!("Daemon started, listening on {}", socket_path.display());

        let scheduler = PollScheduler::new(
            CommandExecutor::from_config(&self.config.command),
            StateStore::new(),
            self.config.poll.interval(),
        );
        scheduler.start();

        let running = AtomicBool::new(true);

        while running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok(conn) => {
                    if let Err(e) = handle_connection(conn, &scheduler, &running) {
                        error!("Connection error: {e}");
                    }
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        error!("Accept error: {e}");
                    }
                }
            }
        }

        scheduler.stop();

        // Cleanup
        let _ = fs::remove_file(&socket_path);
        let _ = fs::remove_file(&pid_path);

        info!("Daemon stopped");
        Ok(())
    }

    /// Re-launch this executable as `daemon run` in its own process group.
    pub fn start_detached(config: &Config, config_file: Option<&Path>) -> Result<()> {
        use std::process::{Command, Stdio};

        let socket_path = config.socket_path();
        if socket_path.exists() {
            let client = crate::ipc::DaemonClient::new(&socket_path);
            if client.is_daemon_running() {
                anyhow::bail!("Daemon is already running");
            }
            fs::remove_file(&socket_path)?;
        }

        config.ensure_dirs()?;
        let log = File::create(config.log_path()).with_context(|| {
            format!("Failed to create log file {}", config.log_path().display())
        })?;

        let exe = std::env::current_exe()?;
        let mut command = Command::new(&exe);
        if let Some(file) = config_file {
            command.arg("--config").arg(file);
        }
        command
            .arg("--data-dir")
            .arg(config.data_dir())
            .arg("--command-path")
            .arg(&config.command.path)
            .arg("--interval")
            .arg(config.poll.interval_secs.to_string())
            .arg("daemon")
            .arg("run")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().with_context(|| "Failed to start daemon")?;

        for _ in 0..50 {
            if socket_path.exists() {
                return Ok(());
            }
            thread::sleep(std::time::Duration::from_millis(100));
        }

        anyhow::bail!("Daemon failed to start")
    }

    pub fn stop(config: &Config) -> Result<()> {
        let client = crate::ipc::DaemonClient::new(config.socket_path());
        if client.is_daemon_running() {
            client.shutdown()?;
            for _ in 0..50 {
                if !config.socket_path().exists() {
                    return Ok(());
                }
                thread::sleep(std::time::Duration::from_millis(100));
            }
        }
        Ok(())
    }

    pub fn is_running(config: &Config) -> bool {
        let client = crate::ipc::DaemonClient::new(config.socket_path());
        client.is_daemon_running()
    }
}

fn handle_connection(
    conn: interprocess::local_socket::Stream,
    scheduler: &PollScheduler,
    running: &AtomicBool,
) -> Result<()> {
    let mut reader = BufReader::new(&conn);
    let mut writer = &conn;

    let mut line = String::new();
    reader.read_line(&mut line)?;

    let response = match serde_json::from_str::<DaemonCommand>(&line) {
        Ok(command) => handle_command(command, scheduler, running),
        Err(e) => DaemonResponse::Error(format!("Invalid request: {e}")),
    };

    let response_json = serde_json::to_string(&response)?;
    writeln!(writer, "{response_json}")?;
    writer.flush()?;

    Ok(())
}

fn handle_command(
    command: DaemonCommand,
    scheduler: &PollScheduler,
    running: &AtomicBool,
) -> DaemonResponse {
    match command {
        DaemonCommand::GetStatus => DaemonResponse::Status(scheduler.store().snapshot()),
        DaemonCommand::Refresh => DaemonResponse::Refreshed(scheduler.refresh_now()),
        DaemonCommand::Shutdown => {
            running.store(false, Ordering::SeqCst);
            scheduler.stop();
            DaemonResponse::Ok
        }
    }
}
