use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use crate::config::CommandConfig;
use crate::models::MediaState;

use super::{MediaError, MediaSource, parse};

/// Raw result of one media tool invocation.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output followed by standard error.
    pub bytes: Vec<u8>,
    pub status: ExitStatus,
}

impl CommandOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).trim().to_string()
    }
}

/// Runs the external media tool (`media-control get` by default).
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    path: PathBuf,
    argument: String,
}

impl CommandExecutor {
    pub fn new(path: impl Into<PathBuf>, argument: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            argument: argument.into(),
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(&config.path, &config.argument)
    }

    /// Spawn the tool and block until it exits.
    pub fn run(&self) -> Result<CommandOutput, MediaError> {
        tracing::debug!("Running {} {}", self.path.display(), self.argument);

        let output = Command::new(&self.path)
            .arg(&self.argument)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MediaError::LaunchFailed(format!("{}: {e}", self.path.display())))?;

        let mut bytes = output.stdout;
        bytes.extend_from_slice(&output.stderr);

        Ok(CommandOutput {
            bytes,
            status: output.status,
        })
    }
}

impl MediaSource for CommandExecutor {
    fn fetch(&self) -> Result<MediaState, MediaError> {
        let output = self.run()?;

        if !output.status.success() {
            tracing::debug!("Media tool exited with {}", output.status);
            return Err(MediaError::CommandFailed(output.text()));
        }

        parse(&output.bytes)
    }
}
