use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: home.join(".mediabar"),
        }
    }
}

/// The external media tool and the argument asking it for the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub path: PathBuf,
    pub argument: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/opt/homebrew/bin/media-control"),
            argument: "get".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub command_path: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediabar")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the config file (an explicit path must exist; the default one may not).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(path) = overrides.command_path {
            self.command.path = path;
        }
        if let Some(secs) = overrides.interval_secs {
            self.poll.interval_secs = secs;
        }
        if let Some(dir) = overrides.data_dir {
            self.storage.path = dir;
        }
        self
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.storage.path
    }

    pub fn socket_path(&self) -> PathBuf {
        self.storage.path.join("mediabar.sock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.storage.path.join("mediabar.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.storage.path.join("mediabar.log")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir()).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                self.data_dir().display()
            )
        })?;
        Ok(())
    }
}
