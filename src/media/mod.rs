use thiserror::Error;

use crate::models::MediaState;

pub mod artwork;
mod executor;
mod parser;

pub use executor::CommandExecutor;
pub use parser::parse;

/// Why a fetch of the current media state did not produce a snapshot.
///
/// The `Display` text is what observers see as the service's last error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("failed to launch media query command: {0}")]
    LaunchFailed(String),
    #[error("media query command failed: {0}")]
    CommandFailed(String),
    #[error("no response from media query command")]
    EmptyResponse,
    #[error("failed to parse media information: {0}")]
    ParseFailed(String),
}

/// Anything that can produce a fresh media snapshot. Implementations block.
pub trait MediaSource: Send + Sync {
    fn fetch(&self) -> Result<MediaState, MediaError>;
}

impl<F> MediaSource for F
where
    F: Fn() -> Result<MediaState, MediaError> + Send + Sync,
{
    fn fetch(&self) -> Result<MediaState, MediaError> {
        self()
    }
}
