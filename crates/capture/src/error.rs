//! Capture error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Capture error
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device, transport or configuration failure
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Stream-enable feature report rejected at open
    #[error("failed to enable sensor data stream on device {serial_number}: {source}")]
    StreamEnable {
        serial_number: u32,
        #[source]
        source: ContractError,
    },

    /// Acquisition thread could not be started
    #[error("failed to spawn acquisition thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// Replay dump unreadable or malformed
    #[error("replay file {}: {message}", .path.display())]
    Replay { path: PathBuf, message: String },
}

impl CaptureError {
    pub fn replay(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Replay {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Capture Result alias
pub type Result<T> = std::result::Result<T, CaptureError>;
