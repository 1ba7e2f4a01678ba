//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Malformed command-line value
    #[error("Invalid value for {flag}: {message}")]
    InvalidArgument { flag: &'static str, message: String },

    /// Device could not be opened or streamed
    #[error("Capture failed: {0}")]
    Capture(#[from] capture::CaptureError),

    /// Acquisition consumer task failed
    #[error("Consumer task failed: {message}")]
    Consumer { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(flag: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            flag,
            message: message.into(),
        }
    }

    pub fn consumer(message: impl Into<String>) -> Self {
        Self::Consumer {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
