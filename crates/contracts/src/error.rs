//! Layered error definitions
//!
//! Categorized by source: config / device / protocol / transport

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Enumeration yielded no matching device
    #[error("no sensor device found{}", serial_suffix(.serial_number))]
    DeviceNotFound { serial_number: Option<u32> },

    /// Transport refused to hand out a device handle
    #[error("failed to open device {serial_number}: {message}")]
    OpenFailed { serial_number: u32, message: String },

    // ===== Protocol Errors =====
    /// Report id or length does not match the expected layout
    #[error("protocol mismatch: {message}")]
    ProtocolMismatch { message: String },

    // ===== Transport Errors =====
    /// No data within the caller's bound
    #[error("timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Read/write failure below protocol level
    #[error("transport io error: {message}")]
    TransportIo { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

fn serial_suffix(serial_number: &Option<u32>) -> String {
    match serial_number {
        Some(sn) => format!(" with serial number {sn}"),
        None => String::new(),
    }
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create open failure error
    pub fn open_failed(serial_number: u32, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            serial_number,
            message: message.into(),
        }
    }

    /// Create protocol mismatch error
    pub fn protocol_mismatch(message: impl Into<String>) -> Self {
        Self::ProtocolMismatch {
            message: message.into(),
        }
    }

    /// Create transport io error
    pub fn transport_io(message: impl Into<String>) -> Self {
        Self::TransportIo {
            message: message.into(),
        }
    }

    /// Whether the error is recoverable inside the streaming loop
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProtocolMismatch { .. } | Self::Timeout { .. } | Self::TransportIo { .. }
        )
    }
}
