//! Report codec errors

use contracts::ContractError;
use thiserror::Error;

/// Codec error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer shorter than the packed layout
    #[error("report too short: got {len} bytes, need {expected}")]
    TooShort { len: usize, expected: usize },

    /// First byte is not the expected report id
    #[error("unexpected report id {found:#04x}, expected {expected:#04x}")]
    UnexpectedReportId { expected: u8, found: u8 },
}

impl From<CodecError> for ContractError {
    fn from(err: CodecError) -> Self {
        ContractError::protocol_mismatch(err.to_string())
    }
}

/// Codec Result alias
pub type Result<T> = std::result::Result<T, CodecError>;
