//! Error types for encoding and timestamp handling

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while decoding wire data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Field was not valid standard base64
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Decoded field had the wrong length
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Field was not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Bytes were not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Timestamp could not be parsed or was not in canonical form
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
