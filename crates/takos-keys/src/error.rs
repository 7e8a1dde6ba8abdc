//! Key hierarchy error types

use takos_core::CodecError;
use takos_crypto::CryptoError;
use thiserror::Error;

use crate::kind::KeyType;

/// Result type for key operations
pub type Result<T> = std::result::Result<T, KeyError>;

/// Structural and signing errors for key objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Input was not a JSON object of the expected shape
    #[error("Malformed key object: {0}")]
    Malformed(String),

    /// Discriminant did not match the expected kind
    #[error("Unexpected key type: expected {expected}, got {actual}")]
    TypeMismatch { expected: KeyType, actual: KeyType },

    /// Version other than the current protocol version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Decoded key length differs from the kind's fixed length
    #[error("Invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: KeyType,
        expected: usize,
        actual: usize,
    },

    /// Kind requires a timestamp but none was present
    #[error("Missing timestamp on {0}")]
    MissingTimestamp(KeyType),

    /// Kind carries no timestamp but one was present
    #[error("Unexpected timestamp on {0}")]
    UnexpectedTimestamp(KeyType),

    /// Kind requires a UUIDv7 session id but none was present
    #[error("Missing session uuid on {0}")]
    MissingSessionUuid(KeyType),

    /// Kind carries no session id but one was present
    #[error("Unexpected session uuid on {0}")]
    UnexpectedSessionUuid(KeyType),

    /// Session id present but not a version 7 UUID
    #[error("Session uuid on {0} is not UUIDv7")]
    InvalidSessionUuid(KeyType),

    /// Hash field was not a 32-byte lowercase hex digest
    #[error("Invalid key hash: {0}")]
    InvalidHash(String),

    /// Signature object failed structural checks
    #[error("Invalid signature object: {0}")]
    InvalidSignature(String),

    /// Public and private halves belong to different keys
    #[error("Mismatched {0} pair")]
    MismatchedPair(KeyType),

    /// Wire encoding error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Primitive failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<serde_json::Error> for KeyError {
    fn from(err: serde_json::Error) -> Self {
        KeyError::Malformed(err.to_string())
    }
}
