//! Protocol error types

use takos_core::{CodecError, Timestamp};
use takos_crypto::CryptoError;
use takos_keys::KeyError;
use thiserror::Error;

use crate::cipher::EnvelopeKind;

/// Errors building or opening an encrypted envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Envelope JSON or one of its fields is malformed
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// Envelope type does not match the opening key
    #[error("Envelope type mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: EnvelopeKind,
        actual: EnvelopeKind,
    },

    /// Version other than the current protocol version
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// Envelope is addressed to a different key
    #[error("Envelope addressed to a different key")]
    KeyHashMismatch,

    /// AEAD authentication failed
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Decrypted bytes were not UTF-8
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Key decoding or signing failure
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Primitive failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Result type for cipher operations
pub type Result<T> = std::result::Result<T, CipherError>;

/// Room key distribution failures. Any of these aborts the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    /// A participant's keys or signatures failed structural validation
    #[error("Invalid keys for {principal}: {reason}")]
    Structural { principal: String, reason: String },

    /// A delegation signature did not verify
    #[error("Broken {link} delegation for {principal}")]
    Cryptographic {
        principal: String,
        link: &'static str,
    },

    /// Identity key older than the latest one already seen
    #[error("Identity key rollback for {principal}: cached {cached}, presented {presented}")]
    IdentityRollback {
        principal: String,
        cached: Timestamp,
        presented: Timestamp,
    },

    /// Different master key that is not strictly newer than the credited one
    #[error("Master key downgrade for {principal}: credited {credited}, presented {presented}")]
    MasterKeyDowngrade {
        principal: String,
        credited: Timestamp,
        presented: Timestamp,
    },

    /// Principal listed more than once in one batch
    #[error("Duplicate principal in batch: {0}")]
    DuplicatePrincipal(String),

    /// Creator signing failure
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Wrapping or unwrapping the room key failed
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Errors surfaced by the async and configuration layers
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Key(#[from] KeyError),

    /// Host input that does not decode, or a key of the wrong kind
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Input(err.to_string())
    }
}

impl From<CodecError> for ProtocolError {
    fn from(err: CodecError) -> Self {
        ProtocolError::Input(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProtocolError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProtocolError::Task(err.to_string())
    }
}
