//! Cryptographic error types

use thiserror::Error;

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors in cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid public key
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid secret key
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Invalid signature encoding
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid KEM ciphertext
    #[error("Invalid KEM ciphertext: {0}")]
    InvalidCiphertext(String),

    /// AEAD seal failed
    #[error("Encryption failed")]
    SealFailed,

    /// AEAD open failed (tag mismatch or truncated input)
    #[error("Decryption failed")]
    OpenFailed,
}
