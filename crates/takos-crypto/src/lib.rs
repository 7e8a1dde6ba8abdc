//! # Takos Cryptography
//!
//! Primitive layer of the Takos key hierarchy:
//! - Signatures: ML-DSA-65 (FIPS 204)
//! - Key encapsulation: ML-KEM-768 (FIPS 203)
//! - Authenticated encryption: AES-256-GCM
//! - Hashing: SHA-256
//!
//! ## Sizes
//!
//! | Object | Algorithm | Bytes |
//! |--------|-----------|-------|
//! | Signing public key | ML-DSA-65 | 1952 |
//! | Signing secret key | ML-DSA-65 | 4032 |
//! | Signature | ML-DSA-65 | 3309 |
//! | KEM public key | ML-KEM-768 | 1184 |
//! | KEM secret key | ML-KEM-768 | 2400 |
//! | KEM ciphertext | ML-KEM-768 | 1088 |
//! | Symmetric key | AES-256-GCM | 32 |
//! | IV | AES-256-GCM | 12 |
//!
//! Everything here operates on raw byte slices. Typed, versioned key objects
//! live one layer up in `takos-keys`.

pub mod aead;
pub mod dsa;
pub mod error;
pub mod hash;
pub mod kem;
pub mod secret;

pub use aead::*;
pub use dsa::*;
pub use error::*;
pub use hash::*;
pub use kem::*;
pub use secret::*;

/// Cryptographic prelude
pub mod prelude {
    pub use crate::aead::{generate_iv, generate_symmetric_key, open, seal};
    pub use crate::dsa::{DsaKeyPair, DsaSigner, DsaVerifier};
    pub use crate::error::{CryptoError, Result};
    pub use crate::hash::{hash_sha256, hash_sha256_hex};
    pub use crate::kem::{Kem, KemKeyPair, SharedSecret};
    pub use crate::secret::SecretBytes;
}
