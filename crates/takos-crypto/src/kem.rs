//! ML-KEM-768 key encapsulation (FIPS 203)

use pqcrypto_mlkem::mlkem768;
use pqcrypto_traits::kem::{
    Ciphertext as PqCiphertext, PublicKey as PqPublicKey, SecretKey as PqSecretKey,
    SharedSecret as PqSharedSecret,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::secret::SecretBytes;

/// ML-KEM-768 public key size
pub const MLKEM768_PUBLIC_KEY_SIZE: usize = 1184;

/// ML-KEM-768 secret key size
pub const MLKEM768_SECRET_KEY_SIZE: usize = 2400;

/// ML-KEM-768 ciphertext size
pub const MLKEM768_CIPHERTEXT_SIZE: usize = 1088;

/// ML-KEM-768 shared secret size
pub const MLKEM768_SHARED_SECRET_SIZE: usize = 32;

/// Offset of the encapsulation key inside a decapsulation key
/// (`dk = dk_pke ‖ ek ‖ H(ek) ‖ z`)
const MLKEM768_EMBEDDED_PUBLIC_OFFSET: usize = 1152;

/// Extract the public key embedded in an ML-KEM-768 secret key
pub fn public_key_from_secret(secret_key: &[u8]) -> Result<&[u8]> {
    if secret_key.len() != MLKEM768_SECRET_KEY_SIZE {
        return Err(CryptoError::InvalidSecretKey(format!(
            "ML-KEM-768 secret key must be {MLKEM768_SECRET_KEY_SIZE} bytes, got {}",
            secret_key.len()
        )));
    }
    let end = MLKEM768_EMBEDDED_PUBLIC_OFFSET + MLKEM768_PUBLIC_KEY_SIZE;
    Ok(&secret_key[MLKEM768_EMBEDDED_PUBLIC_OFFSET..end])
}

/// Raw ML-KEM-768 keypair
pub struct KemKeyPair {
    /// Public key bytes (1184)
    pub public_key: Vec<u8>,

    /// Secret key bytes (2400, zeroized on drop)
    pub secret_key: SecretBytes,
}

impl KemKeyPair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        let (pk, sk) = mlkem768::keypair();
        Self {
            public_key: pk.as_bytes().to_vec(),
            secret_key: SecretBytes::new(sk.as_bytes().to_vec()),
        }
    }
}

/// Decapsulated shared secret
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    secret: [u8; MLKEM768_SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the shared secret bytes
    pub fn as_bytes(&self) -> &[u8; MLKEM768_SHARED_SECRET_SIZE] {
        &self.secret
    }

    fn from_slice(bytes: &[u8]) -> Result<Self> {
        let secret = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidCiphertext("shared secret length".to_string()))?;
        Ok(Self { secret })
    }
}

/// ML-KEM-768 operations
pub struct Kem;

impl Kem {
    /// Encapsulate a fresh shared secret to `public_key`.
    ///
    /// Returns the secret and the ciphertext to transmit.
    pub fn encapsulate(public_key: &[u8]) -> Result<(SharedSecret, Vec<u8>)> {
        let pk = mlkem768::PublicKey::from_bytes(public_key)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("ML-KEM-768: {e:?}")))?;
        let (shared, ciphertext) = mlkem768::encapsulate(&pk);
        Ok((
            SharedSecret::from_slice(shared.as_bytes())?,
            ciphertext.as_bytes().to_vec(),
        ))
    }

    /// Recover the shared secret from a ciphertext.
    ///
    /// ML-KEM decapsulation never fails on a well-formed ciphertext; a wrong
    /// key yields an unrelated secret that the AEAD layer then rejects.
    pub fn decapsulate(secret_key: &[u8], ciphertext: &[u8]) -> Result<SharedSecret> {
        let sk = mlkem768::SecretKey::from_bytes(secret_key)
            .map_err(|e| CryptoError::InvalidSecretKey(format!("ML-KEM-768: {e:?}")))?;
        let ct = mlkem768::Ciphertext::from_bytes(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(format!("ML-KEM-768: {e:?}")))?;
        let shared = mlkem768::decapsulate(&ct, &sk);
        SharedSecret::from_slice(shared.as_bytes())
    }
}
