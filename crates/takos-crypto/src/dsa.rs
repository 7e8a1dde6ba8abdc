//! ML-DSA-65 signatures (FIPS 204)
//!
//! Signatures are detached. Key generation draws from the primitive's
//! internal CSPRNG; there is no recoverable failure path.

use pqcrypto_mldsa::mldsa65;
use pqcrypto_traits::sign::{
    DetachedSignature as PqDetachedSignature, PublicKey as PqPublicKey, SecretKey as PqSecretKey,
};

use crate::error::{CryptoError, Result};
use crate::secret::SecretBytes;

/// ML-DSA-65 public key size
pub const MLDSA65_PUBLIC_KEY_SIZE: usize = 1952;

/// ML-DSA-65 secret key size
pub const MLDSA65_SECRET_KEY_SIZE: usize = 4032;

/// ML-DSA-65 signature size
pub const MLDSA65_SIGNATURE_SIZE: usize = 3309;

/// Raw ML-DSA-65 keypair
pub struct DsaKeyPair {
    /// Public key bytes (1952)
    pub public_key: Vec<u8>,

    /// Secret key bytes (4032, zeroized on drop)
    pub secret_key: SecretBytes,
}

impl DsaKeyPair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        let (pk, sk) = mldsa65::keypair();
        Self {
            public_key: pk.as_bytes().to_vec(),
            secret_key: SecretBytes::new(sk.as_bytes().to_vec()),
        }
    }
}

/// Detached ML-DSA-65 signer
pub struct DsaSigner;

impl DsaSigner {
    /// Sign `message` with a raw secret key
    pub fn sign(secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let sk = mldsa65::SecretKey::from_bytes(secret_key)
            .map_err(|e| CryptoError::InvalidSecretKey(format!("ML-DSA-65: {e:?}")))?;
        let sig = mldsa65::detached_sign(message, &sk);
        Ok(sig.as_bytes().to_vec())
    }
}

/// Detached ML-DSA-65 verifier
pub struct DsaVerifier;

impl DsaVerifier {
    /// Verify a detached signature.
    ///
    /// Malformed keys or signatures are reported as `Err`, a well-formed
    /// signature that does not match as `Ok(false)`.
    pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
        let pk = mldsa65::PublicKey::from_bytes(public_key)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("ML-DSA-65: {e:?}")))?;
        let sig = mldsa65::DetachedSignature::from_bytes(signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("ML-DSA-65: {e:?}")))?;
        Ok(mldsa65::verify_detached_signature(&sig, message, &pk).is_ok())
    }
}
