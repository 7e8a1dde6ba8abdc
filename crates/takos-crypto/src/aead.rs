//! AES-256-GCM authenticated encryption
//!
//! Callers choose the IV. With long-lived keys (room keys, device keys) the IV
//! must be fresh per call, see [`generate_iv`]. A fixed IV is only acceptable
//! when the key itself is single-use, as with a KEM shared secret.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// AES-256 key size
pub const AES256_KEY_SIZE: usize = 32;

/// GCM IV size
pub const AEAD_IV_SIZE: usize = 12;

/// GCM tag size
pub const AEAD_TAG_SIZE: usize = 16;

/// All-zero IV for single-use keys
pub const FIXED_IV: [u8; AEAD_IV_SIZE] = [0u8; AEAD_IV_SIZE];

/// Generate a random 256-bit symmetric key
pub fn generate_symmetric_key() -> Zeroizing<[u8; AES256_KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; AES256_KEY_SIZE]);
    OsRng.fill_bytes(&mut key[..]);
    key
}

/// Generate a random 12-byte IV
pub fn generate_iv() -> [u8; AEAD_IV_SIZE] {
    let mut iv = [0u8; AEAD_IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

fn less_safe_key(key: &[u8]) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| CryptoError::InvalidSecretKey(format!("AES-256 key must be {AES256_KEY_SIZE} bytes")))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext`, returning ciphertext with the tag appended
pub fn seal(key: &[u8], iv: &[u8; AEAD_IV_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = less_safe_key(key)?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(*iv), Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::SealFailed)?;
    Ok(in_out)
}

/// Decrypt and authenticate `ciphertext` (tag appended)
pub fn open(key: &[u8], iv: &[u8; AEAD_IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let key = less_safe_key(key)?;
    let mut in_out = ciphertext.to_vec();
    let len = key
        .open_in_place(Nonce::assume_unique_for_key(*iv), Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::OpenFailed)?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}
