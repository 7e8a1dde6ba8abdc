//! SHA-256 hashing utilities
//!
//! Key fingerprints (`signedKeyHash`, `encryptedKeyHashHex`, credited master
//! key hashes) are all SHA-256 over the raw key bytes.

use ring::digest::{digest, SHA256};

/// SHA-256 digest size
pub const SHA256_SIZE: usize = 32;

/// Hash data using SHA-256
pub fn hash_sha256(data: &[u8]) -> [u8; SHA256_SIZE] {
    let mut out = [0u8; SHA256_SIZE];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// SHA-256 as lowercase hex
pub fn hash_sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_sha256(data))
}

/// Compare two digests without early exit
pub fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}
