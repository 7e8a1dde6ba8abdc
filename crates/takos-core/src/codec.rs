//! Byte/string conversions used on the wire
//!
//! All byte fields travel as standard (padded) base64. Hash fields whose name
//! ends in `Hex` travel as lowercase hex. Signed payloads are plain
//! concatenations; the layout for each key kind is fixed by the caller.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CodecError, Result};

/// Encode bytes as standard base64
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))
}

/// Decode standard base64 and require an exact decoded length
pub fn decode_base64_exact(data: &str, expected: usize) -> Result<Vec<u8>> {
    let bytes = decode_base64(data)?;
    if bytes.len() != expected {
        return Err(CodecError::InvalidLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Decode a 32-byte lowercase or uppercase hex digest
pub fn decode_hash_hex(data: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(data).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
    bytes.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
        expected: 32,
        actual: bytes.len(),
    })
}

/// UTF-8 string to bytes
pub fn string_to_bytes(data: &str) -> Vec<u8> {
    data.as_bytes().to_vec()
}

/// Bytes to UTF-8 string
pub fn bytes_to_string(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
}

/// Concatenate byte slices into a single signed payload
pub fn concat_bytes(parts: &[&[u8]]) -> Vec<u8> {
    let total = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Serde adapter for `Vec<u8>` fields carried as base64 strings
pub mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::decode_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional base64 fields
pub mod serde_base64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_str(&super::encode_base64(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|s| super::decode_base64(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
