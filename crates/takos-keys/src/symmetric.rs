//! Symmetric keys: room keys and device keys

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use takos_core::{codec::serde_base64, Timestamp, PROTOCOL_VERSION};
use takos_crypto::{generate_symmetric_key, hash_sha256_hex};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::error::{KeyError, Result};
use crate::kind::KeyType;

/// Symmetric key for one room epoch.
///
/// `masterKeysHashHex` maps each participant's principal id to the SHA-256 of
/// the master key whose chain the room key was issued to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomKey {
    #[serde(with = "serde_base64")]
    key: Vec<u8>,

    #[serde(rename = "type")]
    key_type: KeyType,

    version: u32,

    timestamp: Timestamp,

    session_uuid: Uuid,

    master_keys_hash_hex: BTreeMap<String, String>,
}

pub(crate) fn is_hash_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl RoomKey {
    /// Fresh random key stamped with the current time and a UUIDv7 epoch id
    pub fn generate(master_keys_hash_hex: BTreeMap<String, String>) -> Result<Self> {
        let key = generate_symmetric_key();
        let room_key = Self {
            key: key.to_vec(),
            key_type: KeyType::RoomKey,
            version: PROTOCOL_VERSION,
            timestamp: Timestamp::now(),
            session_uuid: Uuid::now_v7(),
            master_keys_hash_hex,
        };
        room_key.check()?;
        Ok(room_key)
    }

    /// Structural check
    pub fn check(&self) -> Result<()> {
        if self.key_type != KeyType::RoomKey {
            return Err(KeyError::TypeMismatch {
                expected: KeyType::RoomKey,
                actual: self.key_type,
            });
        }
        if self.version != PROTOCOL_VERSION {
            return Err(KeyError::UnsupportedVersion(self.version));
        }
        if self.key.len() != KeyType::RoomKey.key_len() {
            return Err(KeyError::InvalidLength {
                kind: KeyType::RoomKey,
                expected: KeyType::RoomKey.key_len(),
                actual: self.key.len(),
            });
        }
        if self.session_uuid.get_version_num() != 7 {
            return Err(KeyError::InvalidSessionUuid(KeyType::RoomKey));
        }
        if let Some((principal, hash)) = self
            .master_keys_hash_hex
            .iter()
            .find(|(_, hash)| !is_hash_hex(hash))
        {
            return Err(KeyError::InvalidHash(format!("{principal}: {hash}")));
        }
        Ok(())
    }

    /// Decode and check JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let room_key: RoomKey = serde_json::from_str(json)?;
        room_key.check()?;
        Ok(room_key)
    }

    /// Whether `json` decodes as a room key
    pub fn is_valid_json(json: &str) -> bool {
        Self::from_json(json).is_ok()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn session_uuid(&self) -> Uuid {
        self.session_uuid
    }

    pub fn master_keys_hash_hex(&self) -> &BTreeMap<String, String> {
        &self.master_keys_hash_hex
    }

    /// SHA-256 of the raw key, lowercase hex
    pub fn key_hash_hex(&self) -> String {
        hash_sha256_hex(&self.key)
    }

    /// Bytes signed by the creator: `key ‖ timestamp`
    pub fn signed_payload(&self) -> Vec<u8> {
        takos_core::concat_bytes(&[&self.key, &self.timestamp.to_bytes()])
    }

    /// Whether the key is older than `ttl` at `now`
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        let age = now.as_millis().saturating_sub(self.timestamp.as_millis());
        age > 0 && age as u128 > ttl.as_millis()
    }
}

impl Drop for RoomKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomKey")
            .field("key", &"<secret>")
            .field("timestamp", &self.timestamp)
            .field("session_uuid", &self.session_uuid)
            .field("master_keys_hash_hex", &self.master_keys_hash_hex)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> RoomKey {
        let mut hashes = BTreeMap::new();
        hashes.insert("alice@example.com".to_string(), "ab".repeat(32));
        RoomKey::generate(hashes).unwrap()
    }

    #[test]
    fn test_generate_and_roundtrip() {
        let room_key = sample();
        assert_eq!(room_key.key_bytes().len(), 32);
        assert_eq!(room_key.session_uuid().get_version_num(), 7);

        let json = room_key.to_json().unwrap();
        assert!(json.contains("\"type\":\"roomKey\""));
        assert!(json.contains("masterKeysHashHex"));
        assert_eq!(RoomKey::from_json(&json).unwrap(), room_key);
    }

    #[test]
    fn test_rejects_bad_hash_entries() {
        let mut hashes = BTreeMap::new();
        hashes.insert("bob".to_string(), "XYZ".to_string());
        assert!(matches!(RoomKey::generate(hashes), Err(KeyError::InvalidHash(_))));
    }

    #[test]
    fn test_rejects_length_change() {
        let json = sample().to_json().unwrap();
        let mut value: Value = serde_json::from_str(&json).unwrap();
        value["key"] = Value::from(takos_core::encode_base64(&[1u8; 33]));
        assert!(!RoomKey::is_valid_json(&value.to_string()));
    }

    #[test]
    fn test_signed_payload_layout() {
        let room_key = sample();
        let payload = room_key.signed_payload();
        assert_eq!(&payload[..32], room_key.key_bytes());
        assert_eq!(&payload[32..], room_key.timestamp().to_canonical().as_bytes());
    }

    #[test]
    fn test_expiry() {
        let room_key = sample();
        let ttl = Duration::from_secs(600);
        assert!(!room_key.is_expired(room_key.timestamp(), ttl));
        let later = room_key.timestamp().offset_millis(600_001).unwrap();
        assert!(room_key.is_expired(later, ttl));
        let edge = room_key.timestamp().offset_millis(600_000).unwrap();
        assert!(!room_key.is_expired(edge, ttl));
    }
}
