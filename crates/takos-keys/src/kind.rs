//! Key kinds and their fixed wire properties

use serde::{Deserialize, Serialize};
use std::fmt;
use takos_crypto::{
    AES256_KEY_SIZE, MLDSA65_PUBLIC_KEY_SIZE, MLDSA65_SECRET_KEY_SIZE, MLKEM768_PUBLIC_KEY_SIZE,
    MLKEM768_SECRET_KEY_SIZE,
};

/// Primitive backing a key kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ML-DSA-65 signatures
    MlDsa65,
    /// ML-KEM-768 encapsulation
    MlKem768,
    /// AES-256-GCM
    Aes256Gcm,
}

/// Discriminant carried in the `type` field of every key object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    MasterKeyPublic,
    MasterKeyPrivate,
    IdentityKeyPublic,
    IdentityKeyPrivate,
    AccountKeyPublic,
    AccountKeyPrivate,
    KeyShareKeyPublic,
    KeyShareKeyPrivate,
    KeyShareSignKeyPublic,
    KeyShareSignKeyPrivate,
    MigrateKeyPublic,
    MigrateKeyPrivate,
    MigrateSignKeyPublic,
    MigrateSignKeyPrivate,
    DeviceKey,
    RoomKey,
}

impl KeyType {
    /// Every kind, in declaration order
    pub const ALL: [KeyType; 16] = [
        KeyType::MasterKeyPublic,
        KeyType::MasterKeyPrivate,
        KeyType::IdentityKeyPublic,
        KeyType::IdentityKeyPrivate,
        KeyType::AccountKeyPublic,
        KeyType::AccountKeyPrivate,
        KeyType::KeyShareKeyPublic,
        KeyType::KeyShareKeyPrivate,
        KeyType::KeyShareSignKeyPublic,
        KeyType::KeyShareSignKeyPrivate,
        KeyType::MigrateKeyPublic,
        KeyType::MigrateKeyPrivate,
        KeyType::MigrateSignKeyPublic,
        KeyType::MigrateSignKeyPrivate,
        KeyType::DeviceKey,
        KeyType::RoomKey,
    ];

    /// Wire name of the discriminant
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::MasterKeyPublic => "masterKeyPublic",
            KeyType::MasterKeyPrivate => "masterKeyPrivate",
            KeyType::IdentityKeyPublic => "identityKeyPublic",
            KeyType::IdentityKeyPrivate => "identityKeyPrivate",
            KeyType::AccountKeyPublic => "accountKeyPublic",
            KeyType::AccountKeyPrivate => "accountKeyPrivate",
            KeyType::KeyShareKeyPublic => "keyShareKeyPublic",
            KeyType::KeyShareKeyPrivate => "keyShareKeyPrivate",
            KeyType::KeyShareSignKeyPublic => "keyShareSignKeyPublic",
            KeyType::KeyShareSignKeyPrivate => "keyShareSignKeyPrivate",
            KeyType::MigrateKeyPublic => "migrateKeyPublic",
            KeyType::MigrateKeyPrivate => "migrateKeyPrivate",
            KeyType::MigrateSignKeyPublic => "migrateSignKeyPublic",
            KeyType::MigrateSignKeyPrivate => "migrateSignKeyPrivate",
            KeyType::DeviceKey => "deviceKey",
            KeyType::RoomKey => "roomKey",
        }
    }

    /// Look up a discriminant by wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    /// Primitive backing this kind
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyType::MasterKeyPublic
            | KeyType::MasterKeyPrivate
            | KeyType::IdentityKeyPublic
            | KeyType::IdentityKeyPrivate
            | KeyType::KeyShareSignKeyPublic
            | KeyType::KeyShareSignKeyPrivate
            | KeyType::MigrateSignKeyPublic
            | KeyType::MigrateSignKeyPrivate => Algorithm::MlDsa65,
            KeyType::AccountKeyPublic
            | KeyType::AccountKeyPrivate
            | KeyType::KeyShareKeyPublic
            | KeyType::KeyShareKeyPrivate
            | KeyType::MigrateKeyPublic
            | KeyType::MigrateKeyPrivate => Algorithm::MlKem768,
            KeyType::DeviceKey | KeyType::RoomKey => Algorithm::Aes256Gcm,
        }
    }

    /// Whether this is the public half of an asymmetric pair
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            KeyType::MasterKeyPublic
                | KeyType::IdentityKeyPublic
                | KeyType::AccountKeyPublic
                | KeyType::KeyShareKeyPublic
                | KeyType::KeyShareSignKeyPublic
                | KeyType::MigrateKeyPublic
                | KeyType::MigrateSignKeyPublic
        )
    }

    /// Exact decoded length of the `key` field
    pub fn key_len(&self) -> usize {
        match (self.algorithm(), self.is_public()) {
            (Algorithm::MlDsa65, true) => MLDSA65_PUBLIC_KEY_SIZE,
            (Algorithm::MlDsa65, false) => MLDSA65_SECRET_KEY_SIZE,
            (Algorithm::MlKem768, true) => MLKEM768_PUBLIC_KEY_SIZE,
            (Algorithm::MlKem768, false) => MLKEM768_SECRET_KEY_SIZE,
            (Algorithm::Aes256Gcm, _) => AES256_KEY_SIZE,
        }
    }

    /// Whether objects of this kind carry a `timestamp`
    pub fn has_timestamp(&self) -> bool {
        matches!(
            self,
            KeyType::MasterKeyPublic
                | KeyType::MasterKeyPrivate
                | KeyType::IdentityKeyPublic
                | KeyType::IdentityKeyPrivate
                | KeyType::KeyShareKeyPublic
                | KeyType::KeyShareKeyPrivate
                | KeyType::KeyShareSignKeyPublic
                | KeyType::KeyShareSignKeyPrivate
                | KeyType::RoomKey
        )
    }

    /// Whether objects of this kind carry a UUIDv7 `sessionUuid`
    pub fn has_session_uuid(&self) -> bool {
        matches!(
            self,
            KeyType::KeyShareKeyPublic
                | KeyType::KeyShareKeyPrivate
                | KeyType::KeyShareSignKeyPublic
                | KeyType::KeyShareSignKeyPrivate
                | KeyType::RoomKey
        )
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
