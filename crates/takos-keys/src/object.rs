//! Key objects on the wire and their typed wrappers
//!
//! [`KeyObject`] is the untyped record `{ key, type, version, timestamp?,
//! sessionUuid? }`. Each key kind gets a newtype that can only be built from
//! a `KeyObject` that passed [`KeyObject::check`] for that kind, so holding a
//! `MasterKeyPublic` means the bytes have the right length, tag and version.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use takos_core::{codec::serde_base64, Timestamp, PROTOCOL_VERSION};
use takos_crypto::{hash_sha256, hash_sha256_hex};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::error::{KeyError, Result};
use crate::kind::KeyType;
use crate::symmetric::RoomKey;

/// Untyped key record as carried in JSON
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyObject {
    /// Raw key bytes (base64 on the wire)
    #[serde(with = "serde_base64")]
    pub key: Vec<u8>,

    /// Kind discriminant
    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Protocol version, currently always 1
    pub version: u32,

    /// Issue time, for timestamped kinds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,

    /// Session binding, for key-share kinds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_uuid: Option<Uuid>,
}

impl KeyObject {
    /// Build a current-version object. Not checked until wrapped.
    pub fn new(
        key_type: KeyType,
        key: Vec<u8>,
        timestamp: Option<Timestamp>,
        session_uuid: Option<Uuid>,
    ) -> Self {
        Self {
            key,
            key_type,
            version: PROTOCOL_VERSION,
            timestamp,
            session_uuid,
        }
    }

    /// Deserialize without kind checks
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Deserialize and check against `expected`
    pub fn from_json(json: &str, expected: KeyType) -> Result<Self> {
        let obj = Self::parse(json)?;
        obj.check(expected)?;
        Ok(obj)
    }

    /// Structural check: tag, version, exact length, optional fields
    pub fn check(&self, expected: KeyType) -> Result<()> {
        if self.key_type != expected {
            return Err(KeyError::TypeMismatch {
                expected,
                actual: self.key_type,
            });
        }
        if self.version != PROTOCOL_VERSION {
            return Err(KeyError::UnsupportedVersion(self.version));
        }
        if self.key.len() != expected.key_len() {
            return Err(KeyError::InvalidLength {
                kind: expected,
                expected: expected.key_len(),
                actual: self.key.len(),
            });
        }
        match (expected.has_timestamp(), self.timestamp.is_some()) {
            (true, false) => return Err(KeyError::MissingTimestamp(expected)),
            (false, true) => return Err(KeyError::UnexpectedTimestamp(expected)),
            _ => {}
        }
        match (expected.has_session_uuid(), self.session_uuid) {
            (true, None) => return Err(KeyError::MissingSessionUuid(expected)),
            (true, Some(uuid)) if uuid.get_version_num() != 7 => {
                return Err(KeyError::InvalidSessionUuid(expected))
            }
            (false, Some(_)) => return Err(KeyError::UnexpectedSessionUuid(expected)),
            _ => {}
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Drop for KeyObject {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for KeyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("KeyObject");
        s.field("type", &self.key_type).field("version", &self.version);
        if self.key_type.is_public() {
            s.field("key", &hash_sha256_hex(&self.key));
        } else {
            s.field("key", &format_args!("<{} secret bytes>", self.key.len()));
        }
        s.field("timestamp", &self.timestamp)
            .field("session_uuid", &self.session_uuid)
            .finish()
    }
}

/// Pure structural validation of an untrusted JSON key object.
///
/// Never a mathematical key check and never panics.
pub fn validate(kind: KeyType, json: &str) -> bool {
    let result = match kind {
        KeyType::RoomKey => RoomKey::from_json(json).map(|_| ()),
        _ => KeyObject::from_json(json, kind).map(|_| ()),
    };
    if let Err(err) = &result {
        tracing::debug!(%kind, error = %err, "key object rejected");
    }
    result.is_ok()
}

/// Common behaviour of every typed key wrapper
pub trait TypedKey: Sized {
    /// Kind this wrapper accepts
    const KEY_TYPE: KeyType;

    /// Underlying wire record
    fn object(&self) -> &KeyObject;

    /// Wrap a record after checking it against [`Self::KEY_TYPE`]
    fn from_object(obj: KeyObject) -> Result<Self>;

    /// Unwrap into the wire record
    fn into_object(self) -> KeyObject;

    /// Decode and check JSON
    fn from_json(json: &str) -> Result<Self> {
        Self::from_object(KeyObject::parse(json)?)
    }

    /// Whether `json` decodes as this kind
    fn is_valid_json(json: &str) -> bool {
        Self::from_json(json).is_ok()
    }

    /// Serialize to JSON
    fn to_json(&self) -> Result<String> {
        self.object().to_json()
    }

    /// Raw key bytes
    fn key_bytes(&self) -> &[u8] {
        &self.object().key
    }

    /// SHA-256 of the raw key bytes
    fn key_hash(&self) -> [u8; 32] {
        hash_sha256(self.key_bytes())
    }

    /// SHA-256 of the raw key bytes, lowercase hex
    fn key_hash_hex(&self) -> String {
        hash_sha256_hex(self.key_bytes())
    }

    /// Issue time, if the kind carries one
    fn timestamp(&self) -> Option<Timestamp> {
        self.object().timestamp
    }

    /// Session binding, if the kind carries one
    fn session_uuid(&self) -> Option<Uuid> {
        self.object().session_uuid
    }
}

/// ML-DSA-65 public key usable to verify signatures
pub trait VerifyingKey: TypedKey {}

/// ML-DSA-65 private key usable to sign
pub trait SigningKey: TypedKey {}

/// ML-KEM-768 public key usable as an encryption recipient
pub trait KemPublicKey: TypedKey {}

/// ML-KEM-768 private key usable to decapsulate
pub trait KemPrivateKey: TypedKey {}

/// Key whose public half is signed by a parent key.
///
/// The signed payload is part of each kind's contract; see
/// [`Delegated::delegation_payload`].
pub trait Delegated: TypedKey {
    /// Kind of the delegating parent
    type Parent: VerifyingKey;

    /// Exact bytes the parent signs
    fn delegation_payload(&self) -> Vec<u8>;
}

macro_rules! typed_key {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name(KeyObject);

        impl TypedKey for $name {
            const KEY_TYPE: KeyType = $kind;

            fn object(&self) -> &KeyObject {
                &self.0
            }

            fn from_object(obj: KeyObject) -> Result<Self> {
                obj.check(Self::KEY_TYPE)?;
                Ok(Self(obj))
            }

            fn into_object(self) -> KeyObject {
                self.0
            }
        }

        impl TryFrom<KeyObject> for $name {
            type Error = KeyError;

            fn try_from(obj: KeyObject) -> Result<Self> {
                Self::from_object(obj)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let obj = KeyObject::deserialize(deserializer)?;
                Self::from_object(obj).map_err(serde::de::Error::custom)
            }
        }
    };
}

typed_key!(
    /// Root-of-trust verification key
    MasterKeyPublic => KeyType::MasterKeyPublic
);
typed_key!(MasterKeyPrivate => KeyType::MasterKeyPrivate);
typed_key!(
    /// Timestamped signer delegated by a master key
    IdentityKeyPublic => KeyType::IdentityKeyPublic
);
typed_key!(IdentityKeyPrivate => KeyType::IdentityKeyPrivate);
typed_key!(
    /// KEM key receiving wrapped room keys, delegated by an identity key
    AccountKeyPublic => KeyType::AccountKeyPublic
);
typed_key!(AccountKeyPrivate => KeyType::AccountKeyPrivate);
typed_key!(
    /// Session-scoped KEM key
    KeyShareKeyPublic => KeyType::KeyShareKeyPublic
);
typed_key!(KeyShareKeyPrivate => KeyType::KeyShareKeyPrivate);
typed_key!(
    /// Session-scoped signing key
    KeyShareSignKeyPublic => KeyType::KeyShareSignKeyPublic
);
typed_key!(KeyShareSignKeyPrivate => KeyType::KeyShareSignKeyPrivate);
typed_key!(
    /// KEM key used only for account-migration payloads
    MigrateKeyPublic => KeyType::MigrateKeyPublic
);
typed_key!(MigrateKeyPrivate => KeyType::MigrateKeyPrivate);
typed_key!(
    /// Signing key used only for account-migration payloads
    MigrateSignKeyPublic => KeyType::MigrateSignKeyPublic
);
typed_key!(MigrateSignKeyPrivate => KeyType::MigrateSignKeyPrivate);
typed_key!(
    /// Local AES-256 key protecting key material at rest. Never transmitted.
    DeviceKey => KeyType::DeviceKey
);

impl VerifyingKey for MasterKeyPublic {}
impl VerifyingKey for IdentityKeyPublic {}
impl VerifyingKey for KeyShareSignKeyPublic {}
impl VerifyingKey for MigrateSignKeyPublic {}

impl SigningKey for MasterKeyPrivate {}
impl SigningKey for IdentityKeyPrivate {}
impl SigningKey for KeyShareSignKeyPrivate {}
impl SigningKey for MigrateSignKeyPrivate {}

impl KemPublicKey for AccountKeyPublic {}
impl KemPublicKey for KeyShareKeyPublic {}
impl KemPublicKey for MigrateKeyPublic {}

impl KemPrivateKey for AccountKeyPrivate {}
impl KemPrivateKey for KeyShareKeyPrivate {}
impl KemPrivateKey for MigrateKeyPrivate {}

/// `key ‖ timestamp` for timestamped kinds
fn key_and_timestamp(obj: &KeyObject) -> Vec<u8> {
    let ts = obj.timestamp.map(|t| t.to_bytes()).unwrap_or_default();
    takos_core::concat_bytes(&[&obj.key, &ts])
}

impl Delegated for IdentityKeyPublic {
    type Parent = MasterKeyPublic;

    fn delegation_payload(&self) -> Vec<u8> {
        key_and_timestamp(&self.0)
    }
}

impl Delegated for AccountKeyPublic {
    type Parent = IdentityKeyPublic;

    /// Account keys are not timestamped; only the key bytes are signed.
    fn delegation_payload(&self) -> Vec<u8> {
        self.0.key.clone()
    }
}

impl Delegated for KeyShareKeyPublic {
    type Parent = MasterKeyPublic;

    fn delegation_payload(&self) -> Vec<u8> {
        key_and_timestamp(&self.0)
    }
}

impl Delegated for KeyShareSignKeyPublic {
    type Parent = MasterKeyPublic;

    fn delegation_payload(&self) -> Vec<u8> {
        key_and_timestamp(&self.0)
    }
}

/// Public/private halves of one key
#[derive(Clone, Debug)]
pub struct KeyPair<P, S> {
    pub public: P,
    pub private: S,
}

impl<P: TypedKey, S: TypedKey> KeyPair<P, S> {
    /// Pair two halves
    pub fn new(public: P, private: S) -> Self {
        Self { public, private }
    }

    /// Decode both halves from JSON.
    ///
    /// Only the structure of each half is checked. Use
    /// [`check_pair`](crate::signature::check_pair) to confirm that the halves
    /// of a signing pair belong together.
    pub fn from_json(public_json: &str, private_json: &str) -> Result<Self> {
        Ok(Self {
            public: P::from_json(public_json)?,
            private: S::from_json(private_json)?,
        })
    }
}

pub type MasterKeyPair = KeyPair<MasterKeyPublic, MasterKeyPrivate>;
pub type IdentityKeyPair = KeyPair<IdentityKeyPublic, IdentityKeyPrivate>;
pub type AccountKeyPair = KeyPair<AccountKeyPublic, AccountKeyPrivate>;
pub type KeyShareKeyPair = KeyPair<KeyShareKeyPublic, KeyShareKeyPrivate>;
pub type KeyShareSignKeyPair = KeyPair<KeyShareSignKeyPublic, KeyShareSignKeyPrivate>;
pub type MigrateKeyPair = KeyPair<MigrateKeyPublic, MigrateKeyPrivate>;
pub type MigrateSignKeyPair = KeyPair<MigrateSignKeyPublic, MigrateSignKeyPrivate>;

/// Any key object, decoded by its discriminant
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnyKey {
    MasterKeyPublic(MasterKeyPublic),
    MasterKeyPrivate(MasterKeyPrivate),
    IdentityKeyPublic(IdentityKeyPublic),
    IdentityKeyPrivate(IdentityKeyPrivate),
    AccountKeyPublic(AccountKeyPublic),
    AccountKeyPrivate(AccountKeyPrivate),
    KeyShareKeyPublic(KeyShareKeyPublic),
    KeyShareKeyPrivate(KeyShareKeyPrivate),
    KeyShareSignKeyPublic(KeyShareSignKeyPublic),
    KeyShareSignKeyPrivate(KeyShareSignKeyPrivate),
    MigrateKeyPublic(MigrateKeyPublic),
    MigrateKeyPrivate(MigrateKeyPrivate),
    MigrateSignKeyPublic(MigrateSignKeyPublic),
    MigrateSignKeyPrivate(MigrateSignKeyPrivate),
    DeviceKey(DeviceKey),
    RoomKey(RoomKey),
}

#[derive(Deserialize)]
struct Discriminant {
    #[serde(rename = "type")]
    key_type: KeyType,
}

impl AnyKey {
    /// Read the discriminant, then decode and check as that kind
    pub fn from_json(json: &str) -> Result<Self> {
        let tag: Discriminant = serde_json::from_str(json)?;
        let key = match tag.key_type {
            KeyType::MasterKeyPublic => AnyKey::MasterKeyPublic(TypedKey::from_json(json)?),
            KeyType::MasterKeyPrivate => AnyKey::MasterKeyPrivate(TypedKey::from_json(json)?),
            KeyType::IdentityKeyPublic => AnyKey::IdentityKeyPublic(TypedKey::from_json(json)?),
            KeyType::IdentityKeyPrivate => AnyKey::IdentityKeyPrivate(TypedKey::from_json(json)?),
            KeyType::AccountKeyPublic => AnyKey::AccountKeyPublic(TypedKey::from_json(json)?),
            KeyType::AccountKeyPrivate => AnyKey::AccountKeyPrivate(TypedKey::from_json(json)?),
            KeyType::KeyShareKeyPublic => AnyKey::KeyShareKeyPublic(TypedKey::from_json(json)?),
            KeyType::KeyShareKeyPrivate => AnyKey::KeyShareKeyPrivate(TypedKey::from_json(json)?),
            KeyType::KeyShareSignKeyPublic => {
                AnyKey::KeyShareSignKeyPublic(TypedKey::from_json(json)?)
            }
            KeyType::KeyShareSignKeyPrivate => {
                AnyKey::KeyShareSignKeyPrivate(TypedKey::from_json(json)?)
            }
            KeyType::MigrateKeyPublic => AnyKey::MigrateKeyPublic(TypedKey::from_json(json)?),
            KeyType::MigrateKeyPrivate => AnyKey::MigrateKeyPrivate(TypedKey::from_json(json)?),
            KeyType::MigrateSignKeyPublic => {
                AnyKey::MigrateSignKeyPublic(TypedKey::from_json(json)?)
            }
            KeyType::MigrateSignKeyPrivate => {
                AnyKey::MigrateSignKeyPrivate(TypedKey::from_json(json)?)
            }
            KeyType::DeviceKey => AnyKey::DeviceKey(TypedKey::from_json(json)?),
            KeyType::RoomKey => AnyKey::RoomKey(RoomKey::from_json(json)?),
        };
        Ok(key)
    }

    /// Discriminant of the decoded key
    pub fn key_type(&self) -> KeyType {
        match self {
            AnyKey::MasterKeyPublic(_) => KeyType::MasterKeyPublic,
            AnyKey::MasterKeyPrivate(_) => KeyType::MasterKeyPrivate,
            AnyKey::IdentityKeyPublic(_) => KeyType::IdentityKeyPublic,
            AnyKey::IdentityKeyPrivate(_) => KeyType::IdentityKeyPrivate,
            AnyKey::AccountKeyPublic(_) => KeyType::AccountKeyPublic,
            AnyKey::AccountKeyPrivate(_) => KeyType::AccountKeyPrivate,
            AnyKey::KeyShareKeyPublic(_) => KeyType::KeyShareKeyPublic,
            AnyKey::KeyShareKeyPrivate(_) => KeyType::KeyShareKeyPrivate,
            AnyKey::KeyShareSignKeyPublic(_) => KeyType::KeyShareSignKeyPublic,
            AnyKey::KeyShareSignKeyPrivate(_) => KeyType::KeyShareSignKeyPrivate,
            AnyKey::MigrateKeyPublic(_) => KeyType::MigrateKeyPublic,
            AnyKey::MigrateKeyPrivate(_) => KeyType::MigrateKeyPrivate,
            AnyKey::MigrateSignKeyPublic(_) => KeyType::MigrateSignKeyPublic,
            AnyKey::MigrateSignKeyPrivate(_) => KeyType::MigrateSignKeyPrivate,
            AnyKey::DeviceKey(_) => KeyType::DeviceKey,
            AnyKey::RoomKey(_) => KeyType::RoomKey,
        }
    }
}
