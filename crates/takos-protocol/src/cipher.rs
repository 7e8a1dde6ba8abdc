//! Hybrid cipher
//!
//! Two envelope shapes share one JSON record:
//!
//! - KEM-wrapped (`accountKey`, `keyShareKey`, `migrateKey`): a fresh ML-KEM-768
//!   encapsulation per call, the 32-byte shared secret keys AES-256-GCM under
//!   the all-zero IV. The key is never reused so the fixed IV is sound.
//! - Symmetric (`roomKey`, `deviceKey`): AES-256-GCM under the long-lived key
//!   with a fresh random 12-byte IV per call.
//!
//! `encryptedKeyHashHex` names the recipient and is checked before any
//! decryption is attempted.

use serde::{Deserialize, Serialize};
use std::fmt;
use takos_core::codec::{serde_base64, serde_base64_opt};
use takos_core::{decode_hash_hex, PROTOCOL_VERSION};
use takos_crypto::{
    aead, digest_eq, generate_iv, hash_sha256, hash_sha256_hex, public_key_from_secret, Kem,
    SharedSecret, AEAD_IV_SIZE, AEAD_TAG_SIZE, FIXED_IV, MLKEM768_CIPHERTEXT_SIZE,
};
use takos_keys::{
    AccountKeyPrivate, AccountKeyPublic, DeviceKey, KemPrivateKey, KemPublicKey,
    KeyShareKeyPrivate, KeyShareKeyPublic, MigrateKeyPrivate, MigrateKeyPublic, RoomKey,
    TypedKey,
};

use crate::error::{CipherError, Result};

/// Envelope discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeKind {
    AccountKey,
    KeyShareKey,
    MigrateKey,
    RoomKey,
    DeviceKey,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::AccountKey => "accountKey",
            EnvelopeKind::KeyShareKey => "keyShareKey",
            EnvelopeKind::MigrateKey => "migrateKey",
            EnvelopeKind::RoomKey => "roomKey",
            EnvelopeKind::DeviceKey => "deviceKey",
        }
    }

    /// Whether this envelope carries a KEM ciphertext
    pub fn is_kem(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::AccountKey | EnvelopeKind::KeyShareKey | EnvelopeKind::MigrateKey
        )
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encrypted payload addressed to one key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,

    pub version: u32,

    /// AEAD output with the tag appended
    #[serde(with = "serde_base64")]
    pub encrypted_data: Vec<u8>,

    /// SHA-256 of the recipient public key or raw symmetric key
    pub encrypted_key_hash_hex: String,

    /// KEM ciphertext, KEM variants only
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_base64_opt")]
    pub cipher_text: Option<Vec<u8>>,

    /// Random IV, symmetric variants only
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_base64_opt")]
    pub iv: Option<Vec<u8>>,
}

impl EncryptedEnvelope {
    /// Structural check against the kind the opener expects
    pub fn check(&self, expected: EnvelopeKind) -> Result<()> {
        if self.kind != expected {
            return Err(CipherError::KindMismatch {
                expected,
                actual: self.kind,
            });
        }
        if self.version != PROTOCOL_VERSION {
            return Err(CipherError::UnsupportedVersion(self.version));
        }
        decode_hash_hex(&self.encrypted_key_hash_hex)?;
        if self.encrypted_key_hash_hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(CipherError::Malformed("encryptedKeyHashHex must be lowercase".into()));
        }
        if self.encrypted_data.len() < AEAD_TAG_SIZE {
            return Err(CipherError::Malformed("encryptedData shorter than tag".into()));
        }

        if expected.is_kem() {
            match &self.cipher_text {
                Some(ct) if ct.len() == MLKEM768_CIPHERTEXT_SIZE => {}
                Some(ct) => {
                    return Err(CipherError::Malformed(format!(
                        "cipherText must be {MLKEM768_CIPHERTEXT_SIZE} bytes, got {}",
                        ct.len()
                    )))
                }
                None => return Err(CipherError::Malformed("missing cipherText".into())),
            }
            if self.iv.is_some() {
                return Err(CipherError::Malformed("unexpected iv".into()));
            }
        } else {
            match &self.iv {
                Some(iv) if iv.len() == AEAD_IV_SIZE => {}
                Some(iv) => {
                    return Err(CipherError::Malformed(format!(
                        "iv must be {AEAD_IV_SIZE} bytes, got {}",
                        iv.len()
                    )))
                }
                None => return Err(CipherError::Malformed("missing iv".into())),
            }
            if self.cipher_text.is_some() {
                return Err(CipherError::Malformed("unexpected cipherText".into()));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CipherError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CipherError::Malformed(e.to_string()))
    }

    fn addressed_to(&self, key_material: &[u8]) -> Result<()> {
        let claimed = decode_hash_hex(&self.encrypted_key_hash_hex)?;
        if digest_eq(&claimed, &hash_sha256(key_material)) {
            Ok(())
        } else {
            Err(CipherError::KeyHashMismatch)
        }
    }
}

/// Fresh encapsulation to a KEM public key
pub fn encapsulate<K: KemPublicKey>(public: &K) -> Result<(SharedSecret, Vec<u8>)> {
    Ok(Kem::encapsulate(public.key_bytes())?)
}

/// Recover the shared secret with a KEM private key
pub fn decapsulate<K: KemPrivateKey>(private: &K, ciphertext: &[u8]) -> Result<SharedSecret> {
    Ok(Kem::decapsulate(private.key_bytes(), ciphertext)?)
}

/// AES-256-GCM seal
pub fn aead_seal(key: &[u8], plaintext: &[u8], iv: &[u8; AEAD_IV_SIZE]) -> Result<Vec<u8>> {
    Ok(aead::seal(key, iv, plaintext)?)
}

/// AES-256-GCM open. Authentication failure is [`CipherError::DecryptionFailed`].
pub fn aead_open(key: &[u8], ciphertext: &[u8], iv: &[u8; AEAD_IV_SIZE]) -> Result<Vec<u8>> {
    aead::open(key, iv, ciphertext).map_err(|_| CipherError::DecryptionFailed)
}

/// A key that can be the target of [`encrypt_for`]
pub trait Recipient {
    /// Envelope kind produced for this key
    const ENVELOPE: EnvelopeKind;

    fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope>;
}

/// A key that can open envelopes with [`decrypt_with`]
pub trait Opener {
    /// Envelope kind accepted by this key
    const ENVELOPE: EnvelopeKind;

    fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>>;
}

/// Encrypt `plaintext` to `recipient`
pub fn encrypt_for<R: Recipient>(recipient: &R, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    recipient.seal(plaintext)
}

/// Open an envelope with the caller's own key
pub fn decrypt_with<O: Opener>(key: &O, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    key.open(envelope)
}

fn kem_seal<K: KemPublicKey>(
    kind: EnvelopeKind,
    public: &K,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope> {
    let (shared, cipher_text) = encapsulate(public)?;
    let encrypted_data = aead_seal(shared.as_bytes(), plaintext, &FIXED_IV)?;
    Ok(EncryptedEnvelope {
        kind,
        version: PROTOCOL_VERSION,
        encrypted_data,
        encrypted_key_hash_hex: public.key_hash_hex(),
        cipher_text: Some(cipher_text),
        iv: None,
    })
}

fn kem_open<K: KemPrivateKey>(
    kind: EnvelopeKind,
    private: &K,
    envelope: &EncryptedEnvelope,
) -> Result<Vec<u8>> {
    envelope.check(kind)?;
    envelope.addressed_to(public_key_from_secret(private.key_bytes())?)?;
    let cipher_text = envelope
        .cipher_text
        .as_deref()
        .ok_or_else(|| CipherError::Malformed("missing cipherText".into()))?;
    let shared = decapsulate(private, cipher_text)?;
    aead_open(shared.as_bytes(), &envelope.encrypted_data, &FIXED_IV)
}

fn symmetric_seal(kind: EnvelopeKind, key: &[u8], plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    let iv = generate_iv();
    let encrypted_data = aead_seal(key, plaintext, &iv)?;
    Ok(EncryptedEnvelope {
        kind,
        version: PROTOCOL_VERSION,
        encrypted_data,
        encrypted_key_hash_hex: hash_sha256_hex(key),
        cipher_text: None,
        iv: Some(iv.to_vec()),
    })
}

fn symmetric_open(kind: EnvelopeKind, key: &[u8], envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    envelope.check(kind)?;
    envelope.addressed_to(key)?;
    let iv: [u8; AEAD_IV_SIZE] = envelope
        .iv
        .as_deref()
        .and_then(|iv| iv.try_into().ok())
        .ok_or_else(|| CipherError::Malformed("missing iv".into()))?;
    aead_open(key, &envelope.encrypted_data, &iv)
}

macro_rules! kem_cipher {
    ($public:ty, $private:ty => $kind:expr) => {
        impl Recipient for $public {
            const ENVELOPE: EnvelopeKind = $kind;

            fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
                kem_seal(<Self as Recipient>::ENVELOPE, self, plaintext)
            }
        }

        impl Opener for $private {
            const ENVELOPE: EnvelopeKind = $kind;

            fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
                kem_open(<Self as Opener>::ENVELOPE, self, envelope)
            }
        }
    };
}

kem_cipher!(AccountKeyPublic, AccountKeyPrivate => EnvelopeKind::AccountKey);
kem_cipher!(KeyShareKeyPublic, KeyShareKeyPrivate => EnvelopeKind::KeyShareKey);
kem_cipher!(MigrateKeyPublic, MigrateKeyPrivate => EnvelopeKind::MigrateKey);

impl Recipient for RoomKey {
    const ENVELOPE: EnvelopeKind = EnvelopeKind::RoomKey;

    fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        symmetric_seal(<Self as Recipient>::ENVELOPE, self.key_bytes(), plaintext)
    }
}

impl Opener for RoomKey {
    const ENVELOPE: EnvelopeKind = EnvelopeKind::RoomKey;

    fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        symmetric_open(<Self as Opener>::ENVELOPE, self.key_bytes(), envelope)
    }
}

impl Recipient for DeviceKey {
    const ENVELOPE: EnvelopeKind = EnvelopeKind::DeviceKey;

    fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        symmetric_seal(<Self as Recipient>::ENVELOPE, self.key_bytes(), plaintext)
    }
}

impl Opener for DeviceKey {
    const ENVELOPE: EnvelopeKind = EnvelopeKind::DeviceKey;

    fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        symmetric_open(<Self as Opener>::ENVELOPE, self.key_bytes(), envelope)
    }
}
