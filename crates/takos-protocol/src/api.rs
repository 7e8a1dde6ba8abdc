//! String boundary for host applications
//!
//! Every function takes and returns JSON strings. Failures never cross the
//! boundary as errors: generators and decryptors answer `None`, checks answer
//! `false`, and the reason is logged at `debug`. Binary messages for signing
//! are passed as base64.

use serde::Serialize;
use takos_core::{decode_base64, Timestamp};
use takos_keys::{
    check_pair, generate, sign, verify, verify_delegation, AnyKey, KeyPair, KeyRequest, KeyType,
    RoomKey, SignatureObject, SigningKey, TypedKey, VerifyingKey,
};

use crate::cipher::{decrypt_with, encrypt_for, EncryptedEnvelope};
use crate::distribution::{create_room_key, open_room_key, ParticipantKeys};
use crate::error::ProtocolError;
use crate::message::{decrypt_message, encrypt_message, EncryptedMessage};
use crate::trust::TrustSnapshot;

type Result<T> = std::result::Result<T, ProtocolError>;

fn finish(op: &'static str, result: Result<String>) -> Option<String> {
    match result {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::debug!(op, error = %err, "api call rejected");
            None
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn wrong_kind(what: &str, key: &AnyKey) -> ProtocolError {
    ProtocolError::Input(format!("{} cannot be used as {what}", key.key_type()))
}

/// Decode a signing pair and confirm its halves match
fn load_signer<P: VerifyingKey, S: SigningKey>(
    public: &str,
    private: &str,
) -> Result<KeyPair<P, S>> {
    let pair = KeyPair::from_json(public, private)?;
    check_pair(&pair)?;
    Ok(pair)
}

fn sign_checked<P: VerifyingKey, S: SigningKey>(
    pair: KeyPair<P, S>,
    message: &[u8],
) -> Result<SignatureObject> {
    check_pair(&pair)?;
    Ok(sign(&pair, message)?)
}

pub fn generate_master_key_json() -> Option<String> {
    finish("generate_master_key", (|| to_json(&generate(KeyRequest::MasterKey)?))())
}

pub fn generate_identity_key_json(master_public: &str, master_private: &str) -> Option<String> {
    finish("generate_identity_key", (|| {
        let master = load_signer(master_public, master_private)?;
        to_json(&generate(KeyRequest::IdentityKey { master: &master })?)
    })())
}

pub fn generate_account_key_json(identity_public: &str, identity_private: &str) -> Option<String> {
    finish("generate_account_key", (|| {
        let identity = load_signer(identity_public, identity_private)?;
        to_json(&generate(KeyRequest::AccountKey { identity: &identity })?)
    })())
}

pub fn generate_key_share_key_json(master_public: &str, master_private: &str) -> Option<String> {
    finish("generate_key_share_key", (|| {
        let master = load_signer(master_public, master_private)?;
        to_json(&generate(KeyRequest::KeyShareKey { master: &master })?)
    })())
}

pub fn generate_key_share_sign_key_json(
    master_public: &str,
    master_private: &str,
) -> Option<String> {
    finish("generate_key_share_sign_key", (|| {
        let master = load_signer(master_public, master_private)?;
        to_json(&generate(KeyRequest::KeyShareSignKey { master: &master })?)
    })())
}

pub fn generate_migrate_key_json() -> Option<String> {
    finish("generate_migrate_key", (|| to_json(&generate(KeyRequest::MigrateKey)?))())
}

pub fn generate_migrate_sign_key_json() -> Option<String> {
    finish("generate_migrate_sign_key", (|| to_json(&generate(KeyRequest::MigrateSignKey)?))())
}

pub fn generate_device_key_json() -> Option<String> {
    finish("generate_device_key", (|| to_json(&generate(KeyRequest::DeviceKey)?))())
}

/// Structural validation of a key object against a wire discriminant
pub fn is_valid_key(kind: &str, json: &str) -> bool {
    match KeyType::parse(kind) {
        Some(kind) => takos_keys::validate(kind, json),
        None => {
            tracing::debug!(kind, "unknown key type");
            false
        }
    }
}

pub fn is_valid_signature(json: &str) -> bool {
    SignatureObject::is_valid_json(json)
}

/// Sign base64 `message` with a signing keypair of any signing kind
pub fn sign_json(public: &str, private: &str, message_b64: &str) -> Option<String> {
    finish("sign", (|| {
        let message = decode_base64(message_b64)?;
        let sig = match (AnyKey::from_json(public)?, AnyKey::from_json(private)?) {
            (AnyKey::MasterKeyPublic(p), AnyKey::MasterKeyPrivate(s)) => {
                sign_checked(KeyPair::new(p, s), &message)?
            }
            (AnyKey::IdentityKeyPublic(p), AnyKey::IdentityKeyPrivate(s)) => {
                sign_checked(KeyPair::new(p, s), &message)?
            }
            (AnyKey::KeyShareSignKeyPublic(p), AnyKey::KeyShareSignKeyPrivate(s)) => {
                sign_checked(KeyPair::new(p, s), &message)?
            }
            (AnyKey::MigrateSignKeyPublic(p), AnyKey::MigrateSignKeyPrivate(s)) => {
                sign_checked(KeyPair::new(p, s), &message)?
            }
            (p, _) => return Err(wrong_kind("a signing keypair", &p)),
        };
        Ok(sig.to_json()?)
    })())
}

/// Verify a signature over base64 `message`
pub fn verify_json(public: &str, message_b64: &str, signature: &str) -> bool {
    let checked = (|| -> Result<bool> {
        let message = decode_base64(message_b64)?;
        let sig = SignatureObject::from_json(signature)?;
        let valid = match AnyKey::from_json(public)? {
            AnyKey::MasterKeyPublic(k) => verify(&k, &message, &sig),
            AnyKey::IdentityKeyPublic(k) => verify(&k, &message, &sig),
            AnyKey::KeyShareSignKeyPublic(k) => verify(&k, &message, &sig),
            AnyKey::MigrateSignKeyPublic(k) => verify(&k, &message, &sig),
            other => return Err(wrong_kind("a verifying key", &other)),
        };
        Ok(valid)
    })();
    checked.unwrap_or_else(|err| {
        tracing::debug!(error = %err, "verify rejected");
        false
    })
}

/// Verify one delegation link, choosing the payload layout from the child kind
pub fn verify_delegation_json(parent: &str, child: &str, signature: &str) -> bool {
    let checked = (|| -> Result<bool> {
        let sig = SignatureObject::from_json(signature)?;
        let valid = match (AnyKey::from_json(parent)?, AnyKey::from_json(child)?) {
            (AnyKey::MasterKeyPublic(m), AnyKey::IdentityKeyPublic(c)) => {
                verify_delegation(&m, &c, &sig)
            }
            (AnyKey::IdentityKeyPublic(i), AnyKey::AccountKeyPublic(c)) => {
                verify_delegation(&i, &c, &sig)
            }
            (AnyKey::MasterKeyPublic(m), AnyKey::KeyShareKeyPublic(c)) => {
                verify_delegation(&m, &c, &sig)
            }
            (AnyKey::MasterKeyPublic(m), AnyKey::KeyShareSignKeyPublic(c)) => {
                verify_delegation(&m, &c, &sig)
            }
            (_, c) => return Err(wrong_kind("a delegated child of this parent", &c)),
        };
        Ok(valid)
    })();
    checked.unwrap_or_else(|err| {
        tracing::debug!(error = %err, "delegation check rejected");
        false
    })
}

/// Encrypt UTF-8 `plaintext` to any recipient key
pub fn encrypt_for_json(recipient: &str, plaintext: &str) -> Option<String> {
    finish("encrypt_for", (|| {
        let data = plaintext.as_bytes();
        let envelope = match AnyKey::from_json(recipient)? {
            AnyKey::AccountKeyPublic(k) => encrypt_for(&k, data)?,
            AnyKey::KeyShareKeyPublic(k) => encrypt_for(&k, data)?,
            AnyKey::MigrateKeyPublic(k) => encrypt_for(&k, data)?,
            AnyKey::RoomKey(k) => encrypt_for(&k, data)?,
            AnyKey::DeviceKey(k) => encrypt_for(&k, data)?,
            other => return Err(wrong_kind("an encryption recipient", &other)),
        };
        Ok(envelope.to_json()?)
    })())
}

/// Open an envelope with the caller's own key, returning UTF-8 plaintext
pub fn decrypt_with_json(key: &str, envelope: &str) -> Option<String> {
    finish("decrypt_with", (|| {
        let envelope = EncryptedEnvelope::from_json(envelope)?;
        let plaintext = match AnyKey::from_json(key)? {
            AnyKey::AccountKeyPrivate(k) => decrypt_with(&k, &envelope)?,
            AnyKey::KeyShareKeyPrivate(k) => decrypt_with(&k, &envelope)?,
            AnyKey::MigrateKeyPrivate(k) => decrypt_with(&k, &envelope)?,
            AnyKey::RoomKey(k) => decrypt_with(&k, &envelope)?,
            AnyKey::DeviceKey(k) => decrypt_with(&k, &envelope)?,
            other => return Err(wrong_kind("a decryption key", &other)),
        };
        Ok(takos_core::bytes_to_string(&plaintext)?)
    })())
}

/// Create a room key for a JSON array of participants against a JSON trust snapshot
pub fn create_room_key_json(
    creator_public: &str,
    creator_private: &str,
    participants: &str,
    trust: &str,
) -> Option<String> {
    finish("create_room_key", (|| {
        let creator = load_signer(creator_public, creator_private)?;
        let participants: Vec<ParticipantKeys> = serde_json::from_str(participants)?;
        let trust: TrustSnapshot = serde_json::from_str(trust)?;
        to_json(&create_room_key(&creator, &participants, &trust)?)
    })())
}

pub fn open_room_key_json(
    account_private: &str,
    envelope: &str,
    creator_identity_public: &str,
    signature: &str,
) -> Option<String> {
    finish("open_room_key", (|| {
        let account = TypedKey::from_json(account_private)?;
        let envelope = EncryptedEnvelope::from_json(envelope)?;
        let creator = TypedKey::from_json(creator_identity_public)?;
        let sig = SignatureObject::from_json(signature)?;
        Ok(open_room_key(&account, &envelope, &creator, &sig)?.to_json()?)
    })())
}

pub fn encrypt_message_json(
    payload: &str,
    channel: &str,
    room_key: &str,
    sender_public: &str,
    sender_private: &str,
    is_large: bool,
) -> Option<String> {
    finish("encrypt_message", (|| {
        let payload: serde_json::Value = serde_json::from_str(payload)?;
        let room_key = RoomKey::from_json(room_key)?;
        let sender = load_signer(sender_public, sender_private)?;
        to_json(&encrypt_message(&payload, channel, &room_key, &sender, is_large)?)
    })())
}

/// Verify and decrypt a message; `server_timestamp` is canonical RFC 3339
pub fn decrypt_message_json(
    message: &str,
    room_key: &str,
    sender_identity_public: &str,
    server_timestamp: &str,
) -> Option<String> {
    finish("decrypt_message", (|| {
        let message: EncryptedMessage = serde_json::from_str(message)?;
        let room_key = RoomKey::from_json(room_key)?;
        let sender = TypedKey::from_json(sender_identity_public)?;
        let server_timestamp = Timestamp::parse(server_timestamp)?;
        let decrypted =
            decrypt_message::<serde_json::Value>(&message, &room_key, &sender, server_timestamp)
                .ok_or_else(|| ProtocolError::Input("message rejected".to_string()))?;
        to_json(&decrypted)
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use takos_core::encode_base64;

    fn field(json: &str, name: &str) -> String {
        let value: Value = serde_json::from_str(json).unwrap();
        value[name].to_string()
    }

    #[test]
    fn test_generate_and_validate() {
        let master = generate_master_key_json().unwrap();
        let public = field(&master, "public");
        let private = field(&master, "private");
        assert!(is_valid_key("masterKeyPublic", &public));
        assert!(is_valid_key("masterKeyPrivate", &private));
        assert!(!is_valid_key("identityKeyPublic", &public));
        assert!(!is_valid_key("nonsense", &public));

        let identity = generate_identity_key_json(&public, &private).unwrap();
        assert!(verify_delegation_json(
            &public,
            &field(&identity, "public"),
            &field(&identity, "signature")
        ));
    }

    #[test]
    fn test_mismatched_master_pair_rejected() {
        let master = generate_master_key_json().unwrap();
        let other = generate_master_key_json().unwrap();
        let public = field(&master, "public");
        let private = field(&other, "private");
        assert!(generate_identity_key_json(&public, &private).is_none());
        assert!(generate_key_share_key_json(&public, &private).is_none());
    }

    #[test]
    fn test_sign_and_verify() {
        let master = generate_master_key_json().unwrap();
        let public = field(&master, "public");
        let private = field(&master, "private");
        let message = encode_base64(b"hello");

        let sig = sign_json(&public, &private, &message).unwrap();
        assert!(is_valid_signature(&sig));
        assert!(verify_json(&public, &message, &sig));
        assert!(!verify_json(&public, &encode_base64(b"hellp"), &sig));

        // Mismatched halves of different kinds
        let device = generate_device_key_json().unwrap();
        assert!(sign_json(&public, &field(&device, "private"), &message).is_none());

        // Same kind, different keys
        let other = generate_master_key_json().unwrap();
        assert!(sign_json(&public, &field(&other, "private"), &message).is_none());
    }

    #[test]
    fn test_seal_and_open() {
        let migrate = generate_migrate_key_json().unwrap();
        let envelope = encrypt_for_json(&field(&migrate, "public"), "payload").unwrap();
        assert_eq!(
            decrypt_with_json(&field(&migrate, "private"), &envelope).as_deref(),
            Some("payload")
        );

        let device = field(&generate_device_key_json().unwrap(), "private");
        let envelope = encrypt_for_json(&device, "local").unwrap();
        assert_eq!(decrypt_with_json(&device, &envelope).as_deref(), Some("local"));

        // Signing keys are not recipients
        let sign_key = generate_migrate_sign_key_json().unwrap();
        assert!(encrypt_for_json(&field(&sign_key, "public"), "x").is_none());
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = ["", "{", "null", "[]", r#"{"type":"roomKey"}"#, "\u{0}"];
        for input in inputs {
            assert!(!is_valid_key("roomKey", input));
            assert!(!is_valid_signature(input));
            assert!(!verify_json(input, input, input));
            assert!(!verify_delegation_json(input, input, input));
            assert!(sign_json(input, input, input).is_none());
            assert!(encrypt_for_json(input, input).is_none());
            assert!(decrypt_with_json(input, input).is_none());
            assert!(create_room_key_json(input, input, input, input).is_none());
            assert!(open_room_key_json(input, input, input, input).is_none());
            assert!(encrypt_message_json(input, input, input, input, input, false).is_none());
            assert!(decrypt_message_json(input, input, input, input).is_none());
            assert!(generate_identity_key_json(input, input).is_none());
        }
    }
}
