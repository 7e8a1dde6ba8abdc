//! Message envelope
//!
//! A message is a JSON payload sealed under the room key, with the sender's
//! identity signature over `value ‖ timestamp ‖ channel`. `value` is the
//! serialized room-key envelope, signed exactly as carried.
//!
//! Receivers reject, in order: unencrypted messages, bad signatures, messages
//! more than [`FRESHNESS_WINDOW_MS`] away from the server clock, envelopes
//! that fail to open and payloads that fail to parse. Every rejection is the
//! same `None` to the caller; the reason is only logged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use takos_core::{concat_bytes, Timestamp};
use takos_keys::{sign, verify, IdentityKeyPair, IdentityKeyPublic, RoomKey, SignatureObject};
use thiserror::Error;

use crate::cipher::{decrypt_with, encrypt_for, EncryptedEnvelope};
use crate::error::{CipherError, Result};

/// Maximum accepted skew between message and server timestamps
pub const FRESHNESS_WINDOW_MS: u64 = 10_000;

/// Signed, encrypted message as sent to the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessage {
    pub encrypted: bool,

    /// Serialized [`EncryptedEnvelope`] under the room key
    pub value: String,

    pub signature: SignatureObject,

    pub channel: String,

    pub timestamp: Timestamp,

    #[serde(default)]
    pub is_large: bool,
}

/// Verified, decrypted message
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedMessage<T> {
    pub payload: T,
    pub channel: String,
    /// Sender's timestamp, covered by the signature
    pub timestamp: Timestamp,
    pub server_timestamp: Timestamp,
    pub room_key_hash_hex: String,
    pub is_large: bool,
}

fn signed_bytes(value: &str, timestamp: &Timestamp, channel: &str) -> Vec<u8> {
    concat_bytes(&[value.as_bytes(), &timestamp.to_bytes(), channel.as_bytes()])
}

/// Seal and sign `payload` for `channel`
pub fn encrypt_message<T: Serialize + ?Sized>(
    payload: &T,
    channel: &str,
    room_key: &RoomKey,
    sender: &IdentityKeyPair,
    is_large: bool,
) -> Result<EncryptedMessage> {
    let plaintext =
        serde_json::to_vec(payload).map_err(|e| CipherError::Malformed(e.to_string()))?;
    let value = encrypt_for(room_key, &plaintext)?.to_json()?;
    let timestamp = Timestamp::now();
    let signature = sign(sender, &signed_bytes(&value, &timestamp, channel))?;

    Ok(EncryptedMessage {
        encrypted: true,
        value,
        signature,
        channel: channel.to_string(),
        timestamp,
        is_large,
    })
}

#[derive(Error, Debug)]
enum Rejection {
    #[error("message is not encrypted")]
    NotEncrypted,

    #[error("signature does not verify")]
    BadSignature,

    #[error("timestamp {skew_ms} ms from server clock")]
    Stale { skew_ms: u64 },

    #[error("envelope: {0}")]
    Envelope(#[from] CipherError),

    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn open_message<T: DeserializeOwned>(
    msg: &EncryptedMessage,
    room_key: &RoomKey,
    sender: &IdentityKeyPublic,
    server_timestamp: Timestamp,
) -> std::result::Result<DecryptedMessage<T>, Rejection> {
    if !msg.encrypted {
        return Err(Rejection::NotEncrypted);
    }
    if !verify(sender, &signed_bytes(&msg.value, &msg.timestamp, &msg.channel), &msg.signature) {
        return Err(Rejection::BadSignature);
    }
    let skew_ms = server_timestamp.abs_diff_millis(&msg.timestamp);
    if skew_ms > FRESHNESS_WINDOW_MS {
        return Err(Rejection::Stale { skew_ms });
    }

    let envelope = EncryptedEnvelope::from_json(&msg.value)?;
    let plaintext = decrypt_with(room_key, &envelope)?;
    let payload = serde_json::from_slice(&plaintext)?;

    Ok(DecryptedMessage {
        payload,
        channel: msg.channel.clone(),
        timestamp: msg.timestamp,
        server_timestamp,
        room_key_hash_hex: room_key.key_hash_hex(),
        is_large: msg.is_large,
    })
}

/// Verify, check freshness and decrypt. `None` on any failure.
pub fn decrypt_message<T: DeserializeOwned>(
    msg: &EncryptedMessage,
    room_key: &RoomKey,
    sender: &IdentityKeyPublic,
    server_timestamp: Timestamp,
) -> Option<DecryptedMessage<T>> {
    match open_message(msg, room_key, sender, server_timestamp) {
        Ok(message) => Some(message),
        Err(reason) => {
            tracing::debug!(channel = %msg.channel, %reason, "message rejected");
            None
        }
    }
}
