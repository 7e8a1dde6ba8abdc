//! Async wrappers
//!
//! Key generation and ML-KEM/ML-DSA operations are CPU-bound. These wrappers
//! move them onto tokio's blocking pool so async hosts keep their reactor free.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use takos_core::Timestamp;
use takos_keys::{IdentityKeyPair, IdentityKeyPublic, MasterKeyPair, RoomKey};

use crate::cipher::{decrypt_with, encrypt_for, EncryptedEnvelope, Opener, Recipient};
use crate::distribution::{
    create_room_key, distribute_with_store, ParticipantKeys, RoomKeyDistribution,
};
use crate::error::ProtocolError;
use crate::message::{decrypt_message, encrypt_message, DecryptedMessage, EncryptedMessage};
use crate::trust::{TrustSnapshot, TrustStore};

type Result<T> = std::result::Result<T, ProtocolError>;

pub async fn generate_master_key_async() -> Result<MasterKeyPair> {
    Ok(tokio::task::spawn_blocking(takos_keys::generate_master_key).await??)
}

pub async fn encrypt_for_async<R>(recipient: R, plaintext: Vec<u8>) -> Result<EncryptedEnvelope>
where
    R: Recipient + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || encrypt_for(&recipient, &plaintext)).await??)
}

pub async fn decrypt_with_async<O>(key: O, envelope: EncryptedEnvelope) -> Result<Vec<u8>>
where
    O: Opener + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || decrypt_with(&key, &envelope)).await??)
}

pub async fn create_room_key_async(
    creator: IdentityKeyPair,
    participants: Vec<ParticipantKeys>,
    trust: TrustSnapshot,
) -> Result<RoomKeyDistribution> {
    Ok(tokio::task::spawn_blocking(move || create_room_key(&creator, &participants, &trust))
        .await??)
}

/// Distribution against a shared store. Per-principal locks are taken on the
/// blocking thread, never across an await point.
pub async fn distribute_with_store_async<S>(
    store: Arc<S>,
    creator: IdentityKeyPair,
    participants: Vec<ParticipantKeys>,
) -> Result<RoomKeyDistribution>
where
    S: TrustStore + 'static,
{
    Ok(tokio::task::spawn_blocking(move || {
        distribute_with_store(store.as_ref(), &creator, &participants)
    })
    .await??)
}

pub async fn encrypt_message_async<T>(
    payload: T,
    channel: String,
    room_key: RoomKey,
    sender: IdentityKeyPair,
    is_large: bool,
) -> Result<EncryptedMessage>
where
    T: Serialize + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || {
        encrypt_message(&payload, &channel, &room_key, &sender, is_large)
    })
    .await??)
}

/// `None` on any rejection, like [`decrypt_message`]; `Err` only if the task fails
pub async fn decrypt_message_async<T>(
    msg: EncryptedMessage,
    room_key: RoomKey,
    sender: IdentityKeyPublic,
    server_timestamp: Timestamp,
) -> Result<Option<DecryptedMessage<T>>>
where
    T: DeserializeOwned + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || {
        decrypt_message(&msg, &room_key, &sender, server_timestamp)
    })
    .await?)
}
