//! # Takos Protocol
//!
//! Hybrid encryption and the protocols built on it:
//!
//! - **Hybrid cipher**: ML-KEM-768 + AES-256-GCM envelopes to account,
//!   key-share and migrate keys; AES-256-GCM envelopes under room and device keys
//! - **Room key distribution**: chain verification, identity rollback and
//!   master key downgrade checks, one wrapped room key per participant
//! - **Message envelope**: encrypted, signed channel messages with a 10 second
//!   freshness window
//!
//! Opened room keys can be kept in a [`RoomKeyCache`] for their epoch.
//!
//! All operations are synchronous. [`runtime`] wraps them for tokio hosts and
//! [`api`] exposes them as JSON-string functions.

pub mod api;
pub mod cache;
pub mod cipher;
pub mod config;
pub mod distribution;
pub mod error;
pub mod message;
pub mod runtime;
pub mod trust;

pub use cache::*;
pub use cipher::*;
pub use crate::config::ProtocolConfig;
pub use distribution::*;
pub use error::*;
pub use message::*;
pub use trust::*;

/// Protocol prelude
pub mod prelude {
    pub use crate::cache::{MemoryRoomKeyCache, RoomKeyCache};
    pub use crate::cipher::{decrypt_with, encrypt_for, EncryptedEnvelope, EnvelopeKind};
    pub use crate::distribution::{create_room_key, open_room_key, ParticipantKeys};
    pub use crate::error::{CipherError, DistributionError, ProtocolError};
    pub use crate::message::{decrypt_message, encrypt_message, EncryptedMessage};
    pub use crate::trust::{MemoryTrustStore, TrustSnapshot, TrustStore};
}
