//! Decrypted room key cache
//!
//! Opening a room key costs a decapsulation and a signature check, so hosts
//! keep opened keys for the room epoch they belong to. Entries are keyed by
//! the room key's session uuid and stop being served once older than the
//! configured TTL.

use dashmap::DashMap;
use std::time::Duration;
use takos_core::Timestamp;
use takos_keys::{AccountKeyPrivate, IdentityKeyPublic, RoomKey, SignatureObject};
use uuid::Uuid;

use crate::cipher::EncryptedEnvelope;
use crate::config::RoomKeyConfig;
use crate::distribution::open_room_key;
use crate::error::DistributionError;

/// Caller-held store of opened room keys
pub trait RoomKeyCache: Send + Sync {
    /// Unexpired room key for `session` at `now`
    fn get(&self, session: &Uuid, now: Timestamp) -> Option<RoomKey>;

    /// Store an opened room key under its session uuid
    fn insert(&self, room_key: RoomKey);

    /// Drop the key for `session`, returning it if present
    fn evict(&self, session: &Uuid) -> Option<RoomKey>;

    /// Drop every key expired at `now`; returns how many went
    fn purge_expired(&self, now: Timestamp) -> usize;
}

/// In-memory room key cache
pub struct MemoryRoomKeyCache {
    entries: DashMap<Uuid, RoomKey>,
    ttl: Duration,
}

impl MemoryRoomKeyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn from_config(config: &RoomKeyConfig) -> Self {
        Self::new(config.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryRoomKeyCache {
    fn default() -> Self {
        Self::from_config(&RoomKeyConfig::default())
    }
}

impl RoomKeyCache for MemoryRoomKeyCache {
    fn get(&self, session: &Uuid, now: Timestamp) -> Option<RoomKey> {
        let room_key = self.entries.get(session)?.value().clone();
        if room_key.is_expired(now, self.ttl) {
            self.entries
                .remove_if(session, |_, cached| cached.is_expired(now, self.ttl));
            tracing::debug!(%session, "room key expired");
            return None;
        }
        Some(room_key)
    }

    fn insert(&self, room_key: RoomKey) {
        self.entries.insert(room_key.session_uuid(), room_key);
    }

    fn evict(&self, session: &Uuid) -> Option<RoomKey> {
        self.entries.remove(session).map(|(_, room_key)| room_key)
    }

    fn purge_expired(&self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, room_key| !room_key.is_expired(now, self.ttl));
        before.saturating_sub(self.entries.len())
    }
}

/// Open a wrapped room key and remember it for its session
pub fn open_room_key_cached<C: RoomKeyCache + ?Sized>(
    cache: &C,
    account: &AccountKeyPrivate,
    envelope: &EncryptedEnvelope,
    creator: &IdentityKeyPublic,
    signature: &SignatureObject,
) -> Result<RoomKey, DistributionError> {
    let room_key = open_room_key(account, envelope, creator, signature)?;
    cache.insert(room_key.clone());
    Ok(room_key)
}
