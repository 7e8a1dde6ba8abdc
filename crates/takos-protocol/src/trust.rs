//! Trust tables
//!
//! Two per-principal facts gate room key distribution: the credited master
//! key (hash and timestamp) and the latest identity key timestamp seen. The
//! pure distribution functions read a [`TrustSnapshot`]; stateful hosts keep
//! the tables behind a [`TrustStore`].

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use takos_core::Timestamp;

/// Master key currently trusted for a principal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditedMasterKey {
    /// SHA-256 of the master public key, lowercase hex
    pub hash_hex: String,
    pub timestamp: Timestamp,
}

/// Everything known about one principal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalTrust {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credited_master_key: Option<CreditedMasterKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_timestamp: Option<Timestamp>,
}

/// Read-only view of the trust tables for one distribution
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSnapshot {
    #[serde(default)]
    pub credited_master_keys: BTreeMap<String, CreditedMasterKey>,

    #[serde(default)]
    pub identity_timestamps: BTreeMap<String, Timestamp>,
}

impl TrustSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credited_master_key(&self, principal: &str) -> Option<&CreditedMasterKey> {
        self.credited_master_keys.get(principal)
    }

    pub fn identity_timestamp(&self, principal: &str) -> Option<Timestamp> {
        self.identity_timestamps.get(principal).copied()
    }

    /// Record one principal's state
    pub fn insert(&mut self, principal: &str, trust: PrincipalTrust) {
        if let Some(credited) = trust.credited_master_key {
            self.credited_master_keys.insert(principal.to_string(), credited);
        }
        if let Some(ts) = trust.identity_timestamp {
            self.identity_timestamps.insert(principal.to_string(), ts);
        }
    }
}

/// Persistent trust tables.
///
/// Writers for one principal are serialized through [`TrustStore::lock`].
/// `get`/`set` do not lock; callers mutating state hold the principal's lock.
pub trait TrustStore: Send + Sync {
    /// Current state of `principal`, default when unknown
    fn get(&self, principal: &str) -> PrincipalTrust;

    /// Replace the state of `principal`
    fn set(&self, principal: &str, trust: PrincipalTrust);

    /// Writer lock for `principal`
    fn lock(&self, principal: &str) -> Arc<Mutex<()>>;

    /// Replace the state only if it still equals `expected`.
    ///
    /// Takes the principal lock; must not be called while holding it.
    fn compare_and_update(&self, principal: &str, expected: &PrincipalTrust, new: PrincipalTrust) -> bool {
        let lock = self.lock(principal);
        let _guard = lock.lock();
        if &self.get(principal) != expected {
            return false;
        }
        self.set(principal, new);
        true
    }

    /// Snapshot of the given principals
    fn snapshot(&self, principals: &[&str]) -> TrustSnapshot {
        let mut snapshot = TrustSnapshot::new();
        for principal in principals {
            snapshot.insert(principal, self.get(principal));
        }
        snapshot
    }
}

/// In-memory trust store.
///
/// The lock table holds one entry per principal ever locked until
/// [`MemoryTrustStore::prune_locks`] drops the idle ones.
#[derive(Default)]
pub struct MemoryTrustStore {
    entries: DashMap<String, PrincipalTrust>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of principals with recorded state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop writer locks nobody holds; returns how many went
    pub fn prune_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }
}

impl TrustStore for MemoryTrustStore {
    fn get(&self, principal: &str) -> PrincipalTrust {
        self.entries
            .get(principal)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn set(&self, principal: &str, trust: PrincipalTrust) {
        self.entries.insert(principal.to_string(), trust);
    }

    fn lock(&self, principal: &str) -> Arc<Mutex<()>> {
        let entry = self
            .locks
            .entry(principal.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credited(hash: &str, millis: i64) -> CreditedMasterKey {
        CreditedMasterKey {
            hash_hex: hash.repeat(64 / hash.len()),
            timestamp: Timestamp::from_millis(millis).unwrap(),
        }
    }

    #[test]
    fn test_unknown_principal_is_default() {
        let store = MemoryTrustStore::new();
        assert_eq!(store.get("nobody"), PrincipalTrust::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_compare_and_update() {
        let store = MemoryTrustStore::new();
        let first = PrincipalTrust {
            credited_master_key: Some(credited("a", 1_000)),
            identity_timestamp: None,
        };
        assert!(store.compare_and_update("alice", &PrincipalTrust::default(), first.clone()));

        // Stale expectation loses
        let stale = PrincipalTrust {
            credited_master_key: Some(credited("b", 2_000)),
            identity_timestamp: None,
        };
        assert!(!store.compare_and_update("alice", &PrincipalTrust::default(), stale));
        assert_eq!(store.get("alice"), first);
    }

    #[test]
    fn test_snapshot() {
        let store = MemoryTrustStore::new();
        store.set(
            "alice",
            PrincipalTrust {
                credited_master_key: Some(credited("a", 1_000)),
                identity_timestamp: Timestamp::from_millis(5_000),
            },
        );
        let snapshot = store.snapshot(&["alice", "bob"]);
        assert_eq!(snapshot.credited_master_key("alice"), Some(&credited("a", 1_000)));
        assert_eq!(snapshot.identity_timestamp("alice"), Timestamp::from_millis(5_000));
        assert!(snapshot.credited_master_key("bob").is_none());
    }

    #[test]
    fn test_same_lock_per_principal() {
        let store = MemoryTrustStore::new();
        assert!(Arc::ptr_eq(&store.lock("alice"), &store.lock("alice")));
        assert!(!Arc::ptr_eq(&store.lock("alice"), &store.lock("bob")));
    }

    #[test]
    fn test_prune_keeps_held_locks() {
        let store = MemoryTrustStore::new();
        let held = store.lock("alice");
        drop(store.lock("bob"));
        drop(store.lock("carol"));

        assert_eq!(store.prune_locks(), 2);
        assert!(Arc::ptr_eq(&held, &store.lock("alice")));
        assert_eq!(store.prune_locks(), 0);

        drop(held);
        assert_eq!(store.prune_locks(), 1);
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        let store = Arc::new(MemoryTrustStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        loop {
                            let current = store.get("alice");
                            let mut next = current.clone();
                            let millis = next.identity_timestamp.map_or(0, |t| t.as_millis());
                            next.identity_timestamp = Timestamp::from_millis(millis + 1);
                            if store.compare_and_update("alice", &current, next) {
                                break;
                            }
                        }
                    }
                    i
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("alice").identity_timestamp, Timestamp::from_millis(800));
    }
}
