//! Room key distribution
//!
//! The creator validates every participant's delegation chain against the
//! trust tables, then issues one fresh room key wrapped to each participant's
//! account key. The batch is fail-closed: any structural, cryptographic or
//! trust-state problem with any participant yields an error and no output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use takos_core::{decode_hash_hex, Timestamp};
use takos_crypto::digest_eq;
use takos_keys::{
    sign, verify, verify_delegation, AccountKeyPrivate, AccountKeyPublic, IdentityKeyPair,
    IdentityKeyPublic, MasterKeyPublic, RoomKey, SignatureObject, TypedKey,
};

use crate::cipher::{decrypt_with, encrypt_for, EncryptedEnvelope};
use crate::error::DistributionError;
use crate::trust::{CreditedMasterKey, TrustSnapshot, TrustStore};

type Result<T> = std::result::Result<T, DistributionError>;

/// One participant's published keys, as received from the directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantKeys {
    pub principal_id: String,
    pub master_key_public: String,
    pub identity_key_public: String,
    pub identity_key_signature: String,
    pub account_key_public: String,
    pub account_key_signature: String,
}

/// Participant whose chain verified
#[derive(Clone, Debug)]
pub struct VerifiedParticipant {
    pub principal_id: String,
    pub master_key: MasterKeyPublic,
    pub identity_key: IdentityKeyPublic,
    pub account_key: AccountKeyPublic,
}

impl VerifiedParticipant {
    pub fn master_key_hash_hex(&self) -> String {
        self.master_key.key_hash_hex()
    }
}

/// Room key wrapped for one participant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedRoomKey {
    pub principal_id: String,
    pub envelope: EncryptedEnvelope,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTimestampUpdate {
    pub principal_id: String,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditedMasterKeyUpdate {
    pub principal_id: String,
    pub credited: CreditedMasterKey,
}

/// Output of a successful distribution
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomKeyDistribution {
    pub room_key: RoomKey,
    /// Creator identity signature over `key ‖ timestamp`
    pub signature: SignatureObject,
    pub wrapped: Vec<WrappedRoomKey>,
    pub identity_timestamp_updates: Vec<IdentityTimestampUpdate>,
    pub credited_master_key_updates: Vec<CreditedMasterKeyUpdate>,
}

impl RoomKeyDistribution {
    /// Envelope addressed to `principal`
    pub fn wrapped_for(&self, principal: &str) -> Option<&EncryptedEnvelope> {
        self.wrapped
            .iter()
            .find(|w| w.principal_id == principal)
            .map(|w| &w.envelope)
    }
}

fn structural(principal: &str, reason: impl ToString) -> DistributionError {
    DistributionError::Structural {
        principal: principal.to_string(),
        reason: reason.to_string(),
    }
}

/// Decode one participant and verify Master→Identity→Account
pub fn verify_participant(participant: &ParticipantKeys) -> Result<VerifiedParticipant> {
    let principal = participant.principal_id.as_str();
    let master_key = MasterKeyPublic::from_json(&participant.master_key_public)
        .map_err(|e| structural(principal, e))?;
    let identity_key = IdentityKeyPublic::from_json(&participant.identity_key_public)
        .map_err(|e| structural(principal, e))?;
    let account_key = AccountKeyPublic::from_json(&participant.account_key_public)
        .map_err(|e| structural(principal, e))?;
    let identity_sig = SignatureObject::from_json(&participant.identity_key_signature)
        .map_err(|e| structural(principal, e))?;
    let account_sig = SignatureObject::from_json(&participant.account_key_signature)
        .map_err(|e| structural(principal, e))?;

    if !verify_delegation(&master_key, &identity_key, &identity_sig) {
        return Err(DistributionError::Cryptographic {
            principal: principal.to_string(),
            link: "master->identity",
        });
    }
    if !verify_delegation(&identity_key, &account_key, &account_sig) {
        return Err(DistributionError::Cryptographic {
            principal: principal.to_string(),
            link: "identity->account",
        });
    }

    Ok(VerifiedParticipant {
        principal_id: participant.principal_id.clone(),
        master_key,
        identity_key,
        account_key,
    })
}

/// Identity ratchet: older than cached aborts, newer or uncached updates
fn check_identity_timestamp(
    participant: &VerifiedParticipant,
    trust: &TrustSnapshot,
) -> Result<Option<IdentityTimestampUpdate>> {
    let principal = participant.principal_id.as_str();
    let presented = participant
        .identity_key
        .timestamp()
        .ok_or_else(|| structural(principal, "identity key without timestamp"))?;

    match trust.identity_timestamp(principal) {
        Some(cached) if presented < cached => Err(DistributionError::IdentityRollback {
            principal: principal.to_string(),
            cached,
            presented,
        }),
        Some(cached) if presented == cached => Ok(None),
        _ => Ok(Some(IdentityTimestampUpdate {
            principal_id: principal.to_string(),
            timestamp: presented,
        })),
    }
}

/// Master key crediting: a different key must be strictly newer
fn check_master_key(
    participant: &VerifiedParticipant,
    trust: &TrustSnapshot,
) -> Result<Option<CreditedMasterKeyUpdate>> {
    let principal = participant.principal_id.as_str();
    let presented = participant
        .master_key
        .timestamp()
        .ok_or_else(|| structural(principal, "master key without timestamp"))?;

    if let Some(credited) = trust.credited_master_key(principal) {
        let credited_hash = decode_hash_hex(&credited.hash_hex)
            .map_err(|e| structural(principal, format!("credited master key hash: {e}")))?;
        if digest_eq(&credited_hash, &participant.master_key.key_hash()) {
            return Ok(None);
        }
        if presented <= credited.timestamp {
            return Err(DistributionError::MasterKeyDowngrade {
                principal: principal.to_string(),
                credited: credited.timestamp,
                presented,
            });
        }
    }
    Ok(Some(CreditedMasterKeyUpdate {
        principal_id: principal.to_string(),
        credited: CreditedMasterKey {
            hash_hex: participant.master_key_hash_hex(),
            timestamp: presented,
        },
    }))
}

fn reject_duplicates(participants: &[ParticipantKeys]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for participant in participants {
        if !seen.insert(participant.principal_id.as_str()) {
            return Err(DistributionError::DuplicatePrincipal(
                participant.principal_id.clone(),
            ));
        }
    }
    Ok(())
}

/// Create and wrap a fresh room key for `participants`.
///
/// Pure over its inputs; the returned updates are for the caller to apply.
pub fn create_room_key(
    creator: &IdentityKeyPair,
    participants: &[ParticipantKeys],
    trust: &TrustSnapshot,
) -> Result<RoomKeyDistribution> {
    let result = build_distribution(creator, participants, trust);
    match &result {
        Ok(dist) => tracing::info!(
            participants = dist.wrapped.len(),
            session = %dist.room_key.session_uuid(),
            identity_updates = dist.identity_timestamp_updates.len(),
            master_key_updates = dist.credited_master_key_updates.len(),
            "room key created"
        ),
        Err(err) => tracing::warn!(error = %err, "room key distribution aborted"),
    }
    result
}

fn build_distribution(
    creator: &IdentityKeyPair,
    participants: &[ParticipantKeys],
    trust: &TrustSnapshot,
) -> Result<RoomKeyDistribution> {
    reject_duplicates(participants)?;

    let mut verified = Vec::with_capacity(participants.len());
    let mut identity_timestamp_updates = Vec::new();
    let mut credited_master_key_updates = Vec::new();
    let mut master_keys_hash_hex = BTreeMap::new();

    for participant in participants {
        let participant = verify_participant(participant)?;
        if let Some(update) = check_identity_timestamp(&participant, trust)? {
            identity_timestamp_updates.push(update);
        }
        if let Some(update) = check_master_key(&participant, trust)? {
            credited_master_key_updates.push(update);
        }
        master_keys_hash_hex.insert(
            participant.principal_id.clone(),
            participant.master_key_hash_hex(),
        );
        verified.push(participant);
    }

    let room_key = RoomKey::generate(master_keys_hash_hex)?;
    let signature = sign(creator, &room_key.signed_payload())?;
    let room_key_json = room_key.to_json()?;

    let mut wrapped = Vec::with_capacity(verified.len());
    for participant in &verified {
        wrapped.push(WrappedRoomKey {
            principal_id: participant.principal_id.clone(),
            envelope: encrypt_for(&participant.account_key, room_key_json.as_bytes())?,
        });
    }

    Ok(RoomKeyDistribution {
        room_key,
        signature,
        wrapped,
        identity_timestamp_updates,
        credited_master_key_updates,
    })
}

/// Whether `signature` is the creator's signature over `room_key`
pub fn verify_room_key(
    room_key: &RoomKey,
    creator: &IdentityKeyPublic,
    signature: &SignatureObject,
) -> bool {
    verify(creator, &room_key.signed_payload(), signature)
}

/// Unwrap a room key addressed to our account key and check the creator signature
pub fn open_room_key(
    account: &AccountKeyPrivate,
    envelope: &EncryptedEnvelope,
    creator: &IdentityKeyPublic,
    signature: &SignatureObject,
) -> Result<RoomKey> {
    let plaintext = decrypt_with(account, envelope)?;
    let json = takos_core::bytes_to_string(&plaintext).map_err(crate::error::CipherError::from)?;
    let room_key = RoomKey::from_json(&json)?;
    if !verify_room_key(&room_key, creator, signature) {
        return Err(DistributionError::Cryptographic {
            principal: "creator".to_string(),
            link: "identity->roomKey",
        });
    }
    Ok(room_key)
}

/// Apply a distribution's updates to a store.
///
/// Callers hold the writer locks of every affected principal.
fn apply_updates<S: TrustStore + ?Sized>(store: &S, dist: &RoomKeyDistribution) {
    for update in &dist.identity_timestamp_updates {
        let mut trust = store.get(&update.principal_id);
        trust.identity_timestamp = Some(update.timestamp);
        store.set(&update.principal_id, trust);
    }
    for update in &dist.credited_master_key_updates {
        let mut trust = store.get(&update.principal_id);
        trust.credited_master_key = Some(update.credited.clone());
        store.set(&update.principal_id, trust);
    }
}

/// Distribute against a store: lock participants in sorted order, snapshot,
/// run [`create_room_key`] and apply its updates before releasing the locks.
pub fn distribute_with_store<S: TrustStore + ?Sized>(
    store: &S,
    creator: &IdentityKeyPair,
    participants: &[ParticipantKeys],
) -> Result<RoomKeyDistribution> {
    reject_duplicates(participants)?;

    let mut principals: Vec<&str> = participants.iter().map(|p| p.principal_id.as_str()).collect();
    principals.sort_unstable();

    let locks: Vec<_> = principals.iter().map(|p| store.lock(p)).collect();
    let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();

    let snapshot = store.snapshot(&principals);
    let dist = create_room_key(creator, participants, &snapshot)?;
    apply_updates(store, &dist);
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use takos_keys::{generate_account_key, generate_identity_key, generate_master_key};

    struct Principal {
        identity: IdentityKeyPair,
        account: takos_keys::AccountKeyPair,
        keys: ParticipantKeys,
    }

    fn principal(id: &str) -> Principal {
        let master = generate_master_key().unwrap();
        let (identity, identity_sig) = generate_identity_key(&master).unwrap();
        let (account, account_sig) = generate_account_key(&identity).unwrap();
        let keys = ParticipantKeys {
            principal_id: id.to_string(),
            master_key_public: master.public.to_json().unwrap(),
            identity_key_public: identity.public.to_json().unwrap(),
            identity_key_signature: identity_sig.to_json().unwrap(),
            account_key_public: account.public.to_json().unwrap(),
            account_key_signature: account_sig.to_json().unwrap(),
        };
        Principal {
            identity,
            account,
            keys,
        }
    }

    #[test]
    fn test_fresh_distribution() {
        let alice = principal("alice");
        let bob = principal("bob");
        let dist = create_room_key(
            &alice.identity,
            &[alice.keys.clone(), bob.keys.clone()],
            &TrustSnapshot::new(),
        )
        .unwrap();

        assert_eq!(dist.wrapped.len(), 2);
        assert_eq!(dist.identity_timestamp_updates.len(), 2);
        assert_eq!(dist.credited_master_key_updates.len(), 2);
        assert_eq!(dist.room_key.master_keys_hash_hex().len(), 2);
        assert!(verify_room_key(&dist.room_key, &alice.identity.public, &dist.signature));

        let envelope = dist.wrapped_for("bob").unwrap();
        let opened =
            open_room_key(&bob.account.private, envelope, &alice.identity.public, &dist.signature)
                .unwrap();
        assert_eq!(opened, dist.room_key);
    }

    #[test]
    fn test_wrapped_key_is_not_for_others() {
        let alice = principal("alice");
        let bob = principal("bob");
        let dist =
            create_room_key(&alice.identity, &[bob.keys.clone()], &TrustSnapshot::new()).unwrap();
        let envelope = dist.wrapped_for("bob").unwrap();
        assert!(
            open_room_key(&alice.account.private, envelope, &alice.identity.public, &dist.signature)
                .is_err()
        );
        assert!(dist.wrapped_for("alice").is_none());
    }

    #[test]
    fn test_wrong_creator_signature() {
        let alice = principal("alice");
        let bob = principal("bob");
        let dist =
            create_room_key(&alice.identity, &[bob.keys.clone()], &TrustSnapshot::new()).unwrap();
        let envelope = dist.wrapped_for("bob").unwrap();
        assert!(matches!(
            open_room_key(&bob.account.private, envelope, &bob.identity.public, &dist.signature),
            Err(DistributionError::Cryptographic { .. })
        ));
    }

    #[test]
    fn test_duplicate_principal() {
        let alice = principal("alice");
        let result = create_room_key(
            &alice.identity,
            &[alice.keys.clone(), alice.keys.clone()],
            &TrustSnapshot::new(),
        );
        assert_eq!(
            result.unwrap_err(),
            DistributionError::DuplicatePrincipal("alice".to_string())
        );
    }

    #[test]
    fn test_malformed_participant_is_structural() {
        let alice = principal("alice");
        let mut keys = alice.keys.clone();
        keys.account_key_public = "{}".to_string();
        assert!(matches!(
            create_room_key(&alice.identity, &[keys], &TrustSnapshot::new()),
            Err(DistributionError::Structural { .. })
        ));
    }

    #[test]
    fn test_identity_ratchet() {
        let alice = principal("alice");
        let presented = alice.identity.public.timestamp().unwrap();

        let mut trust = TrustSnapshot::new();
        trust
            .identity_timestamps
            .insert("alice".into(), presented.offset_millis(1).unwrap());
        assert!(matches!(
            create_room_key(&alice.identity, &[alice.keys.clone()], &trust),
            Err(DistributionError::IdentityRollback { .. })
        ));

        trust.identity_timestamps.insert("alice".into(), presented);
        let dist = create_room_key(&alice.identity, &[alice.keys.clone()], &trust).unwrap();
        assert!(dist.identity_timestamp_updates.is_empty());

        trust
            .identity_timestamps
            .insert("alice".into(), presented.offset_millis(-1).unwrap());
        let dist = create_room_key(&alice.identity, &[alice.keys.clone()], &trust).unwrap();
        assert_eq!(dist.identity_timestamp_updates[0].timestamp, presented);
    }

    #[test]
    fn test_master_key_downgrade() {
        let alice = principal("alice");
        let master = MasterKeyPublic::from_json(&alice.keys.master_key_public).unwrap();
        let presented = master.timestamp().unwrap();

        let mut trust = TrustSnapshot::new();
        trust.credited_master_keys.insert(
            "alice".into(),
            CreditedMasterKey {
                hash_hex: "00".repeat(32),
                timestamp: presented,
            },
        );
        assert!(matches!(
            create_room_key(&alice.identity, &[alice.keys.clone()], &trust),
            Err(DistributionError::MasterKeyDowngrade { .. })
        ));

        // Same key already credited: no update
        trust.credited_master_keys.insert(
            "alice".into(),
            CreditedMasterKey {
                hash_hex: master.key_hash_hex(),
                timestamp: presented,
            },
        );
        let dist = create_room_key(&alice.identity, &[alice.keys.clone()], &trust).unwrap();
        assert!(dist.credited_master_key_updates.is_empty());

        // Newer replacement is credited
        trust.credited_master_keys.insert(
            "alice".into(),
            CreditedMasterKey {
                hash_hex: "00".repeat(32),
                timestamp: presented.offset_millis(-1).unwrap(),
            },
        );
        let dist = create_room_key(&alice.identity, &[alice.keys.clone()], &trust).unwrap();
        assert_eq!(dist.credited_master_key_updates[0].credited.hash_hex, master.key_hash_hex());
    }

    #[test]
    fn test_credited_hash_compared_as_digest() {
        let alice = principal("alice");
        let master = MasterKeyPublic::from_json(&alice.keys.master_key_public).unwrap();
        let presented = master.timestamp().unwrap();

        let mut trust = TrustSnapshot::new();
        trust.credited_master_keys.insert(
            "alice".into(),
            CreditedMasterKey {
                hash_hex: master.key_hash_hex().to_uppercase(),
                timestamp: presented,
            },
        );
        let dist = create_room_key(&alice.identity, &[alice.keys.clone()], &trust).unwrap();
        assert!(dist.credited_master_key_updates.is_empty());
    }

    #[test]
    fn test_malformed_credited_hash_is_structural() {
        let alice = principal("alice");
        let master = MasterKeyPublic::from_json(&alice.keys.master_key_public).unwrap();

        let mut trust = TrustSnapshot::new();
        trust.credited_master_keys.insert(
            "alice".into(),
            CreditedMasterKey {
                hash_hex: "not-a-hash".into(),
                timestamp: master.timestamp().unwrap(),
            },
        );
        assert!(matches!(
            create_room_key(&alice.identity, &[alice.keys.clone()], &trust),
            Err(DistributionError::Structural { .. })
        ));
    }
}
