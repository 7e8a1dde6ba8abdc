//! End-to-end room scenarios
//!
//! Alice creates a room key for herself and Bob, Bob unwraps it and reads
//! Alice's message. Then the failure paths a server or an attacker can
//! trigger: tampered chains, rollbacks, downgrades and stale messages.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use takos_keys::*;
use takos_protocol::*;

struct User {
    id: &'static str,
    master: MasterKeyPair,
    identity: IdentityKeyPair,
    account: AccountKeyPair,
    keys: ParticipantKeys,
}

fn user(id: &'static str) -> User {
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
    User {
        id,
        master,
        identity,
        account,
        keys,
    }
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_alice_and_bob() {
        let alice = user("alice@example.com");
        let bob = user("bob@example.com");

        let dist = create_room_key(
            &alice.identity,
            &[alice.keys.clone(), bob.keys.clone()],
            &TrustSnapshot::new(),
        )
        .unwrap();

        // Room key records both trust chains
        let hashes = dist.room_key.master_keys_hash_hex();
        assert_eq!(hashes[alice.id], alice.master.public.key_hash_hex());
        assert_eq!(hashes[bob.id], bob.master.public.key_hash_hex());

        // Bob unwraps through the wire format
        let envelope_json = dist.wrapped_for(bob.id).unwrap().to_json().unwrap();
        let envelope = EncryptedEnvelope::from_json(&envelope_json).unwrap();
        let room_key =
            open_room_key(&bob.account.private, &envelope, &alice.identity.public, &dist.signature)
                .unwrap();

        let msg = encrypt_message(
            &json!({"text": "hi"}),
            "general",
            &dist.room_key,
            &alice.identity,
            false,
        )
        .unwrap();
        let wire = serde_json::to_string(&msg).unwrap();
        let received: EncryptedMessage = serde_json::from_str(&wire).unwrap();

        let out: DecryptedMessage<Value> =
            decrypt_message(&received, &room_key, &alice.identity.public, msg.timestamp).unwrap();
        assert_eq!(out.payload, json!({"text": "hi"}));
        assert_eq!(out.channel, "general");
        assert_eq!(out.room_key_hash_hex, room_key.key_hash_hex());
    }

    #[test]
    fn test_tampered_account_signature_aborts_batch() {
        let alice = user("alice");
        let bob = user("bob");
        let mut carol = user("carol");

        let mut sig = SignatureObject::from_json(&carol.keys.account_key_signature).unwrap();
        sig.signature[7] ^= 0x01;
        carol.keys.account_key_signature = sig.to_json().unwrap();

        let result = create_room_key(
            &alice.identity,
            &[alice.keys.clone(), bob.keys.clone(), carol.keys.clone()],
            &TrustSnapshot::new(),
        );
        assert_eq!(
            result.unwrap_err(),
            DistributionError::Cryptographic {
                principal: "carol".to_string(),
                link: "identity->account",
            }
        );
    }

    #[test]
    fn test_swapped_identity_aborts_batch() {
        let alice = user("alice");
        let mallory = user("mallory");
        let mut keys = alice.keys.clone();
        keys.identity_key_public = mallory.keys.identity_key_public.clone();

        assert!(matches!(
            create_room_key(&alice.identity, &[keys], &TrustSnapshot::new()),
            Err(DistributionError::Cryptographic { link: "master->identity", .. })
        ));
    }

    #[test]
    fn test_rollback_and_ratchet() {
        let alice = user("alice");
        let bob = user("bob");
        let t = bob.identity.public.timestamp().unwrap();

        let mut trust = TrustSnapshot::new();
        trust
            .identity_timestamps
            .insert(bob.id.to_string(), t.offset_millis(1).unwrap());
        assert!(matches!(
            create_room_key(&alice.identity, &[bob.keys.clone()], &trust),
            Err(DistributionError::IdentityRollback { .. })
        ));

        trust
            .identity_timestamps
            .insert(bob.id.to_string(), t.offset_millis(-1).unwrap());
        let dist = create_room_key(&alice.identity, &[bob.keys.clone()], &trust).unwrap();
        assert_eq!(
            dist.identity_timestamp_updates,
            vec![IdentityTimestampUpdate {
                principal_id: bob.id.to_string(),
                timestamp: t,
            }]
        );
    }

    #[test]
    fn test_store_applies_and_enforces_updates() {
        let alice = user("alice");
        let bob = user("bob");
        let store = MemoryTrustStore::new();

        distribute_with_store(&store, &alice.identity, &[alice.keys.clone(), bob.keys.clone()])
            .unwrap();
        let bob_trust = store.get(bob.id);
        assert_eq!(bob_trust.identity_timestamp, bob.identity.public.timestamp());
        assert_eq!(
            bob_trust.credited_master_key.map(|c| c.hash_hex),
            Some(bob.master.public.key_hash_hex())
        );

        // Bob's keys replaced by an older-master impostor: downgrade
        let impostor = user("bob");
        let mut stale = store.get(bob.id);
        if let Some(credited) = stale.credited_master_key.as_mut() {
            credited.timestamp = impostor.master.public.timestamp().unwrap();
        }
        store.set(bob.id, stale);
        assert!(matches!(
            distribute_with_store(&store, &alice.identity, &[impostor.keys.clone()]),
            Err(DistributionError::MasterKeyDowngrade { .. })
        ));

        // Nothing was applied by the failed batch
        assert_eq!(
            store.get(bob.id).credited_master_key.map(|c| c.hash_hex),
            Some(bob.master.public.key_hash_hex())
        );
    }

    #[test]
    fn test_concurrent_distributions() {
        let users: Vec<User> = ["a", "b", "c", "d"].into_iter().map(user).collect();
        let keys: Vec<ParticipantKeys> = users.iter().map(|u| u.keys.clone()).collect();
        let store = Arc::new(MemoryTrustStore::new());

        std::thread::scope(|scope| {
            for u in &users {
                let store = Arc::clone(&store);
                let keys = keys.clone();
                scope.spawn(move || {
                    let mut batch = keys;
                    batch.reverse();
                    distribute_with_store(store.as_ref(), &u.identity, &batch).unwrap();
                });
            }
        });
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_room_key_ttl_from_config() {
        let config = ProtocolConfig::default();
        let room_key = RoomKey::generate(Default::default()).unwrap();
        let later = room_key.timestamp().offset_millis(600_001).unwrap();
        assert!(room_key.is_expired(later, config.room_key.ttl()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_freshness_window(skew in -20_000i64..20_000) {
        let alice = user("alice");
        let room_key = RoomKey::generate(Default::default()).unwrap();
        let msg = encrypt_message(&json!({"n": skew}), "general", &room_key, &alice.identity, false)
            .unwrap();
        let server = msg.timestamp.offset_millis(skew).unwrap();
        let out = decrypt_message::<Value>(&msg, &room_key, &alice.identity.public, server);
        prop_assert_eq!(out.is_some(), skew.unsigned_abs() <= FRESHNESS_WINDOW_MS);
    }
}
