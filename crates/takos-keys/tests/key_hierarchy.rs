//! Integration tests for the key hierarchy
//!
//! Covers full delegation chains, tampering on every signed field and the
//! exact-length rule for every key kind.

use proptest::prelude::*;
use serde_json::Value;
use takos_core::encode_base64;
use takos_keys::*;

fn with_key_len(json: &str, delta: isize) -> String {
    let mut value: Value = serde_json::from_str(json).unwrap();
    let key = takos_core::decode_base64(value["key"].as_str().unwrap()).unwrap();
    let mut resized = key.clone();
    if delta < 0 {
        resized.truncate(key.len() - delta.unsigned_abs());
    } else {
        resized.extend(std::iter::repeat(0xAB).take(delta as usize));
    }
    value["key"] = Value::from(encode_base64(&resized));
    value.to_string()
}

/// One sample object per kind, generated once
fn samples() -> Vec<(KeyType, String)> {
    let master = generate_master_key().unwrap();
    let (identity, _) = generate_identity_key(&master).unwrap();
    let (account, _) = generate_account_key(&identity).unwrap();
    let (share, _) = generate_key_share_key(&master).unwrap();
    let (share_sign, _) = generate_key_share_sign_key(&master).unwrap();
    let migrate = generate_migrate_key().unwrap();
    let migrate_sign = generate_migrate_sign_key().unwrap();
    let device = generate_device_key().unwrap();
    let room = RoomKey::generate(Default::default()).unwrap();

    vec![
        (KeyType::MasterKeyPublic, master.public.to_json().unwrap()),
        (KeyType::MasterKeyPrivate, master.private.to_json().unwrap()),
        (KeyType::IdentityKeyPublic, identity.public.to_json().unwrap()),
        (KeyType::IdentityKeyPrivate, identity.private.to_json().unwrap()),
        (KeyType::AccountKeyPublic, account.public.to_json().unwrap()),
        (KeyType::AccountKeyPrivate, account.private.to_json().unwrap()),
        (KeyType::KeyShareKeyPublic, share.public.to_json().unwrap()),
        (KeyType::KeyShareKeyPrivate, share.private.to_json().unwrap()),
        (KeyType::KeyShareSignKeyPublic, share_sign.public.to_json().unwrap()),
        (KeyType::KeyShareSignKeyPrivate, share_sign.private.to_json().unwrap()),
        (KeyType::MigrateKeyPublic, migrate.public.to_json().unwrap()),
        (KeyType::MigrateKeyPrivate, migrate.private.to_json().unwrap()),
        (KeyType::MigrateSignKeyPublic, migrate_sign.public.to_json().unwrap()),
        (KeyType::MigrateSignKeyPrivate, migrate_sign.private.to_json().unwrap()),
        (KeyType::DeviceKey, device.to_json().unwrap()),
        (KeyType::RoomKey, room.to_json().unwrap()),
    ]
}

mod chain_tests {
    use super::*;

    #[test]
    fn test_full_chain_verifies() {
        let master = generate_master_key().unwrap();
        let (identity, identity_sig) = generate_identity_key(&master).unwrap();
        let (account, account_sig) = generate_account_key(&identity).unwrap();

        // Reload everything from JSON as a peer would
        let master_pub = MasterKeyPublic::from_json(&master.public.to_json().unwrap()).unwrap();
        let identity_pub =
            IdentityKeyPublic::from_json(&identity.public.to_json().unwrap()).unwrap();
        let account_pub = AccountKeyPublic::from_json(&account.public.to_json().unwrap()).unwrap();
        let identity_sig = SignatureObject::from_json(&identity_sig.to_json().unwrap()).unwrap();
        let account_sig = SignatureObject::from_json(&account_sig.to_json().unwrap()).unwrap();

        assert!(verify_delegation(&master_pub, &identity_pub, &identity_sig));
        assert!(verify_delegation(&identity_pub, &account_pub, &account_sig));
    }

    #[test]
    fn test_foreign_master_rejected() {
        let master = generate_master_key().unwrap();
        let intruder = generate_master_key().unwrap();
        let (identity, _) = generate_identity_key(&master).unwrap();
        let forged = sign_delegation(&intruder, &identity.public).unwrap();
        assert!(!verify_delegation(&master.public, &identity.public, &forged));
    }

    #[test]
    fn test_tampered_account_key_rejected() {
        let master = generate_master_key().unwrap();
        let (identity, _) = generate_identity_key(&master).unwrap();
        let (account, sig) = generate_account_key(&identity).unwrap();

        let mut obj = account.public.into_object();
        obj.key[0] ^= 0x01;
        let tampered = AccountKeyPublic::from_object(obj).unwrap();
        assert!(!verify_delegation(&identity.public, &tampered, &sig));
    }

    #[test]
    fn test_length_off_by_one_rejected_for_every_kind() {
        let samples = samples();
        assert_eq!(samples.len(), KeyType::ALL.len());
        for (kind, json) in &samples {
            assert!(validate(*kind, &with_key_len(json, 0)), "{kind} unchanged");
            for delta in [-1, 1] {
                assert!(!validate(*kind, &with_key_len(json, delta)), "{kind} delta {delta}");
            }
        }
    }

    #[test]
    fn test_any_key_decodes_every_kind() {
        for (kind, json) in samples() {
            assert!(validate(kind, &json), "{kind} sample invalid");
            assert_eq!(AnyKey::from_json(&json).unwrap().key_type(), kind);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_signature_bit_flip_rejected(byte in 0usize..3309, bit in 0u8..8) {
        let master = generate_master_key().unwrap();
        let message = b"room epoch";
        let mut sig = sign(&master, message).unwrap();
        sig.signature[byte] ^= 1 << bit;
        prop_assert!(!verify(&master.public, message, &sig));
    }

    #[test]
    fn prop_garbage_never_validates(input in ".{0,256}") {
        for kind in KeyType::ALL {
            prop_assert!(!validate(kind, &input));
        }
    }
}
