//! Key generation
//!
//! Key material comes from the primitives' internal CSPRNG. Delegated kinds
//! are returned together with the parent's signature over their payload.

use serde::Serialize;
use takos_core::Timestamp;
use takos_crypto::{generate_symmetric_key, DsaKeyPair, KemKeyPair};
use uuid::Uuid;

use crate::error::Result;
use crate::kind::KeyType;
use crate::object::*;
use crate::signature::{sign_delegation, SignatureObject};

fn dsa_pair<P: TypedKey, S: TypedKey>(
    timestamp: Option<Timestamp>,
    session_uuid: Option<Uuid>,
) -> Result<KeyPair<P, S>> {
    let raw = DsaKeyPair::generate();
    let public = KeyObject::new(P::KEY_TYPE, raw.public_key.clone(), timestamp, session_uuid);
    let private = KeyObject::new(
        S::KEY_TYPE,
        raw.secret_key.as_bytes().to_vec(),
        timestamp,
        session_uuid,
    );
    Ok(KeyPair::new(P::from_object(public)?, S::from_object(private)?))
}

fn kem_pair<P: TypedKey, S: TypedKey>(
    timestamp: Option<Timestamp>,
    session_uuid: Option<Uuid>,
) -> Result<KeyPair<P, S>> {
    let raw = KemKeyPair::generate();
    let public = KeyObject::new(P::KEY_TYPE, raw.public_key.clone(), timestamp, session_uuid);
    let private = KeyObject::new(
        S::KEY_TYPE,
        raw.secret_key.as_bytes().to_vec(),
        timestamp,
        session_uuid,
    );
    Ok(KeyPair::new(P::from_object(public)?, S::from_object(private)?))
}

/// Root-of-trust signing keypair
pub fn generate_master_key() -> Result<MasterKeyPair> {
    dsa_pair(Some(Timestamp::now()), None)
}

/// Identity keypair signed by `master` over `key ‖ timestamp`
pub fn generate_identity_key(
    master: &MasterKeyPair,
) -> Result<(IdentityKeyPair, SignatureObject)> {
    let pair: IdentityKeyPair = dsa_pair(Some(Timestamp::now()), None)?;
    let sig = sign_delegation(master, &pair.public)?;
    Ok((pair, sig))
}

/// Account KEM keypair signed by `identity` over `key`
pub fn generate_account_key(
    identity: &IdentityKeyPair,
) -> Result<(AccountKeyPair, SignatureObject)> {
    let pair: AccountKeyPair = kem_pair(None, None)?;
    let sig = sign_delegation(identity, &pair.public)?;
    Ok((pair, sig))
}

/// Session-bound KEM keypair signed by `master`
pub fn generate_key_share_key(
    master: &MasterKeyPair,
) -> Result<(KeyShareKeyPair, SignatureObject)> {
    let pair: KeyShareKeyPair = kem_pair(Some(Timestamp::now()), Some(Uuid::now_v7()))?;
    let sig = sign_delegation(master, &pair.public)?;
    Ok((pair, sig))
}

/// Session-bound signing keypair signed by `master`
pub fn generate_key_share_sign_key(
    master: &MasterKeyPair,
) -> Result<(KeyShareSignKeyPair, SignatureObject)> {
    let pair: KeyShareSignKeyPair = dsa_pair(Some(Timestamp::now()), Some(Uuid::now_v7()))?;
    let sig = sign_delegation(master, &pair.public)?;
    Ok((pair, sig))
}

pub fn generate_migrate_key() -> Result<MigrateKeyPair> {
    kem_pair(None, None)
}

pub fn generate_migrate_sign_key() -> Result<MigrateSignKeyPair> {
    dsa_pair(None, None)
}

/// Local AES-256 key
pub fn generate_device_key() -> Result<DeviceKey> {
    let key = generate_symmetric_key();
    DeviceKey::from_object(KeyObject::new(KeyType::DeviceKey, key.to_vec(), None, None))
}

/// What to generate, with the parent for delegated kinds
#[derive(Clone, Copy, Debug)]
pub enum KeyRequest<'a> {
    MasterKey,
    IdentityKey { master: &'a MasterKeyPair },
    AccountKey { identity: &'a IdentityKeyPair },
    KeyShareKey { master: &'a MasterKeyPair },
    KeyShareSignKey { master: &'a MasterKeyPair },
    MigrateKey,
    MigrateSignKey,
    DeviceKey,
}

/// Untyped generation result
#[derive(Clone, Debug, Serialize)]
pub struct GeneratedKey {
    /// Public half; `None` for device keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<KeyObject>,

    /// Private half, or the raw key for device keys
    pub private: KeyObject,

    /// Parent signature for delegated kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureObject>,
}

impl GeneratedKey {
    fn pair<P: TypedKey, S: TypedKey>(pair: KeyPair<P, S>, signature: Option<SignatureObject>) -> Self {
        Self {
            public: Some(pair.public.into_object()),
            private: pair.private.into_object(),
            signature,
        }
    }
}

/// Generate any kind from a request
pub fn generate(request: KeyRequest<'_>) -> Result<GeneratedKey> {
    let generated = match request {
        KeyRequest::MasterKey => GeneratedKey::pair(generate_master_key()?, None),
        KeyRequest::IdentityKey { master } => {
            let (pair, sig) = generate_identity_key(master)?;
            GeneratedKey::pair(pair, Some(sig))
        }
        KeyRequest::AccountKey { identity } => {
            let (pair, sig) = generate_account_key(identity)?;
            GeneratedKey::pair(pair, Some(sig))
        }
        KeyRequest::KeyShareKey { master } => {
            let (pair, sig) = generate_key_share_key(master)?;
            GeneratedKey::pair(pair, Some(sig))
        }
        KeyRequest::KeyShareSignKey { master } => {
            let (pair, sig) = generate_key_share_sign_key(master)?;
            GeneratedKey::pair(pair, Some(sig))
        }
        KeyRequest::MigrateKey => GeneratedKey::pair(generate_migrate_key()?, None),
        KeyRequest::MigrateSignKey => GeneratedKey::pair(generate_migrate_sign_key()?, None),
        KeyRequest::DeviceKey => GeneratedKey {
            public: None,
            private: generate_device_key()?.into_object(),
            signature: None,
        },
    };
    tracing::debug!(kind = %generated.private.key_type, "generated key");
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::validate;
    use crate::signature::verify_delegation;

    #[test]
    fn test_master_key_shape() {
        let master = generate_master_key().unwrap();
        assert_eq!(master.public.key_bytes().len(), 1952);
        assert_eq!(master.private.key_bytes().len(), 4032);
        assert!(master.public.timestamp().is_some());
        assert_eq!(master.public.timestamp(), master.private.timestamp());
        assert!(validate(KeyType::MasterKeyPublic, &master.public.to_json().unwrap()));
        assert!(validate(KeyType::MasterKeyPrivate, &master.private.to_json().unwrap()));
    }

    #[test]
    fn test_key_share_pairs_share_session() {
        let master = generate_master_key().unwrap();
        let (kem, kem_sig) = generate_key_share_key(&master).unwrap();
        let (dsa, dsa_sig) = generate_key_share_sign_key(&master).unwrap();

        assert_eq!(kem.public.session_uuid(), kem.private.session_uuid());
        assert_ne!(kem.public.session_uuid(), dsa.public.session_uuid());
        assert!(verify_delegation(&master.public, &kem.public, &kem_sig));
        assert!(verify_delegation(&master.public, &dsa.public, &dsa_sig));
    }

    #[test]
    fn test_migrate_keys_are_bare() {
        let kem = generate_migrate_key().unwrap();
        let dsa = generate_migrate_sign_key().unwrap();
        assert!(kem.public.timestamp().is_none());
        assert!(dsa.private.session_uuid().is_none());
        assert_eq!(kem.private.key_bytes().len(), 2400);
    }

    #[test]
    fn test_generate_request() {
        let master = generate_master_key().unwrap();
        let (identity, _) = generate_identity_key(&master).unwrap();

        let account = generate(KeyRequest::AccountKey { identity: &identity }).unwrap();
        assert_eq!(account.private.key_type, KeyType::AccountKeyPrivate);
        assert!(account.signature.is_some());
        let public = account.public.unwrap();
        assert!(validate(KeyType::AccountKeyPublic, &public.to_json().unwrap()));

        let device = generate(KeyRequest::DeviceKey).unwrap();
        assert!(device.public.is_none());
        assert_eq!(device.private.key.len(), 32);

        let migrate = generate(KeyRequest::MigrateSignKey).unwrap();
        assert!(migrate.signature.is_none());
    }
}
