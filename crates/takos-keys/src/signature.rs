//! Signature engine
//!
//! Signatures are detached ML-DSA-65 signatures packaged with the SHA-256 of
//! the signer's public key. Verification is a WYSIWYG contract: the caller
//! must present exactly the bytes that were signed. For delegation links the
//! layout is fixed per kind by [`Delegated::delegation_payload`].

use serde::{Deserialize, Serialize};
use takos_core::codec::serde_base64;
use takos_crypto::{
    digest_eq, DsaSigner, DsaVerifier, MLDSA65_SIGNATURE_SIZE, SHA256_SIZE,
};

use crate::error::{KeyError, Result};
use crate::object::{Delegated, KeyPair, SigningKey, VerifyingKey};

/// Detached signature plus the hash of the key that produced it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignatureObject {
    /// ML-DSA-65 signature (3309 bytes)
    #[serde(with = "serde_base64")]
    pub signature: Vec<u8>,

    /// SHA-256 of the signer's public key (32 bytes)
    #[serde(with = "serde_base64")]
    pub signed_key_hash: Vec<u8>,
}

impl SignatureObject {
    /// Length checks on both fields
    pub fn check(&self) -> Result<()> {
        if self.signature.len() != MLDSA65_SIGNATURE_SIZE {
            return Err(KeyError::InvalidSignature(format!(
                "signature must be {MLDSA65_SIGNATURE_SIZE} bytes, got {}",
                self.signature.len()
            )));
        }
        if self.signed_key_hash.len() != SHA256_SIZE {
            return Err(KeyError::InvalidSignature(format!(
                "signedKeyHash must be {SHA256_SIZE} bytes, got {}",
                self.signed_key_hash.len()
            )));
        }
        Ok(())
    }

    /// Decode and check JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let sig: SignatureObject = serde_json::from_str(json)?;
        sig.check()?;
        Ok(sig)
    }

    pub fn is_valid_json(json: &str) -> bool {
        Self::from_json(json).is_ok()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether this signature claims to come from `public`
    pub fn is_from<P: VerifyingKey>(&self, public: &P) -> bool {
        digest_eq(&self.signed_key_hash, &public.key_hash())
    }
}

/// Sign `message` with a signing keypair
pub fn sign<P: VerifyingKey, S: SigningKey>(
    signer: &KeyPair<P, S>,
    message: &[u8],
) -> Result<SignatureObject> {
    let signature = DsaSigner::sign(signer.private.key_bytes(), message)?;
    Ok(SignatureObject {
        signature,
        signed_key_hash: signer.public.key_hash().to_vec(),
    })
}

/// Verify `sig` over `message` against `public`.
///
/// Any structural problem, key-hash mismatch or failed check yields `false`.
pub fn verify<P: VerifyingKey>(public: &P, message: &[u8], sig: &SignatureObject) -> bool {
    if let Err(err) = sig.check() {
        tracing::debug!(error = %err, "signature rejected");
        return false;
    }
    if !sig.is_from(public) {
        tracing::debug!(signer = %P::KEY_TYPE, "signature names a different key");
        return false;
    }
    match DsaVerifier::verify(public.key_bytes(), message, &sig.signature) {
        Ok(valid) => valid,
        Err(err) => {
            tracing::debug!(error = %err, "signature verification error");
            false
        }
    }
}

const PAIR_CHECK_PAYLOAD: &[u8] = b"takos pair check";

/// Confirm that both halves of a signing pair belong to the same key
pub fn check_pair<P: VerifyingKey, S: SigningKey>(pair: &KeyPair<P, S>) -> Result<()> {
    let sig = sign(pair, PAIR_CHECK_PAYLOAD)?;
    if verify(&pair.public, PAIR_CHECK_PAYLOAD, &sig) {
        Ok(())
    } else {
        Err(KeyError::MismatchedPair(P::KEY_TYPE))
    }
}

/// Parent signs the child's delegation payload
pub fn sign_delegation<C, S>(
    parent: &KeyPair<C::Parent, S>,
    child: &C,
) -> Result<SignatureObject>
where
    C: Delegated,
    S: SigningKey,
{
    sign(parent, &child.delegation_payload())
}

/// Check one link of a delegation chain
pub fn verify_delegation<C: Delegated>(
    parent: &C::Parent,
    child: &C,
    sig: &SignatureObject,
) -> bool {
    verify(parent, &child.delegation_payload(), sig)
}
