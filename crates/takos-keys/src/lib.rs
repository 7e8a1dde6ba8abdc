//! # Takos Key Hierarchy
//!
//! Typed, versioned key objects and the signature engine that binds them
//! into delegation chains:
//!
//! ```text
//!   MasterKey (root, ML-DSA-65)
//!     ├── IdentityKey    signs key ‖ timestamp     (ML-DSA-65)
//!     │     └── AccountKey   signs key            (ML-KEM-768)
//!     ├── KeyShareKey    signs key ‖ timestamp     (ML-KEM-768, session uuid)
//!     └── KeyShareSignKey signs key ‖ timestamp    (ML-DSA-65, session uuid)
//!
//!   MigrateKey / MigrateSignKey   standalone, no delegation
//!   DeviceKey                     local AES-256 key, never transmitted
//!   RoomKey                       AES-256, signed by its creator's IdentityKey
//! ```
//!
//! Every object crosses the host boundary as JSON. Decoding always checks the
//! `type` tag, the `version`, the exact decoded key length and the presence of
//! kind-specific fields before any key bytes are used.

pub mod error;
pub mod generate;
pub mod kind;
pub mod object;
pub mod signature;
pub mod symmetric;

pub use error::*;
pub use generate::*;
pub use kind::*;
pub use object::*;
pub use signature::*;
pub use symmetric::*;

/// Key hierarchy prelude
pub mod prelude {
    pub use crate::error::{KeyError, Result};
    pub use crate::generate::{
        generate_account_key, generate_identity_key, generate_master_key, KeyRequest,
    };
    pub use crate::kind::KeyType;
    pub use crate::object::{
        AccountKeyPublic, DeviceKey, IdentityKeyPublic, KeyPair, MasterKeyPublic, TypedKey,
    };
    pub use crate::signature::{sign, verify, SignatureObject};
    pub use crate::symmetric::RoomKey;
}
