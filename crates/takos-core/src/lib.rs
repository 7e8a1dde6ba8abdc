//! # Takos Core
//!
//! Encoding and time primitives shared by every layer of the Takos key
//! hierarchy:
//! - `codec` - base64 and UTF-8 conversions, signed-payload concatenation
//! - `time` - canonical millisecond-precision ISO-8601 timestamps
//! - `error` - codec error type
//!
//! Everything that crosses the host boundary is UTF-8 JSON with base64 byte
//! fields; the helpers here are the only place that encoding is spelled out.

pub mod codec;
pub mod error;
pub mod time;

pub use codec::*;
pub use error::*;
pub use time::*;

/// Protocol version embedded in every key, signature and envelope object
pub const PROTOCOL_VERSION: u32 = 1;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{concat_bytes, decode_base64, encode_base64};
    pub use crate::error::{CodecError, Result};
    pub use crate::time::Timestamp;
    pub use crate::PROTOCOL_VERSION;
}
