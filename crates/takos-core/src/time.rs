//! Canonical timestamps
//!
//! Timestamps travel as RFC 3339 strings with millisecond precision and a `Z`
//! suffix. Because the rendered string is also what gets signed, only the
//! canonical rendering is accepted on input.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{CodecError, Result};

/// Millisecond-precision UTC timestamp
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time, truncated to milliseconds
    pub fn now() -> Self {
        // Truncation keeps the canonical rendering lossless
        Self(Utc::now().trunc_subsecs(3))
    }

    /// Build from milliseconds since the Unix epoch
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self)
    }

    /// Milliseconds since the Unix epoch
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Parse a canonical rendering, rejecting any other RFC 3339 form
    pub fn parse(s: &str) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CodecError::InvalidTimestamp(e.to_string()))?
            .with_timezone(&Utc);
        let ts = Self(parsed);
        if ts.to_canonical() != s {
            return Err(CodecError::InvalidTimestamp(format!("non-canonical form: {s}")));
        }
        Ok(ts)
    }

    /// Canonical string, e.g. `2026-10-16T12:00:00.000Z`
    pub fn to_canonical(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Bytes that enter signed payloads
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_canonical().into_bytes()
    }

    /// Absolute distance to another timestamp in milliseconds
    pub fn abs_diff_millis(&self, other: &Timestamp) -> u64 {
        self.as_millis().abs_diff(other.as_millis())
    }

    /// Shift by a signed number of milliseconds
    pub fn offset_millis(&self, delta: i64) -> Option<Self> {
        self.as_millis().checked_add(delta).and_then(Self::from_millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}
