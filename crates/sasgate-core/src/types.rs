use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds, UTC)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Latest instant RFC 3339 can express: `9999-12-31T23:59:59.999999999Z`.
    pub const MAX: Timestamp = Timestamp {
        seconds_since_epoch: 253_402_300_799,
        nanoseconds: 999_999_999,
    };

    pub fn now() -> Self {
        chrono::Utc::now().into()
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    /// Whether this instant has an RFC 3339 form, i.e. is not after [`Timestamp::MAX`].
    pub fn is_representable(&self) -> bool {
        *self <= Self::MAX
    }

    /// RFC 3339 in UTC with a `Z` suffix and only as many fractional digits
    /// as needed, so `parse_rfc3339(t.to_rfc3339()) == t` for every
    /// representable `t`. Later instants are clamped to [`Timestamp::MAX`].
    pub fn to_rfc3339(&self) -> String {
        let t = if self.is_representable() { *self } else { Self::MAX };
        let seconds = i64::try_from(t.seconds_since_epoch).unwrap_or(i64::MAX);
        match chrono::DateTime::from_timestamp(seconds, t.nanoseconds) {
            Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            None => MAX_RFC3339.to_string(),
        }
    }

    /// Parse an RFC 3339 timestamp with any offset. Instants before the
    /// Unix epoch or after [`Timestamp::MAX`] are rejected.
    pub fn parse_rfc3339(input: &str) -> CoreResult<Self> {
        let dt = chrono::DateTime::parse_from_rfc3339(input)
            .map_err(|_| CoreError::InvalidTimestamp(input.to_string()))?;
        let seconds = u64::try_from(dt.timestamp())
            .map_err(|_| CoreError::InvalidTimestamp(input.to_string()))?;
        let t = Self {
            seconds_since_epoch: seconds,
            nanoseconds: dt.timestamp_subsec_nanos(),
        };
        if !t.is_representable() {
            return Err(CoreError::InvalidTimestamp(input.to_string()));
        }
        Ok(t)
    }

    /// Saturating addition, for comparisons only.
    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_add(seconds),
            nanoseconds: self.nanoseconds,
        }
    }

    /// `self + seconds`, or an error when the result is past [`Timestamp::MAX`].
    pub fn checked_plus_seconds(&self, seconds: u64) -> CoreResult<Self> {
        let t = self
            .seconds_since_epoch
            .checked_add(seconds)
            .map(|s| Self {
                seconds_since_epoch: s,
                nanoseconds: self.nanoseconds,
            })
            .filter(Timestamp::is_representable);
        t.ok_or_else(|| {
            CoreError::InvalidTimestamp(format!(
                "{}s after {} is out of range",
                seconds, self.seconds_since_epoch
            ))
        })
    }
}

const MAX_RFC3339: &str = "9999-12-31T23:59:59.999999999Z";

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: u64::try_from(dt.timestamp()).unwrap_or(0),
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// SecretKey: process-lifetime signing/encryption secret
// ---------------------------------------------------------------------------

/// Shared secret used for SAS signatures and token protection.
///
/// Zeroized on drop. `Debug` never prints the key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> CoreResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CoreError::EmptyKey);
        }
        Ok(Self { bytes })
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted>, {} bytes)", self.bytes.len())
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    RoutingId,
    "Internal correlation id (e.g. a channel or team id) carried in callback URLs only in protected form."
);
define_id!(
    ProtectionPurpose,
    "Label that separates one use of the master key from every other use."
);
