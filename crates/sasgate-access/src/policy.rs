//! Shared access policy: the semantic input to signing.

use sasgate_core::Timestamp;

use crate::error::{SetupError, SetupResult};
use crate::scope::{AccessAction, AccessScope};

/// Version stamped on policies this build issues.
pub const CURRENT_VERSION: &str = "1.0";

/// An immutable bundle of {version, scope, action, validity window}.
///
/// No defaults are applied: a wildcard scope or action is always the
/// caller's explicit choice (see [`SharedAccessPolicy::wildcard`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAccessPolicy {
    pub version: String,
    pub scope: AccessScope,
    pub action: AccessAction,
    pub start_time: Option<Timestamp>,
    pub expire_time: Option<Timestamp>,
}

impl SharedAccessPolicy {
    pub fn new(version: impl Into<String>, scope: AccessScope, action: AccessAction) -> Self {
        Self {
            version: version.into(),
            scope,
            action,
            start_time: None,
            expire_time: None,
        }
    }

    /// Maximal grant: whole site, every action, no expiry.
    pub fn wildcard(version: impl Into<String>) -> Self {
        Self::new(version, AccessScope::root(), AccessAction::WILDCARD)
    }

    /// Set an explicit validity window. Rejects `start > expire`.
    pub fn with_validity(
        mut self,
        start_time: Option<Timestamp>,
        expire_time: Option<Timestamp>,
    ) -> SetupResult<Self> {
        if let (Some(start), Some(expire)) = (start_time, expire_time) {
            if start > expire {
                return Err(SetupError::InvalidPolicy(
                    "start_time is after expire_time".to_string(),
                ));
            }
        }
        self.start_time = start_time;
        self.expire_time = expire_time;
        Ok(self)
    }

    /// Valid from `now` for `ttl_secs` seconds. Fails when the expiry has no
    /// RFC 3339 form.
    pub fn expires_in(mut self, now: Timestamp, ttl_secs: u64) -> SetupResult<Self> {
        let expire = now.checked_plus_seconds(ttl_secs)?;
        self.start_time = Some(now);
        self.expire_time = Some(expire);
        Ok(self)
    }

    /// Whether every timestamp in the window can be put on the wire as is.
    pub fn has_representable_window(&self) -> bool {
        [self.start_time, self.expire_time]
            .iter()
            .flatten()
            .all(Timestamp::is_representable)
    }
}
