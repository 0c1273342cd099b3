//! Scope and action model: what a signature authorizes.
//!
//! A scope is a resource path with hierarchical prefix semantics: `/flow/`
//! covers `/flow/messages/abc` but not `/flowchart`. Comparison is
//! ASCII-case-insensitive. An action is a small bit-set of operations plus a
//! wildcard sentinel that covers every operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::ParseError;

// ---------------------------------------------------------------------------
// AccessScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessScope {
    path: String,
}

impl AccessScope {
    pub fn new(path: impl Into<String>) -> Result<Self, &'static str> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err("AccessScope path must not be empty");
        }
        Ok(Self { path })
    }

    /// The whole site: `"/"`.
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether `request_path` falls under this scope.
    pub fn permits(&self, request_path: &str) -> bool {
        scope_covers(&self.path, request_path)
    }
}

/// Prefix test on normalized, slash-terminated paths.
pub(crate) fn scope_covers(scope: &str, request_path: &str) -> bool {
    let trimmed = scope.trim_matches('/');
    let prefix = if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    };
    let candidate = format!("/{}/", request_path.trim_matches('/'));
    candidate.len() >= prefix.len()
        && candidate.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl TryFrom<String> for AccessScope {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessScope> for String {
    fn from(scope: AccessScope) -> Self {
        scope.path
    }
}

// ---------------------------------------------------------------------------
// AccessAction
// ---------------------------------------------------------------------------

/// Bit-set of permitted operations.
///
/// Wire form is the decimal value of the bits (`"1"` read, `"3"` read+write,
/// `"128"` wildcard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessAction(u8);

impl AccessAction {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(1 << 1);
    pub const DELETE: Self = Self(1 << 2);
    pub const RUN: Self = Self(1 << 3);
    pub const WILDCARD: Self = Self(1 << 7);

    const KNOWN_BITS: u8 = 0b1000_1111;

    /// Returns `None` if any unknown bit is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 & Self::WILDCARD.0 != 0
    }

    /// Whether every operation in `requested` is granted by `self`.
    pub fn permits(&self, requested: AccessAction) -> bool {
        if self.is_wildcard() {
            return true;
        }
        !requested.is_empty() && self.0 & requested.0 == requested.0
    }

    /// Decode the wire form. An empty string decodes to `NONE` so the
    /// validator can report it as missing rather than malformed.
    pub fn from_wire(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::NONE);
        }
        let bits: u8 = value.parse().map_err(|_| ParseError::InvalidAction)?;
        Self::from_bits(bits).ok_or(ParseError::InvalidAction)
    }

    pub fn to_wire(&self) -> String {
        self.0.to_string()
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "*" => Some(Self::WILDCARD),
            "read" => Some(Self::READ),
            "write" => Some(Self::WRITE),
            "delete" => Some(Self::DELETE),
            "run" => Some(Self::RUN),
            _ => None,
        }
    }
}

impl BitOr for AccessAction {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human form used in configuration: `"*"` or a comma-separated list such
/// as `"read,write"`.
impl FromStr for AccessAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut action = Self::NONE;
        for name in s.split(',').filter(|n| !n.trim().is_empty()) {
            action = action
                | Self::from_name(name).ok_or_else(|| format!("unknown action '{}'", name.trim()))?;
        }
        if action.is_empty() {
            return Err("at least one action is required".to_string());
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_rejects_empty() {
        assert!(AccessScope::new("").is_err());
        assert!(AccessScope::new("   ").is_err());
    }

    #[test]
    fn test_root_scope_permits_everything() {
        let root = AccessScope::root();
        assert!(root.permits("/"));
        assert!(root.permits("/flow/messages/abc"));
        assert!(root.permits("api/servicenow/incidents"));
    }

    #[test]
    fn test_scope_prefix_semantics() {
        let scope = AccessScope::new("/flow/messages").unwrap();
        assert!(scope.permits("/flow/messages"));
        assert!(scope.permits("/flow/messages/"));
        assert!(scope.permits("/flow/messages/token-1"));
        assert!(!scope.permits("/flow"));
        assert!(!scope.permits("/flow/messagesX"));
        assert!(!scope.permits("/api/servicenow"));
    }

    #[test]
    fn test_scope_case_insensitive() {
        let scope = AccessScope::new("/Flow/Messages/").unwrap();
        assert!(scope.permits("/flow/messages/abc"));
    }

    #[test]
    fn test_scope_serde_roundtrip() {
        let scope = AccessScope::new("/api").unwrap();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"/api\"");
        let back: AccessScope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
        assert!(serde_json::from_str::<AccessScope>("\"\"").is_err());
    }

    #[test]
    fn test_action_permits() {
        let rw = AccessAction::READ | AccessAction::WRITE;
        assert!(rw.permits(AccessAction::READ));
        assert!(rw.permits(AccessAction::WRITE));
        assert!(rw.permits(rw));
        assert!(!rw.permits(AccessAction::DELETE));
        assert!(!rw.permits(AccessAction::NONE));
    }

    #[test]
    fn test_wildcard_permits_all() {
        let all = AccessAction::WILDCARD;
        for a in [
            AccessAction::READ,
            AccessAction::WRITE,
            AccessAction::DELETE,
            AccessAction::RUN,
        ] {
            assert!(all.permits(a));
        }
    }

    #[test]
    fn test_action_wire_format() {
        assert_eq!(AccessAction::WILDCARD.to_wire(), "128");
        assert_eq!((AccessAction::READ | AccessAction::WRITE).to_wire(), "3");
        assert_eq!(AccessAction::from_wire("3").unwrap(), AccessAction::READ | AccessAction::WRITE);
        assert_eq!(AccessAction::from_wire("").unwrap(), AccessAction::NONE);
    }

    #[test]
    fn test_action_wire_rejects_unknown_bits() {
        assert_eq!(AccessAction::from_wire("16"), Err(ParseError::InvalidAction));
        assert_eq!(AccessAction::from_wire("rw"), Err(ParseError::InvalidAction));
        assert_eq!(AccessAction::from_wire("999"), Err(ParseError::InvalidAction));
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("*".parse::<AccessAction>().unwrap(), AccessAction::WILDCARD);
        assert_eq!(
            "read, write".parse::<AccessAction>().unwrap(),
            AccessAction::READ | AccessAction::WRITE
        );
        assert!("fly".parse::<AccessAction>().is_err());
        assert!("".parse::<AccessAction>().is_err());
    }
}
