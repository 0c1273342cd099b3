//! SAS credential validation.
//!
//! Four checks, in priority order: presence, version, validity window,
//! signature. Every check is evaluated on every call; the error reported is
//! the first one that failed.

use sasgate_core::Timestamp;

use crate::compare::secure_equals;
use crate::credentials::SharedAccessCredentials;
use crate::error::{AuthError, AuthResult, SetupError, SetupResult};
use crate::scope::{scope_covers, AccessAction};
use crate::signer::PolicySigner;

// ---------------------------------------------------------------------------
// SigningKeys: primary plus optional previous key
// ---------------------------------------------------------------------------

/// Keys a signature is checked against. During rotation the previous key
/// stays here as `secondary` until URLs minted with it have expired.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    pub primary: PolicySigner,
    pub secondary: Option<PolicySigner>,
}

impl SigningKeys {
    pub fn new(primary: PolicySigner) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: PolicySigner) -> Self {
        self.secondary = Some(secondary);
        self
    }
}

// ---------------------------------------------------------------------------
// SasValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SasValidator {
    allowed_versions: Vec<String>,
    clock_skew_secs: u64,
}

impl SasValidator {
    pub fn new<I, S>(allowed_versions: I) -> SetupResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed_versions: Vec<String> = allowed_versions
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| !v.trim().is_empty())
            .collect();
        if allowed_versions.is_empty() {
            return Err(SetupError::NoAllowedVersions);
        }
        Ok(Self {
            allowed_versions,
            clock_skew_secs: 0,
        })
    }

    /// Tolerate up to `secs` of clock drift at both edges of the window.
    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.clock_skew_secs = secs;
        self
    }

    pub fn validate(
        &self,
        credentials: &SharedAccessCredentials,
        expected_url: &str,
        keys: &SigningKeys,
        now: Timestamp,
    ) -> AuthResult<()> {
        let presence = check_presence(credentials);
        let version = self.check_version(&credentials.version);
        let window = self.check_window(credentials, now);
        let signature = check_signature(credentials, expected_url, keys);

        presence.and(version).and(window).and(signature)
    }

    /// Whether the (already validated) credentials grant `action` on `path`.
    pub fn ensure_scope_permitted(
        &self,
        credentials: &SharedAccessCredentials,
        path: &str,
        action: AccessAction,
    ) -> AuthResult<()> {
        if scope_covers(&credentials.scope, path) && credentials.action.permits(action) {
            Ok(())
        } else {
            Err(AuthError::ScopeNotPermitted)
        }
    }

    fn check_version(&self, version: &str) -> AuthResult<()> {
        if self
            .allowed_versions
            .iter()
            .any(|v| v.eq_ignore_ascii_case(version))
        {
            Ok(())
        } else {
            Err(AuthError::UnsupportedVersion)
        }
    }

    fn check_window(&self, credentials: &SharedAccessCredentials, now: Timestamp) -> AuthResult<()> {
        if let Some(start) = credentials.start_time {
            if now.plus_seconds(self.clock_skew_secs) < start {
                return Err(AuthError::NotYetValid);
            }
        }
        if let Some(expire) = credentials.expire_time {
            if now > expire.plus_seconds(self.clock_skew_secs) {
                return Err(AuthError::Expired);
            }
        }
        Ok(())
    }
}

fn check_presence(credentials: &SharedAccessCredentials) -> AuthResult<()> {
    if credentials.version.is_empty()
        || credentials.scope.is_empty()
        || credentials.action.is_empty()
        || credentials.signature.is_empty()
    {
        Err(AuthError::MissingParameters)
    } else {
        Ok(())
    }
}

fn check_signature(
    credentials: &SharedAccessCredentials,
    expected_url: &str,
    keys: &SigningKeys,
) -> AuthResult<()> {
    let primary = keys.primary.sign_credentials(credentials, expected_url);
    let mut matched = secure_equals(&primary, &credentials.signature);
    if let Some(secondary) = &keys.secondary {
        let previous = secondary.sign_credentials(credentials, expected_url);
        matched |= secure_equals(&previous, &credentials.signature);
    }
    if matched {
        Ok(())
    } else {
        Err(AuthError::SignatureMismatch)
    }
}
