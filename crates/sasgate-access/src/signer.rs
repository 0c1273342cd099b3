//! HMAC-SHA256 policy signing.
//!
//! Canonical string: `version \n scope \n action \n start \n expire \n url`,
//! where `action` is the decimal bit value and absent times are empty. The
//! MAC is encoded base64url without padding.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sasgate_core::{key_fingerprint, SecretKey, Timestamp};
use sha2::Sha256;

use crate::credentials::SharedAccessCredentials;
use crate::error::{SetupError, SetupResult};
use crate::policy::SharedAccessPolicy;
use crate::scope::AccessAction;

type HmacSha256 = Hmac<Sha256>;

/// Length of an encoded signature (32 MAC bytes, base64url, no padding).
pub const SIGNATURE_LEN: usize = 43;

/// Build the exact byte sequence that gets signed.
pub fn canonical_string(
    version: &str,
    scope: &str,
    action: AccessAction,
    start_time: Option<Timestamp>,
    expire_time: Option<Timestamp>,
    url: &str,
) -> String {
    let start = start_time.map(|t| t.to_rfc3339()).unwrap_or_default();
    let expire = expire_time.map(|t| t.to_rfc3339()).unwrap_or_default();
    [version, scope, &action.to_wire(), &start, &expire, url].join("\n")
}

/// Deterministic signer keyed once at construction.
#[derive(Clone)]
pub struct PolicySigner {
    mac: HmacSha256,
    fingerprint: String,
}

impl PolicySigner {
    pub fn new(key: &SecretKey) -> SetupResult<Self> {
        let mac =
            HmacSha256::new_from_slice(key.expose()).map_err(|_| SetupError::InvalidKey)?;
        Ok(Self {
            mac,
            fingerprint: key_fingerprint(key),
        })
    }

    /// Sign `policy` bound to `url`.
    pub fn sign(&self, policy: &SharedAccessPolicy, url: &str) -> String {
        self.sign_canonical(&canonical_string(
            &policy.version,
            policy.scope.as_str(),
            policy.action,
            policy.start_time,
            policy.expire_time,
            url,
        ))
    }

    /// Recompute the signature that `credentials` should carry for `url`.
    pub(crate) fn sign_credentials(&self, credentials: &SharedAccessCredentials, url: &str) -> String {
        self.sign_canonical(&canonical_string(
            &credentials.version,
            &credentials.scope,
            credentials.action,
            credentials.start_time,
            credentials.expire_time,
            url,
        ))
    }

    /// Short key fingerprint, safe to log.
    pub fn key_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn sign_canonical(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for PolicySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySigner")
            .field("key", &format_args!("<redacted:{}>", self.fingerprint))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::AccessScope;

    const URL: &str = "https://bot.example.com/flow/messages/abc?channelId=19%3Aabc";

    fn signer() -> PolicySigner {
        PolicySigner::new(&SecretKey::new(b"test-secret-key".to_vec()).unwrap()).unwrap()
    }

    fn policy() -> SharedAccessPolicy {
        SharedAccessPolicy::new(
            "1.0",
            AccessScope::new("/flow").unwrap(),
            AccessAction::WRITE,
        )
        .with_validity(
            Some(Timestamp::from_seconds(1_700_000_000)),
            Some(Timestamp::from_seconds(1_700_000_300)),
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_string_layout() {
        let canonical = canonical_string(
            "1.0",
            "/",
            AccessAction::WILDCARD,
            None,
            Some(Timestamp::from_seconds(1_700_000_000)),
            "https://h/x",
        );
        assert_eq!(canonical, "1.0\n/\n128\n\n2023-11-14T22:13:20Z\nhttps://h/x");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let s = signer();
        assert_eq!(s.sign(&policy(), URL), s.sign(&policy(), URL));
        let fresh = signer();
        assert_eq!(s.sign(&policy(), URL), fresh.sign(&policy(), URL));
    }

    #[test]
    fn test_signature_shape() {
        let sig = signer().sign(&policy(), URL);
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(!sig.contains('='));
        assert!(!sig.contains('+'));
        assert!(!sig.contains('/'));
    }

    #[test]
    fn test_url_tamper_changes_signature() {
        let s = signer();
        let base = s.sign(&policy(), URL);
        assert_ne!(base, s.sign(&policy(), &URL.replace("abc", "abd")));
        assert_ne!(base, s.sign(&policy(), &format!("{}&x=1", URL)));
    }

    #[test]
    fn test_policy_field_tamper_changes_signature() {
        let s = signer();
        let base = s.sign(&policy(), URL);

        let mut p = policy();
        p.version = "2.0".to_string();
        assert_ne!(base, s.sign(&p, URL));

        let mut p = policy();
        p.scope = AccessScope::root();
        assert_ne!(base, s.sign(&p, URL));

        let mut p = policy();
        p.action = AccessAction::WILDCARD;
        assert_ne!(base, s.sign(&p, URL));

        let mut p = policy();
        p.start_time = None;
        assert_ne!(base, s.sign(&p, URL));

        let mut p = policy();
        p.expire_time = Some(Timestamp::from_seconds(1_800_000_000));
        assert_ne!(base, s.sign(&p, URL));
    }

    #[test]
    fn test_key_change_changes_signature() {
        let other = PolicySigner::new(&SecretKey::new(b"other-secret-key".to_vec()).unwrap()).unwrap();
        assert_ne!(signer().sign(&policy(), URL), other.sign(&policy(), URL));
    }

    #[test]
    fn test_sign_credentials_matches_sign() {
        let s = signer();
        let sig = s.sign(&policy(), URL);
        let creds = SharedAccessCredentials::new(&policy(), sig.clone());
        assert_eq!(s.sign_credentials(&creds, URL), sig);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("test-secret-key"));
        assert!(debug.contains("redacted"));
    }
}
