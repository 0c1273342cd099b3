//! Mint signed callback URLs for external services.

use std::sync::Arc;

use sasgate_core::Timestamp;

use crate::credentials::{
    default_signed_params, is_sas_param, signed_param_names, SharedAccessCredentials,
};
use crate::endpoint::CallbackEndpoint;
use crate::error::{IssueError, IssueResult};
use crate::policy::{SharedAccessPolicy, CURRENT_VERSION};
use crate::protector::ChannelTokenProtector;
use crate::scope::{AccessAction, AccessScope};
use crate::signer::PolicySigner;

/// What every issued URL grants.
///
/// The default is the whole site, every action, no expiry. Narrow it for
/// callers that can tolerate expiring URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackGrant {
    pub scope: AccessScope,
    pub action: AccessAction,
    pub ttl_secs: Option<u64>,
}

impl Default for CallbackGrant {
    fn default() -> Self {
        Self {
            scope: AccessScope::root(),
            action: AccessAction::WILDCARD,
            ttl_secs: None,
        }
    }
}

impl CallbackGrant {
    pub fn with_scope(mut self, scope: AccessScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_action(mut self, action: AccessAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// The concrete policy this grant yields at `now`.
    pub fn policy_at(&self, now: Timestamp) -> IssueResult<SharedAccessPolicy> {
        let policy = SharedAccessPolicy::new(CURRENT_VERSION, self.scope.clone(), self.action);
        match self.ttl_secs {
            Some(ttl) => policy
                .expires_in(now, ttl)
                .map_err(|_| IssueError::TimestampOutOfRange),
            None => Ok(policy),
        }
    }
}

#[derive(Debug)]
pub struct CallbackUrlIssuer {
    endpoint: CallbackEndpoint,
    protector: Arc<ChannelTokenProtector>,
    signer: PolicySigner,
    grant: CallbackGrant,
    signed_params: Vec<String>,
}

impl CallbackUrlIssuer {
    pub fn new(
        endpoint: CallbackEndpoint,
        protector: Arc<ChannelTokenProtector>,
        signer: PolicySigner,
    ) -> Self {
        Self {
            endpoint,
            protector,
            signer,
            grant: CallbackGrant::default(),
            signed_params: default_signed_params(),
        }
    }

    pub fn with_grant(mut self, grant: CallbackGrant) -> Self {
        self.grant = grant;
        self
    }

    /// Domain parameters callers may attach. Must match the authorizer's
    /// list, or issued URLs will not verify.
    pub fn with_signed_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signed_params = signed_param_names(names);
        self
    }

    pub fn grant(&self) -> &CallbackGrant {
        &self.grant
    }

    /// Signed URL for `routing_id` under the issuer's grant.
    pub fn issue<K, V>(
        &self,
        routing_id: &str,
        extra_params: &[(K, V)],
        now: Timestamp,
    ) -> IssueResult<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.issue_with_policy(routing_id, extra_params, &self.grant.policy_at(now)?)
    }

    /// Signed URL for `routing_id` under an explicit one-off policy.
    pub fn issue_with_policy<K, V>(
        &self,
        routing_id: &str,
        extra_params: &[(K, V)],
        policy: &SharedAccessPolicy,
    ) -> IssueResult<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.check_params(extra_params)?;
        if !policy.has_representable_window() {
            return Err(IssueError::TimestampOutOfRange);
        }

        let token = self.protector.protect(routing_id)?;
        let path = self.endpoint.path_for_token(token.as_str());
        let unsigned = self.endpoint.url_for(&path, extra_params);

        let signature = self.signer.sign(policy, &unsigned);
        let credentials = SharedAccessCredentials::new(policy, signature);

        tracing::debug!(
            purpose = %self.protector.purpose(),
            key = %self.signer.key_fingerprint(),
            action = %policy.action,
            expires = ?policy.expire_time.map(|t| t.to_rfc3339()),
            "Issued callback URL"
        );

        let separator = if extra_params.is_empty() { '?' } else { '&' };
        Ok(format!(
            "{}{}{}",
            unsigned,
            separator,
            credentials.to_query_string()
        ))
    }

    fn check_params<K, V>(&self, extra_params: &[(K, V)]) -> IssueResult<()>
    where
        K: AsRef<str>,
    {
        for (name, _) in extra_params {
            let name = name.as_ref();
            if is_sas_param(name) {
                return Err(IssueError::ReservedParam(name.to_string()));
            }
            if !self.signed_params.iter().any(|p| p == name) {
                return Err(IssueError::UnsignedParam(name.to_string()));
            }
        }
        Ok(())
    }
}
