//! sasgate host library
//!
//! Wires configuration and key material into a ready-to-serve gateway: a
//! [`CallbackUrlIssuer`] for minting callback URLs and an
//! [`InboundRequestAuthorizer`] that the HTTP layer installs in front of the
//! webhook handler.
//!
//! # Architecture
//!
//! `main.rs` loads [`GatewayConfig`], reads secrets from the environment into
//! [`KeyMaterial`] and calls [`initialize_gateway`]. The resulting
//! [`GatewayState`] is immutable and shared by every request handler.

pub mod config;
pub mod error;
pub mod http;

pub use config::{
    CallbackConfig, GatewayConfig, GrantConfig, KeyConfig, ServerConfig, ValidationConfig,
    MAX_TTL_SECS,
};
pub use error::{RootError, RootResult};

use std::sync::Arc;

use ::http::{Method, Uri};
use sasgate_access::{
    truncate_routing_id, AuthorizedRequest, CallbackEndpoint, CallbackGrant, CallbackUrlIssuer,
    ChannelTokenProtector, InboundRequestAuthorizer, PolicySigner, SasValidator, SigningKeys,
};
use sasgate_core::{key_fingerprint, SecretKey, Timestamp};
use tracing::{info, warn};

/// Secrets below this length still work but are flagged at startup.
const RECOMMENDED_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Current signing secret plus the previous one during rotation.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub current: SecretKey,
    pub previous: Option<SecretKey>,
}

impl KeyMaterial {
    pub fn new(current: SecretKey) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: SecretKey) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Read keys from the process environment.
    pub fn from_env(config: &KeyConfig) -> RootResult<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Read keys through `lookup` (variable name → value).
    pub fn from_lookup<F>(config: &KeyConfig, lookup: F) -> RootResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let current = read_secret(&config.secret_key_env, &lookup)?
            .ok_or_else(|| RootError::MissingSecret(config.secret_key_env.clone()))?;
        let mut keys = Self::new(current);
        if let Some(name) = &config.previous_secret_key_env {
            match read_secret(name, &lookup)? {
                Some(previous) => keys = keys.with_previous(previous),
                None => warn!(env = %name, "previous secret key variable is not set"),
            }
        }
        Ok(keys)
    }
}

fn read_secret<F>(name: &str, lookup: &F) -> RootResult<Option<SecretKey>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(Some(SecretKey::new(value.into_bytes())?)),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Gateway state
// ---------------------------------------------------------------------------

/// Runtime state shared by the CLI and the HTTP handlers.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub issuer: CallbackUrlIssuer,
    pub authorizer: InboundRequestAuthorizer,
}

/// Build the issuer and authorizer from validated configuration.
pub fn initialize_gateway(config: GatewayConfig, keys: KeyMaterial) -> RootResult<GatewayState> {
    config.validate()?;

    if keys.current.len() < RECOMMENDED_KEY_LEN {
        warn!(
            len = keys.current.len(),
            recommended = RECOMMENDED_KEY_LEN,
            "secret key is shorter than recommended"
        );
    }

    let endpoint = CallbackEndpoint::new(&config.callback.base_url, &config.callback.path)?;

    let mut protector = ChannelTokenProtector::new(&keys.current, config.callback.purpose.as_str())?;
    let signer = PolicySigner::new(&keys.current)?;
    let mut signing_keys = SigningKeys::new(signer.clone());
    if let Some(previous) = &keys.previous {
        signing_keys = signing_keys.with_secondary(PolicySigner::new(previous)?);
        protector = protector.with_previous_key(previous)?;
    }
    let protector = Arc::new(protector);

    let mut grant = CallbackGrant::default()
        .with_scope(config.grant.access_scope()?)
        .with_action(config.grant.access_action()?);
    if let Some(ttl) = config.grant.ttl_secs {
        grant = grant.with_ttl(ttl);
    }

    let issuer = CallbackUrlIssuer::new(endpoint.clone(), protector.clone(), signer)
        .with_grant(grant)
        .with_signed_params(config.callback.signed_params.iter().cloned());

    let validator = SasValidator::new(config.validation.allowed_versions.iter().cloned())?
        .with_clock_skew(config.validation.clock_skew_secs);
    let authorizer = InboundRequestAuthorizer::new(endpoint, protector, signing_keys, validator)
        .with_signed_params(config.callback.signed_params.iter().cloned());

    info!(
        base_url = %config.callback.base_url,
        callback_path = %config.callback.path,
        key = %key_fingerprint(&keys.current),
        rotation = keys.previous.is_some(),
        "sasgate initialized"
    );

    Ok(GatewayState {
        config,
        issuer,
        authorizer,
    })
}

impl GatewayState {
    /// Mint a callback URL for `routing_id`. `ttl_secs` overrides the
    /// configured grant lifetime and is held to the same bounds.
    pub fn issue_url(
        &self,
        routing_id: &str,
        params: &[(String, String)],
        ttl_secs: Option<u64>,
    ) -> RootResult<String> {
        let routing_id = match self.config.callback.routing_id_max_chars {
            Some(max) => truncate_routing_id(routing_id, max),
            None => routing_id,
        };
        let now = Timestamp::now();
        let url = match ttl_secs {
            Some(ttl) => {
                if ttl == 0 || ttl > MAX_TTL_SECS {
                    return Err(RootError::InvalidInput(format!(
                        "ttl must be between 1 and {} seconds",
                        MAX_TTL_SECS
                    )));
                }
                let policy = self.issuer.grant().clone().with_ttl(ttl).policy_at(now)?;
                self.issuer.issue_with_policy(routing_id, params, &policy)?
            }
            None => self.issuer.issue(routing_id, params, now)?,
        };
        Ok(url)
    }

    /// Authorize an absolute URL offline, as if `method` had been sent to it.
    pub fn check_url(&self, method: &Method, url: &str) -> RootResult<AuthorizedRequest> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RootError::InvalidInput(format!("not an absolute URL: {}", e)))?;
        let path_and_query = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        let uri: Uri = path_and_query
            .parse()
            .map_err(|_| RootError::InvalidInput("URL path is not a valid request target".into()))?;
        Ok(self.authorizer.authorize_parts(method, &uri)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sasgate_access::{AuthError, IssueError};
    use std::collections::HashMap;

    fn test_keys() -> KeyMaterial {
        KeyMaterial::new(SecretKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap())
    }

    fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.callback.base_url = "https://bot.example.com".into();
        config
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_key_material_from_lookup() {
        let keys =
            KeyMaterial::from_lookup(&KeyConfig::default(), lookup(&[("SASGATE_SECRET_KEY", "s3cret")]))
                .unwrap();
        assert_eq!(keys.current.expose(), b"s3cret");
        assert!(keys.previous.is_none());
    }

    #[test]
    fn test_key_material_missing_secret() {
        let err = KeyMaterial::from_lookup(&KeyConfig::default(), lookup(&[])).unwrap_err();
        assert!(matches!(err, RootError::MissingSecret(name) if name == "SASGATE_SECRET_KEY"));

        let err = KeyMaterial::from_lookup(
            &KeyConfig::default(),
            lookup(&[("SASGATE_SECRET_KEY", "")]),
        )
        .unwrap_err();
        assert!(matches!(err, RootError::MissingSecret(_)));
    }

    #[test]
    fn test_key_material_previous() {
        let config = KeyConfig {
            secret_key_env: "NEW".into(),
            previous_secret_key_env: Some("OLD".into()),
        };
        let keys = KeyMaterial::from_lookup(&config, lookup(&[("NEW", "n"), ("OLD", "o")])).unwrap();
        assert_eq!(keys.previous.unwrap().expose(), b"o");

        let keys = KeyMaterial::from_lookup(&config, lookup(&[("NEW", "n")])).unwrap();
        assert!(keys.previous.is_none());
    }

    #[test]
    fn test_initialize_gateway_rejects_invalid_config() {
        let mut config = test_config();
        config.callback.base_url = "ftp://bot.example.com".into();
        assert!(initialize_gateway(config, test_keys()).is_err());
    }

    #[test]
    fn test_issue_and_check_url() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        let url = state
            .issue_url(
                "19:channel",
                &[("channelId".into(), "19:channel".into())],
                None,
            )
            .unwrap();
        let authorized = state.check_url(&Method::POST, &url).unwrap();
        assert_eq!(authorized.routing_id.as_str(), "19:channel");
        assert_eq!(authorized.param("channelId"), Some("19:channel"));
    }

    #[test]
    fn test_issue_url_with_ttl_sets_expiry() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        let url = state.issue_url("id", &[], Some(300)).unwrap();
        assert!(url.contains("&se="));
        let authorized = state.check_url(&Method::POST, &url).unwrap();
        assert!(authorized.expire_time.is_some());
    }

    #[test]
    fn test_issue_url_rejects_out_of_range_ttl() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        for ttl in [0, MAX_TTL_SECS + 1, 10_000_000_000_000, u64::MAX] {
            assert!(matches!(
                state.issue_url("team-123", &[], Some(ttl)),
                Err(RootError::InvalidInput(_))
            ));
        }
        let url = state.issue_url("team-123", &[], Some(MAX_TTL_SECS)).unwrap();
        assert!(state.check_url(&Method::POST, &url).is_ok());
    }

    #[test]
    fn test_issue_url_rejects_unsigned_param() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        assert!(matches!(
            state.issue_url("team-123", &[("ticket".into(), "INC1".into())], None),
            Err(RootError::Issue(IssueError::UnsignedParam(name))) if name == "ticket"
        ));
    }

    #[test]
    fn test_configured_signed_param_is_issued_and_checked() {
        let mut config = test_config();
        config.callback.signed_params.push("ticket".into());
        let state = initialize_gateway(config, test_keys()).unwrap();
        let url = state
            .issue_url("team-123", &[("ticket".into(), "INC1".into())], None)
            .unwrap();
        let authorized = state.check_url(&Method::POST, &url).unwrap();
        assert_eq!(authorized.param("ticket"), Some("INC1"));
    }

    #[test]
    fn test_issue_url_rejects_reserved_param() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        assert!(matches!(
            state.issue_url("team-123", &[("sig".into(), "x".into())], None),
            Err(RootError::Issue(IssueError::ReservedParam(_)))
        ));
    }

    #[test]
    fn test_issue_url_truncates_routing_id() {
        let mut config = test_config();
        config.callback.routing_id_max_chars = Some(10);
        let state = initialize_gateway(config, test_keys()).unwrap();
        let url = state.issue_url("19:abcdefghijklmnop", &[], None).unwrap();
        let authorized = state.check_url(&Method::POST, &url).unwrap();
        assert_eq!(authorized.routing_id.as_str(), "19:abcdefg");
    }

    #[test]
    fn test_check_url_rejects_tampering() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        let url = state.issue_url("id", &[], None).unwrap();
        let tampered = url.replace("sp=128", "sp=1");
        assert!(matches!(
            state.check_url(&Method::POST, &tampered),
            Err(RootError::Auth(AuthError::SignatureMismatch))
        ));
    }

    #[test]
    fn test_check_url_rejects_relative_url() {
        let state = initialize_gateway(test_config(), test_keys()).unwrap();
        assert!(matches!(
            state.check_url(&Method::POST, "/flow/messages/abc"),
            Err(RootError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rotation_keeps_old_urls_valid() {
        let old = SecretKey::new(b"old-key-old-key-old-key-old-key!".to_vec()).unwrap();
        let before = initialize_gateway(test_config(), KeyMaterial::new(old.clone())).unwrap();
        let url = before.issue_url("team-1", &[], None).unwrap();

        let after = initialize_gateway(test_config(), test_keys().with_previous(old)).unwrap();
        let authorized = after.check_url(&Method::POST, &url).unwrap();
        assert_eq!(authorized.routing_id.as_str(), "team-1");
    }
}
