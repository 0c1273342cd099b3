use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sasgate_access::{
    is_sas_param, AccessAction, AccessScope, CallbackEndpoint, DEFAULT_SIGNED_PARAMS,
};

use crate::error::{RootError, RootResult};

/// Longest lifetime an issued URL may have: ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Listener settings for `sasgate serve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3978
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Where external services call back, and how the routing token is sealed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackConfig {
    /// Public origin the external service sees (no path).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Route the webhook handler is mounted on; the token is appended.
    #[serde(default = "default_callback_path")]
    pub path: String,

    /// Purpose label for routing-token encryption.
    #[serde(default = "default_purpose")]
    pub purpose: String,

    /// Query parameters that are part of the signed URL.
    #[serde(default = "default_signed_params")]
    pub signed_params: Vec<String>,

    /// Truncate routing ids to this many characters before sealing.
    /// Shorter URLs, higher chance of two ids routing to the same place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_id_max_chars: Option<usize>,
}

fn default_base_url() -> String {
    "http://localhost:3978".to_string()
}

fn default_callback_path() -> String {
    "/flow/messages".to_string()
}

fn default_purpose() -> String {
    "flow-callback".to_string()
}

fn default_signed_params() -> Vec<String> {
    DEFAULT_SIGNED_PARAMS.iter().map(|s| s.to_string()).collect()
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_callback_path(),
            purpose: default_purpose(),
            signed_params: default_signed_params(),
            routing_id_max_chars: None,
        }
    }
}

/// What issued URLs grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantConfig {
    #[serde(default = "default_scope")]
    pub scope: String,

    /// `"*"` or a comma-separated list of `read`, `write`, `delete`, `run`.
    #[serde(default = "default_actions")]
    pub actions: String,

    /// Lifetime of issued URLs; absent means they never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

fn default_scope() -> String {
    "/".to_string()
}

fn default_actions() -> String {
    "*".to_string()
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            actions: default_actions(),
            ttl_secs: None,
        }
    }
}

impl GrantConfig {
    pub fn access_scope(&self) -> RootResult<AccessScope> {
        AccessScope::new(self.scope.clone()).map_err(|e| RootError::Config(e.to_string()))
    }

    pub fn access_action(&self) -> RootResult<AccessAction> {
        self.actions
            .parse()
            .map_err(|e| RootError::Config(format!("grant.actions: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationConfig {
    #[serde(default = "default_allowed_versions")]
    pub allowed_versions: Vec<String>,

    #[serde(default)]
    pub clock_skew_secs: u64,
}

fn default_allowed_versions() -> Vec<String> {
    vec![sasgate_access::CURRENT_VERSION.to_string()]
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_versions: default_allowed_versions(),
            clock_skew_secs: 0,
        }
    }
}

/// Names of the environment variables holding key material. The keys
/// themselves never live in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyConfig {
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_secret_key_env: Option<String>,
}

fn default_secret_key_env() -> String {
    "SASGATE_SECRET_KEY".to_string()
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            secret_key_env: default_secret_key_env(),
            previous_secret_key_env: None,
        }
    }
}

/// Top-level configuration for the sasgate binary.
///
/// Loaded from a TOML file (typically `~/.sasgate/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub callback: CallbackConfig,

    #[serde(default)]
    pub grant: GrantConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub keys: KeyConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl GatewayConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: GatewayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        CallbackEndpoint::new(&self.callback.base_url, &self.callback.path)?;
        if self.callback.purpose.trim().is_empty() {
            return Err(RootError::Config("callback.purpose must not be empty".into()));
        }
        if self.callback.routing_id_max_chars == Some(0) {
            return Err(RootError::Config(
                "callback.routing_id_max_chars must be > 0".into(),
            ));
        }
        if let Some(name) = self.callback.signed_params.iter().find(|n| is_sas_param(n)) {
            return Err(RootError::Config(format!(
                "callback.signed_params: '{}' is a reserved SAS parameter",
                name
            )));
        }
        if !self.grant.access_scope()?.permits(&self.callback.path) {
            return Err(RootError::Config(
                "grant.scope does not cover callback.path".into(),
            ));
        }
        if !self.grant.access_action()?.permits(AccessAction::WRITE) {
            return Err(RootError::Config(
                "grant.actions must include write for POST callbacks".into(),
            ));
        }
        match self.grant.ttl_secs {
            Some(0) => return Err(RootError::Config("grant.ttl_secs must be > 0".into())),
            Some(ttl) if ttl > MAX_TTL_SECS => {
                return Err(RootError::Config(format!(
                    "grant.ttl_secs must be at most {}",
                    MAX_TTL_SECS
                )))
            }
            _ => {}
        }
        if self
            .validation
            .allowed_versions
            .iter()
            .all(|v| v.trim().is_empty())
        {
            return Err(RootError::Config(
                "validation.allowed_versions must name at least one version".into(),
            ));
        }
        if self.keys.secret_key_env.trim().is_empty() {
            return Err(RootError::Config("keys.secret_key_env must not be empty".into()));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".sasgate/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 3978);
        assert_eq!(config.callback.path, "/flow/messages");
        assert_eq!(config.callback.signed_params.len(), 4);
        assert_eq!(config.grant.scope, "/");
        assert_eq!(config.grant.actions, "*");
        assert_eq!(config.validation.allowed_versions, vec!["1.0".to_string()]);
        assert_eq!(config.keys.secret_key_env, "SASGATE_SECRET_KEY");
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[server]
bind = "0.0.0.0"
port = 8080

[callback]
base_url = "https://bot.example.com"
path = "/api/servicenow"
routing_id_max_chars = 10

[grant]
scope = "/api/servicenow"
actions = "write"
ttl_secs = 86400

[validation]
allowed_versions = ["1.0", "1.1"]
clock_skew_secs = 30

[keys]
previous_secret_key_env = "SASGATE_PREVIOUS_KEY"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.callback.routing_id_max_chars, Some(10));
        assert_eq!(config.callback.purpose, "flow-callback");
        assert_eq!(config.grant.access_action().unwrap(), AccessAction::WRITE);
        assert_eq!(config.grant.ttl_secs, Some(86400));
        assert_eq!(config.validation.clock_skew_secs, 30);
        assert_eq!(
            config.keys.previous_secret_key_env.as_deref(),
            Some("SASGATE_PREVIOUS_KEY")
        );
        assert_eq!(config.keys.secret_key_env, "SASGATE_SECRET_KEY");
    }

    #[test]
    fn test_config_validate_bad_base_url() {
        let mut config = GatewayConfig::default();
        config.callback.base_url = "https://bot.example.com/api".into();
        assert!(matches!(config.validate(), Err(RootError::Setup(_))));
    }

    #[test]
    fn test_config_validate_bad_callback_path() {
        let mut config = GatewayConfig::default();
        config.callback.path = "flow".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_actions() {
        let mut config = GatewayConfig::default();
        config.grant.actions = "read,fly".into();
        assert!(matches!(config.validate(), Err(RootError::Config(_))));
    }

    #[test]
    fn test_config_validate_zero_ttl() {
        let mut config = GatewayConfig::default();
        config.grant.ttl_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_ttl_upper_bound() {
        let mut config = GatewayConfig::default();
        config.grant.ttl_secs = Some(MAX_TTL_SECS);
        assert!(config.validate().is_ok());

        for ttl in [MAX_TTL_SECS + 1, 10_000_000_000_000, u64::MAX] {
            config.grant.ttl_secs = Some(ttl);
            assert!(matches!(config.validate(), Err(RootError::Config(_))));
        }
    }

    #[test]
    fn test_config_validate_scope_must_cover_callback_path() {
        let mut config = GatewayConfig::default();
        config.grant.scope = "/api/servicenow".into();
        assert!(matches!(config.validate(), Err(RootError::Config(_))));

        config.grant.scope = "/flow".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_actions_must_allow_post() {
        let mut config = GatewayConfig::default();
        config.grant.actions = "read".into();
        assert!(matches!(config.validate(), Err(RootError::Config(_))));

        config.grant.actions = "read,write".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_reserved_signed_param() {
        let mut config = GatewayConfig::default();
        config.callback.signed_params.push("SIG".into());
        assert!(matches!(config.validate(), Err(RootError::Config(_))));
    }

    #[test]
    fn test_config_validate_no_versions() {
        let mut config = GatewayConfig::default();
        config.validation.allowed_versions = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_empty_key_env() {
        let mut config = GatewayConfig::default();
        config.keys.secret_key_env = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = GatewayConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = GatewayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: GatewayConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("sasgate-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = GatewayConfig::default();
        config.callback.base_url = "https://hooks.example.org".into();
        config.grant.ttl_secs = Some(600);

        config.save(&path).unwrap();
        let loaded = GatewayConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join("sasgate-test-config-invalid");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[grant]\nactions = \"nope\"\n").unwrap();

        assert!(GatewayConfig::load(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
