//! Client configuration.
//!
//! Credentials and connection settings come from explicit builder calls, the
//! `BRAVOZERO_*` environment variables, or a JSON file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Error, Result};

pub const ENV_API_KEY: &str = "BRAVOZERO_API_KEY";
pub const ENV_AGENT_ID: &str = "BRAVOZERO_AGENT_ID";
pub const ENV_PRIVATE_KEY_PATH: &str = "BRAVOZERO_PRIVATE_KEY_PATH";
pub const ENV_BASE_URL: &str = "BRAVOZERO_BASE_URL";
pub const ENV_ENVIRONMENT: &str = "BRAVOZERO_ENVIRONMENT";
pub const ENV_TIMEOUT_SECS: &str = "BRAVOZERO_TIMEOUT_SECS";

/// Deployment environment of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
}

impl Environment {
    /// Parse an environment name. Unknown names fall back to production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "staging" => Environment::Staging,
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Default API base URL for the environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.bravozero.ai",
            Environment::Staging => "https://api.staging.bravozero.ai",
            Environment::Development => "http://localhost:8080",
        }
    }
}

/// Client configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key sent as `X-API-Key`
    pub api_key: String,

    /// PERSONA agent identifier
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Ed25519 private key used to sign attestations
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Overrides the environment's base URL
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub environment: Environment,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for idempotent requests on transient failures
    #[serde(default)]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("private_key_path", &self.private_key_path)
            .field("base_url", &self.resolved_base_url())
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with the given API key and defaults elsewhere.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            agent_id: None,
            private_key_path: None,
            base_url: None,
            environment: Environment::default(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }

    /// Build a configuration from the `BRAVOZERO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_API_KEY).ok_or_else(|| {
            Error::Auth(format!(
                "API key required. Set {} environment variable or pass api_key.",
                ENV_API_KEY
            ))
        })?;

        Self::new(api_key).with_defaults_from(lookup)
    }

    /// Fill every field still at its default from the `BRAVOZERO_*`
    /// environment variables. Values set explicitly are kept.
    pub fn with_env_defaults(self) -> Result<Self> {
        self.with_defaults_from(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::with_env_defaults`], reading from `lookup`.
    pub fn with_defaults_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.trim().is_empty() {
            if let Some(api_key) = get(ENV_API_KEY) {
                self.api_key = api_key;
            }
        }
        if self.agent_id.is_none() {
            self.agent_id = get(ENV_AGENT_ID);
        }
        if self.private_key_path.is_none() {
            self.private_key_path = get(ENV_PRIVATE_KEY_PATH).map(PathBuf::from);
        }
        if self.base_url.is_none() {
            self.base_url = get(ENV_BASE_URL);
        }
        if self.environment == Environment::default() {
            if let Some(name) = get(ENV_ENVIRONMENT) {
                self.environment = Environment::from_name(&name);
            }
        }
        if self.timeout_secs == default_timeout_secs() {
            if let Some(raw) = get(ENV_TIMEOUT_SECS) {
                self.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_TIMEOUT_SECS.to_string(),
                    reason: format!("expected whole seconds, got '{}'", raw),
                })?;
            }
        }
        Ok(self)
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_path(path.as_ref());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::from(ConfigError::ParseError(e.to_string())))
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(expand_path(path.as_ref()), contents)?;
        Ok(())
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the request timeout. Stored in whole seconds: the fraction is
    /// dropped and anything below one second becomes one second.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Auth(format!(
                "API key required. Set {} environment variable or pass api_key.",
                ENV_API_KEY
            )));
        }

        if self.private_key_path.is_some() && self.agent_id.is_none() {
            return Err(Error::Auth(
                "Agent ID required to sign attestations".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".to_string(),
                reason: "Timeout must be at least one second".to_string(),
            }
            .into());
        }

        let base_url = self.resolved_base_url();
        let url = reqwest::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }
            .into());
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Private key path with `~` expanded.
    pub fn resolved_private_key_path(&self) -> Option<PathBuf> {
        self.private_key_path.as_deref().map(expand_path)
    }
}

/// Expand tilde (~) in paths.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::new("key");
        assert_eq!(config.resolved_base_url(), "https://api.bravozero.ai");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_urls() {
        assert_eq!(Environment::from_name("staging").base_url(), "https://api.staging.bravozero.ai");
        assert_eq!(Environment::from_name("development").base_url(), "http://localhost:8080");
        assert_eq!(Environment::from_name("mars"), Environment::Production);

        let config = ClientConfig::new("key")
            .with_environment(Environment::Staging)
            .with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.resolved_base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "bz-key"),
            (ENV_AGENT_ID, "agent-7"),
            (ENV_ENVIRONMENT, "development"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "bz-key");
        assert_eq!(config.agent_id.as_deref(), Some("agent-7"));
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.timeout_secs, 5);
        assert!(config.private_key_path.is_none());
    }

    #[test]
    fn test_env_defaults_fill_unset_fields_only() {
        let config = ClientConfig::new("explicit-key")
            .with_base_url("http://127.0.0.1:9000")
            .with_defaults_from(lookup(&[
                (ENV_API_KEY, "env-key"),
                (ENV_AGENT_ID, "agent-env"),
                (ENV_BASE_URL, "https://ignored.example"),
                (ENV_ENVIRONMENT, "staging"),
            ]))
            .unwrap();

        assert_eq!(config.api_key, "explicit-key");
        assert_eq!(config.agent_id.as_deref(), Some("agent-env"));
        assert_eq!(config.resolved_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.environment, Environment::Staging);

        let keyless = ClientConfig::new("")
            .with_agent_id("agent-explicit")
            .with_timeout(Duration::from_secs(5))
            .with_defaults_from(lookup(&[
                (ENV_API_KEY, "env-key"),
                (ENV_AGENT_ID, "agent-env"),
                (ENV_TIMEOUT_SECS, "90"),
            ]))
            .unwrap();
        assert_eq!(keyless.api_key, "env-key");
        assert_eq!(keyless.agent_id.as_deref(), Some("agent-explicit"));
        assert_eq!(keyless.timeout_secs, 5);
    }

    #[test]
    fn test_timeout_truncates_to_whole_seconds() {
        let config = ClientConfig::new("k").with_timeout(Duration::from_millis(2900));
        assert_eq!(config.timeout(), Duration::from_secs(2));

        let config = ClientConfig::new("k").with_timeout(Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_api_key_is_auth_error() {
        match ClientConfig::from_lookup(lookup(&[(ENV_AGENT_ID, "agent-7")])) {
            Err(Error::Auth(msg)) => assert!(msg.contains(ENV_API_KEY)),
            other => panic!("expected auth error, got {:?}", other),
        }
        assert!(matches!(ClientConfig::new("  ").validate(), Err(Error::Auth(_))));
    }

    #[test]
    fn test_bad_timeout_env() {
        let result = ClientConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "k"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]));
        assert!(matches!(result, Err(Error::Config(ConfigError::InvalidValue { .. }))));
    }

    #[test]
    fn test_config_validation() {
        let config = ClientConfig::new("k").with_private_key_path("/tmp/key.pem");
        assert!(matches!(config.validate(), Err(Error::Auth(_))));

        let config = ClientConfig::new("k").with_base_url("ftp://files.example");
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("k");
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bravozero.json");

        let config = ClientConfig::new("k")
            .with_agent_id("agent-1")
            .with_max_retries(2);
        config.save(&path).unwrap();

        let restored = ClientConfig::load(&path).unwrap();
        assert_eq!(restored.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(restored.max_retries, 2);
        assert_eq!(restored.timeout_secs, 30);

        assert!(matches!(
            ClientConfig::load(dir.path().join("missing.json")),
            Err(Error::Config(ConfigError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_expand_path() {
        let plain = expand_path(Path::new("/etc/key.pem"));
        assert_eq!(plain, PathBuf::from("/etc/key.pem"));
    }
}
