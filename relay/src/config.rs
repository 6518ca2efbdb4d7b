use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::RelayError;

/// A single Azure OpenAI backend serving one model.
#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    /// Resource endpoint such as `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Key sent to the backend in the `api-key` header.
    pub api_key: String,
    /// Deployment name the model is published under.
    #[serde(default)]
    pub deployment: String,
    /// Azure API version query parameter. Falls back to a stable default.
    #[serde(default)]
    pub api_version: Option<String>,
}

pub const DEFAULT_API_VERSION: &str = "2024-02-01";

impl Backend {
    /// The `api-version` to use for this backend.
    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }
}

/// Backends configured for one model name.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backends: Vec<Backend>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

/// Failover policy for upstream requests.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Upper bound on backends tried for a single request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

/// A named API key accepted by the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub keys: Vec<ApiKey>,
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
}

/// Load a [`Config`] from a TOML file.
pub async fn load<P: AsRef<Path>>(path: P) -> Result<Config, RelayError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(toml::from_str(&text)?)
}

impl Config {
    /// Backends configured for `model`, or an empty slice.
    pub fn backends_for_model(&self, model: &str) -> &[Backend] {
        self.models
            .get(model)
            .map(|m| m.backends.as_slice())
            .unwrap_or(&[])
    }

    /// Auth is only in effect when enabled and at least one key exists.
    pub fn is_auth_enabled(&self) -> bool {
        self.auth.enabled && !self.auth.keys.is_empty()
    }

    /// Validate a presented API key, returning the key's configured name.
    ///
    /// When auth is disabled every key (including none) is accepted and the
    /// name is empty. Comparison runs in constant time per candidate key.
    pub fn validate_api_key(&self, presented: &str) -> Option<&str> {
        if !self.is_auth_enabled() {
            return Some("");
        }
        self.auth
            .keys
            .iter()
            .find(|k| constant_time_eq(k.key.as_bytes(), presented.as_bytes()))
            .map(|k| k.name.as_str())
    }
}

/// Byte-wise comparison that does not short-circuit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
