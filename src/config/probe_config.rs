use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;
use crate::services::readiness::{ProbeTarget, RetryPolicy, DEFAULT_REQUEST_TIMEOUT};

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
}

/// Readiness request as written in a JSON config file
///
/// ```json
/// { "url": "https://cluster.${CLUSTER_DOMAIN}:6443", "retry": { "max_elapsed_ms": 1800000 } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRequestConfig {
    pub url: String,
    #[serde(default)]
    pub retry: RetryPolicyConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Partial retry settings; missing fields take the defaults, `null` means unbounded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: Option<u64>,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

fn default_max_elapsed_ms() -> Option<u64> {
    Some(30_000)
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            max_elapsed_ms: default_max_elapsed_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: None,
        }
    }
}

impl From<&RetryPolicyConfig> for RetryPolicy {
    fn from(config: &RetryPolicyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_elapsed: config.max_elapsed_ms.map(Duration::from_millis),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}

impl ProbeRequestConfig {
    pub fn target(&self) -> Result<ProbeTarget, ConfigError> {
        Ok(ProbeTarget::parse(&self.url)?)
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Load a probe request from a JSON file with environment variable substitution
pub fn load_probe_config(path: &str) -> Result<ProbeRequestConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    parse_probe_config(&content)
}

pub fn parse_probe_config(content: &str) -> Result<ProbeRequestConfig, ConfigError> {
    let content = substitute_env_vars(content);
    Ok(serde_json::from_str(&content)?)
}

/// Substitute ${VAR_NAME} with environment variable values; unknown names are left as-is
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
