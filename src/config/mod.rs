pub mod environment;
pub mod probe_config;

pub use environment::Config;
pub use probe_config::{load_probe_config, ProbeRequestConfig, RetryPolicyConfig};

use crate::services::readiness::{PolicyError, ReadinessError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Target(#[from] ReadinessError),
    #[error("Invalid retry policy: {0}")]
    Policy(#[from] PolicyError),
}
