use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::probe_config::load_probe_config;
use super::ConfigError;
use crate::services::readiness::{ProbeTarget, RetryPolicy, DEFAULT_REQUEST_TIMEOUT};

const UNBOUNDED: &str = "unbounded";

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub target: ProbeTarget,
    pub policy: RetryPolicy,
    pub request_timeout: Duration,
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `READINESS_CONFIG_FILE` wins over
    /// the individual variables when set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metrics_file = lookup("READINESS_METRICS_FILE").map(PathBuf::from);

        let (target, policy, request_timeout) = match lookup("READINESS_CONFIG_FILE") {
            Some(path) => {
                let file = load_probe_config(&path)?;
                (file.target()?, file.policy(), file.request_timeout())
            }
            None => {
                let url = lookup("READINESS_TARGET_URL")
                    .ok_or(ConfigError::Missing("READINESS_TARGET_URL"))?;
                let target = ProbeTarget::parse(&url)?;

                let defaults = RetryPolicy::default();
                let policy = RetryPolicy {
                    max_attempts: parse_bound(&lookup, "READINESS_MAX_ATTEMPTS", defaults.max_attempts)?,
                    max_elapsed: parse_bound(
                        &lookup,
                        "READINESS_MAX_ELAPSED_SECS",
                        defaults.max_elapsed.map(|d| d.as_secs()),
                    )?
                    .map(Duration::from_secs),
                    initial_delay: parse_or(&lookup, "READINESS_INITIAL_DELAY_MS", 1_000)
                        .map(Duration::from_millis)?,
                    max_delay: parse_opt::<u64, _>(&lookup, "READINESS_MAX_DELAY_MS")?
                        .map(Duration::from_millis),
                };

                let request_timeout = parse_or(
                    &lookup,
                    "READINESS_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT.as_secs(),
                )
                .map(Duration::from_secs)?;

                (target, policy, request_timeout)
            }
        };

        policy.validate()?;

        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "READINESS_REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            target,
            policy,
            request_timeout,
            metrics_file,
        })
    }
}

fn parse_opt<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, name)?.unwrap_or(default))
}

/// Integer limit that also accepts `unbounded`; unset keeps `default`
fn parse_bound<T, F>(lookup: &F, name: &'static str, default: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().eq_ignore_ascii_case(UNBOUNDED) => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
