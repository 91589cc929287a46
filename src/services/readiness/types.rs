use reqwest::{StatusCode, Url};
use std::fmt;
use std::time::Duration;

use super::policy::PolicyError;

/// Endpoint polled for readiness, e.g. `https://cluster.lab.example.com:6443`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    url: Url,
}

impl ProbeTarget {
    pub fn parse(raw: &str) -> Result<Self, ReadinessError> {
        let url = Url::parse(raw)
            .map_err(|e| ReadinessError::InvalidTarget(format!("{}: {}", raw, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ReadinessError::InvalidTarget(format!(
                    "{}: unsupported scheme '{}'",
                    raw, other
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ReadinessError::InvalidTarget(format!("{}: missing host", raw)));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// A probe response counts as ready if it is 2xx, or 401 because the probe
/// carries no credentials and an auth challenge proves the server is serving.
pub fn is_ready_status(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::UNAUTHORIZED
}

/// Why a single probe attempt failed. The poller retries all of them alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    UnexpectedStatus(u16),
    Timeout,
    Connect(String),
    Transport(String),
}

impl ProbeFailure {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnexpectedStatus(_) => "status",
            Self::Timeout => "timeout",
            Self::Connect(_) => "connect",
            Self::Transport(_) => "transport",
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedStatus(code) => write!(f, "unexpected status {}", code),
            Self::Timeout => write!(f, "request timed out"),
            Self::Connect(e) => write!(f, "connection failed: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Summary of a session that reached readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Probes issued, including the successful one
    pub probes: u32,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("Maximum total timeout exceeded after {attempts} attempts ({elapsed:?} elapsed)")]
    TimeoutExceeded {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<ProbeFailure>,
    },
    #[error("Probe attempts exhausted after {attempts} attempts")]
    AttemptsExhausted {
        attempts: u32,
        last_error: Option<ProbeFailure>,
    },
    #[error("Readiness poll cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
    #[error("Invalid probe target: {0}")]
    InvalidTarget(String),
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(#[from] PolicyError),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl ReadinessError {
    /// Most recent probe failure, if the session got that far
    pub fn last_error(&self) -> Option<&ProbeFailure> {
        match self {
            Self::TimeoutExceeded { last_error, .. } | Self::AttemptsExhausted { last_error, .. } => {
                last_error.as_ref()
            }
            _ => None,
        }
    }
}
