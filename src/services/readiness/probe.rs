use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::{is_ready_status, ProbeFailure, ProbeTarget, ReadinessError};

/// Per-request timeout so a hung attempt can't eat the session budget
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A single readiness check against a target
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &ProbeTarget) -> Result<(), ProbeFailure>;
}

/// Credential-less HTTP GET probe
///
/// The client accepts self-signed certificates because a freshly bootstrapped
/// cluster serves a CA the caller doesn't trust yet. This client is private
/// to the probe and is never handed out for other requests.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    request_timeout: Duration,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self, ReadinessError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            // no idle pooling: each probe's connection is closed once it's done
            .pool_max_idle_per_host(0)
            .user_agent(concat!("cluster-readiness/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &ProbeTarget) -> Result<(), ProbeFailure> {
        let response = self
            .client
            .get(target.url().clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        // body is never read; dropping the response releases the connection
        drop(response);

        if is_ready_status(status) {
            Ok(())
        } else {
            Err(ProbeFailure::UnexpectedStatus(status.as_u16()))
        }
    }
}

fn classify_error(e: reqwest::Error) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout
    } else if e.is_connect() {
        ProbeFailure::Connect(e.to_string())
    } else {
        ProbeFailure::Transport(e.to_string())
    }
}
