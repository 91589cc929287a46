use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::clock::Clock;
use super::poller::ReadinessPoller;
use super::policy::RetryPolicy;
use super::probe::Probe;
use super::types::{PollReport, ProbeTarget, ReadinessError};

#[derive(Debug, thiserror::Error)]
pub enum GateError<E> {
    /// Readiness never reached; the dependent step was not started
    #[error("Target not ready: {0}")]
    NotReady(#[source] ReadinessError),
    #[error("Dependent step failed: {0}")]
    Dependent(#[source] E),
}

/// Wait for `target` to be ready, then run `dependent` with the poll report.
///
/// A readiness failure stops the chain: `dependent` is never invoked.
pub async fn wait_then<P, C, F, Fut, T, E>(
    poller: &ReadinessPoller<P, C>,
    target: &ProbeTarget,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    dependent: F,
) -> Result<T, GateError<E>>
where
    P: Probe,
    C: Clock,
    F: FnOnce(PollReport) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let report = match poller
        .probe_until_ready_with_cancel(target, policy, cancel)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(endpoint = %target, error = %e, "Dependent step blocked, target not ready");
            return Err(GateError::NotReady(e));
        }
    };

    info!(endpoint = %target, probes = report.probes, "Target ready, starting dependent step");
    dependent(report).await.map_err(GateError::Dependent)
}
