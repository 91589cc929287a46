use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::clock::{Clock, TokioClock};
use super::policy::{BackoffStep, RetryPolicy};
use super::probe::{HttpProbe, Probe};
use super::types::{PollReport, ProbeFailure, ProbeTarget, ReadinessError};
use crate::services::metrics::ReadinessMetricsCollector;

/// Polls a target until it answers as ready or the retry policy runs out
pub struct ReadinessPoller<P, C = TokioClock> {
    probe: P,
    clock: C,
    metrics: Option<ReadinessMetricsCollector>,
}

impl ReadinessPoller<HttpProbe, TokioClock> {
    /// HTTP poller on real time
    pub fn http(request_timeout: Duration) -> Result<Self, ReadinessError> {
        Ok(Self::new(HttpProbe::new(request_timeout)?, TokioClock))
    }
}

/// State owned by one `probe_until_ready` call
struct PollSession {
    attempt_count: u32,
    start_time: Instant,
    last_error: Option<ProbeFailure>,
}

impl PollSession {
    fn start(now: Instant) -> Self {
        Self {
            attempt_count: 0,
            start_time: now,
            last_error: None,
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }
}

impl<P: Probe, C: Clock> ReadinessPoller<P, C> {
    pub fn new(probe: P, clock: C) -> Self {
        Self {
            probe,
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ReadinessMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub async fn probe_until_ready(
        &self,
        target: &ProbeTarget,
        policy: &RetryPolicy,
    ) -> Result<PollReport, ReadinessError> {
        self.probe_until_ready_with_cancel(target, policy, &CancellationToken::new())
            .await
    }

    /// Probe `target` until ready, backing off exponentially between failures.
    ///
    /// Cancellation is honoured before each probe and during each backoff
    /// sleep; a probe already in flight runs to completion (it is bounded by
    /// the per-request timeout).
    pub async fn probe_until_ready_with_cancel(
        &self,
        target: &ProbeTarget,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<PollReport, ReadinessError> {
        let span = tracing::info_span!(
            "readiness_poll",
            session_id = %Uuid::new_v4(),
            endpoint = %target,
        );

        // Unbounded or zero-delay policies would hot-loop or never end
        if let Err(e) = policy.validate() {
            span.in_scope(|| error!(error = %e, "Rejected retry policy, no probe issued"));
            return Err(e.into());
        }

        let mut session = PollSession::start(self.clock.now());
        let result = self
            .run(&mut session, target, policy, cancel)
            .instrument(span)
            .await;

        if let Some(metrics) = &self.metrics {
            let label = match &result {
                Ok(_) => "ready",
                Err(ReadinessError::TimeoutExceeded { .. }) => "timed_out",
                Err(ReadinessError::AttemptsExhausted { .. }) => "exhausted",
                Err(ReadinessError::Cancelled { .. }) => "cancelled",
                Err(_) => "error",
            };
            metrics.record_session(label, session.elapsed(self.clock.now()));
        }

        result
    }

    async fn run(
        &self,
        session: &mut PollSession,
        target: &ProbeTarget,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<PollReport, ReadinessError> {
        if policy.max_attempts == Some(0) {
            error!("Attempt cap is zero, no probe issued");
            return Err(ReadinessError::AttemptsExhausted {
                attempts: 0,
                last_error: None,
            });
        }

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(session));
            }

            let probe_start = self.clock.now();
            let result = self.probe.probe(target).await;
            if let Some(metrics) = &self.metrics {
                metrics.record_probe(
                    result.as_ref().map(|_| ()),
                    self.clock.now().saturating_duration_since(probe_start),
                );
            }

            let failure = match result {
                Ok(()) => {
                    let report = PollReport {
                        probes: session.attempt_count + 1,
                        elapsed: session.elapsed(self.clock.now()),
                    };
                    info!(
                        probes = report.probes,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Target is ready"
                    );
                    return Ok(report);
                }
                Err(failure) => failure,
            };

            session.attempt_count += 1;
            let elapsed = session.elapsed(self.clock.now());

            warn!(
                attempt = session.attempt_count,
                kind = failure.kind(),
                error = %failure,
                "Probe failed"
            );
            session.last_error = Some(failure);

            let delay = match policy.next_step(session.attempt_count, elapsed) {
                BackoffStep::Wait(delay) => delay,
                BackoffStep::TimedOut => {
                    error!(
                        attempt = session.attempt_count,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Maximum total timeout exceeded"
                    );
                    return Err(ReadinessError::TimeoutExceeded {
                        attempts: session.attempt_count,
                        elapsed,
                        last_error: session.last_error.take(),
                    });
                }
                BackoffStep::Exhausted => {
                    error!(attempt = session.attempt_count, "Probe attempts exhausted");
                    return Err(ReadinessError::AttemptsExhausted {
                        attempts: session.attempt_count,
                        last_error: session.last_error.take(),
                    });
                }
            };

            if cancel.is_cancelled() {
                return Err(self.cancelled(session));
            }

            info!(
                attempt = session.attempt_count,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(session)),
                _ = self.clock.sleep(delay) => {}
            }
        }
    }

    fn cancelled(&self, session: &PollSession) -> ReadinessError {
        debug!(attempt = session.attempt_count, "Readiness poll cancelled");
        ReadinessError::Cancelled {
            attempts: session.attempt_count,
        }
    }
}
