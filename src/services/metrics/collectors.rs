use std::sync::Arc;
use std::time::Duration;

use super::MetricsRegistry;
use crate::services::readiness::ProbeFailure;

/// Collector for readiness probe and session metrics
#[derive(Debug, Clone)]
pub struct ReadinessMetricsCollector {
    metrics: Arc<MetricsRegistry>,
}

impl ReadinessMetricsCollector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    pub fn record_probe(&self, result: Result<(), &ProbeFailure>, duration: Duration) {
        let outcome = match result {
            Ok(()) => "ready",
            Err(failure) => failure.kind(),
        };

        self.metrics
            .probe_attempts_total
            .with_label_values(&[outcome])
            .inc();

        self.metrics
            .probe_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// `result` is one of `ready`, `timed_out`, `exhausted`, `cancelled`
    pub fn record_session(&self, result: &str, duration: Duration) {
        self.metrics
            .sessions_total
            .with_label_values(&[result])
            .inc();

        self.metrics
            .session_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}
