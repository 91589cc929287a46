use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

const NAMESPACE: &str = "readiness";

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("Metrics output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Metrics for readiness polling
pub struct MetricsRegistry {
    registry: Registry,

    // Probe Metrics
    pub probe_attempts_total: CounterVec,
    pub probe_duration_seconds: Histogram,

    // Session Metrics
    pub sessions_total: CounterVec,
    pub session_duration_seconds: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Result<Arc<Self>, MetricsError> {
        let registry = Registry::new();

        let probe_attempts_total = CounterVec::new(
            Opts::new("probe_attempts_total", "Probe attempts by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(probe_attempts_total.clone()))?;

        let probe_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("probe_duration_seconds", "Duration of a single probe request")
                .namespace(NAMESPACE)
                .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let sessions_total = CounterVec::new(
            Opts::new("sessions_total", "Readiness sessions by terminal result")
                .namespace(NAMESPACE),
            &["result"],
        )?;
        registry.register(Box::new(sessions_total.clone()))?;

        let session_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("session_duration_seconds", "Wall-clock duration of a readiness session")
                .namespace(NAMESPACE)
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]),
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        Ok(Arc::new(Self {
            registry,
            probe_attempts_total,
            probe_duration_seconds,
            sessions_total,
            session_duration_seconds,
        }))
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}
