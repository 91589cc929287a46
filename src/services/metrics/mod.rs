pub mod registry;
pub mod collectors;

pub use registry::{MetricsError, MetricsRegistry};
pub use collectors::ReadinessMetricsCollector;
