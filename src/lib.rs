//! Waits for a freshly bootstrapped endpoint, typically a cluster API server,
//! to start answering before dependent provisioning steps run.

pub mod config;
pub mod services;

pub use services::readiness::{
    wait_then, GateError, PollReport, ProbeTarget, ReadinessError, ReadinessPoller, RetryPolicy,
};
