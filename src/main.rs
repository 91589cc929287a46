use cluster_readiness::config::Config;
use cluster_readiness::services::metrics::{MetricsRegistry, ReadinessMetricsCollector};
use cluster_readiness::services::readiness::{
    backoff_schedule, wait_then, GateError, HttpProbe, ReadinessPoller,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_NOT_READY: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// Usage: cluster-readiness [--] [COMMAND [ARGS...]]
///
/// Polls READINESS_TARGET_URL until it is ready, then runs COMMAND if given.
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_readiness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let metrics = match MetricsRegistry::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create metrics registry");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let poller = match ReadinessPoller::http(config.request_timeout) {
        Ok(poller) => poller.with_metrics(ReadinessMetricsCollector::new(metrics.clone())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling readiness poll");
                cancel.cancel();
            }
        }
    });

    let command: Vec<String> = std::env::args()
        .skip(1)
        .skip_while(|arg| arg == "--")
        .collect();

    tracing::info!(
        endpoint = %config.target,
        max_attempts = ?config.policy.max_attempts,
        max_elapsed = ?config.policy.max_elapsed,
        first_delays = ?backoff_schedule(&config.policy, 4),
        "Waiting for target to become ready"
    );

    let code = run(&poller, &config, &cancel, &command).await;
    write_metrics(&config, &metrics);
    code
}

async fn run(
    poller: &ReadinessPoller<HttpProbe>,
    config: &Config,
    cancel: &CancellationToken,
    command: &[String],
) -> ExitCode {
    let Some((program, args)) = command.split_first() else {
        return match poller
            .probe_until_ready_with_cancel(&config.target, &config.policy, cancel)
            .await
        {
            Ok(_) => ExitCode::SUCCESS,
            Err(_) => ExitCode::from(EXIT_NOT_READY),
        };
    };

    let result = wait_then(poller, &config.target, &config.policy, cancel, |_| async {
        tracing::info!(program = %program, "Running dependent command");
        Command::new(program).args(args).status().await
    })
    .await;

    match result {
        Ok(status) => match status.code() {
            Some(0) => ExitCode::SUCCESS,
            Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_NOT_READY)),
            None => {
                tracing::error!("Dependent command terminated by signal");
                ExitCode::from(EXIT_NOT_READY)
            }
        },
        Err(GateError::NotReady(_)) => ExitCode::from(EXIT_NOT_READY),
        Err(GateError::Dependent(e)) => {
            tracing::error!(program = %program, error = %e, "Failed to start dependent command");
            ExitCode::from(EXIT_NOT_READY)
        }
    }
}

fn write_metrics(config: &Config, metrics: &Arc<MetricsRegistry>) {
    let Some(path) = &config.metrics_file else {
        return;
    };

    match metrics.export() {
        Ok(text) => {
            if let Err(e) = std::fs::write(path, text) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics file");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to export metrics"),
    }
}
