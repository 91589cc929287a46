use crate::common::{refused_target, test_target, ScriptedProbe, TestServer};
use cluster_readiness::services::metrics::{MetricsRegistry, ReadinessMetricsCollector};
use cluster_readiness::services::readiness::{
    HttpProbe, MockClock, ProbeFailure, ReadinessError, ReadinessPoller, RetryPolicy, TokioClock,
    DEFAULT_REQUEST_TIMEOUT,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// INTEGRATION TESTS - READINESS POLLER
// =============================================================================

fn failing() -> Result<(), ProbeFailure> {
    Err(ProbeFailure::Connect("connection refused".to_string()))
}

#[tokio::test]
async fn test_unauthorized_is_ready_on_first_attempt() {
    let server = TestServer::start(vec![401]).await;
    let clock = MockClock::new();
    let poller = ReadinessPoller::new(HttpProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap(), clock.clone());

    let report = poller
        .probe_until_ready(&server.target(), &RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(report.probes, 1);
    assert_eq!(server.hits(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_repeated_calls_against_ready_endpoint() {
    let server = TestServer::start(vec![200]).await;
    let poller = ReadinessPoller::new(HttpProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap(), MockClock::new());
    let target = server.target();
    let policy = RetryPolicy::default();

    let first = poller.probe_until_ready(&target, &policy).await.unwrap();
    let second = poller.probe_until_ready(&target, &policy).await.unwrap();

    assert_eq!(first.probes, 1);
    assert_eq!(second.probes, 1);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_becomes_ready_after_unavailable() {
    let server = TestServer::start(vec![503, 503, 401]).await;
    let clock = MockClock::new();
    let poller = ReadinessPoller::new(HttpProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap(), clock.clone());

    let report = poller
        .probe_until_ready(&server.target(), &RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(report.probes, 3);
    assert_eq!(server.hits(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test]
async fn test_five_second_budget_clamps_final_wait() {
    let clock = MockClock::new();
    let probe = ScriptedProbe::always(failing());
    let calls = probe.calls();
    let poller = ReadinessPoller::new(probe, clock.clone());
    let policy = RetryPolicy::default().with_max_elapsed(Duration::from_secs(5));

    let err = poller.probe_until_ready(&test_target(), &policy).await.unwrap_err();

    match err {
        ReadinessError::TimeoutExceeded { attempts, elapsed, last_error } => {
            assert_eq!(attempts, 4);
            assert_eq!(elapsed, Duration::from_secs(5));
            assert_eq!(last_error, Some(failing().unwrap_err()));
        }
        other => panic!("expected TimeoutExceeded, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // 1s, 2s, then 4s clamped to the 2s left
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_attempt_cap_without_budget() {
    let clock = MockClock::new();
    let probe = ScriptedProbe::always(failing());
    let calls = probe.calls();
    let poller = ReadinessPoller::new(probe, clock.clone());
    let policy = RetryPolicy::default().unbounded_elapsed().with_max_attempts(5);

    let err = poller.probe_until_ready(&test_target(), &policy).await.unwrap_err();

    assert!(matches!(err, ReadinessError::AttemptsExhausted { attempts: 5, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(clock.sleeps().len(), 4);
}

#[tokio::test]
async fn test_budget_wins_over_attempt_cap_with_slow_probes() {
    let clock = MockClock::new();
    let probe = ScriptedProbe::always(Err(ProbeFailure::Timeout))
        .with_latency(clock.clone(), Duration::from_secs(2));
    let calls = probe.calls();
    let poller = ReadinessPoller::new(probe, clock.clone());
    let budget = Duration::from_secs(5);
    let policy = RetryPolicy::default().with_max_attempts(100).with_max_elapsed(budget);

    let err = poller.probe_until_ready(&test_target(), &policy).await.unwrap_err();

    assert!(matches!(err, ReadinessError::TimeoutExceeded { .. }));
    assert!(calls.load(Ordering::SeqCst) < 100);

    // The last sleep ends exactly at the budget; only the probe after it runs past
    let slept: Duration = clock.sleeps().iter().sum();
    let probes = calls.load(Ordering::SeqCst);
    let time_before_last_probe = slept + Duration::from_secs(2) * (probes - 1);
    assert!(time_before_last_probe <= budget);
}

#[tokio::test]
async fn test_zero_budget_fails_fast() {
    let clock = MockClock::new();
    let probe = ScriptedProbe::always(failing());
    let calls = probe.calls();
    let poller = ReadinessPoller::new(probe, clock.clone());
    let policy = RetryPolicy::default().with_max_elapsed(Duration::ZERO);

    let err = poller.probe_until_ready(&test_target(), &policy).await.unwrap_err();

    assert!(matches!(err, ReadinessError::TimeoutExceeded { attempts: 1, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_cancel_during_backoff_stops_before_next_probe() {
    let probe = ScriptedProbe::always(failing());
    let calls = probe.calls();
    let poller = ReadinessPoller::new(probe, TokioClock);
    let policy = RetryPolicy::default()
        .with_initial_delay(Duration::from_secs(60))
        .with_max_elapsed(Duration::from_secs(600));
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        poller.probe_until_ready_with_cancel(&test_target(), &policy, &cancel),
    )
    .await
    .expect("cancellation should end the session promptly");

    assert!(matches!(result, Err(ReadinessError::Cancelled { attempts: 1 })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refused_endpoint_times_out_on_real_clock() {
    let poller = ReadinessPoller::http(Duration::from_secs(1)).unwrap();
    let policy = RetryPolicy::default()
        .with_initial_delay(Duration::from_millis(50))
        .with_max_elapsed(Duration::from_millis(400));

    let err = poller
        .probe_until_ready(&refused_target(), &policy)
        .await
        .unwrap_err();

    assert!(matches!(err, ReadinessError::TimeoutExceeded { .. }));
    assert!(matches!(err.last_error(), Some(ProbeFailure::Connect(_))));
}

#[tokio::test]
async fn test_session_metrics_recorded() {
    let metrics = MetricsRegistry::new().unwrap();
    let poller = ReadinessPoller::new(ScriptedProbe::new(vec![failing()], Ok(())), MockClock::new())
        .with_metrics(ReadinessMetricsCollector::new(metrics.clone()));

    poller
        .probe_until_ready(&test_target(), &RetryPolicy::default())
        .await
        .unwrap();

    let output = metrics.export().unwrap();
    assert!(output.contains("readiness_sessions_total{result=\"ready\"} 1"));
    assert!(output.contains("readiness_probe_attempts_total{outcome=\"connect\"} 1"));
    assert!(output.contains("readiness_probe_attempts_total{outcome=\"ready\"} 1"));
}
