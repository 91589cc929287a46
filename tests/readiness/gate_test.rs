use crate::common::TestServer;
use cluster_readiness::services::readiness::{
    wait_then, GateError, HttpProbe, MockClock, ReadinessError, ReadinessPoller, RetryPolicy,
    DEFAULT_REQUEST_TIMEOUT,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// INTEGRATION TESTS - READINESS GATE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("apply failed")]
struct ApplyError;

#[tokio::test]
async fn test_dependent_sees_ready_server() {
    let server = TestServer::start(vec![503, 401]).await;
    let poller = ReadinessPoller::new(HttpProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap(), MockClock::new());
    let hits_at_start = AtomicU32::new(0);
    let (hits, srv) = (&hits_at_start, &server);

    let result = wait_then(
        &poller,
        &server.target(),
        &RetryPolicy::default(),
        &CancellationToken::new(),
        |report| async move {
            hits.store(srv.hits(), Ordering::SeqCst);
            Ok::<_, ApplyError>(report)
        },
    )
    .await;

    let report = result.unwrap();
    assert_eq!(report.probes, 2);
    assert_eq!(hits_at_start.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dependent_chain_stops_on_exhaustion() {
    let server = TestServer::start(vec![500]).await;
    let poller = ReadinessPoller::new(HttpProbe::new(DEFAULT_REQUEST_TIMEOUT).unwrap(), MockClock::new());
    let policy = RetryPolicy::default()
        .with_max_attempts(3)
        .with_max_elapsed(Duration::from_secs(600));
    let ran = AtomicU32::new(0);

    let result = wait_then(&poller, &server.target(), &policy, &CancellationToken::new(), |_| async {
        ran.fetch_add(1, Ordering::SeqCst);
        Ok::<_, ApplyError>(())
    })
    .await;

    assert!(matches!(
        result,
        Err(GateError::NotReady(ReadinessError::AttemptsExhausted { attempts: 3, .. }))
    ));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(server.hits(), 3);
}
