use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Time source used by the poller, so elapsed-time checks and backoff sleeps
/// can be driven without real waits in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual offsets beyond this read as this; `Instant` can't represent `Duration::MAX`
const MAX_VIRTUAL_OFFSET: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Default)]
struct MockClockState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` returns immediately and moves time forward.
///
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct MockClock {
    base: Instant,
    state: Arc<Mutex<MockClockState>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            state: Arc::new(Mutex::new(MockClockState::default())),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.offset = state.offset.saturating_add(duration);
    }

    /// Virtual time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.lock().offset
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockClockState> {
        // A panicking test thread can't leave the state half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        let offset = self.lock().offset.min(MAX_VIRTUAL_OFFSET);
        self.base.checked_add(offset).unwrap_or(self.base)
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.offset = state.offset.saturating_add(duration);
        state.sleeps.push(duration);
    }
}
