use std::time::Duration;

/// Retry policy for a readiness session
///
/// At least one of `max_attempts` / `max_elapsed` should be bounded, otherwise a
/// target that never comes up is polled until the caller cancels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Hard cap on probe attempts (`None` = unbounded)
    pub max_attempts: Option<u32>,
    /// Wall-clock budget for the whole session (`None` = unbounded)
    pub max_elapsed: Option<Duration>,
    /// Base backoff unit
    pub initial_delay: Duration,
    /// Optional cap on a single wait
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,                            // unbounded
            max_elapsed: Some(Duration::from_secs(30)),    // 30 seconds
            initial_delay: Duration::from_secs(1),         // 1 second
            max_delay: None,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    Wait(Duration),
    TimedOut,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Retry policy has neither an attempt cap nor a time budget")]
    Unbounded,
    #[error("Initial backoff delay must be greater than zero")]
    ZeroInitialDelay,
}

impl RetryPolicy {
    /// Budget suited to a first-time cluster bootstrap
    pub fn cluster_bootstrap() -> Self {
        Self::default().with_max_elapsed(Duration::from_secs(30 * 60))
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = Some(budget);
        self
    }

    pub fn unbounded_elapsed(mut self) -> Self {
        self.max_elapsed = None;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Delay before the next attempt, ignoring the time budget.
    /// Formula: initial_delay × 2^(attempt_count - 1), saturating at `Duration::MAX`
    pub fn backoff_delay(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.saturating_sub(1);
        let delay = 2u32
            .checked_pow(exponent)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Decide the next step after `attempt_count` failed attempts with
    /// `elapsed` time since the session started.
    ///
    /// The time budget is checked first so a session never sleeps once it is
    /// spent, then the attempt cap, then the delay is clamped to the budget left.
    pub fn next_step(&self, attempt_count: u32, elapsed: Duration) -> BackoffStep {
        if let Some(budget) = self.max_elapsed {
            if elapsed >= budget {
                return BackoffStep::TimedOut;
            }
        }

        if let Some(max) = self.max_attempts {
            if attempt_count >= max {
                return BackoffStep::Exhausted;
            }
        }

        let delay = self.backoff_delay(attempt_count);
        let delay = match self.max_elapsed {
            Some(budget) => delay.min(budget - elapsed),
            None => delay,
        };

        BackoffStep::Wait(delay)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts.is_none() && self.max_elapsed.is_none() {
            return Err(PolicyError::Unbounded);
        }
        if self.initial_delay.is_zero() {
            return Err(PolicyError::ZeroInitialDelay);
        }
        Ok(())
    }
}

/// Unclamped delay schedule for the first `attempts` failures
pub fn backoff_schedule(policy: &RetryPolicy, attempts: u32) -> Vec<Duration> {
    (1..=attempts).map(|n| policy.backoff_delay(n)).collect()
}
