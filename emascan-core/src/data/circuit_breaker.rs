//! Circuit breaker for provider bans and rate limits.
//!
//! NSE answers bursts with 403/429. Once the breaker trips, every worker stops
//! calling the provider until the cooldown expires, so one ban does not turn
//! into five hundred failed requests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until the cooldown has elapsed.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Shared across all scan workers; every method takes `&self`.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 15-minute cooldown, trips after 5 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(15 * 60), 5)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a panicking worker must not wedge the breaker for everyone else
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
            tracing::warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker tripped"
            );
        }
    }

    /// Trip immediately (HTTP 403).
    pub fn trip(&self) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
        tracing::warn!(cooldown_secs = self.cooldown.as_secs(), "circuit breaker tripped by ban");
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
