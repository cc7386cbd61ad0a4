//! Upstream Circuit Breaker
//!
//! Fails fast against a persistently failing explorer API instead of
//! letting a tight poll loop burn its tick on timeouts. Closed passes
//! calls through; `threshold` consecutive failures open the circuit and
//! every call is rejected without a network attempt until `cooldown`
//! elapses, after which a single half-open trial decides between
//! closing again and re-opening.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CircuitBreakerError {
    #[error("circuit open, retry in {0:?}")]
    Open(Duration),
}

/// Breaker state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// One trial call decides the next state
    HalfOpen,
}

impl CircuitState {
    pub fn description(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed - calls pass through",
            CircuitState::Open => "OPEN - calls rejected",
            CircuitState::HalfOpen => "half-open - trial call in flight",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Per-upstream-API circuit breaker, shared by the collectors hitting it
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub const DEFAULT_THRESHOLD: u32 = 5;
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Self::DEFAULT_COOLDOWN)
    }

    /// Gate a call. Ok means the caller may attempt the upstream call;
    /// while open and cooling down the rejection carries the remaining
    /// wait. An elapsed cooldown moves the breaker to half-open and
    /// admits the trial call.
    pub async fn try_acquire(&self) -> Result<(), CircuitBreakerError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.cooldown {
                    tracing::info!("circuit breaker half-open, admitting trial call");
                    inner.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(CircuitBreakerError::Open(self.cooldown - elapsed))
                }
            }
        }
    }

    /// Record a successful call: closes a half-open breaker and clears
    /// the failure count.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == CircuitState::HalfOpen {
            tracing::info!("circuit breaker closed after successful trial");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    /// Record a failed call: re-opens immediately from half-open, opens
    /// from closed once the failure threshold is reached.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!("circuit breaker re-opened after failed trial");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.threshold => {
                tracing::warn!(
                    failures = inner.failure_count,
                    threshold = self.threshold,
                    "circuit breaker OPEN"
                );
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn failure_count(&self) -> u32 {
        self.inner.lock().await.failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let breaker = quick_breaker();
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_opens_at_threshold() {
        let breaker = quick_breaker();
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(matches!(
            breaker.try_acquire().await,
            Err(CircuitBreakerError::Open(_))
        ));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = quick_breaker();
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        assert_eq!(breaker.failure_count().await, 0);

        // Two more failures do not reach the threshold again
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_cooldown() {
        let breaker = quick_breaker();
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert!(breaker.try_acquire().await.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.try_acquire().await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = quick_breaker();
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        breaker.try_acquire().await.unwrap();

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = quick_breaker();
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        breaker.try_acquire().await.unwrap();

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(breaker.try_acquire().await.is_err());
    }

    #[test]
    fn test_state_descriptions() {
        assert!(CircuitState::Open.description().contains("OPEN"));
        assert!(CircuitState::Closed.description().contains("closed"));
    }
}
