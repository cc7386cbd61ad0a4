//! Adaptive Rate Limiter
//!
//! Self-tunes outbound call pacing against an upstream explorer API from
//! latency and error feedback. Explorer providers throttle unpredictably,
//! so instead of a fixed rate the limiter raises the rate while the
//! upstream answers fast and backs off multiplicatively on slowness or
//! errors. One instance per upstream API, shared by every collector that
//! hits it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tuning parameters for the feedback loop
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Starting rate in calls per second
    pub initial_rate: f64,
    /// Floor the rate never drops below
    pub min_rate: f64,
    /// Cap the rate never exceeds
    pub max_rate: f64,
    /// Bounded latency window size
    pub window_size: usize,
    /// Samples required before the loop adjusts anything
    pub min_samples: usize,
    /// Successes in a row required before a raise
    pub min_success_streak: u32,
    /// Average latency below this is considered fast
    pub fast_latency: Duration,
    /// Average latency above this is considered slow
    pub slow_latency: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            initial_rate: 4.0,
            min_rate: 0.5,
            max_rate: 10.0,
            window_size: 20,
            min_samples: 5,
            min_success_streak: 5,
            fast_latency: Duration::from_millis(300),
            slow_latency: Duration::from_millis(1200),
        }
    }
}

/// Multiplicative bonus applied on a sustained fast streak
const RAISE_FACTOR: f64 = 1.1;
/// Shrink applied when average latency drifts above the slow threshold
const SLOWDOWN_FACTOR: f64 = 0.85;
/// Shrink applied on an isolated error
const ERROR_FACTOR: f64 = 0.7;
/// Shrink applied once the error streak reaches HARD_ERROR_STREAK
const HARD_ERROR_FACTOR: f64 = 0.5;
const HARD_ERROR_STREAK: u32 = 3;

#[derive(Debug)]
struct LimiterState {
    current_rate: f64,
    recent_latencies: VecDeque<Duration>,
    consecutive_errors: u32,
    consecutive_successes: u32,
    /// Time at which the most recently admitted call was scheduled
    last_scheduled: Option<Instant>,
}

/// Feedback-tuned pacing gate for one upstream API
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
}

impl AdaptiveRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let current_rate = config
            .initial_rate
            .clamp(config.min_rate, config.max_rate);
        Self {
            state: Mutex::new(LimiterState {
                current_rate,
                recent_latencies: VecDeque::with_capacity(config.window_size),
                consecutive_errors: 0,
                consecutive_successes: 0,
                last_scheduled: None,
            }),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Suspend until the minimum inter-call interval implied by the
    /// current rate has elapsed since the previous acquire.
    pub async fn acquire(&self) {
        let scheduled = {
            let mut state = self.state.lock().await;
            let interval = Duration::from_secs_f64(1.0 / state.current_rate);
            let now = Instant::now();
            let slot = match state.last_scheduled {
                Some(last) if last + interval > now => last + interval,
                _ => now,
            };
            state.last_scheduled = Some(slot);
            slot
        };
        // Lock released before waiting so concurrent callers queue up
        // behind their own slots instead of behind the sleep.
        tokio::time::sleep_until(tokio::time::Instant::from_std(scheduled)).await;
    }

    /// Record a successful upstream call and its observed latency
    pub async fn record_success(&self, latency: Duration) {
        let mut state = self.state.lock().await;
        state.recent_latencies.push_back(latency);
        while state.recent_latencies.len() > self.config.window_size {
            state.recent_latencies.pop_front();
        }
        state.consecutive_errors = 0;
        state.consecutive_successes += 1;

        if state.recent_latencies.len() < self.config.min_samples {
            return;
        }

        let avg = average(&state.recent_latencies);
        if state.consecutive_successes >= self.config.min_success_streak
            && avg < self.config.fast_latency
        {
            let raised = (state.current_rate * RAISE_FACTOR).min(self.config.max_rate);
            if raised > state.current_rate {
                tracing::debug!(
                    rate = raised,
                    avg_ms = avg.as_millis() as u64,
                    "rate limiter raising rate"
                );
            }
            state.current_rate = raised;
        } else if avg > self.config.slow_latency {
            let lowered = (state.current_rate * SLOWDOWN_FACTOR).max(self.config.min_rate);
            tracing::debug!(
                rate = lowered,
                avg_ms = avg.as_millis() as u64,
                "rate limiter lowering rate on slow latency"
            );
            state.current_rate = lowered;
        }
    }

    /// Record a failed upstream call; repeated failures shrink harder
    pub async fn record_error(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_successes = 0;
        state.consecutive_errors += 1;
        let factor = if state.consecutive_errors >= HARD_ERROR_STREAK {
            HARD_ERROR_FACTOR
        } else {
            ERROR_FACTOR
        };
        state.current_rate = (state.current_rate * factor).max(self.config.min_rate);
        tracing::debug!(
            rate = state.current_rate,
            errors = state.consecutive_errors,
            "rate limiter backing off on error"
        );
    }

    /// Current rate in calls per second
    pub async fn current_rate(&self) -> f64 {
        self.state.lock().await.current_rate
    }
}

fn average(latencies: &VecDeque<Duration>) -> Duration {
    if latencies.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = latencies.iter().sum();
    total / latencies.len() as u32
}
