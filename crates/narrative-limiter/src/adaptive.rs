//! Rate limiter that adapts its capacity to server feedback.
//!
//! Two consecutive failures shrink the capacity by the adaptation factor
//! (never below one). A run of successes grows it back by 20% at a time,
//! never past the configured capacity and only a bounded number of times.
//! Rate-limit headers can clamp the capacity to the server's declared limit
//! or suspend admission until the server's window resets.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{AdaptationConfig, WindowConfig};
use crate::error::LimiterError;
use crate::headers::RateLimitHeaders;
use crate::window::{LimiterStatus, RateLimiter};

const MIN_FACTOR: f64 = 0.1;
const MAX_FACTOR: f64 = 1.0;
const RECOVERY_GROWTH: f64 = 1.2;

/// Consecutive failures that trigger a shrink.
const FAILURES_BEFORE_SHRINK: u32 = 2;

/// Counters behind the adaptation decisions.
#[derive(Debug, Default)]
struct Counters {
    consecutive_successes: u32,
    consecutive_failures: u32,
    recovery_attempts: u32,
}

/// Observable adaptation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdaptiveState {
    /// Capacity currently enforced.
    pub current_capacity: u32,
    /// Capacity the limiter was configured with; the recovery ceiling.
    pub original_capacity: u32,
    /// Successes since the last failure or recovery step.
    pub consecutive_successes: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Recovery steps taken so far.
    pub recovery_attempts: u32,
}

/// A [`RateLimiter`] whose capacity follows success and failure signals.
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    inner: RateLimiter,
    original_capacity: u32,
    factor: f64,
    recovery_threshold: u32,
    max_recovery_attempts: u32,
    max_suspension: Duration,
    counters: Mutex<Counters>,
}

impl AdaptiveRateLimiter {
    /// Create an adaptive limiter.
    ///
    /// An adaptation factor outside `[0.1, 1.0]` is clamped into range.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidWindow`] if `window` is zero.
    pub fn new(
        capacity: u32,
        window: Duration,
        adaptation: &AdaptationConfig,
    ) -> Result<Self, LimiterError> {
        let factor = if adaptation.factor.is_nan() {
            MAX_FACTOR
        } else {
            adaptation.factor.clamp(MIN_FACTOR, MAX_FACTOR)
        };
        Ok(Self {
            inner: RateLimiter::new(capacity, window)?,
            original_capacity: capacity,
            factor,
            recovery_threshold: adaptation.recovery_threshold.max(1),
            max_recovery_attempts: adaptation.max_recovery_attempts,
            max_suspension: Duration::from_secs(adaptation.max_suspension_secs),
            counters: Mutex::new(Counters::default()),
        })
    }

    /// Create an adaptive limiter from a window config and an acquire buffer.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidWindow`] if the window is zero.
    pub fn from_config(
        window: &WindowConfig,
        adaptation: &AdaptationConfig,
        buffer: Duration,
    ) -> Result<Self, LimiterError> {
        let mut limiter = Self::new(window.capacity, window.window(), adaptation)?;
        limiter.inner = limiter.inner.with_buffer(buffer);
        Ok(limiter)
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Admission (delegated)
    // -----------------------------------------------------------------------

    /// See [`RateLimiter::try_acquire`].
    pub fn try_acquire(&self) -> bool {
        self.inner.try_acquire()
    }

    /// See [`RateLimiter::acquire`].
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::ZeroCapacity`] if the limiter can never admit.
    pub async fn acquire(&self) -> Result<(), LimiterError> {
        self.inner.acquire().await
    }

    /// See [`RateLimiter::has_headroom`].
    pub fn has_headroom(&self) -> bool {
        self.inner.has_headroom()
    }

    /// See [`RateLimiter::remaining`].
    pub fn remaining(&self) -> u32 {
        self.inner.remaining()
    }

    /// See [`RateLimiter::reset_at`].
    pub fn reset_at(&self) -> Option<Instant> {
        self.inner.reset_at()
    }

    /// See [`RateLimiter::status`].
    pub fn status(&self) -> LimiterStatus {
        self.inner.status()
    }

    /// The wrapped window.
    pub const fn window(&self) -> &RateLimiter {
        &self.inner
    }

    /// Capacity currently enforced.
    pub fn current_capacity(&self) -> u32 {
        self.inner.capacity()
    }

    /// Snapshot of the adaptation counters.
    pub fn state(&self) -> AdaptiveState {
        let counters = self.counters();
        AdaptiveState {
            current_capacity: self.inner.capacity(),
            original_capacity: self.original_capacity,
            consecutive_successes: counters.consecutive_successes,
            consecutive_failures: counters.consecutive_failures,
            recovery_attempts: counters.recovery_attempts,
        }
    }

    // -----------------------------------------------------------------------
    // Adaptation
    // -----------------------------------------------------------------------

    /// Feed back the outcome of one request.
    ///
    /// `success` is false for 429s, other error statuses and timeouts alike.
    pub fn on_response(&self, success: bool, headers: Option<&RateLimitHeaders>) {
        self.on_response_at(success, headers, chrono::Utc::now().timestamp());
    }

    fn on_response_at(
        &self,
        success: bool,
        headers: Option<&RateLimitHeaders>,
        now_epoch_secs: i64,
    ) {
        let mut counters = self.counters();
        let current = self.inner.capacity();

        if success {
            counters.consecutive_successes = counters.consecutive_successes.saturating_add(1);
            counters.consecutive_failures = 0;
            if counters.consecutive_successes >= self.recovery_threshold
                && current < self.original_capacity
                && counters.recovery_attempts < self.max_recovery_attempts
            {
                let grown = grow(current).min(self.original_capacity);
                self.inner.set_capacity(grown);
                counters.recovery_attempts = counters.recovery_attempts.saturating_add(1);
                counters.consecutive_successes = 0;
                tracing::info!(
                    from = current,
                    to = grown,
                    window_secs = self.inner.window().as_secs(),
                    "recovered rate limit"
                );
            }
        } else {
            counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
            counters.consecutive_successes = 0;
            if counters.consecutive_failures >= FAILURES_BEFORE_SHRINK {
                let shrunk = shrink(current, self.factor);
                if shrunk < current {
                    self.inner.set_capacity(shrunk);
                    tracing::warn!(
                        from = current,
                        to = shrunk,
                        window_secs = self.inner.window().as_secs(),
                        "reduced rate limit after repeated failures"
                    );
                }
            }
        }

        if let Some(headers) = headers {
            self.apply_headers(headers, now_epoch_secs);
        }
    }

    /// Clamp to a declared limit and honour an exhausted server window.
    fn apply_headers(&self, headers: &RateLimitHeaders, now_epoch_secs: i64) {
        let current = self.inner.capacity();
        if let Some(limit) = headers.limit.filter(|&limit| limit > 0 && limit < current) {
            self.inner.set_capacity(limit);
            tracing::info!(from = current, to = limit, "adjusted rate limit to server limit");
        }

        if headers.remaining != Some(0) {
            return;
        }
        if let Some(wait) = headers.reset_after(now_epoch_secs) {
            let wait = wait.min(self.max_suspension);
            self.inner.suspend_for(wait);
            tracing::warn!(wait_secs = wait.as_secs(), "server window exhausted, suspending");
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn shrink(current: u32, factor: f64) -> u32 {
    let scaled = (f64::from(current) * factor).floor();
    (scaled as u32).max(1)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grow(current: u32) -> u32 {
    let scaled = (f64::from(current) * RECOVERY_GROWTH).ceil();
    scaled as u32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::advance;

    use super::*;

    fn limiter(capacity: u32) -> AdaptiveRateLimiter {
        AdaptiveRateLimiter::new(capacity, Duration::from_secs(60), &AdaptationConfig::default())
            .unwrap()
    }

    #[test]
    fn two_failures_strictly_shrink_down_to_one() {
        let limiter = limiter(10);
        let mut previous = limiter.current_capacity();
        while previous > 1 {
            limiter.on_response(false, None);
            limiter.on_response(false, None);
            let now = limiter.current_capacity();
            assert!(now < previous, "{now} should be below {previous}");
            previous = now;
        }
        limiter.on_response(false, None);
        limiter.on_response(false, None);
        assert_eq!(limiter.current_capacity(), 1);
    }

    #[test]
    fn an_isolated_failure_does_not_shrink() {
        let limiter = limiter(8);
        limiter.on_response(false, None);
        limiter.on_response(true, None);
        limiter.on_response(false, None);
        assert_eq!(limiter.current_capacity(), 8);
        assert_eq!(limiter.state().consecutive_failures, 1);
    }

    #[test]
    fn recovery_grows_but_never_past_original() {
        let limiter = limiter(8);
        for _ in 0..6 {
            limiter.on_response(false, None);
        }
        let shrunk = limiter.current_capacity();
        assert!(shrunk < 8);

        let mut previous = shrunk;
        for _ in 0..3 {
            for _ in 0..10 {
                limiter.on_response(true, None);
            }
            let now = limiter.current_capacity();
            assert!(now > previous || now == 8);
            assert!(now <= 8);
            previous = now;
        }
        assert_eq!(limiter.state().original_capacity, 8);
    }

    #[test]
    fn recovery_attempts_are_bounded() {
        let config = AdaptationConfig {
            max_recovery_attempts: 1,
            ..AdaptationConfig::default()
        };
        let limiter = AdaptiveRateLimiter::new(20, Duration::from_secs(60), &config).unwrap();
        for _ in 0..20 {
            limiter.on_response(false, None);
        }
        assert_eq!(limiter.current_capacity(), 1);

        for _ in 0..50 {
            limiter.on_response(true, None);
        }
        assert_eq!(limiter.current_capacity(), 2);
        assert_eq!(limiter.state().recovery_attempts, 1);
    }

    #[test]
    fn factor_is_clamped_into_range() {
        let lenient = AdaptiveRateLimiter::new(
            10,
            Duration::from_secs(60),
            &AdaptationConfig {
                factor: 5.0,
                ..AdaptationConfig::default()
            },
        )
        .unwrap();
        lenient.on_response(false, None);
        lenient.on_response(false, None);
        assert_eq!(lenient.current_capacity(), 10);

        let harsh = AdaptiveRateLimiter::new(
            10,
            Duration::from_secs(60),
            &AdaptationConfig {
                factor: 0.0,
                ..AdaptationConfig::default()
            },
        )
        .unwrap();
        harsh.on_response(false, None);
        harsh.on_response(false, None);
        assert_eq!(harsh.current_capacity(), 1);
    }

    #[test]
    fn declared_limit_clamps_down_only() {
        let limiter = limiter(8);
        limiter.on_response(
            true,
            Some(&RateLimitHeaders {
                limit: Some(20),
                ..RateLimitHeaders::default()
            }),
        );
        assert_eq!(limiter.current_capacity(), 8);

        limiter.on_response(
            true,
            Some(&RateLimitHeaders {
                limit: Some(0),
                ..RateLimitHeaders::default()
            }),
        );
        assert_eq!(limiter.current_capacity(), 8);

        limiter.on_response(
            false,
            Some(&RateLimitHeaders {
                limit: Some(3),
                ..RateLimitHeaders::default()
            }),
        );
        assert_eq!(limiter.current_capacity(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_server_window_suspends_until_reset() {
        let limiter = limiter(8);
        limiter.on_response(
            false,
            Some(&RateLimitHeaders {
                limit: None,
                remaining: Some(0),
                reset: Some(30),
            }),
        );
        assert!(!limiter.try_acquire());

        advance(Duration::from_secs(29)).await;
        assert!(!limiter.has_headroom());
        advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_is_bounded_to_the_maximum() {
        let limiter = limiter(8);
        limiter.on_response_at(
            false,
            Some(&RateLimitHeaders {
                limit: None,
                remaining: Some(0),
                reset: Some(1_700_090_000),
            }),
            1_700_000_000,
        );
        let reset = limiter.reset_at().unwrap();
        let wait = reset.saturating_duration_since(Instant::now());
        assert_eq!(wait, Duration::from_secs(3600));
    }
}
