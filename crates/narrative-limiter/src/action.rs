//! Per-agent action limiter: one overall window plus one window per action type.
//!
//! An action must clear the overall window first and its own type's window
//! second. The overall admission is taken even if the per-type wait is long,
//! so the team-facing ceiling holds no matter how the per-type windows line up.

use std::collections::BTreeMap;
use std::time::Duration;

use narrative_types::ActionType;
use serde::Serialize;

use crate::adaptive::AdaptiveRateLimiter;
use crate::config::{LimitsConfig, WindowConfig};
use crate::error::LimiterError;
use crate::headers::RateLimitHeaders;
use crate::window::LimiterStatus;

/// Status of every window an [`ActionLimiter`] holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLimiterStatus {
    /// The overall window.
    pub overall: LimiterStatus,
    /// Each per-type window.
    pub by_action: BTreeMap<ActionType, LimiterStatus>,
}

/// Composite limiter owned by a single agent.
#[derive(Debug)]
pub struct ActionLimiter {
    overall: AdaptiveRateLimiter,
    post: AdaptiveRateLimiter,
    like: AdaptiveRateLimiter,
    repost: AdaptiveRateLimiter,
    follow: AdaptiveRateLimiter,
    search: AdaptiveRateLimiter,
}

impl ActionLimiter {
    /// Build every window from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidWindow`] if any window is zero.
    pub fn new(config: &LimitsConfig) -> Result<Self, LimiterError> {
        let buffer = Duration::from_millis(config.acquire_buffer_ms);
        let build = |window: &WindowConfig| {
            AdaptiveRateLimiter::from_config(window, &config.adaptation, buffer)
        };
        Ok(Self {
            overall: build(&config.overall)?,
            post: build(&config.post)?,
            like: build(&config.like)?,
            repost: build(&config.repost)?,
            follow: build(&config.follow)?,
            search: build(&config.search)?,
        })
    }

    /// The per-type window for `action`.
    pub const fn limiter(&self, action: ActionType) -> &AdaptiveRateLimiter {
        match action {
            ActionType::Post => &self.post,
            ActionType::Like => &self.like,
            ActionType::Repost => &self.repost,
            ActionType::Follow => &self.follow,
            ActionType::Search => &self.search,
        }
    }

    /// The overall window.
    pub const fn overall(&self) -> &AdaptiveRateLimiter {
        &self.overall
    }

    /// Wait for the overall window, then for `action`'s window.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::ZeroCapacity`] if either window can never admit.
    pub async fn acquire(&self, action: ActionType) -> Result<(), LimiterError> {
        self.overall.acquire().await?;
        self.limiter(action).acquire().await
    }

    /// Whether `action` would clear both windows right now. Consumes nothing.
    pub fn can_perform(&self, action: ActionType) -> bool {
        self.overall.has_headroom() && self.limiter(action).has_headroom()
    }

    /// Feed back the outcome of an `action` to both windows.
    pub fn on_response(
        &self,
        action: ActionType,
        success: bool,
        headers: Option<&RateLimitHeaders>,
    ) {
        self.overall.on_response(success, headers);
        self.limiter(action).on_response(success, headers);
    }

    /// Whether the overall window has no headroom left.
    pub fn is_saturated(&self) -> bool {
        !self.overall.has_headroom()
    }

    /// Status of every window.
    pub fn status_report(&self) -> ActionLimiterStatus {
        ActionLimiterStatus {
            overall: self.overall.status(),
            by_action: ActionType::ALL
                .iter()
                .map(|&action| (action, self.limiter(action).status()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn saturated_overall_blocks_every_type() {
        let config = LimitsConfig {
            overall: WindowConfig::new(2, 60),
            ..LimitsConfig::default()
        };
        let limiter = ActionLimiter::new(&config).unwrap();
        limiter.acquire(ActionType::Search).await.unwrap();
        limiter.acquire(ActionType::Search).await.unwrap();

        assert!(limiter.is_saturated());
        for action in ActionType::ALL {
            assert!(limiter.limiter(action).has_headroom());
            assert!(!limiter.can_perform(action));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn per_type_window_binds_below_overall() {
        let limiter = ActionLimiter::new(&LimitsConfig::default()).unwrap();
        limiter.acquire(ActionType::Post).await.unwrap();
        limiter.acquire(ActionType::Post).await.unwrap();

        assert!(!limiter.can_perform(ActionType::Post));
        assert!(limiter.can_perform(ActionType::Like));
        assert!(!limiter.is_saturated());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_the_per_type_window() {
        let limiter = ActionLimiter::new(&LimitsConfig::default()).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(ActionType::Follow).await.unwrap();
        }
        // Third follow waits out the 120s follow window.
        assert!(Instant::now().saturating_duration_since(start) >= Duration::from_secs(120));
        assert_eq!(limiter.limiter(ActionType::Follow).remaining(), 1);
    }

    #[test]
    fn responses_adapt_both_windows() {
        let limiter = ActionLimiter::new(&LimitsConfig::default()).unwrap();
        limiter.on_response(ActionType::Like, false, None);
        limiter.on_response(ActionType::Like, false, None);

        assert!(limiter.overall().current_capacity() < 8);
        assert!(limiter.limiter(ActionType::Like).current_capacity() < 5);
        assert_eq!(limiter.limiter(ActionType::Post).current_capacity(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_report_lists_every_type() {
        let limiter = ActionLimiter::new(&LimitsConfig::default()).unwrap();
        limiter.acquire(ActionType::Like).await.unwrap();
        let report = limiter.status_report();
        assert_eq!(report.by_action.len(), ActionType::ALL.len());
        assert_eq!(report.overall.in_window, 1);
        assert_eq!(report.by_action[&ActionType::Like].remaining, 4);
    }

    #[test]
    fn zero_window_fails_construction() {
        let config = LimitsConfig {
            search: WindowConfig::new(10, 0),
            ..LimitsConfig::default()
        };
        assert_eq!(
            ActionLimiter::new(&config).unwrap_err(),
            LimiterError::InvalidWindow
        );
    }
}
