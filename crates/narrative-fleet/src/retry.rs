//! Retry policy for failed agent runs.

use std::time::Duration;

use crate::config::SupervisorConfig;

/// How often and how patiently the supervisor restarts a failed agent.
///
/// Backoff is linear: the wait after the n-th failure is `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed runs tolerated before the agent is given up on.
    pub max_retries: u32,
    /// Backoff unit.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from explicit values.
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Build the policy described by the supervisor section.
    pub const fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.retry_base_delay_secs),
        )
    }

    /// Whether another attempt is allowed after `failures` failed runs.
    pub const fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_retries
    }

    /// Wait before the attempt that follows the `attempt`-th failure.
    pub const fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SupervisorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(120));
        assert_eq!(policy.delay_for(3), Duration::from_secs(180));
    }

    #[test]
    fn retries_stop_at_the_limit() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn zero_retries_never_restarts() {
        assert!(!RetryPolicy::new(0, Duration::from_secs(1)).should_retry(0));
    }
}
