//! Limit configuration.
//!
//! Deserialized from the `limits` section of the fleet configuration. The
//! defaults match the platform's published quotas: roughly three actions a
//! minute overall, with tighter per-type ceilings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One sliding window: `capacity` admissions per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Admissions allowed per window.
    pub capacity: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl WindowConfig {
    /// Shorthand constructor.
    pub const fn new(capacity: u32, window_secs: u64) -> Self {
        Self {
            capacity,
            window_secs,
        }
    }

    /// Window length as a [`Duration`].
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// How limiters react to failures and recover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Capacity multiplier applied after repeated failures. Clamped to `[0.1, 1.0]`.
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Consecutive successes before a recovery step.
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    /// Recovery steps allowed over the limiter's lifetime.
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Longest suspension a reset header may impose, in seconds.
    #[serde(default = "default_max_suspension_secs")]
    pub max_suspension_secs: u64,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            factor: default_factor(),
            recovery_threshold: default_recovery_threshold(),
            max_recovery_attempts: default_max_recovery_attempts(),
            max_suspension_secs: default_max_suspension_secs(),
        }
    }
}

/// Per-agent action limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Ceiling on all actions combined.
    #[serde(default = "default_overall")]
    pub overall: WindowConfig,

    /// Posts and replies.
    #[serde(default = "default_post")]
    pub post: WindowConfig,

    /// Likes.
    #[serde(default = "default_like")]
    pub like: WindowConfig,

    /// Reposts.
    #[serde(default = "default_repost")]
    pub repost: WindowConfig,

    /// Follows.
    #[serde(default = "default_follow")]
    pub follow: WindowConfig,

    /// Searches.
    #[serde(default = "default_search")]
    pub search: WindowConfig,

    /// Adaptation parameters shared by every window.
    #[serde(default)]
    pub adaptation: AdaptationConfig,

    /// Extra milliseconds slept on top of each computed wait.
    #[serde(default = "default_acquire_buffer_ms")]
    pub acquire_buffer_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            overall: default_overall(),
            post: default_post(),
            like: default_like(),
            repost: default_repost(),
            follow: default_follow(),
            search: default_search(),
            adaptation: AdaptationConfig::default(),
            acquire_buffer_ms: default_acquire_buffer_ms(),
        }
    }
}

const fn default_overall() -> WindowConfig {
    WindowConfig::new(8, 60)
}

const fn default_post() -> WindowConfig {
    WindowConfig::new(2, 60)
}

const fn default_like() -> WindowConfig {
    WindowConfig::new(5, 60)
}

const fn default_repost() -> WindowConfig {
    WindowConfig::new(2, 60)
}

const fn default_follow() -> WindowConfig {
    WindowConfig::new(2, 120)
}

const fn default_search() -> WindowConfig {
    WindowConfig::new(10, 60)
}

const fn default_factor() -> f64 {
    0.8
}

const fn default_recovery_threshold() -> u32 {
    10
}

const fn default_max_recovery_attempts() -> u32 {
    3
}

const fn default_max_suspension_secs() -> u64 {
    3600
}

const fn default_acquire_buffer_ms() -> u64 {
    100
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: LimitsConfig =
            serde_json::from_str(r#"{"post": {"capacity": 1, "window_secs": 90}}"#).unwrap();
        assert_eq!(config.post, WindowConfig::new(1, 90));
        assert_eq!(config.follow, WindowConfig::new(2, 120));
        assert_eq!(config.overall, WindowConfig::new(8, 60));
        assert_eq!(config.adaptation.recovery_threshold, 10);
    }
}
