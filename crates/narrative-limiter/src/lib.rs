//! Rate limiting for the narrative fleet.
//!
//! Every outbound platform action passes through an [`ActionLimiter`] owned
//! by the acting agent. Limiters are never shared between agents.
//!
//! # Modules
//!
//! - [`window`] -- Sliding-window admission with burst allowance
//! - [`adaptive`] -- Capacity adaptation from success/failure and headers
//! - [`action`] -- Overall plus per-action-type composition
//! - [`headers`] -- Rate-limit header parsing
//! - [`config`] -- Serde limit configuration
//! - [`error`] -- Limiter errors

pub mod action;
pub mod adaptive;
pub mod config;
pub mod error;
pub mod headers;
pub mod window;

pub use action::{ActionLimiter, ActionLimiterStatus};
pub use adaptive::{AdaptiveRateLimiter, AdaptiveState};
pub use config::{AdaptationConfig, LimitsConfig, WindowConfig};
pub use error::LimiterError;
pub use headers::RateLimitHeaders;
pub use window::{ACQUIRE_BUFFER, LimiterStatus, RateLimiter};
