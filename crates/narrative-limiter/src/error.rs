//! Error types for rate limiter construction and admission.

/// Errors raised by the limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
    /// The limiter has a capacity of zero and can never admit a request.
    #[error("rate limiter has zero capacity and rejects every request")]
    ZeroCapacity,

    /// The configured window is zero.
    #[error("rate limiter window must be longer than zero")]
    InvalidWindow,
}
