//! Error types for agents and their collaborators.
//!
//! [`PlatformError`] classifies every way a platform call can fail so the
//! agent can tell a revoked session from an ordinary failed action.
//! [`AgentError`] is what escapes an agent loop to the supervisor.

use narrative_limiter::{LimiterError, RateLimitHeaders};

/// Errors returned by a platform client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The platform answered 429.
    #[error("rate limited by platform")]
    RateLimited {
        /// Rate-limit headers attached to the rejection.
        headers: RateLimitHeaders,
    },

    /// The credential or session token was rejected.
    #[error("credential rejected by platform")]
    Unauthorized,

    /// Any other unexpected status.
    #[error("platform returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("platform call timed out")]
    Timeout,

    /// The response body did not have a recognised shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Rate-limit headers carried by the error, if any.
    pub const fn headers(&self) -> Option<&RateLimitHeaders> {
        match self {
            Self::RateLimited { headers } => Some(headers),
            _ => None,
        }
    }
}

/// Errors from a single text generation backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Backend(String),

    /// The backend did not answer within the generation timeout.
    #[error("generation timed out")]
    Timeout,

    /// The backend answered with text that cannot be posted.
    #[error("generated text rejected: {0}")]
    Rejected(String),
}

/// Errors that end an agent loop or a single agent operation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The platform refused the agent's credential.
    #[error("authentication failed for {username}: {source}")]
    AuthenticationFailure {
        /// Account that failed to authenticate.
        username: String,
        /// Underlying platform error.
        source: PlatformError,
    },

    /// The platform revoked the agent's session mid-campaign.
    #[error("session revoked by platform")]
    Unauthorized,

    /// Too many consecutive cycles failed.
    #[error("{failures} consecutive cycles failed")]
    RepeatedCycleFailure {
        /// Consecutive failed cycles at the time of exit.
        failures: u32,
    },

    /// An operation needed a session before one was established.
    #[error("agent is not authenticated")]
    NotAuthenticated,

    /// No generator produced usable text.
    #[error("no content available for {0}")]
    ContentUnavailable(&'static str),

    /// A limiter can never admit the action.
    #[error(transparent)]
    Limiter(#[from] LimiterError),

    /// A platform call failed.
    #[error(transparent)]
    Platform(PlatformError),
}

impl From<PlatformError> for AgentError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::Unauthorized => Self::Unauthorized,
            other => Self::Platform(other),
        }
    }
}
