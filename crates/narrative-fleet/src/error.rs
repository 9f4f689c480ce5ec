//! Error types for the fleet supervisor and binary.
//!
//! [`FleetError`] wraps every subsystem error that can stop the fleet from
//! starting, plus the supervisor's own precondition failures.

use narrative_agents::{AgentError, PlatformError};
use narrative_limiter::LimiterError;

use crate::config::ConfigError;

/// Top-level error for the fleet.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Configuration or accounts loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// An agent could not be built or run.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// A limiter could not be built.
    #[error("limiter error: {source}")]
    Limiter {
        /// The underlying limiter error.
        #[from]
        source: LimiterError,
    },

    /// The platform client could not be built.
    #[error("platform error: {source}")]
    Platform {
        /// The underlying platform error.
        #[from]
        source: PlatformError,
    },

    /// Fewer credentials than requested agents.
    #[error("fleet needs {needed} accounts but only {available} are configured")]
    NotEnoughAccounts {
        /// Agents requested.
        needed: usize,
        /// Credentials available.
        available: usize,
    },

    /// No persona is configured.
    #[error("no personas configured")]
    NoPersonas,

    /// A fleet of zero agents was requested.
    #[error("fleet size must be at least one")]
    EmptyFleet,

    /// A credential is missing its username or password.
    #[error("credential {index} has an empty username or password")]
    InvalidCredential {
        /// Position of the credential in the list.
        index: usize,
    },

    /// `create_fleet` or `start_campaign` was called on a running fleet.
    #[error("campaign is already running")]
    AlreadyRunning,

    /// `start_campaign` was called before `create_fleet`.
    #[error("no fleet has been created")]
    NoFleet,

    /// Every agent failed to authenticate.
    #[error("no agent could authenticate")]
    NoneAuthenticated,

    /// A coordination cycle found no active agent.
    #[error("no active agents to coordinate")]
    NoActiveAgents,
}
