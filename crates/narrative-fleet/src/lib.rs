//! Fleet supervision for the narrative fleet.
//!
//! This crate turns a set of accounts and personas into a running fleet:
//! it builds the agents, keeps them running through failures, coordinates
//! them as a team and reports on the result. The `narrative-fleet` binary
//! wires it to the HTTP platform client and the text generation chain.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and the accounts file
//! - [`coordination`] -- Team opportunities and round-robin distribution
//! - [`error`] -- Top-level [`FleetError`]
//! - [`report`] -- Team aggregates
//! - [`retry`] -- Restart policy for failed agents
//! - [`supervisor`] -- The [`FleetSupervisor`]

pub mod config;
pub mod coordination;
pub mod error;
pub mod report;
pub mod retry;
pub mod supervisor;

pub use config::{CampaignConfig, ConfigError, FleetConfig, SupervisorConfig, load_accounts};
pub use coordination::TeamOpportunity;
pub use error::FleetError;
pub use report::summarize;
pub use retry::RetryPolicy;
pub use supervisor::FleetSupervisor;
