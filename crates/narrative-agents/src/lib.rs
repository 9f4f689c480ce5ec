//! Agents, their intelligence and their decisions.
//!
//! This crate holds everything one fleet member does on its own: reading the
//! platform, deciding what to do next, writing text and acting under its
//! limiter. Cross-agent coordination lives in `narrative-fleet`, which only
//! talks to agents through [`Agent::snapshot`] and [`Agent::push_directive`].
//!
//! # Modules
//!
//! - [`agent`] -- Agent lifecycle, loop and action execution ([`Agent`])
//! - [`config`] -- Agent, scanner, strategy, platform and generation settings
//! - [`error`] -- Platform, generation and agent errors ([`AgentError`])
//! - [`http`] -- `reqwest` implementation of [`PlatformClient`]
//! - [`keywords`] -- Keyword tables and text classifiers
//! - [`llm`] -- Completion backends (competition proxy, `OpenAI`, Anthropic)
//! - [`platform`] -- Platform client trait and per-agent sessions
//! - [`scanner`] -- Environmental scans into [`IntelligenceSnapshot`]s
//! - [`strategy`] -- Next-action decisions ([`StrategyEngine`])
//! - [`textgen`] -- Prompting, cleaning and the provider chain
//! - `testing` -- In-memory platform and generator (tests and `test-support`)
//!
//! [`IntelligenceSnapshot`]: narrative_types::IntelligenceSnapshot

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod keywords;
pub mod llm;
pub mod platform;
pub mod scanner;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod textgen;

pub use agent::{Agent, AgentDeps, AgentSettings};
pub use config::{
    AgentConfig, BackendType, GenerationConfig, LlmBackendConfig, PlatformConfig, Sampling,
    ScannerConfig, StrategyConfig,
};
pub use error::{AgentError, GenerationError, PlatformError};
pub use http::HttpPlatformClient;
pub use platform::{FeedKind, PlatformClient, Reaction, Response, Session};
pub use scanner::{EnvironmentalScanner, Recommendation, ScannerSummary};
pub use strategy::{StrategyEngine, StrategyStatus, Weights};
pub use textgen::{
    CannedFallback, GenerationRequest, ProviderChain, Purpose, ReplyContext, TextGenerator,
};
