//! Shared type definitions for the narrative fleet.
//!
//! Every crate in the workspace speaks in these types: the limiter keys its
//! windows by [`ActionType`], the strategy engine emits [`ActionDescriptor`]s,
//! the scanner produces [`IntelligenceSnapshot`]s and the supervisor
//! aggregates [`AgentSnapshot`]s into a [`FleetReport`].
//!
//! # Modules
//!
//! - [`ids`] -- Agent UUIDs and platform handle newtypes
//! - [`enums`] -- Action types, content kinds, objectives, phases, priorities
//! - [`actions`] -- Action descriptors and decision history records
//! - [`platform`] -- Posts, notifications, credentials and personas
//! - [`intel`] -- Scan output: sentiment, feed analysis, opportunities
//! - [`directive`] -- Coordination directives
//! - [`stats`] -- Agent counters, snapshots and fleet reports

pub mod actions;
pub mod directive;
pub mod enums;
pub mod ids;
pub mod intel;
pub mod platform;
pub mod stats;

pub use actions::{ActionDescriptor, ActionKind, ActionRecord, ContentSpec, Intensity};
pub use directive::{CoordinationDirective, DirectiveKind};
pub use enums::{
    ActionType, AgentLifecycle, CampaignObjective, ContentKind, EngagementKind, Phase, Priority,
};
pub use ids::{AgentId, PostId, TargetId};
pub use intel::{
    ContentGap, ContentMix, Discussion, FeedAnalysis, InfluentialPost, IntelligenceSnapshot,
    NpcProfile, Opportunity, OpportunityKind, Polarity, SentimentReading, SentimentSummary,
};
pub use platform::{
    AuthToken, Credential, Notification, NotificationKind, Persona, Post, PostRef,
};
pub use stats::{AgentSnapshot, AgentStats, FleetReport, TeamSummary};
