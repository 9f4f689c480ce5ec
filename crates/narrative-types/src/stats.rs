//! Agent statistics, snapshots and fleet reports.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, AgentLifecycle, ContentKind, EngagementKind, Phase};
use crate::ids::{AgentId, TargetId};

/// Counters an agent keeps about its own activity.
///
/// Success counters only move on confirmed platform success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Top-level posts published.
    pub posts_created: u64,
    /// Replies published.
    pub replies_made: u64,
    /// Likes given.
    pub likes_given: u64,
    /// Reposts made.
    pub reposts_made: u64,
    /// Accounts followed.
    pub follows_made: u64,
    /// Searches run.
    pub searches_run: u64,
    /// Engagements with NPC accounts.
    pub npc_interactions: u64,
    /// Political posts published.
    pub political_posts: u64,
    /// Non-political posts published.
    pub neutral_posts: u64,
    /// Posts and engagements riding a trending topic.
    pub trending_engagements: u64,
    /// Replies sent in political conversations.
    pub strategic_replies: u64,
    /// Platform calls attempted.
    pub actions_attempted: u64,
    /// Platform calls that succeeded.
    pub actions_succeeded: u64,
    /// Platform calls that failed or timed out.
    pub actions_failed: u64,
}

impl AgentStats {
    /// Record the outcome of one platform call.
    pub const fn record_attempt(&mut self, success: bool) {
        self.actions_attempted = self.actions_attempted.saturating_add(1);
        if success {
            self.actions_succeeded = self.actions_succeeded.saturating_add(1);
        } else {
            self.actions_failed = self.actions_failed.saturating_add(1);
        }
    }

    /// Record a published top-level post.
    pub const fn record_post(&mut self, kind: ContentKind) {
        self.posts_created = self.posts_created.saturating_add(1);
        match kind {
            ContentKind::Political => {
                self.political_posts = self.political_posts.saturating_add(1);
            }
            ContentKind::TrendingEngagement => {
                self.neutral_posts = self.neutral_posts.saturating_add(1);
                self.trending_engagements = self.trending_engagements.saturating_add(1);
            }
            ContentKind::AudienceBuilding | ContentKind::Neutral => {
                self.neutral_posts = self.neutral_posts.saturating_add(1);
            }
        }
    }

    /// Record a successful engagement.
    pub const fn record_engagement(&mut self, kind: EngagementKind) {
        match kind {
            EngagementKind::Like => self.likes_given = self.likes_given.saturating_add(1),
            EngagementKind::Repost => self.reposts_made = self.reposts_made.saturating_add(1),
            EngagementKind::Reply => self.replies_made = self.replies_made.saturating_add(1),
        }
    }

    /// Successful calls for a rate-limited resource.
    pub const fn count_for(&self, action: ActionType) -> u64 {
        match action {
            ActionType::Post => self.posts_created.saturating_add(self.replies_made),
            ActionType::Like => self.likes_given,
            ActionType::Repost => self.reposts_made,
            ActionType::Follow => self.follows_made,
            ActionType::Search => self.searches_run,
        }
    }

    /// Posts plus replies.
    pub const fn total_posts(&self) -> u64 {
        self.posts_created.saturating_add(self.replies_made)
    }

    /// Likes plus reposts.
    pub const fn total_engagements(&self) -> u64 {
        self.likes_given.saturating_add(self.reposts_made)
    }

    /// Political share of published top-level posts; zero before any post.
    #[allow(clippy::cast_precision_loss)]
    pub fn political_ratio(&self) -> f64 {
        self.political_posts as f64 / self.posts_created.max(1) as f64
    }
}

/// Point-in-time copy of one agent's state, safe to aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent identifier.
    pub id: AgentId,
    /// Platform handle.
    pub username: String,
    /// Persona name.
    pub persona: String,
    /// Lifecycle at snapshot time.
    pub lifecycle: AgentLifecycle,
    /// Phase at snapshot time.
    pub phase: Phase,
    /// When the agent was created.
    pub started_at: DateTime<Utc>,
    /// When the last action completed, if any.
    pub last_action_at: Option<DateTime<Utc>>,
    /// Cycles that executed an action.
    pub action_count: u64,
    /// Activity counters.
    pub stats: AgentStats,
    /// Accounts engaged with.
    pub engaged_targets: BTreeSet<TargetId>,
    /// Accounts followed.
    pub followed_targets: BTreeSet<TargetId>,
    /// Trending topics from the latest scan.
    pub trending_topics: Vec<String>,
    /// Active NPCs from the latest scan.
    pub active_npcs: Vec<TargetId>,
}

/// Team-wide aggregates computed from agent snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    /// Agents currently in the active set.
    pub active_agents: u32,
    /// Agents removed after exhausting their retries.
    pub lost_agents: u32,
    /// Posts plus replies across the team.
    pub total_posts: u64,
    /// Likes plus reposts across the team.
    pub total_engagements: u64,
    /// Size of the union of every agent's engaged targets.
    pub unique_targets: u64,
    /// Union of every agent's trending topics, in first-seen order.
    pub trending_topics: Vec<String>,
    /// Platform calls attempted across the team.
    pub actions_attempted: u64,
    /// Platform calls that succeeded across the team.
    pub actions_succeeded: u64,
    /// `actions_succeeded / actions_attempted`; `None` before any attempt.
    pub success_rate: Option<f64>,
    /// Completed coordination cycles.
    pub coordination_cycles: u64,
}

/// Final or on-demand report of the whole fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    /// Team aggregates.
    pub team: TeamSummary,
    /// One snapshot per agent, active or not.
    pub agents: Vec<AgentSnapshot>,
}
