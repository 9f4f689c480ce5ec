//! Enumeration types shared across the fleet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rate-limited platform resources
// ---------------------------------------------------------------------------

/// A platform operation class that carries its own rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Creating a post or a reply.
    Post,
    /// Liking a post.
    Like,
    /// Reposting a post.
    Repost,
    /// Following an account.
    Follow,
    /// Running a search query.
    Search,
}

impl ActionType {
    /// Every action type, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::Post,
        Self::Like,
        Self::Repost,
        Self::Follow,
        Self::Search,
    ];

    /// Lowercase name used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Follow => "follow",
            Self::Search => "search",
        }
    }
}

impl core::fmt::Display for ActionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an agent engages with somebody else's post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    /// Like the post.
    Like,
    /// Repost the post to the agent's followers.
    Repost,
    /// Reply with generated text.
    Reply,
}

impl EngagementKind {
    /// The rate-limited resource this engagement consumes.
    ///
    /// Replies are posts with a parent, so they share the post window.
    pub const fn action_type(self) -> ActionType {
        match self {
            Self::Like => ActionType::Like,
            Self::Repost => ActionType::Repost,
            Self::Reply => ActionType::Post,
        }
    }
}

/// Kind of content a post carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Personal, persona-building content for the audience-building phase.
    AudienceBuilding,
    /// Campaign content in support of the objective.
    Political,
    /// Everyday community content that avoids politics.
    #[default]
    Neutral,
    /// Content riding a trending topic.
    TrendingEngagement,
}

impl ContentKind {
    /// Whether posts of this kind count toward the political ratio.
    pub const fn is_political(self) -> bool {
        matches!(self, Self::Political)
    }

    /// Snake-case name used in logs and metric keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AudienceBuilding => "audience_building",
            Self::Political => "political",
            Self::Neutral => "neutral",
            Self::TrendingEngagement => "trending_engagement",
        }
    }
}

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// The objective the whole fleet campaigns for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignObjective {
    /// Build support for Victor Hawthorne.
    #[default]
    SupportVictor,
    /// Build support for Marina.
    SupportMarina,
    /// Depress enthusiasm for both candidates.
    VoterDisillusionment,
}

impl CampaignObjective {
    /// Candidate key this objective supports, if any.
    pub const fn candidate(self) -> Option<&'static str> {
        match self {
            Self::SupportVictor => Some("victor"),
            Self::SupportMarina => Some("marina"),
            Self::VoterDisillusionment => None,
        }
    }

    /// Candidate key of the rival, if the objective has one.
    pub const fn rival(self) -> Option<&'static str> {
        match self {
            Self::SupportVictor => Some("marina"),
            Self::SupportMarina => Some("victor"),
            Self::VoterDisillusionment => None,
        }
    }

    /// Snake-case name, matching the configuration format.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SupportVictor => "support_victor",
            Self::SupportMarina => "support_marina",
            Self::VoterDisillusionment => "voter_disillusionment",
        }
    }

    /// Parse the snake-case configuration name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "support_victor" => Some(Self::SupportVictor),
            "support_marina" | "support_bina" => Some(Self::SupportMarina),
            "voter_disillusionment" => Some(Self::VoterDisillusionment),
            _ => None,
        }
    }
}

impl core::fmt::Display for CampaignObjective {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign phase, derived from elapsed runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Early phase: grow an audience with non-political content.
    AudienceBuilding,
    /// Later phase: mix campaign content into the established persona.
    PoliticalInfluence,
}

impl Phase {
    /// Compute the phase for an agent started at `started_at`.
    ///
    /// Never stored: the phase is always re-derived from the clock, so a
    /// restarted agent lands in the same phase as its peers.
    pub fn at(started_at: DateTime<Utc>, now: DateTime<Utc>, audience_building_days: u32) -> Self {
        let elapsed_days = now.signed_duration_since(started_at).num_days();
        if elapsed_days < i64::from(audience_building_days) {
            Self::AudienceBuilding
        } else {
            Self::PoliticalInfluence
        }
    }
}

/// Urgency attached to an opportunity or a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Nice to have.
    Low,
    /// Worth doing when nothing better is queued.
    Medium,
    /// Should preempt organic activity.
    High,
    /// Must run on the very next decision.
    Urgent,
}

/// Lifecycle of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycle {
    /// Constructed, not yet authenticated (or reset after a failed attempt).
    Created,
    /// Credential exchange in flight.
    Authenticating,
    /// Authenticated and cycling.
    Active,
    /// Stop requested; the current action is finishing.
    Stopping,
    /// Loop exited.
    Stopped,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn phase_follows_elapsed_days() {
        let start = Utc::now();
        assert_eq!(
            Phase::at(start, start.checked_add_signed(Duration::hours(47)).unwrap(), 2),
            Phase::AudienceBuilding
        );
        assert_eq!(
            Phase::at(start, start.checked_add_signed(Duration::hours(48)).unwrap(), 2),
            Phase::PoliticalInfluence
        );
        assert_eq!(Phase::at(start, start, 0), Phase::PoliticalInfluence);
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn objective_round_trips_through_config_names() {
        for objective in [
            CampaignObjective::SupportVictor,
            CampaignObjective::SupportMarina,
            CampaignObjective::VoterDisillusionment,
        ] {
            assert_eq!(CampaignObjective::parse(objective.as_str()), Some(objective));
        }
        assert_eq!(CampaignObjective::parse("nonsense"), None);
    }

    #[test]
    fn replies_consume_the_post_window() {
        assert_eq!(EngagementKind::Reply.action_type(), ActionType::Post);
        assert_eq!(EngagementKind::Like.action_type(), ActionType::Like);
    }
}
