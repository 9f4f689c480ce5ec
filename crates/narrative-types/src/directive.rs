//! Coordination directives pushed by the fleet supervisor into agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CampaignObjective, Priority};

/// What the coordinator wants an agent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// Post about one of the target trending topics.
    AmplifyTrending,
    /// Engage with posts from one of the target NPC accounts.
    CoordinatedNpcEngagement,
    /// Publish a high-intensity campaign post.
    CampaignPush,
}

impl DirectiveKind {
    /// Snake-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmplifyTrending => "amplify_trending",
            Self::CoordinatedNpcEngagement => "coordinated_npc_engagement",
            Self::CampaignPush => "campaign_push",
        }
    }
}

/// A team-wide instruction that preempts an agent's organic decision.
///
/// Consumed at most once. Discarded unconsumed once `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationDirective {
    /// What to do.
    pub kind: DirectiveKind,
    /// Topics or NPC handles the directive is about.
    pub targets: Vec<String>,
    /// Queue ordering.
    pub priority: Priority,
    /// Objective to push, for campaign pushes.
    pub objective: Option<CampaignObjective>,
    /// When the coordinator issued it.
    pub issued_at: DateTime<Utc>,
    /// When it stops being relevant.
    pub expires_at: DateTime<Utc>,
}

impl CoordinationDirective {
    /// Whether the directive is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let directive = CoordinationDirective {
            kind: DirectiveKind::CampaignPush,
            targets: Vec::new(),
            priority: Priority::High,
            objective: None,
            issued_at: now,
            expires_at: now.checked_add_signed(Duration::minutes(10)).unwrap(),
        };
        assert!(!directive.is_expired(now));
        assert!(directive.is_expired(now.checked_add_signed(Duration::minutes(10)).unwrap()));
    }
}
