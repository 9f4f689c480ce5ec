//! Action descriptors produced by the strategy engine and consumed by agents.
//!
//! An [`ActionDescriptor`] is a closed set of variants, one per kind of
//! platform activity, each carrying only the fields its execution needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CampaignObjective, ContentKind, EngagementKind, Phase};
use crate::ids::{PostId, TargetId};

/// How hard a post should push its message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    /// Regular persona voice.
    #[default]
    Normal,
    /// Coordinated push; stronger wording.
    High,
}

/// Everything the text generator needs to write a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpec {
    /// What the post is about.
    pub kind: ContentKind,
    /// Trending topic the post should ride, if any.
    #[serde(default)]
    pub topic: Option<String>,
    /// Persona interests to weave in.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Tone hint passed to the generator.
    #[serde(default)]
    pub tone: Option<String>,
    /// Objective the post argues for (political posts only).
    #[serde(default)]
    pub objective: Option<CampaignObjective>,
    /// Issues to mention (political posts only).
    #[serde(default)]
    pub issues: Vec<String>,
    /// Whether the post was requested by the coordinator.
    #[serde(default)]
    pub coordinated: bool,
    /// Push strength.
    #[serde(default)]
    pub intensity: Intensity,
}

impl ContentSpec {
    /// Start a spec of the given kind with every optional field empty.
    pub fn of(kind: ContentKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Tag of an [`ActionDescriptor`], used for cooldowns and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Publish a post.
    Post,
    /// Engage with one known post.
    Engage,
    /// Follow an account.
    Follow,
    /// Search, then engage with the results.
    SearchAndEngage,
}

impl ActionKind {
    /// Snake-case name used in logs and metric keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Engage => "engage",
            Self::Follow => "follow",
            Self::SearchAndEngage => "search_and_engage",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single next action an agent should execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDescriptor {
    /// Publish a new top-level post.
    Post {
        /// What to write about.
        content: ContentSpec,
    },
    /// Like, repost or reply to a specific post.
    Engage {
        /// Post to engage with.
        post: PostId,
        /// Author of that post.
        author: TargetId,
        /// Body of that post, used as reply context.
        #[serde(default)]
        excerpt: String,
        /// How to engage.
        kind: EngagementKind,
    },
    /// Follow an account.
    Follow {
        /// Account to follow.
        target: TargetId,
    },
    /// Search the platform and engage with up to `limit` results.
    SearchAndEngage {
        /// Search query.
        query: String,
        /// Maximum number of results to engage with.
        limit: u32,
        /// Engagement kinds to apply, in order, to each result.
        kinds: Vec<EngagementKind>,
        /// Whether the query rides a trending topic.
        #[serde(default)]
        trending: bool,
    },
}

impl ActionDescriptor {
    /// Tag of this action.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Post { .. } => ActionKind::Post,
            Self::Engage { .. } => ActionKind::Engage,
            Self::Follow { .. } => ActionKind::Follow,
            Self::SearchAndEngage { .. } => ActionKind::SearchAndEngage,
        }
    }

    /// Content kind, for post actions.
    pub const fn content_kind(&self) -> Option<ContentKind> {
        match self {
            Self::Post { content } => Some(content.kind),
            _ => None,
        }
    }

    /// Whether this action publishes political content.
    pub fn is_political_post(&self) -> bool {
        self.content_kind().is_some_and(ContentKind::is_political)
    }
}

/// An action the strategy engine handed out, kept in its bounded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The action.
    pub action: ActionDescriptor,
    /// Phase the decision was made in.
    pub phase: Phase,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
    /// Whether the action came from a coordination directive.
    pub from_directive: bool,
    /// Trending topics known at decision time.
    pub trending_topics: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_serializes_with_type_tag() {
        let action = ActionDescriptor::SearchAndEngage {
            query: "kingston".to_owned(),
            limit: 2,
            kinds: vec![EngagementKind::Like, EngagementKind::Reply],
            trending: false,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "search_and_engage");
        assert_eq!(json["kinds"][1], "reply");
    }

    #[test]
    fn only_political_posts_count_as_political() {
        let political = ActionDescriptor::Post {
            content: ContentSpec::of(ContentKind::Political),
        };
        let neutral = ActionDescriptor::Post {
            content: ContentSpec::of(ContentKind::Neutral),
        };
        let follow = ActionDescriptor::Follow {
            target: TargetId::from("kate"),
        };
        assert!(political.is_political_post());
        assert!(!neutral.is_political_post());
        assert!(!follow.is_political_post());
        assert_eq!(follow.kind(), ActionKind::Follow);
    }
}
