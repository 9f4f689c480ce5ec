//! Intelligence gathered by an agent's environmental scan.
//!
//! A scan produces one immutable [`IntelligenceSnapshot`]. Sections whose
//! sub-scan failed are left empty or `None`; nothing here is an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Priority;
use crate::ids::{PostId, TargetId};
use crate::platform::Post;

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Direction of a sentiment reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Supportive wording.
    Positive,
    /// Critical wording.
    Negative,
    /// Neither, or not enough signal.
    #[default]
    Neutral,
}

/// Sentiment of a single piece of content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Candidate the content supports, if any.
    pub candidate: Option<String>,
    /// Direction.
    pub polarity: Polarity,
    /// Strength in `[0, 1]`.
    pub strength: f64,
}

/// Aggregated sentiment over the sentiment-search sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    /// Summed support strength per candidate key.
    pub support: BTreeMap<String, f64>,
    /// Summed strength of negative, candidate-less content.
    pub voter_disillusionment: f64,
    /// Number of political posts with no clear sentiment.
    pub neutral_political: u32,
    /// Short excerpts of strongly worded posts, per candidate key or `negative`.
    pub samples: BTreeMap<String, Vec<String>>,
}

impl SentimentSummary {
    /// Support score for a candidate key, zero when unseen.
    pub fn score(&self, candidate: &str) -> f64 {
        self.support.get(candidate).copied().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Feed analysis
// ---------------------------------------------------------------------------

/// Counts of posts by coarse content class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMix {
    /// Posts matching a political keyword.
    pub political: u32,
    /// Non-political posts about trends or news.
    pub trending: u32,
    /// Everything else.
    pub personal: u32,
}

/// A post with an active reply thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    /// Post identifier.
    pub post: PostId,
    /// Post author.
    pub author: TargetId,
    /// Reply count.
    pub replies: u32,
    /// First characters of the post body.
    pub preview: String,
}

/// Analysis of the multi-feed sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAnalysis {
    /// Posts sampled.
    pub total_posts: u32,
    /// Posts classified as political.
    pub political_posts: u32,
    /// Breakdown by content class.
    pub content_mix: ContentMix,
    /// Latest engagement seen per author (authors with none are omitted).
    pub engagement_by_author: BTreeMap<TargetId, u32>,
    /// Posts with more than three replies.
    pub active_discussions: Vec<Discussion>,
}

impl FeedAnalysis {
    /// Share of political posts in the sample; zero for an empty sample.
    pub fn political_share(&self) -> f64 {
        f64::from(self.content_mix.political) / f64::from(self.total_posts.max(1))
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// Profile of an NPC account that posted repeatedly in the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcProfile {
    /// Account handle.
    pub username: TargetId,
    /// Interest categories detected in the account's posts.
    pub interests: Vec<String>,
    /// Mean likes per sampled post.
    pub avg_likes: f64,
    /// Mean replies per sampled post.
    pub avg_replies: f64,
    /// Posts seen in the sample.
    pub post_count: u32,
    /// Candidate the account's posts lean toward, if any.
    pub political_leaning: Option<String>,
}

/// A high-engagement post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluentialPost {
    /// The post.
    pub post: Post,
    /// Whether its content is political.
    pub political: bool,
}

// ---------------------------------------------------------------------------
// Derived insights
// ---------------------------------------------------------------------------

/// Shape of a derived opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Create content around a trending topic.
    AmplifyTrending {
        /// The topic.
        topic: String,
    },
    /// Engage with a high-engagement, non-political post.
    EngagePost {
        /// Post identifier.
        post: PostId,
        /// Post author.
        author: TargetId,
        /// Likes plus replies at scan time.
        engagement: u32,
    },
    /// Interact with an active NPC account.
    EngageNpc {
        /// NPC handle.
        npc: TargetId,
    },
}

/// A prioritized suggestion for action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    /// What to do.
    pub kind: OpportunityKind,
    /// How urgent it is.
    pub priority: Priority,
}

/// A gap between what the platform shows and what the campaign needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gap", rename_all = "snake_case")]
pub enum ContentGap {
    /// Political share of the feed is below 20%.
    LowPoliticalContent {
        /// Observed political share.
        share: f64,
    },
    /// Topics are trending but few posts engage with them.
    MissedTrending {
        /// Trending-class posts seen in the feed sample.
        trending_posts: u32,
    },
}

impl ContentGap {
    /// Priority of addressing this gap.
    pub const fn priority(&self) -> Priority {
        match self {
            Self::LowPoliticalContent { .. } => Priority::Medium,
            Self::MissedTrending { .. } => Priority::High,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything one scan learned, frozen at `captured_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceSnapshot {
    /// When the scan started.
    pub captured_at: DateTime<Utc>,
    /// Trending topics, most prominent first.
    pub trending_topics: Vec<String>,
    /// Sentiment section; `None` when the sentiment scan failed.
    pub sentiment: Option<SentimentSummary>,
    /// Feed section; `None` when the feed scan failed.
    pub feed: Option<FeedAnalysis>,
    /// NPC accounts that posted repeatedly.
    pub active_npcs: Vec<NpcProfile>,
    /// High-engagement posts, most engaged first.
    pub influential_posts: Vec<InfluentialPost>,
    /// Opportunities derived from the sections above.
    pub opportunities: Vec<Opportunity>,
    /// Content gaps derived from the sections above.
    pub content_gaps: Vec<ContentGap>,
}

impl IntelligenceSnapshot {
    /// A snapshot with every section empty.
    pub const fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            trending_topics: Vec::new(),
            sentiment: None,
            feed: None,
            active_npcs: Vec::new(),
            influential_posts: Vec::new(),
            opportunities: Vec::new(),
            content_gaps: Vec::new(),
        }
    }

    /// Handles of the active NPCs.
    pub fn npc_handles(&self) -> Vec<TargetId> {
        self.active_npcs.iter().map(|p| p.username.clone()).collect()
    }
}
