//! Environmental scanner.
//!
//! A scan fires five read-only sub-scans at the platform concurrently and
//! folds whatever comes back into one immutable [`IntelligenceSnapshot`].
//! A failed sub-scan is logged and leaves its section empty; the scan as a
//! whole never fails. Scanner reads do not pass through the agent's action
//! limiter.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use narrative_types::{
    ContentGap, ContentMix, Discussion, FeedAnalysis, InfluentialPost, IntelligenceSnapshot,
    NpcProfile, Opportunity, OpportunityKind, Polarity, Post, Priority, SentimentSummary,
    TargetId,
};
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::keywords;
use crate::platform::{FeedKind, Session};

/// Characters kept in sentiment samples and discussion previews.
const PREVIEW_CHARS: usize = 100;

/// Characters kept of an influential post's body.
const INFLUENTIAL_CHARS: usize = 200;

/// Likes plus replies a post needs to count as influential.
const INFLUENCE_THRESHOLD: u32 = 3;

/// Replies a post needs to count as an active discussion.
const DISCUSSION_THRESHOLD: u32 = 3;

/// Posts in the activity sample an account needs to be profiled.
const REPEAT_POSTS: u32 = 2;

/// Influential posts kept per scan.
const INFLUENTIAL_KEPT: usize = 10;

/// Political share of the feed below which a gap is reported.
const LOW_POLITICAL_SHARE: f64 = 0.2;

/// Trending-class posts below which trending topics count as missed.
const MIN_TRENDING_POSTS: u32 = 3;

/// Feeds sampled for content analysis.
const FEED_SAMPLE: [FeedKind; 3] = [FeedKind::Explore, FeedKind::Latest, FeedKind::Home];

/// Feeds sampled for repeat posters.
const ACTIVITY_SAMPLE: [FeedKind; 1] = [FeedKind::Explore];

/// Feeds sampled for high-engagement posts.
const INFLUENCE_SAMPLE: [FeedKind; 2] = [FeedKind::Explore, FeedKind::Latest];

/// First `n` characters of `text`.
pub fn excerpt(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Scanner state as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerSummary {
    /// When the latest scan started.
    pub last_scan: Option<DateTime<Utc>>,
    /// Trending topics from the latest scan.
    pub trending_topics: Vec<String>,
    /// Scans retained.
    pub history_len: usize,
    /// NPC accounts the agent has engaged with.
    pub tracked_npcs: usize,
    /// What the latest scan suggests doing next.
    pub recommendations: Vec<Recommendation>,
}

/// A strategic suggestion drawn from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recommendation {
    /// One candidate has stronger support in the sentiment sample.
    SentimentLead {
        /// Candidate key in the lead.
        leader: String,
        /// Candidate key behind.
        trailing: String,
    },
    /// High-priority engagement opportunities are open.
    FocusOpportunities {
        /// How many.
        count: usize,
    },
    /// Content gaps were found in the feed.
    AddressGaps {
        /// How many.
        count: usize,
    },
}

#[derive(Debug, Default)]
struct ScannerState {
    history: VecDeque<Arc<IntelligenceSnapshot>>,
    engaged_npcs: BTreeSet<TargetId>,
}

/// Gathers platform intelligence for one agent.
#[derive(Debug)]
pub struct EnvironmentalScanner {
    config: ScannerConfig,
    state: Mutex<ScannerState>,
}

impl EnvironmentalScanner {
    /// Create a scanner with an empty history.
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ScannerState::default()),
        }
    }

    /// Run one scan and record it as the latest.
    pub async fn scan(&self, session: &Session) -> Arc<IntelligenceSnapshot> {
        let captured_at = Utc::now();
        let started = Instant::now();

        let (trending, feed_posts, sentiment_posts, activity_posts, influence_posts) = tokio::join!(
            self.scan_trending(session),
            sample_feeds(session, &FEED_SAMPLE, self.config.feed_limit),
            self.sample_sentiment(session),
            sample_feeds(session, &ACTIVITY_SAMPLE, self.config.activity_limit),
            sample_feeds(session, &INFLUENCE_SAMPLE, self.config.influence_limit),
        );

        let mut snapshot = IntelligenceSnapshot::empty(captured_at);
        snapshot.trending_topics = trending.unwrap_or_default();
        snapshot.feed = feed_posts.as_deref().map(analyze_feed);
        snapshot.sentiment = sentiment_posts.as_deref().map(summarize_sentiment);
        snapshot.active_npcs = activity_posts.as_deref().map(profile_npcs).unwrap_or_default();
        snapshot.influential_posts = influence_posts.map(rank_influential).unwrap_or_default();
        snapshot.opportunities = derive_opportunities(&snapshot);
        snapshot.content_gaps = derive_gaps(&snapshot);

        let recommendations = recommend(&snapshot);
        let snapshot = Arc::new(snapshot);
        self.record(Arc::clone(&snapshot));

        for recommendation in &recommendations {
            debug!(?recommendation, "scan recommendation");
        }
        info!(
            trending = snapshot.trending_topics.len(),
            npcs = snapshot.active_npcs.len(),
            influential = snapshot.influential_posts.len(),
            opportunities = snapshot.opportunities.len(),
            recommendations = recommendations.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "environmental scan complete"
        );
        snapshot
    }

    /// The most recent snapshot, if any scan has run.
    pub fn latest(&self) -> Option<Arc<IntelligenceSnapshot>> {
        self.lock().history.back().cloned()
    }

    /// Remember NPC accounts the agent engaged with.
    pub fn track_engaged(&self, targets: impl IntoIterator<Item = TargetId>) {
        let mut state = self.lock();
        state
            .engaged_npcs
            .extend(targets.into_iter().filter(TargetId::is_npc));
    }

    /// Operator summary.
    pub fn summary(&self) -> ScannerSummary {
        let state = self.lock();
        let latest = state.history.back();
        ScannerSummary {
            last_scan: latest.map(|s| s.captured_at),
            trending_topics: latest.map(|s| s.trending_topics.clone()).unwrap_or_default(),
            history_len: state.history.len(),
            tracked_npcs: state.engaged_npcs.len(),
            recommendations: latest.map(|s| recommend(s)).unwrap_or_default(),
        }
    }

    fn record(&self, snapshot: Arc<IntelligenceSnapshot>) {
        let mut state = self.lock();
        state.history.push_back(snapshot);
        while state.history.len() > self.config.history_len.max(1) {
            state.history.pop_front();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Sub-scans
    // -----------------------------------------------------------------------

    async fn scan_trending(&self, session: &Session) -> Option<Vec<String>> {
        match session.trending().await {
            Ok(response) => {
                let mut topics = response.body;
                topics.truncate(self.config.trending_limit);
                debug!(count = topics.len(), "trending topics scanned");
                Some(topics)
            }
            Err(e) => {
                warn!(error = %e, "trending scan failed");
                None
            }
        }
    }

    /// Posts matching the sentiment queries; `None` when every search failed.
    async fn sample_sentiment(&self, session: &Session) -> Option<Vec<Post>> {
        let mut posts = Vec::new();
        let mut any_ok = false;
        for (i, query) in self.config.sentiment_queries.iter().enumerate() {
            if i > 0 {
                sleep(self.config.sentiment_pause()).await;
            }
            match session.search(query, self.config.sentiment_results).await {
                Ok(response) => {
                    any_ok = true;
                    posts.extend(response.body);
                }
                Err(e) => warn!(query = %query, error = %e, "sentiment search failed"),
            }
        }
        any_ok.then_some(posts)
    }
}

/// Concatenated posts of several feeds; `None` when every feed failed.
async fn sample_feeds(
    session: &Session,
    kinds: &[FeedKind],
    limit: u32,
) -> Option<Vec<Post>> {
    let results = join_all(kinds.iter().map(|kind| session.feed(*kind, limit))).await;

    let mut posts = Vec::new();
    let mut any_ok = false;
    for (kind, result) in kinds.iter().zip(results) {
        match result {
            Ok(response) => {
                any_ok = true;
                posts.extend(response.body);
            }
            Err(e) => warn!(feed = kind.as_str(), error = %e, "feed scan failed"),
        }
    }
    any_ok.then_some(posts)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Classify and measure a feed sample.
pub fn analyze_feed(posts: &[Post]) -> FeedAnalysis {
    let mut analysis = FeedAnalysis::default();
    let mut mix = ContentMix::default();

    for post in posts {
        analysis.total_posts = analysis.total_posts.saturating_add(1);

        if keywords::is_political(&post.content) {
            analysis.political_posts = analysis.political_posts.saturating_add(1);
            mix.political = mix.political.saturating_add(1);
        } else if keywords::is_trending(&post.content) {
            mix.trending = mix.trending.saturating_add(1);
        } else {
            mix.personal = mix.personal.saturating_add(1);
        }

        let engagement = post.engagement();
        if engagement > 0 {
            analysis
                .engagement_by_author
                .insert(post.username.clone(), engagement);
        }

        if post.replies > DISCUSSION_THRESHOLD {
            analysis.active_discussions.push(Discussion {
                post: post.id.clone(),
                author: post.username.clone(),
                replies: post.replies,
                preview: excerpt(&post.content, PREVIEW_CHARS),
            });
        }
    }

    analysis.content_mix = mix;
    analysis
}

/// Aggregate sentiment over a search sample.
pub fn summarize_sentiment(posts: &[Post]) -> SentimentSummary {
    let mut summary = SentimentSummary::default();

    for post in posts {
        let reading = keywords::sentiment_of(&post.content);
        let key = match (&reading.candidate, reading.polarity) {
            (Some(candidate), _) => {
                let score = summary.support.entry(candidate.clone()).or_insert(0.0);
                *score += reading.strength;
                candidate.clone()
            }
            (None, Polarity::Negative) => {
                summary.voter_disillusionment += reading.strength;
                "negative".to_owned()
            }
            (None, _) => {
                summary.neutral_political = summary.neutral_political.saturating_add(1);
                continue;
            }
        };
        if reading.strength > 0.5 {
            summary
                .samples
                .entry(key)
                .or_default()
                .push(excerpt(&post.content.to_lowercase(), PREVIEW_CHARS));
        }
    }

    summary
}

/// Profile NPC accounts that posted repeatedly in the sample, busiest first.
pub fn profile_npcs(posts: &[Post]) -> Vec<NpcProfile> {
    let mut by_author: BTreeMap<&TargetId, Vec<&Post>> = BTreeMap::new();
    for post in posts.iter().filter(|p| p.username.is_npc()) {
        by_author.entry(&post.username).or_default().push(post);
    }

    let mut profiles: Vec<NpcProfile> = by_author
        .into_iter()
        .filter_map(|(username, posts)| {
            let count = u32::try_from(posts.len()).unwrap_or(u32::MAX);
            (count >= REPEAT_POSTS).then(|| profile_of(username, &posts, count))
        })
        .collect();
    profiles.sort_by(|a, b| b.post_count.cmp(&a.post_count));
    profiles
}

fn profile_of(username: &TargetId, posts: &[&Post], count: u32) -> NpcProfile {
    let joined = posts
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let likes = posts.iter().fold(0_u32, |acc, p| acc.saturating_add(p.likes));
    let replies = posts
        .iter()
        .fold(0_u32, |acc, p| acc.saturating_add(p.replies));
    let divisor = f64::from(count.max(1));

    NpcProfile {
        username: username.clone(),
        interests: keywords::interests_in(&joined),
        avg_likes: f64::from(likes) / divisor,
        avg_replies: f64::from(replies) / divisor,
        post_count: count,
        political_leaning: keywords::sentiment_of(&joined).candidate,
    }
}

/// Keep posts with at least three engagements, most engaged first.
///
/// Posts seen in more than one feed are counted once.
pub fn rank_influential(posts: Vec<Post>) -> Vec<InfluentialPost> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<InfluentialPost> = posts
        .into_iter()
        .filter(|p| p.engagement() >= INFLUENCE_THRESHOLD)
        .filter(|p| seen.insert(p.id.clone()))
        .map(|mut post| {
            let political = keywords::is_political(&post.content);
            post.content = excerpt(&post.content, INFLUENTIAL_CHARS);
            InfluentialPost { post, political }
        })
        .collect();
    ranked.sort_by(|a, b| b.post.engagement().cmp(&a.post.engagement()));
    ranked.truncate(INFLUENTIAL_KEPT);
    ranked
}

/// Opportunities from trending topics, safe influential posts and busy NPCs.
pub fn derive_opportunities(snapshot: &IntelligenceSnapshot) -> Vec<Opportunity> {
    let trending = snapshot.trending_topics.iter().take(3).map(|topic| Opportunity {
        kind: OpportunityKind::AmplifyTrending {
            topic: topic.clone(),
        },
        priority: Priority::High,
    });

    let posts = snapshot
        .influential_posts
        .iter()
        .filter(|p| !p.political)
        .take(2)
        .map(|p| Opportunity {
            kind: OpportunityKind::EngagePost {
                post: p.post.id.clone(),
                author: p.post.username.clone(),
                engagement: p.post.engagement(),
            },
            priority: Priority::Medium,
        });

    let npcs = snapshot.active_npcs.iter().take(3).map(|npc| Opportunity {
        kind: OpportunityKind::EngageNpc {
            npc: npc.username.clone(),
        },
        priority: Priority::Medium,
    });

    trending.chain(posts).chain(npcs).collect()
}

/// Gaps between what the feed shows and what the campaign needs.
pub fn derive_gaps(snapshot: &IntelligenceSnapshot) -> Vec<ContentGap> {
    let mut gaps = Vec::new();

    if let Some(feed) = &snapshot.feed {
        let share = feed.political_share();
        if share < LOW_POLITICAL_SHARE {
            gaps.push(ContentGap::LowPoliticalContent { share });
        }
    }

    let trending_posts = snapshot
        .feed
        .as_ref()
        .map_or(0, |feed| feed.content_mix.trending);
    if !snapshot.trending_topics.is_empty() && trending_posts < MIN_TRENDING_POSTS {
        gaps.push(ContentGap::MissedTrending { trending_posts });
    }

    gaps
}

/// Candidate keys compared for the sentiment lead.
const LEAD_CANDIDATES: (&str, &str) = ("victor", "marina");

/// Suggestions from the sentiment lead, open high-priority opportunities
/// and content gaps, in that order.
pub fn recommend(snapshot: &IntelligenceSnapshot) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(sentiment) = &snapshot.sentiment {
        let (first, second) = LEAD_CANDIDATES;
        let (a, b) = (sentiment.score(first), sentiment.score(second));
        let lead = if a > b {
            Some((first, second))
        } else if b > a {
            Some((second, first))
        } else {
            None
        };
        if let Some((leader, trailing)) = lead {
            recommendations.push(Recommendation::SentimentLead {
                leader: leader.to_owned(),
                trailing: trailing.to_owned(),
            });
        }
    }

    let high_priority = snapshot
        .opportunities
        .iter()
        .filter(|o| o.priority == Priority::High)
        .count();
    if high_priority > 0 {
        recommendations.push(Recommendation::FocusOpportunities {
            count: high_priority,
        });
    }

    if !snapshot.content_gaps.is_empty() {
        recommendations.push(Recommendation::AddressGaps {
            count: snapshot.content_gaps.len(),
        });
    }

    recommendations
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use narrative_types::{AuthToken, PostId};

    use super::*;
    use crate::testing::{MockCall, MockPlatform, post};

    fn session(platform: &Arc<MockPlatform>) -> Session {
        Session::new(
            Arc::clone(platform) as Arc<dyn crate::platform::PlatformClient>,
            AuthToken("token-1".to_owned()),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn feed_analysis_classifies_political_first() {
        let posts = vec![
            post("1", "kate", "Who gets your vote? #election", 2, 5),
            post("2", "tom", "Trending: ferry delays again", 0, 0),
            post("3", "ana", "Made bread today", 1, 0),
        ];
        let analysis = analyze_feed(&posts);
        assert_eq!(analysis.total_posts, 3);
        assert_eq!(analysis.political_posts, 1);
        assert_eq!(analysis.content_mix.political, 1);
        assert_eq!(analysis.content_mix.trending, 1);
        assert_eq!(analysis.content_mix.personal, 1);
        assert_eq!(analysis.engagement_by_author.len(), 2);
        assert_eq!(analysis.active_discussions.len(), 1);
        assert_eq!(
            analysis.active_discussions.first().map(|d| d.post.clone()),
            Some(PostId::new("1"))
        );
    }

    #[test]
    fn sentiment_summary_attributes_support() {
        let posts = vec![
            post("1", "kate", "Victor Hawthorne's economic growth plan is great", 0, 0),
            post("2", "tom", "I hate this election, so disappointed", 0, 0),
            post("3", "ana", "Election day is Tuesday", 0, 0),
        ];
        let summary = summarize_sentiment(&posts);
        assert!(summary.score("victor") > 0.0);
        assert!(summary.score("marina").abs() < f64::EPSILON);
        assert!(summary.voter_disillusionment > 0.0);
        assert_eq!(summary.neutral_political, 1);
        assert_eq!(summary.samples.get("victor").map(Vec::len), Some(1));
        assert_eq!(summary.samples.get("negative").map(Vec::len), Some(1));
    }

    #[test]
    fn only_repeat_npc_posters_are_profiled() {
        let posts = vec![
            post("1", "kate", "Kingston game night", 4, 2),
            post("2", "kate", "Another match downtown", 2, 0),
            post("3", "tom", "Once only", 9, 9),
            post("4", "team@bot", "Bot post", 0, 0),
            post("5", "team@bot", "Bot post again", 0, 0),
        ];
        let profiles = profile_npcs(&posts);
        assert_eq!(profiles.len(), 1);
        let kate = profiles.first().unwrap();
        assert_eq!(kate.username.as_str(), "kate");
        assert_eq!(kate.post_count, 2);
        assert!((kate.avg_likes - 3.0).abs() < f64::EPSILON);
        assert!(kate.interests.contains(&"sports".to_owned()));
        assert!(kate.interests.contains(&"local".to_owned()));
    }

    #[test]
    fn influential_posts_are_sorted_deduplicated_and_truncated() {
        let long = "x".repeat(300);
        let posts = vec![
            post("1", "kate", "meh", 1, 1),
            post("2", "tom", &long, 3, 0),
            post("3", "ana", "vote for change", 10, 2),
            post("3", "ana", "vote for change", 10, 2),
        ];
        let ranked = rank_influential(posts);
        assert_eq!(ranked.len(), 2);
        let first = ranked.first().unwrap();
        assert_eq!(first.post.id, PostId::new("3"));
        assert!(first.political);
        assert_eq!(ranked.get(1).unwrap().post.content.chars().count(), 200);
    }

    #[test]
    fn opportunities_skip_political_posts() {
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.trending_topics = ["a", "b", "c", "d"].map(String::from).to_vec();
        snapshot.influential_posts = rank_influential(vec![
            post("1", "kate", "vote now", 9, 0),
            post("2", "tom", "bake sale", 5, 0),
            post("3", "ana", "lake swim", 4, 0),
            post("4", "bo", "garden tour", 3, 0),
        ]);
        let opportunities = derive_opportunities(&snapshot);
        let high = opportunities
            .iter()
            .filter(|o| o.priority == Priority::High)
            .count();
        assert_eq!(high, 3);
        let engaged: Vec<_> = opportunities
            .iter()
            .filter_map(|o| match &o.kind {
                OpportunityKind::EngagePost { post, .. } => Some(post.as_str().to_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(engaged, vec!["2", "3"]);
    }

    #[test]
    fn gaps_flag_low_politics_and_missed_trends() {
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.trending_topics = vec!["ferry".to_owned()];
        snapshot.feed = Some(analyze_feed(&[post("1", "kate", "Made bread today", 0, 0)]));
        let gaps = derive_gaps(&snapshot);
        assert_eq!(gaps.len(), 2);
        assert!(matches!(gaps.first(), Some(ContentGap::LowPoliticalContent { .. })));
        assert_eq!(
            gaps.get(1),
            Some(&ContentGap::MissedTrending { trending_posts: 0 })
        );
    }

    #[test]
    fn recommendations_follow_sentiment_opportunities_and_gaps() {
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        assert!(recommend(&snapshot).is_empty());

        snapshot.trending_topics = vec!["ferry".to_owned(), "festival".to_owned()];
        snapshot.feed = Some(analyze_feed(&[post("1", "kate", "Made bread today", 0, 0)]));
        let mut sentiment = SentimentSummary::default();
        sentiment.support.insert("marina".to_owned(), 1.5);
        sentiment.support.insert("victor".to_owned(), 0.5);
        snapshot.sentiment = Some(sentiment);
        snapshot.opportunities = derive_opportunities(&snapshot);
        snapshot.content_gaps = derive_gaps(&snapshot);

        assert_eq!(
            recommend(&snapshot),
            vec![
                Recommendation::SentimentLead {
                    leader: "marina".to_owned(),
                    trailing: "victor".to_owned(),
                },
                Recommendation::FocusOpportunities { count: 2 },
                Recommendation::AddressGaps { count: 2 },
            ]
        );
    }

    #[test]
    fn tied_sentiment_has_no_lead() {
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.sentiment = Some(SentimentSummary::default());
        assert!(recommend(&snapshot).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_isolates_failed_sections() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_trending(vec!["ferry".to_owned(), "festival".to_owned()]);
        platform.set_feed(
            FeedKind::Explore,
            vec![
                post("1", "kate", "Kingston game night", 4, 2),
                post("2", "kate", "Downtown match", 2, 0),
            ],
        );
        platform.fail(MockCall::Search);

        let scanner = EnvironmentalScanner::new(ScannerConfig::default());
        let snapshot = scanner.scan(&session(&platform)).await;

        assert_eq!(snapshot.trending_topics.len(), 2);
        assert!(snapshot.sentiment.is_none());
        assert!(snapshot.feed.is_some());
        assert_eq!(snapshot.npc_handles(), vec![TargetId::from("kate")]);
        assert!(snapshot.influential_posts.iter().any(|p| p.post.id == PostId::new("1")));
        let summary = scanner.summary();
        assert_eq!(summary.history_len, 1);
        assert!(
            summary
                .recommendations
                .contains(&Recommendation::FocusOpportunities { count: 2 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_bounded() {
        let platform = Arc::new(MockPlatform::new());
        let scanner = EnvironmentalScanner::new(ScannerConfig {
            history_len: 2,
            ..ScannerConfig::default()
        });
        let session = session(&platform);
        for _ in 0..4 {
            scanner.scan(&session).await;
        }
        assert_eq!(scanner.summary().history_len, 2);
        assert!(scanner.latest().is_some());
    }

    #[test]
    fn tracked_engagements_keep_only_npcs() {
        let scanner = EnvironmentalScanner::new(ScannerConfig::default());
        scanner.track_engaged([TargetId::from("kate"), TargetId::from("team@bot")]);
        scanner.track_engaged([TargetId::from("kate")]);
        assert_eq!(scanner.summary().tracked_npcs, 1);
        assert_eq!(scanner.summary().last_scan, None);
    }
}
