//! Strategy engine.
//!
//! Turns the latest intelligence, the agent's stats and any queued
//! coordination directives into exactly one [`ActionDescriptor`] per call.
//!
//! Directives always preempt organic decisions. Organic decisions depend on
//! the campaign phase: audience building favours persona posts and light
//! engagement, political influence keeps the share of political posts in
//! the recent history at the configured target. Every decision is recorded
//! in a bounded history that feeds back into the political-share check.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use narrative_types::{
    ActionDescriptor, ActionKind, ActionRecord, AgentStats, CampaignObjective,
    CoordinationDirective, DirectiveKind, EngagementKind, IntelligenceSnapshot, Intensity,
    Persona, Phase, TargetId,
};
use narrative_types::{ContentKind, ContentSpec};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::config::StrategyConfig;

/// Neighbourhood terms mixed into community searches.
const COMMUNITY_TERMS: [&str; 4] = ["kingston", "local", "community", "downtown"];

/// Terms appended to a trending topic to find political takes on it.
const POLITICAL_TERMS: [&str; 4] = ["vote", "election", "candidate", "policy"];

/// Issues a political post may be framed around.
const ISSUES: [&str; 6] = [
    "economy",
    "healthcare",
    "education",
    "environment",
    "jobs",
    "housing",
];

/// Interests assumed for a persona that lists none.
const DEFAULT_INTERESTS: [&str; 2] = ["community", "local"];

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Base weights of the organic branches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    /// Creating posts.
    pub post: f64,
    /// Engaging with other posts.
    pub engagement: f64,
    /// Riding trending topics.
    pub trending: f64,
    /// Targeting NPC accounts.
    pub npc: f64,
}

impl Weights {
    /// Initial weights for a campaign objective.
    pub const fn for_objective(objective: CampaignObjective) -> Self {
        let (post, engagement) = match objective {
            CampaignObjective::SupportVictor => (0.5, 0.3),
            CampaignObjective::SupportMarina => (0.4, 0.4),
            CampaignObjective::VoterDisillusionment => (0.3, 0.5),
        };
        Self {
            post,
            engagement,
            trending: 0.2,
            npc: 0.1,
        }
    }

    fn clamp(&mut self, floor: f64, ceiling: f64) {
        let (low, high) = (floor.min(ceiling), floor.max(ceiling));
        if low.is_nan() || high.is_nan() {
            return;
        }
        for weight in [
            &mut self.post,
            &mut self.engagement,
            &mut self.trending,
            &mut self.npc,
        ] {
            *weight = weight.clamp(low, high);
        }
    }
}

/// Pick an option by cumulative weight over a uniform draw in `[0, total)`.
///
/// Negative and non-finite weights count as zero. When no weight is
/// positive the first option is returned. `None` only for no options.
pub fn weighted_choice<T: Copy>(options: &[(T, f64)], rng: &mut impl Rng) -> Option<T> {
    fn usable(weight: f64) -> f64 {
        if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        }
    }

    let (first, _) = *options.first()?;
    let total: f64 = options.iter().map(|(_, w)| usable(*w)).sum();
    if !total.is_finite() || total <= 0.0 {
        return Some(first);
    }

    let draw = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (option, weight) in options {
        cumulative += usable(*weight);
        if draw < cumulative {
            return Some(*option);
        }
    }
    // Rounding left the draw past the last boundary.
    options
        .iter()
        .rev()
        .find(|(_, w)| usable(*w) > 0.0)
        .map_or(Some(first), |(option, _)| Some(*option))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Organic branches of the audience-building phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudienceBranch {
    PersonalPost,
    EngageTrending,
    Community,
}

/// Organic branches of the political-influence phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfluenceBranch {
    NeutralPost,
    PoliticalEngagement,
    NpcTargeting,
    TrendingPolitical,
}

/// Strategy state as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStatus {
    /// Campaign objective.
    pub objective: CampaignObjective,
    /// Persona name.
    pub persona: String,
    /// Current base weights.
    pub weights: Weights,
    /// Decisions in the history.
    pub history_len: usize,
    /// Directives waiting in the queue.
    pub directives_pending: usize,
    /// Executed actions per `{action}_{content}` key.
    pub metrics: BTreeMap<String, u64>,
}

/// Decides an agent's next action.
#[derive(Debug)]
pub struct StrategyEngine {
    objective: CampaignObjective,
    persona: Persona,
    config: StrategyConfig,
    weights: Weights,
    context: Option<Arc<IntelligenceSnapshot>>,
    directives: Vec<CoordinationDirective>,
    cooldowns: BTreeMap<ActionKind, DateTime<Utc>>,
    history: VecDeque<ActionRecord>,
    metrics: BTreeMap<String, u64>,
    rng: StdRng,
}

impl StrategyEngine {
    /// Create an engine with objective-specific initial weights.
    pub fn new(objective: CampaignObjective, persona: Persona, config: StrategyConfig) -> Self {
        Self {
            objective,
            persona,
            config,
            weights: Weights::for_objective(objective),
            context: None,
            directives: Vec::new(),
            cooldowns: BTreeMap::new(),
            history: VecDeque::new(),
            metrics: BTreeMap::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Use a fixed seed for reproducible decisions.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Current base weights.
    pub const fn weights(&self) -> Weights {
        self.weights
    }

    /// Decisions in the history, oldest first.
    pub const fn history(&self) -> &VecDeque<ActionRecord> {
        &self.history
    }

    /// Directives waiting in the queue.
    pub fn pending_directives(&self) -> usize {
        self.directives.len()
    }

    /// Replace the decision context with a new snapshot and adjust weights.
    ///
    /// A rival candidate ahead in sentiment boosts posting (and, for Victor,
    /// damps engagement); more than three trending topics boost trend riding.
    pub fn update_context(&mut self, snapshot: Arc<IntelligenceSnapshot>) {
        if let (Some(candidate), Some(rival), Some(sentiment)) = (
            self.objective.candidate(),
            self.objective.rival(),
            snapshot.sentiment.as_ref(),
        ) {
            if sentiment.score(rival) > sentiment.score(candidate) {
                self.weights.post *= 1.2;
                if self.objective == CampaignObjective::SupportVictor {
                    self.weights.engagement *= 0.9;
                }
            }
        }
        if snapshot.trending_topics.len() > 3 {
            self.weights.trending *= 1.3;
        }
        self.weights
            .clamp(self.config.weight_floor, self.config.weight_ceiling);
        self.context = Some(snapshot);
    }

    /// Queue a directive, evicting the lowest-priority, oldest one when full.
    pub fn push_directive(&mut self, directive: CoordinationDirective) {
        debug!(
            kind = directive.kind.as_str(),
            priority = ?directive.priority,
            "directive queued"
        );
        self.directives.push(directive);
        while self.directives.len() > self.config.directive_capacity {
            let evict = self
                .directives
                .iter()
                .enumerate()
                .min_by_key(|(_, d)| (d.priority, d.issued_at))
                .map(|(i, _)| i);
            match evict {
                Some(i) => {
                    let evicted = self.directives.remove(i);
                    debug!(kind = evicted.kind.as_str(), "directive evicted");
                }
                None => break,
            }
        }
    }

    /// Decide the next action.
    pub fn next_action(
        &mut self,
        phase: Phase,
        stats: &AgentStats,
        now: DateTime<Utc>,
    ) -> ActionDescriptor {
        self.directives.retain(|d| !d.is_expired(now));

        let (action, from_directive) = match self.take_directive(now) {
            Some(action) => (action, true),
            None => {
                let action = match phase {
                    Phase::AudienceBuilding => self.audience_building_action(),
                    Phase::PoliticalInfluence => self.political_influence_action(),
                };
                (action, false)
            }
        };

        self.history.push_back(ActionRecord {
            action: action.clone(),
            phase,
            decided_at: now,
            from_directive,
            trending_topics: self.trending().to_vec(),
        });
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }

        self.adapt_weights(stats);
        debug!(
            action = action.kind().as_str(),
            from_directive,
            "next action decided"
        );
        action
    }

    /// Record an executed action: start its directive cooldown and count it.
    pub fn record_result(&mut self, action: &ActionDescriptor, now: DateTime<Utc>) {
        let until = now
            .checked_add_signed(self.config.cooldown())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.cooldowns.insert(action.kind(), until);
        let key = format!(
            "{}_{}",
            action.kind().as_str(),
            action.content_kind().map_or("none", ContentKind::as_str)
        );
        let count = self.metrics.entry(key).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Operator status.
    pub fn status(&self) -> StrategyStatus {
        StrategyStatus {
            objective: self.objective,
            persona: self.persona.name.clone(),
            weights: self.weights,
            history_len: self.history.len(),
            directives_pending: self.directives.len(),
            metrics: self.metrics.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Directives
    // -----------------------------------------------------------------------

    fn take_directive(&mut self, now: DateTime<Utc>) -> Option<ActionDescriptor> {
        let index = self
            .directives
            .iter()
            .enumerate()
            .filter(|(_, d)| !self.cooling_down(directive_action_kind(d.kind), now))
            .filter(|(_, d)| self.can_execute(d))
            .max_by_key(|(_, d)| (d.priority, Reverse(d.issued_at)))
            .map(|(i, _)| i)?;
        let directive = self.directives.remove(index);
        Some(self.convert_directive(&directive))
    }

    fn cooling_down(&self, kind: ActionKind, now: DateTime<Utc>) -> bool {
        self.cooldowns.get(&kind).is_some_and(|until| *until > now)
    }

    fn can_execute(&self, directive: &CoordinationDirective) -> bool {
        match directive.kind {
            DirectiveKind::AmplifyTrending => {
                !directive.targets.is_empty() || !self.trending().is_empty()
            }
            DirectiveKind::CoordinatedNpcEngagement | DirectiveKind::CampaignPush => true,
        }
    }

    fn convert_directive(&mut self, directive: &CoordinationDirective) -> ActionDescriptor {
        match directive.kind {
            DirectiveKind::AmplifyTrending => {
                let topic = if directive.targets.is_empty() {
                    self.trending().to_vec().choose(&mut self.rng).cloned()
                } else {
                    directive.targets.choose(&mut self.rng).cloned()
                };
                let mut content = ContentSpec::of(ContentKind::TrendingEngagement);
                content.topic = topic;
                content.interests = self.interests(3);
                content.coordinated = true;
                ActionDescriptor::Post { content }
            }
            DirectiveKind::CoordinatedNpcEngagement => {
                let query = match directive.targets.choose(&mut self.rng) {
                    Some(npc) => format!("from:{npc}"),
                    None => self.community_query(),
                };
                ActionDescriptor::SearchAndEngage {
                    query,
                    limit: 2,
                    kinds: vec![EngagementKind::Reply, EngagementKind::Like],
                    trending: false,
                }
            }
            DirectiveKind::CampaignPush => {
                let mut content = self.political_content();
                content.objective = Some(directive.objective.unwrap_or(self.objective));
                content.coordinated = true;
                content.intensity = Intensity::High;
                ActionDescriptor::Post { content }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Organic decisions
    // -----------------------------------------------------------------------

    fn audience_building_action(&mut self) -> ActionDescriptor {
        let options = [
            (AudienceBranch::PersonalPost, self.weights.post * 1.2),
            (AudienceBranch::EngageTrending, self.weights.trending * 1.5),
            (AudienceBranch::Community, self.weights.engagement * 1.1),
        ];
        let branch =
            weighted_choice(&options, &mut self.rng).unwrap_or(AudienceBranch::PersonalPost);

        match branch {
            AudienceBranch::PersonalPost => {
                let mut content = ContentSpec::of(ContentKind::AudienceBuilding);
                content.interests = self.interests(3);
                content.tone = Some(if self.persona.tone.is_empty() {
                    "casual".to_owned()
                } else {
                    self.persona.tone.clone()
                });
                ActionDescriptor::Post { content }
            }
            AudienceBranch::EngageTrending => ActionDescriptor::SearchAndEngage {
                query: self.trending_query(),
                limit: 2,
                kinds: vec![EngagementKind::Like, EngagementKind::Reply],
                trending: true,
            },
            AudienceBranch::Community => ActionDescriptor::SearchAndEngage {
                query: self.community_query(),
                limit: 3,
                kinds: vec![EngagementKind::Like, EngagementKind::Reply],
                trending: false,
            },
        }
    }

    fn political_influence_action(&mut self) -> ActionDescriptor {
        if self.recent_political_ratio() < self.config.political_target {
            return ActionDescriptor::Post {
                content: self.political_content(),
            };
        }

        let options = [
            (InfluenceBranch::NeutralPost, 0.4),
            (InfluenceBranch::PoliticalEngagement, 0.3),
            (InfluenceBranch::NpcTargeting, 0.2),
            (InfluenceBranch::TrendingPolitical, 0.1),
        ];
        let branch =
            weighted_choice(&options, &mut self.rng).unwrap_or(InfluenceBranch::NeutralPost);

        match branch {
            InfluenceBranch::NeutralPost => {
                let mut content = ContentSpec::of(ContentKind::Neutral);
                content.interests = self.interests(2);
                content.tone = Some("friendly".to_owned());
                ActionDescriptor::Post { content }
            }
            InfluenceBranch::PoliticalEngagement => ActionDescriptor::SearchAndEngage {
                query: self.political_query(),
                limit: 2,
                kinds: vec![EngagementKind::Reply, EngagementKind::Like],
                trending: false,
            },
            InfluenceBranch::NpcTargeting => self.npc_targeting_action(),
            InfluenceBranch::TrendingPolitical => ActionDescriptor::SearchAndEngage {
                query: self.trending_political_query(),
                limit: 1,
                kinds: vec![EngagementKind::Reply],
                trending: true,
            },
        }
    }

    fn npc_targeting_action(&mut self) -> ActionDescriptor {
        let npcs: Vec<TargetId> = self
            .context
            .as_ref()
            .map(|c| c.npc_handles())
            .unwrap_or_default();
        match npcs.choose(&mut self.rng) {
            Some(npc) => ActionDescriptor::SearchAndEngage {
                query: format!("from:{npc}"),
                limit: 1,
                kinds: vec![EngagementKind::Reply, EngagementKind::Like],
                trending: false,
            },
            None => ActionDescriptor::SearchAndEngage {
                query: self.community_query(),
                limit: 2,
                kinds: vec![EngagementKind::Like],
                trending: false,
            },
        }
    }

    fn political_content(&self) -> ContentSpec {
        let mut content = ContentSpec::of(ContentKind::Political);
        content.objective = Some(self.objective);
        content.issues = relevant_issues(&self.persona.interests, self.objective);
        content.topic = self.trending().first().cloned();
        content
    }

    /// Political share of the posts in the decision history; zero when empty.
    #[allow(clippy::cast_precision_loss)]
    fn recent_political_ratio(&self) -> f64 {
        let posts = self
            .history
            .iter()
            .filter(|r| r.action.kind() == ActionKind::Post)
            .count();
        let political = self
            .history
            .iter()
            .filter(|r| r.action.is_political_post())
            .count();
        political as f64 / posts.max(1) as f64
    }

    /// Nudge weights toward the political target from lifetime stats.
    #[allow(clippy::cast_precision_loss)]
    fn adapt_weights(&mut self, stats: &AgentStats) {
        let ratio = stats.political_posts as f64 / stats.posts_created.max(1) as f64;
        let target = self.config.political_target;
        if (ratio - target).abs() > self.config.deviation_threshold {
            if ratio < target {
                self.weights.post *= self.config.adaptation_step;
            } else {
                self.weights.engagement *= self.config.adaptation_step;
            }
        }
        self.weights
            .clamp(self.config.weight_floor, self.config.weight_ceiling);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn trending(&self) -> &[String] {
        self.context
            .as_ref()
            .map_or(&[], |c| c.trending_topics.as_slice())
    }

    fn interests(&self, n: usize) -> Vec<String> {
        self.persona.interests.iter().take(n).cloned().collect()
    }

    /// A trending topic matching a persona interest, else the top topic,
    /// else a persona interest.
    fn trending_query(&mut self) -> String {
        let trending = self.trending();
        let matched = trending.iter().find(|topic| {
            let topic = topic.to_lowercase();
            self.persona
                .interests
                .iter()
                .any(|interest| topic.contains(&interest.to_lowercase()))
        });
        if let Some(topic) = matched.or_else(|| trending.first()) {
            return topic.clone();
        }
        self.random_interest()
    }

    fn political_query(&mut self) -> String {
        let queries: [&str; 4] = match self.objective {
            CampaignObjective::SupportVictor => ["victor hawthorne", "economy", "business", "jobs"],
            CampaignObjective::SupportMarina => ["marina", "progressive", "climate", "healthcare"],
            CampaignObjective::VoterDisillusionment => {
                ["politics", "election", "disappointed", "system"]
            }
        };
        queries
            .choose(&mut self.rng)
            .map_or_else(String::new, |q| (*q).to_owned())
    }

    fn community_query(&mut self) -> String {
        let terms: Vec<String> = COMMUNITY_TERMS
            .iter()
            .map(|t| (*t).to_owned())
            .chain(self.interests(3))
            .collect();
        terms
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "kingston".to_owned())
    }

    fn trending_political_query(&mut self) -> String {
        let term = POLITICAL_TERMS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("election");
        match self.trending().first() {
            Some(topic) => format!("{topic} {term}"),
            None => term.to_owned(),
        }
    }

    fn random_interest(&mut self) -> String {
        if self.persona.interests.is_empty() {
            DEFAULT_INTERESTS
                .choose(&mut self.rng)
                .map_or_else(String::new, |i| (*i).to_owned())
        } else {
            self.persona
                .interests
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_default()
        }
    }
}

/// The action kind a directive turns into, for cooldown checks.
const fn directive_action_kind(kind: DirectiveKind) -> ActionKind {
    match kind {
        DirectiveKind::AmplifyTrending | DirectiveKind::CampaignPush => ActionKind::Post,
        DirectiveKind::CoordinatedNpcEngagement => ActionKind::SearchAndEngage,
    }
}

/// Up to three issues for a political post: persona-related issues first,
/// then the objective's own.
pub fn relevant_issues(interests: &[String], objective: CampaignObjective) -> Vec<String> {
    let from_interests = ISSUES.iter().copied().filter(|issue| {
        interests
            .iter()
            .any(|interest| interest.contains(issue) || issue.contains(interest.as_str()))
    });
    let from_objective: &[&str] = match objective {
        CampaignObjective::SupportVictor => &["economy", "jobs", "business"],
        CampaignObjective::SupportMarina => &["environment", "healthcare", "education"],
        CampaignObjective::VoterDisillusionment => &[],
    };

    let mut issues: Vec<String> = Vec::new();
    for issue in from_interests.chain(from_objective.iter().copied()) {
        if issues.len() == 3 {
            break;
        }
        if !issues.iter().any(|i| i == issue) {
            issues.push(issue.to_owned());
        }
    }
    issues
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use narrative_types::{NpcProfile, Priority, SentimentSummary};

    use super::*;

    fn persona() -> Persona {
        Persona {
            name: "kingston_local".to_owned(),
            interests: vec!["hiking".to_owned(), "coffee".to_owned(), "jobs market".to_owned()],
            tone: "casual".to_owned(),
            political_leanings: BTreeMap::new(),
        }
    }

    fn engine(seed: u64) -> StrategyEngine {
        StrategyEngine::new(
            CampaignObjective::SupportVictor,
            persona(),
            StrategyConfig::default(),
        )
        .with_seed(seed)
    }

    fn directive(
        kind: DirectiveKind,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> CoordinationDirective {
        CoordinationDirective {
            kind,
            targets: vec!["ferry".to_owned()],
            priority,
            objective: None,
            issued_at: now,
            expires_at: now.checked_add_signed(Duration::minutes(10)).unwrap(),
        }
    }

    fn record(kind: ContentKind, now: DateTime<Utc>) -> ActionRecord {
        ActionRecord {
            action: ActionDescriptor::Post {
                content: ContentSpec::of(kind),
            },
            phase: Phase::PoliticalInfluence,
            decided_at: now,
            from_directive: false,
            trending_topics: Vec::new(),
        }
    }

    #[test]
    fn zero_weights_pick_the_first_option() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = [("a", 0.0), ("b", 0.0), ("c", 0.0)];
        for _ in 0..100 {
            assert_eq!(weighted_choice(&options, &mut rng), Some("a"));
        }
        let broken = [("a", f64::NAN), ("b", -1.0)];
        assert_eq!(weighted_choice(&broken, &mut rng), Some("a"));
        let none: [(&str, f64); 0] = [];
        assert_eq!(weighted_choice(&none, &mut rng), None);
    }

    #[test]
    fn zero_weight_options_are_never_picked() {
        let mut rng = StdRng::seed_from_u64(2);
        let options = [("never", 0.0), ("always", 1.0), ("negative", -3.0)];
        for _ in 0..200 {
            assert_eq!(weighted_choice(&options, &mut rng), Some("always"));
        }
    }

    #[test]
    fn low_political_ratio_forces_political_posts() {
        let now = Utc::now();
        for seed in 0..50 {
            let mut engine = engine(seed);
            for _ in 0..5 {
                engine.history.push_back(record(ContentKind::Neutral, now));
            }
            engine.history.push_back(record(ContentKind::Political, now));
            let action =
                engine.next_action(Phase::PoliticalInfluence, &AgentStats::default(), now);
            assert!(action.is_political_post(), "seed {seed} produced {action:?}");
        }
    }

    #[test]
    fn audience_building_never_posts_politics() {
        let now = Utc::now();
        let mut engine = engine(9);
        for _ in 0..100 {
            let action = engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), now);
            assert!(!action.is_political_post());
        }
        assert_eq!(engine.history().len(), 20);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn political_phase_holds_target_share() {
        let now = Utc::now();
        let mut engine = engine(4);
        let (mut posts, mut political) = (0_u32, 0_u32);
        for _ in 0..400 {
            let action =
                engine.next_action(Phase::PoliticalInfluence, &AgentStats::default(), now);
            if action.kind() == ActionKind::Post {
                posts = posts.saturating_add(1);
            }
            if action.is_political_post() {
                political = political.saturating_add(1);
            }
        }
        assert!(f64::from(political) / f64::from(posts.max(1)) >= 0.3);
    }

    #[test]
    fn directives_preempt_organic_decisions() {
        let now = Utc::now();
        let mut engine = engine(5);
        engine.push_directive(directive(DirectiveKind::CampaignPush, Priority::High, now));
        let action = engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), now);
        let expected = ContentSpec {
            objective: Some(CampaignObjective::SupportVictor),
            issues: vec!["jobs".to_owned(), "economy".to_owned(), "business".to_owned()],
            coordinated: true,
            intensity: Intensity::High,
            ..ContentSpec::of(ContentKind::Political)
        };
        assert_eq!(action, ActionDescriptor::Post { content: expected });
        assert!(engine.history().back().unwrap().from_directive);
        assert_eq!(engine.pending_directives(), 0);
    }

    #[test]
    fn highest_priority_directive_goes_first() {
        let now = Utc::now();
        let mut engine = engine(6);
        engine.push_directive(directive(DirectiveKind::AmplifyTrending, Priority::Medium, now));
        engine.push_directive(directive(
            DirectiveKind::CoordinatedNpcEngagement,
            Priority::High,
            now,
        ));
        let action = engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), now);
        assert_eq!(
            action,
            ActionDescriptor::SearchAndEngage {
                query: "from:ferry".to_owned(),
                limit: 2,
                kinds: vec![EngagementKind::Reply, EngagementKind::Like],
                trending: false,
            }
        );
        assert_eq!(engine.pending_directives(), 1);
    }

    #[test]
    fn expired_directives_are_discarded() {
        let now = Utc::now();
        let mut engine = engine(7);
        let mut stale = directive(DirectiveKind::CampaignPush, Priority::Urgent, now);
        stale.expires_at = now;
        engine.push_directive(stale);
        engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), now);
        assert_eq!(engine.pending_directives(), 0);
        assert!(!engine.history().back().unwrap().from_directive);
    }

    #[test]
    fn cooldown_holds_directives_but_not_organic_actions() {
        let now = Utc::now();
        let mut engine = engine(8);
        let post = ActionDescriptor::Post {
            content: ContentSpec::of(ContentKind::Neutral),
        };
        engine.record_result(&post, now);
        engine.push_directive(directive(DirectiveKind::AmplifyTrending, Priority::High, now));

        engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), now);
        assert!(!engine.history().back().unwrap().from_directive);
        assert_eq!(engine.pending_directives(), 1);

        let later = now.checked_add_signed(Duration::minutes(6)).unwrap();
        let action = engine.next_action(Phase::AudienceBuilding, &AgentStats::default(), later);
        assert!(engine.history().back().unwrap().from_directive);
        assert_eq!(action.content_kind(), Some(ContentKind::TrendingEngagement));
        assert_eq!(engine.status().metrics.get("post_neutral"), Some(&1));
    }

    #[test]
    fn full_queue_evicts_lowest_priority_oldest() {
        let now = Utc::now();
        let mut engine = engine(10);
        engine.push_directive(directive(DirectiveKind::CampaignPush, Priority::Low, now));
        for i in 0..16 {
            engine.push_directive(directive(
                DirectiveKind::AmplifyTrending,
                Priority::High,
                now.checked_add_signed(Duration::seconds(i)).unwrap(),
            ));
        }
        assert_eq!(engine.pending_directives(), 16);
        assert!(engine.directives.iter().all(|d| d.priority == Priority::High));
    }

    #[test]
    fn weights_stay_clamped_under_sustained_drift() {
        let now = Utc::now();
        let mut engine = engine(11);
        let stats = AgentStats {
            posts_created: 10,
            political_posts: 0,
            ..AgentStats::default()
        };
        for _ in 0..200 {
            engine.next_action(Phase::AudienceBuilding, &stats, now);
        }
        assert!((engine.weights().post - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rival_lead_boosts_posting() {
        let mut engine = engine(12);
        let before = engine.weights();
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.sentiment = Some(SentimentSummary {
            support: BTreeMap::from([("marina".to_owned(), 3.0), ("victor".to_owned(), 1.0)]),
            ..SentimentSummary::default()
        });
        snapshot.trending_topics = ["a", "b", "c", "d"].map(String::from).to_vec();
        engine.update_context(Arc::new(snapshot));
        let after = engine.weights();
        assert!(after.post > before.post);
        assert!(after.engagement < before.engagement);
        assert!(after.trending > before.trending);
    }

    #[test]
    fn npc_targeting_searches_known_npcs() {
        let mut engine = engine(13);
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.active_npcs = vec![NpcProfile {
            username: TargetId::from("kate"),
            interests: Vec::new(),
            avg_likes: 0.0,
            avg_replies: 0.0,
            post_count: 2,
            political_leaning: None,
        }];
        engine.update_context(Arc::new(snapshot));
        assert_eq!(
            engine.npc_targeting_action(),
            ActionDescriptor::SearchAndEngage {
                query: "from:kate".to_owned(),
                limit: 1,
                kinds: vec![EngagementKind::Reply, EngagementKind::Like],
                trending: false,
            }
        );
    }

    #[test]
    fn trending_query_prefers_persona_interests() {
        let mut engine = engine(14);
        let mut snapshot = IntelligenceSnapshot::empty(Utc::now());
        snapshot.trending_topics = vec!["ferry".to_owned(), "Coffee prices".to_owned()];
        engine.update_context(Arc::new(snapshot));
        assert_eq!(engine.trending_query(), "Coffee prices");
    }

    #[test]
    fn issues_mix_persona_and_objective() {
        let interests = vec!["housing".to_owned(), "jobs market".to_owned()];
        assert_eq!(
            relevant_issues(&interests, CampaignObjective::SupportVictor),
            vec!["jobs", "housing", "economy"]
        );
        assert!(relevant_issues(&[], CampaignObjective::VoterDisillusionment).is_empty());
    }
}
