//! Text generation for posts and replies.
//!
//! Agents ask a [`TextGenerator`] for text and never see which backend
//! answered. The production generator is a [`ProviderChain`]: configured LLM
//! backends tried in order, each behind its own request budget and
//! deadline, with a [`CannedFallback`] when none of them produces usable
//! text.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use narrative_limiter::{LimiterError, RateLimiter};
use narrative_types::{CampaignObjective, ContentKind, ContentSpec, Intensity, Persona, Post};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{GenerationConfig, Sampling};
use crate::error::GenerationError;
use crate::keywords::POLITICAL_KEYWORDS;
use crate::llm::{LlmBackend, create_backend};

/// Replies used when nothing better is available.
pub const GENERIC_REPLIES: [&str; 4] = [
    "Interesting perspective!",
    "Thanks for sharing this.",
    "Good point to consider.",
    "Appreciate your thoughts on this.",
];

/// Shortest generated text accepted, in characters.
const MIN_GENERATED_CHARS: usize = 10;

/// Phrases that mark a refusal or an out-of-character answer.
const REJECTED_PHRASES: [&str; 3] = ["as an ai", "i am an ai", "i cannot"];

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// What the text is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    /// A new top-level post.
    Post(ContentSpec),
    /// A reply to somebody else's post.
    Reply {
        /// The post being answered.
        to: Post,
        /// Why the agent is replying.
        context: ReplyContext,
    },
}

/// Why an agent is replying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyContext {
    /// Engaging with a post found by search or scan.
    #[default]
    Engagement,
    /// The author mentioned the agent.
    Mention,
    /// The author replied to the agent; keep the thread going.
    Continuation,
}

/// Everything a generator needs to write one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Persona to write as.
    pub persona: Persona,
    /// Campaign objective of the fleet.
    pub objective: CampaignObjective,
    /// Post or reply.
    pub purpose: Purpose,
    /// Trending topics known to the agent.
    pub trending: Vec<String>,
}

impl GenerationRequest {
    /// Short label for logs and errors.
    pub const fn label(&self) -> &'static str {
        match &self.purpose {
            Purpose::Post(spec) => match spec.kind {
                ContentKind::AudienceBuilding => "audience_building post",
                ContentKind::Political => "political post",
                ContentKind::Neutral => "neutral post",
                ContentKind::TrendingEngagement => "trending post",
            },
            Purpose::Reply { .. } => "reply",
        }
    }
}

/// Produces post and reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Text for the request, or `None` when nothing usable could be produced.
    async fn generate(&self, request: &GenerationRequest) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

/// A prompt split into system and user parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Persona and setting.
    pub system: String,
    /// The concrete writing task.
    pub user: String,
}

impl RenderedPrompt {
    /// Both parts joined, for completion APIs without a system role.
    pub fn flattened(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Render a request into a prompt.
pub fn render_prompt(request: &GenerationRequest, max_len: usize) -> RenderedPrompt {
    let persona = &request.persona;
    let mut system = format!(
        "You are a resident of Kingston posting on a local social network.\n\
         Persona: {}\nTone: {}\nInterests: {}",
        persona.name,
        persona.tone,
        persona.interests.join(", "),
    );
    if !request.trending.is_empty() {
        system.push_str(&format!(
            "\nTrending right now: {}",
            request.trending.join(", ")
        ));
    }

    let mut user = match &request.purpose {
        Purpose::Post(spec) => post_task(spec, persona, request.objective),
        Purpose::Reply { to, context } => reply_task(to, *context, request.objective),
    };
    user.push_str(&format!(
        "\nKeep it under {max_len} characters, write in your own voice, \
         and respond with only the text, no quotation marks."
    ));

    RenderedPrompt { system, user }
}

fn post_task(spec: &ContentSpec, persona: &Persona, objective: CampaignObjective) -> String {
    let mut task = match spec.kind {
        ContentKind::AudienceBuilding => String::from(
            "Write a casual, non-political post about daily life, local Kingston \
             topics or your hobbies. Avoid politics and candidates entirely.",
        ),
        ContentKind::Neutral => String::from(
            "Write a friendly everyday post about your community. Do not mention politics.",
        ),
        ContentKind::TrendingEngagement => String::from(
            "Write a post reacting to a trending topic from your own perspective \
             and invite others to weigh in.",
        ),
        ContentKind::Political => {
            let mut political = format!(
                "Write a post that {} while sounding like an ordinary resident, \
                 not campaign material.",
                objective_stance(objective)
            );
            if let Some(approach) = persona.political_leanings.get(objective.as_str()) {
                political.push_str(&format!(" Your angle: {approach}."));
            }
            if !spec.issues.is_empty() {
                political.push_str(&format!(" Touch on: {}.", spec.issues.join(", ")));
            }
            political
        }
    };
    if let Some(topic) = &spec.topic {
        task.push_str(&format!("\nTopic: {topic}"));
    }
    if !spec.interests.is_empty() {
        task.push_str(&format!("\nDraw on: {}", spec.interests.join(", ")));
    }
    if let Some(tone) = &spec.tone {
        task.push_str(&format!("\nTone: {tone}"));
    }
    if spec.intensity == Intensity::High {
        task.push_str("\nBe direct and energetic.");
    }
    task
}

fn reply_task(to: &Post, context: ReplyContext, objective: CampaignObjective) -> String {
    let mut task = format!(
        "Reply to this post by @{}:\n\"{}\"",
        to.username, to.content
    );
    match context {
        ReplyContext::Mention => task.push_str("\nThey mentioned you; respond to them directly."),
        ReplyContext::Continuation => task.push_str("\nThis continues a conversation with them."),
        ReplyContext::Engagement => {}
    }
    let lowered = to.content.to_lowercase();
    if POLITICAL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        task.push_str(&format!(
            "\nIf politics comes up, you {}.",
            objective_stance(objective)
        ));
    }
    task
}

const fn objective_stance(objective: CampaignObjective) -> &'static str {
    match objective {
        CampaignObjective::SupportVictor => "lean toward Victor Hawthorne",
        CampaignObjective::SupportMarina => "lean toward Marina",
        CampaignObjective::VoterDisillusionment => {
            "express skepticism about the candidates and the process"
        }
    }
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Clean raw model output into postable text.
///
/// Strips wrapping quotes and a leaked `POST:`/`REPLY:` label, rejects
/// refusals and fragments, and truncates to `max_len` characters with an
/// ellipsis.
///
/// # Errors
///
/// Returns [`GenerationError::Rejected`] for text that cannot be posted.
pub fn clean_generated(raw: &str, max_len: usize) -> Result<String, GenerationError> {
    let mut text = raw.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text.trim_start_matches('"').trim_end_matches('"').trim();
    }
    for label in ["post:", "reply:"] {
        let head: String = text.chars().take(label.len()).collect();
        if head.eq_ignore_ascii_case(label) {
            text = text.get(head.len()..).unwrap_or_default().trim_start();
        }
    }

    if text.chars().count() < MIN_GENERATED_CHARS {
        return Err(GenerationError::Rejected("too short".to_owned()));
    }
    let lowered = text.to_lowercase();
    if let Some(phrase) = REJECTED_PHRASES.iter().find(|p| lowered.contains(*p)) {
        return Err(GenerationError::Rejected(format!("contains \"{phrase}\"")));
    }

    if text.chars().count() <= max_len {
        return Ok(text.to_owned());
    }
    let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
    Ok(format!("{}...", kept.trim_end()))
}

// ---------------------------------------------------------------------------
// Canned fallback
// ---------------------------------------------------------------------------

/// Picks configured canned lines when no backend produced text.
///
/// `{topic}` and `{interest}` placeholders are filled from the request.
#[derive(Debug)]
pub struct CannedFallback {
    posts: BTreeMap<ContentKind, Vec<String>>,
    replies: Vec<String>,
    rng: Mutex<StdRng>,
}

impl CannedFallback {
    /// Build from configured lines; missing kinds use built-in lines.
    pub fn new(posts: BTreeMap<ContentKind, Vec<String>>, replies: Vec<String>) -> Self {
        Self {
            posts,
            replies,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Use a fixed seed for reproducible picks.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// A canned line for the request.
    pub fn pick(&self, request: &GenerationRequest) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        match &request.purpose {
            Purpose::Post(spec) => {
                let line = match self.posts.get(&spec.kind).filter(|l| !l.is_empty()) {
                    Some(lines) => lines.choose(&mut *rng).cloned(),
                    None => builtin_posts(spec.kind)
                        .choose(&mut *rng)
                        .map(|l| (*l).to_owned()),
                }?;
                Some(fill_placeholders(&line, spec, request))
            }
            Purpose::Reply { .. } => {
                if self.replies.is_empty() {
                    GENERIC_REPLIES.choose(&mut *rng).map(|l| (*l).to_owned())
                } else {
                    self.replies.choose(&mut *rng).cloned()
                }
            }
        }
    }
}

const fn builtin_posts(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::AudienceBuilding => &[
            "Having a great day in Kingston! #KingstonLife",
            "Beautiful day in Kingston! #Local #Community",
            "Spent the afternoon on {interest}. Kingston never gets old.",
        ],
        ContentKind::Neutral => &[
            "Love seeing the {interest} crowd out in force around Kingston this week.",
            "Small things make this town great. Grabbed coffee downtown and ran into three neighbours.",
        ],
        ContentKind::TrendingEngagement => &[
            "Everyone's talking about {topic} today. What's your take, Kingston?",
            "Been reading about {topic} all morning. Curious where everyone lands on it.",
        ],
        ContentKind::Political => &[
            "Important to stay informed about local politics in Kingston. #CivicEngagement",
            "Whoever you back, read up on {topic} before you vote. #KingstonVotes",
        ],
    }
}

fn fill_placeholders(line: &str, spec: &ContentSpec, request: &GenerationRequest) -> String {
    let topic = spec
        .topic
        .as_deref()
        .or_else(|| request.trending.first().map(String::as_str))
        .unwrap_or("Kingston");
    let interest = spec
        .interests
        .first()
        .or_else(|| request.persona.interests.first())
        .map_or("community", String::as_str);
    line.replace("{topic}", topic).replace("{interest}", interest)
}

// ---------------------------------------------------------------------------
// Provider chain
// ---------------------------------------------------------------------------

/// One backend behind its own request budget.
#[derive(Debug)]
struct Provider {
    backend: LlmBackend,
    limiter: RateLimiter,
}

/// Ordered LLM backends with a canned fallback.
#[derive(Debug)]
pub struct ProviderChain {
    providers: Vec<Provider>,
    sampling: Sampling,
    deadline: Duration,
    max_len: usize,
    fallback: CannedFallback,
}

impl ProviderChain {
    /// Build the chain from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError`] if a provider's request budget is invalid.
    pub fn new(config: &GenerationConfig) -> Result<Self, LimiterError> {
        let providers = config
            .providers
            .iter()
            .map(|provider| {
                Ok(Provider {
                    backend: create_backend(provider),
                    limiter: RateLimiter::new(
                        provider.rate_limit.capacity,
                        provider.rate_limit.window(),
                    )?,
                })
            })
            .collect::<Result<Vec<_>, LimiterError>>()?;

        Ok(Self {
            providers,
            sampling: config.sampling,
            deadline: config.timeout(),
            max_len: config.max_post_length,
            fallback: CannedFallback::new(
                config.canned_posts.clone(),
                config.canned_replies.clone(),
            ),
        })
    }

    /// Number of configured backends.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    async fn try_provider(
        &self,
        provider: &Provider,
        prompt: &RenderedPrompt,
    ) -> Result<String, GenerationError> {
        let raw = match timeout(self.deadline, provider.backend.complete(prompt, self.sampling))
            .await
        {
            Ok(result) => result?,
            Err(_) => return Err(GenerationError::Timeout),
        };
        clean_generated(&raw, self.max_len)
    }
}

#[async_trait]
impl TextGenerator for ProviderChain {
    async fn generate(&self, request: &GenerationRequest) -> Option<String> {
        let prompt = render_prompt(request, self.max_len);
        for provider in &self.providers {
            if !provider.limiter.try_acquire() {
                debug!(backend = provider.backend.name(), "backend budget exhausted, skipping");
                continue;
            }
            match self.try_provider(provider, &prompt).await {
                Ok(text) => return Some(text),
                Err(e) => {
                    warn!(
                        backend = provider.backend.name(),
                        request = request.label(),
                        error = %e,
                        "generation failed, trying next backend"
                    );
                }
            }
        }
        debug!(request = request.label(), "using canned content");
        self.fallback.pick(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use narrative_limiter::WindowConfig;
    use narrative_types::{PostId, TargetId};

    use super::*;
    use crate::config::{BackendType, LlmBackendConfig};

    fn persona() -> Persona {
        Persona {
            name: "kingston_local".to_owned(),
            interests: vec!["hiking".to_owned(), "coffee".to_owned()],
            tone: "casual".to_owned(),
            political_leanings: BTreeMap::from([(
                "support_victor".to_owned(),
                "small business owner worried about jobs".to_owned(),
            )]),
        }
    }

    fn post_request(kind: ContentKind) -> GenerationRequest {
        GenerationRequest {
            persona: persona(),
            objective: CampaignObjective::SupportVictor,
            purpose: Purpose::Post(ContentSpec::of(kind)),
            trending: vec!["ferry delays".to_owned()],
        }
    }

    fn reply_request(content: &str) -> GenerationRequest {
        GenerationRequest {
            persona: persona(),
            objective: CampaignObjective::SupportVictor,
            purpose: Purpose::Reply {
                to: Post {
                    id: PostId::new("p1"),
                    username: TargetId::from("kate"),
                    content: content.to_owned(),
                    likes: 0,
                    replies: 0,
                },
                context: ReplyContext::Mention,
            },
            trending: Vec::new(),
        }
    }

    #[test]
    fn cleaning_strips_quotes_and_labels() {
        assert_eq!(
            clean_generated("  \"Loving the new bike lanes downtown\"  ", 280).unwrap(),
            "Loving the new bike lanes downtown"
        );
        assert_eq!(
            clean_generated("post: Sunny morning at the harbour", 280).unwrap(),
            "Sunny morning at the harbour"
        );
    }

    #[test]
    fn cleaning_rejects_refusals_and_fragments() {
        assert!(clean_generated("ok", 280).is_err());
        assert!(clean_generated("As an AI I have no opinion on this.", 280).is_err());
        assert!(clean_generated("Sorry, I cannot write that post.", 280).is_err());
    }

    #[test]
    fn cleaning_truncates_with_ellipsis() {
        let long = "word ".repeat(100);
        let cleaned = clean_generated(&long, 50).unwrap();
        assert!(cleaned.chars().count() <= 50);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn political_prompt_carries_persona_angle_and_issues() {
        let mut request = post_request(ContentKind::Political);
        if let Purpose::Post(spec) = &mut request.purpose {
            spec.issues = vec!["jobs".to_owned()];
        }
        let prompt = render_prompt(&request, 280);
        assert!(prompt.user.contains("Victor Hawthorne"));
        assert!(prompt.user.contains("small business owner"));
        assert!(prompt.user.contains("jobs"));
        assert!(prompt.system.contains("ferry delays"));
    }

    #[test]
    fn reply_prompt_adds_stance_only_for_political_posts() {
        let casual = render_prompt(&reply_request("Great coffee at the market"), 280);
        let political = render_prompt(&reply_request("Who gets your vote?"), 280);
        assert!(!casual.user.contains("Victor"));
        assert!(political.user.contains("Victor"));
        assert!(political.user.contains("mentioned you"));
    }

    #[test]
    fn canned_posts_fill_placeholders() {
        let fallback = CannedFallback::new(
            BTreeMap::from([(
                ContentKind::TrendingEngagement,
                vec!["Thoughts on {topic}? I keep thinking about {interest}.".to_owned()],
            )]),
            Vec::new(),
        )
        .with_seed(7);
        let text = fallback
            .pick(&post_request(ContentKind::TrendingEngagement))
            .unwrap();
        assert_eq!(text, "Thoughts on ferry delays? I keep thinking about hiking.");
    }

    #[test]
    fn canned_replies_fall_back_to_generic_lines() {
        let fallback = CannedFallback::new(BTreeMap::new(), Vec::new()).with_seed(3);
        let reply = fallback.pick(&reply_request("hello there")).unwrap();
        assert!(GENERIC_REPLIES.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn exhausted_backends_are_skipped_for_canned_content() {
        let config = GenerationConfig {
            providers: vec![LlmBackendConfig {
                backend_type: BackendType::Competition,
                api_url: "http://127.0.0.1:9".to_owned(),
                api_key: String::new(),
                model: "gemma-2b".to_owned(),
                rate_limit: WindowConfig::new(1, 60),
            }],
            ..GenerationConfig::default()
        };
        let chain = ProviderChain::new(&config).unwrap();
        assert_eq!(chain.provider_count(), 1);
        for provider in &chain.providers {
            assert!(provider.limiter.try_acquire());
        }
        let text = chain.generate(&post_request(ContentKind::AudienceBuilding)).await;
        assert!(text.is_some_and(|t| !t.is_empty()));
    }
}
