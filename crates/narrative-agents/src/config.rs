//! Configuration for agents and their collaborators.
//!
//! Each struct mirrors one section of `narrative-config.yaml`. Every field
//! has a default, so a partial file (or none at all) yields a working fleet.

use std::collections::BTreeMap;
use std::time::Duration;

use narrative_limiter::WindowConfig;
use narrative_types::ContentKind;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Agent loop
// ---------------------------------------------------------------------------

/// Timing and behaviour of one agent loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Shortest delay between cycles, in seconds.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Longest delay between cycles, in seconds.
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Extra delay added when the agent's limiter is saturated, in seconds.
    #[serde(default = "default_saturation_extension_secs")]
    pub saturation_extension_secs: u64,

    /// Deadline for every platform call, in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Handle notifications every this many cycles. Zero disables them.
    #[serde(default = "default_notification_every")]
    pub notification_every: u32,

    /// Base probability of engaging with a candidate post.
    #[serde(default = "default_engagement_probability")]
    pub engagement_probability: f64,

    /// Failed cycles in a row tolerated before the loop gives up.
    #[serde(default = "default_max_consecutive_cycle_failures")]
    pub max_consecutive_cycle_failures: u32,

    /// Days spent building an audience before political content starts.
    #[serde(default = "default_audience_building_days")]
    pub audience_building_days: u32,

    /// Shortest pause between engagements of one search, in milliseconds.
    #[serde(default = "default_engagement_pause_min_ms")]
    pub engagement_pause_min_ms: u64,

    /// Longest pause between engagements of one search, in milliseconds.
    #[serde(default = "default_engagement_pause_max_ms")]
    pub engagement_pause_max_ms: u64,
}

impl AgentConfig {
    /// Inter-cycle delay bounds, ordered.
    pub fn interval_bounds(&self) -> (Duration, Duration) {
        let low = self.min_interval_secs.min(self.max_interval_secs);
        let high = self.min_interval_secs.max(self.max_interval_secs);
        (Duration::from_secs(low), Duration::from_secs(high))
    }

    /// Pause bounds between engagements, ordered.
    pub fn engagement_pause_bounds(&self) -> (Duration, Duration) {
        let low = self.engagement_pause_min_ms.min(self.engagement_pause_max_ms);
        let high = self.engagement_pause_min_ms.max(self.engagement_pause_max_ms);
        (Duration::from_millis(low), Duration::from_millis(high))
    }

    /// Platform call deadline.
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Saturation extension.
    pub const fn saturation_extension(&self) -> Duration {
        Duration::from_secs(self.saturation_extension_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            saturation_extension_secs: default_saturation_extension_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            notification_every: default_notification_every(),
            engagement_probability: default_engagement_probability(),
            max_consecutive_cycle_failures: default_max_consecutive_cycle_failures(),
            audience_building_days: default_audience_building_days(),
            engagement_pause_min_ms: default_engagement_pause_min_ms(),
            engagement_pause_max_ms: default_engagement_pause_max_ms(),
        }
    }
}

const fn default_min_interval_secs() -> u64 {
    300
}

const fn default_max_interval_secs() -> u64 {
    1800
}

const fn default_saturation_extension_secs() -> u64 {
    60
}

const fn default_call_timeout_secs() -> u64 {
    30
}

const fn default_notification_every() -> u32 {
    3
}

const fn default_engagement_probability() -> f64 {
    0.3
}

const fn default_max_consecutive_cycle_failures() -> u32 {
    5
}

const fn default_audience_building_days() -> u32 {
    2
}

const fn default_engagement_pause_min_ms() -> u64 {
    5_000
}

const fn default_engagement_pause_max_ms() -> u64 {
    15_000
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// What the environmental scanner samples on each scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScannerConfig {
    /// Trending topics kept per scan.
    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,

    /// Posts requested from each feed for feed analysis.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,

    /// Search queries used to sample political sentiment.
    #[serde(default = "default_sentiment_queries")]
    pub sentiment_queries: Vec<String>,

    /// Results requested per sentiment query.
    #[serde(default = "default_sentiment_results")]
    pub sentiment_results: u32,

    /// Pause between sentiment queries, in milliseconds.
    #[serde(default = "default_sentiment_pause_ms")]
    pub sentiment_pause_ms: u64,

    /// Posts sampled from the explore feed to profile NPCs.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: u32,

    /// Posts requested per feed when looking for influential content.
    #[serde(default = "default_influence_limit")]
    pub influence_limit: u32,

    /// Scans retained in the scanner's history.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl ScannerConfig {
    /// Pause between sentiment queries.
    pub const fn sentiment_pause(&self) -> Duration {
        Duration::from_millis(self.sentiment_pause_ms)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trending_limit: default_trending_limit(),
            feed_limit: default_feed_limit(),
            sentiment_queries: default_sentiment_queries(),
            sentiment_results: default_sentiment_results(),
            sentiment_pause_ms: default_sentiment_pause_ms(),
            activity_limit: default_activity_limit(),
            influence_limit: default_influence_limit(),
            history_len: default_history_len(),
        }
    }
}

const fn default_trending_limit() -> usize {
    10
}

const fn default_feed_limit() -> u32 {
    20
}

fn default_sentiment_queries() -> Vec<String> {
    ["vote", "election", "candidate", "victor", "marina"]
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}

const fn default_sentiment_results() -> u32 {
    10
}

const fn default_sentiment_pause_ms() -> u64 {
    1_000
}

const fn default_activity_limit() -> u32 {
    30
}

const fn default_influence_limit() -> u32 {
    15
}

const fn default_history_len() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Tuning of the strategy engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategyConfig {
    /// Share of recent posts that should be political in the political phase.
    #[serde(default = "default_political_target")]
    pub political_target: f64,

    /// Decisions kept in the engine's history.
    #[serde(default = "default_decision_history")]
    pub history_len: usize,

    /// Cooldown after an action before a directive may produce the same kind, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Directives queued at most; the lowest-priority one is evicted beyond this.
    #[serde(default = "default_directive_capacity")]
    pub directive_capacity: usize,

    /// Deviation from the political target that triggers weight adaptation.
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold: f64,

    /// Multiplier applied to a weight on each adaptation step.
    #[serde(default = "default_adaptation_step")]
    pub adaptation_step: f64,

    /// Lower clamp for every weight.
    #[serde(default = "default_weight_floor")]
    pub weight_floor: f64,

    /// Upper clamp for every weight.
    #[serde(default = "default_weight_ceiling")]
    pub weight_ceiling: f64,
}

impl StrategyConfig {
    /// Directive cooldown.
    pub fn cooldown(&self) -> chrono::TimeDelta {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            political_target: default_political_target(),
            history_len: default_decision_history(),
            cooldown_secs: default_cooldown_secs(),
            directive_capacity: default_directive_capacity(),
            deviation_threshold: default_deviation_threshold(),
            adaptation_step: default_adaptation_step(),
            weight_floor: default_weight_floor(),
            weight_ceiling: default_weight_ceiling(),
        }
    }
}

const fn default_political_target() -> f64 {
    0.4
}

const fn default_decision_history() -> usize {
    20
}

const fn default_cooldown_secs() -> u64 {
    300
}

const fn default_directive_capacity() -> usize {
    16
}

const fn default_deviation_threshold() -> f64 {
    0.2
}

const fn default_adaptation_step() -> f64 {
    1.1
}

const fn default_weight_floor() -> f64 {
    0.05
}

const fn default_weight_ceiling() -> f64 {
    2.0
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Where and how to reach the social platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformConfig {
    /// API base URL, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP-level request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl PlatformConfig {
    /// HTTP-level request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Override fields from the environment.
    ///
    /// - `API_BASE_URL` overrides `base_url`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("API_BASE_URL") {
            self.base_url = val;
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://social.legitreal.com/api".to_owned()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("narrative-fleet/{}", env!("CARGO_PKG_VERSION"))
}

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// The competition's hosted completion proxy (`prompt` in, `choices[0].text` out).
    Competition,
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    #[serde(alias = "deepseek", alias = "ollama")]
    OpenAi,
    /// Anthropic Messages API (different request format).
    #[serde(alias = "claude")]
    Anthropic,
}

impl BackendType {
    /// Environment variable holding this backend's API key.
    pub const fn key_env(self) -> &'static str {
        match self {
            Self::Competition => "TEAM_INVITATION_CODE",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Configuration for a single LLM backend.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct LlmBackendConfig {
    /// The backend type.
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    /// API URL. The competition proxy is posted to directly; the others
    /// get their endpoint path appended.
    pub api_url: String,
    /// API key; filled from the backend's environment variable when empty.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Request budget for this backend.
    #[serde(default = "default_backend_window")]
    pub rate_limit: WindowConfig,
}

impl core::fmt::Debug for LlmBackendConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LlmBackendConfig")
            .field("backend_type", &self.backend_type)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

const fn default_backend_window() -> WindowConfig {
    WindowConfig::new(50, 60)
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Sampling {
    /// Token budget per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

const fn default_max_tokens() -> u32 {
    150
}

const fn default_temperature() -> f64 {
    0.8
}

/// Text generation chain configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    /// Backends tried in order.
    #[serde(default = "default_providers")]
    pub providers: Vec<LlmBackendConfig>,

    /// Deadline for one backend call, in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest post the platform accepts, in characters.
    #[serde(default = "default_max_post_length")]
    pub max_post_length: usize,

    /// Sampling parameters.
    #[serde(default)]
    pub sampling: Sampling,

    /// Canned posts per content kind, used when every backend fails.
    /// `{topic}` and `{interest}` are substituted.
    #[serde(default)]
    pub canned_posts: BTreeMap<ContentKind, Vec<String>>,

    /// Canned replies, used when every backend fails.
    #[serde(default)]
    pub canned_replies: Vec<String>,
}

impl GenerationConfig {
    /// Backend call deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Override fields from the environment.
    ///
    /// - `LLM_API_URL` overrides the competition backend's URL
    /// - Each backend with an empty key reads it from [`BackendType::key_env`]
    pub fn apply_env_overrides(&mut self) {
        let proxy_url = std::env::var("LLM_API_URL").ok();
        for provider in &mut self.providers {
            if provider.backend_type == BackendType::Competition {
                if let Some(url) = &proxy_url {
                    provider.api_url.clone_from(url);
                }
            }
            if provider.api_key.is_empty() {
                if let Ok(key) = std::env::var(provider.backend_type.key_env()) {
                    provider.api_key = key;
                }
            }
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            timeout_secs: default_generation_timeout_secs(),
            max_post_length: default_max_post_length(),
            sampling: Sampling::default(),
            canned_posts: BTreeMap::new(),
            canned_replies: Vec::new(),
        }
    }
}

fn default_providers() -> Vec<LlmBackendConfig> {
    vec![LlmBackendConfig {
        backend_type: BackendType::Competition,
        api_url: "https://llm-proxy.legitreal.com".to_owned(),
        api_key: String::new(),
        model: "gemma-2b".to_owned(),
        rate_limit: WindowConfig::new(1, 60),
    }]
}

const fn default_generation_timeout_secs() -> u64 {
    20
}

const fn default_max_post_length() -> usize {
    280
}
