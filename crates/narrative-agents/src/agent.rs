//! One autonomous agent: a credential, a persona and the loop that drives them.
//!
//! An [`Agent`] owns its scanner, strategy engine and action limiter. The
//! loop in [`Agent::run`] repeats scan, decide, execute and record until the
//! stop signal fires, sleeping a random interval between cycles. Every
//! platform write clears the limiter first and feeds its outcome back into
//! the adaptive layer; stats only move on confirmed success.
//!
//! Lifecycle:
//!
//! ```text
//! Created --authenticate--> Authenticating --ok--> Active --stop--> Stopping --> Stopped
//!    ^                            |                  |
//!    +-------- failure -----------+-- revoked -------+
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use narrative_limiter::{ActionLimiter, ActionLimiterStatus, LimitsConfig};
use narrative_types::{
    ActionDescriptor, ActionType, AgentId, AgentLifecycle, AgentSnapshot, AgentStats, AuthToken,
    CampaignObjective, ContentSpec, CoordinationDirective, Credential, EngagementKind,
    IntelligenceSnapshot, NotificationKind, Persona, Phase, Post, PostId, TargetId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, ScannerConfig, StrategyConfig};
use crate::error::{AgentError, PlatformError};
use crate::keywords::{POLITICAL_KEYWORDS, is_political};
use crate::platform::{PlatformClient, Reaction, Response, Session};
use crate::scanner::EnvironmentalScanner;
use crate::strategy::{StrategyEngine, StrategyStatus};
use crate::textgen::{GenerationRequest, Purpose, ReplyContext, TextGenerator};

/// Chance of adding a repost to each post engaged from a search.
const SEARCH_REPOST_CHANCE: f64 = 0.3;

/// Chance that a persona-interest match is engaged with.
const INTEREST_MATCH_CHANCE: f64 = 0.6;

/// Chance that a not-yet-engaged NPC is engaged with.
const NEW_NPC_CHANCE: f64 = 0.5;

/// Chance of continuing a conversation when someone replies.
const CONTINUE_CONVERSATION_CHANCE: f64 = 0.4;

/// Chance of following back an account that liked a post.
const FOLLOW_BACK_ON_LIKE_CHANCE: f64 = 0.2;

/// Chance of following back a new follower.
const FOLLOW_BACK_ON_FOLLOW_CHANCE: f64 = 0.6;

/// External collaborators an agent talks through.
#[derive(Clone)]
pub struct AgentDeps {
    /// Social platform.
    pub client: Arc<dyn PlatformClient>,
    /// Post and reply text.
    pub generator: Arc<dyn TextGenerator>,
}

impl core::fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AgentDeps").finish_non_exhaustive()
    }
}

/// Configuration sections an agent is built from.
#[derive(Debug, Clone, Default)]
pub struct AgentSettings {
    /// Loop timing and behaviour.
    pub agent: AgentConfig,
    /// Per-agent action limits.
    pub limits: LimitsConfig,
    /// Scanner sampling.
    pub scanner: ScannerConfig,
    /// Strategy tuning.
    pub strategy: StrategyConfig,
}

/// Mutable state, only touched under the agent's lock.
#[derive(Debug)]
struct AgentState {
    lifecycle: AgentLifecycle,
    token: Option<AuthToken>,
    action_count: u64,
    last_action_at: Option<DateTime<Utc>>,
    stats: AgentStats,
    engaged_targets: BTreeSet<TargetId>,
    followed_targets: BTreeSet<TargetId>,
}

/// A single fleet member.
pub struct Agent {
    id: AgentId,
    credential: Credential,
    persona: Persona,
    objective: CampaignObjective,
    config: AgentConfig,
    started_at: DateTime<Utc>,
    client: Arc<dyn PlatformClient>,
    generator: Arc<dyn TextGenerator>,
    limiter: ActionLimiter,
    scanner: EnvironmentalScanner,
    strategy: Mutex<StrategyEngine>,
    state: Mutex<AgentState>,
    stop_tx: watch::Sender<bool>,
    rng: Mutex<StdRng>,
}

impl core::fmt::Debug for Agent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("username", &self.credential.username)
            .field("persona", &self.persona.name)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Limiter`] if a configured limit window is
    /// invalid.
    pub fn new(
        credential: Credential,
        persona: Persona,
        objective: CampaignObjective,
        settings: &AgentSettings,
        deps: AgentDeps,
    ) -> Result<Self, AgentError> {
        let limiter = ActionLimiter::new(&settings.limits)?;
        let strategy =
            StrategyEngine::new(objective, persona.clone(), settings.strategy.clone());
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            id: AgentId::new(),
            credential,
            persona,
            objective,
            config: settings.agent.clone(),
            started_at: Utc::now(),
            client: deps.client,
            generator: deps.generator,
            limiter,
            scanner: EnvironmentalScanner::new(settings.scanner.clone()),
            strategy: Mutex::new(strategy),
            state: Mutex::new(AgentState {
                lifecycle: AgentLifecycle::Created,
                token: None,
                action_count: 0,
                last_action_at: None,
                stats: AgentStats::default(),
                engaged_targets: BTreeSet::new(),
                followed_targets: BTreeSet::new(),
            }),
            stop_tx,
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Use fixed seeds for the agent's and its strategy's randomness.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        let strategy = self
            .strategy
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .with_seed(seed);
        Self {
            strategy: Mutex::new(strategy),
            rng: Mutex::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
            ..self
        }
    }

    /// Backdate the agent's start, which moves it through the phases.
    #[must_use]
    pub const fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Agent identifier.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Platform handle.
    pub fn username(&self) -> &str {
        &self.credential.username
    }

    /// Persona the agent writes as.
    pub const fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> AgentLifecycle {
        self.with_state(|s| s.lifecycle)
    }

    /// Whether the agent holds a session token.
    pub fn is_authenticated(&self) -> bool {
        self.with_state(|s| s.token.is_some())
    }

    /// Campaign phase at `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        Phase::at(self.started_at, now, self.config.audience_building_days)
    }

    /// Copy of the activity counters.
    pub fn stats(&self) -> AgentStats {
        self.with_state(|s| s.stats)
    }

    /// Latest scan, if one has completed.
    pub fn latest_intel(&self) -> Option<Arc<IntelligenceSnapshot>> {
        self.scanner.latest()
    }

    /// Strategy state for operators.
    pub fn strategy_status(&self) -> StrategyStatus {
        self.with_strategy(|s| s.status())
    }

    /// State of every limiter window.
    pub fn limiter_status(&self) -> ActionLimiterStatus {
        self.limiter.status_report()
    }

    /// Queue a coordination directive for the next decision.
    pub fn push_directive(&self, directive: CoordinationDirective) {
        self.with_strategy(|s| s.push_directive(directive));
    }

    /// Whether [`Agent::stop`] has been called.
    pub fn is_stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Consistent copy of the agent's state for aggregation.
    pub fn snapshot(&self) -> AgentSnapshot {
        let intel = self.scanner.latest();
        let (trending_topics, active_npcs) = intel.map_or_else(
            || (Vec::new(), Vec::new()),
            |snapshot| (snapshot.trending_topics.clone(), snapshot.npc_handles()),
        );
        self.with_state(|s| AgentSnapshot {
            id: self.id,
            username: self.credential.username.clone(),
            persona: self.persona.name.clone(),
            lifecycle: s.lifecycle,
            phase: self.phase(Utc::now()),
            started_at: self.started_at,
            last_action_at: s.last_action_at,
            action_count: s.action_count,
            stats: s.stats,
            engaged_targets: s.engaged_targets.clone(),
            followed_targets: s.followed_targets.clone(),
            trending_topics,
            active_npcs,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Exchange the credential for a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AuthenticationFailure`] when the platform
    /// rejects the credential or does not answer in time. The agent is back
    /// in `Created` and may try again.
    pub async fn authenticate(&self) -> Result<(), AgentError> {
        self.with_state(|s| s.lifecycle = AgentLifecycle::Authenticating);

        let outcome = match timeout(
            self.config.call_timeout(),
            self.client.authenticate(&self.credential),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout),
        };

        match outcome {
            Ok(token) => {
                self.with_state(|s| {
                    s.token = Some(token);
                    s.lifecycle = AgentLifecycle::Active;
                });
                info!(
                    agent_id = %self.id,
                    username = %self.credential.username,
                    persona = %self.persona.name,
                    "agent authenticated"
                );
                Ok(())
            }
            Err(source) => {
                self.with_state(|s| {
                    s.token = None;
                    s.lifecycle = AgentLifecycle::Created;
                });
                warn!(
                    agent_id = %self.id,
                    username = %self.credential.username,
                    error = %source,
                    "authentication failed"
                );
                Err(AgentError::AuthenticationFailure {
                    username: self.credential.username.clone(),
                    source,
                })
            }
        }
    }

    /// Ask the loop to stop at its next suspension point.
    ///
    /// An action already in flight completes first.
    pub fn stop(&self) {
        self.with_state(|s| {
            if s.lifecycle != AgentLifecycle::Stopped {
                s.lifecycle = AgentLifecycle::Stopping;
            }
        });
        self.stop_tx.send_replace(true);
    }

    /// Run cycles until stopped.
    ///
    /// Ordinary action failures are logged and the loop carries on. The
    /// loop gives up when the platform revokes the session or when more
    /// than `max_consecutive_cycle_failures` cycles fail in a row; either
    /// way the session is dropped and the agent returns to `Created`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotAuthenticated`] without a session,
    /// [`AgentError::Unauthorized`] on a revoked session and
    /// [`AgentError::RepeatedCycleFailure`] after too many failed cycles.
    pub async fn run(&self) -> Result<(), AgentError> {
        let mut stop_rx = self.stop_tx.subscribe();
        if !self.is_authenticated() {
            return Err(AgentError::NotAuthenticated);
        }

        info!(agent_id = %self.id, username = %self.credential.username, "agent loop started");
        let mut consecutive_failures: u32 = 0;
        let mut cycle: u64 = 0;

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }
            cycle = cycle.saturating_add(1);

            match self.run_cycle(cycle).await {
                Ok(()) => consecutive_failures = 0,
                Err(AgentError::Platform(PlatformError::RateLimited { .. })) => {
                    debug!(agent_id = %self.id, "rate limited, adaptive limiter backing off");
                }
                Err(AgentError::Unauthorized) => {
                    warn!(
                        agent_id = %self.id,
                        username = %self.credential.username,
                        "session revoked"
                    );
                    self.drop_session();
                    return Err(AgentError::Unauthorized);
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    warn!(
                        agent_id = %self.id,
                        cycle,
                        consecutive_failures,
                        error = %e,
                        "cycle failed"
                    );
                    if consecutive_failures > self.config.max_consecutive_cycle_failures {
                        self.drop_session();
                        return Err(AgentError::RepeatedCycleFailure {
                            failures: consecutive_failures,
                        });
                    }
                }
            }

            let delay = self.next_delay();
            debug!(agent_id = %self.id, delay_secs = delay.as_secs(), "waiting for next cycle");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => {}
            }
        }

        self.with_state(|s| s.lifecycle = AgentLifecycle::Stopped);
        info!(agent_id = %self.id, cycles = cycle, "agent loop stopped");
        Ok(())
    }

    /// One scan, decide, execute and record pass.
    async fn run_cycle(&self, cycle: u64) -> Result<(), AgentError> {
        let session = self.session()?;
        let snapshot = self.scanner.scan(&session).await;

        let now = Utc::now();
        let phase = self.phase(now);
        let stats = self.stats();
        let action = self.with_strategy(|strategy| {
            strategy.update_context(snapshot);
            strategy.next_action(phase, &stats, now)
        });
        debug!(agent_id = %self.id, action = action.kind().as_str(), ?phase, "action decided");

        self.execute_in(&session, &action, phase).await?;

        let finished = Utc::now();
        self.with_strategy(|strategy| strategy.record_result(&action, finished));
        self.with_state(|s| {
            s.action_count = s.action_count.saturating_add(1);
            s.last_action_at = Some(finished);
        });

        if cycle.checked_rem(u64::from(self.config.notification_every)) == Some(0) {
            self.handle_notifications(&session, phase).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute one action.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the action's platform calls, or
    /// [`AgentError::ContentUnavailable`] when no text could be written.
    pub async fn execute(&self, action: &ActionDescriptor) -> Result<(), AgentError> {
        let session = self.session()?;
        let phase = self.phase(Utc::now());
        self.execute_in(&session, action, phase).await
    }

    async fn execute_in(
        &self,
        session: &Session,
        action: &ActionDescriptor,
        phase: Phase,
    ) -> Result<(), AgentError> {
        match action {
            ActionDescriptor::Post { content } => self.publish(session, content).await,
            ActionDescriptor::Engage {
                post,
                author,
                excerpt,
                kind,
            } => {
                self.engage(session, post, author, excerpt, *kind, ReplyContext::Engagement)
                    .await
            }
            ActionDescriptor::Follow { target } => self.follow(session, target).await,
            ActionDescriptor::SearchAndEngage {
                query,
                limit,
                kinds,
                trending,
            } => {
                self.search_and_engage(session, query, *limit, kinds, *trending, phase)
                    .await
            }
        }
    }

    /// Clear the limiter, make the call and report the outcome.
    async fn call<T>(
        &self,
        action: ActionType,
        request: impl Future<Output = Result<Response<T>, PlatformError>>,
    ) -> Result<T, AgentError> {
        self.limiter.acquire(action).await?;
        let result = request.await;
        match &result {
            Ok(response) => self.limiter.on_response(action, true, Some(&response.headers)),
            Err(e) => self.limiter.on_response(action, false, e.headers()),
        }
        self.with_state(|s| s.stats.record_attempt(result.is_ok()));
        match result {
            Ok(response) => Ok(response.body),
            Err(e) => {
                debug!(
                    agent_id = %self.id,
                    action = action.as_str(),
                    error = %e,
                    "platform call failed"
                );
                Err(e.into())
            }
        }
    }

    async fn publish(&self, session: &Session, spec: &ContentSpec) -> Result<(), AgentError> {
        let request = self.generation_request(Purpose::Post(spec.clone()));
        let Some(text) = self.generator.generate(&request).await else {
            return Err(AgentError::ContentUnavailable(request.label()));
        };

        let created = self
            .call(ActionType::Post, session.create_post(&text, None))
            .await?;
        self.with_state(|s| s.stats.record_post(spec.kind));
        info!(
            agent_id = %self.id,
            post_id = %created.id,
            kind = spec.kind.as_str(),
            "post published"
        );
        Ok(())
    }

    async fn engage(
        &self,
        session: &Session,
        post: &PostId,
        author: &TargetId,
        excerpt: &str,
        kind: EngagementKind,
        context: ReplyContext,
    ) -> Result<(), AgentError> {
        if let Some(reaction) = Reaction::from_engagement(kind) {
            self.call(reaction.action_type(), session.react(post, reaction))
                .await?;
        } else {
            let to = Post {
                id: post.clone(),
                username: author.clone(),
                content: excerpt.to_owned(),
                likes: 0,
                replies: 0,
            };
            let request = self.generation_request(Purpose::Reply { to, context });
            let Some(text) = self.generator.generate(&request).await else {
                return Err(AgentError::ContentUnavailable(request.label()));
            };
            self.call(ActionType::Post, session.create_post(&text, Some(post)))
                .await?;
        }

        let npc = author.is_npc();
        let political = kind == EngagementKind::Reply && is_political(excerpt);
        self.with_state(|s| {
            s.stats.record_engagement(kind);
            s.engaged_targets.insert(author.clone());
            if npc {
                s.stats.npc_interactions = s.stats.npc_interactions.saturating_add(1);
            }
            if political {
                s.stats.strategic_replies = s.stats.strategic_replies.saturating_add(1);
            }
        });
        if npc {
            self.scanner.track_engaged([author.clone()]);
        }
        debug!(agent_id = %self.id, post_id = %post, author = %author, ?kind, "engaged");
        Ok(())
    }

    async fn follow(&self, session: &Session, target: &TargetId) -> Result<(), AgentError> {
        if self.with_state(|s| s.followed_targets.contains(target)) {
            debug!(agent_id = %self.id, target = %target, "already following");
            return Ok(());
        }

        self.call(ActionType::Follow, session.follow(target)).await?;
        self.with_state(|s| {
            s.stats.follows_made = s.stats.follows_made.saturating_add(1);
            s.followed_targets.insert(target.clone());
        });
        info!(agent_id = %self.id, target = %target, "followed");
        Ok(())
    }

    /// Search, then engage with up to `limit` results that pass
    /// [`Agent::should_engage`]. A failed engagement is logged and the next
    /// one attempted; only a revoked session ends the pass early.
    async fn search_and_engage(
        &self,
        session: &Session,
        query: &str,
        limit: u32,
        kinds: &[EngagementKind],
        trending: bool,
        phase: Phase,
    ) -> Result<(), AgentError> {
        let posts = self
            .call(
                ActionType::Search,
                session.search(query, limit.saturating_mul(2).max(1)),
            )
            .await?;
        self.with_state(|s| s.stats.searches_run = s.stats.searches_run.saturating_add(1));

        let (pause_min, pause_max) = self.config.engagement_pause_bounds();
        let mut engaged: u32 = 0;
        let mut successes: u64 = 0;

        for post in posts {
            if engaged >= limit {
                break;
            }
            if !self.should_engage(&post, phase) {
                continue;
            }
            if engaged > 0 {
                tokio::time::sleep(self.random_between(pause_min, pause_max)).await;
            }

            let mut applied = kinds.to_vec();
            if !applied.contains(&EngagementKind::Repost) && self.chance(SEARCH_REPOST_CHANCE) {
                applied.push(EngagementKind::Repost);
            }
            for kind in applied {
                match self
                    .engage(
                        session,
                        &post.id,
                        &post.username,
                        &post.content,
                        kind,
                        ReplyContext::Engagement,
                    )
                    .await
                {
                    Ok(()) => successes = successes.saturating_add(1),
                    Err(AgentError::Unauthorized) => return Err(AgentError::Unauthorized),
                    Err(e) => {
                        warn!(
                            agent_id = %self.id,
                            post_id = %post.id,
                            ?kind,
                            error = %e,
                            "engagement failed"
                        );
                    }
                }
            }
            engaged = engaged.saturating_add(1);
        }

        if trending {
            self.with_state(|s| {
                s.stats.trending_engagements =
                    s.stats.trending_engagements.saturating_add(successes);
            });
        }
        debug!(agent_id = %self.id, query, engaged, successes, "search pass finished");
        Ok(())
    }

    /// Whether a post is worth engaging with.
    ///
    /// Own posts never are. Past the base probability, political keywords
    /// in the political phase always qualify, persona interests qualify
    /// 60% of the time and NPCs not yet engaged 50% of the time.
    pub fn should_engage(&self, post: &Post, phase: Phase) -> bool {
        if post.username.as_str() == self.credential.username {
            return false;
        }
        if !self.chance(self.config.engagement_probability) {
            return false;
        }

        let lowered = post.content.to_lowercase();
        if phase == Phase::PoliticalInfluence
            && POLITICAL_KEYWORDS.iter().any(|k| lowered.contains(k))
        {
            return true;
        }
        if self
            .persona
            .interests
            .iter()
            .any(|interest| !interest.is_empty() && lowered.contains(&interest.to_lowercase()))
        {
            return self.chance(INTEREST_MATCH_CHANCE);
        }
        if post.username.is_npc()
            && !self.with_state(|s| s.engaged_targets.contains(&post.username))
        {
            return self.chance(NEW_NPC_CHANCE);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// React to notifications: reply to mentions, sometimes continue
    /// conversations and follow back.
    async fn handle_notifications(
        &self,
        session: &Session,
        phase: Phase,
    ) -> Result<(), AgentError> {
        let notifications = match session.notifications().await {
            Ok(response) => response.body,
            Err(PlatformError::Unauthorized) => return Err(AgentError::Unauthorized),
            Err(e) => {
                warn!(agent_id = %self.id, error = %e, "notification fetch failed");
                return Ok(());
            }
        };

        for notification in notifications {
            let result = match notification.kind {
                NotificationKind::Mention => match &notification.post {
                    Some(post) if self.should_engage(post, phase) => {
                        self.reply_to(session, post, ReplyContext::Mention).await
                    }
                    _ => Ok(()),
                },
                NotificationKind::Reply => match &notification.post {
                    Some(post) if self.chance(CONTINUE_CONVERSATION_CHANCE) => {
                        self.reply_to(session, post, ReplyContext::Continuation)
                            .await
                    }
                    _ => Ok(()),
                },
                NotificationKind::Like => match &notification.username {
                    Some(user)
                        if !self.with_state(|s| s.followed_targets.contains(user))
                            && self.chance(FOLLOW_BACK_ON_LIKE_CHANCE) =>
                    {
                        self.follow(session, user).await
                    }
                    _ => Ok(()),
                },
                NotificationKind::Follow => match &notification.username {
                    Some(user) if self.chance(FOLLOW_BACK_ON_FOLLOW_CHANCE) => {
                        self.follow(session, user).await
                    }
                    _ => Ok(()),
                },
                NotificationKind::Other => Ok(()),
            };

            match result {
                Ok(()) => {}
                Err(AgentError::Unauthorized) => return Err(AgentError::Unauthorized),
                Err(e) => {
                    warn!(
                        agent_id = %self.id,
                        kind = ?notification.kind,
                        error = %e,
                        "notification handling failed"
                    );
                }
            }
        }
        Ok(())
    }

    async fn reply_to(
        &self,
        session: &Session,
        post: &Post,
        context: ReplyContext,
    ) -> Result<(), AgentError> {
        self.engage(
            session,
            &post.id,
            &post.username,
            &post.content,
            EngagementKind::Reply,
            context,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn with_state<R>(&self, f: impl FnOnce(&mut AgentState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn with_strategy<R>(&self, f: impl FnOnce(&mut StrategyEngine) -> R) -> R {
        let mut strategy = self.strategy.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut strategy)
    }

    fn session(&self) -> Result<Session, AgentError> {
        let token = self
            .with_state(|s| s.token.clone())
            .ok_or(AgentError::NotAuthenticated)?;
        Ok(Session::new(
            Arc::clone(&self.client),
            token,
            self.config.call_timeout(),
        ))
    }

    fn drop_session(&self) {
        self.with_state(|s| {
            s.token = None;
            s.lifecycle = AgentLifecycle::Created;
        });
    }

    fn generation_request(&self, purpose: Purpose) -> GenerationRequest {
        GenerationRequest {
            persona: self.persona.clone(),
            objective: self.objective,
            purpose,
            trending: self
                .scanner
                .latest()
                .map(|snapshot| snapshot.trending_topics.clone())
                .unwrap_or_default(),
        }
    }

    fn chance(&self, probability: f64) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_bool(probability)
    }

    fn random_between(&self, low: Duration, high: Duration) -> Duration {
        if high <= low {
            return low;
        }
        let low_ms = u64::try_from(low.as_millis()).unwrap_or(u64::MAX);
        let high_ms = u64::try_from(high.as_millis()).unwrap_or(u64::MAX);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.random_range(low_ms..=high_ms))
    }

    /// Random inter-cycle delay, extended while the limiter is saturated.
    fn next_delay(&self) -> Duration {
        let (low, high) = self.config.interval_bounds();
        let delay = self.random_between(low, high);
        if self.limiter.is_saturated() {
            delay.saturating_add(self.config.saturation_extension())
        } else {
            delay
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use narrative_types::{ContentKind, Notification};

    use super::*;
    use crate::testing::{MockCall, MockPlatform, StaticGenerator, post};

    fn settings() -> AgentSettings {
        AgentSettings {
            agent: AgentConfig {
                min_interval_secs: 10,
                max_interval_secs: 20,
                engagement_probability: 1.0,
                notification_every: 0,
                max_consecutive_cycle_failures: 2,
                ..AgentConfig::default()
            },
            ..AgentSettings::default()
        }
    }

    fn agent_with(
        platform: &Arc<MockPlatform>,
        generator: StaticGenerator,
        settings: &AgentSettings,
    ) -> Agent {
        Agent::new(
            Credential {
                username: "maple@team".to_owned(),
                password: "secret".to_owned(),
            },
            Persona {
                name: "local_foodie".to_owned(),
                interests: vec!["baking".to_owned()],
                ..Persona::default()
            },
            CampaignObjective::SupportVictor,
            settings,
            AgentDeps {
                client: Arc::clone(platform) as Arc<dyn PlatformClient>,
                generator: Arc::new(generator),
            },
        )
        .unwrap()
        .with_seed(7)
    }

    fn agent(platform: &Arc<MockPlatform>) -> Agent {
        agent_with(platform, StaticGenerator::new("Lovely day at the market"), &settings())
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_moves_to_active() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        assert_eq!(agent.lifecycle(), AgentLifecycle::Created);

        agent.authenticate().await.unwrap();
        assert_eq!(agent.lifecycle(), AgentLifecycle::Active);
        assert!(agent.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_authentication_returns_to_created() {
        let platform = Arc::new(MockPlatform::new());
        platform.fail(MockCall::Authenticate);
        let agent = agent(&platform);

        let err = agent.authenticate().await.unwrap_err();
        assert!(matches!(err, AgentError::AuthenticationFailure { .. }));
        assert_eq!(agent.lifecycle(), AgentLifecycle::Created);
        assert!(!agent.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn published_posts_update_influence_stats() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::Post {
            content: ContentSpec::of(ContentKind::Political),
        };
        agent.execute(&action).await.unwrap();

        let stats = agent.stats();
        assert_eq!(stats.posts_created, 1);
        assert_eq!(stats.political_posts, 1);
        assert_eq!(stats.actions_succeeded, 1);
        assert_eq!(platform.posts_created().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_calls_count_only_as_attempts() {
        let platform = Arc::new(MockPlatform::new());
        platform.fail(MockCall::CreatePost);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::Post {
            content: ContentSpec::default(),
        };
        assert!(agent.execute(&action).await.is_err());

        let stats = agent.stats();
        assert_eq!(stats.posts_created, 0);
        assert_eq!(stats.actions_attempted, 1);
        assert_eq!(stats.actions_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_text_skips_the_platform() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent_with(&platform, StaticGenerator::silent(), &settings());
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::Post {
            content: ContentSpec::default(),
        };
        let err = agent.execute(&action).await.unwrap_err();
        assert!(matches!(err, AgentError::ContentUnavailable(_)));
        assert_eq!(agent.stats().actions_attempted, 0);
        assert!(platform.posts_created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn follows_are_not_repeated() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::Follow {
            target: TargetId::new("kate"),
        };
        agent.execute(&action).await.unwrap();
        agent.execute(&action).await.unwrap();

        assert_eq!(platform.follows(), vec![TargetId::new("kate")]);
        assert_eq!(agent.stats().follows_made, 1);
        assert!(agent.snapshot().followed_targets.contains(&TargetId::new("kate")));
    }

    #[tokio::test(start_paused = true)]
    async fn replies_to_npcs_are_tracked() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::Engage {
            post: PostId::new("42"),
            author: TargetId::new("kate"),
            excerpt: "Who gets your vote?".to_owned(),
            kind: EngagementKind::Reply,
        };
        agent.execute(&action).await.unwrap();

        let stats = agent.stats();
        assert_eq!(stats.replies_made, 1);
        assert_eq!(stats.npc_interactions, 1);
        assert_eq!(stats.strategic_replies, 1);
        let created = platform.posts_created();
        assert_eq!(created.first().unwrap().parent, Some(PostId::new("42")));
    }

    #[tokio::test(start_paused = true)]
    async fn search_engages_up_to_the_limit() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_search_results(vec![
            post("1", "maple@team", "my own post", 0, 0),
            post("2", "ana@rival", "Ferry schedule changes", 0, 0),
            post("3", "bo@rival", "Road works on Princess St", 0, 0),
            post("4", "cy@rival", "Library hours", 0, 0),
        ]);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let action = ActionDescriptor::SearchAndEngage {
            query: "kingston".to_owned(),
            limit: 2,
            kinds: vec![EngagementKind::Like],
            trending: false,
        };
        agent.execute(&action).await.unwrap();

        let stats = agent.stats();
        assert_eq!(stats.searches_run, 1);
        assert_eq!(stats.likes_given, 2);
        assert!(stats.reposts_made <= 2);
        assert_eq!(stats.trending_engagements, 0);
        let liked: Vec<_> = platform
            .reactions()
            .into_iter()
            .filter(|(_, r)| *r == Reaction::Like)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(liked, vec![PostId::new("2"), PostId::new("3")]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_trending_searches_count_as_trending_engagements() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_search_results(vec![
            post("2", "ana@rival", "Ferry schedule changes", 0, 0),
            post("3", "bo@rival", "Road works on Princess St", 0, 0),
        ]);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let campaign = ActionDescriptor::SearchAndEngage {
            query: "election".to_owned(),
            limit: 1,
            kinds: vec![EngagementKind::Like],
            trending: false,
        };
        agent.execute(&campaign).await.unwrap();
        let after_campaign = agent.stats();
        assert_eq!(after_campaign.likes_given, 1);
        assert_eq!(after_campaign.trending_engagements, 0);

        let trending = ActionDescriptor::SearchAndEngage {
            query: "harbourfest".to_owned(),
            limit: 1,
            kinds: vec![EngagementKind::Like],
            trending: true,
        };
        agent.execute(&trending).await.unwrap();
        let stats = agent.stats();
        assert_eq!(stats.likes_given, 2);
        let trending_successes = stats
            .likes_given
            .saturating_add(stats.reposts_made)
            .saturating_sub(after_campaign.likes_given)
            .saturating_sub(after_campaign.reposts_made);
        assert_eq!(stats.trending_engagements, trending_successes);
        assert!(stats.trending_engagements >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn own_posts_are_never_engaged() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        let own = post("1", "maple@team", "vote vote vote", 0, 0);
        assert!(!agent.should_engage(&own, Phase::PoliticalInfluence));
        let other = post("2", "ana@rival", "vote vote vote", 0, 0);
        assert!(agent.should_engage(&other, Phase::PoliticalInfluence));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_probability_never_engages() {
        let platform = Arc::new(MockPlatform::new());
        let mut settings = settings();
        settings.agent.engagement_probability = 0.0;
        let agent = agent_with(&platform, StaticGenerator::new("hi"), &settings);
        let other = post("2", "ana@rival", "vote now", 0, 0);
        assert!(!agent.should_engage(&other, Phase::PoliticalInfluence));
    }

    #[tokio::test(start_paused = true)]
    async fn mentions_get_replies() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_notifications(vec![Notification {
            kind: NotificationKind::Mention,
            username: Some(TargetId::new("ana@rival")),
            post: Some(post("9", "ana@rival", "hey @maple what do you think?", 0, 0)),
        }]);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let session = agent.session().unwrap();
        agent
            .handle_notifications(&session, Phase::AudienceBuilding)
            .await
            .unwrap();

        let created = platform.posts_created();
        assert_eq!(created.len(), 1);
        assert_eq!(created.first().unwrap().parent, Some(PostId::new("9")));
        assert_eq!(agent.stats().replies_made, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn revoked_session_ends_the_loop() {
        let platform = Arc::new(MockPlatform::new());
        platform.reject_tokens_through(1);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let err = agent.run().await.unwrap_err();
        assert!(matches!(err, AgentError::Unauthorized));
        assert_eq!(agent.lifecycle(), AgentLifecycle::Created);
        assert!(!agent.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_end_the_loop() {
        let platform = Arc::new(MockPlatform::new());
        platform.fail(MockCall::CreatePost);
        platform.fail(MockCall::Search);
        let agent = agent(&platform);
        agent.authenticate().await.unwrap();

        let err = agent.run().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::RepeatedCycleFailure { failures: 3 }
        ));
        assert_eq!(agent.lifecycle(), AgentLifecycle::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn run_requires_a_session() {
        let platform = Arc::new(MockPlatform::new());
        let agent = agent(&platform);
        assert!(matches!(
            agent.run().await,
            Err(AgentError::NotAuthenticated)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop_cleanly() {
        let platform = Arc::new(MockPlatform::new());
        let agent = Arc::new(agent(&platform));
        agent.authenticate().await.unwrap();

        let runner = Arc::clone(&agent);
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_secs(60)).await;
        agent.stop();

        handle.await.unwrap().unwrap();
        assert_eq!(agent.lifecycle(), AgentLifecycle::Stopped);
        assert!(agent.snapshot().action_count >= 1);
        assert!(agent.latest_intel().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn backdated_agents_are_in_the_political_phase() {
        let platform = Arc::new(MockPlatform::new());
        let now = Utc::now();
        let started = now.checked_sub_signed(chrono::Duration::days(3)).unwrap();
        let agent = agent(&platform).with_started_at(started);
        assert_eq!(agent.phase(now), Phase::PoliticalInfluence);
        assert_eq!(agent.snapshot().phase, Phase::PoliticalInfluence);
    }
}
