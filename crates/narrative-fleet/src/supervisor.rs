//! Fleet supervisor.
//!
//! The [`FleetSupervisor`] owns every agent, runs each one in its own
//! supervised task, restarts agents that fail according to its
//! [`RetryPolicy`], and runs a coordination task that turns the team's
//! combined intelligence into directives.
//!
//! Agent state is only ever read through [`Agent::snapshot`], which copies
//! it out, so aggregation never holds an agent lock and the supervisor's own
//! lock is never held across an `.await`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use narrative_agents::{Agent, AgentDeps, AgentSettings};
use narrative_types::{
    AgentId, AgentSnapshot, CampaignObjective, Credential, FleetReport, Persona, Phase,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{FleetConfig, SupervisorConfig};
use crate::coordination::{derive_opportunities, distribute};
use crate::error::FleetError;
use crate::report::summarize;
use crate::retry::RetryPolicy;

/// Mutable fleet bookkeeping shared with the spawned tasks.
#[derive(Debug, Default)]
struct FleetState {
    active: BTreeSet<AgentId>,
    lost: u32,
    coordination_cycles: u64,
    running: bool,
}

type SharedState = Arc<Mutex<FleetState>>;

fn with_state<R>(state: &Mutex<FleetState>, f: impl FnOnce(&mut FleetState) -> R) -> R {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Creates, runs, coordinates and stops the fleet.
#[derive(Debug)]
pub struct FleetSupervisor {
    settings: AgentSettings,
    supervisor: SupervisorConfig,
    objective: CampaignObjective,
    audience_building_days: u32,
    retry: RetryPolicy,
    seed: Option<u64>,
    agents: Vec<Arc<Agent>>,
    state: SharedState,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
}

impl FleetSupervisor {
    /// Create a supervisor with no agents.
    pub fn new(config: &FleetConfig) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            settings: config.agent_settings(),
            supervisor: config.supervisor.clone(),
            objective: config.campaign.objective,
            audience_building_days: config.agent.audience_building_days,
            retry: RetryPolicy::from_config(&config.supervisor),
            seed: None,
            agents: Vec::new(),
            state: Arc::new(Mutex::new(FleetState::default())),
            stop_tx,
            tasks: Vec::new(),
            started_at: None,
        }
    }

    /// Seed every agent created afterwards; agent `i` gets `seed + i`.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Agents in creation order.
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// Agents currently in the active set.
    pub fn active_count(&self) -> usize {
        with_state(&self.state, |s| s.active.len())
    }

    /// Agents removed after exhausting their retries.
    pub fn lost_count(&self) -> u32 {
        with_state(&self.state, |s| s.lost)
    }

    /// Whether a campaign is running.
    pub fn is_running(&self) -> bool {
        with_state(&self.state, |s| s.running)
    }

    // -----------------------------------------------------------------------
    // Fleet creation
    // -----------------------------------------------------------------------

    /// Build `size` agents from the first `size` credentials.
    ///
    /// Personas are assigned round-robin in name order. Either the whole
    /// fleet is built or nothing changes.
    ///
    /// # Errors
    ///
    /// - [`FleetError::AlreadyRunning`] while a campaign is running
    /// - [`FleetError::EmptyFleet`] for a size of zero
    /// - [`FleetError::NoPersonas`] without personas
    /// - [`FleetError::NotEnoughAccounts`] with fewer credentials than `size`
    /// - [`FleetError::InvalidCredential`] for an incomplete credential
    /// - [`FleetError::Agent`] when an agent cannot be built
    pub fn create_fleet(
        &mut self,
        size: usize,
        credentials: &[Credential],
        personas: &BTreeMap<String, Persona>,
        deps: &AgentDeps,
    ) -> Result<(), FleetError> {
        if self.is_running() {
            return Err(FleetError::AlreadyRunning);
        }
        if size == 0 {
            return Err(FleetError::EmptyFleet);
        }
        if personas.is_empty() {
            return Err(FleetError::NoPersonas);
        }
        if credentials.len() < size {
            return Err(FleetError::NotEnoughAccounts {
                needed: size,
                available: credentials.len(),
            });
        }
        if let Some(index) = credentials
            .iter()
            .take(size)
            .position(|c| c.username.is_empty() || c.password.is_empty())
        {
            return Err(FleetError::InvalidCredential { index });
        }

        let mut agents = Vec::with_capacity(size);
        for (index, (credential, persona)) in credentials
            .iter()
            .zip(personas.values().cycle())
            .take(size)
            .enumerate()
        {
            let mut agent = Agent::new(
                credential.clone(),
                persona.clone(),
                self.objective,
                &self.settings,
                deps.clone(),
            )?;
            if let Some(seed) = self.seed {
                agent = agent.with_seed(
                    seed.wrapping_add(u64::try_from(index).unwrap_or_default()),
                );
            }
            debug!(
                agent_id = %agent.id(),
                username = %credential.username,
                persona = %persona.name,
                "agent created"
            );
            agents.push(Arc::new(agent));
        }

        info!(
            agents = agents.len(),
            personas = personas.len(),
            objective = %self.objective,
            "fleet created"
        );
        self.agents = agents;
        with_state(&self.state, |s| {
            s.active.clear();
            s.lost = 0;
            s.coordination_cycles = 0;
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Campaign
    // -----------------------------------------------------------------------

    /// Authenticate every agent concurrently and start the campaign.
    ///
    /// Agents that fail to authenticate are left out; the rest each get a
    /// supervised task, and one more task runs coordination. Returns the
    /// number of agents started.
    ///
    /// # Errors
    ///
    /// - [`FleetError::AlreadyRunning`] while a campaign is running
    /// - [`FleetError::NoFleet`] before [`create_fleet`](Self::create_fleet)
    /// - [`FleetError::NoneAuthenticated`] when no agent authenticates
    pub async fn start_campaign(&mut self) -> Result<usize, FleetError> {
        if self.is_running() {
            return Err(FleetError::AlreadyRunning);
        }
        if self.agents.is_empty() {
            return Err(FleetError::NoFleet);
        }

        let results = join_all(self.agents.iter().map(|agent| agent.authenticate())).await;
        let authenticated: Vec<Arc<Agent>> = self
            .agents
            .iter()
            .zip(results)
            .filter_map(|(agent, result)| result.is_ok().then(|| Arc::clone(agent)))
            .collect();
        if authenticated.is_empty() {
            return Err(FleetError::NoneAuthenticated);
        }

        let started_at = Utc::now();
        self.started_at = Some(started_at);
        let (stop_tx, _) = watch::channel(false);
        self.stop_tx = stop_tx;
        with_state(&self.state, |s| {
            s.active = authenticated.iter().map(|a| a.id()).collect();
            s.running = true;
        });

        for agent in &authenticated {
            self.tasks.push(tokio::spawn(supervise(
                Arc::clone(agent),
                self.retry,
                Arc::clone(&self.state),
                self.stop_tx.subscribe(),
            )));
        }
        let coordinator = self.coordinator(started_at);
        self.tasks.push(tokio::spawn(coordination_loop(
            coordinator,
            self.stop_tx.subscribe(),
        )));

        info!(
            started = authenticated.len(),
            failed = self.agents.len().saturating_sub(authenticated.len()),
            "campaign started"
        );
        Ok(authenticated.len())
    }

    /// Run one coordination cycle now. Returns the number of directives
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NoActiveAgents`] when the active set is empty.
    pub fn coordinate_once(&self) -> Result<usize, FleetError> {
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        self.coordinator(started_at).coordinate_once(Utc::now())
    }

    /// Stop every agent and the coordinator and return the final report.
    ///
    /// Agents get `shutdown_grace` to finish their current action; tasks
    /// still running after that are aborted.
    pub async fn stop_campaign(&mut self) -> FleetReport {
        with_state(&self.state, |s| s.running = false);
        self.stop_tx.send_replace(true);
        for agent in &self.agents {
            agent.stop();
        }

        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let grace = self.supervisor.shutdown_grace();
        match timeout(grace, join_all(tasks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "fleet task failed");
                    }
                }
            }
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs(),
                    "shutdown grace elapsed, aborting remaining tasks"
                );
                for abort in &aborts {
                    abort.abort();
                }
            }
        }

        let report = self.report();
        info!(
            active = report.team.active_agents,
            lost = report.team.lost_agents,
            posts = report.team.total_posts,
            engagements = report.team.total_engagements,
            unique_targets = report.team.unique_targets,
            "campaign stopped"
        );
        report
    }

    /// Report covering every agent the fleet created.
    pub fn report(&self) -> FleetReport {
        let snapshots: Vec<AgentSnapshot> = self.agents.iter().map(|a| a.snapshot()).collect();
        let (active, lost, cycles) = with_state(&self.state, |s| {
            (s.active.len(), s.lost, s.coordination_cycles)
        });
        FleetReport {
            generated_at: Utc::now(),
            team: summarize(
                &snapshots,
                u32::try_from(active).unwrap_or(u32::MAX),
                lost,
                cycles,
            ),
            agents: snapshots,
        }
    }

    fn coordinator(&self, started_at: DateTime<Utc>) -> Coordinator {
        Coordinator {
            agents: self.agents.clone(),
            state: Arc::clone(&self.state),
            config: self.supervisor.clone(),
            objective: self.objective,
            audience_building_days: self.audience_building_days,
            started_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Supervised agent task
// ---------------------------------------------------------------------------

/// Run an agent, restarting it per `policy` until it stops cleanly, the
/// campaign stops, or its retries run out.
async fn supervise(
    agent: Arc<Agent>,
    policy: RetryPolicy,
    state: SharedState,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        match agent.run().await {
            Ok(()) => {
                debug!(agent_id = %agent.id(), "agent task finished");
                return;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(
                    agent_id = %agent.id(),
                    username = %agent.username(),
                    failures,
                    error = %e,
                    "agent run failed"
                );
            }
        }

        // Back off and re-authenticate until a session is restored.
        loop {
            if *stop_rx.borrow_and_update() || agent.is_stop_requested() {
                return;
            }
            if !policy.should_retry(failures) {
                with_state(&state, |s| {
                    s.active.remove(&agent.id());
                    s.lost = s.lost.saturating_add(1);
                });
                error!(
                    agent_id = %agent.id(),
                    username = %agent.username(),
                    failures,
                    "agent retries exhausted, removed from fleet"
                );
                return;
            }

            let delay = policy.delay_for(failures);
            info!(
                agent_id = %agent.id(),
                delay_secs = delay.as_secs(),
                "restarting agent after backoff"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => return,
            }

            match agent.authenticate().await {
                Ok(()) => break,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        agent_id = %agent.id(),
                        failures,
                        error = %e,
                        "re-authentication failed"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coordination
// ---------------------------------------------------------------------------

/// Everything a coordination cycle reads.
#[derive(Debug)]
struct Coordinator {
    agents: Vec<Arc<Agent>>,
    state: SharedState,
    config: SupervisorConfig,
    objective: CampaignObjective,
    audience_building_days: u32,
    started_at: DateTime<Utc>,
}

impl Coordinator {
    fn coordinate_once(&self, now: DateTime<Utc>) -> Result<usize, FleetError> {
        let active_ids = with_state(&self.state, |s| s.active.clone());
        let active: Vec<&Arc<Agent>> = self
            .agents
            .iter()
            .filter(|agent| active_ids.contains(&agent.id()))
            .collect();
        if active.is_empty() {
            return Err(FleetError::NoActiveAgents);
        }

        let snapshots: Vec<AgentSnapshot> = active.iter().map(|a| a.snapshot()).collect();
        let phase = Phase::at(self.started_at, now, self.audience_building_days);
        let opportunities =
            derive_opportunities(&snapshots, phase, self.objective, &self.config, now);
        let assignments = distribute(&opportunities, &active);
        for (agent, directive) in &assignments {
            debug!(
                agent_id = %agent.id(),
                directive = directive.kind.as_str(),
                targets = directive.targets.len(),
                "directive sent"
            );
            agent.push_directive(directive.clone());
        }

        let (lost, cycles) = with_state(&self.state, |s| {
            s.coordination_cycles = s.coordination_cycles.saturating_add(1);
            (s.lost, s.coordination_cycles)
        });
        let team = summarize(
            &snapshots,
            u32::try_from(active.len()).unwrap_or(u32::MAX),
            lost,
            cycles,
        );
        info!(
            cycle = cycles,
            ?phase,
            active = team.active_agents,
            lost = team.lost_agents,
            posts = team.total_posts,
            engagements = team.total_engagements,
            unique_targets = team.unique_targets,
            trending = team.trending_topics.len(),
            opportunities = opportunities.len(),
            directives = assignments.len(),
            "team status"
        );
        Ok(assignments.len())
    }
}

/// Coordinate every `coordination_interval`, or `coordination_retry` after a
/// failed cycle, until the campaign stops.
async fn coordination_loop(coordinator: Coordinator, mut stop_rx: watch::Receiver<bool>) {
    let mut wait = coordinator.config.coordination_interval();
    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => break,
        }

        wait = match coordinator.coordinate_once(Utc::now()) {
            Ok(_) => coordinator.config.coordination_interval(),
            Err(e) => {
                warn!(error = %e, "coordination cycle failed");
                coordinator.config.coordination_retry()
            }
        };
    }
    debug!("coordination loop stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use narrative_agents::testing::{MockCall, MockPlatform, StaticGenerator};
    use narrative_agents::{AgentConfig, PlatformClient};
    use narrative_types::AgentLifecycle;

    use super::*;

    fn config() -> FleetConfig {
        FleetConfig {
            agent: AgentConfig {
                min_interval_secs: 10,
                max_interval_secs: 20,
                ..AgentConfig::default()
            },
            supervisor: SupervisorConfig {
                retry_base_delay_secs: 30,
                shutdown_grace_secs: 600,
                ..SupervisorConfig::default()
            },
            ..FleetConfig::default()
        }
    }

    fn credentials(n: usize) -> Vec<Credential> {
        (0..n)
            .map(|i| Credential {
                username: format!("agent{i}@team"),
                password: "secret".to_owned(),
            })
            .collect()
    }

    fn personas(names: &[&str]) -> BTreeMap<String, Persona> {
        names
            .iter()
            .map(|name| {
                (
                    (*name).to_owned(),
                    Persona {
                        name: (*name).to_owned(),
                        interests: vec!["baking".to_owned()],
                        ..Persona::default()
                    },
                )
            })
            .collect()
    }

    fn deps(platform: &Arc<MockPlatform>) -> AgentDeps {
        AgentDeps {
            client: Arc::clone(platform) as Arc<dyn PlatformClient>,
            generator: Arc::new(StaticGenerator::new("Fresh bread at the market today")),
        }
    }

    fn fleet(platform: &Arc<MockPlatform>, size: usize) -> FleetSupervisor {
        let mut supervisor = FleetSupervisor::new(&config()).with_seed(11);
        supervisor
            .create_fleet(
                size,
                &credentials(size),
                &personas(&["gardener", "night_owl"]),
                &deps(platform),
            )
            .unwrap();
        supervisor
    }

    #[test]
    fn fleet_needs_enough_accounts() {
        let platform = Arc::new(MockPlatform::new());
        let mut supervisor = FleetSupervisor::new(&config());
        let err = supervisor
            .create_fleet(3, &credentials(2), &personas(&["gardener"]), &deps(&platform))
            .unwrap_err();
        assert!(matches!(
            err,
            FleetError::NotEnoughAccounts {
                needed: 3,
                available: 2
            }
        ));
        assert!(supervisor.agents().is_empty());
    }

    #[test]
    fn fleet_needs_personas_and_a_size() {
        let platform = Arc::new(MockPlatform::new());
        let mut supervisor = FleetSupervisor::new(&config());
        assert!(matches!(
            supervisor.create_fleet(1, &credentials(1), &BTreeMap::new(), &deps(&platform)),
            Err(FleetError::NoPersonas)
        ));
        assert!(matches!(
            supervisor.create_fleet(0, &credentials(1), &personas(&["a"]), &deps(&platform)),
            Err(FleetError::EmptyFleet)
        ));
    }

    #[test]
    fn incomplete_credentials_are_rejected() {
        let platform = Arc::new(MockPlatform::new());
        let mut supervisor = FleetSupervisor::new(&config());
        let mut accounts = credentials(3);
        accounts.get_mut(1).unwrap().password.clear();
        assert!(matches!(
            supervisor.create_fleet(3, &accounts, &personas(&["a"]), &deps(&platform)),
            Err(FleetError::InvalidCredential { index: 1 })
        ));
        assert!(supervisor.agents().is_empty());
    }

    #[test]
    fn personas_are_assigned_round_robin() {
        let platform = Arc::new(MockPlatform::new());
        let supervisor = fleet(&platform, 5);
        let assigned: Vec<&str> = supervisor
            .agents()
            .iter()
            .map(|a| a.persona().name.as_str())
            .collect();
        assert_eq!(
            assigned,
            vec!["gardener", "night_owl", "gardener", "night_owl", "gardener"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn campaign_without_a_fleet_is_an_error() {
        let mut supervisor = FleetSupervisor::new(&config());
        assert!(matches!(
            supervisor.start_campaign().await,
            Err(FleetError::NoFleet)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn campaign_fails_when_nobody_authenticates() {
        let platform = Arc::new(MockPlatform::new());
        platform.fail(MockCall::Authenticate);
        let mut supervisor = fleet(&platform, 2);
        assert!(matches!(
            supervisor.start_campaign().await,
            Err(FleetError::NoneAuthenticated)
        ));
        assert!(!supervisor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn agent_is_lost_after_exhausting_retries() {
        let platform = Arc::new(MockPlatform::new());
        platform.reject_tokens_through(3);
        let mut supervisor = fleet(&platform, 1);

        assert_eq!(supervisor.start_campaign().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(platform.auth_calls(), 3);
        assert_eq!(supervisor.lost_count(), 1);
        assert_eq!(supervisor.active_count(), 0);

        let report = supervisor.stop_campaign().await;
        assert_eq!(report.team.lost_agents, 1);
        assert_eq!(report.team.active_agents, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_recovers_within_its_retries() {
        let platform = Arc::new(MockPlatform::new());
        platform.reject_tokens_through(2);
        let mut supervisor = fleet(&platform, 1);

        supervisor.start_campaign().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(platform.auth_calls(), 3);
        assert_eq!(supervisor.lost_count(), 0);
        assert_eq!(supervisor.active_count(), 1);
        assert!(platform.posts_created().iter().any(|p| p.token == "token-3"));
        supervisor.stop_campaign().await;
    }

    #[tokio::test(start_paused = true)]
    async fn coordination_sends_amplify_directives() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_trending(vec!["harvest festival".to_owned(), "ferry".to_owned()]);
        let mut supervisor = fleet(&platform, 4);

        supervisor.start_campaign().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(supervisor.coordinate_once().unwrap(), 3);
        let pending: Vec<usize> = supervisor
            .agents()
            .iter()
            .map(|a| a.strategy_status().directives_pending)
            .collect();
        assert_eq!(pending.iter().sum::<usize>(), 3);
        assert_eq!(supervisor.report().team.coordination_cycles, 1);
        assert_eq!(
            supervisor.report().team.trending_topics,
            vec!["harvest festival", "ferry"]
        );
        supervisor.stop_campaign().await;
    }

    #[tokio::test(start_paused = true)]
    async fn coordination_without_active_agents_fails() {
        let platform = Arc::new(MockPlatform::new());
        let supervisor = fleet(&platform, 2);
        assert!(matches!(
            supervisor.coordinate_once(),
            Err(FleetError::NoActiveAgents)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_campaign_stops_every_agent() {
        let platform = Arc::new(MockPlatform::new());
        let mut supervisor = fleet(&platform, 3);
        supervisor.start_campaign().await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        let report = supervisor.stop_campaign().await;
        assert!(!supervisor.is_running());
        assert_eq!(report.agents.len(), 3);
        assert!(
            report
                .agents
                .iter()
                .all(|a| a.lifecycle == AgentLifecycle::Stopped)
        );
        assert!(report.team.actions_attempted > 0);
        assert_eq!(report.team.active_agents, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn running_campaign_rejects_a_second_start() {
        let platform = Arc::new(MockPlatform::new());
        let mut supervisor = fleet(&platform, 1);
        supervisor.start_campaign().await.unwrap();
        assert!(matches!(
            supervisor.start_campaign().await,
            Err(FleetError::AlreadyRunning)
        ));
        supervisor.stop_campaign().await;
    }
}
