//! Fleet configuration loaded from YAML, plus the accounts file.
//!
//! [`FleetConfig`] mirrors `narrative-config.yaml`. Every section defaults,
//! so the fleet runs from an empty file; a handful of environment variables
//! override the values operators change most often.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use narrative_agents::{AgentConfig, AgentSettings, GenerationConfig, PlatformConfig};
use narrative_agents::{ScannerConfig, StrategyConfig};
use narrative_limiter::LimitsConfig;
use narrative_types::{CampaignObjective, Credential, Persona};
use serde::Deserialize;
use tracing::warn;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Failed to parse the accounts file.
    #[error("failed to parse accounts JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        source: serde_json::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

/// Top-level fleet configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FleetConfig {
    /// What the fleet campaigns for and with how many accounts.
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Agent loop timing and behaviour.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Strategy tuning.
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Scanner sampling.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Per-agent action limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Supervision, retry and coordination timing.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Platform API location.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Text generation chain.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Personas by name. Agents are assigned personas round-robin in name order.
    #[serde(default)]
    pub personas: BTreeMap<String, Persona>,
}

impl FleetConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override fields from the environment.
    ///
    /// - `CAMPAIGN_OBJECTIVE` overrides `campaign.objective`
    /// - `ACTIVE_AGENTS` overrides `campaign.active_agents`
    /// - `ACCOUNTS_FILE` overrides `campaign.accounts_file`
    /// - `API_BASE_URL` overrides `platform.base_url`
    /// - `LLM_API_URL` and the backend key variables fill `generation`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAMPAIGN_OBJECTIVE") {
            match CampaignObjective::parse(&val) {
                Some(objective) => self.campaign.objective = objective,
                None => warn!(value = %val, "ignoring unknown CAMPAIGN_OBJECTIVE"),
            }
        }
        if let Ok(val) = std::env::var("ACTIVE_AGENTS") {
            match val.trim().parse() {
                Ok(count) => self.campaign.active_agents = count,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid ACTIVE_AGENTS"),
            }
        }
        if let Ok(val) = std::env::var("ACCOUNTS_FILE") {
            self.campaign.accounts_file = val;
        }
        self.platform.apply_env_overrides();
        self.generation.apply_env_overrides();
    }

    /// Persona table with every persona's name set to its key.
    pub fn persona_table(&self) -> BTreeMap<String, Persona> {
        self.personas
            .iter()
            .map(|(name, persona)| {
                let mut persona = persona.clone();
                if persona.name.is_empty() {
                    persona.name.clone_from(name);
                }
                (name.clone(), persona)
            })
            .collect()
    }

    /// The sections every agent is built from.
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            agent: self.agent.clone(),
            limits: self.limits,
            scanner: self.scanner.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// Campaign-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CampaignConfig {
    /// Objective every agent works toward.
    #[serde(default)]
    pub objective: CampaignObjective,

    /// Number of agents to create.
    #[serde(default = "default_active_agents")]
    pub active_agents: usize,

    /// JSON file holding `[{"username": ..., "password": ...}, ...]`.
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            objective: CampaignObjective::default(),
            active_agents: default_active_agents(),
            accounts_file: default_accounts_file(),
        }
    }
}

const fn default_active_agents() -> usize {
    10
}

fn default_accounts_file() -> String {
    "data/accounts.json".to_owned()
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Supervision and coordination settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupervisorConfig {
    /// Failed runs tolerated per agent before it is removed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; the wait after the n-th failure is n times this, in seconds.
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    /// Time between coordination cycles, in seconds.
    #[serde(default = "default_coordination_interval_secs")]
    pub coordination_interval_secs: u64,

    /// Time before retrying a failed coordination cycle, in seconds.
    #[serde(default = "default_coordination_retry_secs")]
    pub coordination_retry_secs: u64,

    /// How long stopped agents get to finish before they are aborted, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Lifetime of a coordination directive, in seconds.
    #[serde(default = "default_directive_ttl_secs")]
    pub directive_ttl_secs: u64,

    /// Trending topics targeted by one amplification.
    #[serde(default = "default_amplify_topics")]
    pub amplify_topics: usize,

    /// Agents assigned to an amplification.
    #[serde(default = "default_amplify_agents")]
    pub amplify_agents: usize,

    /// NPCs targeted by one coordinated engagement.
    #[serde(default = "default_npc_targets")]
    pub npc_targets: usize,

    /// Agents assigned to a coordinated NPC engagement.
    #[serde(default = "default_npc_agents")]
    pub npc_agents: usize,
}

impl SupervisorConfig {
    /// Coordination interval.
    pub const fn coordination_interval(&self) -> Duration {
        Duration::from_secs(self.coordination_interval_secs)
    }

    /// Coordination retry interval.
    pub const fn coordination_retry(&self) -> Duration {
        Duration::from_secs(self.coordination_retry_secs)
    }

    /// Shutdown grace period.
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Directive lifetime.
    pub fn directive_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.directive_ttl_secs).unwrap_or(i64::MAX))
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            coordination_interval_secs: default_coordination_interval_secs(),
            coordination_retry_secs: default_coordination_retry_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            directive_ttl_secs: default_directive_ttl_secs(),
            amplify_topics: default_amplify_topics(),
            amplify_agents: default_amplify_agents(),
            npc_targets: default_npc_targets(),
            npc_agents: default_npc_agents(),
        }
    }
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay_secs() -> u64 {
    60
}

const fn default_coordination_interval_secs() -> u64 {
    300
}

const fn default_coordination_retry_secs() -> u64 {
    60
}

const fn default_shutdown_grace_secs() -> u64 {
    30
}

const fn default_directive_ttl_secs() -> u64 {
    600
}

const fn default_amplify_topics() -> usize {
    3
}

const fn default_amplify_agents() -> usize {
    3
}

const fn default_npc_targets() -> usize {
    5
}

const fn default_npc_agents() -> usize {
    2
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Load credentials from a JSON accounts file.
///
/// Entries without a username or password are skipped with a warning.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Json`] if it is not a list of credentials.
pub fn load_accounts(path: &Path) -> Result<Vec<Credential>, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_accounts(&contents)
}

/// Parse credentials from JSON.
///
/// # Errors
///
/// Returns [`ConfigError::Json`] if the string is not a list of credentials.
pub fn parse_accounts(json: &str) -> Result<Vec<Credential>, ConfigError> {
    let accounts: Vec<Credential> = serde_json::from_str(json)?;
    Ok(accounts
        .into_iter()
        .enumerate()
        .filter_map(|(index, account)| {
            if account.username.is_empty() || account.password.is_empty() {
                warn!(index, "skipping account with missing username or password");
                None
            } else {
                Some(account)
            }
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config: FleetConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config.campaign.active_agents, 10);
        assert_eq!(config.campaign.objective, CampaignObjective::SupportVictor);
        assert_eq!(config.supervisor.max_retries, 3);
        assert_eq!(
            config.supervisor.coordination_interval(),
            Duration::from_secs(300)
        );
        assert!(config.personas.is_empty());
    }

    #[test]
    fn shipped_config_keeps_default_tuning() {
        let shipped: FleetConfig =
            serde_yml::from_str(include_str!("../../../narrative-config.yaml")).unwrap();
        let defaults = FleetConfig::default();
        assert_eq!(shipped.campaign, defaults.campaign);
        assert_eq!(shipped.agent, defaults.agent);
        assert_eq!(shipped.strategy, defaults.strategy);
        assert_eq!(shipped.scanner, defaults.scanner);
        assert_eq!(shipped.limits, defaults.limits);
        assert_eq!(shipped.supervisor, defaults.supervisor);
        assert_eq!(shipped.persona_table().len(), 3);
    }

    #[test]
    fn sections_parse_from_yaml() {
        let yaml = r#"
campaign:
  objective: voter_disillusionment
  active_agents: 4
agent:
  min_interval_secs: 60
  max_interval_secs: 120
limits:
  post:
    capacity: 1
    window_secs: 60
supervisor:
  shutdown_grace_secs: 5
personas:
  local_foodie:
    interests: [baking, markets]
    tone: warm
"#;
        let config: FleetConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(
            config.campaign.objective,
            CampaignObjective::VoterDisillusionment
        );
        assert_eq!(config.campaign.active_agents, 4);
        assert_eq!(config.agent.min_interval_secs, 60);
        assert_eq!(config.limits.post.capacity, 1);
        assert_eq!(config.supervisor.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.supervisor.retry_base_delay_secs, 60);

        let personas = config.persona_table();
        let foodie = personas.get("local_foodie").unwrap();
        assert_eq!(foodie.name, "local_foodie");
        assert_eq!(foodie.interests, vec!["baking", "markets"]);
    }

    #[test]
    fn incomplete_accounts_are_skipped() {
        let accounts = parse_accounts(
            r#"[
                {"username": "maple@team", "password": "a"},
                {"username": "", "password": "b"},
                {"username": "birch@team", "password": "c"}
            ]"#,
        )
        .unwrap();
        let names: Vec<_> = accounts.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["maple@team", "birch@team"]);
    }

    #[test]
    fn malformed_accounts_are_an_error() {
        assert!(matches!(
            parse_accounts("{\"username\": 1}"),
            Err(ConfigError::Json { .. })
        ));
    }
}
