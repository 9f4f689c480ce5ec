//! Narrative fleet binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `NARRATIVE_CONFIG` (default `narrative-config.yaml`)
//! 3. Load account credentials
//! 4. Build the platform client and the text generation chain
//! 5. Create the fleet and start the campaign
//! 6. Wait for Ctrl-C, stop the campaign and print the final report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use narrative_agents::{AgentDeps, HttpPlatformClient, ProviderChain};
use narrative_fleet::{FleetConfig, FleetError, FleetSupervisor, load_accounts};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, accounts or fleet startup fail.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("narrative-fleet starting");

    let config = load_config()?;
    info!(
        objective = %config.campaign.objective,
        active_agents = config.campaign.active_agents,
        personas = config.personas.len(),
        api_base_url = %config.platform.base_url,
        llm_providers = config.generation.providers.len(),
        "Configuration loaded"
    );

    let accounts = load_accounts(Path::new(&config.campaign.accounts_file))
        .map_err(FleetError::from)?;
    info!(
        accounts = accounts.len(),
        path = %config.campaign.accounts_file,
        "Accounts loaded"
    );

    let client = HttpPlatformClient::new(&config.platform).map_err(FleetError::from)?;
    let generator = ProviderChain::new(&config.generation).map_err(FleetError::from)?;
    let deps = AgentDeps {
        client: Arc::new(client),
        generator: Arc::new(generator),
    };

    let mut supervisor = FleetSupervisor::new(&config);
    supervisor.create_fleet(
        config.campaign.active_agents,
        &accounts,
        &config.persona_table(),
        &deps,
    )?;
    let started = supervisor.start_campaign().await?;
    info!(agents = started, "Campaign running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, stopping now");
    }
    info!("Shutdown requested");

    let report = supervisor.stop_campaign().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("narrative-fleet stopped");
    Ok(())
}

/// Human-readable logs by default; JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load the fleet configuration, falling back to defaults when the file
/// does not exist.
fn load_config() -> Result<FleetConfig, FleetError> {
    let config_path = std::env::var("NARRATIVE_CONFIG")
        .map_or_else(|_| PathBuf::from("narrative-config.yaml"), PathBuf::from);
    if config_path.exists() {
        Ok(FleetConfig::from_file(&config_path)?)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        let mut config = FleetConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
