//! Chronicle demo entry point.

use std::sync::Arc;

use chronicle_core::clock::SystemClock;
use chronicle_core::config::PersistenceConfig;
use chronicle_demo::error::AppError;
use chronicle_demo::scenario::{self, ScenarioConfig};
use chronicle_demo::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Chronicle ledger demo");

    // Read configuration from environment.
    let persistence = PersistenceConfig::from_env()?;
    let scenario_config = ScenarioConfig::from_lookup(|key| std::env::var(key).ok())?;
    tracing::info!(
        strategy = %persistence.strategy,
        accounts = scenario_config.accounts,
        "configuration loaded"
    );

    let state = AppState::new(persistence, Arc::new(SystemClock));
    let report = scenario::run(&state, scenario_config).await?;

    tracing::info!(
        steps = report.steps.len(),
        rejected = report.rejected().count(),
        published_events = report.published_events,
        stored_accounts = state.store.len(),
        "scenario finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
