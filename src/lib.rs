use crate::domain::mec_system_model::coordinator::replay::ScenarioRunner;
use crate::error::Result;
use crate::loader::parser::{load_scenario, load_scheduler_config};

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a scheduler configuration and a scenario and prepares a replay of it.
pub fn generate_scenario_runner(config_path: &str, scenario_path: &str) -> Result<ScenarioRunner> {
    let config = load_scheduler_config(config_path)?;
    let scenario = load_scenario(scenario_path)?;

    let runner = ScenarioRunner::new(config, scenario)?;
    log::info!("Scenario runner constructed successfully.");
    Ok(runner)
}
