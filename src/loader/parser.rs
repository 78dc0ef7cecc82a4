use serde::de::DeserializeOwned;
use std::fs;

use crate::api::scenario_dto::ScenarioDto;
use crate::api::scheduler_config_dto::SchedulerConfigDto;
use crate::domain::mec_system_model::scheduler_config::SchedulerConfig;
use crate::error::Result;

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    parse_json_str(&data)
}

pub fn parse_json_str<T: DeserializeOwned>(data: &str) -> Result<T> {
    Ok(serde_json::from_str(data)?)
}

/// Reads and validates a scheduler configuration.
pub fn load_scheduler_config(file_path: &str) -> Result<SchedulerConfig> {
    let dto: SchedulerConfigDto = parse_json_file(file_path)?;
    let config = SchedulerConfig::try_from(dto)?;
    log::info!("Loader: configuration '{}' loaded (scheme {}).", file_path, config.scheme);
    Ok(config)
}

pub fn load_scenario(file_path: &str) -> Result<ScenarioDto> {
    let scenario: ScenarioDto = parse_json_file(file_path)?;
    log::info!("Loader: scenario '{}' loaded with {} events.", file_path, scenario.events.len());
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn missing_file_is_an_io_error() {
        let result: Result<SchedulerConfigDto> = parse_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn malformed_json_is_a_deserialization_error() {
        let result: Result<SchedulerConfigDto> = parse_json_str("{ \"scheme\": ");
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
