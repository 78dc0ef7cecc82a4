pub mod scenario_dto;
pub mod scheduler_config_dto;
