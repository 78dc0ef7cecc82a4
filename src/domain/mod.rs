pub mod mec_system_model;
pub mod simulator;
