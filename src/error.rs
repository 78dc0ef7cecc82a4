use thiserror::Error;

use crate::domain::mec_system_model::utils::id::JobId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse scheduler JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid scheduler configuration: {0}")]
    ConfigError(String),

    #[error("Failed to convert configuration: {0}")]
    ConversionError(#[from] ConversionError),

    /// A strategy handed back a selection the coordinator refuses to grant.
    /// This is a defect in the strategy, so the cycle is aborted.
    #[error("Scheme {scheme} returned an invalid selection for job {job_id}: {reason}")]
    InvalidSelection { scheme: String, job_id: JobId, reason: String },

    #[error("LP solver failed: {0}")]
    SolverError(String),

    #[error("Job {0} is not known to the coordinator")]
    UnknownJob(JobId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Unknown scheduling scheme: {0}")]
    UnknownSchemeType(String),

    #[error("Unknown optimization objective: {0}")]
    UnknownObjective(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
}

pub type Result<T> = std::result::Result<T, Error>;
