use crate::domain::mec_system_model::utils::id::{NodeId, ServiceId};

/// An admitted job: where it runs and what it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedService {
    pub offload_node_id: NodeId,
    pub process_node_id: NodeId,
    pub bandwidth: i64,
    pub compute: i64,
    pub utility: f64,
    /// Execution time in seconds at the granted compute.
    pub exec_time: f64,
    pub max_offload_time: f64,
    pub service: ServiceId,
    pub grant_time_ms: i64,
    /// Bandwidth still reserved at the offload node while the service initializes.
    pub held_bandwidth: i64,
    /// Compute still reserved at the processing node while the service initializes.
    pub held_compute: i64,
}

/// State a stop instruction was sent from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOrigin {
    Initializing,
    Running,
}

/// Lifecycle of one job.
///
/// ```text
/// Unscheduled -> Initializing -> Running -> Stopping -> Unscheduled
///                     |             |
///                     +-> Stopping  +-> Unscheduled (runtime failure)
///                     +-> Unscheduled (init failure)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Unscheduled,
    Initializing(GrantedService),
    Running(GrantedService),
    Stopping { service: GrantedService, prior: StopOrigin },
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Unscheduled => "Unscheduled",
            JobState::Initializing(_) => "Initializing",
            JobState::Running(_) => "Running",
            JobState::Stopping { .. } => "Stopping",
        }
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self, JobState::Unscheduled)
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, JobState::Initializing(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running(_))
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, JobState::Stopping { .. })
    }

    pub fn service(&self) -> Option<&GrantedService> {
        match self {
            JobState::Unscheduled => None,
            JobState::Initializing(service) | JobState::Running(service) | JobState::Stopping { service, .. } => Some(service),
        }
    }

    /// Whether the job still holds an on-hold reservation from its grant.
    pub fn holds_resources(&self) -> bool {
        matches!(self, JobState::Initializing(_) | JobState::Stopping { prior: StopOrigin::Initializing, .. })
    }
}
