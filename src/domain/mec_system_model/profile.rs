use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::api::scenario_dto::ProfileDto;
use crate::domain::mec_system_model::utils::id::{DeviceTypeId, ServiceId};

/// Read access to the measured execution-time and accuracy profiles of the services.
pub trait ResourceProfileSource: Debug + Send + Sync {
    /// Execution time in seconds of `service` on a whole device of type `device_type`.
    fn execution_time(&self, service: &ServiceId, device_type: &DeviceTypeId) -> Option<f64>;

    /// Inference accuracy of `service`.
    fn accuracy(&self, service: &ServiceId) -> Option<f64>;

    /// All services a job may be served with in accuracy mode.
    fn service_catalog(&self) -> Vec<ServiceId>;
}

/// In-memory profile table.
#[derive(Debug, Clone, Default)]
pub struct ProfileDatabase {
    execution_times: BTreeMap<(ServiceId, DeviceTypeId), f64>,
    accuracies: BTreeMap<ServiceId, f64>,
}

impl ProfileDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution_time(mut self, service: &str, device_type: &str, seconds: f64) -> Self {
        self.execution_times.insert((ServiceId::new(service), DeviceTypeId::new(device_type)), seconds);
        self
    }

    pub fn with_accuracy(mut self, service: &str, accuracy: f64) -> Self {
        self.accuracies.insert(ServiceId::new(service), accuracy);
        self
    }
}

impl From<ProfileDto> for ProfileDatabase {
    fn from(dto: ProfileDto) -> Self {
        let scale = dto.time_scale.unwrap_or(1.0);
        let mut db = ProfileDatabase::new();
        for entry in dto.execution_times {
            // profiles are measured in ms
            db = db.with_execution_time(&entry.service, &entry.device_type, entry.time_ms / 1000.0 * scale);
        }
        for entry in dto.accuracies {
            db = db.with_accuracy(&entry.service, entry.accuracy);
        }
        db
    }
}

impl ResourceProfileSource for ProfileDatabase {
    fn execution_time(&self, service: &ServiceId, device_type: &DeviceTypeId) -> Option<f64> {
        self.execution_times.get(&(service.clone(), device_type.clone())).copied()
    }

    fn accuracy(&self, service: &ServiceId) -> Option<f64> {
        self.accuracies.get(service).copied()
    }

    fn service_catalog(&self) -> Vec<ServiceId> {
        let mut services: Vec<ServiceId> = self.accuracies.keys().cloned().collect();
        for (service, _) in self.execution_times.keys() {
            if !services.contains(service) {
                services.push(service.clone());
            }
        }
        services.sort();
        services
    }
}
