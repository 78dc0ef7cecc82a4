use crate::api::scenario_dto::RequestDto;
use crate::domain::mec_system_model::utils::id::{JobId, ResourceTypeId, ServiceId, VehicleId};

/// A periodic compute-offload job submitted by a vehicle.
///
/// Sizes are in bytes, times in ms. The job is created on the first request
/// message and lives until its vehicle leaves, its period becomes non-positive
/// or its stop time is imminent.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub job_id: JobId,
    pub vehicle_id: VehicleId,
    pub input_size: u64,
    pub output_size: u64,
    /// Deadline of one execution round in ms.
    pub period_ms: i64,
    pub service: ServiceId,
    pub resource_type: ResourceTypeId,
    /// Energy (J) the vehicle spends executing one round locally.
    pub local_energy: f64,
    /// Transmit power (W) while offloading.
    pub offload_power: f64,
    /// Accuracy of the vehicle's local model.
    pub local_accuracy: f64,
    pub stop_time_ms: i64,
    pub vehicle_address: String,
}

impl Request {
    pub fn period_s(&self) -> f64 {
        self.period_ms as f64 / 1000.0
    }

    /// True once the job can no longer complete a full round before it is stopped.
    pub fn is_expiring(&self, now_ms: i64, scheduling_interval_ms: i64) -> bool {
        now_ms >= self.stop_time_ms - self.period_ms.max(scheduling_interval_ms)
    }

    /// The grant of a running job must be withdrawn once the last round would overrun the stop time.
    pub fn must_stop(&self, now_ms: i64) -> bool {
        now_ms >= self.stop_time_ms - self.period_ms
    }

    /// Upper bound on the transmission time before offloading costs more energy than it saves.
    pub fn energy_offload_bound(&self) -> Option<f64> {
        if self.offload_power > 0.0 { Some(self.local_energy / self.offload_power) } else { None }
    }
}

impl From<RequestDto> for Request {
    fn from(dto: RequestDto) -> Self {
        let vehicle_id = VehicleId::new(dto.vehicle_id);
        let job_id = JobId::for_vehicle(&vehicle_id, dto.port);

        Request {
            job_id,
            vehicle_id,
            input_size: dto.input_size,
            output_size: dto.output_size,
            period_ms: dto.period_ms,
            service: ServiceId::new(dto.service),
            resource_type: ResourceTypeId::new(dto.resource_type),
            local_energy: dto.energy,
            offload_power: dto.offload_power,
            local_accuracy: dto.accuracy,
            stop_time_ms: dto.stop_time_ms,
            vehicle_address: dto.vehicle_address.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_request(vehicle: &str, port: u16) -> Request {
    let vehicle_id = VehicleId::new(vehicle);
    Request {
        job_id: JobId::for_vehicle(&vehicle_id, port),
        vehicle_id,
        input_size: 1000,
        output_size: 100,
        period_ms: 100,
        service: ServiceId::new("resnet"),
        resource_type: ResourceTypeId::new("gpu"),
        local_energy: 2.0,
        offload_power: 0.5,
        local_accuracy: 0.5,
        stop_time_ms: 10_000,
        vehicle_address: format!("{}.addr", vehicle),
    }
}
