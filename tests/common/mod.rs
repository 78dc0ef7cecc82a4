#![allow(dead_code)]

use std::sync::Arc;

use mec_scheduler::domain::mec_system_model::coordinator::coordinator::SchedulerCoordinator;
use mec_scheduler::domain::mec_system_model::messages::{
    Grant, InitFeedback, NodeStatusUpdate, ResourceReport, RuntimeFeedback, VehicleLinkObservation,
};
use mec_scheduler::domain::mec_system_model::profile::ProfileDatabase;
use mec_scheduler::domain::mec_system_model::request::Request;
use mec_scheduler::domain::mec_system_model::scheduler_config::SchedulerConfig;
use mec_scheduler::domain::mec_system_model::utils::id::{DeviceTypeId, JobId, NodeId, ResourceTypeId, ServiceId, VehicleId};
use mec_scheduler::domain::simulator::simulator::SharedSimulator;
use mec_scheduler::domain::simulator::simulator_mock::MockSimulator;

/// 50 ms for resnet on a whole rtx device, the figure used throughout the tests.
pub fn profile() -> Arc<ProfileDatabase> {
    Arc::new(
        ProfileDatabase::new()
            .with_execution_time("resnet", "rtx", 0.05)
            .with_execution_time("mobilenet", "rtx", 0.02)
            .with_accuracy("resnet", 0.9)
            .with_accuracy("mobilenet", 0.7),
    )
}

/// An active coordinator on a mock clock starting at `start_ms`.
pub fn coordinator(config: SchedulerConfig, start_ms: i64) -> (SchedulerCoordinator, MockSimulator) {
    let clock = MockSimulator::new(start_ms);
    let mut coordinator = SchedulerCoordinator::new(config, profile(), SharedSimulator(Arc::new(clock.clone())))
        .expect("test configuration must be valid");
    coordinator.initialize_as_leader();
    (coordinator, clock)
}

pub fn request(vehicle: &str, port: u16) -> Request {
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

pub fn node_status(node: &str, free_bw: i64, free_cu: i64, ts: i64) -> NodeStatusUpdate {
    NodeStatusUpdate {
        node_id: NodeId::new(node),
        node_address: format!("{}.addr", node),
        device_type: DeviceTypeId::new("rtx"),
        resource_type: ResourceTypeId::new("gpu"),
        free_bandwidth: free_bw,
        bandwidth_capacity: free_bw,
        free_compute: free_cu,
        compute_capacity: free_cu,
        bandwidth_timestamp_ms: ts,
        compute_timestamp_ms: ts,
        vehicle_link: None,
    }
}

/// A node status carrying a 2000 B/band link to `vehicle`.
pub fn status_with_link(node: &str, free_bw: i64, free_cu: i64, ts: i64, vehicle: &str) -> NodeStatusUpdate {
    let mut status = node_status(node, free_bw, free_cu, ts);
    status.vehicle_link =
        Some(VehicleLinkObservation { vehicle_id: VehicleId::new(vehicle), bytes_per_band: 2000.0, timestamp_ms: ts });
    status
}

pub fn report_for(grant: &Grant, free_bandwidth: i64, free_compute: i64, ts: i64) -> ResourceReport {
    ResourceReport {
        offload_node_id: grant.offload_node_id.clone(),
        process_node_id: grant.process_node_id.clone(),
        free_bandwidth,
        free_compute,
        bandwidth_timestamp_ms: ts,
        compute_timestamp_ms: ts,
    }
}

pub fn init_feedback(grant: &Grant, success: bool, free_bandwidth: i64, free_compute: i64, ts: i64) -> InitFeedback {
    InitFeedback { job_id: grant.job_id.clone(), success, report: report_for(grant, free_bandwidth, free_compute, ts) }
}

pub fn stop_confirmation(grant: &Grant, free_bandwidth: i64, free_compute: i64, ts: i64) -> RuntimeFeedback {
    RuntimeFeedback {
        job_id: grant.job_id.clone(),
        success: true,
        granted_bandwidth: 0,
        report: report_for(grant, free_bandwidth, free_compute, ts),
    }
}

pub fn job(vehicle: &str, port: u16) -> JobId {
    JobId::for_vehicle(&VehicleId::new(vehicle), port)
}
