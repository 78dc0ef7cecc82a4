use serde::Serialize;

use crate::api::scenario_dto::{FeedbackDto, NodeStatusDto};
use crate::domain::mec_system_model::utils::id::{DeviceTypeId, JobId, NodeId, ResourceTypeId, ServiceId, VehicleId};

/// Link quality between a vehicle and the node that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleLinkObservation {
    pub vehicle_id: VehicleId,
    /// Bytes one bandwidth unit carries in one radio slot.
    pub bytes_per_band: f64,
    pub timestamp_ms: i64,
}

/// Periodic resource report of an edge node, optionally carrying a link observation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatusUpdate {
    pub node_id: NodeId,
    pub node_address: String,
    pub device_type: DeviceTypeId,
    pub resource_type: ResourceTypeId,
    pub free_bandwidth: i64,
    pub bandwidth_capacity: i64,
    pub free_compute: i64,
    pub compute_capacity: i64,
    pub bandwidth_timestamp_ms: i64,
    pub compute_timestamp_ms: i64,
    pub vehicle_link: Option<VehicleLinkObservation>,
}

/// Free-resource figures piggybacked on feedback messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReport {
    pub offload_node_id: NodeId,
    pub process_node_id: NodeId,
    /// Free bandwidth of the offload node.
    pub free_bandwidth: i64,
    /// Free compute of the processing node.
    pub free_compute: i64,
    pub bandwidth_timestamp_ms: i64,
    pub compute_timestamp_ms: i64,
}

/// Outcome of a service initialization at the processing node.
#[derive(Debug, Clone, PartialEq)]
pub struct InitFeedback {
    pub job_id: JobId,
    pub success: bool,
    pub report: ResourceReport,
}

/// Report about a running service, or the confirmation of a stop.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFeedback {
    pub job_id: JobId,
    pub success: bool,
    /// Bandwidth currently used by the job at its offload node.
    pub granted_bandwidth: i64,
    pub report: ResourceReport,
}

/// Instruction sent to the vehicle and the involved nodes. A grant either
/// starts a service or stops it (`is_stop`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub job_id: JobId,
    pub vehicle_address: String,
    pub offload_node_id: NodeId,
    pub offload_node_address: String,
    pub process_node_id: NodeId,
    pub resource_type: ResourceTypeId,
    pub service: ServiceId,
    pub compute_units: i64,
    pub bandwidth: i64,
    pub deadline_ms: i64,
    pub output_size: u64,
    pub input_size: u64,
    pub is_start: bool,
    pub is_stop: bool,
    /// Execution time in seconds at the granted compute amount.
    pub exec_time: f64,
    /// Longest tolerable transmission time in seconds.
    pub max_offload_time: f64,
    pub utility: f64,
}

impl From<NodeStatusDto> for NodeStatusUpdate {
    fn from(dto: NodeStatusDto) -> Self {
        let vehicle_link = dto.vehicle_link.map(|link| VehicleLinkObservation {
            vehicle_id: VehicleId::new(link.vehicle_id),
            bytes_per_band: link.bytes_per_band,
            timestamp_ms: link.timestamp_ms.unwrap_or(dto.timestamp_ms),
        });

        NodeStatusUpdate {
            node_address: dto.node_address.unwrap_or_else(|| dto.node_id.clone()),
            node_id: NodeId::new(dto.node_id),
            device_type: DeviceTypeId::new(dto.device_type),
            resource_type: ResourceTypeId::new(dto.resource_type),
            free_bandwidth: dto.free_bandwidth,
            bandwidth_capacity: dto.bandwidth_capacity,
            free_compute: dto.free_compute,
            compute_capacity: dto.compute_capacity,
            bandwidth_timestamp_ms: dto.bandwidth_timestamp_ms.unwrap_or(dto.timestamp_ms),
            compute_timestamp_ms: dto.compute_timestamp_ms.unwrap_or(dto.timestamp_ms),
            vehicle_link,
        }
    }
}

impl From<&FeedbackDto> for ResourceReport {
    fn from(dto: &FeedbackDto) -> Self {
        ResourceReport {
            offload_node_id: NodeId::new(dto.offload_node_id.as_str()),
            process_node_id: NodeId::new(dto.process_node_id.as_str()),
            free_bandwidth: dto.free_bandwidth,
            free_compute: dto.free_compute,
            bandwidth_timestamp_ms: dto.timestamp_ms,
            compute_timestamp_ms: dto.timestamp_ms,
        }
    }
}

impl From<FeedbackDto> for InitFeedback {
    fn from(dto: FeedbackDto) -> Self {
        InitFeedback { report: ResourceReport::from(&dto), job_id: JobId::new(dto.job_id), success: dto.success }
    }
}

impl From<FeedbackDto> for RuntimeFeedback {
    fn from(dto: FeedbackDto) -> Self {
        RuntimeFeedback {
            report: ResourceReport::from(&dto),
            granted_bandwidth: dto.granted_bandwidth.unwrap_or(0),
            job_id: JobId::new(dto.job_id),
            success: dto.success,
        }
    }
}
