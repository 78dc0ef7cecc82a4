use serde::Deserialize;

/// A recorded run: service profiles, backhaul topology and timed inbound events.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDto {
    pub profile: ProfileDto,
    pub topology: Option<TopologyDto>,
    /// Answer every start grant with a successful initialization.
    #[serde(default)]
    pub auto_acknowledge: bool,
    pub events: Vec<TimedEventDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub time_scale: Option<f64>,
    pub execution_times: Vec<ExecutionTimeEntryDto>,
    #[serde(default)]
    pub accuracies: Vec<AccuracyEntryDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTimeEntryDto {
    pub service: String,
    pub device_type: String,
    pub time_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyEntryDto {
    pub service: String,
    pub accuracy: f64,
}

/// Square 0/1 adjacency matrix over `nodes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDto {
    pub nodes: Vec<String>,
    pub adjacency: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEventDto {
    pub at_ms: i64,
    #[serde(flatten)]
    pub event: EventDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventDto {
    Request(RequestDto),
    NodeStatus(NodeStatusDto),
    InitFeedback(FeedbackDto),
    RuntimeFeedback(FeedbackDto),
    #[serde(rename_all = "camelCase")]
    VehicleDeparture {
        vehicle_id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDto {
    pub vehicle_id: String,
    pub port: u16,
    pub input_size: u64,
    pub output_size: u64,
    pub period_ms: i64,
    pub service: String,
    pub resource_type: String,
    pub energy: f64,
    pub offload_power: f64,
    #[serde(default)]
    pub accuracy: f64,
    pub stop_time_ms: i64,
    pub vehicle_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusDto {
    pub node_id: String,
    pub node_address: Option<String>,
    pub device_type: String,
    pub resource_type: String,
    pub free_bandwidth: i64,
    pub bandwidth_capacity: i64,
    pub free_compute: i64,
    pub compute_capacity: i64,
    pub timestamp_ms: i64,
    pub bandwidth_timestamp_ms: Option<i64>,
    pub compute_timestamp_ms: Option<i64>,
    pub vehicle_link: Option<VehicleLinkDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLinkDto {
    pub vehicle_id: String,
    pub bytes_per_band: f64,
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDto {
    pub job_id: String,
    pub success: bool,
    pub offload_node_id: String,
    pub process_node_id: String,
    pub free_bandwidth: i64,
    pub free_compute: i64,
    pub timestamp_ms: i64,
    pub granted_bandwidth: Option<i64>,
}
