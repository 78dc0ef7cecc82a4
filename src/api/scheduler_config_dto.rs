use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigDto {
    pub scheme: String,
    pub objective: String,
    pub scheduling_interval_ms: i64,
    pub app_stop_interval_ms: i64,
    pub grant_ack_interval_ms: i64,
    pub conn_outdate_interval_ms: i64,
    pub cu_step: i64,
    pub rb_step: i64,
    pub offload_overhead_s: f64,
    pub slot_duration_s: f64,
    #[serde(default)]
    pub count_exe_time: bool,
    #[serde(default)]
    pub reschedule_all: bool,
    #[serde(default)]
    pub enable_forwarding: bool,
    pub max_hops: Option<u32>,
    pub fair_factor: Option<f64>,
    pub virtual_link_rate: Option<f64>,
    pub lp_time_limit_ms: Option<u64>,
    pub seed: Option<u64>,
}
