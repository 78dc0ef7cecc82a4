use std::sync::Arc;
use std::time::Duration;

use bimap::BiHashMap;

use crate::domain::mec_system_model::profile::ResourceProfileSource;
use crate::domain::mec_system_model::reachability::ReachabilityGraph;
use crate::domain::mec_system_model::request::Request;
use crate::domain::mec_system_model::scheduler_config::{Objective, SchedulerConfig};
use crate::domain::mec_system_model::utils::id::{DeviceTypeId, JobId, NodeId, ServiceId, VehicleId};

/// Framing bytes added to every offloaded input.
pub const PACKET_HEADER_BYTES: u64 = 33;

/// Dense index of a job inside one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobIdx(pub usize);

/// Dense index of a node inside one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub usize);

#[derive(Debug, Clone)]
pub struct JobView {
    pub job_id: JobId,
    pub vehicle_id: VehicleId,
    pub service: ServiceId,
    pub input_size: u64,
    pub period_s: f64,
    pub local_energy: f64,
    pub offload_power: f64,
    pub local_accuracy: f64,
    /// Nodes the vehicle can offload to, with the bytes per slot one bandwidth unit carries.
    pub links: Vec<(NodeIdx, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub node_id: NodeId,
    pub device_type: DeviceTypeId,
    /// Free bandwidth minus what is on hold.
    pub free_bandwidth: i64,
    /// Free compute minus what is on hold.
    pub free_compute: i64,
    pub compute_capacity: i64,
}

/// Scheme tunables copied out of the coordinator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeParams {
    pub objective: Objective,
    pub cu_step: i64,
    pub rb_step: i64,
    pub offload_overhead_s: f64,
    pub slot_duration_s: f64,
    pub fair_factor: f64,
    pub virtual_link_rate: f64,
    pub lp_time_limit: Duration,
}

impl From<&SchedulerConfig> for SchemeParams {
    fn from(config: &SchedulerConfig) -> Self {
        SchemeParams {
            objective: config.objective,
            cu_step: config.cu_step,
            rb_step: config.rb_step,
            offload_overhead_s: config.offload_overhead_s,
            slot_duration_s: config.slot_duration_s,
            fair_factor: config.fair_factor,
            virtual_link_rate: config.virtual_link_rate,
            lp_time_limit: Duration::from_millis(config.lp_time_limit_ms),
        }
    }
}

/// Read-only view of everything a scheme needs for one cycle.
///
/// Jobs and nodes are renumbered densely every cycle; the bimaps translate
/// between ids and indices. Nodes are indexed in ascending id order.
#[derive(Debug, Clone)]
pub struct SchedulingSnapshot {
    pub now_ms: i64,
    pub params: SchemeParams,
    jobs: Vec<JobView>,
    nodes: Vec<NodeView>,
    job_index: BiHashMap<JobId, JobIdx>,
    node_index: BiHashMap<NodeId, NodeIdx>,
    /// Per offload node: processing nodes reachable over the backhaul with their hop counts.
    reach: Vec<Vec<(NodeIdx, u32)>>,
    profile: Arc<dyn ResourceProfileSource>,
}

impl SchedulingSnapshot {
    /// Assembles a snapshot. Links to nodes outside `nodes` are dropped, as are
    /// reachable nodes that are not part of the snapshot.
    pub fn build(
        now_ms: i64,
        params: SchemeParams,
        profile: Arc<dyn ResourceProfileSource>,
        mut nodes: Vec<NodeView>,
        jobs: Vec<(&Request, Vec<(NodeId, f64)>)>,
        reachability: Option<&ReachabilityGraph>,
    ) -> Self {
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        let mut node_index = BiHashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            node_index.insert(node.node_id.clone(), NodeIdx(idx));
        }

        let reach = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let mut reachable = vec![(NodeIdx(idx), 0)];
                if let Some(hops) = reachability.and_then(|graph| graph.reachable(&node.node_id)) {
                    for (target, hop_count) in hops {
                        if *hop_count == 0 {
                            continue;
                        }
                        if let Some(target_idx) = node_index.get_by_left(target) {
                            reachable.push((*target_idx, *hop_count));
                        }
                    }
                }
                reachable
            })
            .collect();

        let mut job_index = BiHashMap::new();
        let mut job_views = Vec::with_capacity(jobs.len());
        for (request, links) in jobs {
            if job_index.contains_left(&request.job_id) {
                continue;
            }
            let links = links
                .into_iter()
                .filter_map(|(node_id, rate)| node_index.get_by_left(&node_id).map(|idx| (*idx, rate)))
                .collect();
            job_index.insert(request.job_id.clone(), JobIdx(job_views.len()));
            job_views.push(JobView {
                job_id: request.job_id.clone(),
                vehicle_id: request.vehicle_id.clone(),
                service: request.service.clone(),
                input_size: request.input_size,
                period_s: request.period_s(),
                local_energy: request.local_energy,
                offload_power: request.offload_power,
                local_accuracy: request.local_accuracy,
                links,
            });
        }

        SchedulingSnapshot { now_ms, params, jobs: job_views, nodes, job_index, node_index, reach, profile }
    }

    pub fn jobs(&self) -> &[JobView] {
        &self.jobs
    }

    pub fn nodes(&self) -> &[NodeView] {
        &self.nodes
    }

    pub fn job(&self, idx: JobIdx) -> &JobView {
        &self.jobs[idx.0]
    }

    pub fn node(&self, idx: NodeIdx) -> &NodeView {
        &self.nodes[idx.0]
    }

    pub fn job_idx(&self, job_id: &JobId) -> Option<JobIdx> {
        self.job_index.get_by_left(job_id).copied()
    }

    pub fn node_idx(&self, node_id: &NodeId) -> Option<NodeIdx> {
        self.node_index.get_by_left(node_id).copied()
    }

    pub fn job_id(&self, idx: JobIdx) -> Option<&JobId> {
        self.job_index.get_by_right(&idx)
    }

    pub fn node_id(&self, idx: NodeIdx) -> Option<&NodeId> {
        self.node_index.get_by_right(&idx)
    }

    pub fn reachable_from(&self, offload_node: NodeIdx) -> &[(NodeIdx, u32)] {
        &self.reach[offload_node.0]
    }

    pub fn hop_count(&self, offload_node: NodeIdx, process_node: NodeIdx) -> Option<u32> {
        self.reach[offload_node.0].iter().find(|(idx, _)| *idx == process_node).map(|(_, hops)| *hops)
    }

    pub fn link_rate(&self, job: JobIdx, offload_node: NodeIdx) -> Option<f64> {
        self.jobs[job.0].links.iter().find(|(idx, _)| *idx == offload_node).map(|(_, rate)| *rate)
    }

    pub fn profile(&self) -> &dyn ResourceProfileSource {
        self.profile.as_ref()
    }

    pub fn free_bandwidth(&self) -> Vec<i64> {
        self.nodes.iter().map(|n| n.free_bandwidth).collect()
    }

    pub fn free_compute(&self) -> Vec<i64> {
        self.nodes.iter().map(|n| n.free_compute).collect()
    }

    //-----------------------
    // --- Delay model ---
    //-----------------------

    /// Transmission time in seconds of the job input over `bandwidth` units of a link with `bytes_per_band`.
    pub fn offload_delay(&self, job: JobIdx, bytes_per_band: f64, bandwidth: i64) -> f64 {
        if bandwidth <= 0 || bytes_per_band <= 0.0 {
            return f64::INFINITY;
        }
        let bytes = (self.jobs[job.0].input_size + PACKET_HEADER_BYTES) as f64;
        (bytes / (bytes_per_band * bandwidth as f64)).ceil() * self.params.slot_duration_s
    }

    /// Execution time in seconds of `service` with `compute` units of the node.
    pub fn exec_delay(&self, service: &ServiceId, node: NodeIdx, compute: i64) -> Option<f64> {
        if compute <= 0 {
            return None;
        }
        let view = &self.nodes[node.0];
        let base = self.profile.execution_time(service, &view.device_type)?;
        Some(base * view.compute_capacity as f64 / compute as f64)
    }

    pub fn forwarding_delay(&self, job: JobIdx, hops: u32) -> f64 {
        if hops == 0 || self.params.virtual_link_rate <= 0.0 {
            return 0.0;
        }
        self.jobs[job.0].input_size as f64 / self.params.virtual_link_rate * hops as f64
    }

    /// Smallest compute amount that executes `service` on `node` within `budget_s`.
    pub fn min_compute(&self, service: &ServiceId, node: NodeIdx, budget_s: f64) -> Option<i64> {
        if budget_s <= 0.0 {
            return None;
        }
        let view = &self.nodes[node.0];
        let base = self.profile.execution_time(service, &view.device_type)?;
        Some((base * view.compute_capacity as f64 / budget_s).ceil() as i64)
    }

    /// Smallest bandwidth that transmits the job input within `budget_s`, counted in whole slots.
    pub fn min_bandwidth(&self, job: JobIdx, bytes_per_band: f64, budget_s: f64) -> Option<i64> {
        let slots = (budget_s / self.params.slot_duration_s).floor();
        if slots < 1.0 || bytes_per_band <= 0.0 {
            return None;
        }
        let bytes = (self.jobs[job.0].input_size + PACKET_HEADER_BYTES) as f64;
        Some((bytes / (slots * bytes_per_band)).ceil() as i64)
    }

    /// Utility of serving the job with `service` when its input takes `offload_delay` seconds to transmit.
    pub fn utility(&self, job: JobIdx, service: &ServiceId, offload_delay: f64) -> Option<f64> {
        let view = &self.jobs[job.0];
        match self.params.objective {
            Objective::Energy => {
                if view.period_s <= 0.0 {
                    return None;
                }
                Some((view.local_energy - view.offload_power * offload_delay) / view.period_s)
            }
            Objective::Accuracy => self.profile.accuracy(service).map(|accuracy| accuracy - view.local_accuracy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mec_system_model::profile::ProfileDatabase;
    use crate::domain::mec_system_model::request::sample_request;

    fn params() -> SchemeParams {
        SchemeParams::from(&SchedulerConfig { virtual_link_rate: 1000.0, ..SchedulerConfig::default() })
    }

    fn node(id: &str) -> NodeView {
        NodeView { node_id: NodeId::new(id), device_type: DeviceTypeId::new("rtx"), free_bandwidth: 10, free_compute: 5, compute_capacity: 5 }
    }

    #[test]
    fn nodes_are_indexed_in_id_order_and_unknown_links_dropped() {
        let profile = Arc::new(ProfileDatabase::new().with_execution_time("resnet", "rtx", 0.05));
        let req = sample_request("veh1", 1);
        let snapshot = SchedulingSnapshot::build(
            0,
            params(),
            profile,
            vec![node("b"), node("a")],
            vec![(&req, vec![(NodeId::new("b"), 2000.0), (NodeId::new("zzz"), 1.0)])],
            None,
        );

        assert_eq!(snapshot.node_idx(&NodeId::new("a")), Some(NodeIdx(0)));
        assert_eq!(snapshot.job(JobIdx(0)).links, vec![(NodeIdx(1), 2000.0)]);
        assert_eq!(snapshot.reachable_from(NodeIdx(0)), &[(NodeIdx(0), 0)]);
    }

    #[test]
    fn delay_formulas() {
        let profile = Arc::new(ProfileDatabase::new().with_execution_time("resnet", "rtx", 0.05));
        let req = sample_request("veh1", 1);
        let snapshot = SchedulingSnapshot::build(0, params(), profile, vec![node("a")], vec![(&req, vec![])], None);
        let job = JobIdx(0);

        // (1000 + 33) / (2000 * 1) rounds up to one slot of 1 ms
        assert!((snapshot.offload_delay(job, 2000.0, 1) - 0.001).abs() < 1e-12);
        assert!((snapshot.offload_delay(job, 100.0, 2) - 0.006).abs() < 1e-12);
        assert!((snapshot.exec_delay(&req.service, NodeIdx(0), 5).unwrap() - 0.05).abs() < 1e-12);
        assert!((snapshot.exec_delay(&req.service, NodeIdx(0), 1).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(snapshot.forwarding_delay(job, 0), 0.0);
        assert!((snapshot.forwarding_delay(job, 2) - 2.0).abs() < 1e-12);
        assert_eq!(snapshot.min_compute(&req.service, NodeIdx(0), 0.1), Some(3));
        assert_eq!(snapshot.min_bandwidth(job, 100.0, 0.0105), Some(2));
        assert_eq!(snapshot.min_bandwidth(job, 100.0, 0.0005), None);

        // (2.0 - 0.5 * 0.001) / 0.1
        let utility = snapshot.utility(job, &req.service, 0.001).unwrap();
        assert!((utility - 19.995).abs() < 1e-9);
    }
}
