use std::collections::HashSet;

use crate::domain::mec_system_model::scheme::candidate::CandidateInstance;
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::utils::id::ServiceId;

/// A candidate a strategy decided to admit.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedInstance {
    pub job: JobIdx,
    pub offload_node: NodeIdx,
    pub process_node: NodeIdx,
    pub bandwidth: i64,
    pub compute: i64,
    pub utility: f64,
    pub max_offload_time: f64,
    pub exec_delay: f64,
    pub service: ServiceId,
}

impl From<&CandidateInstance> for SelectedInstance {
    fn from(c: &CandidateInstance) -> Self {
        SelectedInstance {
            job: c.job,
            offload_node: c.offload_node,
            process_node: c.process_node,
            bandwidth: c.bandwidth,
            compute: c.compute,
            utility: c.utility,
            max_offload_time: c.max_offload_time,
            exec_delay: c.exec_delay,
            service: c.service.clone(),
        }
    }
}

/// Residual bandwidth and compute per node while a strategy admits candidates.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    bandwidth: Vec<i64>,
    compute: Vec<i64>,
}

impl ResourceLedger {
    pub fn from_snapshot(snapshot: &SchedulingSnapshot) -> Self {
        ResourceLedger { bandwidth: snapshot.free_bandwidth(), compute: snapshot.free_compute() }
    }

    pub fn fits(&self, offload_node: NodeIdx, bandwidth: i64, process_node: NodeIdx, compute: i64) -> bool {
        self.bandwidth[offload_node.0] >= bandwidth && self.compute[process_node.0] >= compute
    }

    pub fn take(&mut self, offload_node: NodeIdx, bandwidth: i64, process_node: NodeIdx, compute: i64) {
        self.bandwidth[offload_node.0] -= bandwidth;
        self.compute[process_node.0] -= compute;
    }

    /// Takes the resources if they fit. Returns whether they did.
    pub fn try_take(&mut self, c: &CandidateInstance) -> bool {
        if !self.fits(c.offload_node, c.bandwidth, c.process_node, c.compute) {
            return false;
        }
        self.take(c.offload_node, c.bandwidth, c.process_node, c.compute);
        true
    }

    pub fn bandwidth(&self, node: NodeIdx) -> i64 {
        self.bandwidth[node.0]
    }

    pub fn compute(&self, node: NodeIdx) -> i64 {
        self.compute[node.0]
    }
}

/// Checks that every job appears at most once and no node is overcommitted.
pub fn check_selection(snapshot: &SchedulingSnapshot, selection: &[SelectedInstance]) -> Result<(), String> {
    let mut seen = HashSet::new();
    let mut ledger = ResourceLedger::from_snapshot(snapshot);
    for inst in selection {
        if !seen.insert(inst.job) {
            return Err(format!("job index {} selected twice", inst.job.0));
        }
        if !ledger.fits(inst.offload_node, inst.bandwidth, inst.process_node, inst.compute) {
            return Err(format!(
                "job index {} overcommits node {} or {}",
                inst.job.0, inst.offload_node.0, inst.process_node.0
            ));
        }
        ledger.take(inst.offload_node, inst.bandwidth, inst.process_node, inst.compute);
    }
    Ok(())
}

pub fn total_utility(selection: &[SelectedInstance]) -> f64 {
    selection.iter().map(|inst| inst.utility).sum()
}
