use std::collections::{HashMap, HashSet};

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx};
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::scheme::strategy::SelectionStrategy;
use crate::domain::mec_system_model::scheme::strategy::lp_solver::PackingLp;

/// Variables above this value count as integral.
const INTEGRAL_THRESHOLD: f64 = 0.9999;

/// Node-by-node LP relaxation with floor rounding.
///
/// Each node solves a packing LP over its candidates with utilities reduced by
/// what earlier nodes already promised the job. Integral variables are kept.
/// Nodes are then reconciled from last to first so that later, more valuable
/// promises win.
#[derive(Debug, Default)]
pub struct SaRoundStrategy;

impl SaRoundStrategy {
    pub fn new() -> Self {
        SaRoundStrategy
    }

    fn round_node(
        snapshot: &SchedulingSnapshot,
        arena: &CandidateArena,
        node: NodeIdx,
        reduction: &HashMap<JobIdx, f64>,
    ) -> Vec<(CandidateIdx, f64)> {
        let mut positive: Vec<(CandidateIdx, f64)> = Vec::new();
        let mut best: Option<(CandidateIdx, f64)> = None;
        for idx in arena.for_offload_node(node) {
            let c = &arena[*idx];
            let reduced = c.utility - reduction.get(&c.job).copied().unwrap_or(0.0);
            if reduced <= 0.0 {
                continue;
            }
            if best.is_none_or(|(_, util)| reduced > util) {
                best = Some((*idx, reduced));
            }
            positive.push((*idx, reduced));
        }

        let Some(best) = best else {
            return Vec::new();
        };
        if positive.len() == 1 {
            return positive;
        }

        let view = snapshot.node(node);
        let mut lp = PackingLp::new();
        let mut per_job: HashMap<JobIdx, Vec<(usize, f64)>> = HashMap::new();
        let mut bandwidth_terms = Vec::with_capacity(positive.len());
        let mut compute_terms = Vec::with_capacity(positive.len());
        for (idx, reduced) in &positive {
            let c = &arena[*idx];
            let col = lp.add_variable(*reduced, 1.0);
            bandwidth_terms.push((col, c.bandwidth as f64));
            compute_terms.push((col, c.compute as f64));
            per_job.entry(c.job).or_default().push((col, 1.0));
        }
        lp.add_le_constraint(bandwidth_terms, view.free_bandwidth as f64);
        lp.add_le_constraint(compute_terms, view.free_compute as f64);
        let mut jobs: Vec<_> = per_job.into_iter().collect();
        jobs.sort_by_key(|(job, _)| *job);
        for (_, terms) in jobs {
            lp.add_le_constraint(terms, 1.0);
        }

        let values = match lp.solve_within(snapshot.params.lp_time_limit) {
            Ok(values) if !values.is_empty() => values,
            Ok(_) => return vec![best],
            Err(e) => {
                log::warn!("SaRoundStrategy: LP for node {} failed ({}), keeping the best single candidate.", view.node_id, e);
                return vec![best];
            }
        };

        let integral: Vec<(CandidateIdx, f64)> =
            positive.iter().zip(values).filter(|(_, x)| *x > INTEGRAL_THRESHOLD).map(|(p, _)| *p).collect();
        let integral_utility: f64 = integral.iter().map(|(_, u)| u).sum();
        if integral_utility > best.1 { integral } else { vec![best] }
    }
}

impl SelectionStrategy for SaRoundStrategy {
    fn name(&self) -> &'static str {
        "SARound"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        let mut reduction: HashMap<JobIdx, f64> = HashMap::new();
        let mut kept_per_node: Vec<Vec<CandidateIdx>> = vec![Vec::new(); snapshot.nodes().len()];

        for (node_idx, view) in snapshot.nodes().iter().enumerate() {
            let node = NodeIdx(node_idx);
            if view.free_bandwidth <= 0 || view.free_compute <= 0 || arena.for_offload_node(node).is_empty() {
                continue;
            }
            let kept = Self::round_node(snapshot, arena, node, &reduction);
            let mut charged = HashSet::new();
            for (idx, reduced) in &kept {
                let job = arena[*idx].job;
                if charged.insert(job) {
                    *reduction.entry(job).or_insert(0.0) += reduced;
                }
            }
            kept_per_node[node_idx] = kept.into_iter().map(|(idx, _)| idx).collect();
        }

        let mut served = HashSet::new();
        let mut selection = Vec::new();
        for kept in kept_per_node.iter().rev() {
            for idx in kept {
                let c = &arena[*idx];
                if served.insert(c.job) {
                    selection.push(SelectedInstance::from(c));
                }
            }
        }
        selection
    }
}
