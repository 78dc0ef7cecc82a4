use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx};
use crate::domain::mec_system_model::scheme::selection::{ResourceLedger, SelectedInstance};
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::scheme::strategy::greedy::GreedyStrategy;
use crate::domain::mec_system_model::scheme::strategy::lp_solver::PackingLp;
use crate::domain::mec_system_model::scheme::strategy::SelectionStrategy;
use crate::domain::mec_system_model::utils::id::ServiceId;
use crate::error::Result;

const EPSILON: f64 = 1e-9;

/// Which resource a bipartite graph models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Offload,
    Process,
}

/// Jobs on one side, node slots `(node, rank)` on the other. A node gets one
/// slot per unit of fractional load the LP put on it.
#[derive(Debug, Default)]
struct BipartiteGraph {
    slots: Vec<(NodeIdx, usize)>,
    /// `(job, slot, demand)`
    edges: Vec<(JobIdx, usize, i64)>,
    edges_of: HashMap<CandidateIdx, Vec<usize>>,
}

#[derive(Debug, Clone)]
struct HyperEdge {
    job: JobIdx,
    offload_slot: usize,
    process_slot: usize,
    offload_node: NodeIdx,
    process_node: NodeIdx,
    bandwidth: i64,
    compute: i64,
    weight: f64,
    service: ServiceId,
}

/// Rounds the instance-packing LP through a tripartite matching between jobs,
/// offload slots and processing slots.
///
/// When either LP fails or comes back empty the selection falls back to
/// [`GreedyStrategy`].
#[derive(Debug, Default)]
pub struct GraphMatchStrategy {
    fallback: GreedyStrategy,
}

fn ceil_tolerant(value: f64) -> f64 {
    (value - EPSILON).ceil().max(0.0)
}

impl GraphMatchStrategy {
    pub fn new() -> Self {
        GraphMatchStrategy { fallback: GreedyStrategy::new() }
    }

    /// Fractional packing: every job at most once, each node limited to the share
    /// of its free resources not reserved by the fairness factor.
    fn solve_packing(snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Result<BTreeMap<CandidateIdx, f64>> {
        let fair = snapshot.params.fair_factor;
        let mut lp = PackingLp::new();
        for (_, c) in arena.iter() {
            lp.add_variable(c.utility, 1.0);
        }

        for (node_idx, view) in snapshot.nodes().iter().enumerate() {
            let node = NodeIdx(node_idx);
            let bandwidth_limit = (view.free_bandwidth as f64 * (1.0 - fair)).ceil();
            let terms = arena.for_offload_node(node).iter().map(|idx| (idx.0, arena[*idx].bandwidth as f64)).collect();
            lp.add_le_constraint(terms, bandwidth_limit);

            let compute_limit = (view.free_compute as f64 * (1.0 - fair)).ceil();
            let terms = arena.for_process_node(node).iter().map(|idx| (idx.0, arena[*idx].compute as f64)).collect();
            lp.add_le_constraint(terms, compute_limit);
        }
        for job in 0..arena.num_jobs() {
            let terms = arena.for_job(JobIdx(job)).iter().map(|idx| (idx.0, 1.0)).collect();
            lp.add_le_constraint(terms, 1.0);
        }

        let values = lp.solve_within(snapshot.params.lp_time_limit)?;
        Ok(values.into_iter().enumerate().filter(|(_, x)| *x > EPSILON).map(|(i, x)| (CandidateIdx(i), x)).collect())
    }

    fn build_bipartite(arena: &CandidateArena, fractional: &BTreeMap<CandidateIdx, f64>, side: Side) -> BipartiteGraph {
        let node_of = |idx: CandidateIdx| match side {
            Side::Offload => arena[idx].offload_node,
            Side::Process => arena[idx].process_node,
        };
        let demand_of = |idx: CandidateIdx| match side {
            Side::Offload => arena[idx].bandwidth,
            Side::Process => arena[idx].compute,
        };

        let mut per_node: BTreeMap<NodeIdx, Vec<CandidateIdx>> = BTreeMap::new();
        for idx in fractional.keys() {
            per_node.entry(node_of(*idx)).or_default().push(*idx);
        }

        let mut graph = BipartiteGraph::default();
        let mut edge_index: HashMap<(JobIdx, usize), usize> = HashMap::new();
        for (node, mut candidates) in per_node {
            let load: f64 = candidates.iter().map(|idx| fractional[idx]).sum();
            let ranks = ceil_tolerant(load) as usize;
            if ranks == 0 {
                continue;
            }
            let first_slot = graph.slots.len();
            graph.slots.extend((0..ranks).map(|rank| (node, rank)));

            candidates.sort_by(|a, b| demand_of(*b).cmp(&demand_of(*a)));
            let mut cumulative = 0.0;
            for idx in candidates {
                let before = cumulative;
                cumulative += fractional[&idx];
                let before_ceil = ceil_tolerant(before);

                // ranks the candidate's fraction spans
                let mut spanned = Vec::with_capacity(2);
                if before + EPSILON < before_ceil {
                    spanned.push(before_ceil as usize - 1);
                    if cumulative > before_ceil + EPSILON {
                        spanned.push(before_ceil as usize);
                    }
                } else {
                    spanned.push(before_ceil as usize);
                }

                let job = arena[idx].job;
                let edges = graph.edges_of.entry(idx).or_default();
                for rank in spanned {
                    let slot = first_slot + rank.min(ranks - 1);
                    let edge = *edge_index.entry((job, slot)).or_insert_with(|| {
                        graph.edges.push((job, slot, demand_of(idx)));
                        graph.edges.len() - 1
                    });
                    if !edges.contains(&edge) {
                        edges.push(edge);
                    }
                }
            }
        }
        graph
    }

    fn merge(
        snapshot: &SchedulingSnapshot,
        arena: &CandidateArena,
        fractional: &BTreeMap<CandidateIdx, f64>,
        offload: &BipartiteGraph,
        process: &BipartiteGraph,
    ) -> Vec<HyperEdge> {
        let mut by_utility: Vec<CandidateIdx> = fractional.keys().copied().collect();
        by_utility.sort_by(|a, b| arena[*b].utility.partial_cmp(&arena[*a].utility).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen: HashSet<(JobIdx, usize, usize)> = HashSet::new();
        let mut hyper_edges = Vec::new();
        for idx in by_utility {
            let candidate = &arena[idx];
            let (Some(offload_edges), Some(process_edges)) = (offload.edges_of.get(&idx), process.edges_of.get(&idx)) else {
                continue;
            };
            for &off_edge in offload_edges {
                let (job, offload_slot, bandwidth) = offload.edges[off_edge];
                for &proc_edge in process_edges {
                    let (_, process_slot, compute) = process.edges[proc_edge];
                    if !seen.insert((job, offload_slot, process_slot)) {
                        continue;
                    }

                    let offload_node = offload.slots[offload_slot].0;
                    let process_node = process.slots[process_slot].0;
                    let Some(rate) = snapshot.link_rate(job, offload_node) else {
                        continue;
                    };
                    let offload_delay = snapshot.offload_delay(job, rate, bandwidth);
                    let Some(weight) = snapshot.utility(job, &candidate.service, offload_delay) else {
                        continue;
                    };
                    hyper_edges.push(HyperEdge {
                        job,
                        offload_slot,
                        process_slot,
                        offload_node,
                        process_node,
                        bandwidth,
                        compute,
                        weight,
                        service: candidate.service.clone(),
                    });
                }
            }
        }
        hyper_edges
    }

    /// Fractional matching where every job and every slot is covered at most once.
    fn solve_matching(snapshot: &SchedulingSnapshot, edges: &[HyperEdge]) -> Result<BTreeMap<usize, f64>> {
        let mut lp = PackingLp::new();
        let mut by_job: BTreeMap<JobIdx, Vec<(usize, f64)>> = BTreeMap::new();
        let mut by_offload: BTreeMap<usize, Vec<(usize, f64)>> = BTreeMap::new();
        let mut by_process: BTreeMap<usize, Vec<(usize, f64)>> = BTreeMap::new();
        for edge in edges {
            let col = lp.add_variable(edge.weight, 1.0);
            by_job.entry(edge.job).or_default().push((col, 1.0));
            by_offload.entry(edge.offload_slot).or_default().push((col, 1.0));
            by_process.entry(edge.process_slot).or_default().push((col, 1.0));
        }
        for terms in by_job.into_values().chain(by_offload.into_values()).chain(by_process.into_values()) {
            lp.add_le_constraint(terms, 1.0);
        }

        let values = lp.solve_within(snapshot.params.lp_time_limit)?;
        Ok(values.into_iter().enumerate().filter(|(_, x)| *x > EPSILON).collect())
    }

    /// Orders edges by smallest neighbourhood load, charges weights forward and
    /// picks a matching backwards. Returns edge indices.
    fn local_ratio(edges: &[HyperEdge], fractional: &BTreeMap<usize, f64>) -> Vec<usize> {
        let mut by_job: HashMap<JobIdx, Vec<usize>> = HashMap::new();
        let mut by_offload: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut by_process: HashMap<usize, Vec<usize>> = HashMap::new();
        for &e in fractional.keys() {
            by_job.entry(edges[e].job).or_default().push(e);
            by_offload.entry(edges[e].offload_slot).or_default().push(e);
            by_process.entry(edges[e].process_slot).or_default().push(e);
        }

        let mut neighbours: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut load: BTreeMap<usize, f64> = BTreeMap::new();
        for &e in fractional.keys() {
            let edge = &edges[e];
            let set: BTreeSet<usize> = by_job[&edge.job]
                .iter()
                .chain(&by_offload[&edge.offload_slot])
                .chain(&by_process[&edge.process_slot])
                .copied()
                .collect();
            load.insert(e, set.iter().map(|n| fractional[n]).sum());
            neighbours.insert(e, set);
        }

        let mut remaining: BTreeSet<usize> = fractional.keys().copied().collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let mut pick: Option<(usize, f64)> = None;
            for &e in &remaining {
                let l = load[&e];
                if pick.is_none_or(|(_, best)| l < best) {
                    pick = Some((e, l));
                }
            }
            let Some((selected, _)) = pick else {
                break;
            };
            remaining.remove(&selected);
            order.push(selected);
            for n in &neighbours[&selected] {
                if let Some(l) = load.get_mut(n) {
                    *l -= fractional[&selected];
                }
            }
        }

        let mut weight: BTreeMap<usize, f64> = fractional.keys().map(|e| (*e, edges[*e].weight)).collect();
        let mut stack = Vec::new();
        for e in order {
            let w = weight[&e];
            if w <= 0.0 {
                continue;
            }
            stack.push(e);
            for n in &neighbours[&e] {
                if let Some(nw) = weight.get_mut(n) {
                    *nw -= w;
                }
            }
        }

        let mut used_jobs = HashSet::new();
        let mut used_offload = HashSet::new();
        let mut used_process = HashSet::new();
        let mut matching = Vec::new();
        for e in stack.into_iter().rev() {
            let edge = &edges[e];
            if used_jobs.contains(&edge.job) || used_offload.contains(&edge.offload_slot) || used_process.contains(&edge.process_slot) {
                continue;
            }
            used_jobs.insert(edge.job);
            used_offload.insert(edge.offload_slot);
            used_process.insert(edge.process_slot);
            matching.push(e);
        }
        matching
    }

    fn admit(snapshot: &SchedulingSnapshot, edges: &[HyperEdge], matching: Vec<usize>) -> Vec<SelectedInstance> {
        let mut ledger = ResourceLedger::from_snapshot(snapshot);
        let mut served = HashSet::new();
        let mut selection = Vec::new();
        for e in matching {
            let edge = &edges[e];
            if served.contains(&edge.job) {
                continue;
            }
            if !ledger.fits(edge.offload_node, edge.bandwidth, edge.process_node, edge.compute) {
                continue;
            }
            let Some(exec_delay) = snapshot.exec_delay(&edge.service, edge.process_node, edge.compute) else {
                continue;
            };
            let Some(hops) = snapshot.hop_count(edge.offload_node, edge.process_node) else {
                continue;
            };
            let job = snapshot.job(edge.job);
            let max_offload_time =
                job.period_s - exec_delay - snapshot.forwarding_delay(edge.job, hops) - snapshot.params.offload_overhead_s;
            if max_offload_time <= 0.0 || edge.weight <= 0.0 {
                continue;
            }

            ledger.take(edge.offload_node, edge.bandwidth, edge.process_node, edge.compute);
            served.insert(edge.job);
            selection.push(SelectedInstance {
                job: edge.job,
                offload_node: edge.offload_node,
                process_node: edge.process_node,
                bandwidth: edge.bandwidth,
                compute: edge.compute,
                utility: edge.weight,
                max_offload_time,
                exec_delay,
                service: edge.service.clone(),
            });
        }
        selection
    }
}

impl SelectionStrategy for GraphMatchStrategy {
    fn name(&self) -> &'static str {
        "GraphMatch"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        if arena.is_empty() {
            return Vec::new();
        }

        let fractional = match Self::solve_packing(snapshot, arena) {
            Ok(fractional) if !fractional.is_empty() => fractional,
            Ok(_) => {
                log::debug!("GraphMatchStrategy: packing LP is empty, falling back to greedy.");
                return self.fallback.select(snapshot, arena);
            }
            Err(e) => {
                log::warn!("GraphMatchStrategy: packing LP failed ({}), falling back to greedy.", e);
                return self.fallback.select(snapshot, arena);
            }
        };

        let offload = Self::build_bipartite(arena, &fractional, Side::Offload);
        let process = Self::build_bipartite(arena, &fractional, Side::Process);
        let edges = Self::merge(snapshot, arena, &fractional, &offload, &process);

        let matching_fraction = match Self::solve_matching(snapshot, &edges) {
            Ok(matching_fraction) if !matching_fraction.is_empty() => matching_fraction,
            Ok(_) => {
                log::debug!("GraphMatchStrategy: matching LP is empty, falling back to greedy.");
                return self.fallback.select(snapshot, arena);
            }
            Err(e) => {
                log::warn!("GraphMatchStrategy: matching LP failed ({}), falling back to greedy.", e);
                return self.fallback.select(snapshot, arena);
            }
        };

        let matching = Self::local_ratio(&edges, &matching_fraction);
        log::debug!(
            "GraphMatchStrategy: {} fractional candidates, {} hyperedges, {} matched.",
            fractional.len(),
            edges.len(),
            matching.len()
        );
        Self::admit(snapshot, &edges, matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mec_system_model::scheme::selection::check_selection;
    use crate::domain::mec_system_model::scheme::strategy::test_support::{arena, jobs_of, snapshot};

    fn snapshot_with_fair(jobs: usize, nodes: &[(i64, i64)], fair: f64) -> SchedulingSnapshot {
        let mut snapshot = snapshot(jobs, nodes);
        snapshot.params.fair_factor = fair;
        snapshot
    }

    #[test]
    fn ranks_follow_cumulative_fractions() {
        let snapshot = snapshot_with_fair(3, &[(10, 4)], 0.0);
        let arena = arena(&snapshot, &[(0, 0, 0, 6, 1, 1.0), (1, 0, 0, 4, 1, 1.0), (2, 0, 0, 2, 1, 1.0)]);
        let fractional: BTreeMap<CandidateIdx, f64> =
            [(CandidateIdx(0), 0.5), (CandidateIdx(1), 0.75), (CandidateIdx(2), 0.5)].into_iter().collect();

        let graph = GraphMatchStrategy::build_bipartite(&arena, &fractional, Side::Offload);
        // load 1.75 gives two slots; job 1 spans both of them
        assert_eq!(graph.slots.len(), 2);
        assert_eq!(graph.edges_of[&CandidateIdx(0)].len(), 1);
        assert_eq!(graph.edges_of[&CandidateIdx(1)].len(), 2);
        assert_eq!(graph.edges_of[&CandidateIdx(2)].len(), 1);
        assert_eq!(graph.edges[graph.edges_of[&CandidateIdx(2)][0]].1, 1);
    }

    #[test]
    fn local_ratio_returns_a_matching() {
        let edge = |job, off, proc, weight| HyperEdge {
            job: JobIdx(job),
            offload_slot: off,
            process_slot: proc,
            offload_node: NodeIdx(0),
            process_node: NodeIdx(0),
            bandwidth: 1,
            compute: 1,
            weight,
            service: ServiceId::new("resnet"),
        };
        let edges = vec![edge(0, 0, 0, 3.0), edge(1, 0, 1, 2.0), edge(1, 1, 1, 2.5)];
        let fractional: BTreeMap<usize, f64> = [(0, 1.0), (1, 0.5), (2, 0.5)].into_iter().collect();

        let mut matching = GraphMatchStrategy::local_ratio(&edges, &fractional);
        matching.sort();
        assert_eq!(matching, vec![0, 2]);
    }

    #[test]
    fn picks_the_better_job_on_a_contended_node() {
        let snapshot = snapshot_with_fair(3, &[(10, 4), (10, 4)], 0.0);
        let arena = arena(&snapshot, &[(0, 0, 0, 5, 4, 3.0), (1, 1, 1, 5, 4, 2.0), (2, 1, 1, 5, 4, 4.0)]);

        let selection = GraphMatchStrategy::new().select(&snapshot, &arena);
        assert_eq!(jobs_of(&selection), vec![0, 2]);
        assert!(check_selection(&snapshot, &selection).is_ok());
    }

    #[test]
    fn zero_lp_capacity_falls_back_to_greedy() {
        // a fairness factor of 1 leaves no room in the packing LP
        let snapshot = snapshot_with_fair(1, &[(10, 4)], 1.0);
        let arena = arena(&snapshot, &[(0, 0, 0, 5, 2, 3.0)]);

        let selection = GraphMatchStrategy::new().select(&snapshot, &arena);
        assert_eq!(jobs_of(&selection), vec![0]);
    }
}
