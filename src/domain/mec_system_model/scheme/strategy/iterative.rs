use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx};
use crate::domain::mec_system_model::scheme::selection::{ResourceLedger, SelectedInstance};
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::scheme::strategy::{SelectionStrategy, admit_in_order};

const MAX_ITERATIONS: usize = 30;

/// Alternates between fixing the node mapping and fixing the resource amounts.
///
/// Starting from a random mapping, the allocation phase picks the best amounts
/// on each job's mapped node and the mapping phase moves each job to the best
/// node offering its current amounts. The loop ends as soon as a phase fails
/// to improve the total utility, or after 30 rounds.
#[derive(Debug)]
pub struct IterativeStrategy {
    rng: StdRng,
}

impl IterativeStrategy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        IterativeStrategy { rng }
    }
}

struct JobPlan {
    mapping: Option<NodeIdx>,
    bandwidth: i64,
    compute: i64,
}

impl IterativeStrategy {
    /// Greedy over `pool`, one candidate per job, against a fresh copy of the free resources.
    fn greedy_pass(snapshot: &SchedulingSnapshot, arena: &CandidateArena, pool: Vec<CandidateIdx>) -> Vec<Option<CandidateIdx>> {
        let order = {
            let mut order = pool;
            order.sort_by(|a, b| arena[*b].utility.partial_cmp(&arena[*a].utility).unwrap_or(std::cmp::Ordering::Equal));
            order
        };

        let mut chosen = vec![None; arena.num_jobs()];
        let mut ledger = ResourceLedger::from_snapshot(snapshot);
        for idx in order {
            let candidate = &arena[idx];
            if chosen[candidate.job.0].is_some() {
                continue;
            }
            if ledger.try_take(candidate) {
                chosen[candidate.job.0] = Some(idx);
            }
        }
        chosen
    }

    fn total(arena: &CandidateArena, chosen: &[Option<CandidateIdx>]) -> f64 {
        chosen.iter().flatten().map(|idx| arena[*idx].utility).sum()
    }
}

impl SelectionStrategy for IterativeStrategy {
    fn name(&self) -> &'static str {
        "Iterative"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        if arena.is_empty() {
            return Vec::new();
        }

        // candidates per job per node, nodes in index order
        let per_job_node: Vec<BTreeMap<NodeIdx, Vec<CandidateIdx>>> = (0..arena.num_jobs())
            .map(|job| {
                let mut by_node: BTreeMap<NodeIdx, Vec<CandidateIdx>> = BTreeMap::new();
                for idx in arena.for_job(JobIdx(job)) {
                    by_node.entry(arena[*idx].offload_node).or_default().push(*idx);
                }
                by_node
            })
            .collect();

        let mut plans: Vec<JobPlan> = per_job_node
            .iter()
            .map(|by_node| {
                if by_node.is_empty() {
                    return JobPlan { mapping: None, bandwidth: 0, compute: 0 };
                }
                let nodes: Vec<&NodeIdx> = by_node.keys().collect();
                let node = *nodes[self.rng.random_range(0..nodes.len())];
                let on_node = &by_node[&node];
                let pick = &arena[on_node[self.rng.random_range(0..on_node.len())]];
                JobPlan { mapping: Some(node), bandwidth: pick.bandwidth, compute: pick.compute }
            })
            .collect();

        let mut best_total = 0.0;
        let mut best: Vec<CandidateIdx> = Vec::new();
        let mut rounds = 0;

        'rounds: for _ in 0..MAX_ITERATIONS {
            rounds += 1;
            for phase in [Phase::Allocation, Phase::Mapping] {
                let pool: Vec<CandidateIdx> = match phase {
                    Phase::Allocation => plans
                        .iter()
                        .enumerate()
                        .filter_map(|(job, plan)| plan.mapping.and_then(|node| per_job_node[job].get(&node)))
                        .flatten()
                        .copied()
                        .collect(),
                    Phase::Mapping => plans
                        .iter()
                        .enumerate()
                        .flat_map(|(job, plan)| {
                            per_job_node[job]
                                .values()
                                .flatten()
                                .filter(move |idx| arena[**idx].bandwidth == plan.bandwidth && arena[**idx].compute == plan.compute)
                        })
                        .copied()
                        .collect(),
                };

                let chosen = Self::greedy_pass(snapshot, arena, pool);
                for (job, idx) in chosen.iter().enumerate() {
                    if let Some(idx) = idx {
                        let c = &arena[*idx];
                        plans[job] = JobPlan { mapping: Some(c.offload_node), bandwidth: c.bandwidth, compute: c.compute };
                    }
                }

                let total = Self::total(arena, &chosen);
                if total > best_total {
                    best_total = total;
                    best = chosen.into_iter().flatten().collect();
                } else {
                    break 'rounds;
                }
            }
        }
        log::debug!("IterativeStrategy: stopped after {} rounds with utility {:.4}.", rounds, best_total);

        // final pass drops duplicates and anything that no longer fits
        admit_in_order(snapshot, arena, best)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Allocation,
    Mapping,
}
