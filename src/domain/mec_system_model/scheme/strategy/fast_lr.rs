use std::collections::HashMap;

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx};
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::scheme::strategy::{SelectionStrategy, admit_in_order};

/// Local-ratio selection for jobs processed where they are offloaded.
///
/// Candidates claiming at most half of both node resources are visited first,
/// then those claiming more than half of both. Mixed candidates are skipped.
#[derive(Debug, Default)]
pub struct FastLrStrategy;

impl FastLrStrategy {
    pub fn new() -> Self {
        FastLrStrategy
    }
}

impl SelectionStrategy for FastLrStrategy {
    fn name(&self) -> &'static str {
        "FastLR"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        let mut reduction_job = vec![0.0; arena.num_jobs()];
        let mut reduction_node = vec![0.0; arena.num_nodes()];
        let mut reduction_job_in_node: HashMap<(JobIdx, NodeIdx), f64> = HashMap::new();
        let mut stack: Vec<CandidateIdx> = Vec::new();

        for heavy_pass in [false, true] {
            for (idx, c) in arena.iter() {
                let node = snapshot.node(c.offload_node);
                if node.free_bandwidth <= 0 || node.free_compute <= 0 {
                    continue;
                }
                let light = c.bandwidth * 2 <= node.free_bandwidth && c.compute * 2 <= node.free_compute;
                let heavy = c.bandwidth * 2 > node.free_bandwidth && c.compute * 2 > node.free_compute;
                if (heavy_pass && !heavy) || (!heavy_pass && !light) {
                    continue;
                }

                let bandwidth_share = c.bandwidth as f64 / node.free_bandwidth as f64;
                let compute_share = c.compute as f64 / node.free_compute as f64;
                let own = reduction_job_in_node.get(&(c.job, c.offload_node)).copied().unwrap_or(0.0);
                let reduced = c.utility
                    - reduction_job[c.job.0]
                    - (reduction_node[c.offload_node.0] - own) * 2.0 * (bandwidth_share + compute_share);
                if reduced <= 0.0 {
                    continue;
                }

                stack.push(idx);
                reduction_job[c.job.0] += reduced;
                reduction_node[c.offload_node.0] += reduced;
                *reduction_job_in_node.entry((c.job, c.offload_node)).or_insert(0.0) += reduced;
            }
        }

        admit_in_order(snapshot, arena, stack.into_iter().rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mec_system_model::scheme::selection::check_selection;
    use crate::domain::mec_system_model::scheme::strategy::test_support::{arena, jobs_of, snapshot};

    #[test]
    fn two_light_jobs_share_a_node() {
        let snapshot = snapshot(3, &[(10, 4)]);
        let arena = arena(
            &snapshot,
            &[(0, 0, 0, 2, 1, 3.0), (1, 0, 0, 2, 1, 3.0), (2, 0, 0, 10, 4, 4.0)],
        );

        let selection = FastLrStrategy::new().select(&snapshot, &arena);
        assert!(check_selection(&snapshot, &selection).is_ok());
        assert_eq!(jobs_of(&selection), vec![0, 1]);
    }

    #[test]
    fn mixed_candidates_are_ignored() {
        let snapshot = snapshot(1, &[(10, 4)]);
        let arena = arena(&snapshot, &[(0, 0, 0, 10, 1, 3.0)]);
        assert!(FastLrStrategy::new().select(&snapshot, &arena).is_empty());
    }
}
