use crate::domain::mec_system_model::scheme::candidate::CandidateArena;
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::SchedulingSnapshot;
use crate::domain::mec_system_model::scheme::strategy::{SelectionStrategy, admit_in_order, sorted_by_score};

/// Admits candidates in order of utility per share of the node resources they claim.
#[derive(Debug, Default)]
pub struct GreedyStrategy;

impl GreedyStrategy {
    pub fn new() -> Self {
        GreedyStrategy
    }
}

/// `utility / ((bw / free bw) * (cu / free cu))`, zero when a node has nothing free.
/// The shares are taken against the free resources at the start of the cycle.
pub fn efficiency(utility: f64, offload_bw: (i64, i64), process_cu: (i64, i64)) -> f64 {
    let (bandwidth, free_bandwidth) = offload_bw;
    let (compute, free_compute) = process_cu;
    if free_bandwidth <= 0 || free_compute <= 0 {
        return 0.0;
    }
    let share = (bandwidth as f64 / free_bandwidth as f64) * (compute as f64 / free_compute as f64);
    if share <= 0.0 { 0.0 } else { utility / share }
}

impl SelectionStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        let order = sorted_by_score(arena, |idx| {
            let c = &arena[idx];
            efficiency(
                c.utility,
                (c.bandwidth, snapshot.node(c.offload_node).free_bandwidth),
                (c.compute, snapshot.node(c.process_node).free_compute),
            )
        });
        admit_in_order(snapshot, arena, order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mec_system_model::scheme::selection::check_selection;
    use crate::domain::mec_system_model::scheme::strategy::test_support::{arena, jobs_of, snapshot};

    #[test]
    fn prefers_cheap_candidates_over_raw_utility() {
        let snapshot = snapshot(2, &[(10, 4)]);
        // job 0 is worth more but claims the whole node, job 1 claims a quarter of each resource
        let arena = arena(&snapshot, &[(0, 0, 0, 10, 4, 5.0), (1, 0, 0, 5, 2, 3.0), (1, 0, 0, 10, 4, 3.5)]);

        let selection = GreedyStrategy::new().select(&snapshot, &arena);
        assert_eq!(jobs_of(&selection), vec![1]);
        assert_eq!(selection[0].bandwidth, 5);
        assert!(check_selection(&snapshot, &selection).is_ok());
    }

    #[test]
    fn empty_arena_selects_nothing() {
        let snapshot = snapshot(1, &[(10, 4)]);
        let arena = arena(&snapshot, &[]);
        assert!(GreedyStrategy::new().select(&snapshot, &arena).is_empty());
    }

    #[test]
    fn efficiency_is_zero_without_free_resources() {
        assert_eq!(efficiency(3.0, (1, 0), (1, 4)), 0.0);
        assert!((efficiency(3.0, (5, 10), (2, 4)) - 12.0).abs() < 1e-12);
    }
}
