use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Debug;

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx};
use crate::domain::mec_system_model::scheme::selection::{ResourceLedger, SelectedInstance};
use crate::domain::mec_system_model::scheme::snapshot::SchedulingSnapshot;

pub mod categorized;
pub mod fast_lr;
pub mod game_theory;
pub mod graph_match;
pub mod greedy;
pub mod iterative;
pub mod lp_solver;
pub mod sa_round;

/// Picks a conflict-free subset of the candidates.
///
/// Implementations must select every job at most once and stay within the
/// free resources the snapshot reports for each node.
pub trait SelectionStrategy: Debug + Send {
    fn name(&self) -> &'static str;

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance>;
}

/// Walks `order` and admits each candidate whose job is still unserved and whose resources still fit.
pub(crate) fn admit_in_order(
    snapshot: &SchedulingSnapshot,
    arena: &CandidateArena,
    order: impl IntoIterator<Item = CandidateIdx>,
) -> Vec<SelectedInstance> {
    let mut ledger = ResourceLedger::from_snapshot(snapshot);
    let mut served = HashSet::new();
    let mut selection = Vec::new();

    for idx in order {
        let candidate = &arena[idx];
        if served.contains(&candidate.job) {
            continue;
        }
        if !ledger.try_take(candidate) {
            continue;
        }
        served.insert(candidate.job);
        selection.push(SelectedInstance::from(candidate));
    }
    selection
}

/// Candidate indices sorted by descending score. Ties keep generation order.
pub(crate) fn sorted_by_score(arena: &CandidateArena, score: impl Fn(CandidateIdx) -> f64) -> Vec<CandidateIdx> {
    let mut scored: Vec<(CandidateIdx, f64)> = arena.iter().map(|(idx, _)| (idx, score(idx))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(idx, _)| idx).collect()
}
