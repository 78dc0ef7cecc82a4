use crate::domain::mec_system_model::scheme::candidate::CandidateArena;
use crate::domain::mec_system_model::scheme::selection::SelectedInstance;
use crate::domain::mec_system_model::scheme::snapshot::SchedulingSnapshot;
use crate::domain::mec_system_model::scheme::strategy::{SelectionStrategy, admit_in_order, sorted_by_score};

/// Every job greedily grabs its best instance; the highest utilities move first.
#[derive(Debug, Default)]
pub struct GameTheoryStrategy;

impl GameTheoryStrategy {
    pub fn new() -> Self {
        GameTheoryStrategy
    }
}

impl SelectionStrategy for GameTheoryStrategy {
    fn name(&self) -> &'static str {
        "GameTheory"
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        let order = sorted_by_score(arena, |idx| arena[idx].utility);
        admit_in_order(snapshot, arena, order)
    }
}
