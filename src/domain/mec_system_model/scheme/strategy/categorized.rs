use std::collections::HashMap;
use std::fmt;

use crate::domain::mec_system_model::scheme::candidate::{CandidateArena, CandidateIdx, CandidateInstance};
use crate::domain::mec_system_model::scheme::selection::{SelectedInstance, total_utility};
use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx, SchedulingSnapshot};
use crate::domain::mec_system_model::scheme::strategy::{SelectionStrategy, admit_in_order};

/// Light (`L`) claims at most half of the node's free resource, heavy (`H`) more.
/// The first letter refers to bandwidth at the offload node, the second to compute at the processing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    LL,
    LH,
    HL,
    HH,
}

impl Category {
    pub fn of(snapshot: &SchedulingSnapshot, candidate: &CandidateInstance) -> Category {
        let bandwidth_light = candidate.bandwidth * 2 <= snapshot.node(candidate.offload_node).free_bandwidth;
        let compute_light = candidate.compute * 2 <= snapshot.node(candidate.process_node).free_compute;
        match (bandwidth_light, compute_light) {
            (true, true) => Category::LL,
            (true, false) => Category::LH,
            (false, true) => Category::HL,
            (false, false) => Category::HH,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Local-ratio selection over groups of candidate categories.
///
/// Each group is solved on its own: its categories are visited in order, every
/// candidate with positive reduced utility is stacked, and the stack is unwound
/// against the free resources. The group with the larger total utility wins,
/// the first group on ties.
#[derive(Debug, Clone)]
pub struct CategorizedLocalRatio {
    name: &'static str,
    groups: Vec<Vec<Category>>,
    /// A group holding only LH or HL reduces by the full heavy-side reduction
    /// instead of scaling it by the candidate's share.
    lone_group_unscaled: bool,
}

#[derive(Default)]
struct Reductions {
    job: HashMap<JobIdx, f64>,
    bandwidth: HashMap<NodeIdx, f64>,
    compute: HashMap<NodeIdx, f64>,
    bandwidth_job_in: HashMap<(JobIdx, NodeIdx), f64>,
    compute_job_in: HashMap<(JobIdx, NodeIdx), f64>,
}

impl Reductions {
    fn get<K: std::hash::Hash + Eq>(map: &HashMap<K, f64>, key: &K) -> f64 {
        map.get(key).copied().unwrap_or(0.0)
    }

    fn add(&mut self, c: &CandidateInstance, amount: f64) {
        *self.job.entry(c.job).or_insert(0.0) += amount;
        *self.bandwidth.entry(c.offload_node).or_insert(0.0) += amount;
        *self.compute.entry(c.process_node).or_insert(0.0) += amount;
        *self.bandwidth_job_in.entry((c.job, c.offload_node)).or_insert(0.0) += amount;
        *self.compute_job_in.entry((c.job, c.process_node)).or_insert(0.0) += amount;
    }
}

impl CategorizedLocalRatio {
    pub fn new(name: &'static str, groups: Vec<Vec<Category>>) -> Self {
        CategorizedLocalRatio { name, groups, lone_group_unscaled: false }
    }

    /// Single group over all categories.
    pub fn fast_sand() -> Self {
        Self::new("FastSAND", vec![vec![Category::LL, Category::LH, Category::HL, Category::HH]])
    }

    /// Compute-heavy, bandwidth-light candidates are solved separately.
    pub fn fast_sanf() -> Self {
        Self::new("FastSANF", vec![vec![Category::LL, Category::HL, Category::HH], vec![Category::LH]])
    }

    /// Same groups as [`CategorizedLocalRatio::fast_sanf`], but the lone LH group
    /// subtracts the unscaled compute reduction.
    pub fn quick_lr() -> Self {
        CategorizedLocalRatio {
            lone_group_unscaled: true,
            ..Self::new("FwdQuickLR", vec![vec![Category::LL, Category::HL, Category::HH], vec![Category::LH]])
        }
    }

    /// Bandwidth-heavy, compute-light candidates are solved separately.
    pub fn fast_sa() -> Self {
        Self::new("FastSA", vec![vec![Category::LL, Category::LH, Category::HH], vec![Category::HL]])
    }

    fn solve_group(&self, snapshot: &SchedulingSnapshot, arena: &CandidateArena, group: &[Category]) -> Vec<SelectedInstance> {
        let categories: Vec<Category> = arena.iter().map(|(_, c)| Category::of(snapshot, c)).collect();
        let mut reductions = Reductions::default();
        let mut stack: Vec<CandidateIdx> = Vec::new();
        let lone_mixed = if self.lone_group_unscaled && group.len() == 1 { Some(group[0]) } else { None };

        for category in group {
            for (idx, c) in arena.iter() {
                if categories[idx.0] != *category {
                    continue;
                }
                let free_bandwidth = snapshot.node(c.offload_node).free_bandwidth;
                let free_compute = snapshot.node(c.process_node).free_compute;
                if free_bandwidth <= 0 || free_compute <= 0 {
                    continue;
                }

                let bandwidth_share = c.bandwidth as f64 / free_bandwidth as f64;
                let compute_share = c.compute as f64 / free_compute as f64;
                let reduction_job = Reductions::get(&reductions.job, &c.job);
                let reduction_offload = Reductions::get(&reductions.bandwidth, &c.offload_node)
                    - Reductions::get(&reductions.bandwidth_job_in, &(c.job, c.offload_node));
                let reduction_process = Reductions::get(&reductions.compute, &c.process_node)
                    - Reductions::get(&reductions.compute_job_in, &(c.job, c.process_node));

                let reduced = match lone_mixed {
                    Some(Category::LH) => {
                        c.utility - reduction_job - 2.0 * reduction_offload * bandwidth_share - reduction_process
                    }
                    Some(Category::HL) => {
                        c.utility - reduction_job - reduction_offload - 2.0 * reduction_process * compute_share
                    }
                    _ => {
                        c.utility
                            - reduction_job
                            - 2.0 * reduction_offload * bandwidth_share
                            - 2.0 * reduction_process * compute_share
                    }
                };
                if reduced <= 0.0 {
                    continue;
                }
                stack.push(idx);
                reductions.add(c, reduced);
            }
        }

        admit_in_order(snapshot, arena, stack.into_iter().rev())
    }
}

impl SelectionStrategy for CategorizedLocalRatio {
    fn name(&self) -> &'static str {
        self.name
    }

    fn select(&mut self, snapshot: &SchedulingSnapshot, arena: &CandidateArena) -> Vec<SelectedInstance> {
        let mut best: Option<(f64, Vec<SelectedInstance>)> = None;
        for group in &self.groups {
            let selection = self.solve_group(snapshot, arena, group);
            let total = total_utility(&selection);
            log::trace!("{}: group {:?} reaches utility {:.4}.", self.name, group, total);
            match &best {
                Some((best_total, _)) if *best_total >= total => {}
                _ => best = Some((total, selection)),
            }
        }
        best.map(|(_, selection)| selection).unwrap_or_default()
    }
}
