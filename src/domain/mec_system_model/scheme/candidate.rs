use std::ops::Index;

use crate::domain::mec_system_model::scheme::snapshot::{JobIdx, NodeIdx};
use crate::domain::mec_system_model::utils::id::ServiceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateIdx(pub usize);

/// One feasible way of serving a job: where it is offloaded, where it runs and with how much.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateInstance {
    pub job: JobIdx,
    pub offload_node: NodeIdx,
    pub process_node: NodeIdx,
    pub bandwidth: i64,
    pub compute: i64,
    pub utility: f64,
    /// Seconds left for transmission once forwarding, execution and overhead are accounted for.
    pub max_offload_time: f64,
    pub exec_delay: f64,
    pub service: ServiceId,
}

/// Per-cycle storage of all candidates with lookups by job and by node.
#[derive(Debug, Clone, Default)]
pub struct CandidateArena {
    candidates: Vec<CandidateInstance>,
    per_job: Vec<Vec<CandidateIdx>>,
    per_offload_node: Vec<Vec<CandidateIdx>>,
    per_process_node: Vec<Vec<CandidateIdx>>,
}

impl CandidateArena {
    pub fn new(num_jobs: usize, num_nodes: usize) -> Self {
        CandidateArena {
            candidates: Vec::new(),
            per_job: vec![Vec::new(); num_jobs],
            per_offload_node: vec![Vec::new(); num_nodes],
            per_process_node: vec![Vec::new(); num_nodes],
        }
    }

    pub fn push(&mut self, candidate: CandidateInstance) -> CandidateIdx {
        let idx = CandidateIdx(self.candidates.len());
        self.per_job[candidate.job.0].push(idx);
        self.per_offload_node[candidate.offload_node.0].push(idx);
        self.per_process_node[candidate.process_node.0].push(idx);
        self.candidates.push(candidate);
        idx
    }

    pub fn get(&self, idx: CandidateIdx) -> &CandidateInstance {
        &self.candidates[idx.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateIdx, &CandidateInstance)> {
        self.candidates.iter().enumerate().map(|(i, c)| (CandidateIdx(i), c))
    }

    pub fn for_job(&self, job: JobIdx) -> &[CandidateIdx] {
        &self.per_job[job.0]
    }

    pub fn for_offload_node(&self, node: NodeIdx) -> &[CandidateIdx] {
        &self.per_offload_node[node.0]
    }

    pub fn for_process_node(&self, node: NodeIdx) -> &[CandidateIdx] {
        &self.per_process_node[node.0]
    }

    pub fn num_jobs(&self) -> usize {
        self.per_job.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.per_offload_node.len()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Index<CandidateIdx> for CandidateArena {
    type Output = CandidateInstance;

    fn index(&self, idx: CandidateIdx) -> &Self::Output {
        &self.candidates[idx.0]
    }
}
