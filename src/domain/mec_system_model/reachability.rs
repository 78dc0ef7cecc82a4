use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::mec_system_model::utils::id::NodeId;
use crate::error::ConversionError;

/// Hop counts between edge nodes over the backhaul network, bounded by `max_hops`.
///
/// Every node of the topology reaches itself with 0 hops. Nodes outside the
/// topology are not listed; callers treat them as reaching only themselves.
#[derive(Debug, Clone, Default)]
pub struct ReachabilityGraph {
    max_hops: u32,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    reachable: BTreeMap<NodeId, BTreeMap<NodeId, u32>>,
}

impl ReachabilityGraph {
    /// A graph without any backhaul links.
    pub fn direct_only() -> Self {
        Self::default()
    }

    pub fn new(adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>, max_hops: u32) -> Self {
        let mut graph = ReachabilityGraph { max_hops, adjacency: BTreeMap::new(), reachable: BTreeMap::new() };
        graph.set_topology(adjacency);
        graph
    }

    /// Builds the graph from a square 0/1 adjacency matrix whose rows follow `nodes`.
    pub fn from_matrix(nodes: &[NodeId], matrix: &[Vec<u8>], max_hops: u32) -> Result<Self, ConversionError> {
        if matrix.len() != nodes.len() {
            return Err(ConversionError::InvalidTopology(format!(
                "adjacency matrix has {} rows but {} nodes are listed",
                matrix.len(),
                nodes.len()
            )));
        }

        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for (row_idx, row) in matrix.iter().enumerate() {
            if row.len() != nodes.len() {
                return Err(ConversionError::InvalidTopology(format!(
                    "row {} of the adjacency matrix has {} columns, expected {}",
                    row_idx,
                    row.len(),
                    nodes.len()
                )));
            }
            let neighbours = adjacency.entry(nodes[row_idx].clone()).or_default();
            for (col_idx, cell) in row.iter().enumerate() {
                match cell {
                    0 => {}
                    1 if col_idx != row_idx => {
                        neighbours.insert(nodes[col_idx].clone());
                    }
                    1 => {}
                    other => {
                        return Err(ConversionError::InvalidTopology(format!(
                            "adjacency entry ({}, {}) must be 0 or 1, got {}",
                            row_idx, col_idx, other
                        )));
                    }
                }
            }
        }

        Ok(Self::new(adjacency, max_hops))
    }

    /// Replaces the topology and recomputes all hop counts.
    pub fn set_topology(&mut self, adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>) {
        self.adjacency = adjacency;
        self.reachable = self.adjacency.keys().map(|source| (source.clone(), self.bfs(source))).collect();
        log::debug!("ReachabilityGraph: recomputed reachability for {} nodes (max hops {}).", self.reachable.len(), self.max_hops);
    }

    fn bfs(&self, source: &NodeId) -> BTreeMap<NodeId, u32> {
        let mut hops = BTreeMap::new();
        let mut queue = VecDeque::new();
        hops.insert(source.clone(), 0);
        queue.push_back((source.clone(), 0u32));

        while let Some((node, hop_count)) = queue.pop_front() {
            if hop_count >= self.max_hops {
                continue;
            }
            let Some(neighbours) = self.adjacency.get(&node) else {
                continue;
            };
            for next in neighbours {
                if !hops.contains_key(next) {
                    hops.insert(next.clone(), hop_count + 1);
                    queue.push_back((next.clone(), hop_count + 1));
                }
            }
        }
        hops
    }

    pub fn reachable(&self, node: &NodeId) -> Option<&BTreeMap<NodeId, u32>> {
        self.reachable.get(node)
    }

    pub fn hop_count(&self, from: &NodeId, to: &NodeId) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        self.reachable.get(from).and_then(|hops| hops.get(to).copied())
    }

    pub fn adjacency(&self) -> &BTreeMap<NodeId, BTreeSet<NodeId>> {
        &self.adjacency
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, max_hops: u32) -> ReachabilityGraph {
        let nodes: Vec<NodeId> = (0..n).map(|i| NodeId::new(format!("n{}", i))).collect();
        let matrix: Vec<Vec<u8>> =
            (0..n).map(|r| (0..n).map(|c| if r.abs_diff(c) == 1 { 1 } else { 0 }).collect()).collect();
        ReachabilityGraph::from_matrix(&nodes, &matrix, max_hops).unwrap()
    }

    #[test]
    fn bfs_respects_hop_bound() {
        let graph = line(4, 2);
        let from_first = graph.reachable(&NodeId::new("n0")).unwrap();
        assert_eq!(from_first.get(&NodeId::new("n0")), Some(&0));
        assert_eq!(from_first.get(&NodeId::new("n1")), Some(&1));
        assert_eq!(from_first.get(&NodeId::new("n2")), Some(&2));
        assert_eq!(from_first.get(&NodeId::new("n3")), None);
    }

    #[test]
    fn zero_hops_reaches_only_itself() {
        let graph = line(3, 0);
        assert_eq!(graph.reachable(&NodeId::new("n1")).unwrap().len(), 1);
        assert_eq!(graph.hop_count(&NodeId::new("x"), &NodeId::new("x")), Some(0));
    }

    #[test]
    fn malformed_matrix_is_rejected() {
        let nodes = vec![NodeId::new("a"), NodeId::new("b")];
        let err = ReachabilityGraph::from_matrix(&nodes, &[vec![0, 1]], 1).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidTopology(_)));
        assert!(ReachabilityGraph::from_matrix(&nodes, &[vec![0, 2], vec![1, 0]], 1).is_err());
    }
}
