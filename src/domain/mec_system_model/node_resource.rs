use std::collections::{BTreeSet, HashMap};

use slotmap::{SlotMap, new_key_type};

use crate::domain::mec_system_model::messages::NodeStatusUpdate;
use crate::domain::mec_system_model::utils::id::{DeviceTypeId, JobId, NodeId, ResourceTypeId};

new_key_type! {
    pub struct NodeKey;
}

/// Last known resource figures of one edge node.
///
/// Bandwidth and compute carry independent timestamps. Periodic status
/// updates only apply when strictly newer, feedback for granted jobs also
/// applies at equal timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeResource {
    pub node_id: NodeId,
    pub address: String,
    pub device_type: DeviceTypeId,
    pub resource_type: ResourceTypeId,
    pub free_bandwidth: i64,
    pub bandwidth_capacity: i64,
    pub free_compute: i64,
    pub compute_capacity: i64,
    pub bandwidth_updated_ms: i64,
    pub compute_updated_ms: i64,
}

impl NodeResource {
    pub fn from_update(update: &NodeStatusUpdate) -> Self {
        NodeResource {
            node_id: update.node_id.clone(),
            address: update.node_address.clone(),
            device_type: update.device_type.clone(),
            resource_type: update.resource_type.clone(),
            free_bandwidth: update.free_bandwidth,
            bandwidth_capacity: update.bandwidth_capacity,
            free_compute: update.free_compute,
            compute_capacity: update.compute_capacity,
            bandwidth_updated_ms: update.bandwidth_timestamp_ms,
            compute_updated_ms: update.compute_timestamp_ms,
        }
    }

    /// Applies each resource figure of `update` that is strictly newer than the stored one.
    /// Returns `(bandwidth_applied, compute_applied)`.
    pub fn apply_status(&mut self, update: &NodeStatusUpdate) -> (bool, bool) {
        let bandwidth = update.bandwidth_timestamp_ms > self.bandwidth_updated_ms;
        if bandwidth {
            self.free_bandwidth = update.free_bandwidth;
            self.bandwidth_capacity = update.bandwidth_capacity;
            self.bandwidth_updated_ms = update.bandwidth_timestamp_ms;
        }

        let compute = update.compute_timestamp_ms > self.compute_updated_ms;
        if compute {
            self.free_compute = update.free_compute;
            self.compute_capacity = update.compute_capacity;
            self.compute_updated_ms = update.compute_timestamp_ms;
        }

        if bandwidth || compute {
            self.address = update.node_address.clone();
            self.device_type = update.device_type.clone();
            self.resource_type = update.resource_type.clone();
        }
        (bandwidth, compute)
    }

    pub fn apply_bandwidth_report(&mut self, free_bandwidth: i64, timestamp_ms: i64) -> bool {
        if timestamp_ms < self.bandwidth_updated_ms {
            return false;
        }
        self.free_bandwidth = free_bandwidth;
        self.bandwidth_updated_ms = timestamp_ms;
        true
    }

    pub fn apply_compute_report(&mut self, free_compute: i64, timestamp_ms: i64) -> bool {
        if timestamp_ms < self.compute_updated_ms {
            return false;
        }
        self.free_compute = free_compute;
        self.compute_updated_ms = timestamp_ms;
        true
    }

    /// Zeroes every figure that has not been refreshed within `silence_ms`.
    pub fn zero_silent(&mut self, now_ms: i64, silence_ms: i64) -> (bool, bool) {
        let bandwidth = self.free_bandwidth != 0 && now_ms - self.bandwidth_updated_ms > silence_ms;
        if bandwidth {
            self.free_bandwidth = 0;
        }
        let compute = self.free_compute != 0 && now_ms - self.compute_updated_ms > silence_ms;
        if compute {
            self.free_compute = 0;
        }
        (bandwidth, compute)
    }
}

/// A node together with the coordinator's bookkeeping for it.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub resource: NodeResource,
    /// Bandwidth reserved for jobs still initializing with this node as offload node.
    pub on_hold_bandwidth: i64,
    /// Compute reserved for jobs still initializing with this node as processing node.
    pub on_hold_compute: i64,
    /// Jobs whose initialization this node has to confirm.
    pub init_waits: BTreeSet<JobId>,
}

impl NodeEntry {
    pub fn available_bandwidth(&self) -> i64 {
        (self.resource.free_bandwidth - self.on_hold_bandwidth).max(0)
    }

    pub fn available_compute(&self) -> i64 {
        (self.resource.free_compute - self.on_hold_compute).max(0)
    }

    /// Puts up to `amount` bandwidth on hold, never more than the node reports free.
    /// Returns the amount actually held.
    pub fn hold_bandwidth(&mut self, amount: i64) -> i64 {
        let before = self.on_hold_bandwidth;
        self.on_hold_bandwidth = (before + amount).min(self.resource.free_bandwidth).max(before);
        self.on_hold_bandwidth - before
    }

    pub fn hold_compute(&mut self, amount: i64) -> i64 {
        let before = self.on_hold_compute;
        self.on_hold_compute = (before + amount).min(self.resource.free_compute).max(before);
        self.on_hold_compute - before
    }

    pub fn release_bandwidth(&mut self, amount: i64) {
        self.on_hold_bandwidth = (self.on_hold_bandwidth - amount).max(0);
    }

    pub fn release_compute(&mut self, amount: i64) {
        self.on_hold_compute = (self.on_hold_compute - amount).max(0);
    }
}

/// All known edge nodes, addressed by their [`NodeId`].
#[derive(Debug, Default, Clone)]
pub struct NodeStore {
    nodes: SlotMap<NodeKey, NodeEntry>,
    name_index: HashMap<NodeId, NodeKey>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the node on first sight, otherwise applies the newer parts of the update.
    /// Returns `true` if the node was created.
    pub fn record_status(&mut self, update: &NodeStatusUpdate) -> bool {
        if let Some(key) = self.name_index.get(&update.node_id) {
            if let Some(entry) = self.nodes.get_mut(*key) {
                let (bandwidth, compute) = entry.resource.apply_status(update);
                if !bandwidth && !compute {
                    log::trace!("NodeStore: stale status of {} ignored.", update.node_id);
                }
            }
            return false;
        }

        let entry = NodeEntry {
            resource: NodeResource::from_update(update),
            on_hold_bandwidth: 0,
            on_hold_compute: 0,
            init_waits: BTreeSet::new(),
        };
        let key = self.nodes.insert(entry);
        self.name_index.insert(update.node_id.clone(), key);
        true
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&NodeEntry> {
        self.name_index.get(node_id).and_then(|key| self.nodes.get(*key))
    }

    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeEntry> {
        match self.name_index.get(node_id) {
            Some(key) => self.nodes.get_mut(*key),
            None => None,
        }
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.name_index.contains_key(node_id)
    }

    /// Node ids in ascending order. Snapshots index nodes in this order.
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.name_index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeEntry> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.name_index.clear();
    }
}

#[cfg(test)]
pub(crate) fn sample_status(node: &str, free_bw: i64, free_cu: i64, ts: i64) -> NodeStatusUpdate {
    NodeStatusUpdate {
        node_id: NodeId::new(node),
        node_address: format!("{}.addr", node),
        device_type: DeviceTypeId::new("rtx"),
        resource_type: ResourceTypeId::new("gpu"),
        free_bandwidth: free_bw,
        bandwidth_capacity: free_bw,
        free_compute: free_cu,
        compute_capacity: free_cu,
        bandwidth_timestamp_ms: ts,
        compute_timestamp_ms: ts,
        vehicle_link: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_updates_are_monotonic_per_resource() {
        let mut store = NodeStore::new();
        assert!(store.record_status(&sample_status("rsu1", 10, 5, 1)));

        let mut newer = sample_status("rsu1", 8, 4, 2);
        newer.compute_timestamp_ms = 1;
        assert!(!store.record_status(&newer));

        let entry = store.get(&NodeId::new("rsu1")).unwrap();
        assert_eq!(entry.resource.free_bandwidth, 8);
        assert_eq!(entry.resource.free_compute, 5);

        store.record_status(&sample_status("rsu1", 1, 1, 1));
        let entry = store.get(&NodeId::new("rsu1")).unwrap();
        assert_eq!(entry.resource.free_bandwidth, 8);
    }

    #[test]
    fn feedback_reports_apply_on_equal_timestamps() {
        let mut node = NodeResource::from_update(&sample_status("rsu1", 10, 5, 7));
        assert!(node.apply_bandwidth_report(6, 7));
        assert!(!node.apply_compute_report(1, 6));
        assert_eq!((node.free_bandwidth, node.free_compute), (6, 5));
    }

    #[test]
    fn hold_never_exceeds_reported_free_resources() {
        let mut store = NodeStore::new();
        store.record_status(&sample_status("rsu1", 10, 5, 1));
        let entry = store.get_mut(&NodeId::new("rsu1")).unwrap();

        assert_eq!(entry.hold_bandwidth(6), 6);
        assert_eq!(entry.hold_bandwidth(6), 4);
        assert_eq!(entry.available_bandwidth(), 0);
        entry.release_bandwidth(10);
        assert_eq!(entry.on_hold_bandwidth, 0);
    }

    #[test]
    fn silent_resources_are_zeroed_independently() {
        let mut node = NodeResource::from_update(&sample_status("rsu1", 10, 5, 0));
        node.apply_compute_report(5, 900);
        assert_eq!(node.zero_silent(1000, 500), (true, false));
        assert_eq!((node.free_bandwidth, node.free_compute), (0, 5));
    }
}
