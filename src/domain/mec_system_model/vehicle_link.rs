use std::collections::{BTreeMap, BTreeSet};

use crate::domain::mec_system_model::messages::VehicleLinkObservation;
use crate::domain::mec_system_model::utils::id::{NodeId, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleLink {
    pub bytes_per_band: f64,
    pub timestamp_ms: i64,
}

/// Last known link rate per (vehicle, node).
#[derive(Debug, Default, Clone)]
pub struct VehicleLinkTable {
    links: BTreeMap<VehicleId, BTreeMap<NodeId, VehicleLink>>,
}

impl VehicleLinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the observation unless a newer one is already known. Returns whether it was applied.
    pub fn observe(&mut self, node_id: &NodeId, observation: &VehicleLinkObservation) -> bool {
        let per_node = self.links.entry(observation.vehicle_id.clone()).or_default();
        match per_node.get(node_id) {
            Some(existing) if existing.timestamp_ms >= observation.timestamp_ms => false,
            _ => {
                per_node.insert(
                    node_id.clone(),
                    VehicleLink { bytes_per_band: observation.bytes_per_band, timestamp_ms: observation.timestamp_ms },
                );
                true
            }
        }
    }

    pub fn get(&self, vehicle_id: &VehicleId, node_id: &NodeId) -> Option<&VehicleLink> {
        self.links.get(vehicle_id).and_then(|nodes| nodes.get(node_id))
    }

    /// Nodes the vehicle currently has a link to, in node id order.
    pub fn links_of(&self, vehicle_id: &VehicleId) -> impl Iterator<Item = (&NodeId, &VehicleLink)> {
        self.links.get(vehicle_id).into_iter().flat_map(|nodes| nodes.iter())
    }

    pub fn vehicles(&self) -> BTreeSet<VehicleId> {
        self.links.keys().cloned().collect()
    }

    /// Drops links not refreshed within `outdate_ms` and links with a non-positive rate.
    /// Returns the number of removed links.
    pub fn prune(&mut self, now_ms: i64, outdate_ms: i64) -> usize {
        let mut removed = 0;
        for nodes in self.links.values_mut() {
            let before = nodes.len();
            nodes.retain(|_, link| now_ms - link.timestamp_ms <= outdate_ms && link.bytes_per_band > 0.0);
            removed += before - nodes.len();
        }
        self.links.retain(|_, nodes| !nodes.is_empty());
        removed
    }

    pub fn remove_vehicle(&mut self, vehicle_id: &VehicleId) {
        self.links.remove(vehicle_id);
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    pub fn len(&self) -> usize {
        self.links.values().map(|nodes| nodes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
