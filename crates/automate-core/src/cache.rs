use crate::dirty::DirtyTracker;
use crate::event::TopologyEvent;
use crate::id::{EntityId, NetworkId};
use crate::location::LocationName;
use crate::network::AutomationNetwork;
use std::collections::BTreeMap;

/// Networks per location, rebuilt lazily after topology changes.
///
/// Locations iterate in name order so every pass over the cache is
/// deterministic.
#[derive(Debug, Default)]
pub struct NetworkCache {
    networks: BTreeMap<LocationName, Vec<AutomationNetwork>>,
    dirty: DirtyTracker,
}

impl NetworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a topology change. Takes effect on the next [`sync`](Self::sync).
    pub fn apply(&mut self, event: &TopologyEvent) {
        self.dirty.record(event);
    }

    pub fn invalidate(&mut self, location: LocationName) {
        self.dirty.mark_stale(location);
    }

    /// Drop unloaded locations and forget stale ones. Returns the locations
    /// that now need a rebuild.
    pub fn sync(&mut self) -> Vec<LocationName> {
        let (stale, unloaded) = self.dirty.take();
        for location in &unloaded {
            self.networks.remove(location);
        }
        for location in &stale {
            self.networks.remove(location);
        }
        stale.into_iter().collect()
    }

    pub fn is_built(&self, location: &LocationName) -> bool {
        self.networks.contains_key(location) && !self.dirty.is_stale(location)
    }

    pub fn insert(&mut self, location: LocationName, networks: Vec<AutomationNetwork>) {
        self.networks.insert(location, networks);
    }

    pub fn get(&self, location: &LocationName) -> Option<&[AutomationNetwork]> {
        self.networks.get(location).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocationName, &[AutomationNetwork])> {
        self.networks.iter().map(|(l, n)| (l, n.as_slice()))
    }

    /// The network containing `entity`, searched in `location`.
    pub fn network_of(&self, location: &LocationName, entity: EntityId) -> Option<NetworkId> {
        self.networks
            .get(location)?
            .iter()
            .find(|n| n.contains(entity))
            .map(|n| n.id)
    }

    pub fn location_count(&self) -> usize {
        self.networks.len()
    }

    pub fn network_count(&self) -> usize {
        self.networks.values().map(Vec::len).sum()
    }
}
