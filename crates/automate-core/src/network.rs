//! Grouping of machines and containers into automation networks.
//!
//! A network is a connected component of automatable entities within one
//! location. Two entities are connected when their footprints share an edge,
//! or when either one carries a link radius covering the other. Connectors
//! (paths, flooring) join components but are neither machines nor storage.

use crate::id::{EntityId, NetworkId};
use crate::location::LocationName;
use crate::tile::{TileArea, TileIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// Role an entity plays in a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Machine,
    Container,
    Connector,
}

/// What the builder needs to know about each indexed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub kind: EntityKind,
    /// Extra reach in tiles (Chebyshev). Zero links by shared edges only.
    pub link_radius: u32,
}

impl LinkInfo {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            link_radius: 0,
        }
    }
}

/// A connected group of machines and containers in one location.
///
/// Member lists are ordered by ascending footprint origin (row-major), which
/// is also the processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationNetwork {
    pub id: NetworkId,
    pub location: LocationName,
    pub machines: Vec<EntityId>,
    pub containers: Vec<EntityId>,
    pub connectors: Vec<EntityId>,
}

impl AutomationNetwork {
    /// A network does work only when it has something to run and somewhere
    /// to put things.
    pub fn is_active(&self) -> bool {
        !self.machines.is_empty() && !self.containers.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.machines.contains(&entity)
            || self.containers.contains(&entity)
            || self.connectors.contains(&entity)
    }

    pub fn member_count(&self) -> usize {
        self.machines.len() + self.containers.len() + self.connectors.len()
    }
}

/// Builds the networks of one location from its tile index.
pub struct NetworkBuilder<'w, F> {
    index: &'w TileIndex,
    info: F,
}

impl<'w, F> NetworkBuilder<'w, F>
where
    F: Fn(EntityId) -> Option<LinkInfo>,
{
    /// `info` describes each indexed entity; entities it returns `None` for
    /// are ignored.
    pub fn new(index: &'w TileIndex, info: F) -> Self {
        Self { index, info }
    }

    /// Partition the location into networks. Seeds are visited in ascending
    /// origin order, so ids are stable for identical layouts. Components
    /// made only of connectors produce no network.
    pub fn build(&self, location: &LocationName) -> Vec<AutomationNetwork> {
        let entities: Vec<(EntityId, TileArea, LinkInfo)> = self
            .index
            .entities()
            .into_iter()
            .filter_map(|(id, area)| (self.info)(id).map(|info| (id, area, info)))
            .collect();
        let linkers: Vec<(EntityId, TileArea, u32)> = entities
            .iter()
            .filter(|(_, _, info)| info.link_radius > 0)
            .map(|&(id, area, info)| (id, area, info.link_radius))
            .collect();

        let mut visited = BTreeSet::new();
        let mut networks = Vec::new();

        for &(seed, _, info) in &entities {
            if info.kind == EntityKind::Connector || visited.contains(&seed) {
                continue;
            }

            let mut members = Vec::new();
            let mut queue = VecDeque::from([seed]);
            visited.insert(seed);

            while let Some(current) = queue.pop_front() {
                let Some(current_info) = (self.info)(current) else {
                    continue;
                };
                let Some(area) = self.index.area_of(current) else {
                    continue;
                };
                members.push((area, current, current_info.kind));

                for neighbor in self.neighbors(current, area, current_info, &linkers) {
                    if (self.info)(neighbor).is_some() && visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }

            members.sort_by_key(|&(area, id, _)| (area.origin, id));
            let pick = |kind: EntityKind| -> Vec<EntityId> {
                members
                    .iter()
                    .filter(|m| m.2 == kind)
                    .map(|m| m.1)
                    .collect()
            };
            let network = AutomationNetwork {
                id: NetworkId(networks.len() as u32),
                location: location.clone(),
                machines: pick(EntityKind::Machine),
                containers: pick(EntityKind::Container),
                connectors: pick(EntityKind::Connector),
            };
            trace!(
                location = %location,
                network = network.id.0,
                machines = network.machines.len(),
                containers = network.containers.len(),
                "built network"
            );
            networks.push(network);
        }

        networks
    }

    /// Edge neighbors plus everything within reach of a link radius, in
    /// either direction.
    fn neighbors(
        &self,
        entity: EntityId,
        area: TileArea,
        info: LinkInfo,
        linkers: &[(EntityId, TileArea, u32)],
    ) -> Vec<EntityId> {
        let mut result = self.index.neighbors_4(entity);

        if info.link_radius > 0 {
            result.extend(
                self.index
                    .entities_in_area(area.expanded(info.link_radius))
                    .into_iter()
                    .filter(|&other| other != entity),
            );
        }
        for &(linker, linker_area, radius) in linkers {
            if linker != entity && linker_area.chebyshev_gap(&area) <= radius {
                result.push(linker);
            }
        }

        result
    }
}
