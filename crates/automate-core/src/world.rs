//! Entity store: adapters, footprints, and one tile index per location.
//!
//! Every placement, removal and move queues a [`TopologyEvent`] that the
//! engine applies at the start of its next update.

use crate::container::Container;
use crate::event::TopologyEvent;
use crate::id::EntityId;
use crate::location::LocationName;
use crate::machine::Machine;
use crate::network::{EntityKind, LinkInfo};
use crate::tile::{TileArea, TileIndex, TileIndexError, TilePos};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Where an entity is and what it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub location: LocationName,
    pub area: TileArea,
    pub kind: EntityKind,
    pub link_radius: u32,
}

impl EntityMeta {
    pub fn link_info(&self) -> LinkInfo {
        LinkInfo {
            kind: self.kind,
            link_radius: self.link_radius,
        }
    }
}

/// A placement rejected because an earlier entity holds the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementConflict {
    pub location: LocationName,
    pub tile: TilePos,
    pub occupant: EntityId,
}

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Tile(#[from] TileIndexError),
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Default)]
pub struct World {
    pub(crate) entities: SlotMap<EntityId, EntityMeta>,

    // -- Per-entity adapters (SoA, keyed by EntityId) --
    pub(crate) machines: SecondaryMap<EntityId, Box<dyn Machine>>,
    pub(crate) containers: SecondaryMap<EntityId, Box<dyn Container>>,

    indices: BTreeMap<LocationName, TileIndex>,
    pending: Vec<TopologyEvent>,
    conflicts: Vec<PlacementConflict>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    pub fn add_machine(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        machine: Box<dyn Machine>,
    ) -> Result<EntityId, WorldError> {
        let id = self.insert_entity(location.into(), area, EntityKind::Machine, 0)?;
        self.machines.insert(id, machine);
        Ok(id)
    }

    pub fn add_container(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        container: Box<dyn Container>,
    ) -> Result<EntityId, WorldError> {
        self.add_linked_container(location, area, container, 0)
    }

    /// Add a container that also links to every automatable entity within
    /// `link_radius` tiles of its footprint.
    pub fn add_linked_container(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        container: Box<dyn Container>,
        link_radius: u32,
    ) -> Result<EntityId, WorldError> {
        let id = self.insert_entity(location.into(), area, EntityKind::Container, link_radius)?;
        self.containers.insert(id, container);
        Ok(id)
    }

    pub fn add_connector(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
    ) -> Result<EntityId, WorldError> {
        self.insert_entity(location.into(), area, EntityKind::Connector, 0)
    }

    fn insert_entity(
        &mut self,
        location: LocationName,
        area: TileArea,
        kind: EntityKind,
        link_radius: u32,
    ) -> Result<EntityId, WorldError> {
        let index = self
            .indices
            .entry(location.clone())
            .or_insert_with(TileIndex::new);
        let id = self.entities.insert(EntityMeta {
            location: location.clone(),
            area,
            kind,
            link_radius,
        });

        if let Err(err) = index.register(id, area) {
            self.entities.remove(id);
            if let TileIndexError::Occupied { tile, occupant } = &err {
                warn!(
                    location = %location,
                    tile = %tile,
                    occupant = ?occupant,
                    "tile already occupied, keeping the first registrant"
                );
                self.conflicts.push(PlacementConflict {
                    location,
                    tile: *tile,
                    occupant: *occupant,
                });
            }
            return Err(err.into());
        }

        debug!(location = %location, entity = ?id, kind = ?kind, "entity added");
        self.pending.push(TopologyEvent::EntityAdded { location, area });
        Ok(id)
    }

    /// Let an entity link to everything within `radius` tiles.
    pub fn set_link_radius(&mut self, entity: EntityId, radius: u32) -> Result<(), WorldError> {
        let meta = self
            .entities
            .get_mut(entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        if meta.link_radius != radius {
            meta.link_radius = radius;
            self.pending.push(TopologyEvent::EntityAdded {
                location: meta.location.clone(),
                area: meta.area,
            });
        }
        Ok(())
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Result<EntityMeta, WorldError> {
        let meta = self
            .entities
            .remove(entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        self.machines.remove(entity);
        self.containers.remove(entity);
        if let Some(index) = self.indices.get_mut(&meta.location) {
            index.unregister(entity)?;
        }

        debug!(location = %meta.location, entity = ?entity, "entity removed");
        self.pending.push(TopologyEvent::EntityRemoved {
            location: meta.location.clone(),
            area: meta.area,
        });
        Ok(meta)
    }

    /// Move an entity within its location. On conflict the entity stays put.
    pub fn move_entity(&mut self, entity: EntityId, to: TileArea) -> Result<(), WorldError> {
        let meta = self
            .entities
            .get_mut(entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        let from = meta.area;
        let location = meta.location.clone();
        let index = self
            .indices
            .get_mut(&location)
            .ok_or(WorldError::UnknownEntity(entity))?;

        index.unregister(entity)?;
        if let Err(err) = index.register(entity, to) {
            index.register(entity, from)?;
            if let TileIndexError::Occupied { tile, occupant } = &err {
                warn!(location = %location, tile = %tile, "move blocked by occupied tile");
                self.conflicts.push(PlacementConflict {
                    location,
                    tile: *tile,
                    occupant: *occupant,
                });
            }
            return Err(err.into());
        }

        meta.area = to;
        self.pending
            .push(TopologyEvent::EntityMoved { location, from, to });
        Ok(())
    }

    /// Remove every entity in `location`. Returns how many were removed.
    pub fn unload_location(&mut self, location: &LocationName) -> usize {
        let doomed: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, meta)| &meta.location == location)
            .map(|(id, _)| id)
            .collect();
        for &id in &doomed {
            self.entities.remove(id);
            self.machines.remove(id);
            self.containers.remove(id);
        }
        self.indices.remove(location);

        debug!(location = %location, removed = doomed.len(), "location unloaded");
        self.pending.push(TopologyEvent::LocationUnloaded {
            location: location.clone(),
        });
        doomed.len()
    }

    /// Queue a change the world cannot see by itself, such as a host object
    /// becoming a connector.
    pub fn notify(&mut self, event: TopologyEvent) {
        self.pending.push(event);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<TopologyEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn take_conflicts(&mut self) -> Vec<PlacementConflict> {
        std::mem::take(&mut self.conflicts)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn meta(&self, entity: EntityId) -> Option<&EntityMeta> {
        self.entities.get(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn tile_index(&self, location: &LocationName) -> Option<&TileIndex> {
        self.indices.get(location)
    }

    pub fn entity_at(&self, location: &LocationName, pos: TilePos) -> Option<EntityId> {
        self.indices.get(location)?.entity_at(pos)
    }

    /// Locations with at least one index, in name order.
    pub fn locations(&self) -> impl Iterator<Item = &LocationName> {
        self.indices.keys()
    }

    pub fn machine(&self, entity: EntityId) -> Option<&dyn Machine> {
        let machine: &dyn Machine = self.machines.get(entity)?.as_ref();
        Some(machine)
    }

    pub fn machine_mut(&mut self, entity: EntityId) -> Option<&mut dyn Machine> {
        let machine: &mut dyn Machine = self.machines.get_mut(entity)?.as_mut();
        Some(machine)
    }

    pub fn container(&self, entity: EntityId) -> Option<&dyn Container> {
        let container: &dyn Container = self.containers.get(entity)?.as_ref();
        Some(container)
    }

    pub fn container_mut(&mut self, entity: EntityId) -> Option<&mut dyn Container> {
        let container: &mut dyn Container = self.containers.get_mut(entity)?.as_mut();
        Some(container)
    }

    /// Downcast a machine adapter to its concrete type.
    pub fn machine_as<T: Machine + 'static>(&self, entity: EntityId) -> Option<&T> {
        self.machines.get(entity)?.as_any().downcast_ref::<T>()
    }

    pub fn machine_as_mut<T: Machine + 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.machines
            .get_mut(entity)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Downcast a container adapter to its concrete type.
    pub fn container_as<T: Container + 'static>(&self, entity: EntityId) -> Option<&T> {
        let container = self.containers.get(entity)?;
        container.as_any().downcast_ref::<T>()
    }

    pub fn container_as_mut<T: Container + 'static>(
        &mut self,
        entity: EntityId,
    ) -> Option<&mut T> {
        self.containers
            .get_mut(entity)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Every machine id, ascending.
    pub fn machine_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.machines.keys().collect();
        ids.sort();
        ids
    }
}
