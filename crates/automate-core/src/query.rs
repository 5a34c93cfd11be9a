//! Read-only queries for overlays and debugging.
//!
//! Nothing here mutates the engine; snapshot types are owned copies.

use crate::engine::Engine;
use crate::id::{EntityId, NetworkId};
use crate::item::ItemCounts;
use crate::location::LocationName;
use crate::machine::MachineState;
use crate::tile::{TileArea, TilePos};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Machine snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub id: EntityId,
    pub machine_type: String,
    pub state: MachineState,
    pub area: TileArea,
    /// `None` until the location's networks are built.
    pub network: Option<NetworkId>,
}

// ---------------------------------------------------------------------------
// Network snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one cached network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSnapshot {
    pub id: NetworkId,
    pub location: LocationName,
    pub machines: Vec<EntityId>,
    pub containers: Vec<EntityId>,
    pub connectors: usize,
    /// Combined contents of the network's containers.
    pub contents: ItemCounts,
}

impl Engine {
    /// Diagnostic code (0 none, 1 empty, 2 processing, 3 finished) for every
    /// machine tile of `location` inside `area`. Tiles without a machine are
    /// absent.
    pub fn machine_states(&self, location: &LocationName, area: TileArea) -> BTreeMap<TilePos, u8> {
        let mut codes = BTreeMap::new();
        let Some(index) = self.world.tile_index(location) else {
            return codes;
        };

        for entity in index.entities_in_area(area) {
            let Some(machine) = self.world.machine(entity) else {
                continue;
            };
            let code = machine.get_state().diagnostic_code();
            for tile in index.tiles_of(entity) {
                if area.contains(tile) {
                    codes.insert(tile, code);
                }
            }
        }
        codes
    }

    /// Diagnostic code for the machine covering `tile`, or 0.
    pub fn machine_state_at(&self, location: &LocationName, tile: TilePos) -> u8 {
        self.world
            .entity_at(location, tile)
            .and_then(|entity| self.world.machine(entity))
            .map(|machine| machine.get_state().diagnostic_code())
            .unwrap_or(0)
    }

    pub fn machine_snapshot(&self, entity: EntityId) -> Option<MachineSnapshot> {
        let meta = self.world.meta(entity)?;
        let machine = self.world.machine(entity)?;
        Some(MachineSnapshot {
            id: entity,
            machine_type: machine.machine_type().to_string(),
            state: machine.get_state(),
            area: meta.area,
            network: self.cache.network_of(&meta.location, entity),
        })
    }

    pub fn network_snapshots(&self, location: &LocationName) -> Vec<NetworkSnapshot> {
        self.networks(location)
            .iter()
            .map(|network| {
                let mut contents = ItemCounts::new();
                for &id in &network.containers {
                    if let Some(container) = self.world.container(id) {
                        for (kind, count) in container.contents() {
                            *contents.entry(kind).or_insert(0) += count;
                        }
                    }
                }
                NetworkSnapshot {
                    id: network.id,
                    location: network.location.clone(),
                    machines: network.machines.clone(),
                    containers: network.containers.clone(),
                    connectors: network.connectors.len(),
                    contents,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutomateConfig;
    use crate::container::Chest;
    use crate::sim::SimContext;
    use crate::test_utils::*;

    fn engine() -> Engine {
        let config = AutomateConfig {
            automation_interval: 1,
            ..AutomateConfig::default()
        };
        Engine::new(config, test_registry()).unwrap()
    }

    #[test]
    fn codes_cover_every_machine_tile_in_view() {
        let mut engine = engine();
        engine
            .add_machine(
                "Farm",
                TileArea::new(0, 0, 2, 1),
                Box::new(RecipeMachine::keg().with_output(stack(WINE, 1))),
            )
            .unwrap();
        let mut idle = RecipeMachine::keg();
        idle.start();
        engine
            .add_machine("Farm", TileArea::new(5, 5, 1, 1), Box::new(idle))
            .unwrap();
        engine
            .add_container("Farm", TileArea::new(0, 1, 1, 1), Box::new(Chest::new("c", 1)))
            .unwrap();

        let codes = engine.machine_states(&"Farm".into(), TileArea::new(0, 0, 4, 4));
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[&TilePos::new(0, 0)], 3);
        assert_eq!(codes[&TilePos::new(1, 0)], 3);

        let codes = engine.machine_states(&"Farm".into(), TileArea::new(1, 0, 10, 10));
        assert_eq!(codes.get(&TilePos::new(0, 0)), None);
        assert_eq!(codes[&TilePos::new(5, 5)], 2);
    }

    #[test]
    fn empty_and_disabled_codes() {
        let mut engine = engine();
        engine
            .add_machine("Farm", TileArea::new(0, 0, 1, 1), Box::new(RecipeMachine::keg()))
            .unwrap();
        engine
            .add_machine(
                "Farm",
                TileArea::new(1, 0, 1, 1),
                Box::new(RecipeMachine::keg().disabled()),
            )
            .unwrap();

        let farm = LocationName::from("Farm");
        assert_eq!(engine.machine_state_at(&farm, TilePos::new(0, 0)), 1);
        assert_eq!(engine.machine_state_at(&farm, TilePos::new(1, 0)), 0);
        assert_eq!(engine.machine_state_at(&farm, TilePos::new(2, 0)), 0);
        assert!(engine.machine_states(&"Nowhere".into(), TileArea::new(0, 0, 9, 9)).is_empty());
    }

    #[test]
    fn snapshots_reflect_cache_and_contents() {
        let mut engine = engine();
        let keg = engine
            .add_machine("Farm", TileArea::new(0, 0, 1, 1), Box::new(RecipeMachine::keg()))
            .unwrap();
        engine
            .add_container(
                "Farm",
                TileArea::new(1, 0, 1, 1),
                Box::new(chest_with("c", 2, &[stack(WOOD, 3)])),
            )
            .unwrap();

        assert_eq!(engine.machine_snapshot(keg).unwrap().network, None);
        engine.update(&SimContext::all(0));

        let snapshot = engine.machine_snapshot(keg).unwrap();
        assert_eq!(snapshot.machine_type, "Keg");
        assert_eq!(snapshot.network, Some(NetworkId(0)));

        let networks = engine.network_snapshots(&"Farm".into());
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].contents.values().sum::<u64>(), 3);
    }
}
