//! The automation engine: owns the world and the network cache and runs the
//! per-tick pipeline.
//!
//! # Update pipeline
//!
//! Each [`Engine::update`] runs:
//! 1. **Topology**: queued world changes invalidate cached networks; placement
//!    conflicts become events.
//! 2. On processing ticks only (see [`AutomateConfig::automation_interval`]):
//!    - **Rebuild**: stale or missing networks of active locations are rebuilt.
//!    - **Process**: each active network runs the collect pass, then the feed
//!      pass, in location name order and network id order.
//! 3. **Delivery**: listeners receive the events emitted during this update.

use crate::cache::NetworkCache;
use crate::config::{AutomateConfig, ConfigError};
use crate::container::Container;
use crate::event::{AutomationEvent, EventBus, EventKind, PassiveListener};
use crate::id::{EntityId, NetworkId};
use crate::location::LocationName;
use crate::machine::Machine;
use crate::network::{AutomationNetwork, NetworkBuilder};
use crate::processor::{self, MachineSlot, PassReport};
use crate::registry::ItemRegistry;
use crate::sim::{SimContext, StateHash, Ticks};
use crate::storage::StoragePool;
use crate::tile::TileArea;
use crate::world::{EntityMeta, World, WorldError};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// What one [`Engine::update`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Ticks,
    /// Whether this was a processing tick.
    pub processed: bool,
    pub locations_rebuilt: usize,
    pub networks_processed: usize,
    /// Networks lacking machines or containers.
    pub networks_skipped: usize,
    pub passes: PassReport,
}

#[derive(Debug)]
pub struct Engine {
    pub(crate) world: World,
    pub(crate) config: AutomateConfig,
    pub(crate) registry: ItemRegistry,
    pub(crate) cache: NetworkCache,
    events: EventBus,
}

impl Engine {
    pub fn new(config: AutomateConfig, registry: ItemRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            world: World::new(),
            events: EventBus::new(config.event_capacity),
            config,
            registry,
            cache: NetworkCache::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &AutomateConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next update.
    pub fn set_config(&mut self, config: AutomateConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // -----------------------------------------------------------------------
    // Placement helpers
    // -----------------------------------------------------------------------

    pub fn add_machine(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        machine: Box<dyn Machine>,
    ) -> Result<EntityId, WorldError> {
        self.world.add_machine(location, area, machine)
    }

    pub fn add_container(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        container: Box<dyn Container>,
    ) -> Result<EntityId, WorldError> {
        self.world.add_container(location, area, container)
    }

    pub fn add_linked_container(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        container: Box<dyn Container>,
        link_radius: u32,
    ) -> Result<EntityId, WorldError> {
        self.world
            .add_linked_container(location, area, container, link_radius)
    }

    pub fn set_link_radius(&mut self, entity: EntityId, radius: u32) -> Result<(), WorldError> {
        self.world.set_link_radius(entity, radius)
    }

    /// Register a host object as a connector if its name is configured as
    /// one. Returns `Ok(None)` for any other object.
    pub fn add_object(
        &mut self,
        location: impl Into<LocationName>,
        area: TileArea,
        object_name: &str,
    ) -> Result<Option<EntityId>, WorldError> {
        if !self.config.is_connector(object_name) {
            return Ok(None);
        }
        self.world.add_connector(location, area).map(Some)
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Result<EntityMeta, WorldError> {
        self.world.remove_entity(entity)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Take every recorded event, oldest first.
    pub fn drain_events(&mut self) -> Vec<AutomationEvent> {
        self.events.drain()
    }

    // -----------------------------------------------------------------------
    // Networks
    // -----------------------------------------------------------------------

    /// Cached networks of `location`. Empty until the location's first
    /// processing tick.
    pub fn networks(&self, location: &LocationName) -> &[AutomationNetwork] {
        self.cache.get(location).unwrap_or(&[])
    }

    pub fn network_of(&self, entity: EntityId) -> Option<NetworkId> {
        let meta = self.world.meta(entity)?;
        self.cache.network_of(&meta.location, entity)
    }

    /// Force a rebuild of `location` on the next processing tick.
    pub fn invalidate_location(&mut self, location: impl Into<LocationName>) {
        self.cache.invalidate(location.into());
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    pub fn update(&mut self, ctx: &SimContext) -> TickReport {
        let mut report = TickReport {
            tick: ctx.tick,
            ..TickReport::default()
        };

        self.apply_topology(ctx.tick);

        if self.config.enabled && self.config.is_due(ctx.tick) {
            report.processed = true;
            report.locations_rebuilt = self.refresh_networks(ctx);
            self.process_networks(ctx, &mut report);
        }

        self.events.deliver();
        report
    }

    fn apply_topology(&mut self, tick: Ticks) {
        for conflict in self.world.take_conflicts() {
            self.events.emit(AutomationEvent::TopologyConflict {
                location: conflict.location,
                tile: conflict.tile,
                occupant: conflict.occupant,
                tick,
            });
        }
        for event in self.world.take_pending() {
            self.cache.apply(&event);
        }
    }

    /// Rebuild stale or never-built networks of active locations. Returns the
    /// number of locations rebuilt.
    fn refresh_networks(&mut self, ctx: &SimContext) -> usize {
        let mut wanted: BTreeSet<LocationName> = self.cache.sync().into_iter().collect();
        for location in self.world.locations() {
            if !self.cache.is_built(location) {
                wanted.insert(location.clone());
            }
        }

        let mut rebuilt = 0;
        for location in wanted.into_iter().filter(|l| ctx.is_active(l)) {
            self.rebuild(&location, ctx.tick);
            rebuilt += 1;
        }
        rebuilt
    }

    fn rebuild(&mut self, location: &LocationName, tick: Ticks) {
        let networks = match self.world.tile_index(location) {
            Some(index) => {
                let world = &self.world;
                NetworkBuilder::new(index, |id| world.meta(id).map(EntityMeta::link_info))
                    .build(location)
            }
            None => Vec::new(),
        };

        info!(location = %location, networks = networks.len(), "networks rebuilt");
        self.events.emit(AutomationEvent::NetworkRebuilt {
            location: location.clone(),
            networks: networks.len(),
            tick,
        });
        self.cache.insert(location.clone(), networks);
    }

    fn process_networks(&mut self, ctx: &SimContext, report: &mut TickReport) {
        let mut machines: BTreeMap<EntityId, &mut Box<dyn Machine>> =
            self.world.machines.iter_mut().collect();
        let mut containers: BTreeMap<EntityId, &mut Box<dyn Container>> =
            self.world.containers.iter_mut().collect();

        for (location, networks) in self.cache.iter() {
            if !ctx.is_active(location) {
                continue;
            }
            for network in networks {
                if !network.is_active() {
                    report.networks_skipped += 1;
                    continue;
                }

                let mut ranked = Vec::with_capacity(network.machines.len());
                for &id in &network.machines {
                    let Some(machine) = machines.remove(&id) else {
                        debug!(machine = ?id, "machine vanished, skipping");
                        continue;
                    };
                    let settings = self.config.machine_override(machine.machine_type());
                    if settings.enabled {
                        ranked.push((settings.priority, MachineSlot::new(id, machine.as_mut())));
                    }
                }
                // Stable: equal priorities keep tile order.
                ranked.sort_by_key(|(priority, _)| Reverse(*priority));
                let mut slots: Vec<MachineSlot<'_>> =
                    ranked.into_iter().map(|(_, slot)| slot).collect();

                let mut pool = StoragePool::new(&self.registry, self.config.default_max_stack);
                for &id in &network.containers {
                    match containers.remove(&id) {
                        Some(container) => pool.add_container(id, container.as_mut()),
                        None => debug!(container = ?id, "container vanished, skipping"),
                    }
                }

                if slots.is_empty() || pool.is_empty() {
                    report.networks_skipped += 1;
                    continue;
                }

                let passes =
                    processor::process_network(&mut slots, &mut pool, &mut self.events, ctx.tick);
                report.passes.merge(passes);
                report.networks_processed += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Hash of every entity's placement, machine state and container contents.
    /// Equal for engines that saw the same operations.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        for (id, meta) in &self.world.entities {
            hash.write_str(meta.location.as_str());
            hash.write_i32(meta.area.origin.x);
            hash.write_i32(meta.area.origin.y);
            hash.write_u32(meta.area.width);
            hash.write_u32(meta.area.height);
            if let Some(machine) = self.world.machines.get(id) {
                hash.write_u32(machine.get_state().diagnostic_code() as u32);
            }
            if let Some(container) = self.world.containers.get(id) {
                for (kind, count) in container.contents() {
                    hash.write_u32(kind.item_type.0);
                    hash.write_u32(kind.quality as u32);
                    hash.write_u64(count);
                }
            }
        }
        hash.finish()
    }
}
