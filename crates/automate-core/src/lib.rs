//! Automate Core -- machine automation for tile-based farming and crafting games.
//!
//! Machines (kegs, furnaces, kilns) and containers (chests, bins) placed on a
//! tile grid are grouped into networks by adjacency. On every automation tick
//! each network collects finished output into its containers and then feeds
//! idle machines from them.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::update`] runs:
//!
//! 1. **Topology** -- Queued placement events invalidate the affected
//!    locations' cached networks.
//! 2. **Rebuild** -- Stale locations are re-scanned with a breadth-first search
//!    over the [`tile::TileIndex`].
//! 3. **Collect** -- Every `Done` machine hands its output to the network's
//!    [`storage::StoragePool`].
//! 4. **Feed** -- Every `Empty` machine may take its input from the pool,
//!    in priority order. A machine that breaks the input contract is rolled
//!    back.
//! 5. **Delivery** -- Buffered events reach passive listeners.
//!
//! Steps 2 to 4 only run on ticks that are multiples of the configured
//! automation interval.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the world, the network cache and the event bus.
//! - [`machine::Machine`] -- Adapter trait every automatable machine implements.
//! - [`container::Container`] -- Adapter trait for storage; [`container::Chest`]
//!   is the stock implementation.
//! - [`storage::StoragePool`] -- Journaled view over a network's containers.
//! - [`network::NetworkBuilder`] -- Partitions a location into networks.
//! - [`event::EventBus`] -- Ring-buffered automation events with passive
//!   listeners.

pub mod cache;
pub mod config;
pub mod container;
pub mod dirty;
pub mod engine;
pub mod event;
pub mod id;
pub mod item;
pub mod location;
pub mod machine;
pub mod network;
pub mod processor;
pub mod query;
pub mod registry;
pub mod sim;
pub mod storage;
pub mod tile;
pub mod tracked;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
