//! Topology notifications in, automation events out.
//!
//! [`TopologyEvent`]s describe world changes that invalidate cached networks.
//! They are queued and applied at the start of the next update, so a network
//! never changes shape halfway through a tick.
//!
//! [`AutomationEvent`]s report what the engine did. They are recorded in a
//! fixed-capacity [`EventBuffer`] (oldest dropped first) owned by an
//! [`EventBus`], which also supports per-kind suppression and passive
//! listeners called once per update.

use crate::id::EntityId;
use crate::item::ItemStack;
use crate::location::LocationName;
use crate::sim::Ticks;
use crate::tile::{TileArea, TilePos};

// ---------------------------------------------------------------------------
// Topology events
// ---------------------------------------------------------------------------

/// A change to the world that may alter network shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    EntityAdded {
        location: LocationName,
        area: TileArea,
    },
    EntityRemoved {
        location: LocationName,
        area: TileArea,
    },
    EntityMoved {
        location: LocationName,
        from: TileArea,
        to: TileArea,
    },
    /// Every network in the location is discarded, not rebuilt.
    LocationUnloaded { location: LocationName },
}

impl TopologyEvent {
    pub fn location(&self) -> &LocationName {
        match self {
            TopologyEvent::EntityAdded { location, .. }
            | TopologyEvent::EntityRemoved { location, .. }
            | TopologyEvent::EntityMoved { location, .. }
            | TopologyEvent::LocationUnloaded { location } => location,
        }
    }
}

// ---------------------------------------------------------------------------
// Automation events
// ---------------------------------------------------------------------------

/// Something the engine did or refused to do. All events carry the tick at
/// which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationEvent {
    OutputCollected {
        machine: EntityId,
        items: ItemStack,
        tick: Ticks,
    },
    InputAccepted {
        machine: EntityId,
        tick: Ticks,
    },
    MachineFailed {
        machine: EntityId,
        reason: String,
        tick: Ticks,
    },
    ContainerFailed {
        container: EntityId,
        reason: String,
        tick: Ticks,
    },
    /// An adapter's answer disagreed with what it did to the pool.
    ContractViolation {
        machine: EntityId,
        violation: Violation,
        tick: Ticks,
    },
    NetworkRebuilt {
        location: LocationName,
        networks: usize,
        tick: Ticks,
    },
    /// A placement lost to an earlier registrant of the same tile.
    TopologyConflict {
        location: LocationName,
        tile: TilePos,
        occupant: EntityId,
        tick: Ticks,
    },
}

/// How an adapter broke its side of an exchange with the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `set_input` reported success but the pool was unchanged.
    ClaimedWithoutConsuming,
    /// `set_input` declined or failed after changing the pool.
    DeclinedAfterConsuming,
    /// The output hook handed over more items than were asked for.
    OverDelivered { requested: u32, delivered: u32 },
}

/// Discriminant tag for event types, used for suppression and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OutputCollected,
    InputAccepted,
    MachineFailed,
    ContainerFailed,
    ContractViolation,
    NetworkRebuilt,
    TopologyConflict,
}

const EVENT_KIND_COUNT: usize = 7;

impl AutomationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AutomationEvent::OutputCollected { .. } => EventKind::OutputCollected,
            AutomationEvent::InputAccepted { .. } => EventKind::InputAccepted,
            AutomationEvent::MachineFailed { .. } => EventKind::MachineFailed,
            AutomationEvent::ContainerFailed { .. } => EventKind::ContainerFailed,
            AutomationEvent::ContractViolation { .. } => EventKind::ContractViolation,
            AutomationEvent::NetworkRebuilt { .. } => EventKind::NetworkRebuilt,
            AutomationEvent::TopologyConflict { .. } => EventKind::TopologyConflict,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            AutomationEvent::OutputCollected { tick, .. }
            | AutomationEvent::InputAccepted { tick, .. }
            | AutomationEvent::MachineFailed { tick, .. }
            | AutomationEvent::ContainerFailed { tick, .. }
            | AutomationEvent::ContractViolation { tick, .. }
            | AutomationEvent::NetworkRebuilt { tick, .. }
            | AutomationEvent::TopologyConflict { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer. Fixed capacity; when full, the oldest events
/// are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<AutomationEvent>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: AutomationEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events pushed out by newer ones.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    fn oldest(&self) -> usize {
        if self.len < self.capacity() { 0 } else { self.head }
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &AutomationEvent> + '_ {
        let start = self.oldest();
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    /// Remove and return every stored event, oldest first.
    pub fn drain(&mut self) -> Vec<AutomationEvent> {
        let start = self.oldest();
        let capacity = self.capacity();
        let drained = (0..self.len)
            .filter_map(|i| self.events[(start + i) % capacity].take())
            .collect();
        self.head = 0;
        self.len = 0;
        drained
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&AutomationEvent)>;

/// Records automation events and hands them to listeners.
pub struct EventBus {
    buffer: EventBuffer,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    /// Emitted since the last delivery, for kinds with listeners.
    undelivered: Vec<AutomationEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffer", &self.buffer)
            .field("suppressed", &self.suppressed)
            .field("undelivered", &self.undelivered.len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            undelivered: Vec::new(),
        }
    }

    /// Suppressed kinds are neither recorded nor delivered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: AutomationEvent) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        if !self.listeners[idx].is_empty() {
            self.undelivered.push(event.clone());
        }
        self.buffer.push(event);
    }

    /// Register a listener called for every event of `kind` at the end of
    /// each update.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Call listeners with everything emitted since the last delivery, in
    /// emission order.
    pub fn deliver(&mut self) {
        for event in std::mem::take(&mut self.undelivered) {
            for listener in &mut self.listeners[event.kind().index()] {
                listener(&event);
            }
        }
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn drain(&mut self) -> Vec<AutomationEvent> {
        self.buffer.drain()
    }
}
