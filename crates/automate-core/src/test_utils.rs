//! Shared fixtures for tests and benches: a small item registry, reference
//! machine adapters, and containers that misbehave on purpose.

use crate::container::{Chest, Container, ContainerError, ContainerOptions};
use crate::id::{EntityId, ItemTypeId};
use crate::item::ItemStack;
use crate::machine::{Machine, MachineError, MachineState};
use crate::registry::{ItemRegistry, ItemRegistryBuilder};
use crate::storage::{ItemMatch, Requirement, StoragePool};
use crate::tracked::{OutputSlot, TrackedStack};
use slotmap::SlotMap;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

pub const GRAPE: ItemTypeId = ItemTypeId(0);
pub const WINE: ItemTypeId = ItemTypeId(1);
pub const FISH: ItemTypeId = ItemTypeId(2);
pub const WOOD: ItemTypeId = ItemTypeId(3);
pub const COAL: ItemTypeId = ItemTypeId(4);
pub const PAN: ItemTypeId = ItemTypeId(5);

/// Registry whose ids match the constants above.
pub fn test_registry() -> ItemRegistry {
    let mut b = ItemRegistryBuilder::new();
    b.register_item_with_tags("grape", 999, &["shippable", "fruit"]);
    b.register_item_with_tags("wine", 999, &["shippable"]);
    b.register_item_with_tags("fish", 999, &["shippable"]);
    b.register_item("wood", 999);
    b.register_item_with_tags("coal", 999, &["fuel"]);
    b.register_item("copper_pan", 1);
    b.build().expect("test registry is valid")
}

pub fn stack(item_type: ItemTypeId, quantity: u32) -> ItemStack {
    ItemStack::new(item_type, quantity)
}

/// Distinct entity ids for tests that do not need a world.
pub fn entity_ids(count: usize) -> Vec<EntityId> {
    let mut keys: SlotMap<EntityId, ()> = SlotMap::with_key();
    (0..count).map(|_| keys.insert(())).collect()
}

pub fn chest_with(name: &str, capacity: usize, stacks: &[ItemStack]) -> Chest {
    let mut chest = Chest::new(name, capacity);
    for (i, s) in stacks.iter().enumerate() {
        chest
            .set_slot(i, Some(s.clone()))
            .expect("stack fits the chest");
    }
    chest
}

// ---------------------------------------------------------------------------
// RecipeMachine
// ---------------------------------------------------------------------------

/// Consumes a fixed input, works for a while, then holds a fixed output.
/// Time only passes through [`advance`](RecipeMachine::advance).
#[derive(Debug)]
pub struct RecipeMachine {
    machine_type: String,
    input: Requirement,
    output: ItemStack,
    duration: u64,
    remaining: Option<u64>,
    slot: OutputSlot,
    enabled: bool,
    collected: Rc<Cell<u64>>,
    output_calls: u32,
    input_calls: u32,
}

impl RecipeMachine {
    pub fn new(
        machine_type: &str,
        input: ItemTypeId,
        input_count: u32,
        output: ItemStack,
        duration: u64,
    ) -> Self {
        let collected = Rc::new(Cell::new(0));
        let counter = Rc::clone(&collected);
        Self {
            machine_type: machine_type.to_string(),
            input: Requirement::new(ItemMatch::Type(input), input_count),
            output,
            duration,
            remaining: None,
            slot: OutputSlot::with_hook(move |taken| {
                counter.set(counter.get() + taken.quantity as u64)
            }),
            enabled: true,
            collected,
            output_calls: 0,
            input_calls: 0,
        }
    }

    /// One grape in, one wine out after ten ticks.
    pub fn keg() -> Self {
        Self::new("Keg", GRAPE, 1, stack(WINE, 1), 10)
    }

    /// Five wood in, one coal out after thirty ticks.
    pub fn charcoal_kiln() -> Self {
        Self::new("CharcoalKiln", WOOD, 5, stack(COAL, 1), 30)
    }

    /// Start out holding `output`.
    pub fn with_output(mut self, output: ItemStack) -> Self {
        self.slot.set(output);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Begin processing without consuming anything.
    pub fn start(&mut self) {
        self.remaining = Some(self.duration);
    }

    /// Let `ticks` pass; finished work moves into the output slot.
    pub fn advance(&mut self, ticks: u64) {
        if let Some(remaining) = self.remaining {
            let left = remaining.saturating_sub(ticks);
            if left == 0 {
                self.remaining = None;
                self.slot.set(self.output.clone());
            } else {
                self.remaining = Some(left);
            }
        }
    }

    /// Items removed from the output slot so far.
    pub fn collected(&self) -> u64 {
        self.collected.get()
    }

    pub fn output_calls(&self) -> u32 {
        self.output_calls
    }

    pub fn input_calls(&self) -> u32 {
        self.input_calls
    }
}

impl Machine for RecipeMachine {
    fn machine_type(&self) -> &str {
        &self.machine_type
    }

    fn get_state(&self) -> MachineState {
        if !self.enabled {
            MachineState::Disabled
        } else if !self.slot.is_empty() {
            MachineState::Done
        } else if self.remaining.is_some() {
            MachineState::Processing
        } else {
            MachineState::Empty
        }
    }

    fn get_output(&mut self) -> Option<TrackedStack<'_>> {
        self.output_calls += 1;
        self.slot.tracked()
    }

    fn set_input(&mut self, pool: &mut StoragePool<'_>) -> Result<bool, MachineError> {
        self.input_calls += 1;
        match pool.try_consume(std::slice::from_ref(&self.input))? {
            Some(_) => {
                self.remaining = Some(self.duration);
                if self.duration == 0 {
                    self.advance(0);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// SourceMachine
// ---------------------------------------------------------------------------

/// Produces on its own and never takes input, like a pond or a tree.
#[derive(Debug)]
pub struct SourceMachine {
    machine_type: String,
    slot: OutputSlot,
}

impl SourceMachine {
    pub fn new(machine_type: &str) -> Self {
        Self {
            machine_type: machine_type.to_string(),
            slot: OutputSlot::new(),
        }
    }

    pub fn with_output(mut self, output: ItemStack) -> Self {
        self.slot.set(output);
        self
    }

    pub fn set_output(&mut self, output: ItemStack) {
        self.slot.set(output);
    }

    pub fn pending(&self) -> Option<&ItemStack> {
        self.slot.get()
    }
}

impl Machine for SourceMachine {
    fn machine_type(&self) -> &str {
        &self.machine_type
    }

    fn get_state(&self) -> MachineState {
        if self.slot.is_empty() {
            MachineState::Processing
        } else {
            MachineState::Done
        }
    }

    fn get_output(&mut self) -> Option<TrackedStack<'_>> {
        self.slot.tracked()
    }

    fn set_input(&mut self, _pool: &mut StoragePool<'_>) -> Result<bool, MachineError> {
        Ok(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// SinkMachine
// ---------------------------------------------------------------------------

/// Always empty; swallows the first whole stack carrying its tag, like a
/// shipping bin.
#[derive(Debug)]
pub struct SinkMachine {
    tag: String,
    received: Vec<ItemStack>,
}

impl SinkMachine {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            received: Vec::new(),
        }
    }

    pub fn received(&self) -> &[ItemStack] {
        &self.received
    }
}

impl Machine for SinkMachine {
    fn machine_type(&self) -> &str {
        "ShippingBin"
    }

    fn get_state(&self) -> MachineState {
        MachineState::Empty
    }

    fn get_output(&mut self) -> Option<TrackedStack<'_>> {
        None
    }

    fn set_input(&mut self, pool: &mut StoragePool<'_>) -> Result<bool, MachineError> {
        let registry = pool.registry();
        let Some(found) = pool.find(|s| registry.has_tag(s.item_type, &self.tag)) else {
            return Ok(false);
        };
        let (handle, quantity) = (found.handle, found.stack.quantity);
        let taken = pool.take(handle, quantity)?;
        self.received.push(taken);
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// RogueMachine
// ---------------------------------------------------------------------------

/// Ways a [`RogueMachine`] breaks the `set_input` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RogueMode {
    /// Reports success without taking anything.
    ClaimWithoutTaking,
    /// Takes one item, then reports failure.
    TakeAndDecline,
    /// Takes one item, then returns an error.
    TakeAndFail,
    /// Takes two items, forgets the pool journal, then reports failure.
    TakeCommitAndDecline,
}

#[derive(Debug)]
pub struct RogueMachine {
    mode: RogueMode,
}

impl RogueMachine {
    pub fn new(mode: RogueMode) -> Self {
        Self { mode }
    }
}

impl Machine for RogueMachine {
    fn machine_type(&self) -> &str {
        "Rogue"
    }

    fn get_state(&self) -> MachineState {
        MachineState::Empty
    }

    fn get_output(&mut self) -> Option<TrackedStack<'_>> {
        None
    }

    fn set_input(&mut self, pool: &mut StoragePool<'_>) -> Result<bool, MachineError> {
        if self.mode == RogueMode::ClaimWithoutTaking {
            return Ok(true);
        }
        let Some(handle) = pool.get_items().next().map(|item| item.handle) else {
            return Ok(false);
        };
        if self.mode == RogueMode::TakeCommitAndDecline {
            pool.take(handle, 2)?;
            pool.commit();
            return Ok(false);
        }
        pool.take(handle, 1)?;
        match self.mode {
            RogueMode::TakeAndFail => Err(MachineError::Adapter("jammed".into())),
            _ => Ok(false),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// BrokenChest
// ---------------------------------------------------------------------------

/// Readable, but every mutation fails as if the chest had vanished.
#[derive(Debug)]
pub struct BrokenChest {
    inner: Chest,
}

impl BrokenChest {
    pub fn new(inner: Chest) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Chest {
        &self.inner
    }
}

impl Container for BrokenChest {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn options(&self) -> ContainerOptions {
        self.inner.options()
    }

    fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.inner.slot(index)
    }

    fn insert_into(
        &mut self,
        _slot: usize,
        _stack: &ItemStack,
        _max_stack: u32,
    ) -> Result<u32, ContainerError> {
        Err(ContainerError::Unavailable(self.inner.name().to_string()))
    }

    fn remove(&mut self, _slot: usize, _count: u32) -> Result<ItemStack, ContainerError> {
        Err(ContainerError::Unavailable(self.inner.name().to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
