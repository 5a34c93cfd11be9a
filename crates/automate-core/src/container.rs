//! Slot-based item containers that make up a storage pool.

use crate::item::{ItemCounts, ItemStack, count_items};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("slot {slot} is out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    #[error("slot {0} holds a different item")]
    Incompatible(usize),
    #[error("container is unavailable: {0}")]
    Unavailable(String),
}

/// How eagerly the engine uses a container in one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoragePreference {
    /// Used in registration order.
    #[default]
    Allow,
    /// Visited before every `Allow` container.
    Prefer,
    /// Never used in this direction.
    Disable,
}

impl StoragePreference {
    pub fn is_enabled(self) -> bool {
        self != StoragePreference::Disable
    }
}

/// Per-container automation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Whether machines may take their inputs from this container.
    pub take_items: StoragePreference,
    /// Whether collected machine outputs may be stored here.
    pub store_items: StoragePreference,
}

impl ContainerOptions {
    /// A container machines take from but never store into.
    pub fn input_only() -> Self {
        Self {
            take_items: StoragePreference::Allow,
            store_items: StoragePreference::Disable,
        }
    }

    /// A container that only receives outputs.
    pub fn output_only() -> Self {
        Self {
            take_items: StoragePreference::Disable,
            store_items: StoragePreference::Allow,
        }
    }
}

/// A chest-like holder of item stacks.
///
/// The required methods are the host adapter's surface; merging and filling
/// are provided on top of [`insert_into`](Container::insert_into).
pub trait Container: Debug {
    /// Display name used in logs.
    fn name(&self) -> &str;

    fn options(&self) -> ContainerOptions {
        ContainerOptions::default()
    }

    fn slot_count(&self) -> usize;

    /// The stack in `index`, or `None` when the slot is empty or out of range.
    fn slot(&self, index: usize) -> Option<&ItemStack>;

    /// Add as much of `stack` as fits into `slot`, which must be empty or hold
    /// a compatible stack. `max_stack` caps the slot quantity. Returns the
    /// number of items that did not fit.
    fn insert_into(
        &mut self,
        slot: usize,
        stack: &ItemStack,
        max_stack: u32,
    ) -> Result<u32, ContainerError>;

    /// Remove up to `count` items from `slot`.
    fn remove(&mut self, slot: usize, count: u32) -> Result<ItemStack, ContainerError>;

    /// Removal hook: called after a machine took `taken` out of `slot`
    /// through a storage pool. A take the engine later reverts is put back
    /// with [`insert_into`](Container::insert_into) without a second call.
    fn on_taken(&mut self, slot: usize, taken: &ItemStack) {
        let _ = (slot, taken);
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Non-empty slots in slot order.
    fn stacks(&self) -> Vec<(usize, &ItemStack)> {
        (0..self.slot_count())
            .filter_map(|i| self.slot(i).filter(|s| s.quantity > 0).map(|s| (i, s)))
            .collect()
    }

    fn contents(&self) -> ItemCounts {
        count_items(self.stacks().into_iter().map(|(_, s)| s))
    }

    /// Items of `stack`'s kind this container can still accept.
    fn capacity_for(&self, stack: &ItemStack, max_stack: u32) -> u64 {
        (0..self.slot_count())
            .map(|i| match self.slot(i) {
                Some(existing) if existing.quantity > 0 => {
                    if existing.can_stack_with(stack) {
                        max_stack.saturating_sub(existing.quantity) as u64
                    } else {
                        0
                    }
                }
                _ => max_stack as u64,
            })
            .sum()
    }

    /// Top up existing compatible stacks. Returns the items left over.
    fn merge_into_existing(
        &mut self,
        stack: &ItemStack,
        max_stack: u32,
    ) -> Result<u32, ContainerError> {
        let mut remaining = stack.quantity;
        for i in 0..self.slot_count() {
            if remaining == 0 {
                break;
            }
            let compatible = self
                .slot(i)
                .is_some_and(|s| s.quantity > 0 && s.can_stack_with(stack));
            if compatible {
                remaining = self.insert_into(i, &stack.with_quantity(remaining), max_stack)?;
            }
        }
        Ok(remaining)
    }

    /// Start new stacks in empty slots. Returns the items left over.
    fn fill_empty_slots(&mut self, stack: &ItemStack, max_stack: u32) -> Result<u32, ContainerError> {
        let mut remaining = stack.quantity;
        for i in 0..self.slot_count() {
            if remaining == 0 {
                break;
            }
            let empty = self.slot(i).is_none_or(|s| s.quantity == 0);
            if empty {
                remaining = self.insert_into(i, &stack.with_quantity(remaining), max_stack)?;
            }
        }
        Ok(remaining)
    }

    /// Merge first, then fill empty slots. Returns the items left over.
    fn insert(&mut self, stack: &ItemStack, max_stack: u32) -> Result<u32, ContainerError> {
        let remaining = self.merge_into_existing(stack, max_stack)?;
        if remaining == 0 {
            return Ok(0);
        }
        self.fill_empty_slots(&stack.with_quantity(remaining), max_stack)
    }
}

// ---------------------------------------------------------------------------
// Chest
// ---------------------------------------------------------------------------

/// A fixed-capacity container backed by a slot vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chest {
    name: String,
    slots: Vec<Option<ItemStack>>,
    #[serde(default)]
    options: ContainerOptions,
    #[serde(skip, default = "available_default")]
    available: bool,
}

fn available_default() -> bool {
    true
}

impl Chest {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            slots: vec![None; capacity],
            options: ContainerOptions::default(),
            available: true,
        }
    }

    pub fn with_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_options(&mut self, options: ContainerOptions) {
        self.options = options;
    }

    /// Overwrite a slot directly.
    pub fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) -> Result<(), ContainerError> {
        let capacity = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ContainerError::SlotOutOfRange { slot: index, capacity })?;
        *slot = stack.filter(|s| s.quantity > 0);
        Ok(())
    }

    /// Mark the chest as gone (or back). An unavailable chest reads as empty
    /// and rejects every mutation.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn total_items(&self) -> u64 {
        self.slots.iter().flatten().map(|s| s.quantity as u64).sum()
    }

    fn check(&self, slot: usize) -> Result<(), ContainerError> {
        if !self.available {
            return Err(ContainerError::Unavailable(self.name.clone()));
        }
        if slot >= self.slots.len() {
            return Err(ContainerError::SlotOutOfRange {
                slot,
                capacity: self.slots.len(),
            });
        }
        Ok(())
    }
}

impl Container for Chest {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> ContainerOptions {
        self.options
    }

    fn slot_count(&self) -> usize {
        if self.available { self.slots.len() } else { 0 }
    }

    fn slot(&self, index: usize) -> Option<&ItemStack> {
        if !self.available {
            return None;
        }
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn insert_into(
        &mut self,
        slot: usize,
        stack: &ItemStack,
        max_stack: u32,
    ) -> Result<u32, ContainerError> {
        self.check(slot)?;
        let max_stack = max_stack.max(1);
        let entry = &mut self.slots[slot];
        match entry {
            Some(existing) => {
                if !existing.can_stack_with(stack) {
                    return Err(ContainerError::Incompatible(slot));
                }
                let added = stack.quantity.min(max_stack.saturating_sub(existing.quantity));
                existing.quantity += added;
                Ok(stack.quantity - added)
            }
            None => {
                let added = stack.quantity.min(max_stack);
                if added > 0 {
                    *entry = Some(stack.with_quantity(added));
                }
                Ok(stack.quantity - added)
            }
        }
    }

    fn remove(&mut self, slot: usize, count: u32) -> Result<ItemStack, ContainerError> {
        self.check(slot)?;
        let entry = &mut self.slots[slot];
        let Some(existing) = entry.as_mut() else {
            return Err(ContainerError::EmptySlot(slot));
        };
        let taken = count.min(existing.quantity);
        existing.quantity -= taken;
        let removed = existing.with_quantity(taken);
        if existing.quantity == 0 {
            *entry = None;
        }
        Ok(removed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ItemTypeId;
    use crate::item::ItemKind;

    fn stone(quantity: u32) -> ItemStack {
        ItemStack::new(ItemTypeId(0), quantity)
    }

    fn wood(quantity: u32) -> ItemStack {
        ItemStack::new(ItemTypeId(1), quantity)
    }

    #[test]
    fn insert_merges_before_filling() {
        let mut chest = Chest::new("chest", 3);
        chest.set_slot(2, Some(stone(5))).unwrap();

        let leftover = chest.insert(&stone(10), 999).unwrap();
        assert_eq!(leftover, 0);
        assert_eq!(chest.slot(0), None);
        assert_eq!(chest.slot(2).map(|s| s.quantity), Some(15));
    }

    #[test]
    fn insert_respects_max_stack() {
        let mut chest = Chest::new("chest", 2);
        let leftover = chest.insert(&stone(25), 10).unwrap();
        assert_eq!(leftover, 5);
        assert_eq!(chest.total_items(), 20);
    }

    #[test]
    fn insert_into_incompatible_slot_errors() {
        let mut chest = Chest::new("chest", 1);
        chest.set_slot(0, Some(wood(1))).unwrap();
        assert_eq!(
            chest.insert_into(0, &stone(1), 999),
            Err(ContainerError::Incompatible(0))
        );
        // The provided insert skips the slot instead.
        assert_eq!(chest.insert(&stone(3), 999), Ok(3));
    }

    #[test]
    fn remove_partial_and_full() {
        let mut chest = Chest::new("chest", 1);
        chest.set_slot(0, Some(stone(5))).unwrap();

        assert_eq!(chest.remove(0, 2).unwrap().quantity, 2);
        assert_eq!(chest.remove(0, 10).unwrap().quantity, 3);
        assert_eq!(chest.slot(0), None);
        assert_eq!(chest.remove(0, 1), Err(ContainerError::EmptySlot(0)));
    }

    #[test]
    fn capacity_for_counts_free_and_mergeable_space() {
        let mut chest = Chest::new("chest", 3);
        chest.set_slot(0, Some(stone(8))).unwrap();
        chest.set_slot(1, Some(wood(1))).unwrap();
        assert_eq!(chest.capacity_for(&stone(1), 10), 2 + 10);
    }

    #[test]
    fn unavailable_chest_reads_empty_and_rejects_mutation() {
        let mut chest = Chest::new("chest", 2);
        chest.set_slot(0, Some(stone(5))).unwrap();
        chest.set_available(false);

        assert!(chest.stacks().is_empty());
        assert!(matches!(chest.remove(0, 1), Err(ContainerError::Unavailable(_))));
        assert!(matches!(
            chest.insert_into(1, &stone(1), 999),
            Err(ContainerError::Unavailable(_))
        ));

        chest.set_available(true);
        assert_eq!(chest.contents()[&ItemKind::new(ItemTypeId(0))], 5);
    }

    #[test]
    fn out_of_range_slot() {
        let mut chest = Chest::new("chest", 1);
        assert_eq!(
            chest.remove(4, 1),
            Err(ContainerError::SlotOutOfRange { slot: 4, capacity: 1 })
        );
    }

    #[test]
    fn options_presets() {
        assert_eq!(ContainerOptions::input_only().store_items, StoragePreference::Disable);
        assert!(ContainerOptions::output_only().store_items.is_enabled());
        assert!(!ContainerOptions::output_only().take_items.is_enabled());
    }
}
