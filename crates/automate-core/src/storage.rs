//! The storage pool: one network's containers viewed as a single inventory.
//!
//! A pool borrows every container of a network mutably for the duration of
//! one network's processing. Machines read it through [`StoragePool::get_items`]
//! and change it only through [`take`](StoragePool::take),
//! [`insert`](StoragePool::insert) and the ingredient helpers. Every change is
//! journaled so the engine can check what a machine actually did and undo it.

use crate::container::{Container, ContainerError, ContainerOptions, StoragePreference};
use crate::id::{EntityId, ItemTypeId};
use crate::item::{ItemCounts, ItemKind, ItemStack};
use crate::registry::ItemRegistry;
use std::collections::BTreeMap;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("stack handle {0:?} does not refer to a pooled container")]
    InvalidHandle(StackHandle),
    #[error("container {0:?} is unavailable for the rest of this tick")]
    Unavailable(EntityId),
    #[error("machines may not take items from container {0:?}")]
    InputDisabled(EntityId),
    #[error("container {container:?} failed: {source}")]
    Container {
        container: EntityId,
        source: ContainerError,
    },
    #[error("container {container:?} held {found} items where {expected} were located")]
    Shortfall {
        container: EntityId,
        expected: u32,
        found: u32,
    },
}

/// Identifies one slot of one pooled container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackHandle {
    container: usize,
    slot: usize,
}

impl StackHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A read-only view of one pooled stack.
#[derive(Debug, Clone, Copy)]
pub struct PooledStack<'p> {
    pub handle: StackHandle,
    pub container: EntityId,
    pub stack: &'p ItemStack,
}

/// Which items a requirement accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemMatch {
    /// Any quality of the item type.
    Type(ItemTypeId),
    /// Exactly this type and quality.
    Kind(ItemKind),
    /// Any item whose type carries the registry tag.
    Tag(String),
}

impl ItemMatch {
    pub fn matches(&self, stack: &ItemStack, registry: &ItemRegistry) -> bool {
        match self {
            ItemMatch::Type(item_type) => stack.item_type == *item_type,
            ItemMatch::Kind(kind) => stack.kind() == *kind,
            ItemMatch::Tag(tag) => registry.has_tag(stack.item_type, tag),
        }
    }
}

/// A counted ingredient requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub item: ItemMatch,
    pub count: u32,
}

impl Requirement {
    pub fn new(item: ItemMatch, count: u32) -> Self {
        Self { item, count }
    }

    pub fn item_type(item_type: ItemTypeId, count: u32) -> Self {
        Self::new(ItemMatch::Type(item_type), count)
    }
}

/// Items located for a requirement but not yet removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub parts: Vec<(StackHandle, u32)>,
    pub count: u32,
}

/// Position in the mutation journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JournalMark(usize);

#[derive(Debug, Clone)]
enum JournalEntry {
    Removed {
        container: usize,
        slot: usize,
        stack: ItemStack,
    },
    Inserted {
        container: usize,
        slot: usize,
        stack: ItemStack,
    },
}

#[derive(Debug)]
struct PoolEntry<'a> {
    id: EntityId,
    container: &'a mut dyn Container,
    failed: bool,
}

impl PoolEntry<'_> {
    fn preference(&self, pick: fn(ContainerOptions) -> StoragePreference) -> StoragePreference {
        if self.failed {
            StoragePreference::Disable
        } else {
            pick(self.container.options())
        }
    }
}

/// One network's containers as a single inventory.
#[derive(Debug)]
pub struct StoragePool<'a> {
    entries: Vec<PoolEntry<'a>>,
    registry: &'a ItemRegistry,
    default_max_stack: u32,
    journal: Vec<JournalEntry>,
    failures: Vec<(EntityId, ContainerError)>,
}

impl<'a> StoragePool<'a> {
    pub fn new(registry: &'a ItemRegistry, default_max_stack: u32) -> Self {
        Self {
            entries: Vec::new(),
            registry,
            default_max_stack: default_max_stack.max(1),
            journal: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Append a container. Registration order is the visiting order among
    /// containers with equal preference.
    pub fn add_container(&mut self, id: EntityId, container: &'a mut dyn Container) {
        self.entries.push(PoolEntry {
            id,
            container,
            failed: false,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn container_ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn registry(&self) -> &ItemRegistry {
        self.registry
    }

    pub fn max_stack(&self, item_type: ItemTypeId) -> u32 {
        self.registry
            .max_stack(item_type)
            .unwrap_or(self.default_max_stack)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Container indices in visiting order: `Prefer` first, then `Allow`,
    /// each in registration order. Disabled and failed containers are left out.
    fn visit_order(&self, pick: fn(ContainerOptions) -> StoragePreference) -> Vec<usize> {
        let mut preferred = Vec::new();
        let mut allowed = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            match entry.preference(pick) {
                StoragePreference::Prefer => preferred.push(index),
                StoragePreference::Allow => allowed.push(index),
                StoragePreference::Disable => {}
            }
        }
        preferred.extend(allowed);
        preferred
    }

    fn input_order(&self) -> Vec<usize> {
        self.visit_order(|o| o.take_items)
    }

    fn output_order(&self) -> Vec<usize> {
        self.visit_order(|o| o.store_items)
    }

    /// Every stack machines may take from, in visiting order.
    pub fn get_items(&self) -> impl Iterator<Item = PooledStack<'_>> + '_ {
        self.input_order().into_iter().flat_map(move |index| {
            let entry = &self.entries[index];
            (0..entry.container.slot_count()).filter_map(move |slot| {
                entry
                    .container
                    .slot(slot)
                    .filter(|s| s.quantity > 0)
                    .map(|stack| PooledStack {
                        handle: StackHandle {
                            container: index,
                            slot,
                        },
                        container: entry.id,
                        stack,
                    })
            })
        })
    }

    /// First takeable stack matching `pred`.
    pub fn find(&self, pred: impl Fn(&ItemStack) -> bool) -> Option<PooledStack<'_>> {
        self.get_items().find(|item| pred(item.stack))
    }

    /// Whether any container offers something to take.
    pub fn has_input(&self) -> bool {
        self.get_items().next().is_some()
    }

    /// Contents of every reachable container, regardless of preference.
    pub fn contents(&self) -> ItemCounts {
        let mut counts = ItemCounts::new();
        for entry in self.entries.iter().filter(|e| !e.failed) {
            for (kind, count) in entry.container.contents() {
                *counts.entry(kind).or_insert(0) += count;
            }
        }
        counts
    }

    /// Contents of every pooled container, failed ones included. Stable
    /// across a container failing, so it can be compared around an adapter
    /// call.
    pub(crate) fn fingerprint(&self) -> ItemCounts {
        let mut counts = ItemCounts::new();
        for entry in &self.entries {
            for (kind, count) in entry.container.contents() {
                *counts.entry(kind).or_insert(0) += count;
            }
        }
        counts
    }

    pub fn total_items(&self) -> u64 {
        self.contents().values().sum()
    }

    /// Items of `stack`'s kind the pool could still store.
    pub fn capacity_for(&self, stack: &ItemStack) -> u64 {
        let max_stack = self.max_stack(stack.item_type);
        self.output_order()
            .into_iter()
            .map(|i| self.entries[i].container.capacity_for(stack, max_stack))
            .sum()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Remove up to `count` items from the stack behind `handle`.
    pub fn take(&mut self, handle: StackHandle, count: u32) -> Result<ItemStack, StorageError> {
        let entry = self
            .entries
            .get_mut(handle.container)
            .ok_or(StorageError::InvalidHandle(handle))?;
        if entry.failed {
            return Err(StorageError::Unavailable(entry.id));
        }
        if !entry.container.options().take_items.is_enabled() {
            return Err(StorageError::InputDisabled(entry.id));
        }

        let id = entry.id;
        match entry.container.remove(handle.slot, count) {
            Ok(taken) => {
                if taken.quantity > 0 {
                    entry.container.on_taken(handle.slot, &taken);
                    self.journal.push(JournalEntry::Removed {
                        container: handle.container,
                        slot: handle.slot,
                        stack: taken.clone(),
                    });
                }
                Ok(taken)
            }
            Err(source) => {
                self.note_error(handle.container, source.clone());
                Err(StorageError::Container {
                    container: id,
                    source,
                })
            }
        }
    }

    /// Store `stack`, topping up existing stacks across the whole pool before
    /// starting new ones. Returns the number of items that did not fit.
    pub fn insert(&mut self, stack: &ItemStack) -> u32 {
        if stack.quantity == 0 {
            return 0;
        }
        let max_stack = self.max_stack(stack.item_type);
        let order = self.output_order();
        let mut remaining = stack.quantity;
        for merge in [true, false] {
            for &index in &order {
                if remaining == 0 {
                    return 0;
                }
                remaining = self.insert_phase(index, stack, remaining, max_stack, merge);
            }
        }
        remaining
    }

    fn insert_phase(
        &mut self,
        index: usize,
        stack: &ItemStack,
        mut remaining: u32,
        max_stack: u32,
        merge: bool,
    ) -> u32 {
        let mut failure = None;
        let entry = &mut self.entries[index];
        if entry.failed {
            return remaining;
        }
        for slot in 0..entry.container.slot_count() {
            if remaining == 0 {
                break;
            }
            let eligible = match entry.container.slot(slot) {
                Some(existing) if existing.quantity > 0 => merge && existing.can_stack_with(stack),
                _ => !merge,
            };
            if !eligible {
                continue;
            }
            match entry
                .container
                .insert_into(slot, &stack.with_quantity(remaining), max_stack)
            {
                Ok(left) => {
                    let added = remaining.saturating_sub(left);
                    if added > 0 {
                        self.journal.push(JournalEntry::Inserted {
                            container: index,
                            slot,
                            stack: stack.with_quantity(added),
                        });
                    }
                    remaining = left.min(remaining);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            self.note_error(index, e);
        }
        remaining
    }

    fn note_error(&mut self, index: usize, err: ContainerError) {
        let entry = &mut self.entries[index];
        if matches!(err, ContainerError::Unavailable(_)) {
            entry.failed = true;
            warn!(
                container = ?entry.id,
                name = entry.container.name(),
                error = %err,
                "container unavailable, skipping it for the rest of the tick"
            );
        } else {
            warn!(container = ?entry.id, error = %err, "container operation failed");
        }
        self.failures.push((entry.id, err));
    }

    // -----------------------------------------------------------------------
    // Ingredients
    // -----------------------------------------------------------------------

    fn plan(
        &self,
        pred: impl Fn(&ItemStack) -> bool,
        count: u32,
        reserved: &BTreeMap<StackHandle, u32>,
    ) -> Option<Ingredient> {
        if count == 0 {
            return Some(Ingredient {
                parts: Vec::new(),
                count: 0,
            });
        }
        let mut parts = Vec::new();
        let mut needed = count;
        for item in self.get_items().filter(|item| pred(item.stack)) {
            let already = reserved.get(&item.handle).copied().unwrap_or(0);
            let free = item.stack.quantity.saturating_sub(already);
            if free == 0 {
                continue;
            }
            let used = free.min(needed);
            parts.push((item.handle, used));
            needed -= used;
            if needed == 0 {
                return Some(Ingredient { parts, count });
            }
        }
        None
    }

    /// Locate `count` items matching `pred` without removing anything.
    pub fn try_get_ingredient(
        &self,
        pred: impl Fn(&ItemStack) -> bool,
        count: u32,
    ) -> Option<Ingredient> {
        self.plan(pred, count, &BTreeMap::new())
    }

    /// Remove a located ingredient. All or nothing.
    pub fn take_ingredient(
        &mut self,
        ingredient: &Ingredient,
    ) -> Result<Vec<ItemStack>, StorageError> {
        let mark = self.journal_mark();
        let mut taken = Vec::with_capacity(ingredient.parts.len());
        for &(handle, count) in &ingredient.parts {
            match self.take(handle, count) {
                Ok(stack) if stack.quantity == count => taken.push(stack),
                Ok(stack) => {
                    self.rollback_to(mark);
                    return Err(StorageError::Shortfall {
                        container: self.entries[handle.container].id,
                        expected: count,
                        found: stack.quantity,
                    });
                }
                Err(e) => {
                    self.rollback_to(mark);
                    return Err(e);
                }
            }
        }
        Ok(taken)
    }

    /// Consume every requirement or nothing. Returns `Ok(None)` when the pool
    /// cannot satisfy all of them.
    pub fn try_consume(
        &mut self,
        requirements: &[Requirement],
    ) -> Result<Option<Vec<ItemStack>>, StorageError> {
        let mut reserved: BTreeMap<StackHandle, u32> = BTreeMap::new();
        let mut plans = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let registry = self.registry;
            let Some(plan) = self.plan(
                |stack| requirement.item.matches(stack, registry),
                requirement.count,
                &reserved,
            ) else {
                return Ok(None);
            };
            for &(handle, count) in &plan.parts {
                *reserved.entry(handle).or_insert(0) += count;
            }
            plans.push(plan);
        }

        let mark = self.journal_mark();
        let mut consumed = Vec::new();
        for plan in &plans {
            match self.take_ingredient(plan) {
                Ok(stacks) => consumed.extend(stacks),
                Err(e) => {
                    self.rollback_to(mark);
                    return Err(e);
                }
            }
        }
        Ok(Some(consumed))
    }

    // -----------------------------------------------------------------------
    // Journal
    // -----------------------------------------------------------------------

    pub(crate) fn journal_mark(&self) -> JournalMark {
        JournalMark(self.journal.len())
    }

    pub(crate) fn changed_since(&self, mark: JournalMark) -> bool {
        self.journal.len() > mark.0
    }

    /// Forget journaled changes. They can no longer be rolled back.
    pub(crate) fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo every change made after `mark`, newest first.
    pub(crate) fn rollback_to(&mut self, mark: JournalMark) {
        while self.journal.len() > mark.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Removed {
                    container,
                    slot,
                    stack,
                } => self.restore(container, slot, stack),
                JournalEntry::Inserted {
                    container,
                    slot,
                    stack,
                } => self.retract(container, slot, stack),
            }
        }
    }

    fn restore(&mut self, index: usize, slot: usize, stack: ItemStack) {
        let max_stack = self.max_stack(stack.item_type);
        let target = &mut self.entries[index];
        let leftover = target
            .container
            .insert_into(slot, &stack, max_stack)
            .unwrap_or(stack.quantity);
        let leftover = if leftover > 0 {
            target
                .container
                .insert(&stack.with_quantity(leftover), max_stack)
                .unwrap_or(leftover)
        } else {
            0
        };
        if leftover > 0 {
            error!(
                container = ?target.id,
                item = ?stack.kind(),
                lost = leftover,
                "could not restore items during rollback"
            );
        }
    }

    fn retract(&mut self, index: usize, slot: usize, stack: ItemStack) {
        let target = &mut self.entries[index];
        match target.container.remove(slot, stack.quantity) {
            Ok(removed) if removed.quantity == stack.quantity => {}
            Ok(removed) => error!(
                container = ?target.id,
                expected = stack.quantity,
                removed = removed.quantity,
                "partial retract during rollback"
            ),
            Err(e) => error!(container = ?target.id, error = %e, "could not retract inserted items"),
        }
    }

    /// Bring the pool's [`fingerprint`](Self::fingerprint) back to `target`
    /// where the journal cannot account for a change. Missing items go into
    /// the first working containers with room, whatever their store
    /// preference; surplus items leave the last slots holding them. Returns
    /// whether the fingerprint now matches.
    pub(crate) fn reconcile(&mut self, target: &ItemCounts) -> bool {
        let current = self.fingerprint();
        for (kind, &want) in target {
            let have = current.get(kind).copied().unwrap_or(0);
            if have < want {
                self.restore_missing(*kind, want - have);
            }
        }
        for (kind, &have) in &current {
            let want = target.get(kind).copied().unwrap_or(0);
            if have > want {
                self.remove_surplus(*kind, have - want);
            }
        }
        self.fingerprint() == *target
    }

    fn restore_missing(&mut self, kind: ItemKind, mut missing: u64) {
        let max_stack = self.max_stack(kind.item_type);
        for entry in self.entries.iter_mut().filter(|e| !e.failed) {
            while missing > 0 {
                let chunk = missing.min(u32::MAX as u64) as u32;
                let stack = ItemStack::new(kind.item_type, chunk).with_quality(kind.quality);
                let left = entry.container.insert(&stack, max_stack).unwrap_or(chunk);
                missing -= (chunk - left) as u64;
                if left > 0 {
                    break;
                }
            }
        }
        if missing > 0 {
            error!(item = ?kind, lost = missing, "could not restore items to the pool");
        }
    }

    fn remove_surplus(&mut self, kind: ItemKind, mut surplus: u64) {
        for entry in self.entries.iter_mut().rev().filter(|e| !e.failed) {
            for slot in (0..entry.container.slot_count()).rev() {
                if surplus == 0 {
                    return;
                }
                let held = entry
                    .container
                    .slot(slot)
                    .filter(|s| s.kind() == kind)
                    .map_or(0, |s| s.quantity);
                if held == 0 {
                    continue;
                }
                let count = (held as u64).min(surplus) as u32;
                match entry.container.remove(slot, count) {
                    Ok(removed) => surplus = surplus.saturating_sub(removed.quantity as u64),
                    Err(e) => warn!(container = ?entry.id, error = %e, "could not remove surplus items"),
                }
            }
        }
        if surplus > 0 {
            error!(item = ?kind, extra = surplus, "could not remove surplus items from the pool");
        }
    }

    /// Container failures seen since the last call.
    pub fn take_failures(&mut self) -> Vec<(EntityId, ContainerError)> {
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Chest, ContainerOptions};
    use crate::registry::ItemRegistryBuilder;
    use slotmap::SlotMap;

    const STONE: ItemTypeId = ItemTypeId(0);
    const WOOD: ItemTypeId = ItemTypeId(1);
    const GEM: ItemTypeId = ItemTypeId(2);

    fn registry() -> ItemRegistry {
        let mut b = ItemRegistryBuilder::new();
        b.register_item("stone", 999);
        b.register_item("wood", 50);
        b.register_item_with_tags("gem", 999, &["shippable"]);
        b.build().unwrap()
    }

    fn ids(n: usize) -> Vec<EntityId> {
        let mut keys: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..n).map(|_| keys.insert(())).collect()
    }

    fn chest_with(name: &str, capacity: usize, stacks: &[ItemStack]) -> Chest {
        let mut chest = Chest::new(name, capacity);
        for (i, s) in stacks.iter().enumerate() {
            chest.set_slot(i, Some(s.clone())).unwrap();
        }
        chest
    }

    #[test]
    fn get_items_visits_in_registration_order() {
        let reg = registry();
        let id = ids(2);
        let mut a = chest_with("a", 2, &[ItemStack::new(STONE, 1)]);
        let mut b = chest_with("b", 2, &[ItemStack::new(WOOD, 2)]);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);
        pool.add_container(id[1], &mut b);

        let seen: Vec<_> = pool.get_items().map(|i| (i.container, i.stack.item_type)).collect();
        assert_eq!(seen, vec![(id[0], STONE), (id[1], WOOD)]);
    }

    #[test]
    fn preferred_containers_come_first() {
        let reg = registry();
        let id = ids(2);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 1)]);
        let mut b = chest_with("b", 1, &[ItemStack::new(WOOD, 1)]).with_options(ContainerOptions {
            take_items: StoragePreference::Prefer,
            ..ContainerOptions::default()
        });
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);
        pool.add_container(id[1], &mut b);

        assert_eq!(pool.get_items().next().map(|i| i.container), Some(id[1]));
    }

    #[test]
    fn disabled_input_is_hidden_and_rejected() {
        let reg = registry();
        let id = ids(1);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 3)])
            .with_options(ContainerOptions::output_only());
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);

        assert!(!pool.has_input());
        let handle = StackHandle {
            container: 0,
            slot: 0,
        };
        assert_eq!(pool.take(handle, 1), Err(StorageError::InputDisabled(id[0])));
        // Still counted as pool contents.
        assert_eq!(pool.total_items(), 3);
    }

    #[test]
    fn insert_merges_across_pool_before_filling_empty_slots() {
        let reg = registry();
        let id = ids(2);
        let mut a = Chest::new("a", 2);
        let mut b = chest_with("b", 2, &[ItemStack::new(STONE, 10)]);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);
        pool.add_container(id[1], &mut b);

        assert_eq!(pool.insert(&ItemStack::new(STONE, 5)), 0);
        drop(pool);

        assert_eq!(a.total_items(), 0);
        assert_eq!(b.slot(0).map(|s| s.quantity), Some(15));
    }

    #[test]
    fn insert_respects_registry_max_stack() {
        let reg = registry();
        let id = ids(1);
        let mut a = Chest::new("a", 2);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);

        assert_eq!(pool.capacity_for(&ItemStack::new(WOOD, 1)), 100);
        assert_eq!(pool.insert(&ItemStack::new(WOOD, 130)), 30);
        assert_eq!(pool.total_items(), 100);
    }

    #[test]
    fn try_consume_is_all_or_nothing() {
        let reg = registry();
        let id = ids(1);
        let mut a = chest_with(
            "a",
            2,
            &[ItemStack::new(STONE, 5), ItemStack::new(WOOD, 1)],
        );
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);

        let reqs = [Requirement::item_type(STONE, 2), Requirement::item_type(WOOD, 2)];
        assert_eq!(pool.try_consume(&reqs), Ok(None));
        assert_eq!(pool.total_items(), 6);

        let reqs = [Requirement::item_type(STONE, 2), Requirement::item_type(WOOD, 1)];
        let consumed = pool.try_consume(&reqs).unwrap().unwrap();
        assert_eq!(consumed.iter().map(|s| s.quantity).sum::<u32>(), 3);
        assert_eq!(pool.total_items(), 3);
    }

    #[test]
    fn try_consume_reserves_shared_stacks() {
        let reg = registry();
        let id = ids(1);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 3)]);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);

        let reqs = [Requirement::item_type(STONE, 2), Requirement::item_type(STONE, 2)];
        assert_eq!(pool.try_consume(&reqs), Ok(None));
        assert_eq!(pool.total_items(), 3);
    }

    #[test]
    fn ingredient_spans_multiple_stacks() {
        let reg = registry();
        let id = ids(2);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 2)]);
        let mut b = chest_with("b", 1, &[ItemStack::new(STONE, 2)]);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);
        pool.add_container(id[1], &mut b);

        let ingredient = pool.try_get_ingredient(|s| s.item_type == STONE, 3).unwrap();
        assert_eq!(ingredient.parts.len(), 2);
        assert_eq!(pool.total_items(), 4);

        pool.take_ingredient(&ingredient).unwrap();
        assert_eq!(pool.total_items(), 1);
        assert!(pool.try_get_ingredient(|s| s.item_type == STONE, 2).is_none());
    }

    #[test]
    fn tag_match_uses_registry() {
        let reg = registry();
        let id = ids(1);
        let mut a = chest_with("a", 2, &[ItemStack::new(STONE, 1), ItemStack::new(GEM, 1)]);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);

        let reqs = [Requirement::new(ItemMatch::Tag("shippable".into()), 1)];
        let consumed = pool.try_consume(&reqs).unwrap().unwrap();
        assert_eq!(consumed[0].item_type, GEM);
    }

    #[test]
    fn rollback_restores_removed_and_inserted_items() {
        let reg = registry();
        let id = ids(1);
        let mut a = chest_with("a", 2, &[ItemStack::new(STONE, 5)]);
        let before;
        {
            let mut pool = StoragePool::new(&reg, 999);
            pool.add_container(id[0], &mut a);
            before = pool.contents();

            let mark = pool.journal_mark();
            let handle = pool.get_items().next().unwrap().handle;
            pool.take(handle, 5).unwrap();
            pool.insert(&ItemStack::new(WOOD, 7));
            assert!(pool.changed_since(mark));

            pool.rollback_to(mark);
            assert!(!pool.changed_since(mark));
            assert_eq!(pool.contents(), before);
        }
        assert_eq!(a.slot(0).map(|s| s.quantity), Some(5));
        assert_eq!(a.slot(1), None);
    }

    /// A chest that records every removal reported through its hook.
    #[derive(Debug)]
    struct LoggedChest {
        inner: Chest,
        taken: Vec<(usize, ItemStack)>,
    }

    impl Container for LoggedChest {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn slot_count(&self) -> usize {
            self.inner.slot_count()
        }

        fn slot(&self, index: usize) -> Option<&ItemStack> {
            self.inner.slot(index)
        }

        fn insert_into(
            &mut self,
            slot: usize,
            stack: &ItemStack,
            max_stack: u32,
        ) -> Result<u32, ContainerError> {
            self.inner.insert_into(slot, stack, max_stack)
        }

        fn remove(&mut self, slot: usize, count: u32) -> Result<ItemStack, ContainerError> {
            self.inner.remove(slot, count)
        }

        fn on_taken(&mut self, slot: usize, taken: &ItemStack) {
            self.taken.push((slot, taken.clone()));
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn take_runs_the_owner_removal_hook() {
        let reg = registry();
        let id = ids(1);
        let mut logged = LoggedChest {
            inner: chest_with("a", 2, &[ItemStack::new(STONE, 5), ItemStack::new(WOOD, 3)]),
            taken: Vec::new(),
        };
        {
            let mut pool = StoragePool::new(&reg, 999);
            pool.add_container(id[0], &mut logged);
            let wood = pool.find(|s| s.item_type == WOOD).unwrap().handle;
            pool.take(wood, 2).unwrap();
            pool.insert(&ItemStack::new(STONE, 1));
            let mark = pool.journal_mark();
            let stone = pool.find(|s| s.item_type == STONE).unwrap().handle;
            pool.take(stone, 6).unwrap();
            pool.rollback_to(mark);
        }
        assert_eq!(
            logged.taken,
            vec![(1, ItemStack::new(WOOD, 2)), (0, ItemStack::new(STONE, 6))]
        );
        assert_eq!(logged.inner.slot(0), Some(&ItemStack::new(STONE, 6)));
    }

    #[test]
    fn reconcile_restores_changes_the_journal_lost() {
        let reg = registry();
        let id = ids(2);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 5)]);
        let mut b = Chest::new("b", 1);
        {
            let mut pool = StoragePool::new(&reg, 999);
            pool.add_container(id[0], &mut a);
            pool.add_container(id[1], &mut b);
            let before = pool.contents();

            let handle = pool.get_items().next().unwrap().handle;
            pool.take(handle, 4).unwrap();
            pool.insert(&ItemStack::new(GEM, 2));
            pool.commit();
            assert!(!pool.changed_since(pool.journal_mark()));

            assert!(pool.reconcile(&before));
            assert_eq!(pool.contents(), before);
        }
        assert_eq!(a.slot(0), Some(&ItemStack::new(STONE, 5)));
        assert_eq!(b.slot(0), None);
    }

    #[test]
    fn bad_slot_is_reported_without_failing_the_container() {
        let reg = registry();
        let id = ids(2);
        let mut a = chest_with("a", 1, &[ItemStack::new(STONE, 1)]);
        let mut b = Chest::new("b", 1);
        let mut pool = StoragePool::new(&reg, 999);
        pool.add_container(id[0], &mut a);
        pool.add_container(id[1], &mut b);

        let handle = pool.get_items().next().unwrap().handle;
        let bad = StackHandle {
            container: handle.container,
            slot: 9,
        };
        assert!(matches!(pool.take(bad, 1), Err(StorageError::Container { .. })));
        assert!(pool.has_input());

        let failures = pool.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, id[0]);
        assert!(pool.take_failures().is_empty());
    }
}
