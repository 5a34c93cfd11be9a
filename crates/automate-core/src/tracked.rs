//! Live handles to removable item stacks.
//!
//! A [`TrackedStack`] borrows the [`StackSource`] that owns the items, so the
//! only way to remove them is through the owner's
//! [`take_from`](StackSource::take_from). That method is the owner's removal
//! hook: adapters clear their output slot, grant rewards, or update visuals
//! there.

use crate::item::{ItemKind, ItemStack};
use std::fmt;

/// Errors from removing items through a tracked stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("slot {0} holds nothing to take")]
    NothingToTake(usize),
    #[error("stack owner is unavailable: {0}")]
    Unavailable(String),
}

/// Something that owns item stacks in numbered slots.
pub trait StackSource {
    /// The stack currently in `slot`, if any.
    fn peek(&self, slot: usize) -> Option<&ItemStack>;

    /// Remove up to `count` items from `slot` and return them.
    ///
    /// Implementations perform their bookkeeping here; callers never mutate
    /// the stack any other way.
    fn take_from(&mut self, slot: usize, count: u32) -> Result<ItemStack, StackError>;

    /// Return items to `slot` that a caller received but could not keep.
    /// Hands back whatever the source would not take; the default refuses.
    fn give_back(&mut self, slot: usize, stack: ItemStack) -> Option<ItemStack> {
        let _ = slot;
        Some(stack)
    }
}

/// A live, removable reference to the items in one slot of a [`StackSource`].
pub struct TrackedStack<'a> {
    source: &'a mut dyn StackSource,
    slot: usize,
}

impl<'a> TrackedStack<'a> {
    pub fn new(source: &'a mut dyn StackSource, slot: usize) -> Self {
        Self { source, slot }
    }

    /// The stack as it currently sits in its owner.
    pub fn stack(&self) -> Option<&ItemStack> {
        self.source.peek(self.slot).filter(|s| s.quantity > 0)
    }

    /// Item kind of the tracked stack.
    pub fn sample(&self) -> Option<ItemKind> {
        self.stack().map(ItemStack::kind)
    }

    /// Items currently available.
    pub fn count(&self) -> u32 {
        self.stack().map(|s| s.quantity).unwrap_or(0)
    }

    /// Remove up to `count` items through the owner's removal hook.
    pub fn take(&mut self, count: u32) -> Result<ItemStack, StackError> {
        let available = self.count();
        let to_take = count.min(available);
        if to_take == 0 {
            return Err(StackError::NothingToTake(self.slot));
        }
        self.source.take_from(self.slot, to_take)
    }

    /// Remove everything.
    pub fn take_all(&mut self) -> Result<ItemStack, StackError> {
        self.take(self.count())
    }

    /// Return surplus items to the owner. See [`StackSource::give_back`].
    pub fn give_back(&mut self, stack: ItemStack) -> Option<ItemStack> {
        if stack.quantity == 0 {
            return None;
        }
        self.source.give_back(self.slot, stack)
    }
}

impl fmt::Debug for TrackedStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedStack")
            .field("slot", &self.slot)
            .field("stack", &self.stack())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OutputSlot
// ---------------------------------------------------------------------------

/// Hook invoked with the removed items whenever an [`OutputSlot`] is reduced.
pub type TakenHook = Box<dyn FnMut(&ItemStack)>;

/// A single-slot stack owner for machine adapters.
///
/// Holds at most one pending output stack. Taking from it reduces the stack,
/// clears the slot once empty, and reports the removed items to the hook.
#[derive(Default)]
pub struct OutputSlot {
    stack: Option<ItemStack>,
    on_taken: Option<TakenHook>,
}

impl OutputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl FnMut(&ItemStack) + 'static) -> Self {
        Self {
            stack: None,
            on_taken: Some(Box::new(hook)),
        }
    }

    /// Replace the pending output.
    pub fn set(&mut self, stack: ItemStack) {
        self.stack = (stack.quantity > 0).then_some(stack);
    }

    pub fn get(&self) -> Option<&ItemStack> {
        self.stack.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_none()
    }

    /// Drop the pending output without reporting it.
    pub fn clear(&mut self) {
        self.stack = None;
    }

    /// A tracked handle to the pending output, or `None` once collected.
    pub fn tracked(&mut self) -> Option<TrackedStack<'_>> {
        if self.stack.is_none() {
            return None;
        }
        Some(TrackedStack::new(self, 0))
    }
}

impl StackSource for OutputSlot {
    fn peek(&self, slot: usize) -> Option<&ItemStack> {
        if slot == 0 { self.stack.as_ref() } else { None }
    }

    fn take_from(&mut self, slot: usize, count: u32) -> Result<ItemStack, StackError> {
        let stack = match self.stack.as_mut() {
            Some(stack) if slot == 0 && stack.quantity > 0 => stack,
            _ => return Err(StackError::NothingToTake(slot)),
        };

        let to_take = count.min(stack.quantity);
        stack.quantity -= to_take;
        let taken = stack.with_quantity(to_take);
        if stack.quantity == 0 {
            self.stack = None;
        }

        if let Some(hook) = self.on_taken.as_mut() {
            hook(&taken);
        }
        Ok(taken)
    }

    fn give_back(&mut self, slot: usize, stack: ItemStack) -> Option<ItemStack> {
        if slot != 0 {
            return Some(stack);
        }
        if let Some(held) = self.stack.as_mut() {
            if !held.can_stack_with(&stack) {
                return Some(stack);
            }
            held.quantity = held.quantity.saturating_add(stack.quantity);
        } else {
            self.stack = Some(stack);
        }
        None
    }
}

impl fmt::Debug for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSlot")
            .field("stack", &self.stack)
            .field("on_taken", &self.on_taken.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
