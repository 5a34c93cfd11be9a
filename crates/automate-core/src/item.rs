use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The identity of an item for stacking purposes: two stacks merge only when
/// their kinds are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKind {
    pub item_type: ItemTypeId,
    pub quality: u8,
}

impl ItemKind {
    pub fn new(item_type: ItemTypeId) -> Self {
        Self {
            item_type,
            quality: 0,
        }
    }
}

/// A stack of fungible items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    /// Quality tier. Stacks of different quality never merge.
    #[serde(default)]
    pub quality: u8,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quality: 0,
            quantity,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn kind(&self) -> ItemKind {
        ItemKind {
            item_type: self.item_type,
            quality: self.quality,
        }
    }

    /// Whether items from `other` can be merged into this stack.
    pub fn can_stack_with(&self, other: &ItemStack) -> bool {
        self.kind() == other.kind()
    }

    /// A copy of this stack with a different quantity.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }
}

/// Item multiset keyed by kind. Used to compare inventory contents before and
/// after an operation without caring which slot holds what.
pub type ItemCounts = BTreeMap<ItemKind, u64>;

/// Fold stacks into an [`ItemCounts`] multiset. Empty stacks are skipped.
pub fn count_items<'a>(stacks: impl IntoIterator<Item = &'a ItemStack>) -> ItemCounts {
    let mut counts = ItemCounts::new();
    for stack in stacks {
        if stack.quantity > 0 {
            *counts.entry(stack.kind()).or_insert(0) += stack.quantity as u64;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_merge_only_with_same_quality() {
        let plain = ItemStack::new(ItemTypeId(0), 5);
        let gold = ItemStack::new(ItemTypeId(0), 5).with_quality(2);
        let other = ItemStack::new(ItemTypeId(1), 5);

        assert!(plain.can_stack_with(&plain.with_quantity(1)));
        assert!(!plain.can_stack_with(&gold));
        assert!(!plain.can_stack_with(&other));
    }

    #[test]
    fn count_items_folds_by_kind() {
        let stacks = [
            ItemStack::new(ItemTypeId(0), 3),
            ItemStack::new(ItemTypeId(1), 4),
            ItemStack::new(ItemTypeId(0), 2),
            ItemStack::new(ItemTypeId(0), 1).with_quality(1),
            ItemStack::new(ItemTypeId(2), 0),
        ];
        let counts = count_items(&stacks);

        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&ItemKind::new(ItemTypeId(0))], 5);
        assert_eq!(counts[&ItemKind::new(ItemTypeId(1))], 4);
        assert_eq!(
            counts[&ItemKind {
                item_type: ItemTypeId(0),
                quality: 1
            }],
            1
        );
    }
}
