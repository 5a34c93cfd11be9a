use crate::id::ItemTypeId;
use std::collections::{BTreeSet, HashMap};

/// Max stack size used for items the registry does not know.
pub const DEFAULT_MAX_STACK: u32 = 999;

/// An item type definition in the registry.
#[derive(Debug, Clone)]
pub struct ItemTypeDef {
    pub name: String,
    /// Largest quantity a single container slot may hold.
    pub max_stack: u32,
    /// Free-form tags adapters use to decide what they accept
    /// (for example `"shippable"` or `"fuel"`).
    pub tags: BTreeSet<String>,
}

/// Builder for constructing an immutable [`ItemRegistry`].
/// Two-phase lifecycle: registration/mutation -> finalization.
#[derive(Debug)]
pub struct ItemRegistryBuilder {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
}

impl Default for ItemRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemRegistryBuilder {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            item_name_to_id: HashMap::new(),
        }
    }

    /// Register an item type. Returns its ID.
    pub fn register_item(&mut self, name: &str, max_stack: u32) -> ItemTypeId {
        self.register_item_with_tags(name, max_stack, &[])
    }

    /// Register an item type carrying the given tags. Returns its ID.
    pub fn register_item_with_tags(
        &mut self,
        name: &str,
        max_stack: u32,
        tags: &[&str],
    ) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemTypeDef {
            name: name.to_string(),
            max_stack: max_stack.max(1),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Mutate an existing item by name.
    pub fn mutate_item<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ItemTypeDef),
    {
        let id = self
            .item_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.items[id.0 as usize]);
        Ok(())
    }

    /// Lookup item type ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<ItemRegistry, RegistryError> {
        if self.item_name_to_id.len() != self.items.len() {
            let mut seen = BTreeSet::new();
            for item in &self.items {
                if !seen.insert(item.name.as_str()) {
                    return Err(RegistryError::DuplicateName(item.name.clone()));
                }
            }
        }
        for item in &self.items {
            if item.max_stack == 0 {
                return Err(RegistryError::InvalidMaxStack(item.name.clone()));
            }
        }

        Ok(ItemRegistry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
        })
    }
}

/// Immutable registry of item types. Frozen after build().
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
}

impl ItemRegistry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemTypeDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn max_stack(&self, id: ItemTypeId) -> Option<u32> {
        self.get_item(id).map(|item| item.max_stack)
    }

    pub fn has_tag(&self, id: ItemTypeId, tag: &str) -> bool {
        self.get_item(id)
            .map(|item| item.tags.contains(tag))
            .unwrap_or(false)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate item name: {0}")]
    DuplicateName(String),
    #[error("item '{0}' has a max stack size of zero")]
    InvalidMaxStack(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_builder() -> ItemRegistryBuilder {
        let mut b = ItemRegistryBuilder::new();
        b.register_item_with_tags("parsnip", 999, &["shippable"]);
        b.register_item("copper_pan", 1);
        b
    }

    #[test]
    fn register_and_build() {
        let reg = setup_builder().build().unwrap();
        assert_eq!(reg.item_count(), 2);
        let parsnip = reg.item_id("parsnip").unwrap();
        assert_eq!(reg.max_stack(parsnip), Some(999));
        assert!(reg.has_tag(parsnip, "shippable"));
        assert!(!reg.has_tag(parsnip, "fuel"));
    }

    #[test]
    fn unknown_item_lookups() {
        let reg = setup_builder().build().unwrap();
        assert!(reg.item_id("nonexistent").is_none());
        assert_eq!(reg.max_stack(ItemTypeId(99)), None);
        assert!(!reg.has_tag(ItemTypeId(99), "shippable"));
    }

    #[test]
    fn mutate_item_by_name() {
        let mut b = setup_builder();
        b.mutate_item("copper_pan", |item| item.max_stack = 5).unwrap();
        let reg = b.build().unwrap();
        let pan = reg.item_id("copper_pan").unwrap();
        assert_eq!(reg.max_stack(pan), Some(5));
    }

    #[test]
    fn mutate_missing_item_errors() {
        let mut b = setup_builder();
        let result = b.mutate_item("missing", |_| {});
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn zero_max_stack_rejected_on_build() {
        let mut b = setup_builder();
        b.mutate_item("parsnip", |item| item.max_stack = 0).unwrap();
        assert!(matches!(b.build(), Err(RegistryError::InvalidMaxStack(_))));
    }

    #[test]
    fn duplicate_names_rejected_on_build() {
        let mut b = setup_builder();
        b.register_item("parsnip", 10);
        assert!(matches!(b.build(), Err(RegistryError::DuplicateName(_))));
    }
}
