use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed entity (machine, container or connector) in the world.
    pub struct EntityId;
}

/// Identifies an item type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies an automation network inside one location.
///
/// Ids are assigned in discovery order when a location is rebuilt, so they
/// are only stable until the next topology change in that location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn item_type_id_equality() {
        assert_eq!(ItemTypeId(3), ItemTypeId(3));
        assert_ne!(ItemTypeId(3), ItemTypeId(4));
    }

    #[test]
    fn entity_ids_are_ordered_by_insertion() {
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert!(a < b);
    }

    #[test]
    fn network_ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(NetworkId(0), "cellar");
        map.insert(NetworkId(1), "barn");
        assert_eq!(map[&NetworkId(1)], "barn");
    }
}
