//! Tile grid types and the per-location tile index.
//!
//! The index maps tile positions to the entity occupying them, supporting
//! multi-tile footprints, 4-directional adjacency and area queries. Positions
//! order row-major (`y`, then `x`) so every iteration over the index visits
//! tiles top-to-bottom, left-to-right.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A tile coordinate within a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile one step in the given direction.
    pub fn step(&self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Ord for TilePos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for TilePos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The rectangle of tiles an entity occupies. Origin is the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileArea {
    pub origin: TilePos,
    pub width: u32,
    pub height: u32,
}

impl TileArea {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            origin: TilePos::new(x, y),
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// A 1x1 footprint.
    pub fn single(pos: TilePos) -> Self {
        Self {
            origin: pos,
            width: 1,
            height: 1,
        }
    }

    pub fn left(&self) -> i32 {
        self.origin.x
    }

    pub fn top(&self) -> i32 {
        self.origin.y
    }

    /// Rightmost occupied column (inclusive). Clamped at the grid edge.
    pub fn right(&self) -> i32 {
        self.origin
            .x
            .saturating_add_unsigned(self.width.saturating_sub(1))
    }

    /// Bottom occupied row (inclusive). Clamped at the grid edge.
    pub fn bottom(&self) -> i32 {
        self.origin
            .y
            .saturating_add_unsigned(self.height.saturating_sub(1))
    }

    /// Bottom-right tile (inclusive).
    pub fn max(&self) -> TilePos {
        TilePos::new(self.right(), self.bottom())
    }

    pub fn tile_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Iterate over all tiles in row-major order, stopping at the grid edge.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> {
        let (left, top) = (self.left(), self.top());
        let (right, bottom) = (self.right(), self.bottom());
        (top..=bottom).flat_map(move |y| (left..=right).map(move |x| TilePos::new(x, y)))
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.left() && pos.x <= self.right() && pos.y >= self.top() && pos.y <= self.bottom()
    }

    pub fn intersects(&self, other: &TileArea) -> bool {
        self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }

    /// Grow the rectangle by `radius` tiles on every side, saturating at the
    /// grid edge.
    pub fn expanded(&self, radius: u32) -> TileArea {
        let left = self.left().saturating_sub_unsigned(radius);
        let top = self.top().saturating_sub_unsigned(radius);
        let right = self.right().saturating_add_unsigned(radius);
        let bottom = self.bottom().saturating_add_unsigned(radius);
        TileArea {
            origin: TilePos::new(left, top),
            width: right.abs_diff(left).saturating_add(1),
            height: bottom.abs_diff(top).saturating_add(1),
        }
    }

    /// Per-axis tile gap to another area: 0 when the ranges overlap on that
    /// axis, 1 when they sit side by side, and so on.
    fn axis_gaps(&self, other: &TileArea) -> (u32, u32) {
        fn gap(a_lo: i32, a_hi: i32, b_lo: i32, b_hi: i32) -> u32 {
            if b_lo > a_hi {
                b_lo.abs_diff(a_hi)
            } else if a_lo > b_hi {
                a_lo.abs_diff(b_hi)
            } else {
                0
            }
        }
        (
            gap(self.left(), self.right(), other.left(), other.right()),
            gap(self.top(), self.bottom(), other.top(), other.bottom()),
        )
    }

    /// Chebyshev distance between the closest tiles of two areas.
    pub fn chebyshev_gap(&self, other: &TileArea) -> u32 {
        let (dx, dy) = self.axis_gaps(other);
        dx.max(dy)
    }

    /// Whether two areas share an edge (4-directional adjacency, no corners).
    pub fn touches(&self, other: &TileArea) -> bool {
        matches!(self.axis_gaps(other), (1, 0) | (0, 1))
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// Errors from tile index operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileIndexError {
    #[error("tile {tile} is already occupied by {occupant:?}")]
    Occupied { tile: TilePos, occupant: EntityId },
    #[error("entity is not registered in the tile index")]
    NotRegistered,
    #[error("entity is already registered in the tile index")]
    AlreadyRegistered,
}

// ---------------------------------------------------------------------------
// TileIndex
// ---------------------------------------------------------------------------

/// Maps the tiles of one location to the entities occupying them.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: position -> entity
/// - `areas`: entity -> footprint
#[derive(Debug, Default, Clone)]
pub struct TileIndex {
    tiles: BTreeMap<TilePos, EntityId>,
    areas: SecondaryMap<EntityId, TileArea>,
}

impl TileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration --

    /// Register an entity over every tile of its footprint.
    ///
    /// Registration is all-or-nothing: if any tile is already taken the index
    /// is left unchanged and the existing occupant keeps the tile.
    pub fn register(&mut self, entity: EntityId, area: TileArea) -> Result<(), TileIndexError> {
        if self.areas.contains_key(entity) {
            return Err(TileIndexError::AlreadyRegistered);
        }

        for tile in area.tiles() {
            if let Some(&occupant) = self.tiles.get(&tile) {
                return Err(TileIndexError::Occupied { tile, occupant });
            }
        }

        for tile in area.tiles() {
            self.tiles.insert(tile, entity);
        }
        self.areas.insert(entity, area);

        Ok(())
    }

    /// Remove an entity from the index. Returns its footprint.
    pub fn unregister(&mut self, entity: EntityId) -> Result<TileArea, TileIndexError> {
        let area = self
            .areas
            .remove(entity)
            .ok_or(TileIndexError::NotRegistered)?;

        for tile in area.tiles() {
            if self.tiles.get(&tile) == Some(&entity) {
                self.tiles.remove(&tile);
            }
        }

        Ok(area)
    }

    /// Check whether an area is entirely free.
    pub fn can_register(&self, area: TileArea) -> bool {
        area.tiles().all(|tile| !self.tiles.contains_key(&tile))
    }

    // -- Point queries --

    /// The entity occupying a tile, if any.
    pub fn entity_at(&self, pos: TilePos) -> Option<EntityId> {
        self.tiles.get(&pos).copied()
    }

    /// The footprint of a registered entity.
    pub fn area_of(&self, entity: EntityId) -> Option<TileArea> {
        self.areas.get(entity).copied()
    }

    /// Every tile a registered entity occupies, in row-major order.
    pub fn tiles_of(&self, entity: EntityId) -> Vec<TilePos> {
        self.areas
            .get(entity)
            .map(|area| area.tiles().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.areas.contains_key(entity)
    }

    // -- Area queries --

    /// Unique entities with at least one tile inside `area`, in the order
    /// their first tile is met scanning row-major.
    pub fn entities_in_area(&self, area: TileArea) -> Vec<EntityId> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();

        for (&pos, &entity) in self.tiles.range(area.origin..=area.max()) {
            if area.contains(pos) && seen.insert(entity) {
                result.push(entity);
            }
        }
        result
    }

    // -- Adjacency --

    /// Unique entities sharing an edge with any tile of `entity`.
    pub fn neighbors_4(&self, entity: EntityId) -> Vec<EntityId> {
        let Some(&area) = self.areas.get(entity) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut result = Vec::new();

        for tile in area.tiles() {
            for dir in Direction::all() {
                let neighbor_pos = tile.step(dir);
                if area.contains(neighbor_pos) {
                    continue;
                }
                if let Some(&neighbor) = self.tiles.get(&neighbor_pos)
                    && neighbor != entity
                    && seen.insert(neighbor)
                {
                    result.push(neighbor);
                }
            }
        }
        result
    }

    // -- Iteration --

    /// All registered entities in ascending origin order.
    pub fn entities(&self) -> Vec<(EntityId, TileArea)> {
        let mut entries: Vec<(EntityId, TileArea)> =
            self.areas.iter().map(|(id, area)| (id, *area)).collect();
        entries.sort_by_key(|(id, area)| (area.origin, *id));
        entries
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_entities(count: usize) -> (SlotMap<EntityId, ()>, Vec<EntityId>) {
        let mut sm = SlotMap::with_key();
        let ids: Vec<EntityId> = (0..count).map(|_| sm.insert(())).collect();
        (sm, ids)
    }

    // -----------------------------------------------------------------------
    // TilePos / TileArea
    // -----------------------------------------------------------------------

    #[test]
    fn tile_pos_orders_row_major() {
        let mut tiles = vec![
            TilePos::new(5, 1),
            TilePos::new(0, 2),
            TilePos::new(3, 1),
        ];
        tiles.sort();
        assert_eq!(
            tiles,
            vec![TilePos::new(3, 1), TilePos::new(5, 1), TilePos::new(0, 2)]
        );
    }

    #[test]
    fn area_tiles_iteration() {
        let area = TileArea::new(10, 20, 2, 3);
        let tiles: Vec<_> = area.tiles().collect();
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[0], TilePos::new(10, 20));
        assert_eq!(tiles[1], TilePos::new(11, 20));
        assert_eq!(tiles[5], TilePos::new(11, 22));
    }

    #[test]
    fn area_zero_size_clamps_to_single() {
        let area = TileArea::new(0, 0, 0, 0);
        assert_eq!(area.tile_count(), 1);
    }

    #[test]
    fn touches_edges_but_not_corners() {
        let a = TileArea::new(0, 0, 2, 2);
        assert!(a.touches(&TileArea::new(2, 1, 1, 1)));
        assert!(a.touches(&TileArea::new(0, -1, 1, 1)));
        assert!(!a.touches(&TileArea::new(2, 2, 1, 1)));
        assert!(!a.touches(&TileArea::new(3, 0, 1, 1)));
        // Overlap is not adjacency.
        assert!(!a.touches(&TileArea::new(1, 1, 1, 1)));
    }

    #[test]
    fn chebyshev_gap_between_areas() {
        let a = TileArea::new(0, 0, 2, 2);
        assert_eq!(a.chebyshev_gap(&TileArea::new(2, 0, 1, 1)), 1);
        assert_eq!(a.chebyshev_gap(&TileArea::new(5, 3, 1, 1)), 4);
        assert_eq!(a.chebyshev_gap(&TileArea::new(1, 1, 3, 3)), 0);
    }

    #[test]
    fn expanded_grows_every_side() {
        let area = TileArea::new(5, 5, 1, 2).expanded(2);
        assert_eq!(area.origin, TilePos::new(3, 3));
        assert_eq!(area.width, 5);
        assert_eq!(area.height, 6);
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn register_multi_tile_answers_every_tile() {
        let (_sm, ids) = make_entities(1);
        let mut index = TileIndex::new();
        index.register(ids[0], TileArea::new(5, 5, 2, 2)).unwrap();

        assert_eq!(index.entity_at(TilePos::new(5, 5)), Some(ids[0]));
        assert_eq!(index.entity_at(TilePos::new(6, 5)), Some(ids[0]));
        assert_eq!(index.entity_at(TilePos::new(5, 6)), Some(ids[0]));
        assert_eq!(index.entity_at(TilePos::new(6, 6)), Some(ids[0]));
        assert_eq!(index.entity_at(TilePos::new(7, 5)), None);
        assert_eq!(index.tiles_of(ids[0]).len(), 4);
    }

    #[test]
    fn overlapping_registration_keeps_first() {
        let (_sm, ids) = make_entities(2);
        let mut index = TileIndex::new();
        index
            .register(ids[0], TileArea::single(TilePos::new(1, 1)))
            .unwrap();

        let result = index.register(ids[1], TileArea::new(0, 0, 2, 2));
        assert_eq!(
            result,
            Err(TileIndexError::Occupied {
                tile: TilePos::new(1, 1),
                occupant: ids[0],
            })
        );

        // Nothing from the rejected footprint was written.
        assert_eq!(index.entity_at(TilePos::new(0, 0)), None);
        assert_eq!(index.entity_at(TilePos::new(1, 1)), Some(ids[0]));
        assert_eq!(index.tile_count(), 1);
    }

    #[test]
    fn double_registration_rejected() {
        let (_sm, ids) = make_entities(1);
        let mut index = TileIndex::new();
        index
            .register(ids[0], TileArea::single(TilePos::new(0, 0)))
            .unwrap();
        let result = index.register(ids[0], TileArea::single(TilePos::new(4, 4)));
        assert_eq!(result, Err(TileIndexError::AlreadyRegistered));
    }

    #[test]
    fn unregister_frees_tiles() {
        let (_sm, ids) = make_entities(2);
        let mut index = TileIndex::new();
        let area = TileArea::new(3, 3, 2, 2);
        index.register(ids[0], area).unwrap();

        assert_eq!(index.unregister(ids[0]), Ok(area));
        assert!(index.can_register(area));
        assert_eq!(index.tile_count(), 0);
        assert_eq!(index.unregister(ids[0]), Err(TileIndexError::NotRegistered));

        index.register(ids[1], area).unwrap();
        assert_eq!(index.entity_at(TilePos::new(4, 4)), Some(ids[1]));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn entities_in_area_deduplicates() {
        let (_sm, ids) = make_entities(3);
        let mut index = TileIndex::new();
        index.register(ids[0], TileArea::new(0, 0, 2, 2)).unwrap();
        index
            .register(ids[1], TileArea::single(TilePos::new(3, 0)))
            .unwrap();
        index
            .register(ids[2], TileArea::single(TilePos::new(9, 9)))
            .unwrap();

        let found = index.entities_in_area(TileArea::new(0, 0, 4, 2));
        assert_eq!(found, vec![ids[0], ids[1]]);
    }

    #[test]
    fn neighbors_4_multi_tile() {
        let (_sm, ids) = make_entities(5);
        let mut index = TileIndex::new();
        index.register(ids[0], TileArea::new(5, 5, 2, 2)).unwrap();
        index
            .register(ids[1], TileArea::single(TilePos::new(5, 4)))
            .unwrap();
        index
            .register(ids[2], TileArea::single(TilePos::new(7, 5)))
            .unwrap();
        index
            .register(ids[3], TileArea::single(TilePos::new(6, 7)))
            .unwrap();
        // Diagonal only: not a neighbor.
        index
            .register(ids[4], TileArea::single(TilePos::new(4, 4)))
            .unwrap();

        let neighbors = index.neighbors_4(ids[0]);
        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.contains(&ids[1]));
        assert!(neighbors.contains(&ids[2]));
        assert!(neighbors.contains(&ids[3]));
        assert!(!neighbors.contains(&ids[4]));
    }

    #[test]
    fn geometry_saturates_at_the_grid_edge() {
        let edge = TileArea::new(i32::MAX - 1, i32::MIN, 4, u32::MAX);
        assert_eq!(edge.right(), i32::MAX);
        assert_eq!(edge.bottom(), i32::MIN.saturating_add_unsigned(u32::MAX - 1));
        assert_eq!(edge.tiles().take(3).count(), 3);

        let grown = TileArea::single(TilePos::new(0, 0)).expanded(u32::MAX);
        assert_eq!(grown.left(), i32::MIN);
        assert_eq!(grown.top(), i32::MIN);
        assert!(grown.contains(TilePos::new(1_000_000, -1_000_000)));

        let far = TileArea::single(TilePos::new(i32::MAX, 0));
        let near = TileArea::single(TilePos::new(i32::MIN, 0));
        assert_eq!(far.chebyshev_gap(&near), u32::MAX);
        assert!(!far.touches(&near));
        assert_eq!(TilePos::new(i32::MAX, 0).step(Direction::East).x, i32::MAX);
    }

    #[test]
    fn entities_sorted_by_origin() {
        let (_sm, ids) = make_entities(3);
        let mut index = TileIndex::new();
        index
            .register(ids[0], TileArea::single(TilePos::new(0, 3)))
            .unwrap();
        index
            .register(ids[1], TileArea::single(TilePos::new(4, 0)))
            .unwrap();
        index
            .register(ids[2], TileArea::single(TilePos::new(1, 0)))
            .unwrap();

        let order: Vec<EntityId> = index.entities().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }
}
