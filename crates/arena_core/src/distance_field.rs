//! Cached breadth-first distance field rooted at the target's tile.
//!
//! The field is rebuilt at most once per tick and only when the map, its
//! dimensions, or the target tile changed. Once [`DistanceFieldCache::rebuild_if_needed`]
//! returns, the field is read-only for the rest of the tick; every agent
//! reads the same values through [`DistanceFieldCache::get_dist`].

use std::collections::VecDeque;

use tracing::debug;

use crate::grid::{Grid, TileCoord, DIRECTIONS_8};
use crate::map::MapKey;

/// Distance value of tiles that cannot reach the target.
pub const UNREACHED: i32 = -1;

/// Dense hop-count field, one entry per tile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistanceField {
    width: i32,
    height: i32,
    dists: Vec<i32>,
}

impl DistanceField {
    /// Breadth-first search from `target` over 8-connected open tiles.
    ///
    /// A blocked or out-of-range target leaves every tile unreached.
    #[must_use]
    pub fn build(grid: &Grid<'_>, target: TileCoord) -> Self {
        let mut field = Self {
            width: grid.width().max(0),
            height: grid.height().max(0),
            dists: vec![UNREACHED; grid.tile_count()],
        };

        let Some(start) = grid.index(target) else {
            return field;
        };
        if grid.is_blocked(target) {
            return field;
        }

        let mut queue = VecDeque::with_capacity(field.dists.len());
        field.dists[start] = 0;
        queue.push_back(target);

        while let Some(tile) = queue.pop_front() {
            let Some(current) = grid.index(tile) else {
                continue;
            };
            let next_dist = field.dists[current] + 1;

            for &(dx, dy) in &DIRECTIONS_8 {
                if !grid.can_step(tile, dx, dy) {
                    continue;
                }
                let neighbor = tile.offset(dx, dy);
                let Some(index) = grid.index(neighbor) else {
                    continue;
                };
                if field.dists[index] != UNREACHED {
                    continue;
                }
                field.dists[index] = next_dist;
                queue.push_back(neighbor);
            }
        }

        field
    }

    /// Number of entries; always `width * height`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dists.len()
    }

    /// Whether the field has no entries (invalid grid).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dists.is_empty()
    }

    /// Hop count for a tile, [`UNREACHED`] if unreached or out of range.
    #[must_use]
    pub fn get(&self, tile: TileCoord) -> i32 {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return UNREACHED;
        }
        let index = tile.x as usize + (tile.y as usize) * (self.width as usize);
        self.dists.get(index).copied().unwrap_or(UNREACHED)
    }

    /// Raw values in `x + y * width` order.
    #[must_use]
    pub fn values(&self) -> &[i32] {
        &self.dists
    }
}

/// Inputs that determine a field's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldKey {
    map: Option<MapKey>,
    width: i32,
    height: i32,
    target: TileCoord,
}

/// Owns the distance field and its invalidation rules.
#[derive(Debug, Clone, Default)]
pub struct DistanceFieldCache {
    key: Option<FieldKey>,
    field: DistanceField,
    builds: u64,
}

impl DistanceFieldCache {
    /// Create an empty cache. The first call to
    /// [`rebuild_if_needed`](Self::rebuild_if_needed) always builds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the field if the map identity, dimensions or target tile
    /// changed since the last build. Returns `true` if a rebuild happened.
    pub fn rebuild_if_needed(&mut self, grid: &Grid<'_>, target: TileCoord) -> bool {
        let key = FieldKey {
            map: grid.map_key(),
            width: grid.width(),
            height: grid.height(),
            target,
        };
        if self.key == Some(key) {
            return false;
        }

        self.field = DistanceField::build(grid, target);
        self.key = Some(key);
        self.builds += 1;

        debug!(
            target_x = target.x,
            target_y = target.y,
            width = key.width,
            height = key.height,
            reachable = self.field.get(target) == 0,
            "Rebuilt distance field"
        );
        true
    }

    /// Hop count from `tile` to the target, [`UNREACHED`] if there is no path.
    #[must_use]
    pub fn get_dist(&self, tile: TileCoord) -> i32 {
        self.field.get(tile)
    }

    /// The current field.
    #[must_use]
    pub fn field(&self) -> &DistanceField {
        &self.field
    }

    /// Number of builds performed so far.
    #[must_use]
    pub const fn build_count(&self) -> u64 {
        self.builds
    }

    /// Forget the cached key so the next call rebuilds.
    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CellType, Tilemap};
    use crate::math::Fixed;

    fn map(rows: &[&str]) -> Tilemap {
        Tilemap::from_rows(rows, Fixed::ONE).unwrap()
    }

    #[test]
    fn test_open_grid_uses_chebyshev_distance() {
        let map = map(&[".....", ".....", ".....", "....."]);
        let grid = Grid::from_map(&map);
        let field = DistanceField::build(&grid, TileCoord::new(0, 0));

        assert_eq!(field.len(), 20);
        assert_eq!(field.get(TileCoord::new(0, 0)), 0);
        assert_eq!(field.get(TileCoord::new(3, 3)), 3);
        assert_eq!(field.get(TileCoord::new(4, 1)), 4);
    }

    #[test]
    fn test_walls_force_detour() {
        // Wall column at x=2 with a gap at the bottom row.
        let map = map(&["..#..", "..#..", "....."]);
        let grid = Grid::from_map(&map);
        let field = DistanceField::build(&grid, TileCoord::new(0, 0));

        assert_eq!(field.get(TileCoord::new(2, 0)), UNREACHED);
        // (1,1) -> (2,2) would cut the wall corner at (2,1), so the path
        // goes around through (1,2).
        assert_eq!(field.get(TileCoord::new(1, 2)), 2);
        assert_eq!(field.get(TileCoord::new(2, 2)), 3);
        assert_eq!(field.get(TileCoord::new(3, 2)), 4);
        assert_eq!(field.get(TileCoord::new(3, 1)), 5);
        assert_eq!(field.get(TileCoord::new(3, 0)), 6);
    }

    #[test]
    fn test_no_corner_cutting() {
        // Two walls meeting at a corner block the diagonal between them.
        let map = map(&[".#", "#."]);
        let grid = Grid::from_map(&map);
        let field = DistanceField::build(&grid, TileCoord::new(0, 0));
        assert_eq!(field.get(TileCoord::new(1, 1)), UNREACHED);
    }

    #[test]
    fn test_blocked_target_leaves_field_unreached() {
        let map = map(&["...", ".#.", "..."]);
        let grid = Grid::from_map(&map);
        let field = DistanceField::build(&grid, TileCoord::new(1, 1));
        assert!(field.values().iter().all(|&d| d == UNREACHED));
        assert_eq!(field.len(), 9);

        let outside = DistanceField::build(&grid, TileCoord::new(7, 7));
        assert!(outside.values().iter().all(|&d| d == UNREACHED));
    }

    #[test]
    fn test_invalid_grid_yields_empty_field() {
        let grid = Grid::invalid();
        let field = DistanceField::build(&grid, TileCoord::new(0, 0));
        assert!(field.is_empty());
        assert_eq!(field.get(TileCoord::new(0, 0)), UNREACHED);
    }

    #[test]
    fn test_cache_skips_unchanged_inputs() {
        let map = map(&["....", "....", "...."]);
        let grid = Grid::from_map(&map);
        let mut cache = DistanceFieldCache::new();

        assert!(cache.rebuild_if_needed(&grid, TileCoord::new(1, 1)));
        let snapshot = cache.field().clone();
        assert!(!cache.rebuild_if_needed(&grid, TileCoord::new(1, 1)));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.field(), &snapshot);

        assert!(cache.rebuild_if_needed(&grid, TileCoord::new(2, 1)));
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.get_dist(TileCoord::new(2, 1)), 0);
    }

    #[test]
    fn test_cache_rebuilds_on_map_edit() {
        let mut map = map(&["....", "....", "...."]);
        let mut cache = DistanceFieldCache::new();
        let target = TileCoord::new(0, 0);

        cache.rebuild_if_needed(&Grid::from_map(&map), target);
        assert_eq!(cache.get_dist(TileCoord::new(2, 0)), 2);

        map.set_cell(1, 0, CellType::Wall);
        map.set_cell(1, 1, CellType::Wall);
        assert!(cache.rebuild_if_needed(&Grid::from_map(&map), target));
        assert_eq!(cache.get_dist(TileCoord::new(1, 0)), UNREACHED);
        assert_eq!(cache.get_dist(TileCoord::new(2, 0)), 6);
    }

    #[test]
    fn test_cache_rebuilds_for_different_map() {
        let a = map(&["...", "..."]);
        let b = map(&["...", "..."]);
        let mut cache = DistanceFieldCache::new();
        let target = TileCoord::new(0, 0);

        assert!(cache.rebuild_if_needed(&Grid::from_map(&a), target));
        assert!(cache.rebuild_if_needed(&Grid::from_map(&b), target));
    }
}
