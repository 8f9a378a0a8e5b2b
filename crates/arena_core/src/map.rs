//! Navigation map collaborator.
//!
//! The AI core only reads the map through the [`TileMap`] trait. [`Tilemap`]
//! is the in-crate implementation used by [`crate::simulation::Arena`], the
//! headless runner and the tests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Identity of a map build: which map, and which revision of its walls.
///
/// Any change of this key invalidates cached navigation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MapKey {
    /// Unique map identity.
    pub id: u64,
    /// Incremented whenever a cell changes.
    pub revision: u64,
}

/// Read-only view of a tile map.
pub trait TileMap {
    /// Width in tiles.
    fn width(&self) -> u32;

    /// Height in tiles.
    fn height(&self) -> u32;

    /// Size of one tile in world units.
    fn tile_size(&self) -> Fixed;

    /// Whether the tile at `(x, y)` is a wall. Out-of-range tiles are walls.
    fn is_wall(&self, x: i32, y: i32) -> bool;

    /// Identity of the current map contents.
    fn map_key(&self) -> MapKey;
}

/// Cell types for the arena grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Walkable floor.
    #[default]
    Floor,
    /// Impassable, opaque wall.
    Wall,
}

impl CellType {
    /// Returns true if agents can stand on this cell.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Floor)
    }
}

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

fn next_map_id() -> u64 {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Dense tile map stored in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tilemap {
    width: u32,
    height: u32,
    cells: Vec<CellType>,
    #[serde(with = "fixed_serde")]
    tile_size: Fixed,
    #[serde(skip, default = "next_map_id")]
    id: u64,
    #[serde(skip)]
    revision: u64,
}

impl Tilemap {
    /// Create a map of the given size with every cell walkable.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidMap`] for zero dimensions or a
    /// non-positive tile size.
    pub fn new(width: u32, height: u32, tile_size: Fixed) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ArenaError::InvalidMap(format!(
                "dimensions must be positive, got {width}x{height}"
            )));
        }
        if tile_size <= Fixed::ZERO {
            return Err(ArenaError::InvalidMap(format!(
                "tile size must be positive, got {tile_size}"
            )));
        }

        let cell_count = (width as usize) * (height as usize);
        Ok(Self {
            width,
            height,
            cells: vec![CellType::Floor; cell_count],
            tile_size,
            id: next_map_id(),
            revision: 0,
        })
    }

    /// Build a map from ASCII rows: `#` is a wall, anything else is floor.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidMap`] if there are no rows, rows have
    /// different lengths, or the tile size is not positive.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], tile_size: Fixed) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().chars().count());

        let mut map = Self::new(width as u32, height as u32, tile_size)?;
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(ArenaError::InvalidMap(format!(
                    "row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    let index = map.coords_to_index(x as u32, y as u32);
                    map.cells[index] = CellType::Wall;
                }
            }
        }
        Ok(map)
    }

    #[inline]
    fn coords_to_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Check if coordinates are within map bounds.
    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Get cell type at coordinates, `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, x: i32, y: i32) -> Option<CellType> {
        if self.in_bounds(x, y) {
            Some(self.cells[self.coords_to_index(x as u32, y as u32)])
        } else {
            None
        }
    }

    /// Set cell type at coordinates. Returns `false` if out of bounds.
    ///
    /// Bumps the map revision so cached navigation data is rebuilt.
    pub fn set_cell(&mut self, x: i32, y: i32, cell_type: CellType) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let index = self.coords_to_index(x as u32, y as u32);
        if self.cells[index] != cell_type {
            self.cells[index] = cell_type;
            self.revision += 1;
        }
        true
    }

    /// Tile containing a world position (floor division, may be out of range).
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec2Fixed) -> (i32, i32) {
        (
            (pos.x / self.tile_size).floor().to_num::<i32>(),
            (pos.y / self.tile_size).floor().to_num::<i32>(),
        )
    }

    /// World position of a tile's center.
    #[must_use]
    pub fn tile_center_world(&self, x: i32, y: i32) -> Vec2Fixed {
        let half = self.tile_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.tile_size + half,
            Fixed::from_num(y) * self.tile_size + half,
        )
    }
}

impl TileMap for Tilemap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    fn is_wall(&self, x: i32, y: i32) -> bool {
        self.get_cell(x, y).map_or(true, |c| !c.is_walkable())
    }

    fn map_key(&self) -> MapKey {
        MapKey {
            id: self.id,
            revision: self.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_tilemap_creation() {
        let map = Tilemap::new(10, 8, fixed(64)).unwrap();
        assert_eq!(map.width(), 10);
        assert_eq!(map.height(), 8);
        assert_eq!(map.tile_size(), fixed(64));
        assert!(!map.is_wall(0, 0));
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(Tilemap::new(0, 5, fixed(1)).is_err());
        assert!(Tilemap::new(5, 0, fixed(1)).is_err());
        assert!(Tilemap::new(5, 5, Fixed::ZERO).is_err());
    }

    #[test]
    fn test_from_rows() {
        let map = Tilemap::from_rows(&["###", "#.#", "###"], fixed(1)).unwrap();
        assert!(map.is_wall(0, 0));
        assert!(!map.is_wall(1, 1));
        assert!(map.is_wall(2, 1));
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let result = Tilemap::from_rows(&["...", ".."], fixed(1));
        assert!(matches!(result, Err(ArenaError::InvalidMap(_))));
    }

    #[test]
    fn test_out_of_bounds_is_wall() {
        let map = Tilemap::new(4, 4, fixed(1)).unwrap();
        assert!(map.is_wall(-1, 0));
        assert!(map.is_wall(0, 4));
        assert!(map.is_wall(4, 0));
    }

    #[test]
    fn test_set_cell_bumps_revision() {
        let mut map = Tilemap::new(4, 4, fixed(1)).unwrap();
        let before = map.map_key();

        assert!(map.set_cell(1, 1, CellType::Wall));
        let after = map.map_key();
        assert_eq!(before.id, after.id);
        assert_ne!(before.revision, after.revision);

        // Writing the same value again is not a change.
        assert!(map.set_cell(1, 1, CellType::Wall));
        assert_eq!(map.map_key(), after);

        assert!(!map.set_cell(9, 9, CellType::Wall));
    }

    #[test]
    fn test_distinct_maps_have_distinct_ids() {
        let a = Tilemap::new(2, 2, fixed(1)).unwrap();
        let b = Tilemap::new(2, 2, fixed(1)).unwrap();
        assert_ne!(a.map_key(), b.map_key());
    }

    #[test]
    fn test_world_tile_conversion() {
        let map = Tilemap::new(10, 10, fixed(64)).unwrap();
        assert_eq!(map.world_to_tile(Vec2Fixed::from_ints(32, 32)), (0, 0));
        assert_eq!(map.world_to_tile(Vec2Fixed::from_ints(64, 130)), (1, 2));
        assert_eq!(map.world_to_tile(Vec2Fixed::from_ints(-1, 5)), (-1, 0));

        let center = map.tile_center_world(1, 2);
        assert_eq!(center, Vec2Fixed::from_ints(96, 160));
    }
}
