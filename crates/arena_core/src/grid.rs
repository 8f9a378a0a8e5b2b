//! Grid adapter over the navigation map.
//!
//! A [`Grid`] is rebuilt every tick from the current [`TileMap`]. It owns no
//! tile data; it only normalizes bounds checks, blocked tests, indexing and
//! world/tile conversions. An invalid grid (no map, zero-sized, or a
//! non-positive tile size) reports every tile as blocked and every
//! coordinate as out of range, which degrades all agents to standing still.

use serde::{Deserialize, Serialize};

use crate::map::{MapKey, TileMap};
use crate::math::{Fixed, Vec2Fixed};

/// Integer tile coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Create a tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Neighbor offsets for 8-connected movement, in fixed evaluation order.
///
/// Orthogonal directions come first so that ties between equally good
/// candidates resolve to straight steps.
pub const DIRECTIONS_8: [(i32, i32); 8] = [
    (1, 0),   // East
    (-1, 0),  // West
    (0, 1),   // South
    (0, -1),  // North
    (1, 1),   // Southeast
    (1, -1),  // Northeast
    (-1, 1),  // Southwest
    (-1, -1), // Northwest
];

/// Tile coordinate returned for conversions on an invalid grid.
const OUT_OF_RANGE: TileCoord = TileCoord::new(-1, -1);

/// Read-only per-tick view of the navigation map.
#[derive(Clone, Copy)]
pub struct Grid<'a> {
    width: i32,
    height: i32,
    tile_size: Fixed,
    map: Option<&'a dyn TileMap>,
}

impl std::fmt::Debug for Grid<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("tile_size", &self.tile_size)
            .field("has_map", &self.map.is_some())
            .finish()
    }
}

impl<'a> Grid<'a> {
    /// Build a grid over the given map.
    #[must_use]
    pub fn from_map(map: &'a dyn TileMap) -> Self {
        Self {
            width: i32::try_from(map.width()).unwrap_or(0),
            height: i32::try_from(map.height()).unwrap_or(0),
            tile_size: map.tile_size(),
            map: Some(map),
        }
    }

    /// A grid with no map behind it. Every query reports blocked.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            width: 0,
            height: 0,
            tile_size: Fixed::ZERO,
            map: None,
        }
    }

    /// True if the grid has a map, positive dimensions and a positive tile size.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.map.is_some() && self.width > 0 && self.height > 0 && self.tile_size > Fixed::ZERO
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Tile size in world units.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    /// Number of tiles, zero for an invalid grid.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        if self.is_valid() {
            (self.width as usize) * (self.height as usize)
        } else {
            0
        }
    }

    /// Identity of the underlying map contents.
    #[must_use]
    pub fn map_key(&self) -> Option<MapKey> {
        self.map.map(|m| m.map_key())
    }

    /// Check if a tile lies inside the grid.
    #[must_use]
    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        self.is_valid() && tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    /// Tile index `x + y * width`, `None` if out of bounds.
    #[must_use]
    pub fn index(&self, tile: TileCoord) -> Option<usize> {
        if self.in_bounds(tile) {
            Some(tile.x as usize + (tile.y as usize) * (self.width as usize))
        } else {
            None
        }
    }

    /// Inverse of [`Grid::index`] for in-range indices.
    #[must_use]
    pub fn tile_at(&self, index: usize) -> TileCoord {
        if self.width <= 0 {
            return OUT_OF_RANGE;
        }
        let width = self.width as usize;
        TileCoord::new((index % width) as i32, (index / width) as i32)
    }

    /// True for walls, out-of-bounds tiles and every tile of an invalid grid.
    #[must_use]
    pub fn is_blocked(&self, tile: TileCoord) -> bool {
        if !self.in_bounds(tile) {
            return true;
        }
        self.map.map_or(true, |m| m.is_wall(tile.x, tile.y))
    }

    /// Whether a single step from `from` by `(dx, dy)` is legal.
    ///
    /// The destination must be open. A diagonal step additionally requires
    /// both flanking orthogonal tiles to be open (no corner cutting).
    #[must_use]
    pub fn can_step(&self, from: TileCoord, dx: i32, dy: i32) -> bool {
        if self.is_blocked(from.offset(dx, dy)) {
            return false;
        }
        if dx != 0 && dy != 0 {
            return !self.is_blocked(from.offset(dx, 0)) && !self.is_blocked(from.offset(0, dy));
        }
        true
    }

    /// Tile containing a world position. May be out of range.
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec2Fixed) -> TileCoord {
        if !self.is_valid() {
            return OUT_OF_RANGE;
        }
        TileCoord::new(
            (pos.x / self.tile_size).floor().to_num::<i32>(),
            (pos.y / self.tile_size).floor().to_num::<i32>(),
        )
    }

    /// World position of a tile's center.
    #[must_use]
    pub fn tile_center_world(&self, tile: TileCoord) -> Vec2Fixed {
        let half = self.tile_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(tile.x) * self.tile_size + half,
            Fixed::from_num(tile.y) * self.tile_size + half,
        )
    }
}

/// Wall overlap queries for circular bodies.
pub trait CollisionQuery {
    /// Whether a circle at `center` with `radius` overlaps any wall.
    fn circle_hits_wall(&self, center: Vec2Fixed, radius: Fixed) -> bool;
}

impl CollisionQuery for Grid<'_> {
    fn circle_hits_wall(&self, center: Vec2Fixed, radius: Fixed) -> bool {
        if !self.is_valid() {
            return true;
        }

        let ts = self.tile_size;
        let radius = radius.max(Fixed::ZERO);
        let min = self.world_to_tile(Vec2Fixed::new(center.x - radius, center.y - radius));
        let max = self.world_to_tile(Vec2Fixed::new(center.x + radius, center.y + radius));

        // A body poking out of the map counts as touching a wall.
        if !self.in_bounds(min) || !self.in_bounds(max) {
            return true;
        }

        let radius_sq = radius * radius;
        for ty in min.y..=max.y {
            for tx in min.x..=max.x {
                let tile = TileCoord::new(tx, ty);
                if !self.is_blocked(tile) {
                    continue;
                }

                let left = Fixed::from_num(tx) * ts;
                let top = Fixed::from_num(ty) * ts;
                let nearest_x = center.x.clamp(left, left + ts);
                let nearest_y = center.y.clamp(top, top + ts);
                let dx = center.x - nearest_x;
                let dy = center.y - nearest_y;

                if dx * dx + dy * dy < radius_sq {
                    return true;
                }
            }
        }

        false
    }
}
