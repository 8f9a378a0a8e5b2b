//! Per-tick tile reservations and conflict resolution.
//!
//! Every agent that wants to change tiles files a [`MoveReservation`]. The
//! resolver grants each destination tile to at most one agent per tick: the
//! one with the smallest [`EntityId`]. Everyone else keeps their tile.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::components::EntityId;
use crate::grid::{Grid, TileCoord};

/// Tiles occupied by agents at the start of the tick.
///
/// Captured once and never updated while the tick is resolved, so the
/// order in which agents are processed cannot change who is blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    tiles: BTreeSet<TileCoord>,
}

impl OccupancySnapshot {
    /// Build a snapshot from occupied tiles.
    #[must_use]
    pub fn from_tiles(tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        Self {
            tiles: tiles.into_iter().collect(),
        }
    }

    /// Mark a tile as occupied.
    pub fn insert(&mut self, tile: TileCoord) {
        self.tiles.insert(tile);
    }

    /// Whether a tile was occupied at the start of the tick.
    #[must_use]
    pub fn contains(&self, tile: TileCoord) -> bool {
        self.tiles.contains(&tile)
    }

    /// Number of occupied tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tile is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// One agent's movement claim for a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReservation {
    /// Claiming agent.
    pub entity: EntityId,
    /// Tile the agent stands on.
    pub from_tile: TileCoord,
    /// Tile the agent wants to enter.
    pub intended_tile: TileCoord,
    /// Tile the agent ends up heading for. Equals `from_tile` when denied.
    pub final_tile: TileCoord,
    /// Whether the agent asked to move at all.
    pub wants_move: bool,
}

impl MoveReservation {
    /// A claim to move from `from` to `intended`.
    #[must_use]
    pub const fn new(entity: EntityId, from: TileCoord, intended: TileCoord) -> Self {
        Self {
            entity,
            from_tile: from,
            intended_tile: intended,
            final_tile: from,
            wants_move: true,
        }
    }

    /// A record for an agent that stays put.
    #[must_use]
    pub const fn stay(entity: EntityId, tile: TileCoord) -> Self {
        Self {
            entity,
            from_tile: tile,
            intended_tile: tile,
            final_tile: tile,
            wants_move: false,
        }
    }

    /// Whether the agent was granted a new tile.
    #[must_use]
    pub fn granted(&self) -> bool {
        self.final_tile != self.from_tile
    }
}

/// Resolve all claims of a tick in place.
///
/// A claim survives only if it moves to a different, in-bounds, open tile
/// that was not occupied at the start of the tick. Surviving claims are
/// grouped by destination and the smallest entity id in each group wins.
/// Every `final_tile` is either the claim's destination (winner) or its
/// `from_tile`.
///
/// Returns the number of granted moves.
pub fn resolve_move_reservations(
    grid: &Grid<'_>,
    occupancy: &OccupancySnapshot,
    reservations: &mut [MoveReservation],
) -> usize {
    let mut winners: BTreeMap<TileCoord, (EntityId, usize)> = BTreeMap::new();

    for (slot, reservation) in reservations.iter_mut().enumerate() {
        reservation.final_tile = reservation.from_tile;

        if !reservation.wants_move || reservation.intended_tile == reservation.from_tile {
            continue;
        }
        let dest = reservation.intended_tile;
        if !grid.in_bounds(dest) || grid.is_blocked(dest) || occupancy.contains(dest) {
            trace!(entity = %reservation.entity, x = dest.x, y = dest.y, "Reservation rejected");
            continue;
        }

        let entity = reservation.entity;
        winners
            .entry(dest)
            .and_modify(|current| {
                if entity < current.0 {
                    *current = (entity, slot);
                }
            })
            .or_insert((entity, slot));
    }

    for (dest, (entity, slot)) in &winners {
        reservations[*slot].final_tile = *dest;
        trace!(entity = %entity, x = dest.x, y = dest.y, "Reservation granted");
    }

    winners.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Tilemap;
    use crate::math::Fixed;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    fn open_map() -> Tilemap {
        Tilemap::from_rows(&[".....", ".....", ".....", "....#"], Fixed::ONE).unwrap()
    }

    #[test]
    fn test_contested_tile_goes_to_smallest_id() {
        let map = open_map();
        let grid = Grid::from_map(&map);
        let dest = TileCoord::new(2, 1);
        let mut reservations = vec![
            MoveReservation::new(id(7), TileCoord::new(1, 1), dest),
            MoveReservation::new(id(3), TileCoord::new(3, 1), dest),
        ];

        let granted = resolve_move_reservations(&grid, &OccupancySnapshot::default(), &mut reservations);

        assert_eq!(granted, 1);
        assert_eq!(reservations[0].final_tile, TileCoord::new(1, 1));
        assert_eq!(reservations[1].final_tile, dest);
    }

    #[test]
    fn test_occupied_blocked_and_out_of_bounds_rejected() {
        let map = open_map();
        let grid = Grid::from_map(&map);
        let occupancy = OccupancySnapshot::from_tiles([TileCoord::new(0, 0)]);
        let mut reservations = vec![
            MoveReservation::new(id(1), TileCoord::new(1, 0), TileCoord::new(0, 0)),
            MoveReservation::new(id(2), TileCoord::new(3, 3), TileCoord::new(4, 3)),
            MoveReservation::new(id(3), TileCoord::new(4, 0), TileCoord::new(5, 0)),
        ];

        let granted = resolve_move_reservations(&grid, &occupancy, &mut reservations);

        assert_eq!(granted, 0);
        assert!(reservations.iter().all(|r| r.final_tile == r.from_tile));
    }

    #[test]
    fn test_stay_records_keep_their_tile() {
        let map = open_map();
        let grid = Grid::from_map(&map);
        let mut reservations = vec![
            MoveReservation::stay(id(1), TileCoord::new(2, 2)),
            MoveReservation::new(id(2), TileCoord::new(1, 1), TileCoord::new(1, 1)),
        ];

        resolve_move_reservations(&grid, &OccupancySnapshot::default(), &mut reservations);

        assert!(!reservations[0].granted());
        assert!(!reservations[1].granted());
    }

    #[test]
    fn test_ties_use_generation_after_index() {
        let map = open_map();
        let grid = Grid::from_map(&map);
        let dest = TileCoord::new(2, 2);
        let mut reservations = vec![
            MoveReservation::new(EntityId::new(4, 2), TileCoord::new(1, 2), dest),
            MoveReservation::new(EntityId::new(4, 1), TileCoord::new(3, 2), dest),
        ];

        resolve_move_reservations(&grid, &OccupancySnapshot::default(), &mut reservations);

        assert!(!reservations[0].granted());
        assert!(reservations[1].granted());
    }

    #[test]
    fn test_invalid_grid_grants_nothing() {
        let grid = Grid::invalid();
        let mut reservations = vec![MoveReservation::new(
            id(1),
            TileCoord::new(0, 0),
            TileCoord::new(1, 0),
        )];
        assert_eq!(
            resolve_move_reservations(&grid, &OccupancySnapshot::default(), &mut reservations),
            0
        );
        assert!(!reservations[0].granted());
    }
}
