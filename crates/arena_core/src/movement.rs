//! Tile-selection heuristics.
//!
//! Pure functions over the 8-neighborhood of an agent's tile. None of them
//! cut corners: a diagonal candidate needs both flanking orthogonal tiles
//! open. Neighbors are visited in [`DIRECTIONS_8`] order and only strictly
//! better candidates replace the current best, so ties resolve to the
//! earliest direction.

use crate::data::OrbitTuning;
use crate::distance_field::DistanceFieldCache;
use crate::grid::{Grid, TileCoord, DIRECTIONS_8};
use crate::math::{clamp01, Fixed, Vec2Fixed};
use crate::reservation::OccupancySnapshot;

/// Open neighbors of `from` reachable in one legal step.
fn legal_neighbors<'g>(grid: &'g Grid<'_>, from: TileCoord) -> impl Iterator<Item = TileCoord> + 'g {
    DIRECTIONS_8
        .iter()
        .filter(move |&&(dx, dy)| grid.can_step(from, dx, dy))
        .map(move |&(dx, dy)| from.offset(dx, dy))
}

/// Greedy descent on the distance field.
///
/// Picks the neighbor with the smallest field value strictly below the
/// current tile's. Occupied tiles are skipped, except the target's own tile.
/// Returns `from` when no neighbor improves (including when `from` is
/// unreached or out of range).
#[must_use]
pub fn step_toward(
    grid: &Grid<'_>,
    field: &DistanceFieldCache,
    occupied: &OccupancySnapshot,
    from: TileCoord,
    target: TileCoord,
) -> TileCoord {
    if !grid.in_bounds(from) {
        return from;
    }
    let current = field.get_dist(from);
    if current < 0 {
        return from;
    }

    let mut best = from;
    let mut best_dist = current;
    for candidate in legal_neighbors(grid, from) {
        let dist = field.get_dist(candidate);
        if dist < 0 || dist >= best_dist {
            continue;
        }
        if candidate != target && occupied.contains(candidate) {
            continue;
        }
        best = candidate;
        best_dist = dist;
    }
    best
}

/// Greedy ascent on the distance field.
///
/// Picks the neighbor with the largest field value strictly above the
/// current tile's. Occupied tiles are always skipped.
#[must_use]
pub fn step_away(
    grid: &Grid<'_>,
    field: &DistanceFieldCache,
    occupied: &OccupancySnapshot,
    from: TileCoord,
) -> TileCoord {
    if !grid.in_bounds(from) {
        return from;
    }
    let current = field.get_dist(from);
    if current < 0 {
        return from;
    }

    let mut best = from;
    let mut best_dist = current;
    for candidate in legal_neighbors(grid, from) {
        let dist = field.get_dist(candidate);
        if dist < 0 || dist <= best_dist {
            continue;
        }
        if occupied.contains(candidate) {
            continue;
        }
        best = candidate;
        best_dist = dist;
    }
    best
}

/// Inputs of the orbit heuristic for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrbitRequest {
    /// Agent's world position.
    pub agent_world: Vec2Fixed,
    /// Target's world position.
    pub target_world: Vec2Fixed,
    /// Center of the preferred range band, in tiles.
    pub desired_range_tiles: Fixed,
    /// Half-width of the band, in tiles.
    pub tolerance_tiles: Fixed,
    /// Unit vector from the agent toward the target.
    pub to_target_dir: Vec2Fixed,
    /// Orbit direction.
    pub clockwise: bool,
}

/// Pick a neighbor that keeps the agent circling the target in its band.
///
/// Each open, unoccupied candidate within `tolerance * tolerance_expand` of
/// the preferred range is scored as
///
/// ```text
/// range_error * range_weight
///   + (1 - clamp01((dot(step, tangent) + 1) / 2)) * tangential_weight
///   + (dot(step, tangent) < 0 ? wrong_side_penalty : 0)
///   + |candidate_range - current_range| * drift_weight
/// ```
///
/// The lowest score wins; `from` is returned when nothing qualifies.
#[must_use]
pub fn orbit(
    grid: &Grid<'_>,
    occupied: &OccupancySnapshot,
    from: TileCoord,
    request: &OrbitRequest,
    tuning: &OrbitTuning,
) -> TileCoord {
    if !grid.in_bounds(from) {
        return from;
    }
    let tile_size = grid.tile_size();
    let current_range = request.agent_world.distance(request.target_world) / tile_size;
    let max_error = request.tolerance_tiles * tuning.tolerance_expand;
    let tangent = request.to_target_dir.perpendicular(request.clockwise);
    let from_center = grid.tile_center_world(from);
    let half = Fixed::ONE / Fixed::from_num(2);

    let mut best = from;
    let mut best_score: Option<Fixed> = None;

    for candidate in legal_neighbors(grid, from) {
        if occupied.contains(candidate) {
            continue;
        }

        let center = grid.tile_center_world(candidate);
        let candidate_range = center.distance(request.target_world) / tile_size;
        let range_error = (candidate_range - request.desired_range_tiles).abs();
        if range_error > max_error {
            continue;
        }

        let step_dir = (center - from_center).normalize_or_zero();
        if step_dir.is_zero() {
            continue;
        }

        let dot_tangent = step_dir.dot(tangent);
        let tangential = Fixed::ONE - clamp01((dot_tangent + Fixed::ONE) * half);
        let wrong_side = if dot_tangent < Fixed::ZERO {
            tuning.wrong_side_penalty
        } else {
            Fixed::ZERO
        };
        let drift = (candidate_range - current_range).abs() * tuning.drift_weight;

        let score = range_error * tuning.range_weight
            + tangential * tuning.tangential_weight
            + wrong_side
            + drift;

        if best_score.map_or(true, |best| score < best) {
            best_score = Some(score);
            best = candidate;
        }
    }

    best
}
