//! Agent perception: vision range, line of sight and field of view.
//!
//! # Line of sight
//!
//! The ray is traversed in tile space with an incremental grid walk
//! (Amanatides & Woo). When the ray passes exactly through a tile corner,
//! both tiles flanking the corner are tested before stepping diagonally, and
//! a wall on either side blocks sight, the same rule diagonal movement uses.

use crate::components::{EnemyAgent, Facing};
use crate::grid::{Grid, TileCoord};
use crate::math::{Fixed, Vec2Fixed};

/// Forward nudge of the ray origin, in tiles (about 1e-4).
const RAY_NUDGE: Fixed = Fixed::from_bits(429_497);

/// Side distances closer than this are treated as a corner crossing (about 1e-6).
const CORNER_EPSILON: Fixed = Fixed::from_bits(4_295);

/// Direction components smaller than this never cross a grid line (about 1e-6).
const AXIS_EPSILON: Fixed = Fixed::from_bits(4_295);

/// What an agent knows about the target this tick. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerceptionResult {
    /// Vector from the agent to the target.
    pub to_target: Vec2Fixed,
    /// Unit vector toward the target, zero if both share a position.
    pub to_target_dir: Vec2Fixed,
    /// Euclidean distance in world units.
    pub dist_world: Fixed,
    /// Euclidean distance in tiles.
    pub dist_tiles_euclid: Fixed,
    /// Distance is within the agent's vision range.
    pub within_vision_range: bool,
    /// No wall between agent and target. Ignores range and facing.
    pub has_line_of_sight: bool,
    /// Vision range, line of sight and field of view all pass.
    pub sees_target_now: bool,
}

/// Compute a fresh perception result for one agent.
#[must_use]
pub fn compute_perception(
    agent: &EnemyAgent,
    agent_pos: Vec2Fixed,
    facing: Option<&Facing>,
    target_pos: Vec2Fixed,
    grid: &Grid<'_>,
) -> PerceptionResult {
    let to_target = target_pos - agent_pos;
    let dist_world = agent_pos.distance(target_pos);
    let tile_size = grid.tile_size();

    let dist_tiles_euclid = if tile_size > Fixed::ZERO {
        dist_world / tile_size
    } else {
        Fixed::ZERO
    };
    let to_target_dir = to_target.normalize_or_zero();

    let within_vision_range = dist_world <= agent.profile.vision_range_world(tile_size);
    let has_line_of_sight = has_line_of_sight(grid, agent_pos, target_pos);
    let sees_target_now =
        within_vision_range && has_line_of_sight && passes_fov_cone(agent, facing, to_target_dir);

    PerceptionResult {
        to_target,
        to_target_dir,
        dist_world,
        dist_tiles_euclid,
        within_vision_range,
        has_line_of_sight,
        sees_target_now,
    }
}

/// Record a sighting. Returns `true` the first time the agent detects the target.
///
/// Detection is sticky: once set it never resets.
pub fn update_detection(agent: &mut EnemyAgent, perception: &PerceptionResult) -> bool {
    if perception.sees_target_now && !agent.has_seen_target {
        agent.has_seen_target = true;
        return true;
    }
    false
}

/// Field-of-view cone test.
///
/// Agents without a facing, or with an omni-directional half-angle, always
/// pass. Otherwise the angle between forward and `to_target_dir` must not
/// exceed the half-angle, evaluated as `clamp(dot) >= cos(half_angle)`.
#[must_use]
pub fn passes_fov_cone(agent: &EnemyAgent, facing: Option<&Facing>, to_target_dir: Vec2Fixed) -> bool {
    let Some(facing) = facing else {
        return true;
    };
    let Some(cos_half) = agent.fov_cos_half_angle() else {
        return true;
    };

    let dot = facing
        .forward()
        .dot(to_target_dir)
        .clamp(-Fixed::ONE, Fixed::ONE);
    dot >= cos_half
}

/// Whether the straight segment between two world points crosses no wall.
///
/// Points in the same tile always see each other. Rays that leave the map
/// are blocked, and an invalid grid blocks everything.
#[must_use]
pub fn has_line_of_sight(grid: &Grid<'_>, from: Vec2Fixed, to: Vec2Fixed) -> bool {
    if !grid.is_valid() {
        return false;
    }
    let tile_size = grid.tile_size();

    let delta = to - from;
    let dist_world = from.distance(to);
    if dist_world <= RAY_NUDGE {
        return true;
    }

    let dir = Vec2Fixed::new(delta.x / dist_world, delta.y / dist_world);
    let ray_x = from.x / tile_size + dir.x * RAY_NUDGE;
    let ray_y = from.y / tile_size + dir.y * RAY_NUDGE;

    // The end point is pulled back along the ray like the origin is pushed
    // forward, so an end point on a grid line belongs to the tile the ray
    // arrives from.
    let end_x = to.x / tile_size - dir.x * RAY_NUDGE;
    let end_y = to.y / tile_size - dir.y * RAY_NUDGE;
    let target = TileCoord::new(
        end_x.floor().to_num::<i32>(),
        end_y.floor().to_num::<i32>(),
    );
    let mut map_x = ray_x.floor().to_num::<i32>();
    let mut map_y = ray_y.floor().to_num::<i32>();
    if map_x == target.x && map_y == target.y {
        return true;
    }

    let step_x = if dir.x >= Fixed::ZERO { 1 } else { -1 };
    let step_y = if dir.y >= Fixed::ZERO { 1 } else { -1 };

    let delta_dist_x = axis_delta(dir.x);
    let delta_dist_y = axis_delta(dir.y);

    let next_grid_x = if step_x > 0 {
        ray_x.floor() + Fixed::ONE
    } else {
        ray_x.floor()
    };
    let next_grid_y = if step_y > 0 {
        ray_y.floor() + Fixed::ONE
    } else {
        ray_y.floor()
    };

    let mut side_dist_x = initial_side(next_grid_x - ray_x, dir.x, delta_dist_x);
    let mut side_dist_y = initial_side(next_grid_y - ray_y, dir.y, delta_dist_y);

    // Ray length from the nudged origin to the nudged end point.
    let segment_tiles = dist_world / tile_size - RAY_NUDGE - RAY_NUDGE;
    let mut traveled;
    let max_steps = (grid.width() + grid.height()) * 2 + 4;

    for _ in 0..max_steps {
        if (side_dist_x - side_dist_y).abs() <= CORNER_EPSILON {
            // Exact corner crossing: both flanking tiles must be open.
            let next_x = map_x + step_x;
            let next_y = map_y + step_y;

            traveled = side_dist_x;
            if traveled > segment_tiles {
                return true;
            }
            side_dist_x = side_dist_x.saturating_add(delta_dist_x);
            side_dist_y = side_dist_y.saturating_add(delta_dist_y);

            if grid.is_blocked(TileCoord::new(next_x, map_y))
                || grid.is_blocked(TileCoord::new(map_x, next_y))
            {
                return false;
            }

            map_x = next_x;
            map_y = next_y;
        } else if side_dist_x < side_dist_y {
            map_x += step_x;
            traveled = side_dist_x;
            side_dist_x = side_dist_x.saturating_add(delta_dist_x);
        } else {
            map_y += step_y;
            traveled = side_dist_y;
            side_dist_y = side_dist_y.saturating_add(delta_dist_y);
        }

        // The segment ended inside the previous tile without hitting a wall.
        if traveled > segment_tiles {
            return true;
        }
        if grid.is_blocked(TileCoord::new(map_x, map_y)) {
            return false;
        }
        if map_x == target.x && map_y == target.y {
            return true;
        }
    }

    false
}

/// Ray length, in tiles, between successive crossings of one grid axis.
fn axis_delta(component: Fixed) -> Fixed {
    if component.abs() < AXIS_EPSILON {
        Fixed::MAX
    } else {
        (Fixed::ONE / component).abs()
    }
}

/// Ray length, in tiles, to the first crossing of one grid axis.
fn initial_side(gap: Fixed, component: Fixed, delta: Fixed) -> Fixed {
    if component.abs() < AXIS_EPSILON {
        Fixed::MAX
    } else {
        gap.abs().saturating_mul(delta)
    }
}
