//! Property tests for the navigation, perception and reservation modules.

use std::collections::BTreeSet;

use arena_core::components::{EnemyAgent, EnemyClass, EntityId, Facing};
use arena_core::data::AgentProfile;
use arena_core::distance_field::{DistanceField, DistanceFieldCache};
use arena_core::grid::{Grid, TileCoord, DIRECTIONS_8};
use arena_core::map::Tilemap;
use arena_core::math::{deg_to_rad, sin_cos, Fixed, Vec2Fixed};
use arena_core::perception::{has_line_of_sight, passes_fov_cone};
use arena_core::reservation::{resolve_move_reservations, MoveReservation, OccupancySnapshot};
use arena_test_utils::determinism::strategies::{
    arb_degrees, arb_entity_id, arb_half_angle, arb_map_rows, arb_tile,
};
use arena_test_utils::fixtures::{open_map, TEST_TILE_SIZE};
use proptest::prelude::*;

const WIDTH: usize = 10;
const HEIGHT: usize = 8;

fn map_from(rows: &[String]) -> Tilemap {
    Tilemap::from_rows(rows, Fixed::from_num(TEST_TILE_SIZE)).unwrap()
}

fn agent_with_half_angle(half_angle: Fixed) -> EnemyAgent {
    let profile = AgentProfile {
        fov_half_angle_deg: half_angle,
        ..AgentProfile::for_class(EnemyClass::Ranged)
    };
    EnemyAgent::new(EnemyClass::Ranged, profile, 1, true)
}

/// One claim per agent: a start tile and a direction index (8 = stay).
fn arb_claims() -> impl Strategy<Value = Vec<(i32, i32, usize)>> {
    proptest::collection::vec((0..WIDTH as i32, 0..HEIGHT as i32, 0usize..9), 1..24)
}

/// A world point inside a `width` x `height` map, off its outer edge.
///
/// Offsets start at zero, so tile boundaries and corners are drawn too.
fn arb_interior_point(width: i32, height: i32) -> impl Strategy<Value = Vec2Fixed> {
    (0..width, 0..height, 0..TEST_TILE_SIZE, 0..TEST_TILE_SIZE).prop_map(|(tx, ty, ox, oy)| {
        let ox = if tx == 0 { ox.max(1) } else { ox };
        let oy = if ty == 0 { oy.max(1) } else { oy };
        Vec2Fixed::from_ints(tx * TEST_TILE_SIZE + ox, ty * TEST_TILE_SIZE + oy)
    })
}

/// A point on an inner tile boundary line of a `size` x `size` map.
fn arb_boundary_point(size: i32) -> impl Strategy<Value = Vec2Fixed> {
    (1..size, 1..size * TEST_TILE_SIZE, any::<bool>()).prop_map(|(line, along, vertical)| {
        let across = line * TEST_TILE_SIZE;
        if vertical {
            Vec2Fixed::from_ints(across, along)
        } else {
            Vec2Fixed::from_ints(along, across)
        }
    })
}

proptest! {
    /// No two agents newly enter the same tile in one tick.
    #[test]
    fn prop_reservations_grant_each_tile_once(
        rows in arb_map_rows(WIDTH, HEIGHT),
        claims in arb_claims(),
        occupied in proptest::collection::vec((0..WIDTH as i32, 0..HEIGHT as i32), 0..10),
    ) {
        let map = map_from(&rows);
        let grid = Grid::from_map(&map);
        let occupancy = OccupancySnapshot::from_tiles(
            occupied.iter().map(|&(x, y)| TileCoord::new(x, y)),
        );

        let mut reservations: Vec<MoveReservation> = claims
            .iter()
            .enumerate()
            .map(|(i, &(x, y, dir))| {
                let id = EntityId::new(i as u32, 0);
                let from = TileCoord::new(x, y);
                match DIRECTIONS_8.get(dir) {
                    Some(&(dx, dy)) => MoveReservation::new(id, from, from.offset(dx, dy)),
                    None => MoveReservation::stay(id, from),
                }
            })
            .collect();

        let granted = resolve_move_reservations(&grid, &occupancy, &mut reservations);

        let mut destinations = BTreeSet::new();
        for r in &reservations {
            prop_assert!(r.final_tile == r.from_tile || r.final_tile == r.intended_tile);
            if r.granted() {
                prop_assert!(destinations.insert(r.final_tile), "tile granted twice");
                prop_assert!(grid.in_bounds(r.final_tile));
                prop_assert!(!grid.is_blocked(r.final_tile));
                prop_assert!(!occupancy.contains(r.final_tile));
            }
        }
        prop_assert_eq!(granted, destinations.len());

        // Each contested tile goes to the smallest id among valid claimants.
        for r in reservations.iter().filter(|r| r.granted()) {
            let smallest = reservations
                .iter()
                .filter(|o| {
                    o.wants_move && o.intended_tile == r.final_tile && o.intended_tile != o.from_tile
                })
                .map(|o| o.entity)
                .min();
            prop_assert_eq!(smallest, Some(r.entity));
        }
    }

    /// Two agents stepping into the same free tile: the smaller id moves.
    #[test]
    fn prop_contested_tile_goes_to_smaller_id(
        tile in arb_tile(WIDTH as i32 - 2, HEIGHT as i32 - 2),
        a in arb_entity_id(),
        b in arb_entity_id(),
    ) {
        prop_assume!(a != b);
        let map = open_map(WIDTH as u32, HEIGHT as u32);
        let grid = Grid::from_map(&map);
        let dest = tile.offset(1, 1);

        let mut reservations = vec![
            MoveReservation::new(a, dest.offset(-1, 0), dest),
            MoveReservation::new(b, dest.offset(1, 0), dest),
        ];
        let occupancy = OccupancySnapshot::default();
        let granted = resolve_move_reservations(&grid, &occupancy, &mut reservations);

        prop_assert_eq!(granted, 1);
        let winner = reservations.iter().find(|r| r.granted()).map(|r| r.entity);
        prop_assert_eq!(winner, Some(a.min(b)));
    }

    /// Widening the cone never hides a target that was visible.
    #[test]
    fn prop_fov_is_monotone_in_half_angle(
        facing in arb_degrees(),
        bearing in arb_degrees(),
        a in arb_half_angle(),
        b in arb_half_angle(),
    ) {
        let (narrow, wide) = if a <= b { (a, b) } else { (b, a) };
        let (sin, cos) = sin_cos(deg_to_rad(bearing));
        let dir = Vec2Fixed::new(cos, sin).normalize_or_zero();
        let facing = Facing::new(facing);

        let narrow_passes = passes_fov_cone(&agent_with_half_angle(narrow), Some(&facing), dir);
        let wide_passes = passes_fov_cone(&agent_with_half_angle(wide), Some(&facing), dir);
        prop_assert!(!narrow_passes || wide_passes);
    }

    /// With no walls every pair of points sees each other.
    #[test]
    fn prop_open_grid_always_has_line_of_sight(
        (width, height, pairs) in (1i32..16, 1i32..16).prop_flat_map(|(w, h)| {
            let pair = (arb_interior_point(w, h), arb_interior_point(w, h));
            (Just(w), Just(h), proptest::collection::vec(pair, 1..8))
        }),
    ) {
        let map = open_map(width.unsigned_abs(), height.unsigned_abs());
        let grid = Grid::from_map(&map);
        for (from, to) in pairs {
            prop_assert!(has_line_of_sight(&grid, from, to), "{from:?} -> {to:?}");
            prop_assert!(has_line_of_sight(&grid, to, from), "{to:?} -> {from:?}");
        }
    }

    /// Points standing on tile boundaries see and are seen on an open grid.
    #[test]
    fn prop_open_grid_line_of_sight_on_tile_boundaries(
        from in arb_boundary_point(6),
        to in prop_oneof![arb_boundary_point(6), arb_interior_point(6, 6)],
    ) {
        let map = open_map(6, 6);
        let grid = Grid::from_map(&map);
        prop_assert!(has_line_of_sight(&grid, from, to), "{from:?} -> {to:?}");
        prop_assert!(has_line_of_sight(&grid, to, from), "{to:?} -> {from:?}");
    }

    /// Rebuilding for the same map and target gives the same field, and the
    /// cache skips the rebuild.
    #[test]
    fn prop_distance_field_is_deterministic(
        rows in arb_map_rows(WIDTH, HEIGHT),
        tx in 0..WIDTH as i32,
        ty in 0..HEIGHT as i32,
    ) {
        let map = map_from(&rows);
        let grid = Grid::from_map(&map);
        let target = TileCoord::new(tx, ty);

        let first = DistanceField::build(&grid, target);
        let second = DistanceField::build(&grid, target);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), WIDTH * HEIGHT);

        let mut cache = DistanceFieldCache::new();
        prop_assert!(cache.rebuild_if_needed(&grid, target));
        let built = cache.field().clone();
        prop_assert!(!cache.rebuild_if_needed(&grid, target));
        prop_assert_eq!(cache.field(), &built);
        prop_assert_eq!(&built, &first);

        if !grid.is_blocked(target) {
            prop_assert_eq!(first.get(target), 0);
        }
    }

    /// Neighboring reached tiles differ by at most one hop.
    #[test]
    fn prop_distance_field_is_consistent(
        rows in arb_map_rows(WIDTH, HEIGHT),
        tx in 0..WIDTH as i32,
        ty in 0..HEIGHT as i32,
    ) {
        let map = map_from(&rows);
        let grid = Grid::from_map(&map);
        let field = DistanceField::build(&grid, TileCoord::new(tx, ty));

        for index in 0..grid.tile_count() {
            let tile = grid.tile_at(index);
            let here = field.get(tile);
            if here < 0 {
                continue;
            }
            for &(dx, dy) in &DIRECTIONS_8 {
                if !grid.can_step(tile, dx, dy) {
                    continue;
                }
                let there = field.get(tile.offset(dx, dy));
                prop_assert!(there >= 0);
                prop_assert!((here - there).abs() <= 1);
            }
        }
    }
}
