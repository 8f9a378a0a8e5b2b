//! Test fixtures and helpers.
//!
//! ASCII maps, tile-center positions and pre-populated arenas for
//! consistent testing.

use arena_core::components::{EnemyClass, EntityId};
use arena_core::data::ArenaConfig;
use arena_core::map::Tilemap;
use arena_core::math::Vec2Fixed;
use arena_core::simulation::{AgentSpawnParams, Arena};
use fixed::types::I32F32;

/// Tile size used by every fixture, in world units.
pub const TEST_TILE_SIZE: i32 = 64;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// World position of the center of tile `(x, y)`.
#[must_use]
pub fn tile_center(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(
        x * TEST_TILE_SIZE + TEST_TILE_SIZE / 2,
        y * TEST_TILE_SIZE + TEST_TILE_SIZE / 2,
    )
}

/// Build a map from ASCII rows (`#` is a wall).
///
/// # Panics
///
/// Panics if the rows are empty or ragged.
#[must_use]
pub fn tile_map(rows: &[&str]) -> Tilemap {
    Tilemap::from_rows(rows, fixed(TEST_TILE_SIZE)).expect("fixture map rows must be valid")
}

/// A wall-free map of the given size.
///
/// # Panics
///
/// Panics if either dimension is zero.
#[must_use]
pub fn open_map(width: u32, height: u32) -> Tilemap {
    Tilemap::new(width, height, fixed(TEST_TILE_SIZE)).expect("fixture map size must be positive")
}

/// An arena on `rows` with the default configuration.
#[must_use]
pub fn arena_from_rows(rows: &[&str]) -> Arena {
    Arena::new(tile_map(rows), ArenaConfig::default())
}

/// Spawn the target at the center of a tile.
///
/// # Panics
///
/// Panics if the tile is outside the map or a wall.
pub fn spawn_target_at(arena: &mut Arena, tile: (i32, i32), max_health: u32) -> EntityId {
    arena
        .spawn_target(tile_center(tile.0, tile.1), max_health)
        .expect("fixture target tile must be open")
}

/// Spawn an agent at the center of a tile with default parameters.
///
/// # Panics
///
/// Panics if the tile is outside the map or a wall.
pub fn spawn_agent_at(arena: &mut Arena, class: EnemyClass, tile: (i32, i32)) -> EntityId {
    arena
        .spawn_agent(class, tile_center(tile.0, tile.1), AgentSpawnParams::default())
        .expect("fixture agent tile must be open")
}

/// A walled room with pillars, a target in the middle and `agents` agents
/// of rotating classes along the border.
///
/// Used by determinism tests and benchmarks.
#[must_use]
pub fn crowded_arena(agents: usize) -> Arena {
    const WIDTH: i32 = 24;
    const HEIGHT: i32 = 16;

    let rows: Vec<String> = (0..HEIGHT)
        .map(|y| {
            (0..WIDTH)
                .map(|x| {
                    let border = x == 0 || y == 0 || x == WIDTH - 1 || y == HEIGHT - 1;
                    let pillar = x % 6 == 3 && y % 5 == 2;
                    if border || pillar {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect()
        })
        .collect();

    let map = Tilemap::from_rows(&rows, fixed(TEST_TILE_SIZE)).expect("crowded map is valid");
    let mut arena = Arena::new(map, ArenaConfig::default());
    spawn_target_at(&mut arena, (WIDTH / 2, HEIGHT / 2), 10_000);

    let border_tiles = (1..WIDTH - 1)
        .flat_map(|x| [(x, 1), (x, HEIGHT - 2)])
        .chain((2..HEIGHT - 2).flat_map(|y| [(1, y), (WIDTH - 2, y)]));
    for (i, tile) in border_tiles.take(agents).enumerate() {
        let class = EnemyClass::ALL[i % EnemyClass::ALL.len()];
        spawn_agent_at(&mut arena, class, tile);
    }

    arena
}
