//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the arena produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Agent behavior must be reproducible from a seed. Sources of
//! non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`arena_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **Shared randomness**: Every agent owns its xorshift state; no agent's
//!   draws can change another agent's behavior.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual module determinism (distance field, combat)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full arena scenarios are reproducible
//! 4. **Parallel tests**: Running N arenas on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use arena_core::math::Fixed;
use arena_core::simulation::Arena;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic arena).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Arena is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use arena_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run an arena twice with identical setup and compare final hashes.
///
/// # Returns
///
/// `true` if both runs produced identical state hashes.
pub fn verify_arena_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Arena,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |arena| {
            arena.tick(dt);
        },
        Arena::state_hash,
    );
    result.is_deterministic
}

/// Run N arenas on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under different thread
/// scheduling or memory layout.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_arenas<F>(setup_fn: F, num_arenas: usize, num_ticks: u64, dt: Fixed) -> Vec<u64>
where
    F: Fn() -> Arena + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_arenas)
            .map(|_| {
                s.spawn(|| {
                    let mut arena = setup_fn();
                    for _ in 0..num_ticks {
                        arena.tick(dt);
                    }
                    arena.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("arena worker panicked"))
            .collect()
    })
}

/// Compare two arena runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` at the first tick they differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Arena,
{
    let mut arena1 = setup_fn();
    let mut arena2 = setup_fn();

    if arena1.state_hash() != arena2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        arena1.tick(dt);
        arena2.tick(dt);

        if arena1.state_hash() != arena2.state_hash() {
            tracing::warn!(tick, "Arena runs diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for arena testing.
///
/// These strategies generate random but reproducible maps, tiles and
/// agent setups.
pub mod strategies {
    use arena_core::components::{EnemyClass, EntityId};
    use arena_core::grid::TileCoord;
    use arena_core::math::Fixed;
    use proptest::prelude::*;

    /// ASCII rows of a `width` x `height` map with roughly 20% walls.
    pub fn arb_map_rows(width: usize, height: usize) -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec(
            proptest::collection::vec(prop::bool::weighted(0.2), width),
            height,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|row| row.into_iter().map(|wall| if wall { '#' } else { '.' }).collect())
                .collect()
        })
    }

    /// A tile inside a `width` x `height` map.
    pub fn arb_tile(width: i32, height: i32) -> impl Strategy<Value = TileCoord> {
        (0..width, 0..height).prop_map(|(x, y)| TileCoord::new(x, y))
    }

    /// An entity id with a small index and generation.
    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        (0u32..64, 0u32..4).prop_map(|(index, generation)| EntityId::new(index, generation))
    }

    /// Any agent class.
    pub fn arb_enemy_class() -> impl Strategy<Value = EnemyClass> {
        prop_oneof![
            Just(EnemyClass::Melee),
            Just(EnemyClass::Ranged),
            Just(EnemyClass::Support),
        ]
    }

    /// An angle in degrees in `[0, 360)`.
    pub fn arb_degrees() -> impl Strategy<Value = Fixed> {
        (0i32..360).prop_map(Fixed::from_num)
    }

    /// A field-of-view half-angle in degrees in `[0, 180]`.
    pub fn arb_half_angle() -> impl Strategy<Value = Fixed> {
        (0i32..=180).prop_map(Fixed::from_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{arena_from_rows, crowded_arena, spawn_agent_at, spawn_target_at};
    use arena_core::components::EnemyClass;
    use proptest::prelude::*;

    fn dt() -> Fixed {
        Fixed::from_num(0.05)
    }

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_unique_hashes_reports_divergence() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            ticks: 1,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }

    #[test]
    fn test_empty_arena_determinism() {
        assert!(verify_arena_determinism(|| arena_from_rows(&["...."]), 50, dt()));
    }

    #[test]
    fn test_crowded_arena_determinism() {
        assert!(verify_arena_determinism(|| crowded_arena(18), 200, dt()));
    }

    #[test]
    fn test_find_divergence_on_deterministic_arena() {
        let divergence = find_first_divergence(|| crowded_arena(9), 150, dt());
        assert!(divergence.is_none(), "Expected no divergence");
    }

    #[test]
    fn test_parallel_arenas_match() {
        let hashes = run_parallel_arenas(|| crowded_arena(12), 4, 120, dt());
        assert_eq!(hashes.len(), 4);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Random agent placements should replay identically.
        #[test]
        fn prop_random_spawns_are_deterministic(
            class in strategies::arb_enemy_class(),
            x in 0i32..10,
            y in 0i32..6,
        ) {
            let setup = move || {
                let mut arena = arena_from_rows(&[
                    "............",
                    "....##......",
                    "............",
                    "............",
                    "......##....",
                    "............",
                    "............",
                ]);
                spawn_target_at(&mut arena, (11, 6), 500);
                if !matches!((x, y), (4 | 5, 1) | (6 | 7, 4)) {
                    spawn_agent_at(&mut arena, class, (x, y));
                }
                arena
            };

            let result = verify_determinism(2, 80, setup, |a| { a.tick(dt()); }, Arena::state_hash);
            prop_assert!(result.is_deterministic);
        }
    }
}
