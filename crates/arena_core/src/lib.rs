//! # Arena Core
//!
//! Deterministic NPC AI core for a tile-based arena.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (configuration arrives as text)
//! - No shared randomness (every agent owns a seeded xorshift state)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless scenario runs for AI testing
//! - Replays from a seed
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Read-only navigation grid and wall collision queries
//! - [`distance_field`] - Cached breadth-first distance to the target
//! - [`perception`] - Vision range, line of sight and field of view
//! - [`movement`] - Greedy approach, retreat and orbit tile selection
//! - [`reservation`] - Per-tick tile claims and conflict resolution
//! - [`combat`] - Attack, burst and dodge state machine
//! - [`orchestrator`] - Per-tick driver sequencing all of the above
//! - [`simulation`] - Entity storage and the [`simulation::Arena`] loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod animation;
pub mod combat;
pub mod components;
pub mod data;
pub mod distance_field;
pub mod error;
pub mod grid;
pub mod map;
pub mod math;
pub mod movement;
pub mod orchestrator;
pub mod perception;
pub mod reservation;
pub mod rng;
pub mod simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::animation::{AnimationClip, AnimationSet, ClipKind, Sprite};
    pub use crate::combat::{CombatControl, DamageEvent, ProjectileSpawnRequest, StateTransition};
    pub use crate::components::*;
    pub use crate::data::{AgentProfile, ArenaConfig, CombatTuning, OrbitTuning};
    pub use crate::distance_field::DistanceFieldCache;
    pub use crate::error::{ArenaError, Result};
    pub use crate::grid::{CollisionQuery, Grid, TileCoord};
    pub use crate::map::{CellType, TileMap, Tilemap};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::orchestrator::AgentOrchestrator;
    pub use crate::perception::PerceptionResult;
    pub use crate::reservation::{MoveReservation, OccupancySnapshot};
    pub use crate::simulation::{AgentSpawnParams, Arena, Entity, EntityStorage, TickEvents};
}
