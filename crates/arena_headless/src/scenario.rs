//! Scenario loading and configuration.
//!
//! Scenarios define the initial arena state for headless runs: the map as
//! ASCII rows, where the target stands, which agents spawn where, and how
//! long to run.

use std::path::Path;

use arena_core::components::EnemyClass;
use arena_core::data::ArenaConfig;
use arena_core::error::ArenaError;
use arena_core::map::{TileMap, Tilemap};
use arena_core::math::Fixed;
use arena_core::simulation::{AgentSpawnParams, Arena};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The arena rejected the map, the config or a spawn.
    #[error("Scenario setup failed: {0}")]
    Arena(#[from] ArenaError),
    /// Structurally valid but unusable values.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// Where the target stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlacement {
    /// Tile coordinate; the target spawns at its center.
    pub tile: (i32, i32),
    /// Starting (and maximum) health.
    #[serde(default = "default_target_health")]
    pub max_health: u32,
}

fn default_target_health() -> u32 {
    100
}

/// One agent to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPlacement {
    /// Archetype.
    pub class: EnemyClass,
    /// Tile coordinate; the agent spawns at its center.
    pub tile: (i32, i32),
    /// RNG seed. Derived from the entity slot when absent.
    #[serde(default)]
    pub seed: Option<u32>,
    /// Facing in whole degrees. Omni-directional when absent.
    #[serde(default)]
    pub facing_degrees: Option<i32>,
    /// Orbit direction. Alternates per agent when absent.
    #[serde(default)]
    pub orbit_clockwise: Option<bool>,
    /// Speed multiplier on top of the class speed.
    #[serde(default)]
    pub speed_multiplier: Option<f64>,
}

impl AgentPlacement {
    /// Placement with default parameters.
    #[must_use]
    pub fn new(class: EnemyClass, x: i32, y: i32) -> Self {
        Self {
            class,
            tile: (x, y),
            seed: None,
            facing_degrees: None,
            orbit_clockwise: None,
            speed_multiplier: None,
        }
    }

    fn spawn_params(&self) -> AgentSpawnParams {
        AgentSpawnParams {
            seed: self.seed,
            facing_degrees: self.facing_degrees.map(Fixed::from_num),
            orbit_clockwise: self.orbit_clockwise,
            speed_multiplier: self.speed_multiplier.map(Fixed::from_num),
            profile: None,
        }
    }
}

/// A complete scenario configuration.
///
/// # Example RON
///
/// ```ron
/// Scenario(
///     name: "Corridor",
///     map: [
///         "#########",
///         "#.......#",
///         "#########",
///     ],
///     target: Some((tile: (6, 1), max_health: 50)),
///     agents: [(class: Melee, tile: (1, 1))],
///     ticks: 200,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map rows, `#` for walls and `.` for floor.
    pub map: Vec<String>,
    /// Tile edge length in world units.
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// The target, if any. Without one every agent stands still.
    #[serde(default)]
    pub target: Option<TargetPlacement>,
    /// Agents to spawn, in order.
    #[serde(default)]
    pub agents: Vec<AgentPlacement>,
    /// Default number of ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Default tick length in milliseconds.
    #[serde(default = "default_dt_ms")]
    pub dt_ms: u32,
    /// Inline arena configuration. Defaults apply when absent.
    #[serde(default)]
    pub config: Option<ArenaConfig>,
}

fn default_tile_size() -> u32 {
    64
}

fn default_ticks() -> u64 {
    600
}

fn default_dt_ms() -> u32 {
    50
}

impl Default for Scenario {
    fn default() -> Self {
        Self::corridor()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A walled corridor with one melee agent chasing the target.
    #[must_use]
    pub fn corridor() -> Self {
        Self {
            name: "Corridor".to_string(),
            description: "One melee agent closes a straight gap".to_string(),
            map: ["#########", "#.......#", "#########"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            tile_size: default_tile_size(),
            target: Some(TargetPlacement {
                tile: (6, 1),
                max_health: default_target_health(),
            }),
            agents: vec![AgentPlacement::new(EnemyClass::Melee, 1, 1)],
            ticks: 200,
            dt_ms: default_dt_ms(),
            config: None,
        }
    }

    /// Tick length as fixed-point seconds.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        dt_from_millis(self.dt_ms)
    }

    /// Build the arena described by this scenario.
    ///
    /// `config_override` replaces the inline config when given.
    pub fn build_arena(&self, config_override: Option<ArenaConfig>) -> Result<Arena, ScenarioError> {
        if self.tile_size == 0 {
            return Err(ScenarioError::Invalid("tile_size must be positive".to_string()));
        }

        let map = Tilemap::from_rows(&self.map, Fixed::from_num(self.tile_size))?;
        let config = config_override
            .or_else(|| self.config.clone())
            .unwrap_or_default();
        let mut arena = Arena::new(map, config);

        if let Some(target) = self.target {
            let position = arena.map().tile_center_world(target.tile.0, target.tile.1);
            arena.spawn_target(position, target.max_health)?;
        }

        for placement in &self.agents {
            let position = arena
                .map()
                .tile_center_world(placement.tile.0, placement.tile.1);
            arena.spawn_agent(placement.class, position, placement.spawn_params())?;
        }

        tracing::debug!(
            scenario = %self.name,
            width = arena.map().width(),
            height = arena.map().height(),
            agents = self.agents.len(),
            "Scenario arena built"
        );
        Ok(arena)
    }
}

/// Load an [`ArenaConfig`] from a RON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ArenaConfig, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config = ArenaConfig::from_ron_str(&contents, &path.display().to_string())?;
    Ok(config)
}

/// Convert whole milliseconds to fixed-point seconds.
#[must_use]
pub fn dt_from_millis(millis: u32) -> Fixed {
    Fixed::from_num(millis) / Fixed::from_num(1000)
}
