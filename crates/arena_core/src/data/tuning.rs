//! Shared combat and movement tuning.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, Fixed};

/// Parameters copied into every support projectile spawn request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileParams {
    /// Travel speed in world units per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Collision radius in world units.
    #[serde(with = "fixed_decimal")]
    pub radius: Fixed,
    /// Seconds before the projectile expires.
    #[serde(with = "fixed_decimal")]
    pub lifetime: Fixed,
    /// Rendered size as a fraction of a tile.
    #[serde(with = "fixed_decimal")]
    pub visual_size: Fixed,
    /// Sprite scale factor.
    #[serde(with = "fixed_decimal")]
    pub sprite_scale: Fixed,
    /// Vertical sprite offset as a fraction of a tile.
    #[serde(with = "fixed_decimal")]
    pub height_shift: Fixed,
    /// Seconds during which the projectile cannot hit its owner.
    #[serde(with = "fixed_decimal")]
    pub ignore_owner_time: Fixed,
    /// Texture identifier.
    pub texture: String,
    /// Gap between the owner's edge and the projectile's edge at spawn.
    #[serde(with = "fixed_decimal")]
    pub spawn_clearance: Fixed,
    /// Step, in tiles, used to push a spawn point out of a wall.
    #[serde(with = "fixed_decimal")]
    pub wall_nudge_tiles: Fixed,
    /// Maximum number of nudge steps before the shot is dropped.
    pub wall_nudge_attempts: u32,
}

impl Default for ProjectileParams {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(1500),
            radius: Fixed::from_num(5),
            lifetime: Fixed::from_num(5),
            visual_size: Fixed::from_num(0.22),
            sprite_scale: Fixed::ONE,
            height_shift: Fixed::from_num(0.15),
            ignore_owner_time: Fixed::from_num(0.06),
            texture: "support_projectile".to_string(),
            spawn_clearance: Fixed::from_num(6),
            wall_nudge_tiles: Fixed::from_num(0.2),
            wall_nudge_attempts: 8,
        }
    }
}

/// Attack and dodge timing shared by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Projectiles per support burst.
    pub support_burst_count: u32,
    /// Seconds between shots of a burst.
    #[serde(with = "fixed_decimal")]
    pub support_burst_interval: Fixed,
    /// Shortest dodge, in seconds.
    #[serde(with = "fixed_decimal")]
    pub dodge_min_duration: Fixed,
    /// Longest dodge, in seconds.
    #[serde(with = "fixed_decimal")]
    pub dodge_max_duration: Fixed,
    /// Chance to dodge instead of attacking again when both are possible.
    #[serde(with = "fixed_decimal")]
    pub dodge_chance: Fixed,
    /// Support projectile parameters.
    pub projectile: ProjectileParams,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            support_burst_count: 3,
            support_burst_interval: Fixed::from_num(0.08),
            dodge_min_duration: Fixed::from_num(0.2),
            dodge_max_duration: Fixed::from_num(1.5),
            dodge_chance: Fixed::from_num(0.25),
            projectile: ProjectileParams::default(),
        }
    }
}

/// Weights of the orbit tile score. Lower scores win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitTuning {
    /// Weight of the distance from the preferred band.
    #[serde(with = "fixed_decimal")]
    pub range_weight: Fixed,
    /// Weight of the deviation from the tangent direction.
    #[serde(with = "fixed_decimal")]
    pub tangential_weight: Fixed,
    /// Flat penalty for stepping against the orbit direction.
    #[serde(with = "fixed_decimal")]
    pub wrong_side_penalty: Fixed,
    /// Weight of the range change relative to the current tile.
    #[serde(with = "fixed_decimal")]
    pub drift_weight: Fixed,
    /// Candidates further than `tolerance * tolerance_expand` from the
    /// preferred range are not considered.
    #[serde(with = "fixed_decimal")]
    pub tolerance_expand: Fixed,
}

impl Default for OrbitTuning {
    fn default() -> Self {
        Self {
            range_weight: Fixed::ONE,
            tangential_weight: Fixed::from_num(0.7),
            wrong_side_penalty: Fixed::from_num(0.4),
            drift_weight: Fixed::from_num(0.15),
            tolerance_expand: Fixed::from_num(2),
        }
    }
}
