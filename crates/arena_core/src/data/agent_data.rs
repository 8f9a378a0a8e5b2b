//! Per-archetype agent profiles.

use serde::{de::Error, Deserialize, Deserializer, Serialize};

use crate::animation::AnimationSet;
use crate::components::EnemyClass;
use crate::math::{fixed_decimal, Fixed};

/// Numeric thresholds and animations for one agent archetype.
///
/// Ranges are in tiles and converted to world units with the map's tile
/// size at evaluation time. Inside an [`ArenaConfig`](super::ArenaConfig),
/// fields omitted from a class section keep that class's baseline from
/// [`AgentProfile::for_class`]. A standalone profile falls back to
/// [`AgentProfile::default`].
///
/// # Example RON
///
/// ```ron
/// AgentProfile(
///     vision_range_tiles: 12.0,
///     fov_half_angle_deg: 180.0,
///     melee_range_tiles: 1.0,
///     melee_damage: 10,
///     attack_cooldown: 1.0,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    /// Maximum distance at which the target can be seen.
    #[serde(with = "fixed_decimal")]
    pub vision_range_tiles: Fixed,

    /// Half-angle of the vision cone. 180 or more sees in every direction.
    #[serde(with = "fixed_decimal")]
    pub fov_half_angle_deg: Fixed,

    /// Distance at which a melee attack starts and lands.
    #[serde(with = "fixed_decimal")]
    pub melee_range_tiles: Fixed,

    /// Damage dealt by a melee hit.
    pub melee_damage: u32,

    /// Distance at which a ranged attack starts and lands.
    #[serde(with = "fixed_decimal")]
    pub ranged_range_tiles: Fixed,

    /// Damage dealt by a ranged hit or by each support projectile.
    pub ranged_damage: u32,

    /// Center of the band ranged agents try to hold.
    #[serde(with = "fixed_decimal")]
    pub preferred_range_tiles: Fixed,

    /// Half-width of the preferred band.
    #[serde(with = "fixed_decimal")]
    pub range_tolerance_tiles: Fixed,

    /// Seconds between attacks.
    #[serde(with = "fixed_decimal")]
    pub attack_cooldown: Fixed,

    /// Movement speed in world units per second.
    #[serde(with = "fixed_decimal")]
    pub move_speed: Fixed,

    /// Collision radius in world units.
    #[serde(with = "fixed_decimal")]
    pub radius: Fixed,

    /// Maximum health points.
    pub max_health: u32,

    /// Texture clips.
    pub animations: AnimationSet,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            vision_range_tiles: Fixed::from_num(12),
            fov_half_angle_deg: Fixed::from_num(180),
            melee_range_tiles: Fixed::ONE,
            melee_damage: 10,
            ranged_range_tiles: Fixed::from_num(8),
            ranged_damage: 8,
            preferred_range_tiles: Fixed::from_num(5),
            range_tolerance_tiles: Fixed::ONE,
            attack_cooldown: Fixed::ONE,
            move_speed: Fixed::from_num(120),
            radius: Fixed::from_num(14),
            max_health: 30,
            animations: AnimationSet::default(),
        }
    }
}

impl AgentProfile {
    /// Baseline profile for an archetype.
    #[must_use]
    pub fn for_class(class: EnemyClass) -> Self {
        match class {
            EnemyClass::Melee => Self {
                melee_damage: 12,
                move_speed: Fixed::from_num(140),
                max_health: 40,
                animations: AnimationSet::with_prefix("melee"),
                ..Self::default()
            },
            EnemyClass::Ranged => Self {
                ranged_damage: 8,
                animations: AnimationSet::with_prefix("ranged"),
                ..Self::default()
            },
            EnemyClass::Support => Self {
                ranged_damage: 4,
                move_speed: Fixed::from_num(110),
                max_health: 25,
                animations: AnimationSet::with_prefix("support"),
                ..Self::default()
            },
        }
    }

    /// Melee reach in world units.
    #[must_use]
    pub fn melee_range_world(&self, tile_size: Fixed) -> Fixed {
        self.melee_range_tiles * tile_size
    }

    /// Ranged reach in world units.
    #[must_use]
    pub fn ranged_range_world(&self, tile_size: Fixed) -> Fixed {
        self.ranged_range_tiles * tile_size
    }

    /// Vision radius in world units.
    #[must_use]
    pub fn vision_range_world(&self, tile_size: Fixed) -> Fixed {
        self.vision_range_tiles * tile_size
    }
}

// ============================================================================
// Class-aware deserialization
// ============================================================================

/// Hand-written overrides for one class section of a config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileOverrides {
    vision_range_tiles: Option<f64>,
    fov_half_angle_deg: Option<f64>,
    melee_range_tiles: Option<f64>,
    melee_damage: Option<u32>,
    ranged_range_tiles: Option<f64>,
    ranged_damage: Option<u32>,
    preferred_range_tiles: Option<f64>,
    range_tolerance_tiles: Option<f64>,
    attack_cooldown: Option<f64>,
    move_speed: Option<f64>,
    radius: Option<f64>,
    max_health: Option<u32>,
    animations: Option<AnimationSet>,
}

fn override_fixed<E: Error>(slot: &mut Fixed, value: Option<f64>, field: &str) -> Result<(), E> {
    if let Some(value) = value {
        *slot = Fixed::checked_from_num(value)
            .ok_or_else(|| E::custom(format!("{field}: value {value} is out of fixed-point range")))?;
    }
    Ok(())
}

impl ProfileOverrides {
    fn apply<E: Error>(self, mut profile: AgentProfile) -> Result<AgentProfile, E> {
        override_fixed(&mut profile.vision_range_tiles, self.vision_range_tiles, "vision_range_tiles")?;
        override_fixed(&mut profile.fov_half_angle_deg, self.fov_half_angle_deg, "fov_half_angle_deg")?;
        override_fixed(&mut profile.melee_range_tiles, self.melee_range_tiles, "melee_range_tiles")?;
        override_fixed(&mut profile.ranged_range_tiles, self.ranged_range_tiles, "ranged_range_tiles")?;
        override_fixed(
            &mut profile.preferred_range_tiles,
            self.preferred_range_tiles,
            "preferred_range_tiles",
        )?;
        override_fixed(
            &mut profile.range_tolerance_tiles,
            self.range_tolerance_tiles,
            "range_tolerance_tiles",
        )?;
        override_fixed(&mut profile.attack_cooldown, self.attack_cooldown, "attack_cooldown")?;
        override_fixed(&mut profile.move_speed, self.move_speed, "move_speed")?;
        override_fixed(&mut profile.radius, self.radius, "radius")?;

        if let Some(damage) = self.melee_damage {
            profile.melee_damage = damage;
        }
        if let Some(damage) = self.ranged_damage {
            profile.ranged_damage = damage;
        }
        if let Some(health) = self.max_health {
            profile.max_health = health;
        }
        if let Some(animations) = self.animations {
            profile.animations = animations;
        }
        Ok(profile)
    }
}

fn deserialize_for_class<'de, D>(deserializer: D, class: EnemyClass) -> Result<AgentProfile, D::Error>
where
    D: Deserializer<'de>,
{
    ProfileOverrides::deserialize(deserializer)?.apply(AgentProfile::for_class(class))
}

/// Deserialize the melee section on top of the melee baseline.
pub(crate) fn deserialize_melee<'de, D: Deserializer<'de>>(d: D) -> Result<AgentProfile, D::Error> {
    deserialize_for_class(d, EnemyClass::Melee)
}

/// Deserialize the ranged section on top of the ranged baseline.
pub(crate) fn deserialize_ranged<'de, D: Deserializer<'de>>(d: D) -> Result<AgentProfile, D::Error> {
    deserialize_for_class(d, EnemyClass::Ranged)
}

/// Deserialize the support section on top of the support baseline.
pub(crate) fn deserialize_support<'de, D: Deserializer<'de>>(d: D) -> Result<AgentProfile, D::Error> {
    deserialize_for_class(d, EnemyClass::Support)
}
