//! Component definitions.
//!
//! Components are pure data with no behavior beyond small accessors. Agent
//! entities are composed of these components; systems in
//! [`crate::orchestrator`] and [`crate::combat`] read and mutate them.

use serde::{Deserialize, Serialize};

use crate::data::AgentProfile;
use crate::math::{cos, deg_to_rad, fixed_serde, sin_cos, Fixed, Vec2Fixed};

// ============================================================================
// Entity Identity
// ============================================================================

/// Generation-safe entity identifier.
///
/// Slots are recycled after destruction with a bumped generation, so a
/// stale id never aliases a newer entity. Ids order by `(index, generation)`,
/// which is the order used for deterministic iteration and conflict
/// tie-breaking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct EntityId {
    /// Slot index.
    pub index: u32,
    /// Generation of the slot at creation time.
    pub generation: u32,
}

impl EntityId {
    /// Create an entity id.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// Spatial Components
// ============================================================================

/// Position component in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// World position.
    pub value: Vec2Fixed,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }
}

/// Velocity component, in world units per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Velocity vector.
    pub value: Vec2Fixed,
}

impl Velocity {
    /// Zero velocity (stationary).
    pub const ZERO: Self = Self {
        value: Vec2Fixed::ZERO,
    };

    /// Create a new velocity.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }

    /// Check if the entity is stationary.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.value.is_zero()
    }
}

/// Facing angle in degrees. 0° points along +x, 90° along +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Facing {
    /// Angle in degrees.
    #[serde(with = "fixed_serde")]
    pub degrees: Fixed,
}

impl Facing {
    /// Create a facing from degrees.
    #[must_use]
    pub const fn new(degrees: Fixed) -> Self {
        Self { degrees }
    }

    /// Unit forward vector.
    #[must_use]
    pub fn forward(&self) -> Vec2Fixed {
        let (sin, cos) = sin_cos(deg_to_rad(self.degrees));
        Vec2Fixed::new(cos, sin)
    }
}

/// Collision radius in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Radius {
    /// Radius value.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
}

impl Radius {
    /// Create a radius.
    #[must_use]
    pub const fn new(value: Fixed) -> Self {
        Self { value }
    }
}

/// Movement speed in world units per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speed {
    /// Base speed.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
    /// Multiplier applied on top of the base speed (slows, hastes).
    #[serde(with = "fixed_serde")]
    pub multiplier: Fixed,
}

impl Speed {
    /// Create a speed with a neutral multiplier.
    #[must_use]
    pub const fn new(value: Fixed) -> Self {
        Self {
            value,
            multiplier: Fixed::ONE,
        }
    }

    /// Effective speed, never negative.
    #[must_use]
    pub fn effective(&self) -> Fixed {
        (self.value * self.multiplier).max(Fixed::ZERO)
    }
}

// ============================================================================
// Health & Tags
// ============================================================================

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create a new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Check if the entity is dead (health is zero).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }
}

/// Marks the protagonist every agent perceives and hunts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetTag;

// ============================================================================
// Agent Components
// ============================================================================

/// Behavior archetype of an agent.
///
/// All three share one state machine and differ only in numeric thresholds,
/// animation sets and how an attack resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyClass {
    /// Close-range attacker; damage applies within melee range.
    Melee,
    /// Hitscan attacker; needs range and sight.
    Ranged,
    /// Fires a burst of projectiles; same gating as [`EnemyClass::Ranged`].
    Support,
}

impl EnemyClass {
    /// All classes in a stable order.
    pub const ALL: [Self; 3] = [Self::Melee, Self::Ranged, Self::Support];

    /// Whether the class attacks at range (and may dodge).
    #[must_use]
    pub const fn is_ranged(self) -> bool {
        matches!(self, Self::Ranged | Self::Support)
    }
}

/// Coarse agent state exposed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// Has never seen the target. Stands still.
    #[default]
    Passive,
    /// Knows about the target and is moving (or dodging).
    Moving,
    /// Committed to an attack animation.
    Attacking,
}

/// Direction class of a ranged dodge, relative to the target direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DodgeDirection {
    /// Strafe to the left of the target direction.
    #[default]
    Left,
    /// Strafe to the right of the target direction.
    Right,
    /// Back away from the target.
    Back,
}

/// Transient ranged-dodge sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DodgeState {
    /// Whether a dodge is in progress.
    pub active: bool,
    /// Seconds left in the current dodge.
    #[serde(with = "fixed_serde")]
    pub remaining: Fixed,
    /// Chosen direction class.
    pub direction: DodgeDirection,
    /// Unit world direction of the dodge.
    pub world_dir: Vec2Fixed,
}

impl DodgeState {
    /// End the dodge.
    pub fn clear(&mut self) {
        self.active = false;
        self.remaining = Fixed::ZERO;
        self.world_dir = Vec2Fixed::ZERO;
    }
}

/// Support burst-fire counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BurstState {
    /// Shots left in the current burst.
    pub shots_remaining: u32,
    /// Seconds until the next shot.
    #[serde(with = "fixed_serde")]
    pub timer: Fixed,
}

impl BurstState {
    /// Cancel the burst.
    pub fn reset(&mut self) {
        self.shots_remaining = 0;
        self.timer = Fixed::ZERO;
    }
}

/// Per-agent AI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyAgent {
    /// Behavior archetype.
    pub class: EnemyClass,
    /// Current state machine state.
    pub state: AgentState,
    /// Numeric thresholds and animation set.
    pub profile: AgentProfile,
    /// Seconds until the next attack may start.
    #[serde(with = "fixed_serde")]
    pub cooldown_remaining: Fixed,
    /// Animation frame at which the current attack takes effect.
    pub attack_apply_frame: usize,
    /// Whether the current attack already took effect.
    pub attack_damage_applied: bool,
    /// Sticky detection memory. Never resets once set.
    pub has_seen_target: bool,
    /// Support burst counters.
    pub burst: BurstState,
    /// Ranged dodge sub-state.
    pub dodge: DodgeState,
    /// Private xorshift32 state. Never shared between agents.
    pub rng_state: u32,
    /// Orbit direction around the target.
    pub orbit_clockwise: bool,
}

impl EnemyAgent {
    /// Create a fresh, passive agent.
    #[must_use]
    pub fn new(class: EnemyClass, profile: AgentProfile, rng_seed: u32, orbit_clockwise: bool) -> Self {
        Self {
            class,
            state: AgentState::Passive,
            profile,
            cooldown_remaining: Fixed::ZERO,
            attack_apply_frame: 0,
            attack_damage_applied: false,
            has_seen_target: false,
            burst: BurstState::default(),
            dodge: DodgeState::default(),
            rng_state: rng_seed,
            orbit_clockwise,
        }
    }

    /// Whether the attack cooldown has elapsed.
    #[must_use]
    pub fn cooldown_ready(&self) -> bool {
        self.cooldown_remaining <= Fixed::ZERO
    }

    /// Restart the attack cooldown.
    pub fn apply_cooldown(&mut self) {
        self.cooldown_remaining = self.profile.attack_cooldown.max(Fixed::ZERO);
    }

    /// Count the cooldown down by `dt` seconds. Negative deltas are ignored.
    pub fn tick_cooldown(&mut self, dt: Fixed) {
        if self.cooldown_remaining > Fixed::ZERO {
            self.cooldown_remaining = (self.cooldown_remaining - dt.max(Fixed::ZERO)).max(Fixed::ZERO);
        }
    }

    /// Cosine of the field-of-view half-angle, or `None` when omni-directional.
    #[must_use]
    pub fn fov_cos_half_angle(&self) -> Option<Fixed> {
        let half = self.profile.fov_half_angle_deg;
        if half >= OMNI_HALF_ANGLE_DEG {
            None
        } else {
            Some(cos(deg_to_rad(half.max(Fixed::ZERO))))
        }
    }
}

/// Half-angles at or above this many degrees see in every direction.
pub const OMNI_HALF_ANGLE_DEG: Fixed = Fixed::from_bits(772_879_364_915); // 179.95

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ArenaConfig;

    #[test]
    fn test_entity_id_ordering() {
        let a = EntityId::new(1, 5);
        let b = EntityId::new(2, 0);
        let c = EntityId::new(2, 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "1v5");
    }

    #[test]
    fn test_health_saturates() {
        let mut health = Health::new(10);
        health.apply_damage(4);
        assert_eq!(health.current, 6);
        health.apply_damage(100);
        assert_eq!(health.current, 0);
        assert!(health.is_dead());
    }

    #[test]
    fn test_speed_multiplier() {
        let mut speed = Speed::new(Fixed::from_num(100));
        speed.multiplier = Fixed::from_num(0.5);
        assert_eq!(speed.effective(), Fixed::from_num(50));
        speed.multiplier = Fixed::from_num(-1);
        assert_eq!(speed.effective(), Fixed::ZERO);
    }

    #[test]
    fn test_facing_forward() {
        let eps = Fixed::from_num(0.000_001);
        let east = Facing::new(Fixed::ZERO).forward();
        assert!((east.x - Fixed::ONE).abs() < eps && east.y.abs() < eps);
        let south = Facing::new(Fixed::from_num(90)).forward();
        assert!(south.x.abs() < eps && (south.y - Fixed::ONE).abs() < eps);
    }

    #[test]
    fn test_cooldown_never_negative() {
        let config = ArenaConfig::default();
        let mut agent = EnemyAgent::new(EnemyClass::Melee, config.melee, 1, true);
        agent.apply_cooldown();
        assert!(!agent.cooldown_ready());
        agent.tick_cooldown(Fixed::from_num(0.4));
        agent.tick_cooldown(Fixed::from_num(-5));
        assert!(!agent.cooldown_ready());
        agent.tick_cooldown(Fixed::from_num(10));
        assert_eq!(agent.cooldown_remaining, Fixed::ZERO);
        assert!(agent.cooldown_ready());
    }

    #[test]
    fn test_omni_threshold() {
        assert!(OMNI_HALF_ANGLE_DEG > Fixed::from_num(179.9));
        assert!(OMNI_HALF_ANGLE_DEG < Fixed::from_num(180));

        let config = ArenaConfig::default();
        let mut agent = EnemyAgent::new(EnemyClass::Ranged, config.ranged, 1, false);
        agent.profile.fov_half_angle_deg = Fixed::from_num(180);
        assert_eq!(agent.fov_cos_half_angle(), None);
        agent.profile.fov_half_angle_deg = Fixed::from_num(60);
        assert!(agent.fov_cos_half_angle().is_some());
    }
}
