//! Data-driven agent configuration.
//!
//! Pure data structures deserialized from RON. This module performs no IO;
//! callers read the text and hand it to [`ArenaConfig::from_ron_str`].

mod agent_data;
mod tuning;

use serde::{Deserialize, Serialize};

pub use agent_data::AgentProfile;
pub use tuning::{CombatTuning, OrbitTuning, ProjectileParams};

use crate::components::EnemyClass;
use crate::error::{ArenaError, Result};

/// Everything the AI core needs besides the map and the entities.
///
/// Every section is optional in RON; omitted sections use the defaults.
///
/// # Example RON
///
/// ```ron
/// ArenaConfig(
///     ranged: (preferred_range_tiles: 6.0, range_tolerance_tiles: 1.5),
///     combat: (dodge_chance: 0.5),
///     orbit: (drift_weight: 0.2),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Melee archetype.
    #[serde(deserialize_with = "agent_data::deserialize_melee")]
    pub melee: AgentProfile,
    /// Ranged archetype.
    #[serde(deserialize_with = "agent_data::deserialize_ranged")]
    pub ranged: AgentProfile,
    /// Support archetype.
    #[serde(deserialize_with = "agent_data::deserialize_support")]
    pub support: AgentProfile,
    /// Attack and dodge timing.
    pub combat: CombatTuning,
    /// Orbit scoring weights.
    pub orbit: OrbitTuning,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            melee: AgentProfile::for_class(EnemyClass::Melee),
            ranged: AgentProfile::for_class(EnemyClass::Ranged),
            support: AgentProfile::for_class(EnemyClass::Support),
            combat: CombatTuning::default(),
            orbit: OrbitTuning::default(),
        }
    }
}

impl ArenaConfig {
    /// Parse a config from RON text.
    ///
    /// `source_name` labels the text in error messages (usually a path).
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ConfigParse`] if the text is not valid RON for
    /// this structure.
    pub fn from_ron_str(text: &str, source_name: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| ArenaError::ConfigParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Profile for an archetype.
    #[must_use]
    pub fn profile(&self, class: EnemyClass) -> &AgentProfile {
        match class {
            EnemyClass::Melee => &self.melee,
            EnemyClass::Ranged => &self.ranged,
            EnemyClass::Support => &self.support,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ArenaConfig::from_ron_str("()", "inline").unwrap();
        assert_eq!(config, ArenaConfig::default());
    }

    #[test]
    fn test_partial_config_overrides() {
        let text = r"(
            ranged: (preferred_range_tiles: 6.0, range_tolerance_tiles: 1.5),
            combat: (dodge_chance: 0.5, support_burst_count: 5),
            orbit: (drift_weight: 0.2),
        )";
        let config = ArenaConfig::from_ron_str(text, "inline").unwrap();

        assert_eq!(config.ranged.preferred_range_tiles, Fixed::from_num(6));
        assert_eq!(config.ranged.range_tolerance_tiles, Fixed::from_num(1.5));
        assert_eq!(config.combat.dodge_chance, Fixed::from_num(0.5));
        assert_eq!(config.combat.support_burst_count, 5);
        assert_eq!(config.orbit.drift_weight, Fixed::from_num(0.2));
        // Untouched sections keep their defaults.
        assert_eq!(config.melee, AgentProfile::for_class(EnemyClass::Melee));
        // Untouched fields of a touched section keep the class baseline.
        let baseline = AgentProfile::for_class(EnemyClass::Ranged);
        assert_eq!(config.ranged.animations, baseline.animations);
        assert_eq!(config.ranged.ranged_damage, baseline.ranged_damage);
        assert_eq!(config.combat.projectile, ProjectileParams::default());
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = ArenaConfig::from_ron_str("(combat: (dodge_chance: \"high\"))", "bad.ron")
            .unwrap_err();
        match err {
            ArenaError::ConfigParse { source_name, .. } => assert_eq!(source_name, "bad.ron"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_support_override_keeps_support_baseline() {
        let config = ArenaConfig::from_ron_str("(support: (max_health: 50))", "inline").unwrap();
        let expected = AgentProfile {
            max_health: 50,
            ..AgentProfile::for_class(EnemyClass::Support)
        };
        assert_eq!(config.support, expected);
    }

    #[test]
    fn test_out_of_range_profile_value_is_rejected() {
        let err = ArenaConfig::from_ron_str("(melee: (move_speed: 1e30))", "huge.ron");
        assert!(matches!(err, Err(ArenaError::ConfigParse { .. })));
    }

    #[test]
    fn test_profile_lookup() {
        let config = ArenaConfig::default();
        assert_eq!(config.profile(EnemyClass::Support), &config.support);
    }
}
