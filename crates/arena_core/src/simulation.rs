//! Arena simulation loop.
//!
//! The [`Arena`] owns the entities, the navigation map and the
//! [`AgentOrchestrator`], and advances them with a caller-supplied time
//! step.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - Per-agent seeded RNG only
//! - Consistent iteration order (sorted entity IDs)
//! - Same inputs always produce same outputs
//!
//! # Example
//!
//! ```
//! use arena_core::components::EnemyClass;
//! use arena_core::data::ArenaConfig;
//! use arena_core::map::Tilemap;
//! use arena_core::math::{Fixed, Vec2Fixed};
//! use arena_core::simulation::{AgentSpawnParams, Arena};
//!
//! let map = Tilemap::from_rows(&["........"], Fixed::from_num(64)).unwrap();
//! let mut arena = Arena::new(map, ArenaConfig::default());
//!
//! arena.spawn_target(Vec2Fixed::from_ints(480, 32), 100).unwrap();
//! arena
//!     .spawn_agent(EnemyClass::Melee, Vec2Fixed::from_ints(32, 32), AgentSpawnParams::default())
//!     .unwrap();
//!
//! let events = arena.tick(Fixed::from_num(0.05));
//! assert_eq!(arena.get_tick(), 1);
//! assert_eq!(events.transitions.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::animation::{animation_system, enter_passive, Sprite};
use crate::combat::{DamageEvent, ProjectileSpawnRequest, StateTransition};
use crate::components::{
    EnemyAgent, EnemyClass, EntityId, Facing, Health, Position, Radius, Speed, TargetTag, Velocity,
};
use crate::data::{AgentProfile, ArenaConfig};
use crate::error::{ArenaError, Result};
use crate::grid::{CollisionQuery, Grid};
use crate::map::{TileMap, Tilemap};
use crate::math::{Fixed, Vec2Fixed};
use crate::orchestrator::AgentOrchestrator;
use crate::reservation::MoveReservation;
use crate::rng;

/// Collision radius used for bodies without a [`Radius`].
const MIN_BODY_RADIUS: Fixed = Fixed::ONE;

// ============================================================================
// Entities
// ============================================================================

/// An entity with optional components.
///
/// Only components that are `Some` are active for this entity. Systems
/// skip entities that lack a component they need.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier, assigned by [`EntityStorage`].
    pub id: EntityId,
    /// World position.
    pub position: Option<Position>,
    /// Velocity in world units per second.
    pub velocity: Option<Velocity>,
    /// Facing angle, used by the field-of-view test.
    pub facing: Option<Facing>,
    /// Collision radius.
    pub radius: Option<Radius>,
    /// Movement speed.
    pub speed: Option<Speed>,
    /// Hit points.
    pub health: Option<Health>,
    /// Marks the protagonist agents hunt.
    pub target_tag: Option<TargetTag>,
    /// Animation playback.
    pub sprite: Option<Sprite>,
    /// AI state.
    pub enemy_agent: Option<EnemyAgent>,
}

impl Entity {
    /// Create an entity with the given ID and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A target (protagonist) entity.
    #[must_use]
    pub fn target(position: Vec2Fixed, max_health: u32) -> Self {
        Self {
            position: Some(Position::new(position)),
            velocity: Some(Velocity::ZERO),
            radius: Some(Radius::new(Fixed::from_num(14))),
            health: Some(Health::new(max_health)),
            target_tag: Some(TargetTag),
            ..Self::default()
        }
    }

    /// A fully equipped agent of `class`, configured from `config`.
    ///
    /// Without an explicit seed or orbit direction in `params`, both are
    /// derived from `id` so agents spawned in sequence behave differently.
    #[must_use]
    pub fn agent(
        id: EntityId,
        class: EnemyClass,
        position: Vec2Fixed,
        config: &ArenaConfig,
        params: &AgentSpawnParams,
    ) -> Self {
        let profile = params
            .profile
            .clone()
            .unwrap_or_else(|| config.profile(class).clone());
        let seed = params.seed.unwrap_or_else(|| rng::seed_for_index(id.index));
        let clockwise = params.orbit_clockwise.unwrap_or(id.index % 2 == 0);

        let mut sprite = Sprite::default();
        enter_passive(&mut sprite, &profile.animations);

        let mut speed = Speed::new(profile.move_speed);
        if let Some(multiplier) = params.speed_multiplier {
            speed.multiplier = multiplier;
        }

        Self {
            id,
            position: Some(Position::new(position)),
            velocity: Some(Velocity::ZERO),
            facing: params.facing_degrees.map(Facing::new),
            radius: Some(Radius::new(profile.radius)),
            speed: Some(speed),
            health: Some(Health::new(profile.max_health)),
            target_tag: None,
            sprite: Some(sprite),
            enemy_agent: Some(EnemyAgent::new(class, profile, seed, clockwise)),
        }
    }
}

/// Optional overrides for [`Arena::spawn_agent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSpawnParams {
    /// RNG seed. Derived from the entity slot when absent.
    pub seed: Option<u32>,
    /// Facing in degrees. Agents without a facing see in every direction.
    pub facing_degrees: Option<Fixed>,
    /// Orbit direction. Alternates with the entity slot when absent.
    pub orbit_clockwise: Option<bool>,
    /// Velocity multiplier applied on top of the profile speed.
    pub speed_multiplier: Option<Fixed>,
    /// Profile override. Uses the class profile from the config when absent.
    pub profile: Option<AgentProfile>,
}

/// Generation-safe storage for all entities.
///
/// Destroyed slots are recycled with a bumped generation, so an id kept
/// after its entity was destroyed never resolves to a newer entity.
/// Iteration for systems goes through [`sorted_ids`](Self::sorted_ids).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Live entities by id.
    entities: HashMap<EntityId, Entity>,
    /// Current generation of every slot ever allocated.
    generations: Vec<u32>,
    /// Slots available for reuse, most recently freed last.
    free: Vec<u32>,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next [`create`](Self::create) call will assign.
    #[must_use]
    pub fn next_id(&self) -> EntityId {
        match self.free.last() {
            Some(&index) => EntityId::new(index, self.generations[index as usize]),
            None => EntityId::new(self.generations.len() as u32, 0),
        }
    }

    /// Insert an entity and return its id.
    pub fn create(&mut self, entity: Entity) -> EntityId {
        self.create_with(|id| Entity { id, ..entity })
    }

    /// Insert an entity built from its freshly assigned id.
    pub fn create_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.next_id();
        if self.free.pop().is_none() {
            self.generations.push(0);
        }
        let mut entity = build(id);
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity, retiring its id.
    pub fn destroy(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(generation) = self.generations.get_mut(id.index as usize) {
            *generation = generation.wrapping_add(1);
            self.free.push(id.index);
        }
        Some(entity)
    }

    /// Whether `id` refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Get the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Iterate mutably over all entities (not in deterministic order).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Entity)> {
        self.entities.iter_mut()
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Events generated during one arena tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number after this update.
    pub tick: u64,
    /// Direct damage applied this tick.
    pub damage_events: Vec<DamageEvent>,
    /// Projectiles requested this tick, for the projectile subsystem.
    pub projectile_spawns: Vec<ProjectileSpawnRequest>,
    /// Agent state changes.
    pub transitions: Vec<StateTransition>,
    /// Resolved tile claims.
    pub reservations: Vec<MoveReservation>,
    /// Entities whose health reached zero this tick.
    pub deaths: Vec<EntityId>,
}

/// The arena: map, entities and AI, advanced one tick at a time.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Agents** - perception, combat, planning and reservations
/// 2. **Damage** - apply direct damage to its targets
/// 3. **Movement** - integrate velocities with wall sliding
/// 4. **Animation** - advance every sprite
#[derive(Debug, Clone)]
pub struct Arena {
    /// Ticks run so far.
    tick: u64,
    /// All entities.
    entities: EntityStorage,
    /// Navigation map.
    map: Tilemap,
    /// Profiles and tunings used for spawning.
    config: ArenaConfig,
    /// AI driver, owner of the distance-field cache.
    orchestrator: AgentOrchestrator,
}

impl Arena {
    /// Create an empty arena on `map`.
    #[must_use]
    pub fn new(map: Tilemap, config: ArenaConfig) -> Self {
        let orchestrator = AgentOrchestrator::new(&config);
        Self {
            tick: 0,
            entities: EntityStorage::new(),
            map,
            config,
            orchestrator,
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Get a reference to the entity storage.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Get a mutable reference to the entity storage.
    pub fn entities_mut(&mut self) -> &mut EntityStorage {
        &mut self.entities
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// The navigation map.
    #[must_use]
    pub fn map(&self) -> &Tilemap {
        &self.map
    }

    /// Mutable access to the navigation map. Edits invalidate the
    /// distance field on the next tick.
    pub fn map_mut(&mut self) -> &mut Tilemap {
        &mut self.map
    }

    /// The configuration the arena was created with.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The AI driver.
    #[must_use]
    pub fn orchestrator(&self) -> &AgentOrchestrator {
        &self.orchestrator
    }

    /// The first live target, in id order.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.entities
            .sorted_ids()
            .into_iter()
            .find(|&id| self.entities.get(id).is_some_and(|e| e.target_tag.is_some()))
    }

    /// Spawn the protagonist at a world position.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidSpawn`] if the position is outside the
    /// map or inside a wall.
    pub fn spawn_target(&mut self, position: Vec2Fixed, max_health: u32) -> Result<EntityId> {
        self.check_spawn_position(position)?;
        let id = self.entities.create(Entity::target(position, max_health));
        tracing::debug!(entity = %id, "Spawned target");
        Ok(id)
    }

    /// Spawn an agent of `class` at a world position.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidSpawn`] if the position is outside the
    /// map or inside a wall.
    pub fn spawn_agent(
        &mut self,
        class: EnemyClass,
        position: Vec2Fixed,
        params: AgentSpawnParams,
    ) -> Result<EntityId> {
        self.check_spawn_position(position)?;
        let config = &self.config;
        let id = self
            .entities
            .create_with(|id| Entity::agent(id, class, position, config, &params));
        tracing::debug!(entity = %id, class = ?class, "Spawned agent");
        Ok(id)
    }

    /// Remove an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::EntityNotFound`] if the entity is not alive.
    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        self.entities
            .destroy(id)
            .map(|_| ())
            .ok_or(ArenaError::EntityNotFound(id))
    }

    fn check_spawn_position(&self, position: Vec2Fixed) -> Result<()> {
        let grid = Grid::from_map(&self.map);
        let tile = grid.world_to_tile(position);
        if !grid.in_bounds(tile) {
            return Err(ArenaError::InvalidSpawn(format!(
                "position ({}, {}) is outside the map",
                position.x, position.y
            )));
        }
        if grid.is_blocked(tile) {
            return Err(ArenaError::InvalidSpawn(format!(
                "tile ({}, {}) is a wall",
                tile.x, tile.y
            )));
        }
        Ok(())
    }

    /// Advance the arena by `dt` seconds.
    ///
    /// A non-positive `dt` still runs the AI (with zero elapsed time) but
    /// moves nothing and advances no animation.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let dt = dt.max(Fixed::ZERO);

        // 1. Agents
        let output = self.orchestrator.update(&mut self.entities, &self.map, dt);

        // 2. Damage
        let deaths = self.apply_damage(&output.damage_events);

        // 3. Movement
        if dt > Fixed::ZERO {
            self.run_movement_system(dt);
        }

        // 4. Animation
        animation_system(
            self.entities
                .iter_mut()
                .filter_map(|(_, entity)| entity.sprite.as_mut()),
            dt,
        );

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Arena state hash");
        }

        TickEvents {
            tick: self.tick,
            damage_events: output.damage_events,
            projectile_spawns: output.projectile_spawns,
            transitions: output.transitions,
            reservations: output.reservations,
            deaths,
        }
    }

    /// Apply direct damage in event order. Returns entities that died.
    fn apply_damage(&mut self, events: &[DamageEvent]) -> Vec<EntityId> {
        let mut deaths = Vec::new();
        for event in events {
            let Some(health) = self
                .entities
                .get_mut(event.target)
                .and_then(|entity| entity.health.as_mut())
            else {
                continue;
            };
            let was_dead = health.is_dead();
            health.apply_damage(event.damage);
            if !was_dead && health.is_dead() {
                tracing::debug!(entity = %event.target, attacker = %event.attacker, "Entity killed");
                deaths.push(event.target);
            }
        }
        deaths
    }

    /// Integrate velocities, sliding along walls one axis at a time.
    fn run_movement_system(&mut self, dt: Fixed) {
        let grid = Grid::from_map(&self.map);
        for id in self.entities.sorted_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let (Some(position), Some(velocity)) = (entity.position.as_mut(), entity.velocity) else {
                continue;
            };
            if velocity.is_stationary() {
                continue;
            }
            let radius = entity
                .radius
                .map_or(MIN_BODY_RADIUS, |r| r.value.max(MIN_BODY_RADIUS));
            position.value = slide(&grid, position.value, velocity.value.scale(dt), radius);
        }
    }

    /// Calculate a hash of the current arena state.
    ///
    /// Two arenas with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            id.hash(&mut hasher);

            if let Some(ref pos) = entity.position {
                pos.value.x.to_bits().hash(&mut hasher);
                pos.value.y.to_bits().hash(&mut hasher);
            }
            if let Some(ref vel) = entity.velocity {
                vel.value.x.to_bits().hash(&mut hasher);
                vel.value.y.to_bits().hash(&mut hasher);
            }
            if let Some(ref health) = entity.health {
                health.current.hash(&mut hasher);
                health.max.hash(&mut hasher);
            }
            if let Some(ref sprite) = entity.sprite {
                sprite.clip.hash(&mut hasher);
                sprite.current_frame.hash(&mut hasher);
                sprite.playing.hash(&mut hasher);
            }
            if let Some(ref agent) = entity.enemy_agent {
                agent.state.hash(&mut hasher);
                agent.has_seen_target.hash(&mut hasher);
                agent.cooldown_remaining.to_bits().hash(&mut hasher);
                agent.attack_damage_applied.hash(&mut hasher);
                agent.burst.shots_remaining.hash(&mut hasher);
                agent.burst.timer.to_bits().hash(&mut hasher);
                agent.dodge.active.hash(&mut hasher);
                agent.dodge.remaining.to_bits().hash(&mut hasher);
                agent.rng_state.hash(&mut hasher);
            }
        }

        hasher.finish()
    }
}

/// Move by `delta`, dropping each axis whose step would overlap a wall.
fn slide(collision: &dyn CollisionQuery, start: Vec2Fixed, delta: Vec2Fixed, radius: Fixed) -> Vec2Fixed {
    let mut position = start;

    let along_x = Vec2Fixed::new(position.x + delta.x, position.y);
    if delta.x != Fixed::ZERO && !collision.circle_hits_wall(along_x, radius) {
        position = along_x;
    }

    let along_y = Vec2Fixed::new(position.x, position.y + delta.y);
    if delta.y != Fixed::ZERO && !collision.circle_hits_wall(along_y, radius) {
        position = along_y;
    }

    position
}
