//! Per-tick driver for every agent.
//!
//! # Tick Order
//!
//! 1. Locate the target and build the [`Grid`] for the current map.
//! 2. Rebuild the distance field if the map or target tile changed.
//! 3. Freeze the occupancy snapshot (tiles of all agents).
//! 4. For each agent in id order: cooldown, perception, sticky detection,
//!    combat, then either a straight-line velocity or a tile claim.
//! 5. Resolve all tile claims and turn the results into velocities.
//!
//! The orchestrator only writes velocities, agent state and sprites.
//! Positions are integrated by the caller.

use serde::{Deserialize, Serialize};

use crate::animation::{enter_moving, ClipKind};
use crate::combat::{
    enter_moving_state, enter_passive_state, update_combat, CombatContext, CombatControl,
    DamageEvent, ProjectileSpawnRequest, StateTransition,
};
use crate::components::{AgentState, EnemyAgent, EnemyClass, EntityId};
use crate::data::{ArenaConfig, CombatTuning, OrbitTuning};
use crate::distance_field::DistanceFieldCache;
use crate::grid::{Grid, TileCoord};
use crate::map::TileMap;
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::{orbit, step_away, step_toward, OrbitRequest};
use crate::perception::{compute_perception, update_detection, PerceptionResult};
use crate::reservation::{resolve_move_reservations, MoveReservation, OccupancySnapshot};
use crate::simulation::{Entity, EntityStorage};

/// What the locomotion step decided for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locomotion {
    /// Stand still.
    Stop,
    /// Walk in a straight line with this velocity.
    Straight(Vec2Fixed),
    /// Claim the neighboring tile.
    Step(TileCoord),
}

/// Everything the orchestrator produced in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorOutput {
    /// Direct damage dealt to the target.
    pub damage_events: Vec<DamageEvent>,
    /// Projectiles requested by support bursts.
    pub projectile_spawns: Vec<ProjectileSpawnRequest>,
    /// Agent state changes.
    pub transitions: Vec<StateTransition>,
    /// Resolved tile claims, in agent id order.
    pub reservations: Vec<MoveReservation>,
}

/// Runs perception, combat and movement planning for all agents.
///
/// Owns the distance-field cache so the BFS runs at most once per tick no
/// matter how many agents query it.
#[derive(Debug, Clone, Default)]
pub struct AgentOrchestrator {
    cache: DistanceFieldCache,
    combat: CombatTuning,
    orbit: OrbitTuning,
}

impl AgentOrchestrator {
    /// Create an orchestrator using the tunings from `config`.
    #[must_use]
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            cache: DistanceFieldCache::new(),
            combat: config.combat.clone(),
            orbit: config.orbit,
        }
    }

    /// The distance-field cache.
    #[must_use]
    pub fn distance_field(&self) -> &DistanceFieldCache {
        &self.cache
    }

    /// Run one tick over every agent in `entities`.
    ///
    /// Agents missing a position, velocity, speed, sprite or agent
    /// component are skipped. Without a positioned target every agent is
    /// stopped.
    pub fn update(
        &mut self,
        entities: &mut EntityStorage,
        map: &dyn TileMap,
        dt: Fixed,
    ) -> OrchestratorOutput {
        let dt = dt.max(Fixed::ZERO);
        let mut output = OrchestratorOutput::default();
        let ids = entities.sorted_ids();

        let Some((target_id, target_pos)) = find_target(entities, &ids) else {
            stop_all_agents(entities, &ids);
            return output;
        };

        let grid = Grid::from_map(map);
        let target_tile = grid.world_to_tile(target_pos);
        self.cache.rebuild_if_needed(&grid, target_tile);

        let occupancy = OccupancySnapshot::from_tiles(ids.iter().filter_map(|&id| {
            let entity = entities.get(id)?;
            entity.enemy_agent.as_ref()?;
            Some(grid.world_to_tile(entity.position?.value))
        }));

        let mut claims: Vec<MoveReservation> = Vec::new();

        for &id in &ids {
            if id == target_id {
                continue;
            }
            let Some(entity) = entities.get_mut(id) else {
                continue;
            };
            let Some(locomotion) = self.update_agent(
                id,
                target_id,
                target_pos,
                target_tile,
                entity,
                &grid,
                &occupancy,
                dt,
                &mut output,
            ) else {
                continue;
            };

            let Some(position) = entity.position else {
                continue;
            };
            let from = grid.world_to_tile(position.value);
            let Some(velocity) = entity.velocity.as_mut() else {
                continue;
            };
            match locomotion {
                Locomotion::Stop => {
                    velocity.value = Vec2Fixed::ZERO;
                    claims.push(MoveReservation::stay(id, from));
                }
                Locomotion::Straight(value) => {
                    velocity.value = value;
                    claims.push(MoveReservation::stay(id, from));
                }
                Locomotion::Step(next) => {
                    // Velocity is assigned once the claim is resolved.
                    velocity.value = Vec2Fixed::ZERO;
                    claims.push(MoveReservation::new(id, from, next));
                }
            }
        }

        resolve_move_reservations(&grid, &occupancy, &mut claims);
        apply_granted_moves(entities, &grid, &claims);
        output.reservations = claims;
        output
    }

    /// Perception, detection and combat for one agent. Returns `None` when
    /// the agent lacks the components it needs.
    #[allow(clippy::too_many_arguments)]
    fn update_agent(
        &self,
        id: EntityId,
        target_id: EntityId,
        target_pos: Vec2Fixed,
        target_tile: TileCoord,
        entity: &mut Entity,
        grid: &Grid<'_>,
        occupancy: &OccupancySnapshot,
        dt: Fixed,
        output: &mut OrchestratorOutput,
    ) -> Option<Locomotion> {
        let Entity {
            position,
            velocity,
            facing,
            radius,
            speed,
            sprite,
            enemy_agent,
            ..
        } = entity;
        let (Some(position), Some(_), Some(speed), Some(sprite), Some(agent)) =
            (position.as_ref(), velocity.as_ref(), speed.as_ref(), sprite.as_mut(), enemy_agent.as_mut())
        else {
            return None;
        };
        let pos = position.value;

        agent.tick_cooldown(dt);

        let perception = compute_perception(agent, pos, facing.as_ref(), target_pos, grid);
        if update_detection(agent, &perception) {
            enter_moving_state(agent, sprite, id, &mut output.transitions);
        }
        if !agent.has_seen_target {
            enter_passive_state(agent, sprite, id, &mut output.transitions);
            return Some(Locomotion::Stop);
        }
        if agent.state == AgentState::Passive {
            enter_moving_state(agent, sprite, id, &mut output.transitions);
        }

        let effective_speed = speed.effective();
        let ctx = CombatContext {
            entity: id,
            target: target_id,
            position: pos,
            radius: radius.map_or(Fixed::ZERO, |r| r.value),
            speed: effective_speed,
            tile_size: grid.tile_size(),
            dt,
            collision: grid,
            tuning: &self.combat,
        };
        let outcome = update_combat(agent, sprite, &perception, &ctx);
        output.damage_events.extend(outcome.damage);
        output.projectile_spawns.extend(outcome.projectiles);
        output.transitions.extend(outcome.transitions);

        match outcome.control {
            CombatControl::Hold => Some(Locomotion::Stop),
            CombatControl::Dodge(velocity) => Some(Locomotion::Straight(velocity)),
            CombatControl::Free => {
                enter_moving(sprite, &agent.profile.animations, ClipKind::Walk);
                Some(self.plan_locomotion(
                    agent,
                    pos,
                    target_pos,
                    target_tile,
                    &perception,
                    effective_speed,
                    grid,
                    occupancy,
                ))
            }
        }
    }

    /// Choose how a free agent moves this tick.
    ///
    /// With line of sight the agent walks straight: melee agents close in,
    /// ranged agents approach, back off or strafe to stay in their band.
    /// Without line of sight it claims a neighbor tile chosen on the
    /// distance field.
    #[allow(clippy::too_many_arguments)]
    fn plan_locomotion(
        &self,
        agent: &EnemyAgent,
        pos: Vec2Fixed,
        target_pos: Vec2Fixed,
        target_tile: TileCoord,
        perception: &PerceptionResult,
        speed: Fixed,
        grid: &Grid<'_>,
        occupancy: &OccupancySnapshot,
    ) -> Locomotion {
        let toward = perception.to_target_dir;
        let current = grid.world_to_tile(pos);

        if agent.class == EnemyClass::Melee {
            if perception.has_line_of_sight {
                return Locomotion::Straight(toward.scale(speed));
            }
            if !grid.in_bounds(current) {
                return Locomotion::Stop;
            }
            let next = step_toward(grid, &self.cache, occupancy, current, target_tile);
            return step_or_stop(current, next);
        }

        let profile = &agent.profile;
        let desired = profile.preferred_range_tiles;
        let tolerance = profile.range_tolerance_tiles;
        let dist_tiles = self.range_in_tiles(grid, current, perception);
        let too_far = dist_tiles > desired + tolerance;
        let too_close = dist_tiles < desired - tolerance;

        if perception.has_line_of_sight {
            let direction = if too_far {
                toward
            } else if too_close {
                -toward
            } else {
                toward.perpendicular(agent.orbit_clockwise)
            };
            return Locomotion::Straight(direction.scale(speed));
        }

        if !grid.in_bounds(current) {
            return Locomotion::Stop;
        }

        let next = if too_far {
            step_toward(grid, &self.cache, occupancy, current, target_tile)
        } else if too_close {
            step_away(grid, &self.cache, occupancy, current)
        } else {
            let request = OrbitRequest {
                agent_world: pos,
                target_world: target_pos,
                desired_range_tiles: desired,
                tolerance_tiles: tolerance,
                to_target_dir: toward,
                clockwise: agent.orbit_clockwise,
            };
            orbit(grid, occupancy, current, &request, &self.orbit)
        };
        step_or_stop(current, next)
    }

    /// Path distance to the target in tiles, falling back to the rounded
    /// straight-line distance where the field has no value.
    fn range_in_tiles(&self, grid: &Grid<'_>, current: TileCoord, perception: &PerceptionResult) -> Fixed {
        let hops = self.cache.get_dist(current);
        if hops >= 0 {
            return Fixed::from_num(hops);
        }
        if grid.tile_size() <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        (perception.dist_world / grid.tile_size()).round()
    }
}

fn step_or_stop(current: TileCoord, next: TileCoord) -> Locomotion {
    if next == current {
        Locomotion::Stop
    } else {
        Locomotion::Step(next)
    }
}

/// First entity (in id order) tagged as the target that has a position.
fn find_target(entities: &EntityStorage, ids: &[EntityId]) -> Option<(EntityId, Vec2Fixed)> {
    ids.iter().find_map(|&id| {
        let entity = entities.get(id)?;
        entity.target_tag?;
        Some((id, entity.position?.value))
    })
}

fn stop_all_agents(entities: &mut EntityStorage, ids: &[EntityId]) {
    for &id in ids {
        let Some(entity) = entities.get_mut(id) else {
            continue;
        };
        if entity.enemy_agent.is_none() {
            continue;
        }
        if let Some(velocity) = entity.velocity.as_mut() {
            velocity.value = Vec2Fixed::ZERO;
        }
    }
}

/// Point every granted agent at the center of its new tile.
fn apply_granted_moves(entities: &mut EntityStorage, grid: &Grid<'_>, claims: &[MoveReservation]) {
    for claim in claims.iter().filter(|claim| claim.granted()) {
        let Some(entity) = entities.get_mut(claim.entity) else {
            continue;
        };
        let (Some(position), Some(speed)) = (entity.position, entity.speed) else {
            continue;
        };
        let Some(velocity) = entity.velocity.as_mut() else {
            continue;
        };
        let center = grid.tile_center_world(claim.final_tile);
        velocity.value = (center - position.value)
            .normalize_or_zero()
            .scale(speed.effective());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Position, Velocity};
    use crate::map::Tilemap;
    use crate::simulation::AgentSpawnParams;

    const TILE: i32 = 64;

    fn center(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x * TILE + TILE / 2, y * TILE + TILE / 2)
    }

    fn tile_map(rows: &[&str]) -> Tilemap {
        Tilemap::from_rows(rows, Fixed::from_num(TILE)).unwrap()
    }

    fn spawn_agent(
        entities: &mut EntityStorage,
        config: &ArenaConfig,
        class: EnemyClass,
        tile: (i32, i32),
    ) -> EntityId {
        let params = AgentSpawnParams::default();
        entities.create_with(|id| Entity::agent(id, class, center(tile.0, tile.1), config, &params))
    }

    fn spawn_target(entities: &mut EntityStorage, tile: (i32, i32)) -> EntityId {
        entities.create(Entity::target(center(tile.0, tile.1), 100))
    }

    fn velocity_of(entities: &EntityStorage, id: EntityId) -> Vec2Fixed {
        entities.get(id).and_then(|e| e.velocity).map(|v| v.value).unwrap()
    }

    fn agent_of(entities: &EntityStorage, id: EntityId) -> &EnemyAgent {
        entities.get(id).and_then(|e| e.enemy_agent.as_ref()).unwrap()
    }

    #[test]
    fn test_no_target_stops_agents() {
        let map = tile_map(&["....."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Melee, (0, 0));
        entities.get_mut(agent).unwrap().velocity = Some(Velocity::new(Vec2Fixed::from_ints(5, 0)));

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert!(output.reservations.is_empty());
        assert!(velocity_of(&entities, agent).is_zero());
    }

    #[test]
    fn test_unseen_target_keeps_agent_passive() {
        let map = tile_map(&["..#..", "..#..", "..#.."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (4, 1));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Melee, (0, 1));

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert_eq!(agent_of(&entities, agent).state, AgentState::Passive);
        assert!(!agent_of(&entities, agent).has_seen_target);
        assert!(velocity_of(&entities, agent).is_zero());
        assert!(output.transitions.is_empty());
    }

    #[test]
    fn test_sighting_switches_to_moving_and_walks_straight() {
        let map = tile_map(&["........"]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (6, 0));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Melee, (1, 0));

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert_eq!(agent_of(&entities, agent).state, AgentState::Moving);
        assert_eq!(output.transitions.len(), 1);
        assert_eq!(output.transitions[0].from, AgentState::Passive);
        let velocity = velocity_of(&entities, agent);
        assert!(velocity.x > Fixed::ZERO);
        assert_eq!(velocity.y, Fixed::ZERO);
    }

    #[test]
    fn test_detection_is_sticky_behind_walls() {
        let mut map = tile_map(&["......", "......", "......"]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (5, 1));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Melee, (0, 1));

        let mut orchestrator = AgentOrchestrator::new(&config);
        orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));
        assert!(agent_of(&entities, agent).has_seen_target);

        map.set_cell(2, 0, crate::map::CellType::Wall);
        map.set_cell(2, 1, crate::map::CellType::Wall);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert!(agent_of(&entities, agent).has_seen_target);
        assert_eq!(agent_of(&entities, agent).state, AgentState::Moving);
        // No sight line: the agent claims a tile on the distance field.
        let claim = output.reservations.iter().find(|r| r.entity == agent).unwrap();
        assert!(claim.wants_move);
        assert!(claim.granted());
        assert!(!velocity_of(&entities, agent).is_zero());
    }

    #[test]
    fn test_contested_tile_granted_to_lower_id() {
        // Both agents are cut off from the target by the wall row and
        // descend onto (4,0) above the gap.
        let map = tile_map(&[
            ".........",
            "####.####",
            ".........",
            ".........",
            ".........",
            ".........",
            ".........",
        ]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        let first = spawn_agent(&mut entities, &config, EnemyClass::Melee, (3, 0));
        let second = spawn_agent(&mut entities, &config, EnemyClass::Melee, (5, 0));
        spawn_target(&mut entities, (4, 6));
        for id in [first, second] {
            entities.get_mut(id).unwrap().enemy_agent.as_mut().unwrap().has_seen_target = true;
        }

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        let claim = |id| output.reservations.iter().find(|r| r.entity == id).unwrap();
        assert_eq!(claim(first).intended_tile, TileCoord::new(4, 0));
        assert_eq!(claim(second).intended_tile, TileCoord::new(4, 0));
        assert_eq!(claim(first).final_tile, TileCoord::new(4, 0));
        assert_eq!(claim(second).final_tile, TileCoord::new(5, 0));
        assert!(velocity_of(&entities, first).x > Fixed::ZERO);
        assert!(velocity_of(&entities, second).is_zero());
    }

    #[test]
    fn test_missing_components_skip_agent() {
        let map = tile_map(&["....."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (4, 0));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Ranged, (0, 0));
        entities.get_mut(agent).unwrap().speed = None;

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert!(output.reservations.is_empty());
        assert_eq!(agent_of(&entities, agent).state, AgentState::Passive);
    }

    #[test]
    fn test_ranged_strafes_inside_band() {
        let map = tile_map(&["...........", "...........", "..........."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (10, 1));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Ranged, (5, 1));
        // Cooling down, so it cannot fire and repositions instead.
        {
            let enemy = entities.get_mut(agent).unwrap().enemy_agent.as_mut().unwrap();
            enemy.has_seen_target = true;
            enemy.state = AgentState::Moving;
            enemy.cooldown_remaining = Fixed::from_num(5);
        }

        let mut orchestrator = AgentOrchestrator::new(&config);
        orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        let velocity = velocity_of(&entities, agent);
        assert_eq!(velocity.x, Fixed::ZERO);
        assert_ne!(velocity.y, Fixed::ZERO);
    }

    #[test]
    fn test_ranged_backs_off_when_too_close() {
        let map = tile_map(&["...........", "...........", "..........."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (10, 1));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Ranged, (8, 1));
        {
            let enemy = entities.get_mut(agent).unwrap().enemy_agent.as_mut().unwrap();
            enemy.has_seen_target = true;
            enemy.state = AgentState::Moving;
            enemy.cooldown_remaining = Fixed::from_num(5);
        }

        let mut orchestrator = AgentOrchestrator::new(&config);
        orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));

        assert!(velocity_of(&entities, agent).x < Fixed::ZERO);
    }

    #[test]
    fn test_field_rebuilt_once_per_target_tile() {
        let map = tile_map(&["........"]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (7, 0));
        for x in 0..3 {
            spawn_agent(&mut entities, &config, EnemyClass::Ranged, (x, 0));
        }

        let mut orchestrator = AgentOrchestrator::new(&config);
        orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));
        orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));
        assert_eq!(orchestrator.distance_field().build_count(), 1);
    }

    #[test]
    fn test_agent_without_position_is_not_in_snapshot() {
        let map = tile_map(&["....."]);
        let config = ArenaConfig::default();
        let mut entities = EntityStorage::new();
        spawn_target(&mut entities, (4, 0));
        let agent = spawn_agent(&mut entities, &config, EnemyClass::Melee, (0, 0));
        entities.get_mut(agent).unwrap().position = None::<Position>;

        let mut orchestrator = AgentOrchestrator::new(&config);
        let output = orchestrator.update(&mut entities, &map, Fixed::from_num(0.05));
        assert!(output.reservations.is_empty());
    }
}
