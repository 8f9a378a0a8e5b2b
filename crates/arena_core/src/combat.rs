//! Per-agent combat state machine.
//!
//! ```text
//!            sees target            in range & cooldown ready
//! Passive ───────────────▶ Moving ───────────────────────────▶ Attacking
//!                            ▲  ▲                                  │
//!                            │  └────── animation finished ────────┤
//!                            │                                     │
//!                        dodge ends ◀── ranged dodge ◀─────────────┘
//! ```
//!
//! An attack takes effect exactly once, at the clip's apply frame, guarded
//! by [`EnemyAgent::attack_damage_applied`]. Support agents arm a projectile
//! burst at that frame instead of dealing direct damage; the burst is
//! cancelled the moment sight or range is lost. A ranged dodge is a timed
//! strafe inside the `Moving` state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::animation::{enter_attacking, enter_moving, enter_passive, ClipKind, Sprite};
use crate::components::{AgentState, DodgeDirection, DodgeState, EnemyAgent, EnemyClass, EntityId};
use crate::data::{CombatTuning, ProjectileParams};
use crate::grid::CollisionQuery;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::perception::PerceptionResult;
use crate::rng;

/// Smallest projectile radius used for spawn clearance.
const MIN_PROJECTILE_RADIUS: Fixed = Fixed::from_bits(1 << 31); // 0.5

// ============================================================================
// Events
// ============================================================================

/// Direct damage dealt by an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// The entity dealing damage.
    pub attacker: EntityId,
    /// The entity receiving damage.
    pub target: EntityId,
    /// Amount of damage dealt.
    pub damage: u32,
}

/// Request for the projectile subsystem to create a projectile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSpawnRequest {
    /// Firing agent.
    pub owner: EntityId,
    /// Spawn point, already pushed clear of walls.
    pub origin: Vec2Fixed,
    /// Unit flight direction.
    pub direction: Vec2Fixed,
    /// Speed in world units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage on hit.
    pub damage: u32,
    /// Collision radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Seconds before expiry.
    #[serde(with = "fixed_serde")]
    pub lifetime: Fixed,
    /// Rendered size as a fraction of a tile.
    #[serde(with = "fixed_serde")]
    pub visual_size: Fixed,
    /// Sprite scale.
    #[serde(with = "fixed_serde")]
    pub sprite_scale: Fixed,
    /// Vertical sprite offset as a fraction of a tile.
    #[serde(with = "fixed_serde")]
    pub height_shift: Fixed,
    /// Seconds during which the owner cannot be hit.
    #[serde(with = "fixed_serde")]
    pub ignore_owner_time: Fixed,
    /// Texture identifier.
    pub texture: String,
}

/// A state machine transition, reported for observers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Agent that changed state.
    pub entity: EntityId,
    /// Previous state.
    pub from: AgentState,
    /// New state.
    pub to: AgentState,
}

// ============================================================================
// Controller
// ============================================================================

/// How the combat controller constrains locomotion this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatControl {
    /// Combat does not need the body; the movement planner decides.
    Free,
    /// Stand still (attacking).
    Hold,
    /// Dodging with this velocity.
    Dodge(Vec2Fixed),
}

/// Per-tick inputs of the combat controller that do not live on the agent.
pub struct CombatContext<'a> {
    /// The agent being updated.
    pub entity: EntityId,
    /// The target it fights.
    pub target: EntityId,
    /// Agent world position.
    pub position: Vec2Fixed,
    /// Agent collision radius.
    pub radius: Fixed,
    /// Effective movement speed.
    pub speed: Fixed,
    /// Map tile size.
    pub tile_size: Fixed,
    /// Elapsed seconds, already clamped to be non-negative.
    pub dt: Fixed,
    /// Wall overlap queries.
    pub collision: &'a dyn CollisionQuery,
    /// Shared timing.
    pub tuning: &'a CombatTuning,
}

/// Everything the controller produced this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOutcome {
    /// Locomotion constraint.
    pub control: CombatControl,
    /// Direct damage, at most one per tick.
    pub damage: Option<DamageEvent>,
    /// Projectiles fired this tick.
    pub projectiles: Vec<ProjectileSpawnRequest>,
    /// State changes made this tick.
    pub transitions: Vec<StateTransition>,
}

impl CombatOutcome {
    fn new(control: CombatControl) -> Self {
        Self {
            control,
            damage: None,
            projectiles: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

/// Range checks shared by every branch of the controller.
#[derive(Debug, Clone, Copy)]
struct Reach {
    melee_in_range: bool,
    ranged_in_range: bool,
    ranged_can_shoot: bool,
}

impl Reach {
    fn evaluate(agent: &EnemyAgent, perception: &PerceptionResult, tile_size: Fixed) -> Self {
        let ranged_in_range = perception.dist_world <= agent.profile.ranged_range_world(tile_size);
        Self {
            melee_in_range: perception.dist_world <= agent.profile.melee_range_world(tile_size),
            ranged_in_range,
            ranged_can_shoot: ranged_in_range && perception.sees_target_now,
        }
    }

    /// Class-specific condition for starting (or landing) an attack.
    fn allows_attack(self, class: EnemyClass) -> bool {
        match class {
            EnemyClass::Melee => self.melee_in_range,
            EnemyClass::Ranged | EnemyClass::Support => self.ranged_can_shoot,
        }
    }
}

/// Run one tick of the combat state machine for an agent that has already
/// detected the target.
pub fn update_combat(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    perception: &PerceptionResult,
    ctx: &CombatContext<'_>,
) -> CombatOutcome {
    let reach = Reach::evaluate(agent, perception, ctx.tile_size);

    if agent.state == AgentState::Attacking {
        return update_attacking(agent, sprite, perception, ctx, reach);
    }

    let mut outcome = CombatOutcome::new(CombatControl::Free);

    if agent.dodge.active {
        if let Some(velocity) = update_dodge(agent, sprite, ctx) {
            outcome.control = CombatControl::Dodge(velocity);
            return outcome;
        }
    }

    if reach.allows_attack(agent.class) && agent.cooldown_ready() {
        start_attack(agent, sprite, ctx.entity, &mut outcome.transitions);
        outcome.control = CombatControl::Hold;
    }

    outcome
}

fn update_attacking(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    perception: &PerceptionResult,
    ctx: &CombatContext<'_>,
    reach: Reach,
) -> CombatOutcome {
    let mut outcome = CombatOutcome::new(CombatControl::Hold);

    if !agent.attack_damage_applied
        && (!sprite.playing || sprite.current_frame >= agent.attack_apply_frame)
    {
        agent.attack_damage_applied = true;
        match agent.class {
            EnemyClass::Melee | EnemyClass::Ranged => {
                if reach.allows_attack(agent.class) {
                    let damage = if agent.class == EnemyClass::Melee {
                        agent.profile.melee_damage
                    } else {
                        agent.profile.ranged_damage
                    };
                    outcome.damage = Some(DamageEvent {
                        attacker: ctx.entity,
                        target: ctx.target,
                        damage,
                    });
                }
            }
            EnemyClass::Support => {
                agent.burst.shots_remaining = ctx.tuning.support_burst_count;
                agent.burst.timer = Fixed::ZERO;
            }
        }
    }

    if agent.class == EnemyClass::Support && agent.burst.shots_remaining > 0 {
        update_burst(agent, perception, ctx, reach, &mut outcome.projectiles);
    }

    if !sprite.playing && agent.burst.shots_remaining == 0 {
        finish_attack(agent, sprite, perception, ctx, reach, &mut outcome.transitions);
        if agent.state == AgentState::Moving {
            // Dodges start moving next tick; this tick the body is still recovering.
            outcome.control = CombatControl::Hold;
        }
    }

    outcome
}

/// Fire due burst shots, or cancel the burst if the target is out of reach.
fn update_burst(
    agent: &mut EnemyAgent,
    perception: &PerceptionResult,
    ctx: &CombatContext<'_>,
    reach: Reach,
    projectiles: &mut Vec<ProjectileSpawnRequest>,
) {
    if !perception.sees_target_now || !reach.ranged_in_range {
        debug!(
            entity = %ctx.entity,
            shots_lost = agent.burst.shots_remaining,
            "Support burst aborted"
        );
        agent.burst.reset();
        return;
    }

    let params = &ctx.tuning.projectile;
    if params.speed <= Fixed::ZERO {
        agent.burst.reset();
        return;
    }

    agent.burst.timer = (agent.burst.timer - ctx.dt).max(Fixed::ZERO);
    while agent.burst.shots_remaining > 0 && agent.burst.timer <= Fixed::ZERO {
        if let Some(request) = spawn_projectile(
            ctx,
            perception.to_target_dir,
            params,
            agent.profile.ranged_damage,
        ) {
            projectiles.push(request);
        }
        agent.burst.shots_remaining -= 1;
        // A zero interval releases the whole burst at once.
        agent.burst.timer += ctx.tuning.support_burst_interval.max(Fixed::ZERO);
    }
}

/// Build a projectile spawn request, pushing the origin out of walls.
///
/// The origin starts just outside the owner's body along `direction` and is
/// nudged forward up to `wall_nudge_attempts` times while it overlaps a
/// wall. Returns `None` if it still overlaps, or if there is no direction.
#[must_use]
pub fn spawn_projectile(
    ctx: &CombatContext<'_>,
    direction: Vec2Fixed,
    params: &ProjectileParams,
    damage: u32,
) -> Option<ProjectileSpawnRequest> {
    if direction.is_zero() {
        return None;
    }

    let radius = params.radius.max(MIN_PROJECTILE_RADIUS);
    let offset = ctx.radius + radius + params.spawn_clearance;
    let nudge = direction.scale(ctx.tile_size * params.wall_nudge_tiles);

    let mut origin = ctx.position + direction.scale(offset);
    for _ in 0..params.wall_nudge_attempts {
        if !ctx.collision.circle_hits_wall(origin, radius) {
            break;
        }
        origin = origin + nudge;
    }
    if ctx.collision.circle_hits_wall(origin, radius) {
        debug!(entity = %ctx.entity, "Projectile spawn blocked by wall");
        return None;
    }

    Some(ProjectileSpawnRequest {
        owner: ctx.entity,
        origin,
        direction,
        speed: params.speed,
        damage,
        radius,
        lifetime: params.lifetime,
        visual_size: params.visual_size,
        sprite_scale: params.sprite_scale,
        height_shift: params.height_shift,
        ignore_owner_time: params.ignore_owner_time,
        texture: params.texture.clone(),
    })
}

/// Attack animation done and burst drained: decide what comes next.
fn finish_attack(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    perception: &PerceptionResult,
    ctx: &CombatContext<'_>,
    reach: Reach,
    transitions: &mut Vec<StateTransition>,
) {
    agent.apply_cooldown();
    agent.burst.reset();

    match agent.class {
        EnemyClass::Melee => {
            if reach.melee_in_range && agent.cooldown_ready() {
                start_attack(agent, sprite, ctx.entity, transitions);
            } else {
                enter_moving_state(agent, sprite, ctx.entity, transitions);
            }
        }
        EnemyClass::Ranged | EnemyClass::Support => {
            if !reach.ranged_can_shoot {
                enter_moving_state(agent, sprite, ctx.entity, transitions);
                return;
            }
            // Either attack again immediately or reposition with a dodge.
            let dodge = !agent.cooldown_ready()
                || rng::next_unit(&mut agent.rng_state) < ctx.tuning.dodge_chance;
            if dodge {
                begin_dodge(agent, sprite, perception, ctx, transitions);
            } else {
                start_attack(agent, sprite, ctx.entity, transitions);
            }
        }
    }
}

/// Start a randomized strafe or back-off.
fn begin_dodge(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    perception: &PerceptionResult,
    ctx: &CombatContext<'_>,
    transitions: &mut Vec<StateTransition>,
) {
    let roll = rng::next_unit(&mut agent.rng_state) * Fixed::from_num(3);
    let direction = match roll.to_num::<i32>().clamp(0, 2) {
        0 => DodgeDirection::Left,
        1 => DodgeDirection::Right,
        _ => DodgeDirection::Back,
    };
    let duration = rng::next_range(
        &mut agent.rng_state,
        ctx.tuning.dodge_min_duration,
        ctx.tuning.dodge_max_duration,
    );

    let to_target = perception.to_target_dir;
    let (world_dir, clip) = match direction {
        DodgeDirection::Left => (to_target.perpendicular(false), ClipKind::WalkLeft),
        DodgeDirection::Right => (to_target.perpendicular(true), ClipKind::WalkRight),
        DodgeDirection::Back => (-to_target, ClipKind::WalkBack),
    };

    agent.dodge = DodgeState {
        active: true,
        remaining: duration,
        direction,
        world_dir: world_dir.normalize_or_zero(),
    };
    set_state(agent, AgentState::Moving, ctx.entity, transitions);
    enter_moving(sprite, &agent.profile.animations, clip);

    debug!(
        entity = %ctx.entity,
        direction = ?direction,
        duration = %duration,
        "Ranged dodge started"
    );
}

/// Advance an active dodge. Returns the dodge velocity while it continues.
fn update_dodge(agent: &mut EnemyAgent, sprite: &mut Sprite, ctx: &CombatContext<'_>) -> Option<Vec2Fixed> {
    agent.dodge.remaining -= ctx.dt;

    let finished = agent.dodge.remaining <= Fixed::ZERO
        || ctx.speed <= Fixed::ZERO
        || agent.dodge.world_dir.is_zero();
    if finished {
        agent.dodge.clear();
        enter_moving(sprite, &agent.profile.animations, ClipKind::Walk);
        return None;
    }

    let velocity = agent.dodge.world_dir.scale(ctx.speed);
    let next = ctx.position + velocity.scale(ctx.dt);
    if ctx.collision.circle_hits_wall(next, ctx.radius) {
        debug!(entity = %ctx.entity, "Ranged dodge aborted by wall");
        agent.dodge.clear();
        enter_moving(sprite, &agent.profile.animations, ClipKind::Walk);
        return None;
    }

    Some(velocity)
}

// ============================================================================
// State Entry
// ============================================================================

fn set_state(
    agent: &mut EnemyAgent,
    to: AgentState,
    entity: EntityId,
    transitions: &mut Vec<StateTransition>,
) {
    let from = agent.state;
    agent.state = to;
    if from != to || to == AgentState::Attacking {
        debug!(entity = %entity, from = ?from, to = ?to, "Agent state transition");
        transitions.push(StateTransition { entity, from, to });
    }
}

fn start_attack(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    entity: EntityId,
    transitions: &mut Vec<StateTransition>,
) {
    agent.dodge.clear();
    agent.burst.reset();
    agent.attack_damage_applied = false;
    agent.attack_apply_frame = enter_attacking(sprite, &agent.profile.animations);
    set_state(agent, AgentState::Attacking, entity, transitions);
}

/// Switch to `Moving` with the walk clip.
pub fn enter_moving_state(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    entity: EntityId,
    transitions: &mut Vec<StateTransition>,
) {
    set_state(agent, AgentState::Moving, entity, transitions);
    enter_moving(sprite, &agent.profile.animations, ClipKind::Walk);
}

/// Switch to `Passive` with the idle clip.
pub fn enter_passive_state(
    agent: &mut EnemyAgent,
    sprite: &mut Sprite,
    entity: EntityId,
    transitions: &mut Vec<StateTransition>,
) {
    set_state(agent, AgentState::Passive, entity, transitions);
    enter_passive(sprite, &agent.profile.animations);
}
