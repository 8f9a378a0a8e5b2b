//! Scenario execution and run summaries.
//!
//! [`run_arena`] ticks an arena for a fixed number of steps and condenses
//! the events and final state into a [`RunSummary`] that serializes to JSON.

use arena_core::components::{AgentState, EnemyClass};
use arena_core::math::Fixed;
use arena_core::simulation::Arena;
use serde::{Deserialize, Serialize};

/// Final state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Entity id, formatted as `<index>v<generation>`.
    pub id: String,
    /// Archetype.
    pub class: EnemyClass,
    /// Coarse state at the end of the run.
    pub state: AgentState,
    /// World position `(x, y)`.
    pub position: (f64, f64),
    /// Remaining health.
    pub health: u32,
    /// Whether the agent ever saw the target.
    pub has_seen_target: bool,
}

/// Final state of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    /// World position `(x, y)`.
    pub position: (f64, f64),
    /// Remaining health.
    pub health: u32,
    /// Starting health.
    pub max_health: u32,
}

/// Aggregated outcome of a headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Ticks executed by this run.
    pub ticks_run: u64,
    /// Arena tick counter after the run.
    pub final_tick: u64,
    /// Agents in entity id order.
    pub agents: Vec<AgentSummary>,
    /// Target state, if the arena had one.
    pub target: Option<TargetSummary>,
    /// Projectile spawn requests emitted during the run.
    pub projectiles_spawned: usize,
    /// Damage events emitted during the run.
    pub damage_events: usize,
    /// Total damage dealt to the target.
    pub damage_dealt: u64,
    /// Agents that entered the attacking state, counted per episode.
    pub attacks_started: usize,
    /// Movement claims granted by the reservation resolver.
    pub moves_granted: usize,
    /// Movement claims denied by the reservation resolver.
    pub moves_denied: usize,
    /// Tick at which the target died, if it did.
    pub target_died_at: Option<u64>,
    /// Final state hash.
    pub state_hash: u64,
}

/// Run `ticks` ticks of `dt` seconds and summarize.
///
/// Stops early once the target is dead.
pub fn run_arena(name: &str, arena: &mut Arena, ticks: u64, dt: Fixed) -> RunSummary {
    let target = arena.target();

    let mut ticks_run = 0;
    let mut projectiles_spawned = 0;
    let mut damage_events = 0;
    let mut damage_dealt = 0u64;
    let mut attacks_started = 0;
    let mut moves_granted = 0;
    let mut moves_denied = 0;
    let mut target_died_at = None;

    for _ in 0..ticks {
        let events = arena.tick(dt);
        ticks_run += 1;

        projectiles_spawned += events.projectile_spawns.len();
        damage_events += events.damage_events.len();
        damage_dealt += events
            .damage_events
            .iter()
            .map(|event| u64::from(event.damage))
            .sum::<u64>();
        attacks_started += events
            .transitions
            .iter()
            .filter(|t| t.to == AgentState::Attacking)
            .count();
        for reservation in events.reservations.iter().filter(|r| r.wants_move) {
            if reservation.granted() {
                moves_granted += 1;
            } else {
                moves_denied += 1;
            }
        }

        if target.is_some_and(|id| events.deaths.contains(&id)) {
            tracing::info!(tick = events.tick, "Target died");
            target_died_at = Some(events.tick);
            break;
        }
    }

    let summary = RunSummary {
        scenario: name.to_string(),
        ticks_run,
        final_tick: arena.get_tick(),
        agents: summarize_agents(arena),
        target: target.and_then(|id| summarize_target(arena, id)),
        projectiles_spawned,
        damage_events,
        damage_dealt,
        attacks_started,
        moves_granted,
        moves_denied,
        target_died_at,
        state_hash: arena.state_hash(),
    };

    tracing::info!(
        scenario = %summary.scenario,
        ticks = summary.ticks_run,
        damage = summary.damage_dealt,
        projectiles = summary.projectiles_spawned,
        hash = summary.state_hash,
        "Run complete"
    );
    summary
}

fn world_pair(x: Fixed, y: Fixed) -> (f64, f64) {
    (x.to_num(), y.to_num())
}

fn summarize_agents(arena: &Arena) -> Vec<AgentSummary> {
    arena
        .entities()
        .sorted_ids()
        .into_iter()
        .filter_map(|id| {
            let entity = arena.get_entity(id)?;
            let agent = entity.enemy_agent.as_ref()?;
            let position = entity.position?.value;
            Some(AgentSummary {
                id: id.to_string(),
                class: agent.class,
                state: agent.state,
                position: world_pair(position.x, position.y),
                health: entity.health.map_or(0, |h| h.current),
                has_seen_target: agent.has_seen_target,
            })
        })
        .collect()
}

fn summarize_target(arena: &Arena, id: arena_core::components::EntityId) -> Option<TargetSummary> {
    let entity = arena.get_entity(id)?;
    let position = entity.position?.value;
    let health = entity.health?;
    Some(TargetSummary {
        position: world_pair(position.x, position.y),
        health: health.current,
        max_health: health.max,
    })
}
