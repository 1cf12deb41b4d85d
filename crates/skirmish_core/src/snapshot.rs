//! Immutable per-tick views for rendering and AI collaborators.
//!
//! A [`Snapshot`] is a plain data copy; holding one never borrows the
//! simulation, and it serializes to JSON for the headless protocol.

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraRect};
use crate::clock::SimClock;
use crate::components::{BehaviorState, EntityId, EntityType, PlayerState};
use crate::config::SimConfig;
use crate::entity::Entity;
use crate::math::Vec2;

/// Counters from the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerfCounters {
    /// Entities in the registry after the sweep.
    pub entity_count: usize,
    /// Non-empty grid cells.
    pub grid_cells: usize,
    /// Grid entries (multi-cell entities counted per cell).
    pub grid_entries: usize,
    /// Neighbor ids returned by broad-phase queries.
    pub broad_phase_candidates: usize,
    /// Unique pairs handed to the narrow phase.
    pub narrow_phase_checks: usize,
    /// Pairs that actually overlapped.
    pub collisions_resolved: usize,
    /// Hostiles struck by the melee sweep.
    pub melee_hits: usize,
    /// Entities removed by the sweep.
    pub removed: usize,
}

/// One entity as seen by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Type tag.
    pub entity_type: EntityType,
    /// World position.
    pub position: Vec2,
    /// Position relative to the camera.
    pub screen_position: Vec2,
    /// Velocity.
    pub velocity: Vec2,
    /// Collision radius.
    pub radius: f32,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Whether any part is inside the viewport.
    pub on_screen: bool,
    /// Whether damage is currently ignored.
    pub invulnerable: bool,
    /// Whether a hostile is stunned.
    pub stunned: bool,
    /// Hostile behavior, if this is a hostile.
    pub behavior: Option<BehaviorState>,
    /// Whether a wolf is mid-lunge.
    pub lunging: bool,
    /// Whether a wolf leads its pack.
    pub alpha: bool,
}

impl EntitySnapshot {
    pub(crate) fn capture(entity: &Entity, camera: &Camera) -> Self {
        let wolf = entity.wolf();
        Self {
            id: entity.id,
            entity_type: entity.entity_type(),
            position: entity.position,
            screen_position: camera.world_to_screen(entity.position),
            velocity: entity.velocity,
            radius: entity.radius,
            health: entity.health.current(),
            max_health: entity.health.max(),
            on_screen: camera.is_on_screen(entity.position, entity.radius),
            invulnerable: entity.is_invulnerable(),
            stunned: entity.is_stunned(),
            behavior: entity.hostile().map(|h| h.behavior),
            lunging: wolf.is_some_and(|w| w.is_lunging()),
            alpha: wolf.is_some_and(|w| w.alpha),
        }
    }
}

/// Player bars and action flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player entity id.
    pub id: EntityId,
    /// World position.
    pub position: Vec2,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Current energy.
    pub energy: f32,
    /// Maximum energy.
    pub max_energy: f32,
    /// Facing angle in radians.
    pub facing: f32,
    /// Shield raised.
    pub shielding: bool,
    /// Shield raised and still inside the perfect parry window.
    pub parry_window_open: bool,
    /// Swing in progress.
    pub attacking: bool,
    /// Roll in progress.
    pub rolling: bool,
    /// Damage currently ignored.
    pub invulnerable: bool,
    /// Remaining shield cooldown.
    pub shield_cooldown: f32,
    /// Remaining attack cooldown.
    pub attack_cooldown: f32,
    /// Remaining roll cooldown.
    pub roll_cooldown: f32,
    /// Effective speed multiplier.
    pub speed_multiplier: f32,
    /// Effective damage multiplier.
    pub damage_multiplier: f32,
    /// Kills so far.
    pub kills: u32,
    /// Score so far.
    pub score: u32,
}

impl PlayerSnapshot {
    pub(crate) fn capture(
        entity: &Entity,
        state: &PlayerState,
        clock: &SimClock,
        config: &SimConfig,
    ) -> Self {
        Self {
            id: entity.id,
            position: entity.position,
            health: entity.health.current(),
            max_health: entity.health.max(),
            energy: state.energy,
            max_energy: state.max_energy,
            facing: state.facing,
            shielding: state.is_shielding(),
            parry_window_open: state.in_parry_window(clock, config.shield.parry_window),
            attacking: state.is_attacking(),
            rolling: state.is_rolling(),
            invulnerable: entity.is_invulnerable(),
            shield_cooldown: state.shield_cooldown,
            attack_cooldown: state.attack_cooldown,
            roll_cooldown: state.roll_cooldown,
            speed_multiplier: state.speed_buff.value(),
            damage_multiplier: state.damage_buff.value(),
            kills: state.kills,
            score: state.score,
        }
    }
}

/// Complete read-only view of one simulation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick counter.
    pub tick: u64,
    /// Simulation time in seconds.
    pub time: f64,
    /// Active entities in id order.
    pub entities: Vec<EntitySnapshot>,
    /// The player, if alive.
    pub player: Option<PlayerSnapshot>,
    /// Visible world rectangle.
    pub camera: CameraRect,
    /// Current target lock.
    pub target: Option<EntityId>,
    /// Whether targeting is enabled.
    pub targeting_enabled: bool,
    /// Active enemies and wolves.
    pub enemies_remaining: usize,
    /// Counters from the last tick.
    pub counters: PerfCounters,
}

impl Snapshot {
    /// Find an entity in the snapshot.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.entities[i])
    }
}
