//! Core simulation loop.
//!
//! [`Simulation`] owns the registry, the broad-phase grid, the camera and
//! the targeting state, and exposes the command/query surface used by the
//! input layer, AI and wave scripting. All time enters through
//! [`Simulation::tick`].
//!
//! # Determinism
//!
//! - Time comes only from `dt`; the clock is never read from the host.
//! - Entities are processed in ascending id order.
//! - Broad-phase pairs are unique and resolved in `(low id, high id)` order.
//! - No randomness: orbit directions derive from entity ids.
//!
//! # Example
//!
//! ```
//! use skirmish_core::math::Vec2;
//! use skirmish_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new();
//! let player = sim.spawn_player(Vec2::new(1000.0, 1000.0)).unwrap();
//! sim.spawn_enemy(Vec2::new(1200.0, 1000.0)).unwrap();
//!
//! sim.set_movement_intent(Vec2::new(1.0, 0.0));
//! sim.tick(1.0 / 60.0);
//!
//! assert_eq!(sim.get_tick(), 1);
//! assert_eq!(sim.current_target(), Some(2));
//! assert!(sim.entity(player).unwrap().position.x > 1000.0);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::camera::{Camera, CameraRect};
use crate::clock::SimClock;
use crate::combat::{resolve_pair, sweep_melee, CombatEvent};
use crate::components::{
    AttackState, EnemySteering, EnemyState, EntityId, EntityType, ObstacleState, PlayerState,
    PowerUpKind, PowerUpState, ProjectileState, RollState, ShieldState, WolfState,
};
use crate::config::SimConfig;
use crate::entity::{Entity, EntityKind};
use crate::error::{Result, SimError};
use crate::math::{Vec2, EPSILON};
use crate::registry::EntityRegistry;
use crate::snapshot::{EntitySnapshot, PerfCounters, PlayerSnapshot, Snapshot};
use crate::spatial::SpatialHashGrid;
use crate::systems::{self, StepContext};
use crate::targeting::{ButtonOutcome, Targeting};

/// Events generated during a simulation tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Combat and pickup events in resolution order.
    pub combat: Vec<CombatEvent>,
    /// Entities removed by the end-of-tick sweep.
    pub removed: Vec<EntityId>,
}

impl TickEvents {
    /// Entities that died this tick.
    pub fn deaths(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.combat.iter().filter_map(|e| match e {
            CombatEvent::Death { entity, .. } => Some(*entity),
            _ => None,
        })
    }

    /// Hostiles perfectly parried this tick.
    pub fn parries(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.combat.iter().filter_map(|e| match e {
            CombatEvent::Parry { enemy } => Some(*enemy),
            _ => None,
        })
    }

    /// Total damage dealt to `target` this tick.
    #[must_use]
    pub fn damage_to(&self, target: EntityId) -> f32 {
        self.combat
            .iter()
            .map(|e| match e {
                CombatEvent::Damage {
                    target: t, amount, ..
                } if *t == target => *amount,
                _ => 0.0,
            })
            .sum()
    }
}

/// The action-game simulation.
///
/// # Tick Pipeline
///
/// 1. **Clock** - advance by `dt`
/// 2. **Update** - player intent, timers, steering, integration
/// 3. **Confine** - sanitize and clamp to world bounds
/// 4. **Camera** - follow the player
/// 5. **Grid** - rebuild the spatial hash
/// 6. **Melee** - sweep the player's active swing
/// 7. **Collisions** - broad phase pairs, narrow phase, resolution
/// 8. **Targeting** - validate or acquire the lock
/// 9. **Sweep** - remove inactive entities
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    tick: u64,
    clock: SimClock,
    entities: EntityRegistry,
    grid: SpatialHashGrid,
    camera: Camera,
    targeting: Targeting,
    player: Option<EntityId>,
    counters: PerfCounters,
}

impl Simulation {
    /// Create an empty simulation with default tuning.
    ///
    /// # Example
    ///
    /// ```
    /// use skirmish_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new();
    /// assert_eq!(sim.get_tick(), 0);
    /// assert_eq!(sim.entity_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::build(SimConfig::default())
    }

    /// Create an empty simulation with validated tuning.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the config fails validation.
    pub fn with_config(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let margin = config.world.projectile_margin;
        Self {
            tick: 0,
            clock: SimClock::new(),
            entities: EntityRegistry::new(config.limits.max_entities),
            grid: SpatialHashGrid::with_bounds(
                config.grid.cell_size,
                Vec2::new(-margin, -margin),
                config.world.size() + Vec2::new(margin, margin),
            ),
            camera: Camera::new(&config.camera, config.world.size()),
            targeting: Targeting::new(config.targeting.clone()),
            player: None,
            counters: PerfCounters::default(),
            config,
        }
    }

    /// Active tuning.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.clock.now()
    }

    /// The entity registry.
    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    fn insert(&mut self, mut entity: Entity) -> Result<EntityId> {
        systems::confine_to_world(&mut entity, &self.config.world);
        let entity_type = entity.entity_type();
        let id = self.entities.insert(entity)?;
        tracing::debug!(id, ?entity_type, "Spawned entity");
        Ok(id)
    }

    /// Spawn the player.
    ///
    /// # Errors
    ///
    /// Fails if a player is already active or the entity cap is reached.
    pub fn spawn_player(&mut self, position: Vec2) -> Result<EntityId> {
        if let Some(existing) = self.player.filter(|&id| self.entities.get_active(id).is_some()) {
            return Err(SimError::PlayerAlreadySpawned(existing));
        }
        let tuning = &self.config.player;
        let entity = Entity::new(
            position,
            tuning.radius,
            tuning.max_health,
            EntityKind::Player(PlayerState::new(tuning)),
        );
        let id = self.insert(entity)?;
        self.player = Some(id);
        if let Some(p) = self.entities.get(id) {
            self.camera.snap_to(p.position);
        }
        Ok(id)
    }

    /// Spawn a standard enemy.
    pub fn spawn_enemy(&mut self, position: Vec2) -> Result<EntityId> {
        let tuning = &self.config.enemy;
        let state = EnemyState::new(self.entities.peek_next_id(), tuning);
        let entity = Entity::new(position, tuning.radius, tuning.max_health, EntityKind::Enemy(state));
        self.insert(entity)
    }

    /// Spawn a wolf. Alphas are larger, tougher and hit harder.
    pub fn spawn_wolf(&mut self, position: Vec2, alpha: bool) -> Result<EntityId> {
        let tuning = &self.config.wolf;
        let (radius, health) = if alpha {
            (
                tuning.radius * tuning.alpha_size_factor,
                tuning.max_health * tuning.alpha_health_factor,
            )
        } else {
            (tuning.radius, tuning.max_health)
        };
        let state = WolfState::new(self.entities.peek_next_id(), tuning, alpha);
        self.insert(Entity::new(position, radius, health, EntityKind::Wolf(state)))
    }

    /// Spawn a projectile travelling along `direction`.
    pub fn spawn_projectile(
        &mut self,
        position: Vec2,
        direction: Vec2,
        damage: f32,
        owner: Option<EntityId>,
    ) -> Result<EntityId> {
        let tuning = &self.config.projectile;
        let mut entity = Entity::new(
            position,
            tuning.radius,
            1.0,
            EntityKind::Projectile(ProjectileState {
                damage: damage.max(0.0),
                owner,
                lifetime: tuning.lifetime,
            }),
        );
        entity.velocity = direction.normalize() * tuning.speed;
        self.insert(entity)
    }

    /// Spawn a power-up.
    pub fn spawn_power_up(&mut self, position: Vec2, kind: PowerUpKind) -> Result<EntityId> {
        let tuning = &self.config.power_up;
        let entity = Entity::new(
            position,
            tuning.radius,
            1.0,
            EntityKind::PowerUp(PowerUpState {
                kind,
                lifetime: tuning.lifetime,
            }),
        );
        self.insert(entity)
    }

    /// Spawn an obstacle.
    pub fn spawn_obstacle(&mut self, position: Vec2, radius: f32, destructible: bool) -> Result<EntityId> {
        let max_radius = self.config.obstacle.max_radius;
        if !(radius.is_finite() && radius > 0.0 && radius <= max_radius) {
            return Err(SimError::InvalidConfig(format!(
                "obstacle radius must be in (0, {max_radius}], got {radius}"
            )));
        }
        let health = if destructible {
            self.config.obstacle.destructible_health
        } else {
            self.config.obstacle.indestructible_health
        };
        let entity = Entity::new(
            position,
            radius,
            health,
            EntityKind::Obstacle(ObstacleState { destructible }),
        );
        self.insert(entity)
    }

    /// Deactivate an entity. It is swept at the end of the next tick.
    ///
    /// Returns false for unknown or already inactive ids.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        match self.entities.get_active_mut(id) {
            Some(entity) => {
                entity.deactivate();
                tracing::debug!(id, "Entity removed");
                true
            }
            None => false,
        }
    }

    /// Remove every entity immediately, optionally keeping the player.
    /// Returns the number removed.
    pub fn clear_entities(&mut self, keep_player: bool) -> usize {
        let player = if keep_player { self.player } else { None };
        let removed = self.entities.clear_where(|e| Some(e.id) != player);
        if !keep_player {
            self.player = None;
        }
        tracing::debug!(removed, keep_player, "Cleared entities");
        removed
    }

    // ------------------------------------------------------------------
    // Player input
    // ------------------------------------------------------------------

    fn player_parts(&mut self) -> Option<(&mut Entity, &SimConfig, &SimClock)> {
        let id = self.player?;
        let entity = self.entities.get_active_mut(id)?;
        Some((entity, &self.config, &self.clock))
    }

    /// Set the raw movement intent. Non-finite components are zeroed.
    pub fn set_movement_intent(&mut self, intent: Vec2) -> bool {
        let Some((entity, ..)) = self.player_parts() else {
            return false;
        };
        if let Some(state) = entity.player_mut() {
            state.movement_intent = intent.finite_or_zero();
        }
        true
    }

    /// Aim at a world point; facing follows immediately.
    pub fn set_aim_point(&mut self, world: Vec2) -> bool {
        if !world.is_finite() {
            return false;
        }
        let Some((entity, ..)) = self.player_parts() else {
            return false;
        };
        let position = entity.position;
        if let Some(state) = entity.player_mut() {
            state.aim_point = Some(world);
            let to_aim = world - position;
            if to_aim.length_squared() > EPSILON * EPSILON {
                state.facing = to_aim.angle();
            }
        }
        true
    }

    /// Aim at a screen point, converted through the camera.
    pub fn set_aim_screen_point(&mut self, screen: Vec2) -> bool {
        let world = self.camera.screen_to_world(screen);
        self.set_aim_point(world)
    }

    /// Start a melee swing in the facing direction.
    ///
    /// Rejected while rolling, shielding, swinging, on cooldown or short of
    /// energy.
    pub fn attack(&mut self) -> bool {
        let Some((entity, config, _)) = self.player_parts() else {
            return false;
        };
        let Some(state) = entity.player_mut() else {
            return false;
        };
        if state.is_rolling()
            || state.is_shielding()
            || state.is_attacking()
            || state.attack_cooldown > 0.0
            || !state.try_spend_energy(config.attack.energy_cost)
        {
            tracing::trace!("Attack rejected");
            return false;
        }
        state.attack = AttackState::Swinging {
            angle: state.facing,
            elapsed: 0.0,
            hits: BTreeSet::new(),
        };
        state.attack_cooldown = config.attack.cooldown;
        true
    }

    /// Raise the shield. The perfect parry window opens now.
    pub fn start_shield(&mut self) -> bool {
        let Some((entity, _, clock)) = self.player_parts() else {
            return false;
        };
        let now = clock.now();
        let Some(state) = entity.player_mut() else {
            return false;
        };
        if state.is_rolling() || state.is_shielding() || state.shield_cooldown > 0.0 {
            tracing::trace!("Shield rejected");
            return false;
        }
        state.shield = ShieldState::Shielding { started_at: now };
        true
    }

    /// Lower the shield and start its cooldown.
    pub fn end_shield(&mut self) -> bool {
        let Some((entity, config, _)) = self.player_parts() else {
            return false;
        };
        let Some(state) = entity.player_mut() else {
            return false;
        };
        if !state.is_shielding() {
            return false;
        }
        state.shield = ShieldState::Idle;
        state.shield_cooldown = config.shield.cooldown;
        true
    }

    /// Dodge roll along `direction`, or the facing direction when absent or
    /// degenerate.
    ///
    /// Rejected while rolling, shielding, on cooldown or short of energy.
    pub fn roll(&mut self, direction: Option<Vec2>) -> bool {
        let Some((entity, config, _)) = self.player_parts() else {
            return false;
        };
        let Some(state) = entity.player_mut() else {
            return false;
        };
        if state.is_rolling()
            || state.is_shielding()
            || state.roll_cooldown > 0.0
            || !state.try_spend_energy(config.roll.energy_cost)
        {
            tracing::trace!("Roll rejected");
            return false;
        }
        let mut direction = direction.unwrap_or(Vec2::ZERO).normalize();
        if direction == Vec2::ZERO {
            direction = Vec2::from_angle(state.facing);
        }
        state.roll = RollState::Rolling {
            direction,
            elapsed: 0.0,
            traveled: 0.0,
        };
        true
    }

    /// Fire a projectile in the facing direction.
    ///
    /// Returns the projectile id, or `None` without a player, without enough
    /// energy, or at the entity cap.
    pub fn shoot(&mut self) -> Option<EntityId> {
        let id = self.player?;
        let player = self.entities.get_active(id)?;
        let state = player.player()?;
        let cost = self.config.player.shoot_energy_cost;
        if state.energy < cost {
            tracing::trace!("Shot rejected, not enough energy");
            return None;
        }
        let direction = Vec2::from_angle(state.facing);
        let muzzle = player.position + direction * (player.radius + self.config.projectile.radius);
        let damage = self.config.projectile.damage * state.damage_buff.value();

        let shot = self.spawn_projectile(muzzle, direction, damage, Some(id)).ok()?;
        if let Some(state) = self.entities.get_mut(id).and_then(Entity::player_mut) {
            state.energy -= cost;
        }
        Some(shot)
    }

    // ------------------------------------------------------------------
    // AI surface
    // ------------------------------------------------------------------

    /// Point a hostile at an entity or world point. `None` restores the
    /// default of steering toward the player.
    pub fn set_enemy_target(&mut self, enemy: EntityId, target: Option<EnemySteering>) -> bool {
        match self.entities.get_active_mut(enemy).and_then(Entity::hostile_mut) {
            Some(state) => {
                state.target = target;
                true
            }
            None => false,
        }
    }

    /// Make the given wolves one pack. Non-wolves and inactive ids are
    /// ignored. Returns the pack size.
    pub fn join_pack(&mut self, members: &[EntityId]) -> usize {
        let wolves: BTreeSet<EntityId> = members
            .iter()
            .copied()
            .filter(|&id| self.entities.get_active(id).and_then(Entity::wolf).is_some())
            .collect();
        for &id in &wolves {
            if let Some(wolf) = self.entities.get_mut(id).and_then(Entity::wolf_mut) {
                wolf.pack.extend(wolves.iter().copied().filter(|&other| other != id));
            }
        }
        wolves.len()
    }

    // ------------------------------------------------------------------
    // Targeting
    // ------------------------------------------------------------------

    fn player_position(&self) -> Option<Vec2> {
        self.player
            .and_then(|id| self.entities.get_active(id))
            .map(|p| p.position)
    }

    /// Current target lock.
    #[must_use]
    pub fn current_target(&self) -> Option<EntityId> {
        self.targeting.current()
    }

    /// Whether targeting is enabled.
    #[must_use]
    pub fn targeting_enabled(&self) -> bool {
        self.targeting.is_enabled()
    }

    /// Cycle to the next hostile in angular order.
    pub fn target_next(&mut self) -> Option<EntityId> {
        let origin = self.player_position()?;
        self.targeting.cycle_next(&self.entities, origin)
    }

    /// Cycle to the previous hostile in angular order.
    pub fn target_previous(&mut self) -> Option<EntityId> {
        let origin = self.player_position()?;
        self.targeting.cycle_previous(&self.entities, origin)
    }

    /// Target button pressed.
    pub fn press_target_button(&mut self) {
        self.targeting.press(&self.clock);
    }

    /// Target button released: short press cycles, long press disables.
    pub fn release_target_button(&mut self) -> ButtonOutcome {
        let origin = self.player_position();
        self.targeting.release(&self.clock, &self.entities, origin)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds.
    ///
    /// `dt` is clamped to the configured maximum. Non-finite or
    /// non-positive steps only advance the tick counter.
    ///
    /// # Example
    ///
    /// ```
    /// use skirmish_core::simulation::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// sim.tick(1.0 / 60.0);
    /// sim.tick(f32::NAN);
    /// assert_eq!(sim.get_tick(), 2);
    /// ```
    pub fn tick(&mut self, dt: f32) -> TickEvents {
        let mut events = TickEvents::default();
        if !(dt.is_finite() && dt > 0.0) {
            tracing::trace!(dt, "Ignoring degenerate time step");
            self.tick += 1;
            return events;
        }
        let dt = dt.min(self.config.limits.max_dt);
        let mut counters = PerfCounters::default();

        // 1. Clock
        self.clock.advance(dt);
        let ctx = StepContext {
            config: &self.config,
            clock: &self.clock,
            dt,
        };

        // 2-3. Update and confine
        let ids = self.entities.active_ids();
        for &id in &ids {
            run_update_system(&mut self.entities, id, self.player, &ctx);
            if let Some(entity) = self.entities.get_mut(id) {
                systems::confine_to_world(entity, &ctx.config.world);
            }
        }

        // 4. Camera
        if let Some(pos) = self
            .player
            .and_then(|id| self.entities.get_active(id))
            .map(|p| p.position)
        {
            self.camera.follow(pos);
        }

        // 5. Grid
        self.grid.rebuild(
            self.entities
                .iter_active()
                .map(|e| (e.id, e.position, e.radius)),
        );
        counters.grid_cells = self.grid.occupied_cells();
        counters.grid_entries = self.grid.entry_count();

        // 6. Melee
        if let Some(player) = self.player {
            counters.melee_hits =
                sweep_melee(&mut self.entities, &self.grid, player, &ctx, &mut events.combat);
        }

        // 7. Collisions
        let mut pairs = Vec::new();
        for id in self.entities.active_ids() {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let neighbors = self.grid.query(entity.position, entity.radius, Some(id));
            counters.broad_phase_candidates += neighbors.len();
            pairs.extend(neighbors.into_iter().filter(|&other| other > id).map(|other| (id, other)));
        }
        counters.narrow_phase_checks = pairs.len();
        for (a, b) in pairs {
            if resolve_pair(&mut self.entities, a, b, &ctx, &mut events.combat) {
                counters.collisions_resolved += 1;
            }
        }
        self.credit_kills(&events.combat);

        // 8. Targeting
        let origin = self.player_position();
        self.targeting.update(&self.entities, origin, dt);

        // 9. Sweep
        events.removed = self.entities.sweep_inactive();
        if !events.removed.is_empty() {
            self.prune_packs(&events.removed);
            if self.player.is_some_and(|p| events.removed.contains(&p)) {
                self.player = None;
            }
        }
        counters.removed = events.removed.len();
        counters.entity_count = self.entities.len();
        self.counters = counters;

        self.tick += 1;
        tracing::trace!(
            tick = self.tick,
            pairs = counters.narrow_phase_checks,
            collisions = counters.collisions_resolved,
            "Tick complete"
        );

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn credit_kills(&mut self, combat: &[CombatEvent]) {
        let Some(player_id) = self.player else {
            return;
        };
        let entities = &self.entities;
        let kills = combat
            .iter()
            .filter(|e| match e {
                CombatEvent::Death {
                    killer: Some(k),
                    entity,
                } => {
                    *k == player_id
                        && entities
                            .get(*entity)
                            .is_some_and(|victim| victim.entity_type().is_hostile())
                }
                _ => false,
            })
            .count() as u32;
        if kills == 0 {
            return;
        }
        let kill_score = self.config.player.kill_score;
        if let Some(state) = self.entities.get_mut(player_id).and_then(Entity::player_mut) {
            state.kills += kills;
            state.score += kills * kill_score;
        }
    }

    fn prune_packs(&mut self, removed: &[EntityId]) {
        for id in self.entities.sorted_ids() {
            if let Some(wolf) = self.entities.get_mut(id).and_then(Entity::wolf_mut) {
                wolf.pack.retain(|member| !removed.contains(member));
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Get an entity by id (active or awaiting the sweep).
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Player entity id, if alive.
    #[must_use]
    pub fn player_id(&self) -> Option<EntityId> {
        self.player.filter(|&id| self.entities.get_active(id).is_some())
    }

    /// Player state, if alive.
    #[must_use]
    pub fn player_state(&self) -> Option<&PlayerState> {
        self.player
            .and_then(|id| self.entities.get_active(id))
            .and_then(Entity::player)
    }

    /// Visible world rectangle.
    #[must_use]
    pub fn camera_rect(&self) -> CameraRect {
        self.camera.rect()
    }

    /// The camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Number of active entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.iter_active().count()
    }

    /// Number of active entities of one type.
    #[must_use]
    pub fn count_of(&self, entity_type: EntityType) -> usize {
        self.entities.count_of(entity_type)
    }

    /// Active enemies and wolves.
    #[must_use]
    pub fn enemies_remaining(&self) -> usize {
        self.count_of(EntityType::Enemy) + self.count_of(EntityType::Wolf)
    }

    /// Counters from the last tick.
    #[must_use]
    pub const fn metrics(&self) -> PerfCounters {
        self.counters
    }

    /// Immutable view for rendering and AI.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let player = self.player.and_then(|id| self.entities.get_active(id)).and_then(|e| {
            e.player()
                .map(|state| PlayerSnapshot::capture(e, state, &self.clock, &self.config))
        });
        Snapshot {
            tick: self.tick,
            time: self.clock.now(),
            entities: self
                .entities
                .iter_active()
                .map(|e| EntitySnapshot::capture(e, &self.camera))
                .collect(),
            player,
            camera: self.camera.rect(),
            target: self.targeting.current(),
            targeting_enabled: self.targeting.is_enabled(),
            enemies_remaining: self.enemies_remaining(),
            counters: self.counters,
        }
    }

    /// Hash of the simulation state.
    ///
    /// Two simulations fed identical inputs produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.clock.now().to_bits().hash(&mut hasher);

        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            entity.entity_type().hash(&mut hasher);
            entity.active.hash(&mut hasher);
            entity.position.x.to_bits().hash(&mut hasher);
            entity.position.y.to_bits().hash(&mut hasher);
            entity.velocity.x.to_bits().hash(&mut hasher);
            entity.velocity.y.to_bits().hash(&mut hasher);
            entity.health.current().to_bits().hash(&mut hasher);
            entity.invulnerable_for.to_bits().hash(&mut hasher);

            if let Some(state) = entity.player() {
                state.energy.to_bits().hash(&mut hasher);
                state.facing.to_bits().hash(&mut hasher);
                state.is_shielding().hash(&mut hasher);
                state.is_attacking().hash(&mut hasher);
                state.is_rolling().hash(&mut hasher);
                state.kills.hash(&mut hasher);
            }
            if let Some(hostile) = entity.hostile() {
                hostile.behavior.hash(&mut hasher);
                hostile.stun_remaining.to_bits().hash(&mut hasher);
            }
        }
        self.targeting.current().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve where a hostile should steer.
fn steering_point(
    entities: &EntityRegistry,
    steering: Option<EnemySteering>,
    player: Option<EntityId>,
) -> Option<Vec2> {
    match steering {
        Some(EnemySteering::Point(p)) => Some(p),
        Some(EnemySteering::Entity(id)) => entities.get_active(id).map(|e| e.position),
        None => player.and_then(|id| entities.get_active(id)).map(|e| e.position),
    }
}

/// Mean position of a wolf's active pack mates.
fn pack_centroid(entities: &EntityRegistry, wolf: &WolfState) -> Option<Vec2> {
    let (sum, count) = wolf
        .pack
        .iter()
        .filter_map(|&id| entities.get_active(id))
        .fold((Vec2::ZERO, 0_u32), |(sum, n), e| (sum + e.position, n + 1));
    (count > 0).then(|| sum / count as f32)
}

/// Run the per-entity update for one entity.
fn run_update_system(
    entities: &mut EntityRegistry,
    id: EntityId,
    player: Option<EntityId>,
    ctx: &StepContext<'_>,
) {
    let Some(entity) = entities.get_active(id) else {
        return;
    };
    let (target, centroid) = match &entity.kind {
        EntityKind::Enemy(enemy) => (steering_point(entities, enemy.target, player), None),
        EntityKind::Wolf(wolf) => (
            steering_point(entities, wolf.enemy.target, player),
            pack_centroid(entities, wolf),
        ),
        _ => (None, None),
    };
    let entity_type = entity.entity_type();

    let Some(entity) = entities.get_active_mut(id) else {
        return;
    };
    match entity_type {
        EntityType::Player => systems::update_player(entity, ctx),
        EntityType::Enemy => systems::update_enemy(entity, target, ctx),
        EntityType::Wolf => systems::update_wolf(entity, target, centroid, ctx),
        EntityType::Projectile => systems::update_projectile(entity, ctx),
        EntityType::PowerUp => systems::update_power_up(entity, ctx),
        EntityType::Obstacle => entity.update_invulnerability(ctx.dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new();
        assert_eq!(sim.get_tick(), 0);
        assert!(sim.entities().is_empty());
        assert!(sim.player_id().is_none());
    }

    #[test]
    fn test_second_player_rejected() {
        let mut sim = Simulation::new();
        let first = sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        assert!(matches!(
            sim.spawn_player(Vec2::new(600.0, 600.0)),
            Err(SimError::PlayerAlreadySpawned(id)) if id == first
        ));
    }

    #[test]
    fn test_entity_cap() {
        let mut config = SimConfig::default();
        config.limits.max_entities = 2;
        let mut sim = Simulation::with_config(config).unwrap();
        sim.spawn_enemy(Vec2::new(100.0, 100.0)).unwrap();
        sim.spawn_enemy(Vec2::new(300.0, 100.0)).unwrap();
        assert!(matches!(
            sim.spawn_enemy(Vec2::new(500.0, 100.0)),
            Err(SimError::EntityCapReached { cap: 2 })
        ));
    }

    #[test]
    fn test_oversized_obstacle_rejected() {
        let mut sim = Simulation::new();
        assert!(matches!(
            sim.spawn_obstacle(Vec2::new(1000.0, 1000.0), 200_000.0, false),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(sim.spawn_obstacle(Vec2::new(1000.0, 1000.0), 500.0, false).is_ok());
    }

    #[test]
    fn test_huge_obstacle_grid_cost_is_bounded() {
        let mut config = SimConfig::default();
        config.obstacle.max_radius = 1.0e7;
        let mut sim = Simulation::with_config(config).unwrap();
        sim.spawn_obstacle(Vec2::new(1000.0, 1000.0), 1.0e7, false).unwrap();
        sim.spawn_enemy(Vec2::new(100.0, 100.0)).unwrap();
        sim.tick(DT);
        // Cells -1..=20 per axis cover the world plus the projectile margin.
        assert!(sim.metrics().grid_entries <= 22 * 22 + 4);
    }

    #[test]
    fn test_remove_entity_is_noop_for_unknown() {
        let mut sim = Simulation::new();
        assert!(!sim.remove_entity(42));
        let e = sim.spawn_enemy(Vec2::new(100.0, 100.0)).unwrap();
        assert!(sim.remove_entity(e));
        assert!(!sim.remove_entity(e));
        let events = sim.tick(DT);
        assert_eq!(events.removed, vec![e]);
        assert!(sim.entity(e).is_none());
    }

    #[test]
    fn test_tick_increments_and_degenerate_dt_is_noop() {
        let mut sim = Simulation::new();
        let e = sim.spawn_enemy(Vec2::new(100.0, 100.0)).unwrap();
        sim.tick(-1.0);
        sim.tick(f32::INFINITY);
        assert_eq!(sim.get_tick(), 2);
        assert_eq!(sim.elapsed(), 0.0);
        assert_eq!(sim.entity(e).unwrap().position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_attack_requires_energy_and_cooldown() {
        let mut sim = Simulation::new();
        sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        assert!(sim.attack());
        assert!(!sim.attack());
        for _ in 0..60 {
            sim.tick(DT);
        }
        assert!(sim.attack());
    }

    #[test]
    fn test_shield_and_roll_are_exclusive() {
        let mut sim = Simulation::new();
        sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        assert!(sim.start_shield());
        assert!(!sim.roll(Some(Vec2::X)));
        assert!(!sim.attack());
        assert!(sim.end_shield());
        assert!(!sim.start_shield(), "shield cooldown applies");
        assert!(sim.roll(Some(Vec2::X)));
        assert!(!sim.start_shield());
    }

    #[test]
    fn test_roll_moves_player_at_most_roll_distance() {
        let mut sim = Simulation::new();
        let p = sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        assert!(sim.roll(Some(Vec2::new(2.0, 0.0))));
        for _ in 0..30 {
            sim.tick(DT);
        }
        let moved = sim.entity(p).unwrap().position.x - 500.0;
        assert!(moved > 140.0);
        // Roll distance plus residual glide from the halved exit velocity.
        assert!(moved < 150.0 + 60.0);
    }

    #[test]
    fn test_melee_kill_credits_player() {
        let mut sim = Simulation::new();
        sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        let e = sim.spawn_enemy(Vec2::new(550.0, 500.0)).unwrap();
        sim.set_aim_point(Vec2::new(600.0, 500.0));
        sim.entities
            .get_mut(e)
            .and_then(Entity::hostile_mut)
            .unwrap()
            .stun(10.0);
        if let Some(entity) = sim.entities.get_mut(e) {
            entity.health.apply_damage(40.0);
        }
        assert!(sim.attack());
        let events = sim.tick(DT);
        assert_eq!(events.deaths().collect::<Vec<_>>(), vec![e]);
        assert!(events.removed.contains(&e));
        let state = sim.player_state().unwrap();
        assert_eq!(state.kills, 1);
        assert_eq!(state.score, sim.config().player.kill_score);
    }

    #[test]
    fn test_shoot_spends_energy_and_spawns_owned_projectile() {
        let mut sim = Simulation::new();
        let p = sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        let shot = sim.shoot().unwrap();
        let projectile = sim.entity(shot).unwrap();
        assert!(matches!(
            projectile.kind,
            EntityKind::Projectile(ProjectileState { owner: Some(o), .. }) if o == p
        ));
        assert!(projectile.velocity.x > 0.0);
        assert_eq!(sim.player_state().unwrap().energy, 95.0);
    }

    #[test]
    fn test_set_enemy_target_point() {
        let mut sim = Simulation::new();
        let e = sim.spawn_enemy(Vec2::new(500.0, 500.0)).unwrap();
        assert!(sim.set_enemy_target(e, Some(EnemySteering::Point(Vec2::new(900.0, 500.0)))));
        sim.tick(DT);
        assert!(sim.entity(e).unwrap().velocity.x > 0.0);
        assert!(!sim.set_enemy_target(999, None));
    }

    #[test]
    fn test_join_pack_ignores_non_wolves() {
        let mut sim = Simulation::new();
        let a = sim.spawn_wolf(Vec2::new(100.0, 100.0), true).unwrap();
        let b = sim.spawn_wolf(Vec2::new(200.0, 100.0), false).unwrap();
        let e = sim.spawn_enemy(Vec2::new(300.0, 100.0)).unwrap();
        assert_eq!(sim.join_pack(&[a, b, e]), 2);
        let pack = &sim.entity(a).and_then(Entity::wolf).unwrap().pack;
        assert!(pack.contains(&b) && !pack.contains(&e) && !pack.contains(&a));
    }

    #[test]
    fn test_pack_pruned_on_death() {
        let mut sim = Simulation::new();
        let a = sim.spawn_wolf(Vec2::new(100.0, 100.0), false).unwrap();
        let b = sim.spawn_wolf(Vec2::new(300.0, 100.0), false).unwrap();
        sim.join_pack(&[a, b]);
        sim.remove_entity(b);
        sim.tick(DT);
        assert!(sim.entity(a).and_then(Entity::wolf).unwrap().pack.is_empty());
    }

    #[test]
    fn test_clear_entities_keeps_player() {
        let mut sim = Simulation::new();
        let p = sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
        sim.spawn_enemy(Vec2::new(100.0, 100.0)).unwrap();
        sim.spawn_power_up(Vec2::new(900.0, 100.0), PowerUpKind::Health).unwrap();
        assert_eq!(sim.clear_entities(true), 2);
        assert_eq!(sim.player_id(), Some(p));
        assert_eq!(sim.clear_entities(false), 1);
        assert!(sim.player_id().is_none());
    }

    #[test]
    fn test_identical_inputs_identical_hash() {
        let run = || {
            let mut sim = Simulation::new();
            sim.spawn_player(Vec2::new(1000.0, 1000.0)).unwrap();
            for i in 0..10 {
                sim.spawn_enemy(Vec2::new(700.0 + i as f32 * 60.0, 800.0)).unwrap();
            }
            sim.set_movement_intent(Vec2::new(0.3, 1.0));
            for _ in 0..120 {
                sim.tick(DT);
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut sim = Simulation::new();
        let p = sim.spawn_player(Vec2::new(1000.0, 1000.0)).unwrap();
        let e = sim.spawn_enemy(Vec2::new(1100.0, 1000.0)).unwrap();
        sim.start_shield();
        sim.tick(DT);
        let snap = sim.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.enemies_remaining, 1);
        assert_eq!(snap.target, Some(e));
        let player = snap.player.as_ref().unwrap();
        assert_eq!(player.id, p);
        assert!(player.shielding && player.parry_window_open);
        assert!(snap.entity(e).unwrap().on_screen);
        assert!(snap.counters.grid_cells > 0);
    }
}
