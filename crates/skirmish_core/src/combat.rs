//! Narrow-phase collision tests and combat resolution.
//!
//! The orchestrator feeds unique, id-ordered candidate pairs from the broad
//! phase into [`resolve_pair`]. A pair is skipped when either side is no
//! longer active, so an entity killed earlier in the pass never deals or
//! receives anything afterwards.
//!
//! Player versus hostile contact follows a fixed branch order:
//!
//! 1. player invulnerable or hostile stunned: nothing happens;
//! 2. shield raised and inside the perfect parry window: no damage, the
//!    hostile is stunned and knocked back, the player regains energy;
//! 3. shield raised outside the window: damage reduced by the block factor;
//! 4. any remaining damage is applied, followed by a short invulnerability
//!    window and knockback on the player.

use serde::{Deserialize, Serialize};

use crate::components::{AttackState, EntityId, EntityType, PowerUpKind};
use crate::entity::{Damageable, Entity, EntityKind, Mover};
use crate::math::{angle_delta, Vec2, EPSILON};
use crate::registry::EntityRegistry;
use crate::spatial::SpatialHashGrid;
use crate::systems::StepContext;

/// Something that happened during collision or combat resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Health was removed from an entity.
    Damage {
        /// Entity that lost health.
        target: EntityId,
        /// Entity responsible, if known.
        source: Option<EntityId>,
        /// Health actually removed.
        amount: f32,
    },
    /// The player perfectly parried a hostile.
    Parry {
        /// Parried hostile.
        enemy: EntityId,
    },
    /// The player blocked a hostile outside the parry window.
    Block {
        /// Blocked hostile.
        enemy: EntityId,
        /// Damage absorbed by the shield.
        absorbed: f32,
    },
    /// An entity reached zero health.
    Death {
        /// Entity that died.
        entity: EntityId,
        /// Entity credited with the kill.
        killer: Option<EntityId>,
    },
    /// The player collected a power-up.
    PowerUpCollected {
        /// Collected power-up.
        power_up: EntityId,
        /// Effect granted.
        kind: PowerUpKind,
    },
}

/// Whether two circles overlap. Touching circles do not collide.
#[must_use]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_squared(b) < reach * reach
}

/// Narrow-phase test and resolution of one candidate pair.
///
/// Returns true when the pair actually collided.
pub fn resolve_pair(
    registry: &mut EntityRegistry,
    a: EntityId,
    b: EntityId,
    ctx: &StepContext<'_>,
    events: &mut Vec<CombatEvent>,
) -> bool {
    registry
        .with_pair(a, b, |ea, eb| {
            if !ea.active || !eb.active {
                return false;
            }
            if !circles_overlap(ea.position, ea.radius, eb.position, eb.radius) {
                return false;
            }
            resolve_contact(ea, eb, ctx, events);
            true
        })
        .unwrap_or(false)
}

fn resolve_contact(
    a: &mut Entity,
    b: &mut Entity,
    ctx: &StepContext<'_>,
    events: &mut Vec<CombatEvent>,
) {
    use EntityType::{Obstacle, Player, PowerUp, Projectile};

    match (a.entity_type(), b.entity_type()) {
        (Player, t) if t.is_hostile() => player_vs_hostile(a, b, ctx, events),
        (t, Player) if t.is_hostile() => player_vs_hostile(b, a, ctx, events),
        (Projectile, t) if t.is_hostile() => projectile_vs_hostile(a, b, events),
        (t, Projectile) if t.is_hostile() => projectile_vs_hostile(b, a, events),
        (Projectile, Obstacle) => projectile_vs_obstacle(a, b, events),
        (Obstacle, Projectile) => projectile_vs_obstacle(b, a, events),
        (ta, tb) if ta.is_hostile() && tb.is_hostile() => separate(a, b),
        (t, Obstacle) if t.is_mover() => push_out_of_obstacle(a, b),
        (Obstacle, t) if t.is_mover() => push_out_of_obstacle(b, a),
        (Player, PowerUp) => collect_power_up(a, b, ctx, events),
        (PowerUp, Player) => collect_power_up(b, a, ctx, events),
        _ => {}
    }
}

fn player_vs_hostile(
    player: &mut Entity,
    hostile: &mut Entity,
    ctx: &StepContext<'_>,
    events: &mut Vec<CombatEvent>,
) {
    if player.is_invulnerable() || hostile.is_stunned() {
        return;
    }
    let Some(base_damage) = hostile.hostile().map(|h| h.damage) else {
        return;
    };
    let Some(state) = player.player() else {
        return;
    };
    let shield = &ctx.config.shield;
    let shielding = state.is_shielding();
    let parried = state.in_parry_window(ctx.clock, shield.parry_window);

    let mut away = (hostile.position - player.position).normalize();
    if away == Vec2::ZERO {
        away = Vec2::from_angle(state.facing);
    }

    if parried {
        if let Some(h) = hostile.hostile_mut() {
            h.stun(shield.parry_stun);
        }
        hostile.apply_impulse(away * shield.parry_knockback);
        if let Some(state) = player.player_mut() {
            state.restore_energy(shield.parry_energy_restore);
            state.score += ctx.config.player.parry_score;
        }
        tracing::debug!(enemy = hostile.id, "Perfect parry");
        events.push(CombatEvent::Parry { enemy: hostile.id });
        return;
    }

    let mut damage = base_damage;
    let mut knockback = ctx.config.player.contact_knockback;
    if shielding {
        damage *= 1.0 - shield.block_reduction;
        knockback *= shield.blocked_knockback_factor;
        events.push(CombatEvent::Block {
            enemy: hostile.id,
            absorbed: base_damage - damage,
        });
    }

    if damage > 0.0 {
        let dealt = player.take_damage(damage);
        player.invulnerable_for = ctx.config.player.hit_invulnerability;
        player.apply_impulse(-away * knockback);
        events.push(CombatEvent::Damage {
            target: player.id,
            source: Some(hostile.id),
            amount: dealt,
        });
        if !player.active {
            tracing::debug!(player = player.id, enemy = hostile.id, "Player killed");
            events.push(CombatEvent::Death {
                entity: player.id,
                killer: Some(hostile.id),
            });
        }
    }
}

fn projectile_vs_hostile(projectile: &mut Entity, hostile: &mut Entity, events: &mut Vec<CombatEvent>) {
    let EntityKind::Projectile(shot) = projectile.kind else {
        return;
    };
    if shot.owner == Some(hostile.id) {
        return;
    }
    let dealt = hostile.take_damage(shot.damage);
    projectile.deactivate();
    events.push(CombatEvent::Damage {
        target: hostile.id,
        source: shot.owner,
        amount: dealt,
    });
    if !hostile.active {
        events.push(CombatEvent::Death {
            entity: hostile.id,
            killer: shot.owner,
        });
    }
}

fn projectile_vs_obstacle(projectile: &mut Entity, obstacle: &mut Entity, events: &mut Vec<CombatEvent>) {
    let EntityKind::Projectile(shot) = projectile.kind else {
        return;
    };
    projectile.deactivate();
    let dealt = obstacle.take_damage(shot.damage);
    if dealt > 0.0 {
        events.push(CombatEvent::Damage {
            target: obstacle.id,
            source: shot.owner,
            amount: dealt,
        });
        if !obstacle.active {
            events.push(CombatEvent::Death {
                entity: obstacle.id,
                killer: shot.owner,
            });
        }
    }
}

/// Push two hostiles apart, each by half the overlap.
fn separate(a: &mut Entity, b: &mut Entity) {
    let delta = b.position - a.position;
    let distance = delta.length();
    let overlap = a.radius + b.radius - distance;
    if overlap <= 0.0 {
        return;
    }
    // Coincident centers: a (lower id) goes -X, b goes +X.
    let axis = if distance > EPSILON { delta / distance } else { Vec2::X };
    let half = axis * (overlap * 0.5);
    a.position -= half;
    b.position += half;
}

/// Move `mover` fully out of `obstacle` and drop its inward velocity.
fn push_out_of_obstacle(mover: &mut Entity, obstacle: &Entity) {
    let delta = mover.position - obstacle.position;
    let distance = delta.length();
    let overlap = mover.radius + obstacle.radius - distance;
    if overlap <= 0.0 {
        return;
    }
    let normal = if distance > EPSILON { delta / distance } else { Vec2::X };
    mover.position += normal * overlap;
    let inward = mover.velocity.dot(normal);
    if inward < 0.0 {
        mover.velocity -= normal * inward;
    }
}

fn collect_power_up(
    player: &mut Entity,
    power_up: &mut Entity,
    ctx: &StepContext<'_>,
    events: &mut Vec<CombatEvent>,
) {
    let EntityKind::PowerUp(pickup) = power_up.kind else {
        return;
    };
    let tuning = &ctx.config.power_up;
    match pickup.kind {
        PowerUpKind::Health => {
            player.heal(tuning.health_amount);
        }
        PowerUpKind::Energy => {
            if let Some(state) = player.player_mut() {
                state.restore_energy(tuning.energy_amount);
            }
        }
        PowerUpKind::Speed => {
            if let Some(state) = player.player_mut() {
                state.speed_buff.grant(tuning.speed_multiplier, tuning.buff_duration);
            }
        }
        PowerUpKind::Damage => {
            if let Some(state) = player.player_mut() {
                state.damage_buff.grant(tuning.damage_multiplier, tuning.buff_duration);
            }
        }
    }
    if let Some(state) = player.player_mut() {
        state.score += ctx.config.player.pickup_score;
    }
    power_up.deactivate();
    events.push(CombatEvent::PowerUpCollected {
        power_up: power_up.id,
        kind: pickup.kind,
    });
}

/// Apply the player's active swing to every hostile inside the arc.
///
/// Each hostile is struck at most once per swing. Returns the number of
/// hostiles hit this call.
pub fn sweep_melee(
    registry: &mut EntityRegistry,
    grid: &SpatialHashGrid,
    player_id: EntityId,
    ctx: &StepContext<'_>,
    events: &mut Vec<CombatEvent>,
) -> usize {
    let attack = &ctx.config.attack;
    let Some(player) = registry.get_active(player_id) else {
        return 0;
    };
    let Some(state) = player.player() else {
        return 0;
    };
    let AttackState::Swinging { angle, hits, .. } = &state.attack else {
        return 0;
    };
    let origin = player.position;
    let damage = attack.damage * state.damage_buff.value();

    let struck: Vec<(EntityId, Vec2)> = grid
        .query(origin, attack.range, Some(player_id))
        .into_iter()
        .filter(|id| !hits.contains(id))
        .filter_map(|id| registry.get_active(id))
        .filter(|target| target.entity_type().is_hostile())
        .filter_map(|target| {
            let offset = target.position - origin;
            let reach = attack.range + target.radius;
            if offset.length_squared() > reach * reach {
                return None;
            }
            let in_arc = offset.length_squared() < EPSILON * EPSILON
                || angle_delta(*angle, offset.angle()) <= attack.arc * 0.5;
            in_arc.then(|| (target.id, offset.normalize()))
        })
        .collect();

    for &(id, direction) in &struck {
        let Some(target) = registry.get_active_mut(id) else {
            continue;
        };
        let dealt = target.take_damage(damage);
        target.apply_impulse(direction * attack.knockback);
        if let Some(h) = target.hostile_mut() {
            h.stun(attack.hit_stun);
        }
        events.push(CombatEvent::Damage {
            target: id,
            source: Some(player_id),
            amount: dealt,
        });
        if !target.active {
            events.push(CombatEvent::Death {
                entity: id,
                killer: Some(player_id),
            });
        }
    }

    if let Some(AttackState::Swinging { hits, .. }) = registry
        .get_mut(player_id)
        .and_then(Entity::player_mut)
        .map(|state| &mut state.attack)
    {
        hits.extend(struck.iter().map(|(id, _)| *id));
    }
    struck.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::components::{
        EnemyState, ObstacleState, PlayerState, PowerUpState, ProjectileState, ShieldState,
    };
    use crate::config::SimConfig;

    fn spawn_player(registry: &mut EntityRegistry, config: &SimConfig, pos: Vec2) -> EntityId {
        registry
            .insert(Entity::new(
                pos,
                config.player.radius,
                config.player.max_health,
                EntityKind::Player(PlayerState::new(&config.player)),
            ))
            .unwrap()
    }

    fn spawn_enemy(registry: &mut EntityRegistry, config: &SimConfig, pos: Vec2) -> EntityId {
        let id = registry.peek_next_id();
        registry
            .insert(Entity::new(
                pos,
                config.enemy.radius,
                config.enemy.max_health,
                EntityKind::Enemy(EnemyState::new(id, &config.enemy)),
            ))
            .unwrap()
    }

    fn raise_shield(registry: &mut EntityRegistry, player: EntityId, at: f64) {
        registry.get_mut(player).unwrap().player_mut().unwrap().shield =
            ShieldState::Shielding { started_at: at };
    }

    #[test]
    fn test_touching_circles_do_not_overlap() {
        assert!(!circles_overlap(Vec2::ZERO, 10.0, Vec2::new(20.0, 0.0), 10.0));
        assert!(circles_overlap(Vec2::ZERO, 10.0, Vec2::new(19.9, 0.0), 10.0));
    }

    #[test]
    fn test_unshielded_contact_damages_and_grants_invulnerability() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let e = spawn_enemy(&mut registry, &config, Vec2::new(120.0, 100.0));
        let mut events = Vec::new();

        assert!(resolve_pair(&mut registry, p, e, &ctx, &mut events));
        let player = registry.get(p).unwrap();
        assert_eq!(player.health.current(), 90.0);
        assert!(player.is_invulnerable());
        assert!(player.velocity.x < 0.0);

        // Second contact inside the invulnerability window does nothing.
        resolve_pair(&mut registry, p, e, &ctx, &mut events);
        assert_eq!(registry.get(p).unwrap().health.current(), 90.0);
    }

    #[test]
    fn test_parry_inside_window() {
        let config = SimConfig::default();
        let mut clock = SimClock::new();
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let e = spawn_enemy(&mut registry, &config, Vec2::new(120.0, 100.0));
        raise_shield(&mut registry, p, 0.0);
        registry.get_mut(p).unwrap().player_mut().unwrap().energy = 10.0;
        clock.advance(0.15);
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut events = Vec::new();

        resolve_pair(&mut registry, p, e, &ctx, &mut events);
        let player = registry.get(p).unwrap();
        assert_eq!(player.health.current(), 100.0);
        assert_eq!(player.player().unwrap().energy, 40.0);
        assert!(registry.get(e).unwrap().is_stunned());
        assert_eq!(events, vec![CombatEvent::Parry { enemy: e }]);
    }

    #[test]
    fn test_block_outside_window_reduces_damage() {
        let config = SimConfig::default();
        let mut clock = SimClock::new();
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let e = spawn_enemy(&mut registry, &config, Vec2::new(120.0, 100.0));
        raise_shield(&mut registry, p, 0.0);
        clock.advance(0.3);
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut events = Vec::new();

        resolve_pair(&mut registry, p, e, &ctx, &mut events);
        let expected = 100.0 - 10.0 * (1.0 - 0.7);
        assert!((registry.get(p).unwrap().health.current() - expected).abs() < 1e-4);
        assert!(!registry.get(e).unwrap().is_stunned());
    }

    #[test]
    fn test_stunned_enemy_deals_no_contact_damage() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let e = spawn_enemy(&mut registry, &config, Vec2::new(120.0, 100.0));
        registry.get_mut(e).unwrap().hostile_mut().unwrap().stun(1.0);
        let mut events = Vec::new();

        resolve_pair(&mut registry, p, e, &ctx, &mut events);
        assert_eq!(registry.get(p).unwrap().health.current(), 100.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_projectile_ignores_owner_and_hits_others() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let e = spawn_enemy(&mut registry, &config, Vec2::new(100.0, 100.0));
        let owned = registry
            .insert(Entity::new(
                Vec2::new(100.0, 100.0),
                5.0,
                1.0,
                EntityKind::Projectile(ProjectileState {
                    damage: 60.0,
                    owner: Some(e),
                    lifetime: 1.0,
                }),
            ))
            .unwrap();
        let foreign = registry
            .insert(Entity::new(
                Vec2::new(100.0, 100.0),
                5.0,
                1.0,
                EntityKind::Projectile(ProjectileState {
                    damage: 60.0,
                    owner: None,
                    lifetime: 1.0,
                }),
            ))
            .unwrap();
        let mut events = Vec::new();

        resolve_pair(&mut registry, e, owned, &ctx, &mut events);
        assert!(registry.get(owned).unwrap().active);
        assert!(registry.get(e).unwrap().active);

        resolve_pair(&mut registry, e, foreign, &ctx, &mut events);
        assert!(!registry.get(foreign).unwrap().active);
        assert!(!registry.get(e).unwrap().active);
        assert!(events.contains(&CombatEvent::Death { entity: e, killer: None }));
    }

    #[test]
    fn test_inactive_entity_is_skipped() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let e = spawn_enemy(&mut registry, &config, Vec2::new(110.0, 100.0));
        registry.get_mut(e).unwrap().deactivate();
        let mut events = Vec::new();
        assert!(!resolve_pair(&mut registry, p, e, &ctx, &mut events));
        assert_eq!(registry.get(p).unwrap().health.current(), 100.0);
    }

    #[test]
    fn test_coincident_enemies_separate_deterministically() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let a = spawn_enemy(&mut registry, &config, Vec2::new(100.0, 100.0));
        let b = spawn_enemy(&mut registry, &config, Vec2::new(100.0, 100.0));
        let mut events = Vec::new();
        resolve_pair(&mut registry, a, b, &ctx, &mut events);
        assert_eq!(registry.get(a).unwrap().position, Vec2::new(85.0, 100.0));
        assert_eq!(registry.get(b).unwrap().position, Vec2::new(115.0, 100.0));
    }

    #[test]
    fn test_obstacle_pushes_mover_out() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let e = spawn_enemy(&mut registry, &config, Vec2::new(130.0, 100.0));
        registry.get_mut(e).unwrap().velocity = Vec2::new(-50.0, 10.0);
        let rock = registry
            .insert(Entity::new(
                Vec2::new(100.0, 100.0),
                25.0,
                999_999.0,
                EntityKind::Obstacle(ObstacleState { destructible: false }),
            ))
            .unwrap();
        let mut events = Vec::new();
        resolve_pair(&mut registry, e, rock, &ctx, &mut events);
        let enemy = registry.get(e).unwrap();
        assert!((enemy.position.x - 140.0).abs() < 1e-4);
        assert_eq!(enemy.velocity, Vec2::new(0.0, 10.0));
        assert_eq!(registry.get(rock).unwrap().position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_power_up_pickup() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(100.0, 100.0));
        let pickup = registry
            .insert(Entity::new(
                Vec2::new(110.0, 100.0),
                15.0,
                1.0,
                EntityKind::PowerUp(PowerUpState {
                    kind: PowerUpKind::Damage,
                    lifetime: 10.0,
                }),
            ))
            .unwrap();
        let mut events = Vec::new();
        resolve_pair(&mut registry, pickup, p, &ctx, &mut events);
        assert!(!registry.get(pickup).unwrap().active);
        let state = registry.get(p).unwrap().player().unwrap();
        assert_eq!(state.damage_buff.value(), 2.0);
    }

    #[test]
    fn test_melee_hits_each_target_once_per_swing() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let ctx = StepContext { config: &config, clock: &clock, dt: 0.016 };
        let mut registry = EntityRegistry::new(10);
        let p = spawn_player(&mut registry, &config, Vec2::new(500.0, 500.0));
        let ahead = spawn_enemy(&mut registry, &config, Vec2::new(560.0, 500.0));
        let behind = spawn_enemy(&mut registry, &config, Vec2::new(450.0, 500.0));
        registry.get_mut(p).unwrap().player_mut().unwrap().attack = AttackState::Swinging {
            angle: 0.0,
            elapsed: 0.0,
            hits: Default::default(),
        };
        let mut grid = SpatialHashGrid::new(config.grid.cell_size);
        grid.rebuild(registry.iter_active().map(|e| (e.id, e.position, e.radius)));
        let mut events = Vec::new();

        assert_eq!(sweep_melee(&mut registry, &grid, p, &ctx, &mut events), 1);
        assert_eq!(registry.get(ahead).unwrap().health.current(), 20.0);
        assert_eq!(registry.get(behind).unwrap().health.current(), 50.0);
        assert!(registry.get(ahead).unwrap().is_stunned());

        assert_eq!(sweep_melee(&mut registry, &grid, p, &ctx, &mut events), 0);
        assert_eq!(registry.get(ahead).unwrap().health.current(), 20.0);
    }
}
