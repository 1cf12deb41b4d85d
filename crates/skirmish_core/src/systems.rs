//! Per-entity update systems.
//!
//! Each function advances one entity by `dt`: timers, state machines,
//! steering and motion integration. They never look at other entities;
//! anything they need from the world (target position, pack centroid) is
//! resolved by the orchestrator and passed in.

use crate::clock::SimClock;
use crate::components::{
    tick_down, AttackState, BehaviorState, RollState, ShieldState, WolfAction,
};
use crate::config::{SimConfig, WorldConfig};
use crate::entity::{Entity, EntityKind, Mover};
use crate::math::{finite_or, Vec2, EPSILON};

/// Inputs shared by every system call within one tick.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Active tuning.
    pub config: &'a SimConfig,
    /// Clock, already advanced for this tick.
    pub clock: &'a SimClock,
    /// Step length in seconds.
    pub dt: f32,
}

/// Frame-rate independent decay: `factor` per `reference` seconds.
#[must_use]
pub fn decay_factor(factor: f32, dt: f32, reference: f32) -> f32 {
    factor.powf(dt / reference)
}

/// Advance the player: facing, timers, shield/attack/roll machines, energy
/// regeneration and locomotion.
pub fn update_player(entity: &mut Entity, ctx: &StepContext<'_>) {
    let dt = ctx.dt;
    let config = ctx.config;
    let position = entity.position;
    entity.update_invulnerability(dt);

    let EntityKind::Player(player) = &mut entity.kind else {
        return;
    };

    if let Some(aim) = player.aim_point {
        let to_aim = aim - position;
        if to_aim.length_squared() > EPSILON * EPSILON {
            player.facing = to_aim.angle();
        }
    }

    tick_down(&mut player.shield_cooldown, dt);
    tick_down(&mut player.attack_cooldown, dt);
    tick_down(&mut player.roll_cooldown, dt);
    tick_down(&mut player.speed_buff.remaining, dt);
    tick_down(&mut player.damage_buff.remaining, dt);

    if let Some(held) = player.shield_elapsed(ctx.clock) {
        if held >= config.shield.max_duration {
            player.shield = ShieldState::Idle;
            player.shield_cooldown = config.shield.cooldown;
            tracing::trace!("Shield held too long, dropped");
        }
    }

    // A swing ends on the tick after its window closes, so the arc sweep
    // always runs at least once per swing.
    if let AttackState::Swinging { elapsed, .. } = &mut player.attack {
        if *elapsed >= config.attack.active_duration {
            player.attack = AttackState::Ready;
        } else {
            *elapsed += dt;
        }
    }

    if !player.is_rolling() && !player.is_attacking() {
        player.restore_energy(config.player.energy_regen * dt);
    }

    if let RollState::Rolling {
        direction,
        elapsed,
        traveled,
    } = &mut player.roll
    {
        let cap = config.roll.distance;
        let step = (config.roll.speed() * dt).min((cap - *traveled).max(0.0));
        entity.position += *direction * step;
        *traveled += step;
        *elapsed += dt;
        entity.velocity = *direction * config.roll.speed();
        if *elapsed >= config.roll.duration || *traveled >= cap {
            player.roll = RollState::Idle;
            player.roll_cooldown = config.roll.cooldown;
            entity.velocity *= 0.5;
        }
        return;
    }

    let mut max_speed = config.player.max_speed * player.speed_buff.value();
    if player.is_shielding() {
        max_speed *= config.shield.move_factor;
    }

    // Friction applies on every non-roll tick, held input included.
    entity.velocity *= decay_factor(
        config.player.friction,
        dt,
        config.player.friction_reference,
    );
    let intent = player.movement_intent.normalize();
    if intent != Vec2::ZERO {
        entity.velocity += intent * (config.player.acceleration * dt);
    }
    entity.velocity = entity.velocity.clamp_length(max_speed);
    entity.integrate(dt);
}

/// Advance a standard enemy toward (or around) `target`.
///
/// `target` is the resolved world position of its steering target, or
/// `None` when the target is missing or inactive.
pub fn update_enemy(entity: &mut Entity, target: Option<Vec2>, ctx: &StepContext<'_>) {
    let dt = ctx.dt;
    let config = &ctx.config.enemy;
    let friction = decay_factor(config.friction, dt, ctx.config.player.friction_reference);
    let position = entity.position;
    entity.update_invulnerability(dt);

    let EntityKind::Enemy(enemy) = &mut entity.kind else {
        return;
    };

    enemy.update_stun(dt);
    let velocity = if enemy.is_stunned() {
        entity.velocity * friction
    } else if let Some(target) = target {
        let (behavior, velocity) = steer_bands(
            position,
            target,
            enemy.speed,
            enemy.orbit_sign,
            config.flee_distance,
            config.engage_distance,
            config.circle_inward_weight,
            None,
        );
        enemy.behavior = behavior;
        velocity
    } else {
        enemy.behavior = BehaviorState::Idle;
        entity.velocity * friction
    };
    entity.velocity = velocity;
    entity.integrate(dt);
}

/// Advance a wolf: pack-aware prowling plus the lunge machine.
///
/// `pack_centroid` is the mean position of the wolf's other active pack
/// members, if any remain.
pub fn update_wolf(
    entity: &mut Entity,
    target: Option<Vec2>,
    pack_centroid: Option<Vec2>,
    ctx: &StepContext<'_>,
) {
    let dt = ctx.dt;
    let config = ctx.config;
    let friction = decay_factor(config.enemy.friction, dt, config.player.friction_reference);
    let position = entity.position;
    entity.update_invulnerability(dt);

    let EntityKind::Wolf(wolf) = &mut entity.kind else {
        return;
    };

    tick_down(&mut wolf.lunge_cooldown, dt);
    wolf.enemy.update_stun(dt);
    if wolf.enemy.is_stunned() {
        wolf.action = WolfAction::Prowl;
        entity.velocity *= friction;
        entity.integrate(dt);
        return;
    }

    match wolf.action {
        WolfAction::Lunging {
            direction,
            remaining,
        } => {
            entity.velocity = direction * config.wolf.lunge_speed;
            let remaining = remaining - dt;
            wolf.action = if remaining <= 0.0 {
                WolfAction::Recovering {
                    remaining: config.wolf.recovery_duration,
                }
            } else {
                WolfAction::Lunging {
                    direction,
                    remaining,
                }
            };
        }
        WolfAction::Recovering { remaining } => {
            entity.velocity *= friction;
            let remaining = remaining - dt;
            wolf.action = if remaining <= 0.0 {
                WolfAction::Prowl
            } else {
                WolfAction::Recovering { remaining }
            };
        }
        WolfAction::Prowl => {
            let engaged = target.filter(|t| t.distance_squared(position) <= wolf.alert_radius.powi(2));
            match engaged {
                None => {
                    wolf.enemy.behavior = BehaviorState::Idle;
                    entity.velocity *= friction;
                }
                Some(target) => {
                    let to_target = target - position;
                    let distance = to_target.length();
                    if distance <= wolf.attack_radius && wolf.lunge_cooldown <= 0.0 {
                        let direction = to_target.normalize();
                        wolf.action = WolfAction::Lunging {
                            direction,
                            remaining: config.wolf.lunge_duration,
                        };
                        wolf.lunge_cooldown = config.wolf.lunge_cooldown;
                        wolf.enemy.behavior = BehaviorState::Seek;
                        entity.velocity = direction * config.wolf.lunge_speed;
                        tracing::trace!(wolf = entity.id, "Wolf lunges");
                    } else {
                        let cohesion = pack_centroid.map(|c| {
                            (
                                config.wolf.seek_weight,
                                (c - position).normalize() * config.wolf.cohesion_weight,
                            )
                        });
                        let (behavior, velocity) = steer_bands(
                            position,
                            target,
                            wolf.enemy.speed,
                            wolf.enemy.orbit_sign,
                            config.enemy.flee_distance,
                            wolf.attack_radius,
                            config.enemy.circle_inward_weight,
                            cohesion,
                        );
                        wolf.enemy.behavior = behavior;
                        entity.velocity = velocity;
                    }
                }
            }
        }
    }
    entity.integrate(dt);
}

/// Shared distance-band steering.
///
/// Returns the behavior and the new velocity. `cohesion` optionally blends
/// the seek heading as `heading * weight + pull`.
fn steer_bands(
    position: Vec2,
    target: Vec2,
    speed: f32,
    orbit_sign: f32,
    flee_distance: f32,
    engage_distance: f32,
    inward_weight: f32,
    cohesion: Option<(f32, Vec2)>,
) -> (BehaviorState, Vec2) {
    let to_target = target - position;
    let distance = to_target.length();
    let heading = to_target.normalize();

    if distance < flee_distance {
        (BehaviorState::Flee, -heading * speed)
    } else if distance <= engage_distance {
        let tangent = heading.perp() * orbit_sign;
        let blended = (tangent * (1.0 - inward_weight) + heading * inward_weight).normalize();
        (BehaviorState::Circle, blended * speed)
    } else {
        let direction = match cohesion {
            Some((weight, pull)) => {
                let blended = (heading * weight + pull).normalize();
                if blended == Vec2::ZERO {
                    heading
                } else {
                    blended
                }
            }
            None => heading,
        };
        (BehaviorState::Seek, direction * speed)
    }
}

/// Advance a projectile. Deactivates it when its lifetime runs out.
pub fn update_projectile(entity: &mut Entity, ctx: &StepContext<'_>) {
    let EntityKind::Projectile(projectile) = &mut entity.kind else {
        return;
    };
    tick_down(&mut projectile.lifetime, ctx.dt);
    if projectile.lifetime <= 0.0 {
        entity.deactivate();
        return;
    }
    entity.integrate(ctx.dt);
}

/// Advance a power-up. Deactivates it when its lifetime runs out.
pub fn update_power_up(entity: &mut Entity, ctx: &StepContext<'_>) {
    let EntityKind::PowerUp(power_up) = &mut entity.kind else {
        return;
    };
    tick_down(&mut power_up.lifetime, ctx.dt);
    if power_up.lifetime <= 0.0 {
        entity.deactivate();
    }
}

/// Sanitize non-finite state and keep the entity inside the world.
///
/// NaN coordinates reset to the world center, infinities clamp to the
/// nearest edge, and non-finite velocity components become zero.
/// Projectiles are not clamped: once they leave the world by more than the
/// configured margin they are deactivated.
pub fn confine_to_world(entity: &mut Entity, world: &WorldConfig) {
    let center = world.center();
    if entity.position.x.is_nan() {
        entity.position.x = center.x;
    }
    if entity.position.y.is_nan() {
        entity.position.y = center.y;
    }
    entity.velocity = entity.velocity.finite_or_zero();

    if matches!(entity.kind, EntityKind::Projectile(_)) {
        let margin = world.projectile_margin;
        let p = entity.position;
        if p.x < -margin || p.y < -margin || p.x > world.width + margin || p.y > world.height + margin
        {
            entity.deactivate();
        }
        return;
    }

    let r = finite_or(entity.radius, 0.0).max(0.0);
    let (x, vx) = confine_axis(entity.position.x, entity.velocity.x, r, world.width);
    let (y, vy) = confine_axis(entity.position.y, entity.velocity.y, r, world.height);
    entity.position = Vec2::new(x, y);
    entity.velocity = Vec2::new(vx, vy);
}

fn confine_axis(pos: f32, vel: f32, radius: f32, extent: f32) -> (f32, f32) {
    if extent < radius * 2.0 {
        return (extent * 0.5, 0.0);
    }
    let (lo, hi) = (radius, extent - radius);
    if pos < lo {
        (lo, vel.max(0.0))
    } else if pos > hi {
        (hi, vel.min(0.0))
    } else {
        (pos, vel)
    }
}
