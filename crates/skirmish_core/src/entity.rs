//! The entity record and its capability traits.
//!
//! Every simulated object is an [`Entity`]: a shared base record plus one
//! [`EntityKind`] variant holding the type-specific state. Systems dispatch
//! on the variant; capabilities that several variants share are expressed
//! through the [`Damageable`], [`Mover`] and [`Targetable`] traits.

use serde::{Deserialize, Serialize};

use crate::components::{
    tick_down, EnemyState, EntityId, EntityType, Health, ObstacleState, PlayerState,
    PowerUpState, ProjectileState, WolfState,
};
use crate::math::Vec2;

/// Type-specific entity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player.
    Player(PlayerState),
    /// Standard enemy.
    Enemy(EnemyState),
    /// Wolf.
    Wolf(WolfState),
    /// Projectile.
    Projectile(ProjectileState),
    /// Power-up.
    PowerUp(PowerUpState),
    /// Obstacle.
    Obstacle(ObstacleState),
}

/// A simulated object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// World position of the center.
    pub position: Vec2,
    /// Velocity in world units per second.
    pub velocity: Vec2,
    /// Collision radius.
    pub radius: f32,
    /// Health.
    pub health: Health,
    /// Inactive entities are skipped by every system and swept at tick end.
    pub active: bool,
    /// Remaining post-hit invulnerability.
    pub invulnerable_for: f32,
    /// Type-specific state.
    pub kind: EntityKind,
}

impl Entity {
    /// Create an active entity at rest. The id is assigned by the registry.
    #[must_use]
    pub fn new(position: Vec2, radius: f32, max_health: f32, kind: EntityKind) -> Self {
        Self {
            id: 0,
            position,
            velocity: Vec2::ZERO,
            radius,
            health: Health::new(max_health),
            active: true,
            invulnerable_for: 0.0,
            kind,
        }
    }

    /// Type tag of this entity.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self.kind {
            EntityKind::Player(_) => EntityType::Player,
            EntityKind::Enemy(_) => EntityType::Enemy,
            EntityKind::Wolf(_) => EntityType::Wolf,
            EntityKind::Projectile(_) => EntityType::Projectile,
            EntityKind::PowerUp(_) => EntityType::PowerUp,
            EntityKind::Obstacle(_) => EntityType::Obstacle,
        }
    }

    /// Player state, if this is the player.
    #[must_use]
    pub fn player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Mutable player state, if this is the player.
    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Hostile state shared by enemies and wolves.
    #[must_use]
    pub fn hostile(&self) -> Option<&EnemyState> {
        match &self.kind {
            EntityKind::Enemy(enemy) => Some(enemy),
            EntityKind::Wolf(wolf) => Some(&wolf.enemy),
            _ => None,
        }
    }

    /// Mutable hostile state shared by enemies and wolves.
    pub fn hostile_mut(&mut self) -> Option<&mut EnemyState> {
        match &mut self.kind {
            EntityKind::Enemy(enemy) => Some(enemy),
            EntityKind::Wolf(wolf) => Some(&mut wolf.enemy),
            _ => None,
        }
    }

    /// Wolf state, if this is a wolf.
    #[must_use]
    pub fn wolf(&self) -> Option<&WolfState> {
        match &self.kind {
            EntityKind::Wolf(wolf) => Some(wolf),
            _ => None,
        }
    }

    /// Mutable wolf state, if this is a wolf.
    pub fn wolf_mut(&mut self) -> Option<&mut WolfState> {
        match &mut self.kind {
            EntityKind::Wolf(wolf) => Some(wolf),
            _ => None,
        }
    }

    /// Whether damage is currently ignored.
    ///
    /// Covers the post-hit window and, for the player, an active roll.
    #[must_use]
    pub fn is_invulnerable(&self) -> bool {
        if self.invulnerable_for > 0.0 {
            return true;
        }
        self.player().is_some_and(PlayerState::is_rolling)
    }

    /// Whether the entity is a stunned hostile.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.hostile().is_some_and(EnemyState::is_stunned)
    }

    /// Count down the post-hit invulnerability window.
    pub fn update_invulnerability(&mut self, dt: f32) {
        tick_down(&mut self.invulnerable_for, dt);
    }

    /// Mark inactive. Idempotent.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Something that can lose and regain health.
pub trait Damageable {
    /// Apply damage. Returns the amount actually dealt.
    ///
    /// Ignored while inactive or invulnerable. Reaching zero health
    /// deactivates the entity.
    fn take_damage(&mut self, amount: f32) -> f32;

    /// Restore health up to the maximum.
    fn heal(&mut self, amount: f32) -> f32;

    /// Whether the entity still has health left.
    fn is_alive(&self) -> bool;
}

impl Damageable for Entity {
    fn take_damage(&mut self, amount: f32) -> f32 {
        if !self.active || self.is_invulnerable() {
            return 0.0;
        }
        if let EntityKind::Obstacle(ObstacleState {
            destructible: false,
        }) = self.kind
        {
            return 0.0;
        }
        let dealt = self.health.apply_damage(amount);
        if self.health.is_depleted() {
            self.deactivate();
        }
        dealt
    }

    fn heal(&mut self, amount: f32) -> f32 {
        if !self.active {
            return 0.0;
        }
        self.health.heal(amount)
    }

    fn is_alive(&self) -> bool {
        !self.health.is_depleted()
    }
}

/// Something that moves under its own velocity.
pub trait Mover {
    /// Advance position by `velocity * dt`.
    fn integrate(&mut self, dt: f32);

    /// Add an instantaneous velocity change.
    fn apply_impulse(&mut self, impulse: Vec2);
}

impl Mover for Entity {
    fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    fn apply_impulse(&mut self, impulse: Vec2) {
        if impulse.is_finite() {
            self.velocity += impulse;
        }
    }
}

/// Something the targeting subsystem may lock onto.
pub trait Targetable {
    /// Whether this entity is currently a valid target.
    fn is_targetable(&self) -> bool;
}

impl Targetable for Entity {
    fn is_targetable(&self) -> bool {
        self.active && self.entity_type().is_hostile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnemyConfig, PlayerConfig};

    fn enemy_at(position: Vec2) -> Entity {
        Entity::new(
            position,
            15.0,
            50.0,
            EntityKind::Enemy(EnemyState::new(1, &EnemyConfig::default())),
        )
    }

    #[test]
    fn test_damage_to_zero_deactivates() {
        let mut enemy = enemy_at(Vec2::ZERO);
        assert_eq!(enemy.take_damage(80.0), 50.0);
        assert!(!enemy.active);
        assert!(!enemy.is_alive());
        assert_eq!(enemy.take_damage(10.0), 0.0);
    }

    #[test]
    fn test_invulnerable_ignores_damage() {
        let mut enemy = enemy_at(Vec2::ZERO);
        enemy.invulnerable_for = 0.5;
        assert_eq!(enemy.take_damage(10.0), 0.0);
        enemy.update_invulnerability(0.6);
        assert_eq!(enemy.take_damage(10.0), 10.0);
    }

    #[test]
    fn test_indestructible_obstacle_ignores_damage() {
        let mut rock = Entity::new(
            Vec2::ZERO,
            40.0,
            999_999.0,
            EntityKind::Obstacle(ObstacleState {
                destructible: false,
            }),
        );
        assert_eq!(rock.take_damage(1_000_000.0), 0.0);
        assert!(rock.active);
    }

    #[test]
    fn test_rolling_player_is_invulnerable() {
        let mut player = Entity::new(
            Vec2::ZERO,
            20.0,
            100.0,
            EntityKind::Player(PlayerState::new(&PlayerConfig::default())),
        );
        assert!(!player.is_invulnerable());
        if let Some(state) = player.player_mut() {
            state.roll = crate::components::RollState::Rolling {
                direction: Vec2::X,
                elapsed: 0.0,
                traveled: 0.0,
            };
        }
        assert!(player.is_invulnerable());
    }

    #[test]
    fn test_integrate_zero_velocity_is_stationary() {
        let mut enemy = enemy_at(Vec2::new(12.5, -3.0));
        enemy.integrate(1000.0);
        assert_eq!(enemy.position, Vec2::new(12.5, -3.0));
    }

    #[test]
    fn test_only_active_hostiles_are_targetable() {
        let mut enemy = enemy_at(Vec2::ZERO);
        assert!(enemy.is_targetable());
        enemy.deactivate();
        assert!(!enemy.is_targetable());
    }
}
