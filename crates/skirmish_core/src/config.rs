//! Simulation tuning.
//!
//! Every gameplay constant lives in [`SimConfig`]. Durations are in seconds,
//! distances in world units, speeds in world units per second. Configs are
//! plain serde structs so they can be loaded from RON alongside scenarios.
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::SimConfig;
//!
//! let config = SimConfig::from_ron_str("(shield: (parry_window: 0.2))").unwrap();
//! assert_eq!(config.shield.parry_window, 0.2);
//! assert_eq!(config.shield.block_reduction, 0.7);
//! ```

use std::f32::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::Vec2;

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// World dimensions and bounds handling.
    pub world: WorldConfig,
    /// Player locomotion and resources.
    pub player: PlayerConfig,
    /// Shield, block and perfect parry.
    pub shield: ShieldConfig,
    /// Melee sword attack.
    pub attack: AttackConfig,
    /// Dodge roll.
    pub roll: RollConfig,
    /// Standard enemy.
    pub enemy: EnemyConfig,
    /// Wolf enemy.
    pub wolf: WolfConfig,
    /// Projectiles.
    pub projectile: ProjectileConfig,
    /// Power-up pickups.
    pub power_up: PowerUpConfig,
    /// Obstacles.
    pub obstacle: ObstacleConfig,
    /// Target acquisition.
    pub targeting: TargetingConfig,
    /// Camera follow.
    pub camera: CameraConfig,
    /// Broad phase.
    pub grid: GridConfig,
    /// Hard limits.
    pub limits: LimitsConfig,
}

/// World dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World width.
    pub width: f32,
    /// World height.
    pub height: f32,
    /// Projectiles further than this outside the world are deactivated.
    pub projectile_margin: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
            projectile_margin: 50.0,
        }
    }
}

impl WorldConfig {
    /// World size as a vector.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// World center.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

/// Player locomotion and resource tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Collision radius.
    pub radius: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Maximum energy.
    pub max_energy: f32,
    /// Energy regained per second while not rolling or attacking.
    pub energy_regen: f32,
    /// Acceleration toward the movement intent.
    pub acceleration: f32,
    /// Speed cap without buffs.
    pub max_speed: f32,
    /// Velocity retained per reference frame when no intent is given.
    pub friction: f32,
    /// Duration of the reference frame `friction` is expressed against.
    pub friction_reference: f32,
    /// Invulnerability granted after taking contact damage.
    pub hit_invulnerability: f32,
    /// Contact knockback impulse applied to the player.
    pub contact_knockback: f32,
    /// Energy cost of firing a projectile.
    pub shoot_energy_cost: f32,
    /// Score for each kill.
    pub kill_score: u32,
    /// Score for each power-up collected.
    pub pickup_score: u32,
    /// Score for each perfect parry.
    pub parry_score: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            max_health: 100.0,
            max_energy: 100.0,
            energy_regen: 12.0,
            acceleration: 1800.0,
            max_speed: 300.0,
            friction: 0.9,
            friction_reference: 1.0 / 60.0,
            hit_invulnerability: 1.0,
            contact_knockback: 300.0,
            shoot_energy_cost: 5.0,
            kill_score: 10,
            pickup_score: 5,
            parry_score: 5,
        }
    }
}

/// Shield, block and perfect parry tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Perfect parry window measured from shield start.
    pub parry_window: f32,
    /// Fraction of damage removed by a block outside the window.
    pub block_reduction: f32,
    /// Stun applied to an enemy that is perfectly parried.
    pub parry_stun: f32,
    /// Energy restored to the player on a perfect parry.
    pub parry_energy_restore: f32,
    /// Knockback impulse applied to a parried enemy.
    pub parry_knockback: f32,
    /// Knockback multiplier applied to the player while blocking.
    pub blocked_knockback_factor: f32,
    /// Maximum hold before the shield drops on its own.
    pub max_duration: f32,
    /// Cooldown after the shield drops.
    pub cooldown: f32,
    /// Movement speed multiplier while shielding.
    pub move_factor: f32,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            parry_window: 0.150,
            block_reduction: 0.7,
            parry_stun: 1.5,
            parry_energy_restore: 30.0,
            parry_knockback: 400.0,
            blocked_knockback_factor: 0.5,
            max_duration: 2.0,
            cooldown: 0.5,
            move_factor: 0.5,
        }
    }
}

/// Melee sword attack tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Reach measured from the player's center, extended by the target radius.
    pub range: f32,
    /// Full angular width of the swing in radians.
    pub arc: f32,
    /// Damage per hit before buffs.
    pub damage: f32,
    /// Knockback impulse applied to struck enemies.
    pub knockback: f32,
    /// Stun applied to struck enemies.
    pub hit_stun: f32,
    /// Time the swing actively hits.
    pub active_duration: f32,
    /// Time before another swing may start.
    pub cooldown: f32,
    /// Energy consumed per swing.
    pub energy_cost: f32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            range: 60.0,
            arc: PI / 3.0,
            damage: 30.0,
            knockback: 400.0,
            hit_stun: 0.2,
            active_duration: 0.2,
            cooldown: 0.4,
            energy_cost: 10.0,
        }
    }
}

/// Dodge roll tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// Maximum displacement of one roll.
    pub distance: f32,
    /// Roll duration.
    pub duration: f32,
    /// Cooldown after the roll ends.
    pub cooldown: f32,
    /// Energy consumed per roll.
    pub energy_cost: f32,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            distance: 150.0,
            duration: 0.3,
            cooldown: 0.8,
            energy_cost: 15.0,
        }
    }
}

impl RollConfig {
    /// Speed that covers `distance` in exactly `duration`.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.distance / self.duration
    }
}

/// Standard enemy tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Collision radius.
    pub radius: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Contact damage.
    pub damage: f32,
    /// Steering speed.
    pub speed: f32,
    /// Closer than this the enemy backs off.
    pub flee_distance: f32,
    /// Closer than this (and beyond `flee_distance`) the enemy orbits.
    pub engage_distance: f32,
    /// Fraction of speed pulled inward while orbiting.
    pub circle_inward_weight: f32,
    /// Velocity retained per reference frame while stunned or idle.
    pub friction: f32,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            radius: 15.0,
            max_health: 50.0,
            damage: 10.0,
            speed: 120.0,
            flee_distance: 40.0,
            engage_distance: 90.0,
            circle_inward_weight: 0.3,
            friction: 0.85,
        }
    }
}

/// Wolf tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WolfConfig {
    /// Collision radius.
    pub radius: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Contact damage.
    pub damage: f32,
    /// Prowling speed.
    pub speed: f32,
    /// Beyond this distance the wolf ignores its target.
    pub alert_radius: f32,
    /// Within this distance the wolf lunges.
    pub attack_radius: f32,
    /// Lunge speed.
    pub lunge_speed: f32,
    /// Lunge duration.
    pub lunge_duration: f32,
    /// Recovery after a lunge.
    pub recovery_duration: f32,
    /// Minimum time between lunge starts.
    pub lunge_cooldown: f32,
    /// Weight of the direct heading when blending with the pack.
    pub seek_weight: f32,
    /// Weight of the pull toward the pack centroid.
    pub cohesion_weight: f32,
    /// Health multiplier for pack alphas.
    pub alpha_health_factor: f32,
    /// Radius multiplier for pack alphas.
    pub alpha_size_factor: f32,
    /// Contact damage multiplier for pack alphas.
    pub alpha_damage_factor: f32,
}

impl Default for WolfConfig {
    fn default() -> Self {
        Self {
            radius: 18.0,
            max_health: 75.0,
            damage: 15.0,
            speed: 180.0,
            alert_radius: 600.0,
            attack_radius: 90.0,
            lunge_speed: 480.0,
            lunge_duration: 0.3,
            recovery_duration: 0.5,
            lunge_cooldown: 2.0,
            seek_weight: 0.7,
            cohesion_weight: 0.3,
            alpha_health_factor: 1.5,
            alpha_size_factor: 1.2,
            alpha_damage_factor: 1.2,
        }
    }
}

/// Projectile tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Collision radius.
    pub radius: f32,
    /// Travel speed.
    pub speed: f32,
    /// Default damage for player shots.
    pub damage: f32,
    /// Lifetime.
    pub lifetime: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            speed: 900.0,
            damage: 25.0,
            lifetime: 2.0,
        }
    }
}

/// Power-up tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpConfig {
    /// Collision radius.
    pub radius: f32,
    /// Time before an uncollected power-up disappears.
    pub lifetime: f32,
    /// Health restored by a health pickup.
    pub health_amount: f32,
    /// Energy restored by an energy pickup.
    pub energy_amount: f32,
    /// Speed multiplier granted by a speed pickup.
    pub speed_multiplier: f32,
    /// Damage multiplier granted by a damage pickup.
    pub damage_multiplier: f32,
    /// Duration of speed and damage buffs.
    pub buff_duration: f32,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            radius: 15.0,
            lifetime: 30.0,
            health_amount: 30.0,
            energy_amount: 30.0,
            speed_multiplier: 1.5,
            damage_multiplier: 2.0,
            buff_duration: 5.0,
        }
    }
}

/// Obstacle tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Health of destructible obstacles.
    pub destructible_health: f32,
    /// Health pool of indestructible obstacles.
    pub indestructible_health: f32,
    /// Largest accepted obstacle radius.
    pub max_radius: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            destructible_health: 100.0,
            indestructible_health: 999_999.0,
            max_radius: 500.0,
        }
    }
}

/// Target acquisition tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Maximum distance at which an enemy can be targeted.
    pub max_distance: f32,
    /// Holding the button at least this long counts as a long press.
    pub long_press: f32,
    /// How long a long press disables targeting.
    pub disable_duration: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            max_distance: 400.0,
            long_press: 0.5,
            disable_duration: 3.0,
        }
    }
}

/// Camera tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Viewport width.
    pub viewport_width: f32,
    /// Viewport height.
    pub viewport_height: f32,
    /// Fraction of the remaining distance covered per tick.
    pub smoothing: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            smoothing: 0.1,
        }
    }
}

/// Spatial hash grid tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of one cell.
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 100.0 }
    }
}

/// Hard limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum live entities.
    pub max_entities: usize,
    /// Largest `dt` a single tick will integrate.
    pub max_dt: f32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_entities: 1000,
            max_dt: 0.25,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigParse`] on malformed input and
    /// [`SimError::InvalidConfig`] when a value is out of range.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| SimError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Check that every value is usable by the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("world.width", self.world.width),
            ("world.height", self.world.height),
            ("player.radius", self.player.radius),
            ("player.max_health", self.player.max_health),
            ("player.max_speed", self.player.max_speed),
            ("player.friction_reference", self.player.friction_reference),
            ("attack.range", self.attack.range),
            ("attack.arc", self.attack.arc),
            ("roll.distance", self.roll.distance),
            ("roll.duration", self.roll.duration),
            ("enemy.radius", self.enemy.radius),
            ("enemy.max_health", self.enemy.max_health),
            ("wolf.radius", self.wolf.radius),
            ("wolf.max_health", self.wolf.max_health),
            ("projectile.radius", self.projectile.radius),
            ("projectile.lifetime", self.projectile.lifetime),
            ("power_up.radius", self.power_up.radius),
            ("obstacle.destructible_health", self.obstacle.destructible_health),
            ("obstacle.indestructible_health", self.obstacle.indestructible_health),
            ("obstacle.max_radius", self.obstacle.max_radius),
            ("targeting.max_distance", self.targeting.max_distance),
            ("camera.viewport_width", self.camera.viewport_width),
            ("camera.viewport_height", self.camera.viewport_height),
            ("grid.cell_size", self.grid.cell_size),
            ("limits.max_dt", self.limits.max_dt),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("world.projectile_margin", self.world.projectile_margin),
            ("player.max_energy", self.player.max_energy),
            ("player.energy_regen", self.player.energy_regen),
            ("player.acceleration", self.player.acceleration),
            ("player.hit_invulnerability", self.player.hit_invulnerability),
            ("player.contact_knockback", self.player.contact_knockback),
            ("player.shoot_energy_cost", self.player.shoot_energy_cost),
            ("shield.parry_window", self.shield.parry_window),
            ("shield.parry_stun", self.shield.parry_stun),
            ("shield.parry_energy_restore", self.shield.parry_energy_restore),
            ("shield.parry_knockback", self.shield.parry_knockback),
            ("shield.max_duration", self.shield.max_duration),
            ("shield.cooldown", self.shield.cooldown),
            ("attack.damage", self.attack.damage),
            ("attack.knockback", self.attack.knockback),
            ("attack.hit_stun", self.attack.hit_stun),
            ("attack.active_duration", self.attack.active_duration),
            ("attack.cooldown", self.attack.cooldown),
            ("attack.energy_cost", self.attack.energy_cost),
            ("roll.cooldown", self.roll.cooldown),
            ("roll.energy_cost", self.roll.energy_cost),
            ("enemy.damage", self.enemy.damage),
            ("enemy.speed", self.enemy.speed),
            ("enemy.flee_distance", self.enemy.flee_distance),
            ("wolf.damage", self.wolf.damage),
            ("wolf.speed", self.wolf.speed),
            ("wolf.lunge_speed", self.wolf.lunge_speed),
            ("wolf.lunge_duration", self.wolf.lunge_duration),
            ("wolf.recovery_duration", self.wolf.recovery_duration),
            ("wolf.lunge_cooldown", self.wolf.lunge_cooldown),
            ("projectile.speed", self.projectile.speed),
            ("projectile.damage", self.projectile.damage),
            ("power_up.lifetime", self.power_up.lifetime),
            ("power_up.buff_duration", self.power_up.buff_duration),
            ("targeting.long_press", self.targeting.long_press),
            ("targeting.disable_duration", self.targeting.disable_duration),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        let fractions = [
            ("player.friction", self.player.friction),
            ("shield.block_reduction", self.shield.block_reduction),
            ("shield.blocked_knockback_factor", self.shield.blocked_knockback_factor),
            ("shield.move_factor", self.shield.move_factor),
            ("enemy.circle_inward_weight", self.enemy.circle_inward_weight),
            ("enemy.friction", self.enemy.friction),
            ("wolf.seek_weight", self.wolf.seek_weight),
            ("wolf.cohesion_weight", self.wolf.cohesion_weight),
            ("camera.smoothing", self.camera.smoothing),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.enemy.engage_distance < self.enemy.flee_distance {
            return Err(SimError::InvalidConfig(
                "enemy.engage_distance must not be below enemy.flee_distance".to_string(),
            ));
        }
        if self.limits.max_entities == 0 {
            return Err(SimError::InvalidConfig(
                "limits.max_entities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
