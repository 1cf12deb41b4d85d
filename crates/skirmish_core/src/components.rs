//! Per-variant entity state.
//!
//! The base [`Entity`](crate::entity::Entity) record carries position,
//! velocity, radius, health and liveness. Everything specific to one kind of
//! entity lives in the state records defined here, each owned by exactly one
//! entity. Cross-entity references are always [`EntityId`]s resolved through
//! the registry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clock::SimClock;
use crate::config::{EnemyConfig, PlayerConfig, WolfConfig};
use crate::math::Vec2;

/// Unique entity identifier. Assigned monotonically, never reused.
pub type EntityId = u64;

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// The controllable player.
    Player,
    /// Standard melee enemy.
    Enemy,
    /// Pack-hunting enemy.
    Wolf,
    /// Straight-line projectile.
    Projectile,
    /// Collectible buff.
    PowerUp,
    /// Static blocker.
    Obstacle,
}

impl EntityType {
    /// Whether this type is a hostile combatant.
    #[must_use]
    pub const fn is_hostile(self) -> bool {
        matches!(self, Self::Enemy | Self::Wolf)
    }

    /// Whether this type is pushed out of obstacles.
    #[must_use]
    pub const fn is_mover(self) -> bool {
        matches!(self, Self::Player | Self::Enemy | Self::Wolf)
    }
}

/// Health with `current` always in `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    /// Full health with the given maximum. Non-positive maxima become 1.
    #[must_use]
    pub fn new(max: f32) -> Self {
        let max = if max.is_finite() && max > 0.0 { max } else { 1.0 };
        Self { current: max, max }
    }

    /// Current health.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Maximum health.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Current health as a fraction of maximum.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.current / self.max
    }

    /// Whether health has reached zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Subtract damage, clamping at zero. Returns the damage actually dealt.
    /// Negative and non-finite amounts deal nothing.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let dealt = amount.min(self.current);
        self.current -= dealt;
        dealt
    }

    /// Restore health, clamping at maximum. Returns the amount restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let restored = amount.min(self.max - self.current);
        self.current += restored;
        restored
    }
}

/// Count a timer down by `dt`, stopping at zero.
pub(crate) fn tick_down(timer: &mut f32, dt: f32) {
    *timer = (*timer - dt).max(0.0);
}

/// Shield machine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ShieldState {
    /// Shield lowered.
    #[default]
    Idle,
    /// Shield raised at the given clock time.
    Shielding {
        /// Clock time the shield went up.
        started_at: f64,
    },
}

/// Melee attack machine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum AttackState {
    /// Able to swing once the cooldown expires.
    #[default]
    Ready,
    /// Swing in progress.
    Swinging {
        /// Facing angle captured when the swing started.
        angle: f32,
        /// Time since the swing started.
        elapsed: f32,
        /// Entities already struck by this swing.
        hits: BTreeSet<EntityId>,
    },
}

/// Dodge roll machine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum RollState {
    /// Not rolling.
    #[default]
    Idle,
    /// Roll in progress.
    Rolling {
        /// Unit roll direction.
        direction: Vec2,
        /// Time since the roll started.
        elapsed: f32,
        /// Distance covered so far.
        traveled: f32,
    },
}

/// A temporary multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    /// Multiplier while active.
    pub multiplier: f32,
    /// Remaining duration.
    pub remaining: f32,
}

impl Default for Buff {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            remaining: 0.0,
        }
    }
}

impl Buff {
    /// Effective multiplier: 1.0 once expired.
    #[must_use]
    pub fn value(&self) -> f32 {
        if self.remaining > 0.0 {
            self.multiplier
        } else {
            1.0
        }
    }

    /// Start or refresh the buff.
    pub fn grant(&mut self, multiplier: f32, duration: f32) {
        self.multiplier = multiplier;
        self.remaining = duration;
    }
}

/// Player-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Current energy.
    pub energy: f32,
    /// Energy cap.
    pub max_energy: f32,
    /// Facing angle in radians, follows the aim point.
    pub facing: f32,
    /// Raw movement intent from the input layer.
    pub movement_intent: Vec2,
    /// World-space aim point, if any.
    pub aim_point: Option<Vec2>,
    /// Shield machine.
    pub shield: ShieldState,
    /// Time until the shield can be raised again.
    pub shield_cooldown: f32,
    /// Attack machine.
    pub attack: AttackState,
    /// Time until the next swing.
    pub attack_cooldown: f32,
    /// Roll machine.
    pub roll: RollState,
    /// Time until the next roll.
    pub roll_cooldown: f32,
    /// Movement speed buff.
    pub speed_buff: Buff,
    /// Damage buff.
    pub damage_buff: Buff,
    /// Enemies killed.
    pub kills: u32,
    /// Score.
    pub score: u32,
}

impl PlayerState {
    /// Fresh player state.
    #[must_use]
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            energy: config.max_energy,
            max_energy: config.max_energy,
            facing: 0.0,
            movement_intent: Vec2::ZERO,
            aim_point: None,
            shield: ShieldState::Idle,
            shield_cooldown: 0.0,
            attack: AttackState::Ready,
            attack_cooldown: 0.0,
            roll: RollState::Idle,
            roll_cooldown: 0.0,
            speed_buff: Buff::default(),
            damage_buff: Buff::default(),
            kills: 0,
            score: 0,
        }
    }

    /// Whether the shield is raised.
    #[must_use]
    pub fn is_shielding(&self) -> bool {
        matches!(self.shield, ShieldState::Shielding { .. })
    }

    /// Whether a roll is in progress.
    #[must_use]
    pub fn is_rolling(&self) -> bool {
        matches!(self.roll, RollState::Rolling { .. })
    }

    /// Whether a swing is in progress.
    #[must_use]
    pub fn is_attacking(&self) -> bool {
        matches!(self.attack, AttackState::Swinging { .. })
    }

    /// Time the shield has been held, if raised.
    #[must_use]
    pub fn shield_elapsed(&self, clock: &SimClock) -> Option<f32> {
        match self.shield {
            ShieldState::Shielding { started_at } => Some(clock.since(started_at)),
            ShieldState::Idle => None,
        }
    }

    /// Whether the shield is inside its perfect parry window.
    #[must_use]
    pub fn in_parry_window(&self, clock: &SimClock, window: f32) -> bool {
        self.shield_elapsed(clock)
            .is_some_and(|elapsed| elapsed <= window)
    }

    /// Spend energy if enough is available.
    pub fn try_spend_energy(&mut self, cost: f32) -> bool {
        if self.energy < cost {
            return false;
        }
        self.energy -= cost;
        true
    }

    /// Add energy, clamped to the cap.
    pub fn restore_energy(&mut self, amount: f32) {
        self.energy = (self.energy + amount.max(0.0)).min(self.max_energy);
    }
}

/// Enemy behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// No target or target out of reach.
    #[default]
    Idle,
    /// Closing in on the target.
    Seek,
    /// Orbiting the target.
    Circle,
    /// Backing away from the target.
    Flee,
    /// Stunned; no steering and no contact damage.
    Stunned,
}

/// What an enemy steers toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemySteering {
    /// Another entity, resolved each tick.
    Entity(EntityId),
    /// A fixed world point.
    Point(Vec2),
}

/// State shared by every hostile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Contact damage.
    pub damage: f32,
    /// Steering speed.
    pub speed: f32,
    /// Current behavior.
    pub behavior: BehaviorState,
    /// Remaining stun.
    pub stun_remaining: f32,
    /// Steering target. `None` steers toward the player.
    pub target: Option<EnemySteering>,
    /// Orbit direction, `1.0` or `-1.0`.
    pub orbit_sign: f32,
}

impl EnemyState {
    /// Standard enemy state for entity `id`.
    #[must_use]
    pub fn new(id: EntityId, config: &EnemyConfig) -> Self {
        Self::with_stats(id, config.damage, config.speed)
    }

    /// Enemy state with explicit stats.
    #[must_use]
    pub fn with_stats(id: EntityId, damage: f32, speed: f32) -> Self {
        Self {
            damage,
            speed,
            behavior: BehaviorState::Idle,
            stun_remaining: 0.0,
            target: None,
            orbit_sign: if id % 2 == 0 { 1.0 } else { -1.0 },
        }
    }

    /// Whether the enemy is stunned.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.stun_remaining > 0.0
    }

    /// Stun for at least `duration`. Never shortens an existing stun.
    pub fn stun(&mut self, duration: f32) {
        if duration > 0.0 {
            self.stun_remaining = self.stun_remaining.max(duration);
            self.behavior = BehaviorState::Stunned;
        }
    }

    /// Count the stun down. Returns true on the tick the stun ends.
    pub fn update_stun(&mut self, dt: f32) -> bool {
        if self.stun_remaining <= 0.0 {
            return false;
        }
        tick_down(&mut self.stun_remaining, dt);
        if self.stun_remaining <= 0.0 {
            self.behavior = BehaviorState::Idle;
            return true;
        }
        false
    }
}

/// Wolf lunge machine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WolfAction {
    /// Stalking with pack steering.
    #[default]
    Prowl,
    /// Committed lunge.
    Lunging {
        /// Unit lunge direction.
        direction: Vec2,
        /// Time left in the lunge.
        remaining: f32,
    },
    /// Slowing down after a lunge.
    Recovering {
        /// Time left in recovery.
        remaining: f32,
    },
}

/// Wolf-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WolfState {
    /// Shared hostile state.
    pub enemy: EnemyState,
    /// Detection radius.
    pub alert_radius: f32,
    /// Lunge trigger radius.
    pub attack_radius: f32,
    /// Pack leader.
    pub alpha: bool,
    /// Other pack members.
    pub pack: BTreeSet<EntityId>,
    /// Lunge machine.
    pub action: WolfAction,
    /// Time until another lunge may start.
    pub lunge_cooldown: f32,
}

impl WolfState {
    /// Wolf state for entity `id`.
    #[must_use]
    pub fn new(id: EntityId, config: &WolfConfig, alpha: bool) -> Self {
        let damage = if alpha {
            config.damage * config.alpha_damage_factor
        } else {
            config.damage
        };
        Self {
            enemy: EnemyState::with_stats(id, damage, config.speed),
            alert_radius: config.alert_radius,
            attack_radius: config.attack_radius,
            alpha,
            pack: BTreeSet::new(),
            action: WolfAction::Prowl,
            lunge_cooldown: 0.0,
        }
    }

    /// Whether a lunge is in progress.
    #[must_use]
    pub fn is_lunging(&self) -> bool {
        matches!(self.action, WolfAction::Lunging { .. })
    }
}

/// Projectile state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    /// Damage on hit.
    pub damage: f32,
    /// Entity that fired it; never hit by its own projectile.
    pub owner: Option<EntityId>,
    /// Remaining lifetime.
    pub lifetime: f32,
}

/// Power-up effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    /// Restores health.
    Health,
    /// Restores energy.
    Energy,
    /// Temporary movement speed multiplier.
    Speed,
    /// Temporary damage multiplier.
    Damage,
}

/// Power-up state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerUpState {
    /// Effect on pickup.
    pub kind: PowerUpKind,
    /// Time before it disappears.
    pub lifetime: f32,
}

/// Obstacle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleState {
    /// Whether damage affects it.
    pub destructible: bool,
}
