//! JSON protocol for headless simulation control.
//!
//! The runner speaks JSON lines (one object per line):
//!
//! **Input (stdin):** commands from the driver (a bot, a test harness, a human)
//! **Output (stdout):** responses and state
//!
//! # Protocol Flow
//!
//! 1. Runner starts and outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. The driver sends commands as JSON lines
//! 3. Runner answers every command; `tick` reports the events it produced
//! 4. When the player dies or the arena is cleared the runner emits `game_over`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"spawn","kind":"player","x":1000,"y":1000}
//! <- {"type":"spawned","entity_id":1,"kind":"player"}
//! -> {"cmd":"spawn","kind":"enemy","x":1200,"y":1000}
//! <- {"type":"spawned","entity_id":2,"kind":"enemy"}
//! -> {"cmd":"shield"}
//! <- {"type":"ack","cmd":"shield"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"events":[...],"removed":[]}
//! -> {"cmd":"query"}
//! <- {"type":"state","snapshot":{...},"hash":1234}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use skirmish_core::combat::CombatEvent;
use skirmish_core::components::{EntityId, PowerUpKind};
use skirmish_core::error::SimError;
use skirmish_core::snapshot::Snapshot;

use crate::metrics::{GameMetrics, Outcome};
use crate::scenario::{ScenarioError, SpawnKind};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Errors raised while serving the protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A line was not a valid command.
    #[error("Invalid command: {0}")]
    Json(#[from] serde_json::Error),
    /// The simulation rejected a command.
    #[error(transparent)]
    Simulation(#[from] SimError),
    /// A scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

// ============================================================================
// Input Commands (driver -> runner)
// ============================================================================

/// Commands accepted by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation by `count` ticks (default 1).
    Tick {
        /// Number of ticks.
        #[serde(default = "default_tick_count")]
        count: u32,
        /// Step override; the runner's fixed step otherwise.
        #[serde(default)]
        dt: Option<f32>,
    },

    /// Report the current state without advancing time.
    Query,

    /// Spawn an entity.
    Spawn {
        /// Entity kind.
        kind: SpawnKind,
        /// World x.
        x: f32,
        /// World y.
        y: f32,
        /// Wolves only.
        #[serde(default)]
        alpha: bool,
        /// Obstacles only.
        #[serde(default)]
        radius: Option<f32>,
        /// Obstacles only.
        #[serde(default)]
        destructible: bool,
        /// Power-ups only.
        #[serde(default)]
        power_up: Option<PowerUpKind>,
    },

    /// Set the player's movement intent.
    Move {
        /// Intent x.
        x: f32,
        /// Intent y.
        y: f32,
    },

    /// Aim at a world point.
    Aim {
        /// World x.
        x: f32,
        /// World y.
        y: f32,
    },

    /// Aim at a screen point.
    AimScreen {
        /// Screen x.
        x: f32,
        /// Screen y.
        y: f32,
    },

    /// Start a melee swing.
    Attack,

    /// Raise the shield.
    Shield,

    /// Lower the shield.
    Unshield,

    /// Dodge roll; without a direction the player rolls where it faces.
    Roll {
        /// Direction x.
        #[serde(default)]
        x: Option<f32>,
        /// Direction y.
        #[serde(default)]
        y: Option<f32>,
    },

    /// Fire a projectile toward the aim.
    Shoot,

    /// Cycle target forward.
    TargetNext,

    /// Cycle target backward.
    TargetPrevious,

    /// Target button went down.
    TargetPress,

    /// Target button came up.
    TargetRelease,

    /// Steer a hostile toward an entity or point. With neither given the
    /// hostile goes back to chasing the player.
    SetEnemyTarget {
        /// Hostile to steer.
        entity_id: EntityId,
        /// Entity to steer toward.
        #[serde(default)]
        target_id: Option<EntityId>,
        /// Point x.
        #[serde(default)]
        x: Option<f32>,
        /// Point y.
        #[serde(default)]
        y: Option<f32>,
    },

    /// Link wolves into one pack.
    Pack {
        /// Pack members.
        members: Vec<EntityId>,
    },

    /// Remove an entity immediately.
    Remove {
        /// Entity to remove.
        entity_id: EntityId,
    },

    /// Remove every entity.
    Clear {
        /// Leave the player in place.
        #[serde(default)]
        keep_player: bool,
    },

    /// Report the state hash (for determinism verification).
    Hash,

    /// Replace the simulation with a scenario (built-in name or RON path).
    LoadScenario {
        /// Scenario name or path.
        path: String,
    },

    /// Stop the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> driver)
// ============================================================================

/// Responses emitted by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Command accepted.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Command failed or was rejected.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, when the line parsed.
        cmd: Option<String>,
    },

    /// Full state.
    State {
        /// Snapshot of the simulation.
        snapshot: Box<Snapshot>,
        /// State hash.
        hash: u64,
    },

    /// Entity spawned.
    Spawned {
        /// New entity id.
        entity_id: EntityId,
        /// Kind spawned.
        kind: SpawnKind,
    },

    /// Ticks advanced.
    Ticked {
        /// Tick after advancing.
        tick: u64,
        /// Combat events, in order.
        events: Vec<CombatEvent>,
        /// Entities removed.
        removed: Vec<EntityId>,
    },

    /// The run ended.
    GameOver {
        /// How it ended.
        result: Outcome,
        /// Ticks simulated.
        ticks: u64,
        /// Statistics for the run.
        stats: Box<GameMetrics>,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash.
        hash: u64,
    },

    /// Goodbye before shutdown.
    Bye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Acknowledge when `accepted`, otherwise report a rejection.
    #[must_use]
    pub fn ack_or_reject(accepted: bool, cmd: &str) -> Self {
        if accepted {
            Self::ack(cmd)
        } else {
            Self::error("rejected", Some(cmd))
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgments.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Spawn { .. } => "spawn",
            Self::Move { .. } => "move",
            Self::Aim { .. } => "aim",
            Self::AimScreen { .. } => "aim_screen",
            Self::Attack => "attack",
            Self::Shield => "shield",
            Self::Unshield => "unshield",
            Self::Roll { .. } => "roll",
            Self::Shoot => "shoot",
            Self::TargetNext => "target_next",
            Self::TargetPrevious => "target_previous",
            Self::TargetPress => "target_press",
            Self::TargetRelease => "target_release",
            Self::SetEnemyTarget { .. } => "set_enemy_target",
            Self::Pack { .. } => "pack",
            Self::Remove { .. } => "remove",
            Self::Clear { .. } => "clear",
            Self::Hash => "hash",
            Self::LoadScenario { .. } => "load_scenario",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60, dt: None });
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 1, dt: None }));
    }

    #[test]
    fn test_parse_spawn_command() {
        let json = r#"{"cmd":"spawn","kind":"wolf","x":100.0,"y":200.0,"alpha":true}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(
            cmd,
            Command::Spawn { kind: SpawnKind::Wolf, x, y, alpha: true, .. } if x == 100.0 && y == 200.0
        ));
    }

    #[test]
    fn test_parse_power_up_spawn() {
        let json = r#"{"cmd":"spawn","kind":"power_up","x":1,"y":2,"power_up":"Damage"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(
            cmd,
            Command::Spawn { power_up: Some(PowerUpKind::Damage), .. }
        ));
    }

    #[test]
    fn test_parse_roll_without_direction() {
        let cmd = Command::from_json(r#"{"cmd":"roll"}"#).unwrap();
        assert_eq!(cmd, Command::Roll { x: None, y: None });
        assert_eq!(cmd.name(), "roll");
    }

    #[test]
    fn test_unknown_command_is_error() {
        assert!(Command::from_json(r#"{"cmd":"fly"}"#).is_err());
    }

    #[test]
    fn test_serialize_responses() {
        let json = Response::ready(0).to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"ready""#));
        assert!(json.contains(r#""version":"1.0""#));

        let json = Response::StateHash { tick: 5, hash: 42 }.to_json_line();
        assert!(json.contains(r#""type":"state_hash""#));
        assert!(json.contains(r#""hash":42"#));

        let json = Response::ack_or_reject(false, "roll").to_json_line();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""cmd":"roll""#));
    }
}
