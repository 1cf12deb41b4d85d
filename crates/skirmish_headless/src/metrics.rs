//! Run metrics for scripted games and batch analysis.
//!
//! A [`MetricsCollector`] watches the [`TickEvents`] of one run and folds
//! them into [`GameMetrics`]. [`BatchSummary`] aggregates many runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use skirmish_core::combat::CombatEvent;
use skirmish_core::components::EntityId;
use skirmish_core::simulation::{Simulation, TickEvents};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every hostile died and no waves remained.
    Cleared,
    /// The player died.
    PlayerDied,
    /// The tick limit was reached first.
    #[default]
    TimeLimit,
}

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Run identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Seed used for spawn jitter.
    pub seed: u64,
    /// Ticks simulated.
    pub duration_ticks: u64,
    /// How the run ended.
    pub outcome: Outcome,
    /// Hostiles killed by the player.
    pub kills: u32,
    /// Final player score.
    pub score: u32,
    /// Damage the player dealt.
    pub damage_dealt: f32,
    /// Damage the player took.
    pub damage_taken: f32,
    /// Perfect parries.
    pub parries: u32,
    /// Partial blocks.
    pub blocks: u32,
    /// Damage absorbed by the shield.
    pub damage_blocked: f32,
    /// Power-ups collected.
    pub pickups: u32,
    /// Hostiles spawned over the run.
    pub hostiles_spawned: u32,
    /// Most entities alive at once.
    pub peak_entities: usize,
    /// Collisions resolved over the run.
    pub collisions_resolved: u64,
    /// Player health at the end (0 when dead).
    pub final_health: f32,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new metrics record.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }
}

/// Folds tick events into [`GameMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: GameMetrics,
    player: Option<EntityId>,
}

impl MetricsCollector {
    /// Start collecting for a run.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
            player: None,
        }
    }

    /// Track the player entity. Damage attribution needs it.
    pub fn set_player(&mut self, player: Option<EntityId>) {
        self.player = player;
    }

    /// Count hostiles added outside the tick loop (initial spawns, waves).
    pub fn record_spawned_hostiles(&mut self, count: usize) {
        self.metrics.hostiles_spawned += u32::try_from(count).unwrap_or(u32::MAX);
    }

    /// Fold one tick's events and counters.
    pub fn on_tick(&mut self, events: &TickEvents, sim: &Simulation) {
        let counters = sim.metrics();
        self.metrics.peak_entities = self.metrics.peak_entities.max(counters.entity_count);
        self.metrics.collisions_resolved += counters.collisions_resolved as u64;

        for event in &events.combat {
            match *event {
                CombatEvent::Damage {
                    target,
                    source,
                    amount,
                } => {
                    if self.player.is_some() && Some(target) == self.player {
                        self.metrics.damage_taken += amount;
                    } else if self.player.is_some() && source == self.player {
                        self.metrics.damage_dealt += amount;
                    }
                }
                CombatEvent::Parry { .. } => self.metrics.parries += 1,
                CombatEvent::Block { absorbed, .. } => {
                    self.metrics.blocks += 1;
                    self.metrics.damage_blocked += absorbed;
                }
                CombatEvent::PowerUpCollected { .. } => self.metrics.pickups += 1,
                CombatEvent::Death { .. } => {}
            }
        }

        // The player is swept on death, so keep the last known totals.
        if let Some(state) = sim.player_state() {
            self.metrics.kills = state.kills;
            self.metrics.score = state.score;
        }
    }

    /// Close the record with the final simulation state.
    #[must_use]
    pub fn finalize(mut self, sim: &Simulation, outcome: Outcome) -> GameMetrics {
        self.metrics.duration_ticks = sim.get_tick();
        self.metrics.outcome = outcome;
        self.metrics.final_state_hash = sim.state_hash();
        if let Some(state) = sim.player_state() {
            self.metrics.kills = state.kills;
            self.metrics.score = state.score;
        }
        self.metrics.final_health = sim
            .player_id()
            .and_then(|id| sim.entity(id))
            .map_or(0.0, |p| p.health.current());
        self.metrics
    }
}

/// Aggregate statistics over a batch of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs in the batch.
    pub total_games: u32,
    /// Runs per outcome.
    pub outcomes: BTreeMap<Outcome, u32>,
    /// Fraction of runs where the player survived to clear the arena.
    pub clear_rate: f64,
    /// Mean run length.
    pub avg_duration_ticks: f64,
    /// Shortest run.
    pub min_duration_ticks: u64,
    /// Longest run.
    pub max_duration_ticks: u64,
    /// Mean kills per run.
    pub avg_kills: f64,
    /// Mean damage taken per run.
    pub avg_damage_taken: f64,
    /// Mean parries per run.
    pub avg_parries: f64,
    /// Distinct final hashes (equals `total_games` when every seed differs).
    pub unique_final_hashes: usize,
}

impl BatchSummary {
    /// Calculate the summary from a list of runs.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let n = games.len() as f64;
        let mut summary = Self {
            total_games: u32::try_from(games.len()).unwrap_or(u32::MAX),
            min_duration_ticks: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        let mut kills = 0u64;
        let mut damage_taken = 0f64;
        let mut parries = 0u64;
        let mut hashes = BTreeSet::new();

        for game in games {
            duration_sum += game.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(game.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(game.duration_ticks);
            *summary.outcomes.entry(game.outcome).or_default() += 1;
            kills += u64::from(game.kills);
            damage_taken += f64::from(game.damage_taken);
            parries += u64::from(game.parries);
            hashes.insert(game.final_state_hash);
        }

        let cleared = summary.outcomes.get(&Outcome::Cleared).copied().unwrap_or(0);
        summary.clear_rate = f64::from(cleared) / n;
        summary.avg_duration_ticks = duration_sum as f64 / n;
        summary.avg_kills = kills as f64 / n;
        summary.avg_damage_taken = damage_taken / n;
        summary.avg_parries = parries as f64 / n;
        summary.unique_final_hashes = hashes.len();
        summary
    }
}
