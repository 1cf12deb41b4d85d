//! Scripted game execution.
//!
//! Runs a [`Scenario`] to completion: initial spawns, timed waves, scripted
//! player input, and the end conditions. Every loop is bounded by the
//! scenario's tick limit.

use std::time::Instant;

use tracing::{debug, info, warn};

use skirmish_core::components::EntityType;
use skirmish_core::simulation::Simulation;

use crate::metrics::{GameMetrics, MetricsCollector, Outcome};
use crate::scenario::{spawn_all, Scenario, ScenarioError, SpawnKind};

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Ticks slower than this are logged (ms).
const SLOW_TICK_THRESHOLD_MS: u128 = 100;

/// High-level runner with a default tick limit.
#[derive(Debug, Clone, Default)]
pub struct GameRunner {
    /// Tick limit used when neither the config nor the scenario sets one.
    pub default_max_ticks: u64,
}

impl GameRunner {
    /// Create a new game runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_max_ticks: 36000, // 10 minutes at 60 tps
        }
    }

    /// Run a game with the given configuration.
    pub fn run(&self, mut config: GameConfig) -> Result<GameResult, ScenarioError> {
        if config.max_ticks == 0 && config.scenario.end.max_ticks == 0 {
            config.max_ticks = self.default_max_ticks;
        }
        run_game(&config)
    }
}

/// Configuration for a single run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Seed for spawn jitter.
    pub seed: u64,
    /// Tick limit; 0 uses the scenario's.
    pub max_ticks: u64,
    /// Scenario to run.
    pub scenario: Scenario,
    /// Run identifier.
    pub game_id: String,
}

impl GameConfig {
    /// Run `scenario` with `seed` and the scenario's own limits.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            seed,
            max_ticks: 0,
            game_id: format!("{}_{seed}", scenario.name.to_lowercase().replace(' ', "_")),
            scenario,
        }
    }
}

/// Result of running a game.
#[derive(Debug, Clone)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Final state hash.
    pub final_state_hash: u64,
}

/// Run one scripted game to completion.
///
/// # Errors
///
/// Fails when the scenario cannot be built or a wave spawn is rejected.
pub fn run_game(config: &GameConfig) -> Result<GameResult, ScenarioError> {
    let started = Instant::now();
    let scenario = config.scenario.with_seed(config.seed);
    let max_ticks = if config.max_ticks > 0 {
        config.max_ticks
    } else {
        scenario.end.max_ticks
    };
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        max_ticks,
        scenario = %scenario.name,
        "Starting game simulation"
    );

    let mut sim = scenario.build()?;
    let mut collector = MetricsCollector::new(&config.game_id, &scenario.name, config.seed);
    collector.set_player(sim.player_id());
    collector.record_spawned_hostiles(sim.enemies_remaining());
    let had_player = sim.player_id().is_some();

    let mut waves: Vec<_> = scenario.waves.iter().collect();
    waves.sort_by_key(|w| w.at_tick);
    let mut next_wave = 0;

    let mut inputs: Vec<_> = scenario.inputs.iter().collect();
    inputs.sort_by_key(|i| i.tick);
    let mut next_input = 0;

    let mut outcome = Outcome::TimeLimit;
    while sim.get_tick() < max_ticks {
        let tick = sim.get_tick();

        while next_wave < waves.len() && waves[next_wave].at_tick <= tick {
            let wave = waves[next_wave];
            spawn_all(&mut sim, &wave.spawns)?;
            let hostiles = wave
                .spawns
                .iter()
                .filter(|s| matches!(s.kind, SpawnKind::Enemy | SpawnKind::Wolf))
                .count();
            collector.record_spawned_hostiles(hostiles);
            if wave.spawns.iter().any(|s| s.kind == SpawnKind::Player) {
                collector.set_player(sim.player_id());
            }
            debug!(tick, hostiles, "Wave spawned");
            next_wave += 1;
        }

        while next_input < inputs.len() && inputs[next_input].tick <= tick {
            inputs[next_input].action.apply(&mut sim);
            next_input += 1;
        }

        let tick_started = Instant::now();
        let events = sim.tick(scenario.dt);
        let elapsed = tick_started.elapsed().as_millis();
        if elapsed > SLOW_TICK_THRESHOLD_MS {
            warn!(tick, elapsed_ms = elapsed, "Slow tick");
        }
        collector.on_tick(&events, &sim);

        if sim.get_tick() % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                tick = sim.get_tick(),
                entities = sim.entity_count(),
                enemies = sim.enemies_remaining(),
                "Progress"
            );
        }

        if let Some(done) = check_end(&sim, &scenario, had_player, next_wave >= waves.len()) {
            outcome = done;
            break;
        }
    }

    let metrics = collector.finalize(&sim, outcome);
    info!(
        game_id = %config.game_id,
        ticks = metrics.duration_ticks,
        outcome = ?metrics.outcome,
        kills = metrics.kills,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Game finished"
    );
    Ok(GameResult {
        final_state_hash: metrics.final_state_hash,
        metrics,
    })
}

fn check_end(
    sim: &Simulation,
    scenario: &Scenario,
    had_player: bool,
    waves_done: bool,
) -> Option<Outcome> {
    if scenario.end.end_on_player_death && had_player && sim.count_of(EntityType::Player) == 0 {
        return Some(Outcome::PlayerDied);
    }
    if scenario.end.end_when_cleared && waves_done && sim.enemies_remaining() == 0 {
        return Some(Outcome::Cleared);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{EndConditions, ScriptedAction, ScriptedInput, SpawnPlacement, Wave};

    fn empty_scenario() -> Scenario {
        Scenario {
            name: "Empty".to_string(),
            description: String::new(),
            config: None,
            dt: 1.0 / 60.0,
            spawns: vec![SpawnPlacement::new(SpawnKind::Player, 1000.0, 1000.0)],
            waves: vec![],
            inputs: vec![],
            end: EndConditions {
                max_ticks: 120,
                end_when_cleared: false,
                end_on_player_death: true,
            },
            jitter: 0.0,
        }
    }

    #[test]
    fn test_time_limit() {
        let result = run_game(&GameConfig::new(empty_scenario(), 1)).unwrap();
        assert_eq!(result.metrics.outcome, Outcome::TimeLimit);
        assert_eq!(result.metrics.duration_ticks, 120);
        assert_eq!(result.metrics.final_health, 100.0);
    }

    #[test]
    fn test_config_tick_limit_overrides_scenario() {
        let mut config = GameConfig::new(empty_scenario(), 1);
        config.max_ticks = 30;
        let result = run_game(&config).unwrap();
        assert_eq!(result.metrics.duration_ticks, 30);
    }

    #[test]
    fn test_cleared_when_no_hostiles_remain() {
        let mut scenario = empty_scenario();
        scenario.end.end_when_cleared = true;
        let result = run_game(&GameConfig::new(scenario, 1)).unwrap();
        assert_eq!(result.metrics.outcome, Outcome::Cleared);
        assert_eq!(result.metrics.duration_ticks, 1);
    }

    #[test]
    fn test_pending_wave_blocks_clear() {
        let mut scenario = empty_scenario();
        scenario.end.end_when_cleared = true;
        scenario.waves.push(Wave {
            at_tick: 60,
            spawns: vec![SpawnPlacement::new(SpawnKind::Enemy, 1800.0, 1800.0)],
        });
        let result = run_game(&GameConfig::new(scenario, 1)).unwrap();
        assert_eq!(result.metrics.outcome, Outcome::TimeLimit);
        assert_eq!(result.metrics.hostiles_spawned, 1);
    }

    #[test]
    fn test_scripted_input_moves_player() {
        let mut scenario = empty_scenario();
        scenario.inputs.push(ScriptedInput {
            tick: 0,
            action: ScriptedAction::Move(1.0, 0.0),
        });
        let mut config = GameConfig::new(scenario.clone(), 1);
        config.max_ticks = 60;
        let moved = run_game(&config).unwrap();

        scenario.inputs.clear();
        let mut config = GameConfig::new(scenario, 1);
        config.max_ticks = 60;
        let idle = run_game(&config).unwrap();

        assert_ne!(moved.final_state_hash, idle.final_state_hash);
    }

    #[test]
    fn test_player_death_ends_run() {
        let mut scenario = empty_scenario();
        let mut config = skirmish_core::config::SimConfig::default();
        config.player.max_health = 10.0;
        scenario.config = Some(config);
        scenario
            .spawns
            .push(SpawnPlacement::new(SpawnKind::Enemy, 1010.0, 1000.0));

        let result = run_game(&GameConfig::new(scenario, 1)).unwrap();

        assert_eq!(result.metrics.outcome, Outcome::PlayerDied);
        assert_eq!(result.metrics.duration_ticks, 1);
        assert_eq!(result.metrics.final_health, 0.0);
        assert_eq!(result.metrics.damage_taken, 10.0);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let a = run_game(&GameConfig::new(Scenario::duel(), 9)).unwrap();
        let b = run_game(&GameConfig::new(Scenario::duel(), 9)).unwrap();
        assert_eq!(a.final_state_hash, b.final_state_hash);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn test_runner_default_limit() {
        let mut scenario = empty_scenario();
        scenario.end.max_ticks = 0;
        let runner = GameRunner {
            default_max_ticks: 10,
        };
        let result = runner.run(GameConfig::new(scenario, 0)).unwrap();
        assert_eq!(result.metrics.duration_ticks, 10);
    }
}
