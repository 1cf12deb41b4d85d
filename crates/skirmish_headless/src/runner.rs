//! Interactive headless runner: JSON commands in, JSON responses out.

use std::io::{BufRead, Write};

use skirmish_core::components::{EnemySteering, PowerUpKind};
use skirmish_core::math::Vec2;
use skirmish_core::simulation::Simulation;
use skirmish_core::targeting::ButtonOutcome;

use crate::metrics::{MetricsCollector, Outcome};
use crate::protocol::{Command, ProtocolError, Response};
use crate::scenario::{Scenario, SpawnKind};

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Output state after every `tick` command (vs only on query).
    pub auto_state_output: bool,
    /// Scenario to load on startup (built-in name or RON path).
    pub scenario_path: Option<String>,
    /// Fixed time step per tick.
    pub dt: f32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_state_output: false,
            scenario_path: None,
            dt: 1.0 / 60.0,
        }
    }
}

/// Headless runner for externally driven play.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
    sim: Simulation,
    collector: MetricsCollector,
    scenario_name: String,
    game_over: bool,
    should_quit: bool,
}

impl HeadlessRunner {
    /// Create a runner with an empty default simulation.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(HeadlessConfig::default(), Simulation::new(), "interactive")
    }

    /// Create a runner, loading the configured scenario if any.
    ///
    /// # Errors
    ///
    /// Fails when the startup scenario cannot be loaded or built.
    pub fn with_config(config: HeadlessConfig) -> Result<Self, ProtocolError> {
        match config.scenario_path.clone() {
            Some(path) => {
                let scenario = Scenario::resolve(&path)?;
                let sim = scenario.build()?;
                let mut config = config;
                config.dt = scenario.dt;
                Ok(Self::from_parts(config, sim, &scenario.name))
            }
            None => Ok(Self::from_parts(config, Simulation::new(), "interactive")),
        }
    }

    fn from_parts(config: HeadlessConfig, sim: Simulation, scenario: &str) -> Self {
        let mut collector = MetricsCollector::new("interactive", scenario, 0);
        collector.set_player(sim.player_id());
        Self {
            config,
            sim,
            collector,
            scenario_name: scenario.to_string(),
            game_over: false,
            should_quit: false,
        }
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Override the fixed step, including one taken from a scenario.
    pub fn set_dt(&mut self, dt: f32) {
        self.config.dt = dt;
    }

    /// Whether a `quit` command was received.
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Parse and handle one input line. Blank lines produce no output.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match Command::from_json(line) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable command");
                vec![Response::error(ProtocolError::from(e).to_string(), None)]
            }
        }
    }

    /// Handle one command.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let name = cmd.name();
        tracing::debug!(cmd = name, "Handling command");
        match cmd {
            Command::Tick { count, dt } => self.advance(count, dt.unwrap_or(self.config.dt)),
            Command::Query => vec![self.state()],
            Command::Spawn {
                kind,
                x,
                y,
                alpha,
                radius,
                destructible,
                power_up,
            } => {
                let pos = Vec2::new(x, y);
                let spawned = match kind {
                    SpawnKind::Player => self.sim.spawn_player(pos),
                    SpawnKind::Enemy => self.sim.spawn_enemy(pos),
                    SpawnKind::Wolf => self.sim.spawn_wolf(pos, alpha),
                    SpawnKind::Obstacle => {
                        self.sim.spawn_obstacle(pos, radius.unwrap_or(30.0), destructible)
                    }
                    SpawnKind::PowerUp => self
                        .sim
                        .spawn_power_up(pos, power_up.unwrap_or(PowerUpKind::Health)),
                };
                match spawned {
                    Ok(entity_id) => {
                        if kind == SpawnKind::Player {
                            self.collector.set_player(Some(entity_id));
                            self.game_over = false;
                        }
                        vec![Response::Spawned { entity_id, kind }]
                    }
                    Err(e) => vec![Response::error(e.to_string(), Some(name))],
                }
            }
            Command::Move { x, y } => self.ack(name, |sim| sim.set_movement_intent(Vec2::new(x, y))),
            Command::Aim { x, y } => self.ack(name, |sim| sim.set_aim_point(Vec2::new(x, y))),
            Command::AimScreen { x, y } => {
                self.ack(name, |sim| sim.set_aim_screen_point(Vec2::new(x, y)))
            }
            Command::Attack => self.ack(name, Simulation::attack),
            Command::Shield => self.ack(name, Simulation::start_shield),
            Command::Unshield => self.ack(name, Simulation::end_shield),
            Command::Roll { x, y } => {
                let direction = x.zip(y).map(|(x, y)| Vec2::new(x, y));
                self.ack(name, |sim| sim.roll(direction))
            }
            Command::Shoot => self.ack(name, |sim| sim.shoot().is_some()),
            Command::TargetNext => self.ack(name, |sim| sim.target_next().is_some()),
            Command::TargetPrevious => self.ack(name, |sim| sim.target_previous().is_some()),
            Command::TargetPress => {
                self.sim.press_target_button();
                vec![Response::ack(name)]
            }
            Command::TargetRelease => {
                let outcome = self.sim.release_target_button();
                tracing::debug!(?outcome, "Target button released");
                self.ack(name, |_| outcome != ButtonOutcome::Ignored)
            }
            Command::SetEnemyTarget {
                entity_id,
                target_id,
                x,
                y,
            } => {
                let steering = match (target_id, x.zip(y)) {
                    (Some(id), _) => Some(EnemySteering::Entity(id)),
                    (None, Some((x, y))) => Some(EnemySteering::Point(Vec2::new(x, y))),
                    (None, None) => None,
                };
                self.ack(name, |sim| sim.set_enemy_target(entity_id, steering))
            }
            Command::Pack { members } => self.ack(name, |sim| sim.join_pack(&members) > 0),
            Command::Remove { entity_id } => self.ack(name, |sim| sim.remove_entity(entity_id)),
            Command::Clear { keep_player } => {
                let removed = self.sim.clear_entities(keep_player);
                tracing::debug!(removed, "Cleared entities");
                vec![Response::ack(name)]
            }
            Command::Hash => vec![Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }],
            Command::LoadScenario { path } => match Scenario::resolve(&path).and_then(|s| {
                let sim = s.build()?;
                Ok((s, sim))
            }) {
                Ok((scenario, sim)) => {
                    let auto = self.config.auto_state_output;
                    *self = Self::from_parts(
                        HeadlessConfig {
                            auto_state_output: auto,
                            scenario_path: Some(path),
                            dt: scenario.dt,
                        },
                        sim,
                        &scenario.name,
                    );
                    vec![Response::ack(name)]
                }
                Err(e) => vec![Response::error(e.to_string(), Some(name))],
            },
            Command::Quit => {
                self.should_quit = true;
                vec![Response::Bye]
            }
        }
    }

    fn ack(&mut self, name: &str, action: impl FnOnce(&mut Simulation) -> bool) -> Vec<Response> {
        vec![Response::ack_or_reject(action(&mut self.sim), name)]
    }

    fn state(&self) -> Response {
        Response::State {
            snapshot: Box::new(self.sim.snapshot()),
            hash: self.sim.state_hash(),
        }
    }

    fn advance(&mut self, count: u32, dt: f32) -> Vec<Response> {
        let mut events = Vec::new();
        let mut removed = Vec::new();
        let mut ended = None;
        for _ in 0..count {
            let had_player = self.sim.player_id().is_some();
            let had_hostiles = self.sim.enemies_remaining() > 0;
            let tick = self.sim.tick(dt);
            self.collector.on_tick(&tick, &self.sim);
            events.extend(tick.combat);
            removed.extend(tick.removed);

            if self.game_over {
                continue;
            }
            let player_alive = self.sim.player_id().is_some();
            if had_player && !player_alive {
                ended = Some(Outcome::PlayerDied);
                break;
            }
            if player_alive && had_hostiles && self.sim.enemies_remaining() == 0 {
                ended = Some(Outcome::Cleared);
                break;
            }
        }

        let mut responses = vec![Response::Ticked {
            tick: self.sim.get_tick(),
            events,
            removed,
        }];
        if self.config.auto_state_output {
            responses.push(self.state());
        }
        if let Some(result) = ended {
            self.game_over = true;
            let stats = self.collector.clone().finalize(&self.sim, result);
            tracing::info!(?result, tick = self.sim.get_tick(), "Game over");
            responses.push(Response::GameOver {
                result,
                ticks: self.sim.get_tick(),
                stats: Box::new(stats),
            });
        }
        responses
    }

    /// Serve commands from `input` until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error when reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), ProtocolError> {
        output.write_all(Response::ready(self.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;
        tracing::info!(scenario = %self.scenario_name, "Headless runner ready");

        for line in input.lines() {
            let line = line?;
            for response in self.handle_line(&line) {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if self.should_quit {
                break;
            }
        }
        Ok(())
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn runner_with_player() -> HeadlessRunner {
        let mut runner = HeadlessRunner::new();
        runner.handle(Command::Spawn {
            kind: SpawnKind::Player,
            x: 1000.0,
            y: 1000.0,
            alpha: false,
            radius: None,
            destructible: false,
            power_up: None,
        });
        runner
    }

    #[test]
    fn test_spawn_and_query() {
        let mut runner = runner_with_player();
        let responses = runner.handle_line(r#"{"cmd":"spawn","kind":"enemy","x":1300,"y":1000}"#);
        assert!(matches!(
            responses.as_slice(),
            [Response::Spawned { kind: SpawnKind::Enemy, .. }]
        ));

        let responses = runner.handle(Command::Query);
        let [Response::State { snapshot, hash }] = responses.as_slice() else {
            panic!("expected state, got {responses:?}");
        };
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(*hash, runner.simulation().state_hash());
    }

    #[test]
    fn test_second_player_is_error() {
        let mut runner = runner_with_player();
        let responses = runner.handle_line(r#"{"cmd":"spawn","kind":"player","x":10,"y":10}"#);
        assert!(matches!(responses.as_slice(), [Response::Error { .. }]));
    }

    #[test]
    fn test_oversized_obstacle_is_error() {
        let mut runner = runner_with_player();
        let responses = runner
            .handle_line(r#"{"cmd":"spawn","kind":"obstacle","x":1000,"y":1000,"radius":10000000}"#);
        assert!(matches!(responses.as_slice(), [Response::Error { .. }]));
        assert_eq!(runner.simulation().entity_count(), 1);
    }

    #[test]
    fn test_bad_line_is_error() {
        let mut runner = HeadlessRunner::new();
        let responses = runner.handle_line("not json");
        assert!(matches!(
            responses.as_slice(),
            [Response::Error { cmd: None, .. }]
        ));
        assert!(runner.handle_line("   ").is_empty());
    }

    #[test]
    fn test_tick_reports_events() {
        let mut runner = runner_with_player();
        runner.handle_line(r#"{"cmd":"spawn","kind":"enemy","x":1010,"y":1000}"#);
        let responses = runner.handle_line(r#"{"cmd":"tick","count":3}"#);
        let Some(Response::Ticked { tick, events, .. }) = responses.first() else {
            panic!("expected ticked, got {responses:?}");
        };
        assert_eq!(*tick, 3);
        assert!(!events.is_empty());
    }

    #[test]
    fn test_actions_rejected_without_player() {
        let mut runner = HeadlessRunner::new();
        for line in [r#"{"cmd":"attack"}"#, r#"{"cmd":"shield"}"#, r#"{"cmd":"shoot"}"#] {
            let responses = runner.handle_line(line);
            assert!(matches!(responses.as_slice(), [Response::Error { .. }]), "{line}");
        }
    }

    #[test]
    fn test_shield_then_parry_over_protocol() {
        let mut runner = runner_with_player();
        let responses = runner.handle_line(r#"{"cmd":"shield"}"#);
        assert_eq!(responses, vec![Response::ack("shield")]);
        runner.handle_line(r#"{"cmd":"spawn","kind":"enemy","x":1010,"y":1000}"#);
        runner.handle_line(r#"{"cmd":"tick","dt":0.05}"#);
        let snapshot = runner.simulation().snapshot();
        assert_eq!(snapshot.player.unwrap().health, 100.0);
    }

    #[test]
    fn test_clearing_arena_ends_game() {
        let mut runner = HeadlessRunner::new();
        let mut config = skirmish_core::config::SimConfig::default();
        config.enemy.max_health = 1.0;
        runner.sim = Simulation::with_config(config).unwrap();
        runner.handle_line(r#"{"cmd":"spawn","kind":"player","x":1000,"y":1000}"#);
        runner.handle_line(r#"{"cmd":"spawn","kind":"enemy","x":1100,"y":1000}"#);
        runner.handle_line(r#"{"cmd":"aim","x":1100,"y":1000}"#);
        assert_eq!(runner.handle_line(r#"{"cmd":"shoot"}"#), vec![Response::ack("shoot")]);

        let responses = runner.handle_line(r#"{"cmd":"tick","count":30}"#);

        let Some(Response::GameOver { result, stats, .. }) = responses.last() else {
            panic!("expected game over, got {responses:?}");
        };
        assert_eq!(*result, Outcome::Cleared);
        assert_eq!(stats.kills, 1);
    }

    #[test]
    fn test_player_death_emits_game_over() {
        let mut runner = HeadlessRunner::new();
        let mut config = skirmish_core::config::SimConfig::default();
        config.player.max_health = 10.0;
        runner.sim = Simulation::with_config(config).unwrap();
        runner.handle_line(r#"{"cmd":"spawn","kind":"player","x":1000,"y":1000}"#);
        runner.handle_line(r#"{"cmd":"spawn","kind":"enemy","x":1010,"y":1000}"#);

        let responses = runner.handle_line(r#"{"cmd":"tick","count":10}"#);

        let Some(Response::GameOver { result, ticks, stats }) = responses.last() else {
            panic!("expected game over, got {responses:?}");
        };
        assert_eq!(*result, Outcome::PlayerDied);
        assert_eq!(*ticks, 1);
        assert_eq!(stats.damage_taken, 10.0);
    }

    #[test]
    fn test_load_builtin_scenario() {
        let mut runner = HeadlessRunner::new();
        let responses = runner.handle_line(r#"{"cmd":"load_scenario","path":"duel"}"#);
        assert_eq!(responses, vec![Response::ack("load_scenario")]);
        assert!(runner.simulation().player_id().is_some());

        let responses = runner.handle_line(r#"{"cmd":"load_scenario","path":"/nope.ron"}"#);
        assert!(matches!(responses.as_slice(), [Response::Error { .. }]));
    }

    #[test]
    fn test_run_session() {
        let mut runner = HeadlessRunner::new();
        let input = concat!(
            r#"{"cmd":"spawn","kind":"player","x":500,"y":500}"#,
            "\n",
            r#"{"cmd":"tick","count":2}"#,
            "\n",
            r#"{"cmd":"hash"}"#,
            "\n",
            r#"{"cmd":"quit"}"#,
            "\n",
            r#"{"cmd":"tick"}"#,
            "\n",
        );
        let mut output = Vec::new();
        runner.run(Cursor::new(input), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[1].contains(r#""type":"spawned""#));
        assert!(lines[2].contains(r#""type":"ticked""#));
        assert!(lines[3].contains(r#""type":"state_hash""#));
        assert!(lines[4].contains(r#""type":"bye""#));
        assert!(runner.should_quit());
    }
}
