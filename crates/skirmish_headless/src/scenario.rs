//! Scenario loading and configuration.
//!
//! Scenarios define the starting arena for headless runs: an optional tuning
//! override, initial spawns, timed enemy waves, scripted player input and
//! end conditions. They are the wave-scripting layer of the game expressed
//! as data.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use skirmish_core::components::{EntityId, PowerUpKind};
use skirmish_core::config::SimConfig;
use skirmish_core::error::SimError;
use skirmish_core::math::Vec2;
use skirmish_core::simulation::Simulation;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation rejected the scenario.
    #[error("Scenario rejected by simulation: {0}")]
    Simulation(#[from] SimError),
    /// Structurally valid but unusable.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// What to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    /// The player.
    Player,
    /// Standard enemy.
    Enemy,
    /// Wolf.
    Wolf,
    /// Obstacle.
    Obstacle,
    /// Power-up.
    PowerUp,
}

/// One spawn in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPlacement {
    /// Entity kind.
    pub kind: SpawnKind,
    /// World position (x, y).
    pub position: (f32, f32),
    /// Wolves only: pack leader.
    #[serde(default)]
    pub alpha: bool,
    /// Wolves only: wolves sharing a pack number form one pack.
    #[serde(default)]
    pub pack: Option<u32>,
    /// Obstacles only: collision radius.
    #[serde(default)]
    pub radius: Option<f32>,
    /// Obstacles only: whether damage affects it.
    #[serde(default)]
    pub destructible: bool,
    /// Power-ups only: effect (defaults to health).
    #[serde(default)]
    pub power_up: Option<PowerUpKind>,
}

impl SpawnPlacement {
    /// A placement with no extras.
    #[must_use]
    pub fn new(kind: SpawnKind, x: f32, y: f32) -> Self {
        Self {
            kind,
            position: (x, y),
            alpha: false,
            pack: None,
            radius: None,
            destructible: false,
            power_up: None,
        }
    }

    /// A wolf in pack `pack`.
    #[must_use]
    pub fn wolf(x: f32, y: f32, pack: u32, alpha: bool) -> Self {
        Self {
            alpha,
            pack: Some(pack),
            ..Self::new(SpawnKind::Wolf, x, y)
        }
    }

    /// An obstacle.
    #[must_use]
    pub fn obstacle(x: f32, y: f32, radius: f32, destructible: bool) -> Self {
        Self {
            radius: Some(radius),
            destructible,
            ..Self::new(SpawnKind::Obstacle, x, y)
        }
    }

    /// A power-up.
    #[must_use]
    pub fn power_up(x: f32, y: f32, kind: PowerUpKind) -> Self {
        Self {
            power_up: Some(kind),
            ..Self::new(SpawnKind::PowerUp, x, y)
        }
    }

    fn position(&self) -> Vec2 {
        Vec2::new(self.position.0, self.position.1)
    }
}

/// Enemies released at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Tick at which the wave spawns.
    pub at_tick: u64,
    /// Spawns in the wave.
    pub spawns: Vec<SpawnPlacement>,
}

/// One scripted player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptedAction {
    /// Set movement intent.
    Move(f32, f32),
    /// Aim at a world point.
    Aim(f32, f32),
    /// Melee swing.
    Attack,
    /// Raise shield.
    Shield,
    /// Lower shield.
    Unshield,
    /// Dodge roll, optionally in a direction.
    Roll(Option<(f32, f32)>),
    /// Fire a projectile.
    Shoot,
    /// Cycle target forward.
    TargetNext,
    /// Cycle target backward.
    TargetPrevious,
}

impl ScriptedAction {
    /// Apply to the simulation. Returns whether the action was accepted.
    pub fn apply(&self, sim: &mut Simulation) -> bool {
        match *self {
            Self::Move(x, y) => sim.set_movement_intent(Vec2::new(x, y)),
            Self::Aim(x, y) => sim.set_aim_point(Vec2::new(x, y)),
            Self::Attack => sim.attack(),
            Self::Shield => sim.start_shield(),
            Self::Unshield => sim.end_shield(),
            Self::Roll(direction) => sim.roll(direction.map(|(x, y)| Vec2::new(x, y))),
            Self::Shoot => sim.shoot().is_some(),
            Self::TargetNext => sim.target_next().is_some(),
            Self::TargetPrevious => sim.target_previous().is_some(),
        }
    }
}

/// A scripted action at a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedInput {
    /// Tick before which the action is applied.
    pub tick: u64,
    /// The action.
    pub action: ScriptedAction,
}

/// When a scripted run stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndConditions {
    /// Hard tick limit.
    pub max_ticks: u64,
    /// Stop once every hostile is dead and no waves remain.
    pub end_when_cleared: bool,
    /// Stop when the player dies.
    pub end_on_player_death: bool,
}

impl Default for EndConditions {
    fn default() -> Self {
        Self {
            max_ticks: 36000, // 10 minutes at 60 tps
            end_when_cleared: true,
            end_on_player_death: true,
        }
    }
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Tuning override; defaults apply when absent.
    #[serde(default)]
    pub config: Option<SimConfig>,
    /// Fixed time step per tick.
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Spawned before the first tick.
    #[serde(default)]
    pub spawns: Vec<SpawnPlacement>,
    /// Timed waves.
    #[serde(default)]
    pub waves: Vec<Wave>,
    /// Scripted player input.
    #[serde(default)]
    pub inputs: Vec<ScriptedInput>,
    /// End conditions.
    #[serde(default)]
    pub end: EndConditions,
    /// Maximum seed-driven offset applied to hostile spawn positions.
    #[serde(default)]
    pub jitter: f32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// A built-in scenario by name, or a RON file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Built-in scenarios: `duel`, `wolf_pack`, `swarm`.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "duel" => Some(Self::duel()),
            "wolf_pack" => Some(Self::wolf_pack()),
            "swarm" => Some(Self::swarm(120)),
            _ => None,
        }
    }

    /// Check structural constraints the simulation cannot.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ScenarioError::Invalid(format!("dt must be positive, got {}", self.dt)));
        }
        let players = self
            .spawns
            .iter()
            .chain(self.waves.iter().flat_map(|w| &w.spawns))
            .filter(|s| s.kind == SpawnKind::Player)
            .count();
        if players > 1 {
            return Err(ScenarioError::Invalid(format!("{players} players in scenario")));
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        Ok(())
    }

    /// Player against a ring of enemies with a couple of pickups.
    #[must_use]
    pub fn duel() -> Self {
        let mut spawns = vec![SpawnPlacement::new(SpawnKind::Player, 1000.0, 1000.0)];
        for i in 0..6 {
            let angle = std::f32::consts::TAU * i as f32 / 6.0;
            spawns.push(SpawnPlacement::new(
                SpawnKind::Enemy,
                1000.0 + 300.0 * angle.cos(),
                1000.0 + 300.0 * angle.sin(),
            ));
        }
        spawns.push(SpawnPlacement::power_up(1100.0, 1000.0, PowerUpKind::Damage));
        spawns.push(SpawnPlacement::obstacle(900.0, 900.0, 40.0, false));

        Self {
            name: "Duel".to_string(),
            description: "Player versus a ring of six enemies".to_string(),
            config: None,
            dt: default_dt(),
            spawns,
            waves: vec![],
            inputs: patrol_script(3600),
            end: EndConditions {
                max_ticks: 3600,
                ..EndConditions::default()
            },
            jitter: 40.0,
        }
    }

    /// A wolf pack stalking the player, with a follow-up wave.
    #[must_use]
    pub fn wolf_pack() -> Self {
        let mut spawns = vec![SpawnPlacement::new(SpawnKind::Player, 1000.0, 1000.0)];
        spawns.push(SpawnPlacement::wolf(1450.0, 1000.0, 1, true));
        for (dx, dy) in [(60.0, 60.0), (60.0, -60.0), (120.0, 0.0)] {
            spawns.push(SpawnPlacement::wolf(1450.0 + dx, 1000.0 + dy, 1, false));
        }
        let wave = Wave {
            at_tick: 600,
            spawns: vec![
                SpawnPlacement::wolf(500.0, 500.0, 2, true),
                SpawnPlacement::wolf(440.0, 500.0, 2, false),
                SpawnPlacement::wolf(500.0, 440.0, 2, false),
            ],
        };

        Self {
            name: "Wolf Pack".to_string(),
            description: "Two wolf packs, the second arriving after ten seconds".to_string(),
            config: None,
            dt: default_dt(),
            spawns,
            waves: vec![wave],
            inputs: patrol_script(5400),
            end: EndConditions {
                max_ticks: 5400,
                ..EndConditions::default()
            },
            jitter: 30.0,
        }
    }

    /// A large grid of enemies for throughput testing.
    #[must_use]
    pub fn swarm(count: usize) -> Self {
        let mut spawns = vec![SpawnPlacement::new(SpawnKind::Player, 1000.0, 1000.0)];
        let side = (count as f32).sqrt().ceil().max(1.0) as usize;
        let spacing = 1800.0 / side as f32;
        for i in 0..count {
            let x = 100.0 + (i % side) as f32 * spacing;
            let y = 100.0 + (i / side) as f32 * spacing;
            if (x - 1000.0).hypot(y - 1000.0) < 100.0 {
                continue;
            }
            spawns.push(SpawnPlacement::new(SpawnKind::Enemy, x, y));
        }

        Self {
            name: "Swarm".to_string(),
            description: format!("{count} enemies converging on the player"),
            config: None,
            dt: default_dt(),
            spawns,
            waves: vec![],
            inputs: patrol_script(3600),
            end: EndConditions {
                max_ticks: 3600,
                ..EndConditions::default()
            },
            jitter: 0.0,
        }
    }

    /// Copy with hostile spawn positions offset by a seed-derived amount.
    ///
    /// The same seed always yields the same layout.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut scenario = self.clone();
        if self.jitter <= 0.0 {
            return scenario;
        }
        let jitter = self.jitter;
        let placements = scenario
            .spawns
            .iter_mut()
            .chain(scenario.waves.iter_mut().flat_map(|w| w.spawns.iter_mut()));
        for (index, placement) in placements.enumerate() {
            if !matches!(placement.kind, SpawnKind::Enemy | SpawnKind::Wolf) {
                continue;
            }
            let (dx, dy) = jitter_offset(seed, index as u64);
            placement.position.0 += dx * jitter;
            placement.position.1 += dy * jitter;
        }
        scenario
    }

    /// Create the simulation and the initial spawns.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let config = self.config.clone().unwrap_or_default();
        let mut sim = Simulation::with_config(config)?;
        spawn_all(&mut sim, &self.spawns)?;
        tracing::info!(
            scenario = %self.name,
            entities = sim.entity_count(),
            "Scenario loaded"
        );
        Ok(sim)
    }
}

/// Spawn every placement and link wolf packs. Returns the new ids in order.
pub fn spawn_all(
    sim: &mut Simulation,
    placements: &[SpawnPlacement],
) -> Result<Vec<EntityId>, ScenarioError> {
    let mut ids = Vec::with_capacity(placements.len());
    let mut packs: BTreeMap<u32, Vec<EntityId>> = BTreeMap::new();
    for placement in placements {
        let pos = placement.position();
        let id = match placement.kind {
            SpawnKind::Player => sim.spawn_player(pos)?,
            SpawnKind::Enemy => sim.spawn_enemy(pos)?,
            SpawnKind::Wolf => sim.spawn_wolf(pos, placement.alpha)?,
            SpawnKind::Obstacle => {
                sim.spawn_obstacle(pos, placement.radius.unwrap_or(30.0), placement.destructible)?
            }
            SpawnKind::PowerUp => {
                sim.spawn_power_up(pos, placement.power_up.unwrap_or(PowerUpKind::Health))?
            }
        };
        if let Some(pack) = placement.pack {
            packs.entry(pack).or_default().push(id);
        }
        ids.push(id);
    }
    for members in packs.values() {
        sim.join_pack(members);
    }
    Ok(ids)
}

/// Deterministic offset in [-1, 1]^2 for a seed and spawn index.
fn jitter_offset(seed: u64, index: u64) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    (seed, index).hash(&mut hasher);
    let bits = hasher.finish();
    let unit = |v: u64| (v & 0xFFFF) as f32 / f32::from(u16::MAX) * 2.0 - 1.0;
    (unit(bits), unit(bits >> 16))
}

/// Circle the arena center, swinging every second and shooting between.
fn patrol_script(ticks: u64) -> Vec<ScriptedInput> {
    let mut inputs = Vec::new();
    for tick in (0..ticks).step_by(30) {
        let angle = tick as f32 * 0.01;
        inputs.push(ScriptedInput {
            tick,
            action: ScriptedAction::Move(angle.cos(), angle.sin()),
        });
        inputs.push(ScriptedInput {
            tick,
            action: if tick % 60 == 0 {
                ScriptedAction::Attack
            } else {
                ScriptedAction::Shoot
            },
        });
        if tick % 300 == 150 {
            inputs.push(ScriptedInput {
                tick,
                action: ScriptedAction::TargetNext,
            });
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::components::EntityType;
    use std::io::Write;

    #[test]
    fn test_builtin_scenarios_build() {
        for name in ["duel", "wolf_pack", "swarm"] {
            let scenario = Scenario::builtin(name).unwrap();
            scenario.validate().unwrap();
            let sim = scenario.build().unwrap();
            assert!(sim.player_id().is_some(), "{name} has a player");
            assert!(sim.enemies_remaining() > 0);
        }
    }

    #[test]
    fn test_parse_minimal_ron() {
        let ron = r#"(
            name: "Tiny",
            spawns: [
                (kind: player, position: (500.0, 500.0)),
                (kind: enemy, position: (700.0, 500.0)),
                (kind: power_up, position: (520.0, 500.0), power_up: Some(Speed)),
            ],
        )"#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.dt, 1.0 / 60.0);
        assert_eq!(scenario.end, EndConditions::default());
        let sim = scenario.build().unwrap();
        assert_eq!(sim.count_of(EntityType::PowerUp), 1);
    }

    #[test]
    fn test_config_override_applies() {
        let ron = r#"(
            name: "Small world",
            config: Some((world: (width: 800.0, height: 600.0))),
            spawns: [(kind: player, position: (100.0, 100.0))],
        )"#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.config().world.width, 800.0);
    }

    #[test]
    fn test_two_players_rejected() {
        let mut scenario = Scenario::duel();
        scenario
            .spawns
            .push(SpawnPlacement::new(SpawnKind::Player, 10.0, 10.0));
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_wolf_packs_are_linked() {
        let sim = Scenario::wolf_pack().build().unwrap();
        let alpha = sim
            .entities()
            .iter_active()
            .find(|e| e.wolf().is_some_and(|w| w.alpha))
            .unwrap();
        assert_eq!(alpha.wolf().unwrap().pack.len(), 3);
    }

    #[test]
    fn test_seed_jitter_is_deterministic() {
        let base = Scenario::duel();
        let a = base.with_seed(7);
        let b = base.with_seed(7);
        let c = base.with_seed(8);
        assert_eq!(a, b);
        assert_ne!(a.spawns, c.spawns);
        // The player never moves.
        assert_eq!(a.spawns[0], base.spawns[0]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(name: "File", spawns: [(kind: player, position: (300.0, 300.0))])"#
        )
        .unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.name, "File");
    }

    #[test]
    fn test_bundled_scenario_files_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                let scenario = Scenario::load(&path).unwrap();
                let sim = scenario.build().unwrap();
                assert!(sim.player_id().is_some(), "{}", path.display());
                loaded += 1;
            }
        }
        assert!(loaded >= 2);
    }

    #[test]
    fn test_glass_cannon_overrides_tuning() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/glass_cannon.ron");
        let scenario = Scenario::load(path).unwrap();
        let config = scenario.config.unwrap();
        assert_eq!(config.player.max_health, 40.0);
        assert_eq!(config.attack.damage, 50.0);
        assert_eq!(config.attack.range, SimConfig::default().attack.range);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        assert!(matches!(
            Scenario::from_ron_str("(name: 5"),
            Err(ScenarioError::ParseError(_))
        ));
    }
}
