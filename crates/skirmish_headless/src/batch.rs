//! Batch runner for tuning and regression checks.
//!
//! Runs many seeded games of one scenario in parallel with rayon and
//! aggregates their metrics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::game_runner::{run_game, GameConfig};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name or RON path.
    pub scenario: String,
    /// Number of games to run.
    pub game_count: u32,
    /// Maximum parallel games (0 = rayon default).
    pub parallel_games: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// First seed; game `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Tick limit per game (0 = the scenario's).
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "duel".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

impl BatchConfig {
    /// Config for a specific scenario.
    #[must_use]
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the first seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the per-game tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-game metrics, ordered by seed.
    pub games: Vec<GameMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Games that failed.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// A game that failed during a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

fn run_single_game(
    scenario: &Scenario,
    index: u32,
    seed: u64,
    max_ticks: u64,
) -> Result<GameMetrics, BatchError> {
    let mut config = GameConfig::new(scenario.clone(), seed);
    config.max_ticks = max_ticks;
    config.game_id = format!("game_{index:04}");
    run_game(&config)
        .map(|result| result.metrics)
        .map_err(|e| BatchError {
            game_index: index,
            seed,
            message: e.to_string(),
        })
}

/// Run a batch of games.
///
/// # Errors
///
/// Fails only when the scenario cannot be resolved; per-game failures are
/// collected in [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let scenario = Scenario::resolve(&config.scenario)?;
    info!(
        games = config.game_count,
        scenario = %scenario.name,
        "Starting batch run"
    );

    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let completed = AtomicU32::new(0);
    let results: Vec<Result<GameMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let result = run_single_game(&scenario, i, seed, config.max_ticks);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!(done, total = config.game_count, "Batch progress");
            }
            if let Err(e) = &result {
                warn!(game = i, seed, error = %e.message, "Game failed");
            }
            result
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        games = games.len(),
        failed = errors.len(),
        duration_seconds,
        "Batch complete"
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Run the same seed `runs` times and check every run ends identically.
///
/// # Errors
///
/// Fails when a run cannot be started.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<bool, ScenarioError> {
    let mut first: Option<GameMetrics> = None;
    for run in 0..runs.max(1) {
        let mut config = GameConfig::new(scenario.clone(), seed);
        config.game_id = format!("verify_{run}");
        let mut metrics = run_game(&config)?.metrics;
        metrics.game_id.clear();
        match &first {
            None => first = Some(metrics),
            Some(expected) if *expected == metrics => {}
            Some(expected) => {
                warn!(
                    run,
                    expected = expected.final_state_hash,
                    actual = metrics.final_state_hash,
                    "Determinism violation"
                );
                return Ok(false);
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("wolf_pack", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_max_ticks(60);

        assert_eq!(config.scenario, "wolf_pack");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.max_ticks, 60);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(BatchConfig::new("duel", 6).with_max_ticks(120)).unwrap();

        assert_eq!(results.games.len(), 6);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 6);
        let seeds: Vec<_> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unknown_scenario() {
        assert!(matches!(
            run_batch(BatchConfig::new("no_such_scenario", 1)),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_batch_is_reproducible() {
        let a = run_batch(BatchConfig::new("wolf_pack", 4).with_seed(3).with_max_ticks(90)).unwrap();
        let b = run_batch(BatchConfig::new("wolf_pack", 4).with_seed(3).with_max_ticks(90)).unwrap();
        let hashes = |r: &BatchResults| r.games.iter().map(|g| g.final_state_hash).collect::<Vec<_>>();
        assert_eq!(hashes(&a), hashes(&b));
    }

    #[test]
    fn test_verify_determinism() {
        let mut scenario = Scenario::duel();
        scenario.end.max_ticks = 300;
        assert!(verify_determinism(&scenario, 12345, 3).unwrap());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new("duel", 3).with_max_ticks(30)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 3);
        assert_eq!(loaded.games[2].final_state_hash, results.games[2].final_state_hash);
        assert_eq!(loaded.summary.outcomes, results.summary.outcomes);
        assert_eq!(loaded.config.scenario, "duel");
    }
}
