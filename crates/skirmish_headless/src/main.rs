//! Headless skirmish runner.
//!
//! Runs the simulation without a renderer, driven by JSON on stdin/stdout or
//! by scripted scenarios. Built for bots, CI checks and tuning sweeps.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p skirmish_headless
//!
//! # Interactive mode starting from a scenario
//! cargo run -p skirmish_headless -- run --scenario wolf_pack
//!
//! # Play one scripted game and print its metrics
//! cargo run -p skirmish_headless -- play --scenario duel --seed 7
//!
//! # Run a batch of seeded games
//! cargo run -p skirmish_headless -- batch --scenario duel --count 200 --output results/
//!
//! # Verify determinism
//! cargo run -p skirmish_headless -- verify --scenario wolf_pack --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): human-readable tracing output

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    game_runner::{run_game, GameConfig},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for bots, CI and tuning")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON protocol on stdin/stdout
    Run {
        /// Scenario name or RON file to load first
        #[arg(short, long)]
        scenario: Option<String>,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,

        /// Fixed time step in seconds
        #[arg(long)]
        dt: Option<f32>,
    },

    /// Play one scripted game and print its metrics as JSON
    Play {
        /// Scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Seed for spawn jitter
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit (0 = the scenario's)
        #[arg(long, default_value = "0")]
        max_ticks: u64,

        /// Write metrics to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of seeded games
    Batch {
        /// Scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per game (0 = the scenario's)
        #[arg(long, default_value = "0")]
        max_ticks: u64,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Scenario name or RON file
        #[arg(short, long, default_value = "swarm")]
        scenario: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the protocol.
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
            dt,
        }) => cmd_run(scenario, auto_state, dt),
        Some(Commands::Play {
            scenario,
            seed,
            max_ticks,
            output,
        }) => cmd_play(&scenario, seed, max_ticks, output),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(&scenario, count, parallel, output, seed, max_ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, seed, runs),
        Some(Commands::Benchmark { ticks, scenario }) => cmd_benchmark(ticks, &scenario),
        None => cmd_run(None, false, None),
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Serve the protocol until quit or end of input.
fn cmd_run(scenario: Option<String>, auto_state: bool, dt: Option<f32>) {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        scenario_path: scenario,
        ..HeadlessConfig::default()
    };

    let mut runner = match HeadlessRunner::with_config(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start runner: {e}");
            std::process::exit(1);
        }
    };
    if let Some(dt) = dt {
        runner.set_dt(dt);
    }

    let stdin = io::stdin();
    if let Err(e) = runner.run(stdin.lock(), io::stdout().lock()) {
        eprintln!("Runner failed: {e}");
        std::process::exit(1);
    }
}

/// Play one scripted game.
fn cmd_play(scenario: &str, seed: u64, max_ticks: u64, output: Option<PathBuf>) {
    let scenario = load_scenario(scenario);
    let mut config = GameConfig::new(scenario, seed);
    config.max_ticks = max_ticks;

    let result = match run_game(&config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Game failed: {e}");
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&result.metrics) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize metrics: {e}");
            std::process::exit(1);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("Failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
            eprintln!("Metrics written to {}", path.display());
        }
        None => println!("{json}"),
    }
}

/// Run a batch and save the results.
fn cmd_batch(scenario: &str, count: u32, parallel: u32, output: PathBuf, seed: u64, max_ticks: u64) {
    let config = BatchConfig {
        parallel_games: parallel,
        ..BatchConfig::new(scenario, count)
            .with_output(output.clone())
            .with_seed(seed)
            .with_max_ticks(max_ticks)
    };

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Batch failed: {e}");
            std::process::exit(1);
        }
    };

    let path = output.join("batch.json");
    if let Err(e) = results.save(&path) {
        eprintln!("Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("Batch complete: {} games in {:.1}s", summary.total_games, results.duration_seconds);
    for (outcome, n) in &summary.outcomes {
        eprintln!("  {outcome:?}: {n}");
    }
    eprintln!("  Clear rate: {:.1}%", summary.clear_rate * 100.0);
    eprintln!("  Avg kills: {:.2}", summary.avg_kills);
    eprintln!("  Avg duration: {:.0} ticks", summary.avg_duration_ticks);
    if !results.errors.is_empty() {
        eprintln!("  Failed games: {}", results.errors.len());
    }
    eprintln!("Results saved to {}", path.display());
}

fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    tracing::info!(scenario, seed, runs, "Verifying determinism");
    let scenario = load_scenario(scenario);

    match verify_determinism(&scenario, seed, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Verification failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_benchmark(ticks: u64, scenario: &str) {
    tracing::info!(ticks, scenario, "Running tick benchmark");
    let scenario = load_scenario(scenario);
    let mut sim = match scenario.build() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    };
    sim.set_movement_intent(skirmish_core::math::Vec2::new(1.0, 0.5));

    let start = Instant::now();
    let mut collisions = 0u64;
    for _ in 0..ticks {
        sim.tick(scenario.dt);
        collisions += sim.metrics().collisions_resolved as u64;
    }
    let elapsed = start.elapsed();

    let per_tick_us = elapsed.as_secs_f64() * 1e6 / ticks.max(1) as f64;
    eprintln!("Benchmark complete:");
    eprintln!("  Ticks: {ticks}");
    eprintln!("  Time: {:.2}s", elapsed.as_secs_f64());
    eprintln!("  Per tick: {per_tick_us:.1}us");
    eprintln!("  Ticks/sec: {:.0}", 1e6 / per_tick_us.max(f64::EPSILON));
    eprintln!("  Entities left: {}", sim.entity_count());
    eprintln!("  Collisions resolved: {collisions}");
    eprintln!("  Final hash: {:016x}", sim.state_hash());
}
