//! Headless runner for the skirmish simulation.
//!
//! Drives [`skirmish_core`] without a renderer so that bots, CI jobs and
//! tuning sweeps can play the game:
//!
//! - **Interactive control**: JSON commands on stdin, responses on stdout
//! - **Scripted scenarios**: RON files (or built-ins) with spawns, waves and
//!   scripted input, run to completion with metrics
//! - **Batch runs**: many seeds in parallel, summarized for tuning
//! - **Determinism checks**: the same seed must always end in the same state
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: commands from the driver (tick, spawn, attack, shield, ...)
//! - **stdout**: responses and state
//! - **stderr**: logs
//!
//! See the [`protocol`] module for the full command and response set.
//!
//! # Example
//!
//! ```bash
//! echo '{"cmd":"load_scenario","path":"duel"}' | cargo run -p skirmish_headless
//! cargo run -p skirmish_headless -- batch --scenario wolf_pack --count 50
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod game_runner;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use game_runner::{run_game, GameConfig, GameResult, GameRunner};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector, Outcome};
pub use protocol::{Command, ProtocolError, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
