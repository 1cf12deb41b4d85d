//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! The simulation runs on `f32`, so determinism here means "same binary,
//! same inputs, same result". Sources of divergence we guard against:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Systems always iterate in sorted entity id order.
//!
//! - **Ambient time**: Nothing reads the wall clock; time enters through
//!   `tick(dt)` only.
//!
//! - **Randomness**: None in the core. Orbit directions derive from ids.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system behavior (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::Simulation;

/// Fixed frame step used by the harness helpers.
pub const FRAME_DT: f32 = 1.0 / 60.0;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::{verify_determinism, FRAME_DT};
/// use skirmish_test_utils::fixtures::arena_with_ring;
///
/// let result = verify_determinism(
///     3,
///     60,
///     || arena_with_ring(8, 150.0),
///     |sim| {
///         sim.tick(FRAME_DT);
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run the simulation twice at [`FRAME_DT`] and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(FRAME_DT);
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches state that leaks between instances or depends on thread
/// scheduling.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(FRAME_DT);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// `drive` is called before every tick with the tick number, so scripted
/// input can be replayed into both copies.
///
/// # Returns
///
/// `None` if the runs match, `Some(tick)` at the first tick they differ.
pub fn find_first_divergence<F, D>(setup_fn: F, num_ticks: u64, drive: D) -> Option<u64>
where
    F: Fn() -> Simulation,
    D: Fn(&mut Simulation, u64),
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        drive(&mut sim1, tick);
        drive(&mut sim2, tick);
        sim1.tick(FRAME_DT);
        sim2.tick(FRAME_DT);

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::math::Vec2;

    /// A coordinate inside the default 2000x2000 world, away from the walls.
    pub fn arb_coord() -> impl Strategy<Value = f32> {
        60.0f32..1940.0f32
    }

    /// A position inside the default world.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (arb_coord(), arb_coord()).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// A direction that may be zero or unnormalized.
    pub fn arb_direction() -> impl Strategy<Value = Vec2> {
        (-1.0f32..1.0f32, -1.0f32..1.0f32).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// A time step, from tiny frames up to well beyond the clamp.
    pub fn arb_dt() -> impl Strategy<Value = f32> {
        prop_oneof![
            4 => 0.001f32..0.05f32,
            1 => 0.05f32..5.0f32,
        ]
    }

    /// A collision radius.
    pub fn arb_radius() -> impl Strategy<Value = f32> {
        1.0f32..80.0f32
    }

    /// Damage amounts, including zero and over-kill values.
    pub fn arb_damage() -> impl Strategy<Value = f32> {
        0.0f32..500.0f32
    }

    /// One scripted player input.
    #[derive(Debug, Clone, PartialEq)]
    pub enum PlayerInput {
        /// Set the movement intent.
        Move(Vec2),
        /// Aim at a world point.
        Aim(Vec2),
        /// Start a melee swing.
        Attack,
        /// Raise the shield.
        Shield,
        /// Lower the shield.
        Release,
        /// Dodge roll.
        Roll(Vec2),
        /// Fire a projectile.
        Shoot,
        /// Cycle target.
        Cycle,
    }

    /// Any single player input.
    pub fn arb_input() -> impl Strategy<Value = PlayerInput> {
        prop_oneof![
            arb_direction().prop_map(PlayerInput::Move),
            arb_position().prop_map(PlayerInput::Aim),
            Just(PlayerInput::Attack),
            Just(PlayerInput::Shield),
            Just(PlayerInput::Release),
            arb_direction().prop_map(PlayerInput::Roll),
            Just(PlayerInput::Shoot),
            Just(PlayerInput::Cycle),
        ]
    }

    /// A per-tick input script; `None` ticks have no input.
    pub fn arb_input_script(max_len: usize) -> impl Strategy<Value = Vec<Option<PlayerInput>>> {
        proptest::collection::vec(proptest::option::of(arb_input()), 1..max_len)
    }

    /// Spawn positions for a group of enemies.
    pub fn arb_enemy_positions(max: usize) -> impl Strategy<Value = Vec<Vec2>> {
        proptest::collection::vec(arb_position(), 1..max)
    }
}

/// Apply one scripted input to the simulation's player.
pub fn apply_input(sim: &mut Simulation, input: &strategies::PlayerInput) {
    use strategies::PlayerInput;

    match input {
        PlayerInput::Move(dir) => {
            sim.set_movement_intent(*dir);
        }
        PlayerInput::Aim(point) => {
            sim.set_aim_point(*point);
        }
        PlayerInput::Attack => {
            sim.attack();
        }
        PlayerInput::Shield => {
            sim.start_shield();
        }
        PlayerInput::Release => {
            sim.end_shield();
        }
        PlayerInput::Roll(dir) => {
            sim.roll(Some(*dir));
        }
        PlayerInput::Shoot => {
            sim.shoot();
        }
        PlayerInput::Cycle => {
            sim.target_next();
        }
    }
}
