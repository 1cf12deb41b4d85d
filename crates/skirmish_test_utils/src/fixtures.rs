//! Test fixtures and helpers.
//!
//! Pre-built arenas and entity layouts for consistent testing.

use skirmish_core::components::{EntityId, PowerUpKind};
use skirmish_core::config::SimConfig;
use skirmish_core::math::Vec2;
use skirmish_core::simulation::Simulation;

/// Center of the default world.
pub const ARENA_CENTER: Vec2 = Vec2::new(1000.0, 1000.0);

/// A simulation with default tuning and the player at the world center.
///
/// # Panics
///
/// Panics if the player cannot be spawned (never for default tuning).
#[must_use]
pub fn arena_with_player() -> Simulation {
    let mut sim = Simulation::new();
    sim.spawn_player(ARENA_CENTER).expect("spawn player");
    sim
}

/// A simulation with custom tuning and the player at `position`.
///
/// # Panics
///
/// Panics if the config is invalid or the player cannot be spawned.
#[must_use]
pub fn arena_with_config(config: SimConfig, position: Vec2) -> Simulation {
    let mut sim = Simulation::with_config(config).expect("valid config");
    sim.spawn_player(position).expect("spawn player");
    sim
}

/// Evenly spaced points on a circle around `center`.
#[must_use]
pub fn ring_positions(center: Vec2, count: usize, radius: f32) -> Vec<Vec2> {
    (0..count)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / count.max(1) as f32;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Player at the center surrounded by a ring of `count` enemies.
///
/// # Panics
///
/// Panics if the ring exceeds the entity cap.
#[must_use]
pub fn arena_with_ring(count: usize, radius: f32) -> Simulation {
    let mut sim = arena_with_player();
    for pos in ring_positions(ARENA_CENTER, count, radius) {
        sim.spawn_enemy(pos).expect("spawn enemy");
    }
    sim
}

/// Player at the center with a five-wolf pack led by an alpha to the east.
///
/// # Panics
///
/// Panics if the wolves cannot be spawned.
#[must_use]
pub fn wolf_pack_arena() -> Simulation {
    let mut sim = arena_with_player();
    let den = ARENA_CENTER + Vec2::new(450.0, 0.0);
    let mut pack = vec![sim.spawn_wolf(den, true).expect("spawn alpha")];
    for pos in ring_positions(den, 4, 70.0) {
        pack.push(sim.spawn_wolf(pos, false).expect("spawn wolf"));
    }
    sim.join_pack(&pack);
    sim
}

/// A busy arena for benchmarks: enemies on a grid, wolves, obstacles and
/// power-ups scattered deterministically.
///
/// # Panics
///
/// Panics if the layout exceeds the entity cap.
#[must_use]
pub fn crowded_arena(enemies: usize) -> Simulation {
    let mut sim = arena_with_player();
    let side = (enemies as f32).sqrt().ceil().max(1.0) as usize;
    let spacing = 1800.0 / side as f32;
    for i in 0..enemies {
        let pos = Vec2::new(
            100.0 + (i % side) as f32 * spacing,
            100.0 + (i / side) as f32 * spacing,
        );
        if pos.distance(ARENA_CENTER) < 80.0 {
            continue;
        }
        sim.spawn_enemy(pos).expect("spawn enemy");
    }
    for pos in ring_positions(ARENA_CENTER, 8, 600.0) {
        sim.spawn_wolf(pos, false).expect("spawn wolf");
    }
    for (i, pos) in ring_positions(ARENA_CENTER, 6, 300.0).into_iter().enumerate() {
        sim.spawn_obstacle(pos, 30.0, i % 2 == 0).expect("spawn obstacle");
    }
    let kinds = [
        PowerUpKind::Health,
        PowerUpKind::Energy,
        PowerUpKind::Speed,
        PowerUpKind::Damage,
    ];
    for (kind, pos) in kinds.into_iter().zip(ring_positions(ARENA_CENTER, 4, 200.0)) {
        sim.spawn_power_up(pos, kind).expect("spawn power-up");
    }
    sim
}

/// Step the simulation `ticks` times at `dt`.
pub fn run_ticks(sim: &mut Simulation, ticks: u32, dt: f32) {
    for _ in 0..ticks {
        sim.tick(dt);
    }
}

/// Place an enemy and return its id, panicking on failure.
///
/// # Panics
///
/// Panics if the enemy cannot be spawned.
pub fn enemy_at(sim: &mut Simulation, position: Vec2) -> EntityId {
    sim.spawn_enemy(position).expect("spawn enemy")
}
