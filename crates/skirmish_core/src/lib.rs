//! # Skirmish Core
//!
//! Real-time simulation core for a top-down action arena.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No input devices
//! - No host clock (time enters through `tick(dt)`)
//! - No randomness
//!
//! This separation enables:
//! - Headless runs and scripted scenarios
//! - Replays from recorded inputs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`math`] - 2D vector math and angle helpers
//! - [`config`] - Tuning constants, loadable from RON
//! - [`components`] - Per-entity state (player, enemy, wolf, ...)
//! - [`entity`] - The entity record and its behavior traits
//! - [`registry`] - Id allocation and entity storage
//! - [`spatial`] - Uniform-grid broad phase
//! - [`systems`] - Per-entity update systems
//! - [`combat`] - Collision resolution, block, parry and melee
//! - [`targeting`] - Target lock and cycling
//! - [`camera`] - Viewport follow and coordinate conversion
//! - [`snapshot`] - Read-only views for rendering and AI
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod camera;
pub mod clock;
pub mod combat;
pub mod components;
pub mod config;
pub mod entity;
pub mod error;
pub mod math;
pub mod registry;
pub mod simulation;
pub mod snapshot;
pub mod spatial;
pub mod systems;
pub mod targeting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::camera::{Camera, CameraRect};
    pub use crate::combat::CombatEvent;
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::entity::{Damageable, Entity, EntityKind, Mover, Targetable};
    pub use crate::error::{Result, SimError};
    pub use crate::math::Vec2;
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::snapshot::{EntitySnapshot, PerfCounters, PlayerSnapshot, Snapshot};
    pub use crate::targeting::{ButtonOutcome, TargetingMode};
}
