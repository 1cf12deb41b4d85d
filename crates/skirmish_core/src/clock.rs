//! Injected simulation clock.
//!
//! Time only moves when the simulation is ticked, so every timestamp the
//! core records (shield start, target button press) is reproducible.

use serde::{Deserialize, Serialize};

/// Monotonic simulation time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimClock {
    elapsed: f64,
}

impl SimClock {
    /// A clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { elapsed: 0.0 }
    }

    /// Current time in seconds since the simulation started.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.elapsed
    }

    /// Advance by `dt` seconds. Non-finite or negative steps are ignored.
    pub fn advance(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += f64::from(dt);
        }
    }

    /// Seconds elapsed since `since`, never negative.
    #[must_use]
    pub fn since(&self, since: f64) -> f32 {
        (self.elapsed - since).max(0.0) as f32
    }
}
