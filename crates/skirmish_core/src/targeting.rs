//! Target acquisition and cycling.
//!
//! While enabled, targeting keeps a lock on the nearest in-range hostile and
//! lets the player cycle through every in-range hostile in angular order
//! around themselves. A short press of the target button cycles; a long
//! press disables targeting for a while and drops the current lock.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::clock::SimClock;
use crate::components::{tick_down, EntityId};
use crate::config::TargetingConfig;
use crate::entity::Targetable;
use crate::math::Vec2;
use crate::registry::EntityRegistry;

/// Whether targeting is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TargetingMode {
    /// Locks and cycles normally.
    #[default]
    Enabled,
    /// Turned off by a long press.
    Disabled {
        /// Time until targeting turns itself back on.
        remaining: f32,
    },
}

/// Result of releasing the target button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonOutcome {
    /// Release without a matching press.
    Ignored,
    /// Short press: cycled to the next target.
    Cycled(Option<EntityId>),
    /// Long press: targeting disabled.
    Disabled,
}

/// Target lock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targeting {
    mode: TargetingMode,
    current: Option<EntityId>,
    pressed_at: Option<f64>,
    config: TargetingConfig,
}

impl Targeting {
    /// Enabled targeting with no lock.
    #[must_use]
    pub fn new(config: TargetingConfig) -> Self {
        Self {
            mode: TargetingMode::Enabled,
            current: None,
            pressed_at: None,
            config,
        }
    }

    /// Current lock, if any.
    #[must_use]
    pub const fn current(&self) -> Option<EntityId> {
        self.current
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> TargetingMode {
        self.mode
    }

    /// Whether targeting is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.mode == TargetingMode::Enabled
    }

    fn in_range(&self, registry: &EntityRegistry, id: EntityId, origin: Vec2) -> bool {
        registry.get(id).is_some_and(|e| {
            e.is_targetable()
                && e.position.distance_squared(origin) <= self.config.max_distance.powi(2)
        })
    }

    /// In-range hostiles ordered by angle around `origin`, ties by id.
    #[must_use]
    pub fn candidates(&self, registry: &EntityRegistry, origin: Vec2) -> Vec<EntityId> {
        let max_sq = self.config.max_distance.powi(2);
        let mut found: Vec<(f32, EntityId)> = registry
            .iter_active()
            .filter(|e| e.is_targetable() && e.position.distance_squared(origin) <= max_sq)
            .map(|e| ((e.position - origin).angle(), e.id))
            .collect();
        found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Nearest in-range hostile, ties by id.
    #[must_use]
    pub fn nearest(&self, registry: &EntityRegistry, origin: Vec2) -> Option<EntityId> {
        let max_sq = self.config.max_distance.powi(2);
        registry
            .iter_active()
            .filter(|e| e.is_targetable())
            .map(|e| (e.position.distance_squared(origin), e.id))
            .filter(|(d, _)| *d <= max_sq)
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Per-tick update: count down a disable window, drop an invalid lock
    /// and acquire the nearest hostile when nothing is locked.
    pub fn update(&mut self, registry: &EntityRegistry, origin: Option<Vec2>, dt: f32) {
        if let TargetingMode::Disabled { remaining } = &mut self.mode {
            tick_down(remaining, dt);
            if *remaining > 0.0 {
                return;
            }
            self.mode = TargetingMode::Enabled;
            tracing::trace!("Targeting re-enabled");
        }
        let Some(origin) = origin else {
            self.current = None;
            return;
        };
        if let Some(id) = self.current {
            if self.in_range(registry, id, origin) {
                return;
            }
        }
        self.current = self.nearest(registry, origin);
    }

    fn cycle(&mut self, registry: &EntityRegistry, origin: Vec2, forward: bool) -> Option<EntityId> {
        if !self.is_enabled() {
            return None;
        }
        let candidates = self.candidates(registry, origin);
        if candidates.is_empty() {
            self.current = None;
            return None;
        }
        let len = candidates.len();
        let position = self
            .current
            .and_then(|id| candidates.iter().position(|&c| c == id));
        let index = match (position, forward) {
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
            (None, true) => 0,
            (None, false) => len - 1,
        };
        self.current = Some(candidates[index]);
        self.current
    }

    /// Lock the next hostile in angular order, wrapping.
    pub fn cycle_next(&mut self, registry: &EntityRegistry, origin: Vec2) -> Option<EntityId> {
        self.cycle(registry, origin, true)
    }

    /// Lock the previous hostile in angular order, wrapping.
    pub fn cycle_previous(&mut self, registry: &EntityRegistry, origin: Vec2) -> Option<EntityId> {
        self.cycle(registry, origin, false)
    }

    /// Turn targeting off for `duration` and drop the lock.
    pub fn disable(&mut self, duration: f32) {
        self.mode = TargetingMode::Disabled {
            remaining: duration,
        };
        self.current = None;
    }

    /// Record a target button press at the current clock time.
    pub fn press(&mut self, clock: &SimClock) {
        self.pressed_at = Some(clock.now());
    }

    /// Handle a target button release.
    ///
    /// Held shorter than the long-press threshold: cycle forward. Otherwise
    /// disable targeting.
    pub fn release(
        &mut self,
        clock: &SimClock,
        registry: &EntityRegistry,
        origin: Option<Vec2>,
    ) -> ButtonOutcome {
        let Some(pressed_at) = self.pressed_at.take() else {
            return ButtonOutcome::Ignored;
        };
        if clock.since(pressed_at) >= self.config.long_press {
            self.disable(self.config.disable_duration);
            tracing::debug!(duration = self.config.disable_duration, "Targeting disabled");
            return ButtonOutcome::Disabled;
        }
        match origin {
            Some(origin) => ButtonOutcome::Cycled(self.cycle_next(registry, origin)),
            None => ButtonOutcome::Cycled(None),
        }
    }
}
