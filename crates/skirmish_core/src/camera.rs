//! Smoothed follow camera and world/screen transforms.

use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;
use crate::math::Vec2;

/// Visible world rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRect {
    /// Top-left corner in world space.
    pub x: f32,
    /// Top-left corner in world space.
    pub y: f32,
    /// Viewport width.
    pub width: f32,
    /// Viewport height.
    pub height: f32,
}

/// Follow camera clamped to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    position: Vec2,
    viewport: Vec2,
    world: Vec2,
    smoothing: f32,
}

impl Camera {
    /// Camera at the world origin.
    #[must_use]
    pub fn new(config: &CameraConfig, world: Vec2) -> Self {
        Self {
            position: Vec2::ZERO,
            viewport: Vec2::new(config.viewport_width, config.viewport_height),
            world,
            smoothing: config.smoothing,
        }
    }

    /// Top-left corner of the view.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Move a fraction of the way toward centering `target`, then clamp.
    pub fn follow(&mut self, target: Vec2) {
        if !target.is_finite() {
            return;
        }
        let desired = target - self.viewport * 0.5;
        self.position += (desired - self.position) * self.smoothing;
        self.clamp();
    }

    /// Center on `target` immediately.
    pub fn snap_to(&mut self, target: Vec2) {
        if target.is_finite() {
            self.position = target - self.viewport * 0.5;
            self.clamp();
        }
    }

    fn clamp(&mut self) {
        let max_x = (self.world.x - self.viewport.x).max(0.0);
        let max_y = (self.world.y - self.viewport.y).max(0.0);
        self.position.x = self.position.x.clamp(0.0, max_x);
        self.position.y = self.position.y.clamp(0.0, max_y);
    }

    /// World point to screen point.
    #[must_use]
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world - self.position
    }

    /// Screen point to world point.
    #[must_use]
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen + self.position
    }

    /// Whether a circle overlaps the view.
    #[must_use]
    pub fn is_on_screen(&self, world: Vec2, radius: f32) -> bool {
        let p = self.world_to_screen(world);
        p.x + radius >= 0.0
            && p.x - radius <= self.viewport.x
            && p.y + radius >= 0.0
            && p.y - radius <= self.viewport.y
    }

    /// The visible rectangle.
    #[must_use]
    pub fn rect(&self) -> CameraRect {
        CameraRect {
            x: self.position.x,
            y: self.position.y,
            width: self.viewport.x,
            height: self.viewport.y,
        }
    }
}
