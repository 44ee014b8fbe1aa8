//! Stage (viewport) pan and zoom.
//!
//! Screen space is canvas pixels; world space is what node attributes are
//! expressed in. The stage transform maps world → screen.

use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Pan offset in screen pixels.
    pub x: f64,
    pub y: f64,
    /// Zoom factors (1.0 = no zoom).
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl Stage {
    /// Uniform zoom with a pan offset.
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            scale_x: scale,
            scale_y: scale,
        }
    }

    pub fn transform(&self) -> Affine {
        Affine::translate((self.x, self.y)) * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    #[must_use]
    pub fn to_world(&self, screen: Point) -> Point {
        Point::new((screen.x - self.x) / self.scale_x, (screen.y - self.y) / self.scale_y)
    }

    #[must_use]
    pub fn to_screen(&self, world: Point) -> Point {
        Point::new(world.x * self.scale_x + self.x, world.y * self.scale_y + self.y)
    }

    #[must_use]
    pub fn rect_to_world(&self, screen: Rect) -> Rect {
        Rect::from_points(self.to_world(screen.origin()), self.to_world(Point::new(screen.x1, screen.y1)))
    }
}
