//! Selection geometry: overlay rectangles and gesture deltas.
//!
//! Everything here is a pure function of the scene, the stage and the
//! pointer. Screen space is canvas pixels; overlays are reported in world
//! space (the coordinate system node attributes use) because the overlay
//! layer sits under the same stage transform as the scene.

use easel_core::{Affine, NodeId, Point, Rect, SceneGraph, Stage};
use serde::{Deserialize, Serialize};

/// A possibly rotated rectangle in world space. Rotation (degrees, clockwise
/// in screen space) pivots on the `(x, y)` corner, like the node attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl OverlayRect {
    pub fn transform(&self) -> Affine {
        Affine::translate((self.x, self.y)) * Affine::rotate(self.rotation.to_radians())
    }

    /// Corners in world space, clockwise from the origin corner.
    pub fn corners(&self) -> [Point; 4] {
        let t = self.transform();
        corners(Rect::new(0.0, 0.0, self.width, self.height)).map(|p| t * p)
    }
}

/// Corners of `rect`, clockwise from `(x0, y0)`.
pub fn corners(rect: Rect) -> [Point; 4] {
    [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ]
}

/// Axis-aligned min/max box around `points`.
pub fn envelope(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(rest.iter().fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)))
}

/// Rotation component of an affine, in degrees.
pub fn rotation_of(affine: Affine) -> f64 {
    let [a, b, ..] = affine.as_coeffs();
    b.atan2(a).to_degrees()
}

/// Box of a rotated node in its own unrotated frame.
///
/// Maps the corners of `local` (the node box ignoring its transform) through
/// `absolute`, then counter-rotates them by `rotation` so the min/max
/// envelope is taken in the frame where the node is axis-aligned. The result
/// is in screen units, expressed in that counter-rotated frame.
pub fn unrotated_envelope(local: Rect, absolute: Affine, rotation: f64) -> Rect {
    let counter = Affine::rotate(-rotation.to_radians());
    let points = corners(local).map(|p| counter * (absolute * p));
    envelope(&points).unwrap_or(Rect::ZERO)
}

/// Overlay for a single transformable node: keeps the node's rotation.
///
/// `padding` is in screen pixels. The padded envelope corner is rotated back
/// into screen space, then corrected for the stage pan/zoom.
pub fn rotated_overlay(local: Rect, absolute: Affine, rotation: f64, padding: f64, stage: &Stage) -> OverlayRect {
    let env = unrotated_envelope(local, absolute, rotation);
    let corner = Affine::rotate(rotation.to_radians()) * Point::new(env.x0 - padding, env.y0 - padding);
    let origin = stage.to_world(corner);
    OverlayRect {
        x: origin.x,
        y: origin.y,
        width: (env.width() + padding * 2.0) / stage.scale_x,
        height: (env.height() + padding * 2.0) / stage.scale_y,
        rotation,
    }
}

/// Overlay for a group: its axis-aligned client box, padded uniformly.
pub fn group_overlay(client: Rect, padding: f64, stage: &Stage) -> OverlayRect {
    let world = stage.rect_to_world(client.inflate(padding, padding));
    OverlayRect {
        x: world.x0,
        y: world.y0,
        width: world.width(),
        height: world.height(),
        rotation: 0.0,
    }
}

/// Highlight overlay for node `id`, or `None` when it is gone or has no
/// extent (an empty group).
pub fn node_overlay(graph: &SceneGraph, stage: &Stage, id: NodeId, padding: f64, skip_stroke: bool) -> Option<OverlayRect> {
    let node = graph.get_by_id(id)?;
    if node.is_group() {
        let client = graph.client_rect(id, stage, skip_stroke)?;
        return Some(group_overlay(client, padding, stage));
    }
    let local = node.self_rect(skip_stroke)?;
    let absolute = graph.absolute_transform(id, stage)?;
    Some(rotated_overlay(local, absolute, rotation_of(absolute), padding, stage))
}

/// Rubber-band rectangle between the press point and the pointer.
pub fn band_rect(origin: Point, pointer: Point) -> Rect {
    Rect::from_points(origin, pointer)
}

/// Whether the pointer travelled further than `tolerance` from `origin`.
pub fn moved_beyond(origin: Point, pointer: Point, tolerance: f64) -> bool {
    origin.distance(pointer) > tolerance
}

/// Screen-space delta of a move gesture.
pub fn translation_delta(origin: Point, pointer: Point) -> Affine {
    Affine::translate(pointer - origin)
}

/// Screen-space delta of a rotate gesture pivoting on `center`: the angle
/// swept by the pointer since the press.
pub fn rotation_delta(center: Point, origin: Point, pointer: Point) -> Affine {
    let start = origin - center;
    let now = pointer - center;
    if start.hypot() <= f64::EPSILON || now.hypot() <= f64::EPSILON {
        return Affine::IDENTITY;
    }
    let angle = now.atan2() - start.atan2();
    Affine::translate(center.to_vec2()) * Affine::rotate(angle) * Affine::translate(-center.to_vec2())
}
