//! Transform handles bound to the whole selection.
//!
//! A [`TransformFrame`] is the box the handles sit on, in screen space. A
//! single transformable node gets a frame rotated with it; anything else
//! (several nodes, a group) gets the axis-aligned union of client boxes.
//! Eight resize anchors sit on the padded frame, the rotater above its top
//! edge.

use crate::config::TransformerConfig;
use crate::geometry::{corners, envelope, rotation_of, unrotated_envelope};
use easel_core::{Affine, NodeId, NodeKind, Point, Rect, SceneGraph, Stage, Vec2};
use smallvec::SmallVec;

/// Frames never shrink below this many screen pixels per side.
pub const MIN_FRAME_SIZE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Rotater,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
        Anchor::Rotater,
    ];

    /// Which sides the anchor drags: -1 left/top, 1 right/bottom, 0 neither.
    fn sides(self) -> (i8, i8) {
        match self {
            Anchor::TopLeft => (-1, -1),
            Anchor::TopCenter => (0, -1),
            Anchor::TopRight => (1, -1),
            Anchor::MiddleLeft => (-1, 0),
            Anchor::MiddleRight => (1, 0),
            Anchor::BottomLeft => (-1, 1),
            Anchor::BottomCenter => (0, 1),
            Anchor::BottomRight => (1, 1),
            Anchor::Rotater => (0, 0),
        }
    }

    pub fn is_middle(self) -> bool {
        matches!(
            self,
            Anchor::TopCenter | Anchor::MiddleLeft | Anchor::MiddleRight | Anchor::BottomCenter
        )
    }

    pub fn is_corner(self) -> bool {
        let (x, y) = self.sides();
        x != 0 && y != 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::MiddleLeft => "middle-left",
            Anchor::MiddleRight => "middle-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
            Anchor::Rotater => "rotater",
        }
    }
}

/// Box around the selection in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformFrame {
    pub center: Point,
    /// Size of the selection box itself, without padding.
    pub width: f64,
    pub height: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    /// Gap between the selection box and the anchors, screen pixels.
    pub padding: f64,
}

impl TransformFrame {
    /// Frame-local (centered, unrotated) → screen.
    pub fn to_screen(&self) -> Affine {
        Affine::translate(self.center.to_vec2()) * Affine::rotate(self.rotation.to_radians())
    }

    /// The frame for `selected`, or `None` if nothing selected has extent.
    pub fn for_selection(
        graph: &SceneGraph,
        stage: &Stage,
        selected: &[NodeId],
        config: &TransformerConfig,
    ) -> Option<Self> {
        if let [id] = selected
            && let Some(node) = graph.get_by_id(*id)
            && !node.is_group()
        {
            let local = node.self_rect(config.ignore_stroke)?;
            let absolute = graph.absolute_transform(*id, stage)?;
            let rotation = rotation_of(absolute);
            let env = unrotated_envelope(local, absolute, rotation);
            return Some(Self {
                center: Affine::rotate(rotation.to_radians()) * env.center(),
                width: env.width(),
                height: env.height(),
                rotation,
                padding: config.padding,
            });
        }
        let union = selected
            .iter()
            .filter_map(|id| graph.client_rect(*id, stage, config.ignore_stroke))
            .reduce(|a, b| a.union(b))?;
        Some(Self {
            center: union.center(),
            width: union.width(),
            height: union.height(),
            rotation: 0.0,
            padding: config.padding,
        })
    }

    /// Padded outline corners in screen space.
    pub fn outline(&self) -> [Point; 4] {
        let (hw, hh) = (self.width / 2.0 + self.padding, self.height / 2.0 + self.padding);
        let t = self.to_screen();
        corners(Rect::new(-hw, -hh, hw, hh)).map(|p| t * p)
    }

    /// Axis-aligned box around the padded outline.
    pub fn bounds(&self) -> Rect {
        envelope(&self.outline()).unwrap_or(Rect::ZERO)
    }

    /// Screen position of `anchor`.
    pub fn anchor_position(&self, anchor: Anchor, rotate_offset: f64) -> Point {
        let (hw, hh) = (self.width / 2.0 + self.padding, self.height / 2.0 + self.padding);
        let local = match anchor {
            Anchor::Rotater => Point::new(0.0, -hh - rotate_offset),
            other => {
                let (sx, sy) = other.sides();
                Point::new(f64::from(sx) * hw, f64::from(sy) * hh)
            }
        };
        self.to_screen() * local
    }

    /// Screen-space delta that drags `anchor` to `pointer`.
    ///
    /// The opposite side stays fixed, the box never flips or drops below
    /// [`MIN_FRAME_SIZE`], and with `keep_ratio` corner anchors scale both
    /// axes by the same factor.
    pub fn resize_delta(&self, anchor: Anchor, pointer: Point, keep_ratio: bool) -> Affine {
        let (dx, dy) = anchor.sides();
        if (dx, dy) == (0, 0) {
            return Affine::IDENTITY;
        }
        let to_screen = self.to_screen();
        let local = to_screen.inverse() * pointer;
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);

        let mut sx = match dx {
            -1 => axis_scale(hw - (local.x + self.padding), self.width),
            1 => axis_scale((local.x - self.padding) + hw, self.width),
            _ => 1.0,
        };
        let mut sy = match dy {
            -1 => axis_scale(hh - (local.y + self.padding), self.height),
            1 => axis_scale((local.y - self.padding) + hh, self.height),
            _ => 1.0,
        };
        if keep_ratio && anchor.is_corner() {
            let s = if (sx - 1.0).abs() >= (sy - 1.0).abs() { sx } else { sy };
            sx = s;
            sy = s;
        }

        let fixed = Vec2::new(-f64::from(dx) * hw, -f64::from(dy) * hh);
        let local_delta =
            Affine::translate(fixed) * Affine::scale_non_uniform(sx, sy) * Affine::translate(-fixed);
        to_screen * local_delta * to_screen.inverse()
    }
}

/// Scale factor that turns `size` into `target`, clamped so the result is
/// at least [`MIN_FRAME_SIZE`]. Degenerate axes do not scale.
fn axis_scale(target: f64, size: f64) -> f64 {
    if size <= f64::EPSILON {
        return 1.0;
    }
    target.max(MIN_FRAME_SIZE) / size
}

/// The handle group for the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformHandles {
    pub frame: TransformFrame,
    /// Visible anchors and their screen positions.
    pub anchors: SmallVec<[(Anchor, Point); 9]>,
    anchor_size: f64,
}

impl TransformHandles {
    /// Lay out handles for `selected`. Middle anchors are hidden when the
    /// first selected node is text or a group, or more than one node is
    /// selected.
    pub fn for_selection(
        graph: &SceneGraph,
        stage: &Stage,
        selected: &[NodeId],
        config: &TransformerConfig,
    ) -> Option<Self> {
        let frame = TransformFrame::for_selection(graph, stage, selected, config)?;
        let hide_middle = selected.len() > 1
            || selected
                .first()
                .and_then(|id| graph.get_by_id(*id))
                .is_some_and(|node| matches!(node.kind, NodeKind::Text { .. } | NodeKind::Group));
        let anchors = Anchor::ALL
            .into_iter()
            .filter(|a| !(hide_middle && a.is_middle()))
            .filter(|a| *a != Anchor::Rotater || config.rotate_enabled)
            .map(|a| (a, frame.anchor_position(a, config.rotate_anchor_offset)))
            .collect();
        Some(Self {
            frame,
            anchors,
            anchor_size: config.anchor_size,
        })
    }

    pub fn is_visible(&self, anchor: Anchor) -> bool {
        self.anchors.iter().any(|(a, _)| *a == anchor)
    }

    pub fn position(&self, anchor: Anchor) -> Option<Point> {
        self.anchors.iter().find(|(a, _)| *a == anchor).map(|(_, p)| *p)
    }

    /// Visible anchor whose square contains `point`, rotater first.
    pub fn hit(&self, point: Point) -> Option<Anchor> {
        let half = self.anchor_size / 2.0;
        let unrotate = Affine::rotate(-self.frame.rotation.to_radians());
        self.anchors
            .iter()
            .rev()
            .find(|(_, at)| {
                let d = unrotate * (point - *at).to_point();
                d.x.abs() <= half && d.y.abs() <= half
            })
            .map(|(a, _)| *a)
    }
}
