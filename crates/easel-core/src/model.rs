//! Node model for the editing surface.
//!
//! A node is an opaque record addressed by its [`NodeId`]: a kind (what is
//! drawn), a transform attribute bag (position, rotation, scale), an inline
//! style, and the two capability flags the editor consults (`draggable`,
//! `evented`). Geometry is expressed with `kurbo` types in `f64`.

use crate::id::NodeId;
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color, 4 × f32 in [0.0, 1.0]. Serialized as a hex string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let bytes = hex.strip_prefix('#').unwrap_or(hex).as_bytes();
        let channel = |i: usize, wide: bool| -> Option<f32> {
            let v = if wide {
                hex_digit(bytes[i * 2])? << 4 | hex_digit(bytes[i * 2 + 1])?
            } else {
                hex_digit(bytes[i])? * 17
            };
            Some(f32::from(v) / 255.0)
        };
        match bytes.len() {
            3 => Some(Self::rgba(channel(0, false)?, channel(1, false)?, channel(2, false)?, 1.0)),
            4 => Some(Self::rgba(
                channel(0, false)?,
                channel(1, false)?,
                channel(2, false)?,
                channel(3, false)?,
            )),
            6 => Some(Self::rgba(channel(0, true)?, channel(1, true)?, channel(2, true)?, 1.0)),
            8 => Some(Self::rgba(
                channel(0, true)?,
                channel(1, true)?,
                channel(2, true)?,
                channel(3, true)?,
            )),
            _ => None,
        }
    }

    /// Shortest hex form: `#RRGGBB` when opaque, `#RRGGBBAA` otherwise.
    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (byte(self.r), byte(self.g), byte(self.b), byte(self.a));
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

// ─── Style ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    /// Dash pattern; empty means solid.
    #[serde(default)]
    pub dash: SmallVec<[f64; 4]>,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 1.0,
            dash: SmallVec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub line_height: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Inter".into(),
            size: 16.0,
            line_height: 1.2,
        }
    }
}

/// Inline style of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub opacity: Option<f64>,
}

impl Style {
    /// Half the stroke width: how far the painted outline reaches past the shape.
    pub fn stroke_overhang(&self) -> f64 {
        self.stroke.as_ref().map_or(0.0, |s| s.width / 2.0)
    }
}

// ─── Transform attributes ────────────────────────────────────────────────

/// Position, rotation (degrees, clockwise in screen space) and scale of a node
/// relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attrs {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Attrs {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl Attrs {
    /// Parent-relative transform: translate · rotate · scale.
    pub fn local_transform(&self) -> Affine {
        Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Decompose a parent-relative affine back into attributes.
    ///
    /// Skew is not representable and is folded into `scale_y`.
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        let scale_x = a.hypot(b);
        if scale_x <= f64::EPSILON {
            return Self {
                x: e,
                y: f,
                rotation: 0.0,
                scale_x: 0.0,
                scale_y: d,
            };
        }
        Self {
            x: e,
            y: f,
            rotation: b.atan2(a).to_degrees(),
            scale_x,
            scale_y: (a * d - b * c) / scale_x,
        }
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// What a node draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The main layer; parent of every top-level node.
    Root,
    /// Container without geometry of its own; bounds come from its children.
    Group,
    Rect {
        width: f64,
        height: f64,
        corner_radius: f64,
    },
    /// Centered on the node origin.
    Ellipse { rx: f64, ry: f64 },
    Text {
        content: String,
        /// Fixed wrap width; measured from the content when `None`.
        width: Option<f64>,
        font: FontSpec,
    },
    Image { width: f64, height: f64, src: String },
    /// Polyline/polygon through node-local points.
    Line { points: Vec<(f64, f64)>, closed: bool },
}

impl NodeKind {
    pub fn rect(width: f64, height: f64) -> Self {
        NodeKind::Rect {
            width,
            height,
            corner_radius: 0.0,
        }
    }

    pub fn text(content: &str) -> Self {
        NodeKind::Text {
            content: content.to_string(),
            width: None,
            font: FontSpec::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Group => "group",
            NodeKind::Rect { .. } => "rect",
            NodeKind::Ellipse { .. } => "ellipse",
            NodeKind::Text { .. } => "text",
            NodeKind::Image { .. } => "image",
            NodeKind::Line { .. } => "line",
        }
    }
}

/// A single node in the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub attrs: Attrs,
    pub style: Style,
    /// Whether pointer drags may move this node. The selector turns it on for
    /// selected nodes and off again on deselect.
    pub draggable: bool,
    /// Whether the node takes part in hit testing.
    pub evented: bool,
}

impl SceneNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            attrs: Attrs::default(),
            style: Style::default(),
            draggable: false,
            evented: true,
        }
    }

    /// New node with a generated id prefixed by the kind name.
    pub fn generated(kind: NodeKind) -> Self {
        Self::new(NodeId::generate(kind.name()), kind)
    }

    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.attrs.x = x;
        self.attrs.y = y;
        self
    }

    #[must_use]
    pub fn rotated(mut self, degrees: f64) -> Self {
        self.attrs.rotation = degrees;
        self
    }

    #[must_use]
    pub fn scaled(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.attrs.scale_x = scale_x;
        self.attrs.scale_y = scale_y;
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }

    /// The node's own box in local coordinates, ignoring its transform.
    ///
    /// `None` for the root and for groups, whose extent is the union of their
    /// children (see `SceneGraph::local_rect`).
    pub fn self_rect(&self, skip_stroke: bool) -> Option<Rect> {
        let rect = match &self.kind {
            NodeKind::Root | NodeKind::Group => return None,
            NodeKind::Rect { width, height, .. } | NodeKind::Image { width, height, .. } => {
                Rect::new(0.0, 0.0, *width, *height)
            }
            NodeKind::Ellipse { rx, ry } => Rect::new(-rx, -ry, *rx, *ry),
            NodeKind::Text { content, width, font } => {
                let lines = content.lines().count().max(1);
                let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                let w = width.unwrap_or(longest as f64 * font.size * 0.6);
                Rect::new(0.0, 0.0, w, lines as f64 * font.size * font.line_height)
            }
            NodeKind::Line { points, .. } => {
                let mut iter = points.iter().map(|&(x, y)| Point::new(x, y));
                let first = iter.next()?;
                iter.fold(Rect::from_points(first, first), |r, p| r.union_pt(p))
            }
        };
        if skip_stroke {
            Some(rect)
        } else {
            let pad = self.style.stroke_overhang();
            Some(rect.inflate(pad, pad))
        }
    }
}

/// Axis-aligned overlap test; touching edges do not count.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#6C5CE7").unwrap();
        assert_eq!(c.to_hex(), "#6C5CE7");

        let half = Color::from_hex("#FF000080").unwrap();
        assert!((half.a - 128.0 / 255.0).abs() < 0.01);
        assert_eq!(half.to_hex().len(), 9);

        assert_eq!(Color::from_hex("#fff").unwrap().to_hex(), "#FFFFFF");
        assert!(Color::from_hex("#12345").is_none());
    }

    #[test]
    fn attrs_decompose_inverts_compose() {
        let attrs = Attrs {
            x: 12.0,
            y: -4.0,
            rotation: 30.0,
            scale_x: 2.0,
            scale_y: 0.5,
        };
        let back = Attrs::from_affine(attrs.local_transform());
        assert!(approx(back.x, 12.0));
        assert!(approx(back.y, -4.0));
        assert!(approx(back.rotation, 30.0));
        assert!(approx(back.scale_x, 2.0));
        assert!(approx(back.scale_y, 0.5));
    }

    #[test]
    fn self_rect_per_kind() {
        let rect = SceneNode::new(NodeId::intern("r"), NodeKind::rect(10.0, 20.0));
        assert_eq!(rect.self_rect(true), Some(Rect::new(0.0, 0.0, 10.0, 20.0)));

        let ellipse = SceneNode::new(NodeId::intern("e"), NodeKind::Ellipse { rx: 5.0, ry: 3.0 });
        assert_eq!(ellipse.self_rect(true), Some(Rect::new(-5.0, -3.0, 5.0, 3.0)));

        let line = SceneNode::new(
            NodeId::intern("l"),
            NodeKind::Line {
                points: vec![(0.0, 5.0), (8.0, -2.0), (3.0, 9.0)],
                closed: false,
            },
        );
        assert_eq!(line.self_rect(true), Some(Rect::new(0.0, -2.0, 8.0, 9.0)));

        let group = SceneNode::new(NodeId::intern("g"), NodeKind::Group);
        assert_eq!(group.self_rect(true), None);
    }

    #[test]
    fn stroke_inflates_unless_skipped() {
        let node = SceneNode::new(NodeId::intern("stroked"), NodeKind::rect(10.0, 10.0)).with_style(Style {
            stroke: Some(Stroke {
                width: 4.0,
                ..Stroke::default()
            }),
            ..Style::default()
        });
        assert_eq!(node.self_rect(false), Some(Rect::new(-2.0, -2.0, 12.0, 12.0)));
        assert_eq!(node.self_rect(true), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rects_overlap(a, Rect::new(5.0, 5.0, 20.0, 20.0)));
        assert!(!rects_overlap(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
    }
}
