//! Input abstraction layer.
//!
//! Normalizes pointer input from the host into a `PointerEvent` that the
//! session hit-tests and republishes on the bus.

use easel_core::{NodeId, Point};
use serde::{Deserialize, Serialize};

/// Which button a press or release belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointerButton {
    /// Left mouse button, pen contact, or a single touch.
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };
}

/// A normalized pointer event in screen (canvas pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub point: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary-button event without modifiers.
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.button == PointerButton::Primary
    }
}

/// What a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Empty canvas background.
    Stage,
    Node(NodeId),
}

impl Target {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Target::Stage => None,
            Target::Node(id) => Some(*id),
        }
    }
}

impl From<Option<NodeId>> for Target {
    fn from(hit: Option<NodeId>) -> Self {
        hit.map_or(Target::Stage, Target::Node)
    }
}
