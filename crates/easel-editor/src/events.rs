//! Built-in event catalog.
//!
//! | Name | Payload | Published by |
//! |------|---------|--------------|
//! | `shape:added` / `shape:removed` | node snapshots | [`App`](crate::App) add/remove |
//! | `shape:transform:start` / `shape:transform:end` | node snapshots | session, bridging `node:update:*` |
//! | `selected:changed` | selected ids | selector |
//! | `node:transform:start` / `node:transform:end` | ids | selector gestures |
//! | `node:update:before` / `node:updated` | ids | selector gestures, `App::update`, z-order ops |
//! | `node:removed` / `node:changed` | ids | every removal / attribute write, replays included |
//! | `stage:changed` | stage | `App::set_stage` |
//! | `mouse:*` | pointer event + target | `App::pointer_*` |
//! | `frame:tick` | — | `App::tick` |
//!
//! Plugins define their own events next to the plugin (`history:destroy`,
//! `selector:installed`, `selector:destroy`).

use crate::bus::{Event, EventBus};
use crate::error::EditorError;
use crate::input::{PointerEvent, Target};
use easel_core::{NodeId, NodeSnapshot, Stage};

macro_rules! event {
    ($ty:ident => $name:literal) => {
        impl Event for $ty {
            const NAME: &'static str = $name;
        }
    };
}

/// Nodes were inserted by a user-level operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeAdded {
    pub nodes: Vec<NodeSnapshot>,
}

/// Nodes were deleted by a user-level operation. Snapshots are taken before
/// removal, so they carry the original parent and z-index.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRemoved {
    pub nodes: Vec<NodeSnapshot>,
}

/// State of the affected nodes right before a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeTransformStart {
    pub nodes: Vec<NodeSnapshot>,
}

/// State of the affected nodes right after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeTransformEnd {
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedChanged {
    /// New selection in insertion order.
    pub selected: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTransformStart {
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTransformEnd {
    pub nodes: Vec<NodeId>,
}

/// Published strictly before `nodes` are mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdateBefore {
    pub nodes: Vec<NodeId>,
}

/// Published strictly after `nodes` were mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdated {
    pub nodes: Vec<NodeId>,
}

/// Nodes left the scene, for any reason. Includes every removed descendant.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRemoved {
    pub nodes: Vec<NodeId>,
}

/// Attributes or z-order of `nodes` changed, for any reason.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeChanged {
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageChanged {
    pub stage: Stage,
}

/// The frame requested with `App::request_frame` is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct MouseDown {
    pub event: PointerEvent,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseMove {
    pub event: PointerEvent,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseUp {
    pub event: PointerEvent,
    pub target: Target,
}

/// Press and release on the same target without moving past the click
/// tolerance. Published right after the matching [`MouseUp`].
#[derive(Debug, Clone, PartialEq)]
pub struct MouseClick {
    pub event: PointerEvent,
    pub target: Target,
}

/// The pointer left the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseOut {
    pub event: PointerEvent,
    pub target: Target,
    /// Whether the primary button was still down.
    pub primary_held: bool,
}

event!(ShapeAdded => "shape:added");
event!(ShapeRemoved => "shape:removed");
event!(ShapeTransformStart => "shape:transform:start");
event!(ShapeTransformEnd => "shape:transform:end");
event!(SelectedChanged => "selected:changed");
event!(NodeTransformStart => "node:transform:start");
event!(NodeTransformEnd => "node:transform:end");
event!(NodeUpdateBefore => "node:update:before");
event!(NodeUpdated => "node:updated");
event!(NodeRemoved => "node:removed");
event!(NodeChanged => "node:changed");
event!(StageChanged => "stage:changed");
event!(AnimationFrame => "frame:tick");
event!(MouseDown => "mouse:down");
event!(MouseMove => "mouse:move");
event!(MouseUp => "mouse:up");
event!(MouseClick => "mouse:click");
event!(MouseOut => "mouse:out");

/// Claim every built-in name on `bus`.
pub fn register_builtin(bus: &EventBus) -> Result<(), EditorError> {
    bus.register::<ShapeAdded>()?;
    bus.register::<ShapeRemoved>()?;
    bus.register::<ShapeTransformStart>()?;
    bus.register::<ShapeTransformEnd>()?;
    bus.register::<SelectedChanged>()?;
    bus.register::<NodeTransformStart>()?;
    bus.register::<NodeTransformEnd>()?;
    bus.register::<NodeUpdateBefore>()?;
    bus.register::<NodeUpdated>()?;
    bus.register::<NodeRemoved>()?;
    bus.register::<NodeChanged>()?;
    bus.register::<StageChanged>()?;
    bus.register::<AnimationFrame>()?;
    bus.register::<MouseDown>()?;
    bus.register::<MouseMove>()?;
    bus.register::<MouseUp>()?;
    bus.register::<MouseClick>()?;
    bus.register::<MouseOut>()?;
    Ok(())
}
