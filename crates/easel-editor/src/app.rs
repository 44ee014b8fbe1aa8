//! The editing session.
//!
//! [`App`] fronts the scene graph for the engines: every mutation goes
//! through it so the matching events fire, and it owns the bus, the stage,
//! pointer bookkeeping and frame scheduling. It is a cheap-to-clone handle;
//! plugins keep a [`WeakApp`] so the bus never keeps the session alive.
//!
//! Borrow discipline: the scene is never borrowed while an event is being
//! published, so handlers are free to read or mutate it.

use crate::bus::{Event, EventBus, Subscription};
use crate::commands::{Replay, restore_order};
use crate::config::{AppConfig, EditorConfig};
use crate::error::EditorError;
use crate::events::{
    self, AnimationFrame, MouseClick, MouseDown, MouseMove, MouseOut, MouseUp, NodeChanged, NodeRemoved,
    NodeUpdateBefore, NodeUpdated, ShapeAdded, ShapeRemoved, ShapeTransformEnd, ShapeTransformStart,
    StageChanged,
};
use crate::history::HistoryPlugin;
use crate::input::{PointerButton, PointerEvent, Target};
use crate::plugin::Plugin;
use crate::selector::SelectorPlugin;
use easel_core::{Affine, NodeId, NodeKind, NodeSnapshot, Point, Rect, SceneError, SceneGraph, SceneNode, Stage};
use log::{debug, trace, warn};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Point,
    button: PointerButton,
    target: Target,
}

#[derive(Debug, Clone, Copy)]
enum ZMove {
    Up,
    Down,
    Top,
    Bottom,
}

struct AppInner {
    scene: RefCell<SceneGraph>,
    stage: Cell<Stage>,
    bus: EventBus,
    config: AppConfig,
    plugins: RefCell<Vec<Rc<dyn Plugin>>>,
    render_requested: Cell<bool>,
    frame_requested: Cell<bool>,
    press: Cell<Option<Press>>,
    pointer: Cell<Option<Point>>,
    bridge: RefCell<Vec<Subscription>>,
}

/// Handle to one editing session.
#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

/// Non-owning handle to a session.
#[derive(Clone)]
pub struct WeakApp(Weak<AppInner>);

impl WeakApp {
    pub fn upgrade(&self) -> Option<App> {
        self.0.upgrade().map(|inner| App { inner })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let app = Self {
            inner: Rc::new(AppInner {
                scene: RefCell::new(SceneGraph::new()),
                stage: Cell::new(Stage::default()),
                bus: EventBus::new(),
                config,
                plugins: RefCell::new(Vec::new()),
                render_requested: Cell::new(false),
                frame_requested: Cell::new(false),
                press: Cell::new(None),
                pointer: Cell::new(None),
                bridge: RefCell::new(Vec::new()),
            }),
        };
        if let Err(err) = events::register_builtin(&app.inner.bus) {
            warn!("built-in events: {err}");
        }
        app.install_bridge();
        app
    }

    /// Turn `node:update:before` / `node:updated` into snapshot-carrying
    /// `shape:transform:start` / `shape:transform:end`.
    fn install_bridge(&self) {
        let weak = self.downgrade();
        let start = self.on(move |e: &NodeUpdateBefore| {
            let app = weak.upgrade().ok_or(EditorError::SessionGone)?;
            let nodes = app.snapshots(&e.nodes);
            app.publish(&ShapeTransformStart { nodes });
            Ok(())
        });
        let weak = self.downgrade();
        let end = self.on(move |e: &NodeUpdated| {
            let app = weak.upgrade().ok_or(EditorError::SessionGone)?;
            let nodes = app.snapshots(&e.nodes);
            app.publish(&ShapeTransformEnd { nodes });
            Ok(())
        });
        self.inner.bridge.borrow_mut().extend([start, end]);
    }

    pub fn downgrade(&self) -> WeakApp {
        WeakApp(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn on<E, F>(&self, handler: F) -> Subscription
    where
        E: Event,
        F: FnMut(&E) -> Result<(), EditorError> + 'static,
    {
        self.inner.bus.subscribe(handler)
    }

    pub fn off(&self, subscription: Subscription) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }

    pub fn publish<E: Event>(&self, event: &E) -> usize {
        self.inner.bus.publish(event)
    }

    // ─── Plugins ─────────────────────────────────────────────────────────

    /// Install `plugin`. A plugin whose name is already installed is skipped.
    pub fn use_plugin<P: Plugin + 'static>(&self, plugin: P) -> Result<(), EditorError> {
        if self.has_plugin(plugin.name()) {
            warn!("plugin `{}` is already installed", plugin.name());
            return Ok(());
        }
        plugin.install(self)?;
        debug!("installed plugin `{}`", plugin.name());
        self.inner.plugins.borrow_mut().push(Rc::new(plugin));
        Ok(())
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }

    fn plugin(&self, name: &str) -> Option<Rc<dyn Plugin>> {
        self.inner.plugins.borrow().iter().find(|p| p.name() == name).cloned()
    }

    pub fn enable_plugin(&self, name: &str) -> bool {
        self.plugin(name).map(|p| p.enable()).is_some()
    }

    pub fn disable_plugin(&self, name: &str) -> bool {
        self.plugin(name).map(|p| p.disable()).is_some()
    }

    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugin(name).is_some_and(|p| p.is_enabled())
    }

    /// Dispose every plugin (last installed first) and detach the session's
    /// own handlers.
    pub fn dispose(&self) {
        let plugins = std::mem::take(&mut *self.inner.plugins.borrow_mut());
        for plugin in plugins.iter().rev() {
            debug!("disposing plugin `{}`", plugin.name());
            plugin.dispose();
        }
        for sub in self.inner.bridge.borrow_mut().drain(..) {
            self.off(sub);
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn scene(&self) -> Ref<'_, SceneGraph> {
        self.inner.scene.borrow()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.scene.borrow().contains(id)
    }

    pub fn node(&self, id: NodeId) -> Option<SceneNode> {
        self.inner.scene.borrow().get_by_id(id).cloned()
    }

    /// Snapshots of the present nodes among `ids`, in the given order.
    pub fn snapshots(&self, ids: &[NodeId]) -> Vec<NodeSnapshot> {
        let scene = self.inner.scene.borrow();
        ids.iter().filter_map(|id| scene.snapshot(*id)).collect()
    }

    pub fn absolute_transform(&self, id: NodeId) -> Option<Affine> {
        self.inner.scene.borrow().absolute_transform(id, &self.stage())
    }

    pub fn client_rect(&self, id: NodeId, skip_stroke: bool) -> Option<Rect> {
        self.inner.scene.borrow().client_rect(id, &self.stage(), skip_stroke)
    }

    /// Topmost evented leaf under a screen point.
    pub fn hit(&self, point: Point) -> Option<NodeId> {
        easel_core::hit_test(&self.inner.scene.borrow(), &self.stage(), point)
    }

    /// Top-level nodes overlapping a screen rectangle.
    pub fn shapes_in_area(&self, area: Rect) -> Vec<NodeId> {
        easel_core::shapes_in_area(&self.inner.scene.borrow(), &self.stage(), area)
    }

    /// Outermost group containing `id`, if any.
    pub fn find_top_group(&self, id: NodeId) -> Option<NodeId> {
        self.inner.scene.borrow().top_group(id)
    }

    fn present(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let scene = self.inner.scene.borrow();
        let mut seen = HashSet::new();
        ids.iter()
            .copied()
            .filter(|id| !id.is_root() && scene.contains(*id) && seen.insert(*id))
            .collect()
    }

    // ─── Stage ───────────────────────────────────────────────────────────

    pub fn stage(&self) -> Stage {
        self.inner.stage.get()
    }

    pub fn set_stage(&self, stage: Stage) {
        if self.inner.stage.replace(stage) == stage {
            return;
        }
        self.request_render();
        self.publish(&StageChanged { stage });
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Add nodes on top of the root. Publishes `shape:added`.
    pub fn add(&self, nodes: Vec<SceneNode>) -> Result<Vec<NodeId>, EditorError> {
        self.add_to(NodeId::root(), nodes)
    }

    /// Add nodes on top of `parent`'s children. Nothing is inserted unless
    /// every id is new.
    pub fn add_to(&self, parent: NodeId, nodes: Vec<SceneNode>) -> Result<Vec<NodeId>, EditorError> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let snapshots = {
            let mut scene = self.inner.scene.borrow_mut();
            let parent_idx = scene.index_of(parent).ok_or(SceneError::UnknownNode(parent))?;
            let mut seen = HashSet::new();
            for node in &nodes {
                if node.id.is_root() {
                    return Err(SceneError::RootImmutable("added").into());
                }
                if scene.contains(node.id) || !seen.insert(node.id) {
                    return Err(SceneError::DuplicateId(node.id).into());
                }
            }
            let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
            for node in nodes {
                scene.add_node(parent_idx, node)?;
            }
            ids.iter().filter_map(|id| scene.snapshot(*id)).collect::<Vec<_>>()
        };
        let ids: Vec<NodeId> = snapshots.iter().map(NodeSnapshot::id).collect();
        debug!("added {ids:?} under {parent}");
        self.request_render();
        self.publish(&ShapeAdded { nodes: snapshots });
        Ok(ids)
    }

    /// Remove nodes with their subtrees. Publishes `node:removed` (every
    /// removed id) then `shape:removed` (one snapshot per removed root).
    /// Unknown ids, the root, and nodes inside another removed node are
    /// skipped.
    pub fn remove(&self, ids: &[NodeId]) -> Vec<NodeSnapshot> {
        let ids = self.present(ids);
        let (snapshots, removed) = {
            let mut scene = self.inner.scene.borrow_mut();
            let roots: Vec<NodeId> = ids
                .iter()
                .copied()
                .filter(|id| !ids.iter().any(|other| scene.is_ancestor_of(*other, *id)))
                .collect();
            // Capture everything first so every z-index predates the removal.
            let snapshots: Vec<NodeSnapshot> = roots.iter().filter_map(|id| scene.snapshot(*id)).collect();
            for id in &roots {
                scene.detach(*id);
            }
            let removed: Vec<NodeId> = snapshots.iter().flat_map(NodeSnapshot::subtree_ids).collect();
            (snapshots, removed)
        };
        if snapshots.is_empty() {
            return snapshots;
        }
        debug!("removed {removed:?}");
        self.request_render();
        self.publish(&NodeRemoved { nodes: removed });
        self.publish(&ShapeRemoved {
            nodes: snapshots.clone(),
        });
        snapshots
    }

    /// Canvas reset: remove every top-level node as one operation.
    pub fn clear(&self) -> Vec<NodeSnapshot> {
        let top = self.inner.scene.borrow().top_level_ids();
        self.remove(&top)
    }

    /// Programmatic edit of present nodes, bracketed by `node:update:before`
    /// and `node:updated`. `edit` cannot change a node's id.
    pub fn update<F>(&self, ids: &[NodeId], mut edit: F) -> bool
    where
        F: FnMut(&mut SceneNode),
    {
        let ids = self.present(ids);
        if ids.is_empty() {
            return false;
        }
        self.publish(&NodeUpdateBefore { nodes: ids.clone() });
        {
            let mut scene = self.inner.scene.borrow_mut();
            for id in &ids {
                if let Some(node) = scene.get_by_id_mut(*id) {
                    edit(node);
                    node.id = *id;
                }
            }
        }
        self.request_render();
        self.publish(&NodeChanged { nodes: ids.clone() });
        self.publish(&NodeUpdated { nodes: ids });
        true
    }

    pub fn move_up(&self, ids: &[NodeId]) -> bool {
        self.reorder(ids, ZMove::Up)
    }

    pub fn move_down(&self, ids: &[NodeId]) -> bool {
        self.reorder(ids, ZMove::Down)
    }

    pub fn move_top(&self, ids: &[NodeId]) -> bool {
        self.reorder(ids, ZMove::Top)
    }

    pub fn move_bottom(&self, ids: &[NodeId]) -> bool {
        self.reorder(ids, ZMove::Bottom)
    }

    /// Z-order change, recorded like any other update. Nodes are visited in
    /// the order that keeps their relative stacking.
    fn reorder(&self, ids: &[NodeId], op: ZMove) -> bool {
        let ids = self.present(ids);
        if ids.is_empty() {
            return false;
        }
        self.publish(&NodeUpdateBefore { nodes: ids.clone() });
        let changed = {
            let mut scene = self.inner.scene.borrow_mut();
            let mut indices: Vec<_> = ids
                .iter()
                .filter_map(|id| scene.index_of(*id))
                .filter_map(|idx| scene.z_index(idx).map(|z| (z, idx)))
                .collect();
            indices.sort_by_key(|(z, _)| *z);
            if matches!(op, ZMove::Up | ZMove::Bottom) {
                indices.reverse();
            }
            let mut changed = false;
            for (_, idx) in indices {
                changed |= match op {
                    ZMove::Up => scene.bring_forward(idx),
                    ZMove::Down => scene.send_backward(idx),
                    ZMove::Top => scene.bring_to_front(idx),
                    ZMove::Bottom => scene.send_to_back(idx),
                };
            }
            changed
        };
        if changed {
            self.request_render();
            self.publish(&NodeChanged { nodes: ids.clone() });
        }
        self.publish(&NodeUpdated { nodes: ids });
        changed
    }

    /// Wrap nodes sharing the first node's parent in a new group placed on
    /// top of that parent. Recorded as a removal followed by an addition.
    pub fn make_group(&self, ids: &[NodeId]) -> Result<Option<NodeId>, EditorError> {
        let ids = self.present(ids);
        let Some(first) = ids.first() else {
            return Ok(None);
        };
        let parent = self
            .inner
            .scene
            .borrow()
            .parent_id(*first)
            .ok_or(SceneError::UnknownNode(*first))?;
        let members: Vec<NodeId> = {
            let scene = self.inner.scene.borrow();
            ids.iter()
                .copied()
                .filter(|id| scene.parent_id(*id) == Some(parent))
                .collect()
        };
        let mut removed = self.remove(&members);
        removed.sort_by_key(|snap| snap.z_index);

        let group = SceneNode::generated(NodeKind::Group);
        let group_id = group.id;
        let snapshot = {
            let mut scene = self.inner.scene.borrow_mut();
            let parent_idx = scene.index_of(parent).ok_or(SceneError::UnknownNode(parent))?;
            scene.add_node(parent_idx, group)?;
            for (z_index, member) in removed.into_iter().enumerate() {
                scene.restore(&NodeSnapshot {
                    parent: group_id,
                    z_index,
                    ..member
                })?;
            }
            scene.snapshot(group_id)
        };
        debug!("grouped {members:?} into {group_id}");
        self.request_render();
        if let Some(snapshot) = snapshot {
            self.publish(&ShapeAdded { nodes: vec![snapshot] });
        }
        Ok(Some(group_id))
    }

    /// Set absolute transforms (screen space) in the middle of a gesture.
    /// Publishes `node:changed` only; the gesture's own lifecycle events
    /// bracket it. Returns how many nodes were written.
    pub fn set_absolute_transforms(&self, transforms: &[(NodeId, Affine)]) -> usize {
        let stage = self.stage();
        let written: Vec<NodeId> = {
            let mut scene = self.inner.scene.borrow_mut();
            transforms
                .iter()
                .filter(|(id, absolute)| scene.set_absolute_transform(*id, &stage, *absolute))
                .map(|(id, _)| *id)
                .collect()
        };
        if written.is_empty() {
            return 0;
        }
        self.request_render();
        let count = written.len();
        self.publish(&NodeChanged { nodes: written });
        count
    }

    /// Selection bookkeeping; no event.
    pub fn set_draggable(&self, ids: &[NodeId], draggable: bool) {
        let mut scene = self.inner.scene.borrow_mut();
        for id in ids {
            if let Some(node) = scene.get_by_id_mut(*id) {
                node.draggable = draggable;
            }
        }
    }

    // ─── Rendering & frames ──────────────────────────────────────────────

    pub fn request_render(&self) {
        self.inner.render_requested.set(true);
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_render_request(&self) -> bool {
        self.inner.render_requested.replace(false)
    }

    /// Ask for one `frame:tick` at the next [`tick`](Self::tick).
    pub fn request_frame(&self) {
        self.inner.frame_requested.set(true);
    }

    pub fn frame_requested(&self) -> bool {
        self.inner.frame_requested.get()
    }

    /// Frame boundary from the host. Publishes `frame:tick` if a frame was
    /// requested; requests made while handling it wait for the next tick.
    pub fn tick(&self) -> bool {
        if !self.inner.frame_requested.replace(false) {
            return false;
        }
        trace!("frame tick");
        self.publish(&AnimationFrame);
        true
    }

    // ─── Pointer ─────────────────────────────────────────────────────────

    /// Last known pointer position in screen space.
    pub fn pointer(&self) -> Option<Point> {
        self.inner.pointer.get()
    }

    pub fn pointer_down(&self, event: PointerEvent) {
        let target = Target::from(self.hit(event.point));
        self.inner.pointer.set(Some(event.point));
        self.inner.press.set(Some(Press {
            origin: event.point,
            button: event.button,
            target,
        }));
        self.publish(&MouseDown { event, target });
    }

    pub fn pointer_move(&self, event: PointerEvent) {
        let target = Target::from(self.hit(event.point));
        self.inner.pointer.set(Some(event.point));
        self.publish(&MouseMove { event, target });
    }

    /// Publishes `mouse:up`, then `mouse:click` when the press started on the
    /// same target with the same button and the pointer stayed within the
    /// click tolerance.
    pub fn pointer_up(&self, event: PointerEvent) {
        let target = Target::from(self.hit(event.point));
        self.inner.pointer.set(Some(event.point));
        let press = self.inner.press.take();
        self.publish(&MouseUp { event, target });
        let is_click = press.is_some_and(|p| {
            p.button == event.button
                && p.target == target
                && p.origin.distance(event.point) <= self.inner.config.click_tolerance
        });
        if is_click {
            self.publish(&MouseClick { event, target });
        }
    }

    /// The pointer left the canvas.
    pub fn pointer_leave(&self, event: PointerEvent) {
        self.inner.pointer.set(None);
        let primary_held = self
            .inner
            .press
            .get()
            .is_some_and(|p| p.button == PointerButton::Primary);
        self.publish(&MouseOut {
            event,
            target: Target::Stage,
            primary_held,
        });
    }
}

/// Replays never publish `shape:*`, so recorders do not see their own
/// undo/redo. Removals still publish `node:removed` and attribute writes
/// `node:changed`, which keeps selection and overlays in step.
impl Replay for App {
    fn restore(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError> {
        {
            let mut scene = self.inner.scene.borrow_mut();
            for snap in restore_order(nodes) {
                scene.restore(snap)?;
            }
        }
        self.request_render();
        Ok(())
    }

    fn detach(&mut self, ids: &[NodeId]) {
        let removed: Vec<NodeId> = {
            let mut scene = self.inner.scene.borrow_mut();
            ids.iter()
                .filter_map(|id| scene.detach(*id))
                .flat_map(|snap| snap.subtree_ids())
                .collect()
        };
        if removed.is_empty() {
            return;
        }
        self.request_render();
        self.publish(&NodeRemoved { nodes: removed });
    }

    fn apply(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError> {
        self.inner.scene.borrow_mut().apply_snapshots(nodes)?;
        self.request_render();
        self.publish(&NodeChanged {
            nodes: nodes.iter().map(NodeSnapshot::id).collect(),
        });
        Ok(())
    }
}

/// A session with the history and selector plugins installed per `config`.
pub struct Editor {
    pub app: App,
    pub history: HistoryPlugin,
    pub selector: SelectorPlugin,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
        let app = App::new(config.app);
        let history = HistoryPlugin::new(config.history);
        let selector = SelectorPlugin::new(config.selector);
        app.use_plugin(history.clone())?;
        app.use_plugin(selector.clone())?;
        Ok(Self { app, history, selector })
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Self::new(EditorConfig::from_json(json)?)
    }
}
