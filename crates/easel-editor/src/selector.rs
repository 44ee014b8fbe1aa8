//! Selection engine.
//!
//! [`SelectorPlugin`] owns the selection set, one highlight overlay per
//! selected node, the rubber band and the transform handles. It reads
//! pointer events from the bus and talks back only through events:
//! `selected:changed` for membership, and the `node:transform:*` /
//! `node:update:*` pairs around every gesture that mutates nodes.
//!
//! Overlays are recomputed right away when the selection changes. Changes to
//! the nodes themselves only mark overlays dirty; the recompute runs once on
//! the next `frame:tick`.

use crate::app::{App, WeakApp};
use crate::bus::{Event, Subscription};
use crate::config::SelectorOptions;
use crate::error::EditorError;
use crate::events::{
    AnimationFrame, MouseClick, MouseDown, MouseMove, MouseOut, MouseUp, NodeChanged, NodeRemoved, NodeTransformEnd,
    NodeTransformStart, NodeUpdateBefore, NodeUpdated, SelectedChanged, StageChanged,
};
use crate::geometry::{self, OverlayRect};
use crate::handles::{Anchor, TransformFrame, TransformHandles};
use crate::input::Target;
use crate::plugin::Plugin;
use easel_core::{Affine, NodeId, Point, Rect};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;

/// Published once the selector is attached to a session.
#[derive(Clone)]
pub struct SelectorInstalled {
    pub selector: SelectorPlugin,
}

/// Published once when the selector is destroyed.
#[derive(Clone)]
pub struct SelectorDestroy {
    pub selector: SelectorPlugin,
}

impl Event for SelectorInstalled {
    const NAME: &'static str = "selector:installed";
}

impl Event for SelectorDestroy {
    const NAME: &'static str = "selector:destroy";
}

/// Gesture state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Idle,
    RubberBanding,
    Transforming,
}

/// What the pointer grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grip {
    /// A selected node: moves the whole selection.
    Body,
    Anchor(Anchor),
}

#[derive(Debug, Clone)]
struct Transform {
    grip: Grip,
    origin: Point,
    /// Handle frame at press time; anchors resize and rotate relative to it.
    frame: Option<TransformFrame>,
    nodes: Vec<NodeId>,
    /// Absolute transforms when the gesture started moving.
    start: Vec<(NodeId, Affine)>,
    started: bool,
}

#[derive(Debug, Clone)]
enum Gesture {
    Idle,
    RubberBand { origin: Point, current: Point },
    Transform(Transform),
}

struct Core {
    enabled: bool,
    multiple_select: bool,
    selected: IndexSet<NodeId>,
    /// Overlay arena, keyed by selected node.
    highlights: IndexMap<NodeId, OverlayRect>,
    /// Overlays waiting for the next frame.
    pending: IndexSet<NodeId>,
    handles_dirty: bool,
    handles: Option<TransformHandles>,
    gesture: Gesture,
    /// The press landed on an anchor; the click it produces is not a selection.
    suppress_click: bool,
}

struct SelectorInner {
    options: SelectorOptions,
    core: RefCell<Core>,
    app: RefCell<Option<WeakApp>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Selection, rubber band, highlights and transform handles for a session.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SelectorPlugin {
    inner: Rc<SelectorInner>,
}

type Handler<E> = fn(&SelectorPlugin, &App, &E) -> Result<(), EditorError>;

impl SelectorPlugin {
    pub const NAME: &'static str = "selectorPlugin";

    pub fn new(options: SelectorOptions) -> Self {
        let core = Core {
            enabled: options.enabled,
            multiple_select: options.multiple_select,
            selected: IndexSet::new(),
            highlights: IndexMap::new(),
            pending: IndexSet::new(),
            handles_dirty: false,
            handles: None,
            gesture: Gesture::Idle,
            suppress_click: false,
        };
        Self {
            inner: Rc::new(SelectorInner {
                options,
                core: RefCell::new(core),
                app: RefCell::new(None),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    fn app(&self) -> Option<App> {
        self.inner.app.borrow().as_ref().and_then(WeakApp::upgrade)
    }

    pub fn options(&self) -> &SelectorOptions {
        &self.inner.options
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Replace the selection with the present nodes among `ids`.
    ///
    /// A set equal to the current one (in any order) is a no-op. Otherwise
    /// the previous nodes lose `draggable`, the new ones gain it, overlays and
    /// handles are rebuilt, and one `selected:changed` is published.
    pub fn select(&self, ids: &[NodeId]) -> bool {
        let Some(app) = self.app() else {
            return false;
        };
        if !self.is_enabled() {
            return false;
        }
        let next: IndexSet<NodeId> = {
            let scene = app.scene();
            ids.iter()
                .copied()
                .filter(|id| !id.is_root() && scene.contains(*id))
                .collect()
        };
        let previous = {
            let mut core = self.inner.core.borrow_mut();
            if same_members(&core.selected, &next) {
                return false;
            }
            std::mem::replace(&mut core.selected, next)
        };
        let previous: Vec<NodeId> = previous.into_iter().collect();
        app.set_draggable(&previous, false);
        let selected = self.selected();
        app.set_draggable(&selected, true);
        self.rebuild(&app);

        debug!("selected {selected:?}");
        app.request_render();
        app.publish(&SelectedChanged { selected });
        true
    }

    /// Drop `ids` from the selection, or everything when `ids` is empty.
    /// Ids that are not selected are ignored; publishes `selected:changed`
    /// only if something was dropped.
    pub fn cancel_select(&self, ids: &[NodeId]) -> bool {
        let Some(app) = self.app() else {
            return false;
        };
        let dropped: Vec<NodeId> = {
            let mut core = self.inner.core.borrow_mut();
            if core.selected.is_empty() {
                return false;
            }
            let dropped: Vec<NodeId> = if ids.is_empty() {
                core.selected.drain(..).collect()
            } else {
                ids.iter().copied().filter(|id| core.selected.shift_remove(id)).collect()
            };
            if dropped.is_empty() {
                return false;
            }
            for id in &dropped {
                core.highlights.shift_remove(id);
                core.pending.shift_remove(id);
            }
            dropped
        };
        app.set_draggable(&dropped, false);
        self.rebuild_handles(&app);

        let selected = self.selected();
        debug!("deselected {dropped:?}, {} left", selected.len());
        app.request_render();
        app.publish(&SelectedChanged { selected });
        true
    }

    /// Select every top-level node.
    pub fn select_all(&self) -> bool {
        let Some(app) = self.app() else {
            return false;
        };
        let ids = app.scene().top_level_ids();
        self.select(&ids)
    }

    /// Toggle the selector, or force it on/off. Turning it off ends any
    /// gesture in progress. Returns the new state.
    pub fn trigger_selector(&self, enable: Option<bool>) -> bool {
        let enabled = {
            let mut core = self.inner.core.borrow_mut();
            core.enabled = enable.unwrap_or(!core.enabled);
            core.enabled
        };
        if !enabled && let Some(app) = self.app() {
            self.abort_gesture(&app);
        }
        debug!("selector {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn set_multiple_select(&self, multiple_select: bool) {
        self.inner.core.borrow_mut().multiple_select = multiple_select;
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.inner.core.borrow().selected.contains(&id)
    }

    /// Selected ids in insertion order.
    pub fn selected(&self) -> Vec<NodeId> {
        self.inner.core.borrow().selected.iter().copied().collect()
    }

    pub fn state(&self) -> SelectorState {
        match &self.inner.core.borrow().gesture {
            Gesture::Idle => SelectorState::Idle,
            Gesture::RubberBand { .. } => SelectorState::RubberBanding,
            Gesture::Transform(t) if t.started || matches!(t.grip, Grip::Anchor(_)) => SelectorState::Transforming,
            Gesture::Transform(_) => SelectorState::Idle,
        }
    }

    /// Screen-space box around the selection and its handle padding.
    pub fn selection_client_rect(&self) -> Option<Rect> {
        let app = self.app()?;
        let selected = self.selected();
        let scene = app.scene();
        TransformFrame::for_selection(&scene, &app.stage(), &selected, &self.inner.options.transformer)
            .map(|frame| frame.bounds())
    }

    // ─── Overlays ────────────────────────────────────────────────────────

    pub fn highlight(&self, id: NodeId) -> Option<OverlayRect> {
        self.inner.core.borrow().highlights.get(&id).copied()
    }

    /// Every highlight overlay, in selection order.
    pub fn highlights(&self) -> Vec<(NodeId, OverlayRect)> {
        self.inner
            .core
            .borrow()
            .highlights
            .iter()
            .map(|(id, rect)| (*id, *rect))
            .collect()
    }

    /// Rubber band in screen space while one is being drawn.
    pub fn rubber_band(&self) -> Option<Rect> {
        match self.inner.core.borrow().gesture {
            Gesture::RubberBand { origin, current } => Some(geometry::band_rect(origin, current)),
            _ => None,
        }
    }

    pub fn handles(&self) -> Option<TransformHandles> {
        self.inner.core.borrow().handles.clone()
    }

    /// Overlays marked dirty and waiting for the next frame.
    pub fn pending_overlays(&self) -> Vec<NodeId> {
        self.inner.core.borrow().pending.iter().copied().collect()
    }

    fn overlay(&self, app: &App, id: NodeId) -> Option<OverlayRect> {
        let options = &self.inner.options;
        geometry::node_overlay(
            &app.scene(),
            &app.stage(),
            id,
            options.highlight.padding,
            options.transformer.ignore_stroke,
        )
    }

    /// Recompute every overlay and the handles from scratch.
    fn rebuild(&self, app: &App) {
        {
            let mut core = self.inner.core.borrow_mut();
            let highlights: IndexMap<NodeId, OverlayRect> = core
                .selected
                .iter()
                .filter_map(|id| self.overlay(app, *id).map(|rect| (*id, rect)))
                .collect();
            core.highlights = highlights;
            core.pending.clear();
        }
        self.rebuild_handles(app);
    }

    fn rebuild_handles(&self, app: &App) {
        let selected = self.selected();
        let handles = {
            let scene = app.scene();
            TransformHandles::for_selection(&scene, &app.stage(), &selected, &self.inner.options.transformer)
        };
        let mut core = self.inner.core.borrow_mut();
        core.handles = handles;
        core.handles_dirty = false;
    }

    /// Mark overlays dirty and ask for a frame.
    fn schedule(&self, app: &App, ids: impl IntoIterator<Item = NodeId>) {
        let mut core = self.inner.core.borrow_mut();
        core.pending.extend(ids);
        core.handles_dirty = true;
        trace!("{} overlay(s) pending", core.pending.len());
        app.request_frame();
    }

    /// Recompute what was marked dirty since the last frame.
    fn flush(&self, app: &App) {
        let pending = {
            let mut core = self.inner.core.borrow_mut();
            if core.pending.is_empty() && !core.handles_dirty {
                return;
            }
            std::mem::take(&mut core.pending)
        };
        trace!("recompute {} overlay(s)", pending.len());
        for id in pending {
            if !self.is_selected(id) {
                continue;
            }
            let overlay = self.overlay(app, id);
            let mut core = self.inner.core.borrow_mut();
            match overlay {
                Some(rect) => {
                    core.highlights.insert(id, rect);
                }
                None => {
                    core.highlights.shift_remove(&id);
                }
            }
        }
        self.rebuild_handles(app);
        app.request_render();
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    fn arm(&self, grip: Grip, origin: Point) {
        let mut core = self.inner.core.borrow_mut();
        let frame = core.handles.as_ref().map(|h| h.frame);
        let nodes = core.selected.iter().copied().collect();
        debug!("arm {grip:?} at ({}, {})", origin.x, origin.y);
        core.gesture = Gesture::Transform(Transform {
            grip,
            origin,
            frame,
            nodes,
            start: Vec::new(),
            started: false,
        });
    }

    /// First movement of an armed gesture: capture the start state, then
    /// announce the mutation.
    fn begin_transform(&self, app: &App) {
        let nodes = {
            let mut core = self.inner.core.borrow_mut();
            let Gesture::Transform(t) = &mut core.gesture else {
                return;
            };
            t.start = t
                .nodes
                .iter()
                .filter_map(|id| app.absolute_transform(*id).map(|abs| (*id, abs)))
                .collect();
            t.started = true;
            t.nodes.clone()
        };
        debug!("transform start {nodes:?}");
        app.publish(&NodeTransformStart { nodes: nodes.clone() });
        app.publish(&NodeUpdateBefore { nodes });
    }

    fn drag_to(&self, app: &App, pointer: Point) {
        let transforms: Vec<(NodeId, Affine)> = {
            let core = self.inner.core.borrow();
            let Gesture::Transform(t) = &core.gesture else {
                return;
            };
            let delta = match (t.grip, t.frame) {
                (Grip::Body, _) => geometry::translation_delta(t.origin, pointer),
                (Grip::Anchor(Anchor::Rotater), Some(frame)) => {
                    geometry::rotation_delta(frame.center, t.origin, pointer)
                }
                (Grip::Anchor(anchor), Some(frame)) => {
                    frame.resize_delta(anchor, pointer, self.inner.options.transformer.keep_ratio)
                }
                (Grip::Anchor(_), None) => Affine::IDENTITY,
            };
            t.start.iter().map(|(id, abs)| (*id, delta * *abs)).collect()
        };
        app.set_absolute_transforms(&transforms);
    }

    fn end_transform(&self, app: &App, nodes: Vec<NodeId>) {
        debug!("transform end {nodes:?}");
        app.publish(&NodeTransformEnd { nodes: nodes.clone() });
        app.publish(&NodeUpdated { nodes });
    }

    /// Drop the current gesture. A transform that already moved nodes is
    /// ended where it is, so its start/end events stay paired.
    fn abort_gesture(&self, app: &App) {
        let gesture = std::mem::replace(&mut self.inner.core.borrow_mut().gesture, Gesture::Idle);
        match gesture {
            Gesture::RubberBand { .. } => debug!("rubber band cancelled"),
            Gesture::Transform(t) if t.started => self.end_transform(app, t.nodes),
            _ => {}
        }
    }

    // ─── Handlers ────────────────────────────────────────────────────────

    fn on_mouse_down(&self, app: &App, e: &MouseDown) -> Result<(), EditorError> {
        self.inner.core.borrow_mut().suppress_click = false;
        if !self.is_enabled() || !e.event.is_primary() {
            return Ok(());
        }
        let point = e.event.point;
        let anchor = self.inner.core.borrow().handles.as_ref().and_then(|h| h.hit(point));
        if let Some(anchor) = anchor {
            self.inner.core.borrow_mut().suppress_click = true;
            self.arm(Grip::Anchor(anchor), point);
            return Ok(());
        }
        match e.target {
            Target::Stage => {
                self.cancel_select(&[]);
                self.inner.core.borrow_mut().gesture = Gesture::RubberBand {
                    origin: point,
                    current: point,
                };
            }
            Target::Node(hit) => {
                let owner = app.find_top_group(hit).unwrap_or(hit);
                let draggable = self.is_selected(owner) && app.node(owner).is_some_and(|n| n.draggable);
                if draggable {
                    self.arm(Grip::Body, point);
                }
            }
        }
        Ok(())
    }

    fn on_mouse_move(&self, app: &App, e: &MouseMove) -> Result<(), EditorError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let point = e.event.point;
        let tolerance = app.config().click_tolerance;
        let begin = {
            let mut core = self.inner.core.borrow_mut();
            match &mut core.gesture {
                Gesture::Idle => return Ok(()),
                Gesture::RubberBand { current, .. } => {
                    *current = point;
                    return Ok(());
                }
                Gesture::Transform(t) => {
                    if !t.started && !geometry::moved_beyond(t.origin, point, tolerance) {
                        return Ok(());
                    }
                    !t.started
                }
            }
        };
        if begin {
            self.begin_transform(app);
        }
        self.drag_to(app, point);
        Ok(())
    }

    fn on_mouse_up(&self, app: &App, e: &MouseUp) -> Result<(), EditorError> {
        if !self.is_enabled() || !e.event.is_primary() {
            return Ok(());
        }
        let gesture = std::mem::replace(&mut self.inner.core.borrow_mut().gesture, Gesture::Idle);
        match gesture {
            Gesture::RubberBand { origin, .. } => {
                let point = e.event.point;
                if geometry::moved_beyond(origin, point, app.config().click_tolerance) {
                    let area = geometry::band_rect(origin, point);
                    let hits = app.shapes_in_area(area);
                    debug!("rubber band hit {hits:?}");
                    self.select(&hits);
                }
            }
            Gesture::Transform(t) if t.started => self.end_transform(app, t.nodes),
            _ => {}
        }
        Ok(())
    }

    fn on_click(&self, app: &App, e: &MouseClick) -> Result<(), EditorError> {
        if std::mem::take(&mut self.inner.core.borrow_mut().suppress_click) {
            trace!("click on a transform anchor, selection kept");
            return Ok(());
        }
        if !self.is_enabled() || !e.event.is_primary() {
            return Ok(());
        }
        let Target::Node(hit) = e.target else {
            return Ok(());
        };
        let target = app.find_top_group(hit).unwrap_or(hit);
        let multiple = self.inner.core.borrow().multiple_select;
        if e.event.modifiers.shift && multiple {
            if self.is_selected(target) {
                self.cancel_select(&[target]);
            } else {
                let mut ids = self.selected();
                ids.push(target);
                self.select(&ids);
            }
        } else {
            self.select(&[target]);
        }
        Ok(())
    }

    fn on_mouse_out(&self, app: &App, e: &MouseOut) -> Result<(), EditorError> {
        if !e.primary_held {
            self.abort_gesture(app);
        }
        Ok(())
    }

    fn on_node_removed(&self, _app: &App, e: &NodeRemoved) -> Result<(), EditorError> {
        let stale: Vec<NodeId> = {
            let core = self.inner.core.borrow();
            e.nodes.iter().copied().filter(|id| core.selected.contains(id)).collect()
        };
        if !stale.is_empty() {
            self.cancel_select(&stale);
        }
        Ok(())
    }

    fn on_node_changed(&self, app: &App, e: &NodeChanged) -> Result<(), EditorError> {
        let dirty: Vec<NodeId> = {
            let core = self.inner.core.borrow();
            let scene = app.scene();
            core.selected
                .iter()
                .copied()
                .filter(|sel| {
                    e.nodes.iter().any(|changed| {
                        changed == sel || scene.is_ancestor_of(*sel, *changed) || scene.is_ancestor_of(*changed, *sel)
                    })
                })
                .collect()
        };
        if !dirty.is_empty() {
            self.schedule(app, dirty);
        }
        Ok(())
    }

    fn on_stage_changed(&self, app: &App, _e: &StageChanged) -> Result<(), EditorError> {
        let selected = self.selected();
        if !selected.is_empty() {
            self.schedule(app, selected);
        }
        Ok(())
    }

    fn on_frame(&self, app: &App, _e: &AnimationFrame) -> Result<(), EditorError> {
        self.flush(app);
        Ok(())
    }

    fn listen<E: Event>(&self, app: &App, handler: Handler<E>) -> Subscription {
        let this = self.clone();
        app.on(move |e: &E| {
            let app = this.app().ok_or(EditorError::SessionGone)?;
            handler(&this, &app, e)
        })
    }

    /// Detach from the session, clear the selection without publishing
    /// `selected:changed`, and publish `selector:destroy`.
    pub fn destroy(&self) {
        let Some(app) = self.app() else {
            return;
        };
        for sub in self.inner.subscriptions.borrow_mut().drain(..) {
            app.off(sub);
        }
        self.abort_gesture(&app);
        let dropped: Vec<NodeId> = {
            let mut core = self.inner.core.borrow_mut();
            core.enabled = false;
            core.highlights.clear();
            core.pending.clear();
            core.handles = None;
            core.selected.drain(..).collect()
        };
        app.set_draggable(&dropped, false);
        *self.inner.app.borrow_mut() = None;
        debug!("selector destroyed");
        app.request_render();
        app.publish(&SelectorDestroy { selector: self.clone() });
    }
}

fn same_members(a: &IndexSet<NodeId>, b: &IndexSet<NodeId>) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}

impl Plugin for SelectorPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn install(&self, app: &App) -> Result<(), EditorError> {
        app.bus().register::<SelectorInstalled>()?;
        app.bus().register::<SelectorDestroy>()?;
        *self.inner.app.borrow_mut() = Some(app.downgrade());

        let subs = [
            self.listen(app, Self::on_mouse_down as Handler<MouseDown>),
            self.listen(app, Self::on_mouse_move as Handler<MouseMove>),
            self.listen(app, Self::on_mouse_up as Handler<MouseUp>),
            self.listen(app, Self::on_click as Handler<MouseClick>),
            self.listen(app, Self::on_mouse_out as Handler<MouseOut>),
            self.listen(app, Self::on_node_removed as Handler<NodeRemoved>),
            self.listen(app, Self::on_node_changed as Handler<NodeChanged>),
            self.listen(app, Self::on_stage_changed as Handler<StageChanged>),
            self.listen(app, Self::on_frame as Handler<AnimationFrame>),
        ];
        self.inner.subscriptions.borrow_mut().extend(subs);
        debug!("selector installed");
        app.publish(&SelectorInstalled { selector: self.clone() });
        Ok(())
    }

    fn dispose(&self) {
        self.destroy();
    }

    fn enable(&self) {
        self.trigger_selector(Some(true));
    }

    fn disable(&self) {
        self.trigger_selector(Some(false));
    }

    fn is_enabled(&self) -> bool {
        self.inner.core.borrow().enabled
    }
}
