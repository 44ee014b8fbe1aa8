//! Bounded linear undo/redo.
//!
//! [`History`] is the stack itself: commands plus a pointer, with eviction
//! from the bottom once the capacity is reached. [`HistoryPlugin`] wires a
//! `History` to a session: it records `shape:*` lifecycle events as commands
//! and replays them through the session on undo/redo.

use crate::app::{App, WeakApp};
use crate::bus::{Event, Subscription};
use crate::commands::{AddCommand, Command, ModifyCommand, RemoveCommand, Replay};
use crate::config::HistoryOptions;
use crate::error::EditorError;
use crate::events::{ShapeAdded, ShapeRemoved, ShapeTransformEnd, ShapeTransformStart};
use crate::plugin::Plugin;
use easel_core::NodeSnapshot;
use log::{debug, warn};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Ordered commands with a pointer. `stack[..top]` can be undone,
/// `stack[top..]` can be redone.
#[derive(Debug, Clone)]
pub struct History {
    stack: Vec<Command>,
    top: usize,
    capacity: usize,
    enabled: bool,
}

impl History {
    pub fn new(options: &HistoryOptions) -> Self {
        let mut history = Self::with_capacity(options.stack_size);
        history.enabled = options.enabled;
        history
    }

    /// Enabled history holding at most `capacity` commands (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            warn!("history capacity 0 is not usable, using 1");
        }
        let capacity = capacity.max(1);
        Self {
            stack: Vec::with_capacity(capacity),
            top: 0,
            capacity,
            enabled: true,
        }
    }

    /// Record a command whose mutation has already happened.
    ///
    /// Drops everything that could still be redone, then evicts the oldest
    /// command if the stack is over capacity. Returns false when recording is
    /// disabled.
    pub fn push(&mut self, command: Command) -> bool {
        if !self.enabled {
            debug!("history disabled, not recording {}", command.label());
            return false;
        }
        if self.top < self.stack.len() {
            debug!("pruning {} redoable command(s)", self.stack.len() - self.top);
            self.stack.truncate(self.top);
        }
        debug!("record {}", command.label());
        self.stack.push(command);
        if self.stack.len() > self.capacity {
            let evicted = self.stack.remove(0);
            debug!("evict {}", evicted.label());
        }
        self.top = self.stack.len();
        true
    }

    /// Apply `command` to `target`, then record it. When disabled the
    /// mutation still happens but nothing is recorded.
    pub fn execute(&mut self, command: Command, target: &mut dyn Replay) -> Result<bool, EditorError> {
        command.execute(target)?;
        Ok(self.push(command))
    }

    /// Undo the command under the pointer. False at the bottom of the stack
    /// or when the replay fails (the pointer then stays put).
    pub fn undo(&mut self, target: &mut dyn Replay) -> bool {
        let Some(command) = self.next_undo() else {
            return false;
        };
        match command.undo(target) {
            Ok(()) => {
                self.step_back();
                true
            }
            Err(err) => {
                warn!("undo failed: {err}");
                false
            }
        }
    }

    /// Redo the command just above the pointer. False at the top.
    pub fn redo(&mut self, target: &mut dyn Replay) -> bool {
        let Some(command) = self.next_redo() else {
            return false;
        };
        match command.execute(target) {
            Ok(()) => {
                self.step_forward();
                true
            }
            Err(err) => {
                warn!("redo failed: {err}");
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.top > 0
    }

    pub fn can_redo(&self) -> bool {
        self.top < self.stack.len()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn undo_len(&self) -> usize {
        self.top
    }

    pub fn redo_len(&self) -> usize {
        self.stack.len() - self.top
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every stored command, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.stack
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.top = 0;
    }

    pub(crate) fn next_undo(&self) -> Option<&Command> {
        self.top.checked_sub(1).and_then(|i| self.stack.get(i))
    }

    pub(crate) fn next_redo(&self) -> Option<&Command> {
        self.stack.get(self.top)
    }

    pub(crate) fn step_back(&mut self) {
        self.top = self.top.saturating_sub(1);
    }

    pub(crate) fn step_forward(&mut self) {
        self.top = (self.top + 1).min(self.stack.len());
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(&HistoryOptions::default())
    }
}

// ─── Plugin ──────────────────────────────────────────────────────────────

/// Published once when a [`HistoryPlugin`] is disposed.
#[derive(Clone)]
pub struct HistoryDestroy {
    pub history: HistoryPlugin,
}

impl Event for HistoryDestroy {
    const NAME: &'static str = "history:destroy";
}

struct HistoryInner {
    history: RefCell<History>,
    /// Snapshots from the last `shape:transform:start`.
    pending: RefCell<Option<Vec<NodeSnapshot>>>,
    app: RefCell<Option<WeakApp>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

/// Records scene mutations of a session and undoes/redoes them.
///
/// Cheap to clone; clones share one stack. Keep a clone after handing one to
/// [`App::use_plugin`] to drive undo/redo.
#[derive(Clone)]
pub struct HistoryPlugin {
    inner: Rc<HistoryInner>,
}

impl HistoryPlugin {
    pub const NAME: &'static str = "historyPlugin";

    pub fn new(options: HistoryOptions) -> Self {
        Self {
            inner: Rc::new(HistoryInner {
                history: RefCell::new(History::new(&options)),
                pending: RefCell::new(None),
                app: RefCell::new(None),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Read access to the underlying stack.
    pub fn history(&self) -> Ref<'_, History> {
        self.inner.history.borrow()
    }

    pub fn can_undo(&self) -> bool {
        self.inner.history.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.history.borrow().can_redo()
    }

    /// Undo one step through the session. Replays publish `node:removed` and
    /// `node:changed` but no `shape:*` events, so nothing is re-recorded.
    pub fn undo(&self) -> bool {
        let Some(mut app) = self.app() else {
            return false;
        };
        // Clone out so handlers reacting to the replay can query the history.
        let Some(command) = self.inner.history.borrow().next_undo().cloned() else {
            return false;
        };
        match command.undo(&mut app) {
            Ok(()) => {
                self.inner.history.borrow_mut().step_back();
                app.request_render();
                true
            }
            Err(err) => {
                warn!("undo of {} failed: {err}", command.label());
                false
            }
        }
    }

    pub fn redo(&self) -> bool {
        let Some(mut app) = self.app() else {
            return false;
        };
        let Some(command) = self.inner.history.borrow().next_redo().cloned() else {
            return false;
        };
        match command.execute(&mut app) {
            Ok(()) => {
                self.inner.history.borrow_mut().step_forward();
                app.request_render();
                true
            }
            Err(err) => {
                warn!("redo of {} failed: {err}", command.label());
                false
            }
        }
    }

    /// Record a command directly. Honors the enabled flag.
    pub fn record(&self, command: Command) -> bool {
        self.inner.history.borrow_mut().push(command)
    }

    pub fn clear(&self) {
        self.inner.history.borrow_mut().clear();
    }

    fn app(&self) -> Option<App> {
        self.inner.app.borrow().as_ref().and_then(WeakApp::upgrade)
    }

    fn on_added(&self, event: &ShapeAdded) {
        if !event.nodes.is_empty() {
            self.record(AddCommand::new(event.nodes.clone()).into());
        }
    }

    fn on_removed(&self, event: &ShapeRemoved) {
        if !event.nodes.is_empty() {
            self.record(RemoveCommand::new(event.nodes.clone()).into());
        }
    }

    fn on_transform_start(&self, event: &ShapeTransformStart) {
        let previous = self.inner.pending.borrow_mut().replace(event.nodes.clone());
        if previous.is_some() {
            warn!("transform started before the previous one ended; discarding its start state");
        }
    }

    fn on_transform_end(&self, event: &ShapeTransformEnd) -> Result<(), EditorError> {
        let Some(before) = self.inner.pending.borrow_mut().take() else {
            warn!("transform ended without a start; not recorded");
            return Ok(());
        };
        let command = ModifyCommand::new(before, event.nodes.clone())?;
        if command.is_noop() {
            debug!("transform left nodes unchanged; not recorded");
            return Ok(());
        }
        self.record(command.into());
        Ok(())
    }
}

impl Plugin for HistoryPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn install(&self, app: &App) -> Result<(), EditorError> {
        app.bus().register::<HistoryDestroy>()?;
        *self.inner.app.borrow_mut() = Some(app.downgrade());

        let mut subs = self.inner.subscriptions.borrow_mut();
        let this = self.clone();
        subs.push(app.on(move |e: &ShapeAdded| {
            this.on_added(e);
            Ok(())
        }));
        let this = self.clone();
        subs.push(app.on(move |e: &ShapeRemoved| {
            this.on_removed(e);
            Ok(())
        }));
        let this = self.clone();
        subs.push(app.on(move |e: &ShapeTransformStart| {
            this.on_transform_start(e);
            Ok(())
        }));
        let this = self.clone();
        subs.push(app.on(move |e: &ShapeTransformEnd| this.on_transform_end(e)));
        debug!("history installed (capacity {})", self.inner.history.borrow().capacity());
        Ok(())
    }

    fn dispose(&self) {
        let Some(app) = self.app() else {
            return;
        };
        for sub in self.inner.subscriptions.borrow_mut().drain(..) {
            app.off(sub);
        }
        self.inner.history.borrow_mut().clear();
        self.inner.pending.borrow_mut().take();
        *self.inner.app.borrow_mut() = None;
        app.publish(&HistoryDestroy { history: self.clone() });
    }

    fn enable(&self) {
        self.inner.history.borrow_mut().enable();
    }

    fn disable(&self) {
        self.inner.history.borrow_mut().disable();
    }

    fn is_enabled(&self) -> bool {
        self.inner.history.borrow().is_enabled()
    }
}
