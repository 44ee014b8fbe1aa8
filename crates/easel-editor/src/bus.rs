//! Typed publish/subscribe hub.
//!
//! Each event is a payload type implementing [`Event`], which pins its wire
//! name at compile time. Handlers for one type run synchronously, in
//! subscription order, on the publishing thread. A handler that returns an
//! error or panics is logged and skipped; the remaining handlers still run.
//!
//! The catalog is open: any crate can define a payload type and
//! [`EventBus::register`] it. Registration is only needed to claim the name,
//! so two unrelated types cannot both answer to `"selection:changed"`.

use crate::error::EditorError;
use log::{trace, warn};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// A payload type that can travel over the [`EventBus`].
pub trait Event: 'static {
    /// Event name, e.g. `"shape:added"`.
    const NAME: &'static str;
}

/// Handle returned by [`EventBus::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    event: TypeId,
    name: &'static str,
    id: u64,
}

impl Subscription {
    pub fn event_name(&self) -> &'static str {
        self.name
    }
}

type HandlerCell<E> = RefCell<Box<dyn FnMut(&E) -> Result<(), EditorError>>>;

struct Slot {
    id: u64,
    /// `HandlerCell<E>` for the slot's event type.
    handler: Rc<dyn Any>,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<TypeId, Vec<Slot>>,
    names: HashMap<&'static str, TypeId>,
    next_id: u64,
}

/// Single-threaded event hub owned by an editing session.
#[derive(Default)]
pub struct EventBus {
    registry: RefCell<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `E::NAME` for `E`.
    ///
    /// # Errors
    /// [`EditorError::EventNameConflict`] when another payload type already
    /// owns the name.
    pub fn register<E: Event>(&self) -> Result<(), EditorError> {
        let mut registry = self.registry.borrow_mut();
        match registry.names.get(E::NAME) {
            Some(owner) if *owner != TypeId::of::<E>() => Err(EditorError::EventNameConflict { name: E::NAME }),
            Some(_) => Ok(()),
            None => {
                registry.names.insert(E::NAME, TypeId::of::<E>());
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.borrow().names.contains_key(name)
    }

    /// Append a handler for `E`. Safe to call from inside a handler; the new
    /// handler first runs on the next publish.
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Event,
        F: FnMut(&E) -> Result<(), EditorError> + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let owner = *registry.names.entry(E::NAME).or_insert(TypeId::of::<E>());
        if owner != TypeId::of::<E>() {
            warn!("subscribing to `{}` whose name belongs to another payload type", E::NAME);
        }
        registry.next_id += 1;
        let id = registry.next_id;
        let cell: HandlerCell<E> = RefCell::new(Box::new(handler));
        registry.slots.entry(TypeId::of::<E>()).or_default().push(Slot {
            id,
            handler: Rc::new(cell),
        });
        Subscription {
            event: TypeId::of::<E>(),
            name: E::NAME,
            id,
        }
    }

    /// Remove a handler. Returns false when it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(slots) = registry.slots.get_mut(&subscription.event) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.id != subscription.id);
        slots.len() != before
    }

    /// Number of live handlers for `E`.
    pub fn handler_count<E: Event>(&self) -> usize {
        self.registry
            .borrow()
            .slots
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler subscribed when the call starts.
    /// A handler unsubscribed by an earlier handler in the same dispatch is
    /// skipped. Returns how many handlers completed successfully.
    pub fn publish<E: Event>(&self, event: &E) -> usize {
        let snapshot: Vec<(u64, Rc<dyn Any>)> = self
            .registry
            .borrow()
            .slots
            .get(&TypeId::of::<E>())
            .map(|slots| slots.iter().map(|s| (s.id, Rc::clone(&s.handler))).collect())
            .unwrap_or_default();
        trace!("publish `{}` to {} handler(s)", E::NAME, snapshot.len());

        let mut completed = 0;
        for (id, handler) in snapshot {
            if !self.is_live::<E>(id) {
                continue;
            }
            let Some(cell) = handler.downcast_ref::<HandlerCell<E>>() else {
                continue;
            };
            let Ok(mut handler) = cell.try_borrow_mut() else {
                warn!("{}", EditorError::ReentrantHandler { event: E::NAME });
                continue;
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (*handler)(event))) {
                Ok(Ok(())) => completed += 1,
                Ok(Err(err)) => warn!("handler for `{}` failed: {err}", E::NAME),
                Err(payload) => warn!(
                    "{}",
                    EditorError::HandlerPanicked {
                        event: E::NAME,
                        message: panic_message(payload.as_ref()),
                    }
                ),
            }
        }
        completed
    }

    fn is_live<E: Event>(&self, id: u64) -> bool {
        self.registry
            .borrow()
            .slots
            .get(&TypeId::of::<E>())
            .is_some_and(|slots| slots.iter().any(|s| s.id == id))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
