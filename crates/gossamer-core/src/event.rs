#![forbid(unsafe_code)]

//! Named events with weakly held handlers.
//!
//! An [`EventHub`] is the backing store for the events an object raises. The
//! hub never owns a handler: it keeps a `Weak` pointer, and the subscriber
//! holds the strong side inside an [`EventSubscription`]. Dropping the
//! subscription is the only way to unsubscribe, and it cannot leak.
//!
//! # Invariants
//!
//! 1. Handlers run in registration order.
//! 2. A handler whose subscription was dropped never runs again.
//! 3. Handlers may subscribe or drop subscriptions while an event is being
//!    raised; the change takes effect for the next raise.
//! 4. The first handler error stops the raise and is returned to the raiser.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::value::Value;

/// Event raised by objects with observable properties.
pub const PROPERTY_CHANGED: &str = "PropertyChanged";

/// Event raised by observable collections.
pub const COLLECTION_CHANGED: &str = "CollectionChanged";

/// Event raised by commands when their executability may have changed.
pub const CAN_EXECUTE_CHANGED: &str = "CanExecuteChanged";

/// Property name carried by `PropertyChanged` when indexed content changed.
pub const INDEXER_NAME: &str = "Item[]";

/// Signature of an event handler: `(sender, args)`.
pub type EventHandler = dyn Fn(&Value, &EventArgs) -> Result<()>;

/// Payload delivered with an event.
#[derive(Clone, Debug)]
pub enum EventArgs {
    Empty,
    PropertyChanged { name: Rc<str> },
    CollectionChanged(CollectionChange),
    Value(Value),
}

impl EventArgs {
    #[must_use]
    pub fn property_changed(name: &str) -> Self {
        Self::PropertyChanged {
            name: Rc::from(name),
        }
    }

    /// The property name for `PropertyChanged` payloads.
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        match self {
            Self::PropertyChanged { name } => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn collection_change(&self) -> Option<&CollectionChange> {
        match self {
            Self::CollectionChanged(change) => Some(change),
            _ => None,
        }
    }
}

/// A single mutation of an observable collection.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionChange {
    Add { index: usize, items: Vec<Value> },
    Remove { index: usize, items: Vec<Value> },
    Replace {
        index: usize,
        old: Vec<Value>,
        new: Vec<Value>,
    },
    Reset,
}

impl CollectionChange {
    /// Whether the item observed at `index` may be different after this
    /// change. Inserts and removals shift every later position.
    #[must_use]
    pub fn touches_index(&self, index: usize) -> bool {
        match self {
            Self::Add { index: at, .. } | Self::Remove { index: at, .. } => index >= *at,
            Self::Replace { index: at, new, .. } => index >= *at && index < at + new.len().max(1),
            Self::Reset => true,
        }
    }
}

struct Slot {
    event: Rc<str>,
    handler: Weak<EventHandler>,
}

/// Storage for an object's events.
#[derive(Default)]
pub struct EventHub {
    slots: RefCell<Vec<Slot>>,
    raising: Cell<u32>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. The handler lives as long as the
    /// returned guard.
    #[must_use = "dropping the subscription detaches the handler"]
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&Value, &EventArgs) -> Result<()> + 'static,
    ) -> EventSubscription {
        let handler: Rc<EventHandler> = Rc::new(handler);
        let event: Rc<str> = Rc::from(event);
        self.slots.borrow_mut().push(Slot {
            event: Rc::clone(&event),
            handler: Rc::downgrade(&handler),
        });
        EventSubscription {
            event,
            _handler: handler,
        }
    }

    /// Invoke every live handler of `event`. Raising an event nobody listens
    /// to is a no-op.
    pub fn raise(&self, sender: &Value, event: &str, args: &EventArgs) -> Result<()> {
        let live: Vec<Rc<EventHandler>> = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| &*slot.event == event)
            .filter_map(|slot| slot.handler.upgrade())
            .collect();

        self.raising.set(self.raising.get() + 1);
        let result = live.iter().try_for_each(|handler| handler(sender, args));
        self.raising.set(self.raising.get() - 1);

        if self.raising.get() == 0 {
            self.prune();
        }
        result
    }

    /// Number of live handlers for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| &*slot.event == event && slot.handler.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn has_handlers(&self, event: &str) -> bool {
        self.handler_count(event) > 0
    }

    /// Drop slots whose subscription guard is gone.
    pub fn prune(&self) {
        self.slots
            .borrow_mut()
            .retain(|slot| slot.handler.strong_count() > 0);
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("slots", &self.slots.borrow().len())
            .finish()
    }
}

/// RAII guard owning an event handler.
#[must_use = "dropping the subscription detaches the handler"]
pub struct EventSubscription {
    event: Rc<str>,
    _handler: Rc<EventHandler>,
}

impl EventSubscription {
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("event", &self.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;

    #[test]
    fn raise_reaches_live_handlers_in_order() {
        let hub = EventHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _a = hub.subscribe("Changed", move |_, _| {
            l1.borrow_mut().push(1);
            Ok(())
        });
        let l2 = Rc::clone(&log);
        let _b = hub.subscribe("Changed", move |_, _| {
            l2.borrow_mut().push(2);
            Ok(())
        });

        hub.raise(&Value::Null, "Changed", &EventArgs::Empty).unwrap();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn dropped_subscription_never_fires() {
        let hub = EventHub::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = hub.subscribe("Changed", move |_, _| {
            h.set(h.get() + 1);
            Ok(())
        });
        assert_eq!(hub.handler_count("Changed"), 1);

        drop(sub);
        assert_eq!(hub.handler_count("Changed"), 0);
        hub.raise(&Value::Null, "Changed", &EventArgs::Empty).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn raise_without_handlers_is_noop() {
        let hub = EventHub::new();
        assert!(hub.raise(&Value::Null, "Nobody", &EventArgs::Empty).is_ok());
    }

    #[test]
    fn handler_error_stops_raise() {
        let hub = EventHub::new();
        let reached = Rc::new(Cell::new(false));
        let _a = hub.subscribe("E", |_, _| Err(BindError::ArgumentNull("x")));
        let r = Rc::clone(&reached);
        let _b = hub.subscribe("E", move |_, _| {
            r.set(true);
            Ok(())
        });

        let err = hub.raise(&Value::Null, "E", &EventArgs::Empty).unwrap_err();
        assert_eq!(err, BindError::ArgumentNull("x"));
        assert!(!reached.get());
    }

    #[test]
    fn touches_index_follows_shifts() {
        let add = CollectionChange::Add {
            index: 1,
            items: vec![Value::Int(5)],
        };
        assert!(!add.touches_index(0));
        assert!(add.touches_index(1));
        assert!(add.touches_index(4));

        let replace = CollectionChange::Replace {
            index: 2,
            old: vec![Value::Int(1)],
            new: vec![Value::Int(2)],
        };
        assert!(replace.touches_index(2));
        assert!(!replace.touches_index(3));
        assert!(CollectionChange::Reset.touches_index(99));
    }
}
