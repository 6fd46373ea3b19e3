#![forbid(unsafe_code)]

//! Event subscriptions that never keep their owner or their object alive.
//!
//! A [`WeakEvent`] attaches one native handler to a named event and forwards
//! it to a plain function of its owner. The forwarding closure holds the
//! owner and the bound object weakly; it forwards only while both are alive
//! and the optional filter accepts the event.
//!
//! When attached through an [`Endpoint`], the subscription follows the
//! endpoint: every source change moves the native handler to the newly
//! resolved object.
//!
//! # Invariants
//!
//! 1. At most one native subscription is live at a time; attaching always
//!    detaches first.
//! 2. `detach` is idempotent.
//! 3. A forwarded call always finds its owner alive.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use gossamer_core::{
    EventArgs, EventSubscription, MemberAccessor, ObjectRef, Result, TypeDescriptor, Value,
    WeakObject, same_object,
};

use crate::endpoint::{Endpoint, SourceChangedGuard, SourceMode};

/// Function invoked on the owner when the event fires.
pub type Forward<O> = fn(&Rc<O>, &Value, &EventArgs) -> Result<()>;

/// Decides whether a notification is forwarded.
pub type EventFilter = Rc<dyn Fn(&Value, &EventArgs) -> bool>;

struct Config<O> {
    event: Rc<str>,
    forward: Forward<O>,
    filter: Option<EventFilter>,
    /// Silently skip objects whose type does not declare the event.
    optional: bool,
}

impl<O> Clone for Config<O> {
    fn clone(&self) -> Self {
        Self {
            event: Rc::clone(&self.event),
            forward: self.forward,
            filter: self.filter.clone(),
            optional: self.optional,
        }
    }
}

enum Bound {
    Instance(WeakObject),
    Static,
}

struct State<O> {
    config: Option<Config<O>>,
    bound: Option<Bound>,
    native: Option<EventSubscription>,
    tracking: Option<SourceChangedGuard>,
    explicit: bool,
}

struct Inner<O> {
    owner: Weak<O>,
    accessor: Rc<MemberAccessor>,
    state: RefCell<State<O>>,
}

/// A weakly forwarding event subscription owned by `O`.
pub struct WeakEvent<O> {
    inner: Rc<Inner<O>>,
}

impl<O: 'static> WeakEvent<O> {
    #[must_use]
    pub fn new(owner: Weak<O>, accessor: Rc<MemberAccessor>) -> Self {
        Self {
            inner: Rc::new(Inner {
                owner,
                accessor,
                state: RefCell::new(State {
                    config: None,
                    bound: None,
                    native: None,
                    tracking: None,
                    explicit: false,
                }),
            }),
        }
    }

    /// Attach to `event` on `target`. A missing target only records the
    /// configuration.
    pub fn attach(
        &self,
        target: Option<&ObjectRef>,
        event: &str,
        forward: Forward<O>,
        filter: Option<EventFilter>,
    ) -> Result<()> {
        self.detach();
        let config = Config {
            event: Rc::from(event),
            forward,
            filter,
            optional: false,
        };
        self.inner.state.borrow_mut().config = Some(config.clone());
        match target {
            Some(object) => self.inner.hook(object, &config),
            None => Ok(()),
        }
    }

    /// Attach to a type-level event. Stays attached until detached.
    pub fn attach_static(
        &self,
        ty: &Rc<TypeDescriptor>,
        event: &str,
        forward: Forward<O>,
        filter: Option<EventFilter>,
    ) -> Result<()> {
        self.detach();
        self.inner.accessor.resolve_event(ty, event)?;
        let config = Config {
            event: Rc::from(event),
            forward,
            filter,
            optional: false,
        };
        let native = ty
            .static_events()
            .subscribe(event, self.inner.forwarder(None, &config));
        let mut state = self.inner.state.borrow_mut();
        state.config = Some(config);
        state.bound = Some(Bound::Static);
        state.native = Some(native);
        Ok(())
    }

    /// Attach to whatever `endpoint` resolves to in `mode`, and follow it.
    ///
    /// With `optional`, objects whose type does not declare `event` are
    /// skipped instead of failing.
    pub fn attach_endpoint(
        &self,
        endpoint: &Endpoint,
        mode: SourceMode,
        event: &str,
        forward: Forward<O>,
        filter: Option<EventFilter>,
        optional: bool,
    ) -> Result<()> {
        self.detach();
        let config = Config {
            event: Rc::from(event),
            forward,
            filter,
            optional,
        };
        self.inner.state.borrow_mut().config = Some(config.clone());
        if let Some(object) = endpoint.event_target(mode) {
            self.inner.hook(&object, &config)?;
        }

        let weak = Rc::downgrade(&self.inner);
        let tracking = endpoint.on_source_changed(move |change| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            inner.retarget(change.event_target(mode))
        });
        self.inner.state.borrow_mut().tracking = Some(tracking);
        Ok(())
    }

    /// Drop the native subscription and stop following any endpoint.
    pub fn detach(&self) {
        let (native, tracking) = {
            let mut state = self.inner.state.borrow_mut();
            state.bound = None;
            (state.native.take(), state.tracking.take())
        };
        // Dropped outside the borrow; a handler may still be running.
        drop(native);
        drop(tracking);
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.state.borrow().native.is_some()
    }

    /// The object the native handler currently lives on.
    #[must_use]
    pub fn bound(&self) -> Option<ObjectRef> {
        match &self.inner.state.borrow().bound {
            Some(Bound::Instance(weak)) => weak.upgrade(),
            _ => None,
        }
    }

    #[must_use]
    pub fn event(&self) -> Option<Rc<str>> {
        self.inner
            .state
            .borrow()
            .config
            .as_ref()
            .map(|c| Rc::clone(&c.event))
    }

    /// Attached by the caller rather than by a mode convention.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.inner.state.borrow().explicit
    }

    pub fn set_explicit(&self, explicit: bool) {
        self.inner.state.borrow_mut().explicit = explicit;
    }
}

impl<O: 'static> Inner<O> {
    fn hook(&self, object: &ObjectRef, config: &Config<O>) -> Result<()> {
        let desc = object.descriptor();
        if let Err(err) = self.accessor.resolve_event(&desc, &config.event) {
            return if config.optional { Ok(()) } else { Err(err) };
        }
        let Some(hub) = object.events() else {
            return Ok(());
        };
        let native = hub.subscribe(&config.event, self.forwarder(Some(object), config));
        let mut state = self.state.borrow_mut();
        state.bound = Some(Bound::Instance(Rc::downgrade(object)));
        state.native = Some(native);
        Ok(())
    }

    fn forwarder(
        &self,
        object: Option<&ObjectRef>,
        config: &Config<O>,
    ) -> impl Fn(&Value, &EventArgs) -> Result<()> + 'static {
        let owner = self.owner.clone();
        let bound = object.map(Rc::downgrade);
        let forward = config.forward;
        let filter = config.filter.clone();
        move |sender: &Value, args: &EventArgs| {
            let Some(owner) = owner.upgrade() else {
                return Ok(());
            };
            if bound.as_ref().is_some_and(|b| b.strong_count() == 0) {
                return Ok(());
            }
            if filter.as_ref().is_some_and(|f| !f(sender, args)) {
                return Ok(());
            }
            forward(&owner, sender, args)
        }
    }

    /// Move the native handler to `target` unless it is already there.
    fn retarget(&self, target: Option<ObjectRef>) -> Result<()> {
        let (same, config) = {
            let state = self.state.borrow();
            let same = match (&state.bound, &target) {
                (Some(Bound::Instance(weak)), Some(object)) => weak
                    .upgrade()
                    .is_some_and(|current| same_object(&current, object)),
                (None, None) => true,
                _ => false,
            };
            (same, state.config.clone())
        };
        if same {
            return Ok(());
        }
        let old = {
            let mut state = self.state.borrow_mut();
            state.bound = None;
            state.native.take()
        };
        drop(old);
        match (target, config) {
            (Some(object), Some(config)) => self.hook(&object, &config),
            _ => Ok(()),
        }
    }
}

impl<O> fmt::Debug for WeakEvent<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("WeakEvent")
            .field("event", &state.config.as_ref().map(|c| c.event.to_string()))
            .field("attached", &state.native.is_some())
            .field("tracking", &state.tracking.is_some())
            .field("explicit", &state.explicit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossamer_core::{Bindable, DynClass, DynObject, PROPERTY_CHANGED, ValueKind};
    use std::cell::Cell;

    struct Owner {
        hits: Cell<usize>,
    }

    fn count(owner: &Rc<Owner>, _: &Value, _: &EventArgs) -> Result<()> {
        owner.hits.set(owner.hits.get() + 1);
        Ok(())
    }

    fn node() -> Rc<DynClass> {
        DynClass::builder("Node")
            .property("Child", ValueKind::Object)
            .property("Name", ValueKind::Str)
            .build()
    }

    fn obj(o: &Rc<DynObject>) -> ObjectRef {
        o.clone()
    }

    #[test]
    fn forwards_while_owner_alive() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let acc = Rc::new(MemberAccessor::new());
        let event = WeakEvent::new(Rc::downgrade(&owner), acc);
        let a = node().instantiate();
        event
            .attach(Some(&obj(&a)), PROPERTY_CHANGED, count, None)
            .unwrap();

        a.set("Name", "x").unwrap();
        assert_eq!(owner.hits.get(), 1);

        drop(owner);
        // Owner gone: the handler is still registered but forwards nothing.
        a.set("Name", "y").unwrap();
    }

    #[test]
    fn filter_gates_forwarding() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let event = WeakEvent::new(Rc::downgrade(&owner), Rc::new(MemberAccessor::new()));
        let a = node().instantiate();
        let only_name: EventFilter = Rc::new(|_: &Value, args: &EventArgs| args.property_name() == Some("Name"));
        event
            .attach(Some(&obj(&a)), PROPERTY_CHANGED, count, Some(only_name))
            .unwrap();
        a.set("Child", obj(&node().instantiate())).unwrap();
        a.set("Name", "x").unwrap();
        assert_eq!(owner.hits.get(), 1);
    }

    #[test]
    fn attaching_twice_keeps_one_native_handler() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let event = WeakEvent::new(Rc::downgrade(&owner), Rc::new(MemberAccessor::new()));
        let a = node().instantiate();
        event.attach(Some(&obj(&a)), PROPERTY_CHANGED, count, None).unwrap();
        event.attach(Some(&obj(&a)), PROPERTY_CHANGED, count, None).unwrap();
        assert_eq!(a.events().unwrap().handler_count(PROPERTY_CHANGED), 1);

        event.detach();
        event.detach();
        assert!(!event.is_attached());
        assert_eq!(a.events().unwrap().handler_count(PROPERTY_CHANGED), 0);
    }

    #[test]
    fn undeclared_event_is_missing_member() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let event = WeakEvent::new(Rc::downgrade(&owner), Rc::new(MemberAccessor::new()));
        let a = node().instantiate();
        let err = event.attach(Some(&obj(&a)), "Clicked", count, None).unwrap_err();
        assert!(err.is_missing_member());
    }

    #[test]
    fn static_events_need_no_instance() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let event = WeakEvent::new(Rc::downgrade(&owner), Rc::new(MemberAccessor::new()));
        let ty = gossamer_core::TypeDescriptor::builder("Settings")
            .static_event("Reloaded")
            .build();
        event.attach_static(&ty, "Reloaded", count, None).unwrap();
        MemberAccessor::new()
            .raise_static_event(&ty, "Reloaded", &EventArgs::Empty)
            .unwrap();
        assert_eq!(owner.hits.get(), 1);
    }

    #[test]
    fn endpoint_attachment_follows_resolved_source() {
        let owner = Rc::new(Owner { hits: Cell::new(0) });
        let acc = Rc::new(MemberAccessor::new());
        let event = WeakEvent::new(Rc::downgrade(&owner), Rc::clone(&acc));
        let class = node();
        let root = class.instantiate();
        let first = class.instantiate();
        root.set("Child", obj(&first)).unwrap();

        let ep = Endpoint::new(&acc, &obj(&root), Some("Child.Name")).unwrap();
        event
            .attach_endpoint(
                &ep,
                SourceMode::BySourceObject,
                PROPERTY_CHANGED,
                count,
                None,
                false,
            )
            .unwrap();
        assert!(same_object(&event.bound().unwrap(), &obj(&first)));

        let second = class.instantiate();
        root.set("Child", obj(&second)).unwrap();
        assert!(same_object(&event.bound().unwrap(), &obj(&second)));
        // Only the chain segment listens on `root`; nothing is left on `first`.
        assert_eq!(first.events().unwrap().handler_count(PROPERTY_CHANGED), 0);

        second.set("Name", "n").unwrap();
        assert_eq!(owner.hits.get(), 1);
    }
}
