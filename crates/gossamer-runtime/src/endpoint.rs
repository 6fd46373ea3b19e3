#![forbid(unsafe_code)]

//! One side of a binding: an object plus an optional property path.
//!
//! An [`Endpoint`] keeps two weak references: the object it was created
//! with (the *original* source) and the object its path currently resolves
//! to (the *resolved* source). It caches the last value it reported, also
//! weakly, and raises [`SourceChange`] notifications when either moves.
//!
//! Paths containing `.` or `[` are tracked by a live [`PathObservation`], so
//! replacing any intermediate object re-resolves the endpoint synchronously.
//! A plain property name reads straight from the original object. No path
//! at all makes the object itself the endpoint's value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use gossamer_core::{
    BindError, MemberAccessor, ObjectRef, Result, Value, ValueKind, WeakObject, WeakValue,
};

use crate::path::{PathObservation, PropertyPath};

/// Which object an event attached through an endpoint should listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// The object the leaf member is read from.
    #[default]
    BySourceObject,
    /// The leaf member's current value (when it is an object).
    ByResolvedProperty,
}

/// Payload of an endpoint's source-changed notification.
#[derive(Clone)]
pub struct SourceChange {
    pub old_source: Option<ObjectRef>,
    pub new_source: Option<ObjectRef>,
    pub old_value: Value,
    pub new_value: Value,
    /// The resolved source is a different object than before.
    pub identity_changed: bool,
    /// Raised by [`Endpoint::update`] with `force` or by
    /// [`Endpoint::notify_value_changed`].
    pub forced: bool,
}

impl SourceChange {
    /// The object an event attached in `mode` should now listen on.
    #[must_use]
    pub fn event_target(&self, mode: SourceMode) -> Option<ObjectRef> {
        match mode {
            SourceMode::BySourceObject => self.new_source.clone(),
            SourceMode::ByResolvedProperty => self.new_value.as_object().cloned(),
        }
    }
}

impl fmt::Debug for SourceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |o: &Option<ObjectRef>| o.as_ref().map(|o| o.descriptor().name().to_string());
        f.debug_struct("SourceChange")
            .field("old_source", &name(&self.old_source))
            .field("new_source", &name(&self.new_source))
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .field("identity_changed", &self.identity_changed)
            .field("forced", &self.forced)
            .finish()
    }
}

type SourceChangedHandler = dyn Fn(&SourceChange) -> Result<()>;

/// RAII guard for an endpoint's source-changed listener.
#[must_use = "dropping the guard detaches the listener"]
pub struct SourceChangedGuard {
    _handler: Rc<SourceChangedHandler>,
}

impl fmt::Debug for SourceChangedGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceChangedGuard").finish_non_exhaustive()
    }
}

struct EndpointInner {
    accessor: Rc<MemberAccessor>,
    original: RefCell<Option<WeakObject>>,
    path: Option<PropertyPath>,
    chain: Option<PathObservation>,
    /// Declared kind of a simple (chain-less) path.
    kind: Cell<ValueKind>,
    cached_source: RefCell<WeakValue>,
    cached_value: RefCell<WeakValue>,
    listeners: RefCell<Vec<Weak<SourceChangedHandler>>>,
    ready: Cell<bool>,
}

/// Cheaply clonable handle to one side of a binding.
#[derive(Clone)]
pub struct Endpoint {
    inner: Rc<EndpointInner>,
}

impl Endpoint {
    /// Endpoint that observes its path only when it is compound.
    pub fn new(accessor: &Rc<MemberAccessor>, object: &ObjectRef, path: Option<&str>) -> Result<Self> {
        let path = path.map(PropertyPath::parse);
        let observe = path.as_ref().is_some_and(|p| !p.is_simple());
        Self::build(accessor, object, path, observe)
    }

    /// Endpoint that always observes its path, so a replaced leaf value is
    /// reported even for a single property name.
    pub fn observed(
        accessor: &Rc<MemberAccessor>,
        object: &ObjectRef,
        path: Option<&str>,
    ) -> Result<Self> {
        let path = path.map(PropertyPath::parse);
        let observe = path.is_some();
        Self::build(accessor, object, path, observe)
    }

    fn build(
        accessor: &Rc<MemberAccessor>,
        object: &ObjectRef,
        path: Option<PropertyPath>,
        observe: bool,
    ) -> Result<Self> {
        let inner = Rc::new_cyclic(|me: &Weak<EndpointInner>| {
            let chain = path.as_ref().filter(|_| observe).map(|p| {
                let me = me.clone();
                PathObservation::new(
                    accessor,
                    p.clone(),
                    Rc::new(move || -> Result<()> {
                        match me.upgrade() {
                            Some(inner) if inner.ready.get() => Endpoint { inner }.update(false),
                            _ => Ok(()),
                        }
                    }),
                )
            });
            EndpointInner {
                accessor: Rc::clone(accessor),
                original: RefCell::new(Some(Rc::downgrade(object))),
                path,
                chain,
                kind: Cell::new(ValueKind::Any),
                cached_source: RefCell::new(WeakValue::Null),
                cached_value: RefCell::new(WeakValue::Null),
                listeners: RefCell::new(Vec::new()),
                ready: Cell::new(false),
            }
        });
        let endpoint = Self { inner };
        endpoint.resolve(object)?;
        endpoint.inner.ready.set(true);
        Ok(endpoint)
    }

    /// Resolve against `root` and seed the caches without notifying.
    fn resolve(&self, root: &ObjectRef) -> Result<()> {
        if let Some(chain) = &self.inner.chain {
            chain.set_root(Some(Rc::clone(root)))?;
        } else if let Some(name) = self.simple_name() {
            self.inner
                .kind
                .set(self.inner.accessor.property_kind(root, name)?);
        }
        let source = self.resolved_source();
        let value = self.value()?;
        *self.inner.cached_source.borrow_mut() = WeakValue::from_value(&Value::from(source));
        *self.inner.cached_value.borrow_mut() = WeakValue::from_value(&value);
        Ok(())
    }

    fn simple_name(&self) -> Option<&str> {
        self.inner
            .path
            .as_ref()
            .filter(|_| self.inner.chain.is_none())
            .and_then(PropertyPath::leaf_property)
    }

    #[must_use]
    pub fn path(&self) -> Option<&PropertyPath> {
        self.inner.path.as_ref()
    }

    #[must_use]
    pub fn chain(&self) -> Option<&PathObservation> {
        self.inner.chain.as_ref()
    }

    /// Whether the path ends in a plain property (as opposed to an indexer
    /// or no path at all).
    #[must_use]
    pub fn leaf_is_property(&self) -> bool {
        self.inner
            .path
            .as_ref()
            .is_some_and(|p| p.leaf_property().is_some())
    }

    #[must_use]
    pub fn leaf_property(&self) -> Option<&str> {
        self.inner.path.as_ref().and_then(PropertyPath::leaf_property)
    }

    /// The object this endpoint was created with, while it is alive.
    #[must_use]
    pub fn original(&self) -> Option<ObjectRef> {
        self.inner.original.borrow().as_ref().and_then(WeakObject::upgrade)
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.original().is_some()
    }

    /// The object the leaf member is read from.
    #[must_use]
    pub fn resolved_source(&self) -> Option<ObjectRef> {
        match &self.inner.chain {
            Some(chain) => chain.resolved_source(),
            None => self.original(),
        }
    }

    /// Declared kind of the leaf member.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match (&self.inner.chain, &self.inner.path) {
            (Some(chain), _) => chain.leaf_kind(),
            (None, Some(_)) => self.inner.kind.get(),
            (None, None) => ValueKind::Object,
        }
    }

    /// Current value; the declared default when anything on the way is gone.
    pub fn value(&self) -> Result<Value> {
        if let Some(chain) = &self.inner.chain {
            return chain.value();
        }
        let root = self.original();
        match (self.simple_name(), root) {
            (Some(name), Some(root)) => self.inner.accessor.get_member(&root, name),
            (Some(_), None) => Ok(self.inner.kind.get().default_value()),
            (None, root) => Ok(Value::from(root)),
        }
    }

    /// Write the leaf member. Dropped when the source is gone.
    pub fn set_value(&self, value: Value) -> Result<()> {
        if let Some(chain) = &self.inner.chain {
            return chain.set_value(value);
        }
        match (self.simple_name(), self.original()) {
            (Some(name), Some(root)) => self.inner.accessor.set_member(&root, name, value),
            (Some(_), None) => Ok(()),
            (None, _) => Err(BindError::NotSupported(
                "an endpoint without a property path cannot be written".into(),
            )),
        }
    }

    /// The object an event attached in `mode` listens on.
    #[must_use]
    pub fn event_target(&self, mode: SourceMode) -> Option<ObjectRef> {
        match mode {
            SourceMode::BySourceObject => self.resolved_source(),
            SourceMode::ByResolvedProperty => {
                self.value().ok().and_then(|v| v.as_object().cloned())
            }
        }
    }

    /// Re-read source and value, and raise source-changed if either moved
    /// (or unconditionally with `force`). Values compare by equality.
    pub fn update(&self, force: bool) -> Result<()> {
        let new_source = self.resolved_source();
        let new_value = self.value()?;
        let source_as_value = Value::from(new_source.clone());

        let identity_changed = !self.inner.cached_source.borrow().matches(&source_as_value);
        let value_changed = !self.inner.cached_value.borrow().matches(&new_value);
        if !(identity_changed || value_changed || force) {
            return Ok(());
        }

        let old_source = self
            .inner
            .cached_source
            .replace(WeakValue::from_value(&source_as_value))
            .upgrade()
            .and_then(|v| v.as_object().cloned());
        let old_value = self
            .inner
            .cached_value
            .replace(WeakValue::from_value(&new_value))
            .upgrade()
            .unwrap_or_default();

        self.raise(&SourceChange {
            old_source,
            new_source,
            old_value,
            new_value,
            identity_changed,
            forced: force,
        })
    }

    /// Raise source-changed with a null old value, seeding listeners with the
    /// current state.
    pub fn notify_value_changed(&self) -> Result<()> {
        let new_source = self.resolved_source();
        let new_value = self.value()?;
        *self.inner.cached_source.borrow_mut() =
            WeakValue::from_value(&Value::from(new_source.clone()));
        *self.inner.cached_value.borrow_mut() = WeakValue::from_value(&new_value);
        self.raise(&SourceChange {
            old_source: None,
            new_source,
            old_value: Value::Null,
            new_value,
            identity_changed: true,
            forced: true,
        })
    }

    /// Listen for source changes for as long as the guard lives.
    pub fn on_source_changed(
        &self,
        handler: impl Fn(&SourceChange) -> Result<()> + 'static,
    ) -> SourceChangedGuard {
        let handler: Rc<SourceChangedHandler> = Rc::new(handler);
        self.inner.listeners.borrow_mut().push(Rc::downgrade(&handler));
        SourceChangedGuard { _handler: handler }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }

    fn raise(&self, change: &SourceChange) -> Result<()> {
        let live: Vec<Rc<SourceChangedHandler>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        let result = live.iter().try_for_each(|handler| handler(change));
        self.inner
            .listeners
            .borrow_mut()
            .retain(|l| l.strong_count() > 0);
        result
    }

    /// Detach the path chain and forget every object. Terminal.
    pub fn clear(&self) {
        if let Some(chain) = &self.inner.chain {
            chain.detach();
        }
        self.inner.ready.set(false);
        *self.inner.original.borrow_mut() = None;
        *self.inner.cached_source.borrow_mut() = WeakValue::Null;
        *self.inner.cached_value.borrow_mut() = WeakValue::Null;
        self.inner.listeners.borrow_mut().clear();
    }

    /// Same underlying endpoint.
    #[must_use]
    pub fn ptr_eq(&self, other: &Endpoint) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.inner.path.as_ref().map(ToString::to_string))
            .field("alive", &self.is_alive())
            .field("observed", &self.inner.chain.is_some())
            .field("kind", &self.kind())
            .finish()
    }
}
