#![forbid(unsafe_code)]

//! Bindings: two endpoints kept in sync by a mode-driven state machine.
//!
//! A [`Binding`] owns a target and a source [`Endpoint`] and two
//! [`WeakEvent`]s. Which events get attached is decided by the *conventions*
//! of its kind and mode; every propagation goes through one update routine
//! that reads, converts and writes under a re-entrancy guard.
//!
//! # Lifecycle
//!
//! ```text
//! Inactive --initialize/activate--> Active --deactivate--> Inactive
//!     \                               |
//!      \------------ clear ------------+--> Cleared (terminal)
//! ```
//!
//! # Invariants
//!
//! 1. No propagation happens unless the binding is `Active`.
//! 2. A write made by the binding never re-enters the same binding.
//! 3. When the target object is gone, the next delivery clears the binding.
//! 4. Change callbacks fire only when the destination value actually changed.
//! 5. Dropping the last [`Binding`] handle detaches every subscription.

mod collection;
mod command;
mod method;
mod notify;

pub use collection::CollectionBinding;
pub use command::CommandBinding;
pub use method::MethodBinding;
pub use notify::NotifyBinding;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use gossamer_core::{
    BindError, COLLECTION_CHANGED, CAN_EXECUTE_CHANGED, EventArgs, MemberAccessor, ObjectRef,
    PROPERTY_CHANGED, Result, TypeDescriptor, Value,
};

use crate::config::BindingConfig;
use crate::convert::{Flow, PropertyGetter, PropertySetter, ValueConverter};
use crate::endpoint::{Endpoint, SourceChange, SourceChangedGuard, SourceMode};
use crate::weak_event::{EventFilter, Forward, WeakEvent};

use self::collection::CollectionState;
use self::command::CommandState;
use self::method::MethodState;
use self::notify::NotifyState;

bitflags::bitflags! {
    /// Allowed propagation directions. `TWO_WAY` is `ONE_WAY | ONE_WAY_TO_SOURCE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindMode: u8 {
        /// Source to target.
        const ONE_WAY = 1;
        /// Target to source.
        const ONE_WAY_TO_SOURCE = 1 << 1;
        const TWO_WAY = Self::ONE_WAY.bits() | Self::ONE_WAY_TO_SOURCE.bits();
        /// Source to target until the first non-default write.
        const ONE_TIME = 1 << 2;
    }
}

impl BindMode {
    /// Whether source changes flow into the target.
    #[must_use]
    pub fn pushes_to_target(self) -> bool {
        self.intersects(Self::ONE_WAY | Self::ONE_TIME)
    }

    /// Whether target changes flow back into the source.
    #[must_use]
    pub fn pulls_to_source(self) -> bool {
        self.contains(Self::ONE_WAY_TO_SOURCE)
    }

    /// Direction of a refresh: `Some(true)` for source to target.
    #[must_use]
    pub fn primary_direction(self) -> Option<bool> {
        if self.pushes_to_target() {
            Some(true)
        } else if self.pulls_to_source() {
            Some(false)
        } else {
            None
        }
    }
}

impl Default for BindMode {
    fn default() -> Self {
        Self::ONE_WAY
    }
}

/// Lifecycle state of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Inactive,
    Active,
    Cleared,
}

static BINDING_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        Self(BINDING_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The concrete behavior of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Property,
    Collection,
    Command,
    Method,
    Notify,
}

/// Payload of a target- or source-changed callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub binding: BindingId,
    pub old: Value,
    pub new: Value,
}

/// Callback run after a binding changed one of its endpoints.
pub type ChangeHandler = dyn Fn(&ChangeNotice);

/// Storage for a change callback, owned or borrowed weakly.
#[derive(Clone)]
pub enum HandlerSlot {
    Strong(Rc<ChangeHandler>),
    /// Skipped once the caller drops its `Rc`.
    Weak(Weak<ChangeHandler>),
}

impl HandlerSlot {
    #[must_use]
    pub fn handler(&self) -> Option<Rc<ChangeHandler>> {
        match self {
            Self::Strong(handler) => Some(Rc::clone(handler)),
            Self::Weak(handler) => handler.upgrade(),
        }
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong(_) => f.write_str("HandlerSlot::Strong"),
            Self::Weak(w) => write!(f, "HandlerSlot::Weak(alive: {})", w.strong_count() > 0),
        }
    }
}

/// Holds a flag for the duration of an update.
struct UpdateGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> UpdateGuard<'a> {
    /// `None` when the flag is already held.
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Target,
    Source,
}

/// An event attached by the caller instead of by convention.
#[derive(Clone)]
enum Attachment {
    Endpoint {
        event: Rc<str>,
        filter: Option<EventFilter>,
    },
    Static {
        ty: Rc<TypeDescriptor>,
        event: Rc<str>,
        filter: Option<EventFilter>,
    },
}

pub(crate) enum KindState {
    Property,
    Collection(Rc<CollectionState>),
    Command(Rc<CommandState>),
    Method(Rc<MethodState>),
    Notify(Rc<NotifyState>),
}

impl KindState {
    pub(crate) fn for_kind(kind: BindingKind) -> Self {
        match kind {
            BindingKind::Property => Self::Property,
            BindingKind::Collection => Self::Collection(Rc::new(CollectionState::default())),
            BindingKind::Command => Self::Command(Rc::new(CommandState::default())),
            BindingKind::Method => Self::Method(Rc::new(MethodState::default())),
            BindingKind::Notify => Self::Notify(Rc::new(NotifyState::default())),
        }
    }

    fn kind(&self) -> BindingKind {
        match self {
            Self::Property => BindingKind::Property,
            Self::Collection(_) => BindingKind::Collection,
            Self::Command(_) => BindingKind::Command,
            Self::Method(_) => BindingKind::Method,
            Self::Notify(_) => BindingKind::Notify,
        }
    }

    /// Collection and command sources follow replaced leaf values.
    fn observes_source(&self) -> bool {
        matches!(self, Self::Collection(_) | Self::Command(_))
    }

    /// Which object an explicitly attached event listens on.
    fn explicit_mode(&self) -> SourceMode {
        match self {
            Self::Property => SourceMode::BySourceObject,
            _ => SourceMode::ByResolvedProperty,
        }
    }
}

fn source_event_fired(core: &Rc<BindingCore>, _sender: &Value, args: &EventArgs) -> Result<()> {
    core.on_source_event(args)
}

fn target_event_fired(core: &Rc<BindingCore>, _sender: &Value, args: &EventArgs) -> Result<()> {
    core.on_target_event(args)
}

fn forward_for(side: Side) -> Forward<BindingCore> {
    match side {
        Side::Target => target_event_fired,
        Side::Source => source_event_fired,
    }
}

/// Forward only `PropertyChanged` notifications for `name`.
fn property_filter(name: &str) -> EventFilter {
    let name: Rc<str> = Rc::from(name);
    Rc::new(move |_: &Value, args: &EventArgs| args.property_name() == Some(&*name))
}

/// The object methods and explicit events of `endpoint` are aimed at: its
/// value when that is an object, otherwise the object the value lives on.
pub(crate) fn endpoint_host(endpoint: &Endpoint) -> Option<ObjectRef> {
    endpoint
        .event_target(SourceMode::ByResolvedProperty)
        .or_else(|| endpoint.resolved_source())
}

pub(crate) struct BindingCore {
    id: BindingId,
    me: Weak<BindingCore>,
    accessor: Rc<MemberAccessor>,
    config: Rc<BindingConfig>,
    target: RefCell<Endpoint>,
    source: RefCell<Endpoint>,
    target_event: WeakEvent<BindingCore>,
    source_event: WeakEvent<BindingCore>,
    target_attachment: RefCell<Option<Attachment>>,
    source_attachment: RefCell<Option<Attachment>>,
    tracking: RefCell<Vec<SourceChangedGuard>>,
    mode: Cell<BindMode>,
    state: Cell<BindingState>,
    initialized: Cell<bool>,
    updating: Cell<bool>,
    converter: RefCell<Option<Rc<dyn ValueConverter>>>,
    parameter: RefCell<Value>,
    target_getter: RefCell<Option<PropertyGetter>>,
    target_setter: RefCell<Option<PropertySetter>>,
    source_getter: RefCell<Option<PropertyGetter>>,
    source_setter: RefCell<Option<PropertySetter>>,
    target_changed: RefCell<Option<HandlerSlot>>,
    source_changed: RefCell<Option<HandlerSlot>>,
    kind: KindState,
}

fn build_endpoints(
    accessor: &Rc<MemberAccessor>,
    kind: &KindState,
    target: &ObjectRef,
    target_path: Option<&str>,
    source: &ObjectRef,
    source_path: Option<&str>,
) -> Result<(Endpoint, Endpoint)> {
    let target = Endpoint::new(accessor, target, target_path)?;
    let source = if kind.observes_source() {
        Endpoint::observed(accessor, source, source_path)?
    } else {
        Endpoint::new(accessor, source, source_path)?
    };
    Ok((target, source))
}

impl BindingCore {
    fn target(&self) -> Endpoint {
        self.target.borrow().clone()
    }

    fn source(&self) -> Endpoint {
        self.source.borrow().clone()
    }

    fn endpoint(&self, side: Side) -> Endpoint {
        match side {
            Side::Target => self.target(),
            Side::Source => self.source(),
        }
    }

    fn event(&self, side: Side) -> &WeakEvent<BindingCore> {
        match side {
            Side::Target => &self.target_event,
            Side::Source => &self.source_event,
        }
    }

    fn attachment(&self, side: Side) -> &RefCell<Option<Attachment>> {
        match side {
            Side::Target => &self.target_attachment,
            Side::Source => &self.source_attachment,
        }
    }

    fn parameter(&self) -> Value {
        self.parameter.borrow().clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state.get() == BindingState::Cleared {
            Err(BindError::Cleared)
        } else {
            Ok(())
        }
    }

    /// Follow both endpoints' source changes.
    fn track(&self) {
        let guards = [Side::Target, Side::Source]
            .into_iter()
            .map(|side| {
                let weak = self.me.clone();
                self.endpoint(side).on_source_changed(move |change: &SourceChange| {
                    match weak.upgrade() {
                        Some(core) => core.on_endpoint_changed(side, change),
                        None => Ok(()),
                    }
                })
            })
            .collect();
        *self.tracking.borrow_mut() = guards;
    }

    // --- conventions -----------------------------------------------------

    fn do_conventions(&self) -> Result<()> {
        let mode = self.mode.get();
        match &self.kind {
            KindState::Property => {
                let source = self.source();
                let target = self.target();
                let source_leaf = source.leaf_property().filter(|_| mode.pushes_to_target());
                let target_leaf = target.leaf_property().filter(|_| mode.pulls_to_source());
                self.convention(
                    Side::Source,
                    source_leaf.map(|leaf| {
                        (SourceMode::BySourceObject, PROPERTY_CHANGED, Some(property_filter(leaf)))
                    }),
                )?;
                self.convention(
                    Side::Target,
                    target_leaf.map(|leaf| {
                        (SourceMode::BySourceObject, PROPERTY_CHANGED, Some(property_filter(leaf)))
                    }),
                )
            }
            KindState::Collection(_) => {
                self.convention(
                    Side::Source,
                    Some((SourceMode::ByResolvedProperty, COLLECTION_CHANGED, None)),
                )?;
                self.convention(Side::Target, None)
            }
            KindState::Command(_) => {
                self.convention(
                    Side::Source,
                    Some((SourceMode::ByResolvedProperty, CAN_EXECUTE_CHANGED, None)),
                )?;
                self.convention(Side::Target, None)
            }
            KindState::Method(_) | KindState::Notify(_) => {
                self.convention(Side::Source, None)?;
                self.convention(Side::Target, None)
            }
        }
    }

    /// Attach (or detach) the conventional event for `side`, unless the
    /// caller attached one explicitly.
    fn convention(
        &self,
        side: Side,
        wiring: Option<(SourceMode, &str, Option<EventFilter>)>,
    ) -> Result<()> {
        let event = self.event(side);
        if event.is_explicit() {
            return Ok(());
        }
        match wiring {
            Some((mode, name, filter)) => event.attach_endpoint(
                &self.endpoint(side),
                mode,
                name,
                forward_for(side),
                filter,
                true,
            ),
            None => {
                event.detach();
                Ok(())
            }
        }
    }

    fn apply_attachment(&self, side: Side, attachment: &Attachment) -> Result<()> {
        let event = self.event(side);
        match attachment {
            Attachment::Endpoint { event: name, filter } => event.attach_endpoint(
                &self.endpoint(side),
                self.kind.explicit_mode(),
                name,
                forward_for(side),
                filter.clone(),
                false,
            )?,
            Attachment::Static {
                ty,
                event: name,
                filter,
            } => event.attach_static(ty, name, forward_for(side), filter.clone())?,
        }
        event.set_explicit(true);
        Ok(())
    }

    fn attach_explicit(&self, side: Side, attachment: Attachment) -> Result<()> {
        self.ensure_live()?;
        self.apply_attachment(side, &attachment)?;
        *self.attachment(side).borrow_mut() = Some(attachment);
        Ok(())
    }

    fn detach_explicit(&self, side: Side) -> Result<()> {
        self.ensure_live()?;
        self.attachment(side).borrow_mut().take();
        let event = self.event(side);
        event.detach();
        event.set_explicit(false);
        if self.initialized.get() {
            self.do_conventions()?;
        }
        Ok(())
    }

    // --- lifecycle -------------------------------------------------------

    fn initialize(&self) -> Result<()> {
        self.ensure_live()?;
        self.initialized.set(true);
        self.do_conventions()?;
        if self.config.activate_on_initialize {
            self.activate(true)?;
        }
        Ok(())
    }

    fn activate(&self, refresh: bool) -> Result<()> {
        self.ensure_live()?;
        if self.state.replace(BindingState::Active) != BindingState::Active {
            tracing::debug!(binding = self.id.get(), kind = ?self.kind.kind(), "binding activated");
        }
        if refresh { self.refresh() } else { Ok(()) }
    }

    fn deactivate(&self) {
        if self.state.get() == BindingState::Active {
            self.state.set(BindingState::Inactive);
            tracing::debug!(binding = self.id.get(), "binding deactivated");
        }
    }

    fn clear(&self) {
        if self.state.replace(BindingState::Cleared) == BindingState::Cleared {
            return;
        }
        self.target_event.detach();
        self.source_event.detach();
        let tracking = std::mem::take(&mut *self.tracking.borrow_mut());
        drop(tracking);
        self.target().clear();
        self.source().clear();
        if let KindState::Command(state) = &self.kind {
            state.release();
        }
        tracing::debug!(binding = self.id.get(), "binding cleared");
    }

    /// Called after every fluent configuration call.
    fn configured(&self) -> Result<()> {
        if self.state.get() == BindingState::Active && self.config.refresh_on_configure {
            self.refresh()
        } else {
            Ok(())
        }
    }

    fn refresh(&self) -> Result<()> {
        match &self.kind {
            KindState::Property => match self.mode.get().primary_direction() {
                Some(source_to_target) => self.update(source_to_target),
                None => Ok(()),
            },
            KindState::Collection(_) | KindState::Command(_) => self.update(true),
            KindState::Method(_) | KindState::Notify(_) => Ok(()),
        }
    }

    fn set_mode(&self, mode: BindMode) -> Result<()> {
        self.ensure_live()?;
        if matches!(self.kind, KindState::Notify(_)) {
            return Ok(());
        }
        self.mode.set(mode);
        if self.initialized.get() {
            self.do_conventions()?;
        }
        self.configured()
    }

    fn rebind(&self, target: Endpoint, source: Endpoint) -> Result<()> {
        self.target_event.detach();
        self.source_event.detach();
        self.tracking.borrow_mut().clear();
        let old_target = self.target.replace(target);
        let old_source = self.source.replace(source);
        old_target.clear();
        old_source.clear();
        self.track();

        for side in [Side::Target, Side::Source] {
            let attachment = self.attachment(side).borrow().clone();
            if let Some(attachment) = attachment {
                self.apply_attachment(side, &attachment)?;
            }
        }
        if self.initialized.get() {
            self.do_conventions()?;
        }
        tracing::debug!(binding = self.id.get(), "binding endpoints updated");
        self.configured()
    }

    // --- propagation -----------------------------------------------------

    /// Run `f` with both endpoints when the binding may propagate.
    fn guarded(
        &self,
        source_to_target: bool,
        f: impl FnOnce(&Endpoint, &Endpoint) -> Result<()>,
    ) -> Result<()> {
        self.deliver(source_to_target, true, f)
    }

    /// Run `f` against live endpoints. With `exclusive`, a delivery that
    /// arrives while another one is running is dropped.
    fn deliver(
        &self,
        source_to_target: bool,
        exclusive: bool,
        f: impl FnOnce(&Endpoint, &Endpoint) -> Result<()>,
    ) -> Result<()> {
        if self.state.get() != BindingState::Active {
            return Ok(());
        }
        let target = self.target();
        if !target.is_alive() {
            tracing::debug!(binding = self.id.get(), "target dropped, clearing binding");
            self.clear();
            return Ok(());
        }
        let source = self.source();
        if source_to_target && !source.is_alive() {
            return Ok(());
        }
        let _guard = if exclusive {
            match UpdateGuard::enter(&self.updating) {
                Some(guard) => Some(guard),
                None => return Ok(()),
            }
        } else {
            None
        };
        let _span = tracing::debug_span!(
            "binding_update",
            binding = self.id.get(),
            source_to_target
        )
        .entered();
        f(&source, &target)
    }

    fn update(&self, source_to_target: bool) -> Result<()> {
        // Execute writes nothing through the binding, so the command may
        // notify (or change a watched property) while it runs.
        if let KindState::Command(state) = &self.kind {
            if !source_to_target {
                return self.deliver(false, false, |source, _| state.execute(self, source));
            }
        }
        self.guarded(source_to_target, |source, target| match &self.kind {
            KindState::Property => self.transfer(source, target, source_to_target),
            KindState::Collection(state) if source_to_target => {
                state.regenerate(self, source, target)
            }
            KindState::Collection(_) => Ok(()),
            KindState::Command(state) if source_to_target => {
                state.sync_enabled(self, source, target)
            }
            KindState::Command(state) => state.execute(self, source),
            KindState::Method(state) => state.invoke(self, source, target, source_to_target),
            KindState::Notify(state) => state.relay(self, source, target, source_to_target),
        })
    }

    /// Read, convert and write one direction of a property binding.
    fn transfer(&self, source: &Endpoint, target: &Endpoint, source_to_target: bool) -> Result<()> {
        let (from, to) = if source_to_target {
            (source, target)
        } else {
            (target, source)
        };
        let getter = if source_to_target {
            self.source_getter.borrow().clone()
        } else {
            self.target_getter.borrow().clone()
        };
        let read = match getter {
            Some(get) => get(from)?,
            None => Flow::Set(from.value()?),
        };
        let Flow::Set(value) = read else {
            return Ok(());
        };

        let converter = self.converter.borrow().clone();
        let value = match converter {
            Some(converter) => {
                let parameter = self.parameter();
                let culture = &self.config.culture;
                let flow = if source_to_target {
                    converter.convert(&value, to.kind(), &parameter, culture)?
                } else {
                    converter.convert_back(&value, to.kind(), &parameter, culture)?
                };
                match flow {
                    Flow::Set(value) => value,
                    Flow::DoNothing => return Ok(()),
                }
            }
            None => value,
        };

        let old = to.value()?;
        let setter = if source_to_target {
            self.target_setter.borrow().clone()
        } else {
            self.source_setter.borrow().clone()
        };
        match setter {
            Some(set) => set(to, value)?,
            None => to.set_value(value.convert_to(to.kind())?)?,
        }
        let new = to.value()?;
        tracing::trace!(binding = self.id.get(), source_to_target, value = %new, "propagated");

        let written_default = new.is_default();
        if old != new {
            let side = if source_to_target { Side::Target } else { Side::Source };
            self.notify_changed(side, old, new);
        }
        if source_to_target && self.mode.get().contains(BindMode::ONE_TIME) && !written_default {
            self.deactivate();
        }
        Ok(())
    }

    /// Run the changed callback for `side`.
    fn notify_changed(&self, side: Side, old: Value, new: Value) {
        let slot = match side {
            Side::Target => self.target_changed.borrow().clone(),
            Side::Source => self.source_changed.borrow().clone(),
        };
        if let Some(handler) = slot.as_ref().and_then(HandlerSlot::handler) {
            handler(&ChangeNotice {
                binding: self.id,
                old,
                new,
            });
        }
    }

    fn on_source_event(&self, args: &EventArgs) -> Result<()> {
        match &self.kind {
            KindState::Property if !self.mode.get().pushes_to_target() => Ok(()),
            KindState::Collection(state) => match args.collection_change() {
                Some(change) => self.guarded(true, |source, target| {
                    state.apply(self, change, source, target)
                }),
                None => self.update(true),
            },
            _ => self.update(true),
        }
    }

    fn on_target_event(&self, _args: &EventArgs) -> Result<()> {
        match &self.kind {
            KindState::Property if !self.mode.get().pulls_to_source() => Ok(()),
            KindState::Collection(_) => Ok(()),
            _ => self.update(false),
        }
    }

    fn on_endpoint_changed(&self, side: Side, change: &SourceChange) -> Result<()> {
        match &self.kind {
            KindState::Property => {
                // Plain-property leaves are already covered by the
                // conventional PropertyChanged subscription.
                let relevant = change.identity_changed
                    || change.forced
                    || !self.endpoint(side).leaf_is_property();
                if !relevant {
                    return Ok(());
                }
                match self.mode.get().primary_direction() {
                    Some(source_to_target) => self.update(source_to_target),
                    None => Ok(()),
                }
            }
            KindState::Collection(_) | KindState::Command(_) => self.update(true),
            KindState::Method(_) | KindState::Notify(_) => Ok(()),
        }
    }
}

/// A live binding. Dropping the last handle detaches everything it attached.
#[derive(Clone)]
pub struct Binding {
    core: Rc<BindingCore>,
}

impl Binding {
    /// Build an uninitialized binding of `kind`.
    pub(crate) fn build(
        accessor: &Rc<MemberAccessor>,
        config: &Rc<BindingConfig>,
        kind: KindState,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<Self> {
        let (target, source) =
            build_endpoints(accessor, &kind, target, target_path, source, source_path)?;
        let mode = match kind {
            KindState::Notify(_) => BindMode::TWO_WAY,
            _ => config.default_mode,
        };
        let core = Rc::new_cyclic(|me: &Weak<BindingCore>| BindingCore {
            id: BindingId::next(),
            me: me.clone(),
            accessor: Rc::clone(accessor),
            config: Rc::clone(config),
            target: RefCell::new(target),
            source: RefCell::new(source),
            target_event: WeakEvent::new(me.clone(), Rc::clone(accessor)),
            source_event: WeakEvent::new(me.clone(), Rc::clone(accessor)),
            target_attachment: RefCell::new(None),
            source_attachment: RefCell::new(None),
            tracking: RefCell::new(Vec::new()),
            mode: Cell::new(mode),
            state: Cell::new(BindingState::Inactive),
            initialized: Cell::new(false),
            updating: Cell::new(false),
            converter: RefCell::new(None),
            parameter: RefCell::new(Value::Null),
            target_getter: RefCell::new(None),
            target_setter: RefCell::new(None),
            source_getter: RefCell::new(None),
            source_setter: RefCell::new(None),
            target_changed: RefCell::new(None),
            source_changed: RefCell::new(None),
            kind,
        });
        core.track();
        Ok(Self { core })
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.core.id
    }

    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.core.kind.kind()
    }

    #[must_use]
    pub fn state(&self) -> BindingState {
        self.core.state.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == BindingState::Active
    }

    #[must_use]
    pub fn mode(&self) -> BindMode {
        self.core.mode.get()
    }

    #[must_use]
    pub fn target(&self) -> Endpoint {
        self.core.target()
    }

    #[must_use]
    pub fn source(&self) -> Endpoint {
        self.core.source()
    }

    #[must_use]
    pub fn parameter(&self) -> Value {
        self.core.parameter()
    }

    /// Whether the target event was attached by the caller.
    #[must_use]
    pub fn target_event_is_explicit(&self) -> bool {
        self.core.target_event.is_explicit()
    }

    /// Whether a native subscription currently feeds target events.
    #[must_use]
    pub fn target_event_attached(&self) -> bool {
        self.core.target_event.is_attached()
    }

    /// Whether a native subscription currently feeds source events.
    #[must_use]
    pub fn source_event_attached(&self) -> bool {
        self.core.source_event.is_attached()
    }

    /// Run the conventions for the current mode and, unless configured
    /// otherwise, activate with a refresh.
    pub fn initialize(&self) -> Result<&Self> {
        self.core.initialize()?;
        Ok(self)
    }

    /// Resume propagation, optionally pushing the current state first.
    pub fn activate(&self, refresh: bool) -> Result<()> {
        self.core.activate(refresh)
    }

    /// Suspend propagation. Endpoints and subscriptions stay in place.
    pub fn deactivate(&self) {
        self.core.deactivate();
    }

    /// Detach everything. Terminal and idempotent.
    pub fn clear(&self) {
        self.core.clear();
    }

    /// Push the current value in the mode's primary direction.
    pub fn refresh(&self) -> Result<()> {
        self.core.refresh()
    }

    /// Propagate once in the given direction.
    pub fn update(&self, source_to_target: bool) -> Result<()> {
        self.core.update(source_to_target)
    }

    /// Rebind in place onto new paths and a new source object. The target
    /// object is kept.
    pub fn update_endpoints(
        &self,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<()> {
        self.core.ensure_live()?;
        let Some(target) = self.core.target().original() else {
            self.core.clear();
            return Ok(());
        };
        let (target, source) = build_endpoints(
            &self.core.accessor,
            &self.core.kind,
            &target,
            target_path,
            source,
            source_path,
        )?;
        self.core.rebind(target, source)
    }

    pub fn set_mode(&self, mode: BindMode) -> Result<&Self> {
        self.core.set_mode(mode)?;
        Ok(self)
    }

    /// Listen to `event` on the target side instead of the conventional one.
    pub fn attach_target_event(&self, event: &str, filter: Option<EventFilter>) -> Result<&Self> {
        self.core.attach_explicit(
            Side::Target,
            Attachment::Endpoint {
                event: Rc::from(event),
                filter,
            },
        )?;
        Ok(self)
    }

    /// Listen to `event` on the source side instead of the conventional one.
    pub fn attach_source_event(&self, event: &str, filter: Option<EventFilter>) -> Result<&Self> {
        self.core.attach_explicit(
            Side::Source,
            Attachment::Endpoint {
                event: Rc::from(event),
                filter,
            },
        )?;
        Ok(self)
    }

    /// Listen to a type-level event as the source trigger.
    pub fn attach_source_static_event(
        &self,
        ty: &Rc<TypeDescriptor>,
        event: &str,
        filter: Option<EventFilter>,
    ) -> Result<&Self> {
        self.core.attach_explicit(
            Side::Source,
            Attachment::Static {
                ty: Rc::clone(ty),
                event: Rc::from(event),
                filter,
            },
        )?;
        Ok(self)
    }

    /// Drop the explicit target event and fall back to the convention.
    pub fn detach_target_event(&self) -> Result<&Self> {
        self.core.detach_explicit(Side::Target)?;
        Ok(self)
    }

    /// Drop the explicit source event and fall back to the convention.
    pub fn detach_source_event(&self) -> Result<&Self> {
        self.core.detach_explicit(Side::Source)?;
        Ok(self)
    }

    pub fn set_converter(&self, converter: impl ValueConverter + 'static) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.converter.borrow_mut() = Some(Rc::new(converter));
        self.core.configured()?;
        Ok(self)
    }

    pub fn set_parameter(&self, parameter: impl Into<Value>) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.parameter.borrow_mut() = parameter.into();
        self.core.configured()?;
        Ok(self)
    }

    /// Read the target side through `getter` when pushing target to source.
    pub fn set_target_getter(
        &self,
        getter: impl Fn(&Endpoint) -> Result<Flow> + 'static,
    ) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.target_getter.borrow_mut() = Some(Rc::new(getter));
        self.core.configured()?;
        Ok(self)
    }

    /// Write the target side through `setter` instead of a converting set.
    pub fn set_target_setter(
        &self,
        setter: impl Fn(&Endpoint, Value) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.target_setter.borrow_mut() = Some(Rc::new(setter));
        self.core.configured()?;
        Ok(self)
    }

    pub fn set_source_getter(
        &self,
        getter: impl Fn(&Endpoint) -> Result<Flow> + 'static,
    ) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.source_getter.borrow_mut() = Some(Rc::new(getter));
        self.core.configured()?;
        Ok(self)
    }

    pub fn set_source_setter(
        &self,
        setter: impl Fn(&Endpoint, Value) -> Result<()> + 'static,
    ) -> Result<&Self> {
        self.core.ensure_live()?;
        *self.core.source_setter.borrow_mut() = Some(Rc::new(setter));
        self.core.configured()?;
        Ok(self)
    }

    /// Call `handler` whenever the binding changes the target value.
    pub fn set_target_changed(&self, handler: impl Fn(&ChangeNotice) + 'static) -> Result<&Self> {
        self.set_changed(Side::Target, HandlerSlot::Strong(Rc::new(handler)))
    }

    /// Like [`set_target_changed`](Self::set_target_changed) without keeping
    /// `handler` alive.
    pub fn set_target_changed_weak(&self, handler: &Rc<ChangeHandler>) -> Result<&Self> {
        self.set_changed(Side::Target, HandlerSlot::Weak(Rc::downgrade(handler)))
    }

    /// Call `handler` whenever the binding changes the source value.
    pub fn set_source_changed(&self, handler: impl Fn(&ChangeNotice) + 'static) -> Result<&Self> {
        self.set_changed(Side::Source, HandlerSlot::Strong(Rc::new(handler)))
    }

    pub fn set_source_changed_weak(&self, handler: &Rc<ChangeHandler>) -> Result<&Self> {
        self.set_changed(Side::Source, HandlerSlot::Weak(Rc::downgrade(handler)))
    }

    fn set_changed(&self, side: Side, slot: HandlerSlot) -> Result<&Self> {
        self.core.ensure_live()?;
        let cell = match side {
            Side::Target => &self.core.target_changed,
            Side::Source => &self.core.source_changed,
        };
        *cell.borrow_mut() = Some(slot);
        self.core.configured()?;
        Ok(self)
    }

    /// Same underlying binding.
    #[must_use]
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.core.id.get())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("mode", &self.mode())
            .field("target", &self.core.target())
            .field("source", &self.core.source())
            .finish()
    }
}
