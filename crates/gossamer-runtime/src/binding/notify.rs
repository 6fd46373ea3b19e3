#![forbid(unsafe_code)]

//! Notify bindings: pure signal relay between two explicitly attached events.
//!
//! No value is read or written. An event on one side runs the opposite
//! side's changed callback with null old and new values and, when a relay
//! event is configured, raises that event on the opposite side's object.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use gossamer_core::{BindError, EventArgs, Result, Value};

use super::{Binding, BindingCore, KindState, Side, endpoint_host};
use crate::endpoint::Endpoint;

#[derive(Default)]
pub(crate) struct NotifyState {
    target_relay: RefCell<Option<Rc<str>>>,
    source_relay: RefCell<Option<Rc<str>>>,
}

impl NotifyState {
    pub(super) fn relay(
        &self,
        core: &BindingCore,
        source: &Endpoint,
        target: &Endpoint,
        source_to_target: bool,
    ) -> Result<()> {
        let (side, endpoint, relay) = if source_to_target {
            (Side::Target, target, self.target_relay.borrow().clone())
        } else {
            (Side::Source, source, self.source_relay.borrow().clone())
        };
        core.notify_changed(side, Value::Null, Value::Null);
        if let (Some(event), Some(host)) = (relay, endpoint_host(endpoint)) {
            tracing::trace!(binding = core.id.get(), event = %event, "relaying notification");
            core.accessor.raise_event(&host, &event, &EventArgs::Empty)?;
        }
        Ok(())
    }
}

/// A [`Binding`] that forwards "something happened" between two objects.
#[derive(Clone)]
pub struct NotifyBinding {
    binding: Binding,
    state: Rc<NotifyState>,
}

impl NotifyBinding {
    /// Raise `event` on the target whenever the source event fires.
    pub fn set_target_relay(&self, event: Option<&str>) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        *self.state.target_relay.borrow_mut() = event.map(Rc::from);
        Ok(self)
    }

    /// Raise `event` on the source whenever the target event fires.
    pub fn set_source_relay(&self, event: Option<&str>) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        *self.state.source_relay.borrow_mut() = event.map(Rc::from);
        Ok(self)
    }

    #[must_use]
    pub fn into_binding(self) -> Binding {
        self.binding
    }
}

impl Deref for NotifyBinding {
    type Target = Binding;

    fn deref(&self) -> &Binding {
        &self.binding
    }
}

impl TryFrom<Binding> for NotifyBinding {
    type Error = BindError;

    fn try_from(binding: Binding) -> Result<Self> {
        let state = match &binding.core.kind {
            KindState::Notify(state) => Rc::clone(state),
            _ => {
                return Err(BindError::NotSupported(format!(
                    "{:?} binding is not a notify binding",
                    binding.kind()
                )));
            }
        };
        Ok(Self { binding, state })
    }
}

impl std::fmt::Debug for NotifyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBinding")
            .field("binding", &self.binding)
            .field("target_relay", &self.state.target_relay.borrow())
            .field("source_relay", &self.state.source_relay.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindMode, BindingKind, ChangeNotice};
    use crate::config::BindingConfig;
    use gossamer_core::{Bindable, DynClass, DynObject, MemberAccessor, ObjectRef, ValueKind};
    use std::cell::Cell;

    fn node() -> Rc<DynObject> {
        DynClass::builder("Node")
            .property("Value", ValueKind::Int)
            .event("Ping")
            .event("Pong")
            .build()
            .instantiate()
    }

    fn bind(target: &Rc<DynObject>, source: &Rc<DynObject>) -> NotifyBinding {
        let target: ObjectRef = target.clone();
        let source: ObjectRef = source.clone();
        let binding = Binding::build(
            &Rc::new(MemberAccessor::new()),
            &Rc::new(BindingConfig::default()),
            KindState::for_kind(BindingKind::Notify),
            &target,
            None,
            &source,
            None,
        )
        .unwrap();
        binding.initialize().unwrap();
        NotifyBinding::try_from(binding).unwrap()
    }

    #[test]
    fn always_two_way() {
        let (a, b) = (node(), node());
        let binding = bind(&a, &b);
        assert_eq!(binding.mode(), BindMode::TWO_WAY);
        binding.set_mode(BindMode::ONE_WAY).unwrap();
        assert_eq!(binding.mode(), BindMode::TWO_WAY);
    }

    #[test]
    fn source_event_fires_target_callback_with_nulls() {
        let (target, source) = (node(), node());
        let binding = bind(&target, &source);
        binding.attach_source_event("Ping", None).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        binding
            .set_target_changed(move |notice: &ChangeNotice| {
                s.borrow_mut().push((notice.old.clone(), notice.new.clone()));
            })
            .unwrap();

        source.raise("Ping", &EventArgs::Empty).unwrap();
        assert_eq!(*seen.borrow(), vec![(Value::Null, Value::Null)]);
        assert_eq!(target.get("Value"), Some(Value::Int(0)));
    }

    #[test]
    fn relay_raises_on_the_other_side() {
        let (target, source) = (node(), node());
        let binding = bind(&target, &source);
        binding.attach_source_event("Ping", None).unwrap();
        binding.set_target_relay(Some("Pong")).unwrap();

        let pongs = Rc::new(Cell::new(0));
        let p = Rc::clone(&pongs);
        let _sub = target.events().unwrap().subscribe("Pong", move |_: &Value, _: &EventArgs| {
            p.set(p.get() + 1);
            Ok(())
        });
        source.raise("Ping", &EventArgs::Empty).unwrap();
        assert_eq!(pongs.get(), 1);
    }
}
