#![forbid(unsafe_code)]

//! Command bindings: a target event runs a source command.
//!
//! When the target event fires the command's `CanExecute` is asked first and
//! `Execute` runs only if it answers `true`. The answer is also mirrored into
//! every registered *enable* property of the target, re-evaluated whenever
//! the command raises `CanExecuteChanged` or a watched property changes.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use gossamer_core::{
    BindError, CAN_EXECUTE, EXECUTE, EventArgs, ObjectRef, PROPERTY_CHANGED, Result, Value,
    ValueKind, WeakObject, same_object,
};

use super::{Binding, BindingCore, KindState, Side, endpoint_host, property_filter};
use crate::endpoint::Endpoint;
use crate::weak_event::WeakEvent;

/// An extra `CanExecute` trigger.
struct Watch {
    object: WeakObject,
    property: Rc<str>,
    event: WeakEvent<BindingCore>,
}

#[derive(Default)]
pub(crate) struct CommandState {
    enable_properties: RefCell<Vec<Rc<str>>>,
    watches: RefCell<Vec<Watch>>,
}

fn watched_property_changed(core: &Rc<BindingCore>, _: &Value, _: &EventArgs) -> Result<()> {
    core.update(true)
}

/// Ask `command` whether it can run with `parameter`.
fn can_execute(core: &BindingCore, command: &ObjectRef, parameter: &Value) -> Result<bool> {
    let args = [parameter.clone()];
    let handle = core.accessor.resolve_method(command, CAN_EXECUTE, &args)?;
    if handle.returns() != ValueKind::Bool {
        return Err(BindError::missing(command.descriptor().name(), CAN_EXECUTE));
    }
    let answer = handle.invoke(Some(command), &args)?;
    answer.as_bool().ok_or(BindError::TypeMismatch {
        expected: ValueKind::Bool,
        found: answer.kind(),
    })
}

impl CommandState {
    /// Mirror `CanExecute` into the enable properties.
    pub(super) fn sync_enabled(
        &self,
        core: &BindingCore,
        source: &Endpoint,
        target: &Endpoint,
    ) -> Result<()> {
        let names = self.enable_properties.borrow().clone();
        if names.is_empty() {
            return Ok(());
        }
        let enabled = match source.value()? {
            Value::Object(command) => can_execute(core, &command, &core.parameter())?,
            _ => false,
        };
        let Some(host) = endpoint_host(target) else {
            return Ok(());
        };
        let enabled = Value::Bool(enabled);
        for name in names {
            let old = core.accessor.get_member(&host, &name)?;
            core.accessor.set_member(&host, &name, enabled.clone())?;
            tracing::trace!(binding = core.id.get(), property = %name, %enabled, "enable synced");
            if old != enabled {
                core.notify_changed(Side::Target, old, enabled.clone());
            }
        }
        Ok(())
    }

    /// `CanExecute`, then `Execute`.
    pub(super) fn execute(&self, core: &BindingCore, source: &Endpoint) -> Result<()> {
        let Value::Object(command) = source.value()? else {
            return Ok(());
        };
        let parameter = core.parameter();
        if !can_execute(core, &command, &parameter)? {
            return Ok(());
        }
        tracing::trace!(binding = core.id.get(), "executing command");
        core.accessor.invoke_method(&command, EXECUTE, &[parameter])?;
        Ok(())
    }

    pub(super) fn release(&self) {
        let watches = std::mem::take(&mut *self.watches.borrow_mut());
        for watch in &watches {
            watch.event.detach();
        }
    }
}

/// A [`Binding`] that runs a command from a target event.
#[derive(Clone)]
pub struct CommandBinding {
    binding: Binding,
    state: Rc<CommandState>,
}

impl CommandBinding {
    /// Keep the target's boolean property `name` equal to `CanExecute`.
    pub fn add_enable_property(&self, name: &str) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        {
            let mut names = self.state.enable_properties.borrow_mut();
            if !names.iter().any(|n| &**n == name) {
                names.push(Rc::from(name));
            }
        }
        self.binding.core.configured()?;
        Ok(self)
    }

    /// Stop syncing `name`. Its current value is left as is.
    pub fn remove_enable_property(&self, name: &str) -> bool {
        let mut names = self.state.enable_properties.borrow_mut();
        let before = names.len();
        names.retain(|n| &**n != name);
        names.len() != before
    }

    #[must_use]
    pub fn enable_properties(&self) -> Vec<Rc<str>> {
        self.state.enable_properties.borrow().clone()
    }

    /// Re-evaluate `CanExecute` whenever `property` of `source` changes.
    pub fn watch(&self, source: Option<&ObjectRef>, property: &str) -> Result<&Self> {
        let source = source.ok_or(BindError::ArgumentNull("source"))?;
        let core = &self.binding.core;
        core.ensure_live()?;
        if self.find_watch(source, property).is_some() {
            return Ok(self);
        }
        let event = WeakEvent::new(core.me.clone(), Rc::clone(&core.accessor));
        event.attach(
            Some(source),
            PROPERTY_CHANGED,
            watched_property_changed,
            Some(property_filter(property)),
        )?;
        self.state.watches.borrow_mut().push(Watch {
            object: Rc::downgrade(source),
            property: Rc::from(property),
            event,
        });
        Ok(self)
    }

    /// Remove a watch added by [`watch`](Self::watch). Returns whether one
    /// was found.
    pub fn unwatch(&self, source: Option<&ObjectRef>, property: &str) -> Result<bool> {
        let source = source.ok_or(BindError::ArgumentNull("source"))?;
        let Some(index) = self.find_watch(source, property) else {
            return Ok(false);
        };
        let watch = self.state.watches.borrow_mut().remove(index);
        watch.event.detach();
        Ok(true)
    }

    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.state.watches.borrow().len()
    }

    fn find_watch(&self, source: &ObjectRef, property: &str) -> Option<usize> {
        self.state.watches.borrow().iter().position(|w| {
            &*w.property == property
                && w
                    .object
                    .upgrade()
                    .is_some_and(|object| same_object(&object, source))
        })
    }

    #[must_use]
    pub fn into_binding(self) -> Binding {
        self.binding
    }
}

impl Deref for CommandBinding {
    type Target = Binding;

    fn deref(&self) -> &Binding {
        &self.binding
    }
}

impl TryFrom<Binding> for CommandBinding {
    type Error = BindError;

    fn try_from(binding: Binding) -> Result<Self> {
        let state = match &binding.core.kind {
            KindState::Command(state) => Rc::clone(state),
            _ => {
                return Err(BindError::NotSupported(format!(
                    "{:?} binding is not a command binding",
                    binding.kind()
                )));
            }
        };
        Ok(Self { binding, state })
    }
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("binding", &self.binding)
            .field("enable_properties", &self.state.enable_properties.borrow())
            .field("watches", &self.watch_count())
            .finish()
    }
}
