#![forbid(unsafe_code)]

//! Method bindings: an event on one side invokes a named method on the other.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use gossamer_core::{BindError, ObjectRef, Result, Value, ValueKind};

use super::{Binding, BindingCore, KindState, Side, endpoint_host};
use crate::endpoint::Endpoint;

#[derive(Clone)]
struct MethodSpec {
    name: Rc<str>,
    /// Boolean guard invoked with the same arguments first.
    can_invoke: Option<Rc<str>>,
}

#[derive(Default)]
pub(crate) struct MethodState {
    target_method: RefCell<Option<MethodSpec>>,
    source_method: RefCell<Option<MethodSpec>>,
}

impl MethodState {
    /// A source event calls the target method, and the other way round.
    pub(super) fn invoke(
        &self,
        core: &BindingCore,
        source: &Endpoint,
        target: &Endpoint,
        source_to_target: bool,
    ) -> Result<()> {
        let (spec, endpoint, side) = if source_to_target {
            (self.target_method.borrow().clone(), target, Side::Target)
        } else {
            (self.source_method.borrow().clone(), source, Side::Source)
        };
        let Some(spec) = spec else {
            return Ok(());
        };
        let Some(host) = endpoint_host(endpoint) else {
            return Ok(());
        };
        let parameter = core.parameter();
        let args: &[Value] = if parameter.is_null() {
            &[]
        } else {
            std::slice::from_ref(&parameter)
        };

        if let Some(guard) = &spec.can_invoke {
            if !can_invoke(core, &host, guard, args)? {
                return Ok(());
            }
        }
        let result = core.accessor.invoke_method(&host, &spec.name, args)?;
        tracing::trace!(binding = core.id.get(), method = %spec.name, "method invoked");
        core.notify_changed(side, Value::Null, result);
        Ok(())
    }
}

fn can_invoke(core: &BindingCore, host: &ObjectRef, name: &str, args: &[Value]) -> Result<bool> {
    let handle = core.accessor.resolve_method(host, name, args)?;
    if handle.returns() != ValueKind::Bool {
        return Err(BindError::missing(host.descriptor().name(), name));
    }
    let answer = handle.invoke(Some(host), args)?;
    answer.as_bool().ok_or(BindError::TypeMismatch {
        expected: ValueKind::Bool,
        found: answer.kind(),
    })
}

/// A [`Binding`] that relays events into method calls.
#[derive(Clone)]
pub struct MethodBinding {
    binding: Binding,
    state: Rc<MethodState>,
}

impl MethodBinding {
    /// Method called on the target when the source event fires.
    pub fn set_target_method(&self, name: &str, can_invoke: Option<&str>) -> Result<&Self> {
        self.set(Side::Target, name, can_invoke)
    }

    /// Method called on the source when the target event fires.
    pub fn set_source_method(&self, name: &str, can_invoke: Option<&str>) -> Result<&Self> {
        self.set(Side::Source, name, can_invoke)
    }

    fn set(&self, side: Side, name: &str, can_invoke: Option<&str>) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        let spec = MethodSpec {
            name: Rc::from(name),
            can_invoke: can_invoke.map(Rc::from),
        };
        let slot = match side {
            Side::Target => &self.state.target_method,
            Side::Source => &self.state.source_method,
        };
        *slot.borrow_mut() = Some(spec);
        Ok(self)
    }

    #[must_use]
    pub fn into_binding(self) -> Binding {
        self.binding
    }
}

impl Deref for MethodBinding {
    type Target = Binding;

    fn deref(&self) -> &Binding {
        &self.binding
    }
}

impl TryFrom<Binding> for MethodBinding {
    type Error = BindError;

    fn try_from(binding: Binding) -> Result<Self> {
        let state = match &binding.core.kind {
            KindState::Method(state) => Rc::clone(state),
            _ => {
                return Err(BindError::NotSupported(format!(
                    "{:?} binding is not a method binding",
                    binding.kind()
                )));
            }
        };
        Ok(Self { binding, state })
    }
}

impl std::fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |slot: &RefCell<Option<MethodSpec>>| {
            slot.borrow().as_ref().map(|spec| spec.name.to_string())
        };
        f.debug_struct("MethodBinding")
            .field("binding", &self.binding)
            .field("target_method", &name(&self.state.target_method))
            .field("source_method", &name(&self.state.source_method))
            .finish()
    }
}
