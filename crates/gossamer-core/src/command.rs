#![forbid(unsafe_code)]

//! Delegate commands.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::descriptor::TypeDescriptor;
use crate::error::Result;
use crate::event::{CAN_EXECUTE_CHANGED, EventArgs, EventHub};
use crate::object::{Bindable, ObjectRef};
use crate::value::{Value, ValueKind};

/// Method name invoked to run a command.
pub const EXECUTE: &str = "Execute";
/// Method name invoked to query whether a command may run.
pub const CAN_EXECUTE: &str = "CanExecute";

type ExecuteFn = dyn Fn(&Value) -> Result<()>;
type CanExecuteFn = dyn Fn(&Value) -> bool;

thread_local! {
    static COMMAND_TYPE: Rc<TypeDescriptor> = TypeDescriptor::builder("Command")
        .method::<Command>(EXECUTE, &[ValueKind::Any], ValueKind::Any, |c, args| {
            c.execute(&args[0]).map(|()| Value::Null)
        })
        .method::<Command>(CAN_EXECUTE, &[ValueKind::Any], ValueKind::Bool, |c, args| {
            Ok(Value::Bool(c.can_execute(&args[0])))
        })
        .event(CAN_EXECUTE_CHANGED)
        .build();
}

/// A command backed by closures.
pub struct Command {
    execute: Box<ExecuteFn>,
    can_execute: Option<Box<CanExecuteFn>>,
    hub: EventHub,
    me: Weak<Command>,
}

impl Command {
    /// A command that can always execute.
    #[must_use]
    pub fn new(execute: impl Fn(&Value) -> Result<()> + 'static) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            execute: Box::new(execute),
            can_execute: None,
            hub: EventHub::new(),
            me: me.clone(),
        })
    }

    #[must_use]
    pub fn with_can_execute(
        execute: impl Fn(&Value) -> Result<()> + 'static,
        can_execute: impl Fn(&Value) -> bool + 'static,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            execute: Box::new(execute),
            can_execute: Some(Box::new(can_execute)),
            hub: EventHub::new(),
            me: me.clone(),
        })
    }

    pub fn execute(&self, parameter: &Value) -> Result<()> {
        (self.execute)(parameter)
    }

    #[must_use]
    pub fn can_execute(&self, parameter: &Value) -> bool {
        self.can_execute.as_ref().is_none_or(|f| f(parameter))
    }

    /// Tell listeners that `can_execute` may now answer differently.
    pub fn raise_can_execute_changed(&self) -> Result<()> {
        let sender = self
            .me
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc as ObjectRef));
        self.hub.raise(&sender, CAN_EXECUTE_CHANGED, &EventArgs::Empty)
    }
}

impl Bindable for Command {
    fn descriptor(&self) -> Rc<TypeDescriptor> {
        COMMAND_TYPE.with(Rc::clone)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn events(&self) -> Option<&EventHub> {
        Some(&self.hub)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("guarded", &self.can_execute.is_some())
            .field("listeners", &self.hub.handler_count(CAN_EXECUTE_CHANGED))
            .finish()
    }
}
