#![forbid(unsafe_code)]

//! Schema-driven property bags.
//!
//! A [`DynClass`] declares a set of typed properties, methods and events; its
//! instances are [`DynObject`]s that store one [`Value`] per property and
//! raise `PropertyChanged` whenever a set actually changes a value. They are
//! the quickest way to get a bindable view model without writing a
//! [`TypeDescriptor`] by hand.
//!
//! ```
//! use gossamer_core::{DynClass, Value, ValueKind};
//!
//! let person = DynClass::builder("Person")
//!     .property("Name", ValueKind::Str)
//!     .property("Age", ValueKind::Int)
//!     .build();
//! let ann = person.instantiate();
//! ann.set("Age", Value::from("41")).unwrap();
//! assert_eq!(ann.get("Age"), Some(Value::Int(41)));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::descriptor::{TypeDescriptor, TypeDescriptorBuilder};
use crate::error::{BindError, Result};
use crate::event::{EventArgs, EventHub, PROPERTY_CHANGED};
use crate::object::{Bindable, ObjectRef};
use crate::value::{Value, ValueKind};

/// Declared shape of a family of [`DynObject`]s.
pub struct DynClass {
    descriptor: Rc<TypeDescriptor>,
    slots: Vec<(Rc<str>, ValueKind)>,
}

impl DynClass {
    #[must_use]
    pub fn builder(name: &str) -> DynClassBuilder {
        DynClassBuilder {
            inner: TypeDescriptor::builder(name).event(PROPERTY_CHANGED),
            slots: Vec::new(),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Rc<TypeDescriptor> {
        &self.descriptor
    }

    /// Create an instance with every property at its kind's default.
    #[must_use]
    pub fn instantiate(self: &Rc<Self>) -> Rc<DynObject> {
        Rc::new_cyclic(|me| DynObject {
            class: Rc::clone(self),
            values: RefCell::new(self.slots.iter().map(|(_, k)| k.default_value()).collect()),
            hub: EventHub::new(),
            me: me.clone(),
        })
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|(n, _)| &**n == name)
    }
}

impl fmt::Debug for DynClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynClass")
            .field("name", &self.descriptor.name())
            .field("slots", &self.slots)
            .finish()
    }
}

/// Builder for [`DynClass`]. `PropertyChanged` is always declared.
pub struct DynClassBuilder {
    inner: TypeDescriptorBuilder,
    slots: Vec<(Rc<str>, ValueKind)>,
}

impl DynClassBuilder {
    /// Read-write property stored in the instance.
    #[must_use]
    pub fn property(mut self, name: &str, kind: ValueKind) -> Self {
        let index = self.slots.len();
        self.slots.push((Rc::from(name), kind));
        self.inner = self.inner.property_rw::<DynObject>(
            name,
            kind,
            move |o| o.slot_value(index),
            move |o, v| o.set_slot(index, v).map(drop),
        );
        self
    }

    /// Property computed from the instance on every read.
    #[must_use]
    pub fn computed(
        mut self,
        name: &str,
        kind: ValueKind,
        get: impl Fn(&DynObject) -> Value + 'static,
    ) -> Self {
        self.inner = self.inner.property::<DynObject>(name, kind, get);
        self
    }

    #[must_use]
    pub fn method(
        mut self,
        name: &str,
        params: &[ValueKind],
        returns: ValueKind,
        invoke: impl Fn(&DynObject, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.inner = self.inner.method::<DynObject>(name, params, returns, invoke);
        self
    }

    #[must_use]
    pub fn event(mut self, name: &str) -> Self {
        self.inner = self.inner.event(name);
        self
    }

    #[must_use]
    pub fn build(self) -> Rc<DynClass> {
        Rc::new(DynClass {
            descriptor: self.inner.build(),
            slots: self.slots,
        })
    }
}

/// An instance of a [`DynClass`].
pub struct DynObject {
    class: Rc<DynClass>,
    values: RefCell<Vec<Value>>,
    hub: EventHub,
    me: Weak<DynObject>,
}

impl DynObject {
    #[must_use]
    pub fn class(&self) -> &Rc<DynClass> {
        &self.class
    }

    /// Current value of a stored property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.class.slot(name).map(|i| self.slot_value(i))
    }

    /// Coerce `value` to the declared kind and store it. Returns whether the
    /// value changed; `PropertyChanged` is raised only in that case.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let index = self
            .class
            .slot(name)
            .ok_or_else(|| BindError::missing(self.class.descriptor.name(), name))?;
        self.set_slot(index, value.into())
    }

    /// Store without raising `PropertyChanged`.
    pub fn set_quiet(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .class
            .slot(name)
            .ok_or_else(|| BindError::missing(self.class.descriptor.name(), name))?;
        let value = value.into().convert_to(self.class.slots[index].1)?;
        self.values.borrow_mut()[index] = value;
        Ok(())
    }

    /// Raise `PropertyChanged` for `name` without touching the value.
    pub fn notify(&self, name: &str) -> Result<()> {
        self.raise(PROPERTY_CHANGED, &EventArgs::property_changed(name))
    }

    /// Raise any event declared on the class.
    pub fn raise(&self, event: &str, args: &EventArgs) -> Result<()> {
        if !self.class.descriptor.declares_event(event) {
            return Err(BindError::missing(self.class.descriptor.name(), event));
        }
        self.hub.raise(&self.sender(), event, args)
    }

    /// Strong handle to this object as an [`ObjectRef`].
    #[must_use]
    pub fn handle(&self) -> Option<ObjectRef> {
        self.me.upgrade().map(|rc| rc as ObjectRef)
    }

    fn sender(&self) -> Value {
        self.handle().map_or(Value::Null, Value::Object)
    }

    fn slot_value(&self, index: usize) -> Value {
        self.values.borrow().get(index).cloned().unwrap_or_default()
    }

    fn set_slot(&self, index: usize, value: Value) -> Result<bool> {
        let (name, kind) = self.class.slots[index].clone();
        let value = value.convert_to(kind)?;
        {
            let mut values = self.values.borrow_mut();
            if values[index] == value {
                return Ok(false);
            }
            values[index] = value;
        }
        self.notify(&name)?;
        Ok(true)
    }
}

impl Bindable for DynObject {
    fn descriptor(&self) -> Rc<TypeDescriptor> {
        Rc::clone(&self.class.descriptor)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn events(&self) -> Option<&EventHub> {
        Some(&self.hub)
    }
}

impl fmt::Debug for DynObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.borrow();
        let mut s = f.debug_struct(self.class.descriptor.name());
        for ((name, _), value) in self.class.slots.iter().zip(values.iter()) {
            s.field(name, value);
        }
        s.finish()
    }
}
