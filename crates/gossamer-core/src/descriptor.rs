#![forbid(unsafe_code)]

//! Per-type member tables.
//!
//! A [`TypeDescriptor`] is built once per bindable type and shared by all of
//! its instances. It replaces runtime reflection: each member is a name, a
//! declared [`ValueKind`], and a typed closure that downcasts the receiver.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use gossamer_core::{Bindable, TypeDescriptor, Value, ValueKind};
//!
//! struct Label {
//!     text: RefCell<String>,
//! }
//!
//! thread_local! {
//!     static LABEL: Rc<TypeDescriptor> = TypeDescriptor::builder("Label")
//!         .property_rw::<Label>(
//!             "Text",
//!             ValueKind::Str,
//!             |l| Value::from(l.text.borrow().as_str()),
//!             |l, v| {
//!                 *l.text.borrow_mut() = v.to_string();
//!                 Ok(())
//!             },
//!         )
//!         .build();
//! }
//!
//! impl Bindable for Label {
//!     fn descriptor(&self) -> Rc<TypeDescriptor> {
//!         LABEL.with(Rc::clone)
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let desc = LABEL.with(Rc::clone);
//! assert!(desc.property("Text").is_some());
//! assert!(desc.property("Caption").is_none());
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{BindError, Result};
use crate::event::EventHub;
use crate::object::Bindable;
use crate::value::{Value, ValueKind};

/// Global counter for descriptor identities.
static TYPE_KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`TypeDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    fn next() -> Self {
        Self(TYPE_KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Reads a property or field. Receives `None` for static members.
pub type Getter = Rc<dyn Fn(Option<&dyn Bindable>) -> Result<Value>>;
/// Writes a property or field. Receives `None` for static members.
pub type Setter = Rc<dyn Fn(Option<&dyn Bindable>, Value) -> Result<()>>;
/// Reads an indexed item.
pub type IndexGetter = Rc<dyn Fn(&dyn Bindable, &Value) -> Result<Value>>;
/// Writes an indexed item.
pub type IndexSetter = Rc<dyn Fn(&dyn Bindable, &Value, Value) -> Result<()>>;
/// Invokes a method. Receives `None` for static (and extension) methods.
pub type Invoker = Rc<dyn Fn(Option<&dyn Bindable>, &[Value]) -> Result<Value>>;

/// A property or field.
#[derive(Clone)]
pub struct PropertyDef {
    pub name: Rc<str>,
    pub kind: ValueKind,
    pub is_static: bool,
    pub(crate) get: Option<Getter>,
    pub(crate) set: Option<Setter>,
}

impl PropertyDef {
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.get.is_some()
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.set.is_some()
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("is_static", &self.is_static)
            .field("read", &self.can_read())
            .field("write", &self.can_write())
            .finish()
    }
}

/// An indexer (`this[key]`).
#[derive(Clone)]
pub struct IndexerDef {
    pub key: ValueKind,
    pub value: ValueKind,
    pub(crate) get: IndexGetter,
    pub(crate) set: Option<IndexSetter>,
}

impl fmt::Debug for IndexerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerDef")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("write", &self.set.is_some())
            .finish()
    }
}

/// A method overload.
#[derive(Clone)]
pub struct MethodDef {
    pub name: Rc<str>,
    pub params: Rc<[ValueKind]>,
    pub returns: ValueKind,
    pub is_static: bool,
    pub(crate) invoke: Invoker,
}

impl MethodDef {
    /// Whether every argument is assignable to the matching parameter.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg))
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// A declared event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDef {
    pub name: Rc<str>,
    pub is_static: bool,
}

/// Member table of one bindable type.
pub struct TypeDescriptor {
    key: TypeKey,
    name: Rc<str>,
    properties: Vec<PropertyDef>,
    fields: Vec<PropertyDef>,
    indexers: Vec<IndexerDef>,
    methods: Vec<MethodDef>,
    events: Vec<EventDef>,
    static_events: EventHub,
}

impl TypeDescriptor {
    #[must_use]
    pub fn builder(name: &str) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: Rc::from(name),
            properties: Vec::new(),
            fields: Vec::new(),
            indexers: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| &*p.name == name)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&PropertyDef> {
        self.fields.iter().find(|p| &*p.name == name)
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Indexers in declaration order.
    #[must_use]
    pub fn indexers(&self) -> &[IndexerDef] {
        &self.indexers
    }

    /// All overloads named `name`, in declaration order.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> {
        self.methods.iter().filter(move |m| &*m.name == name)
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| &*e.name == name)
    }

    /// Whether an instance or static event named `name` is declared.
    #[must_use]
    pub fn declares_event(&self, name: &str) -> bool {
        self.event(name).is_some()
    }

    /// Backing storage for static (type-level) events.
    #[must_use]
    pub fn static_events(&self) -> &EventHub {
        &self.static_events
    }

    pub(crate) fn missing(&self, member: &str) -> BindError {
        BindError::missing(self.name.as_ref(), member)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("fields", &self.fields.len())
            .field("indexers", &self.indexers.len())
            .field("methods", &self.methods.len())
            .field("events", &self.events)
            .finish()
    }
}

/// Downcast the receiver of an instance member.
fn receiver<'a, T: 'static>(object: Option<&'a dyn Bindable>, type_name: &str) -> Result<&'a T> {
    let Some(object) = object else {
        return Err(BindError::ArgumentNull("instance"));
    };
    object.as_any().downcast_ref::<T>().ok_or_else(|| {
        BindError::ArgumentInvalid(format!(
            "receiver of type '{}' is not a '{type_name}'",
            object.descriptor().name()
        ))
    })
}

/// Fluent builder for [`TypeDescriptor`].
pub struct TypeDescriptorBuilder {
    name: Rc<str>,
    properties: Vec<PropertyDef>,
    fields: Vec<PropertyDef>,
    indexers: Vec<IndexerDef>,
    methods: Vec<MethodDef>,
    events: Vec<EventDef>,
}

impl TypeDescriptorBuilder {
    fn instance_getter<T: 'static>(&self, get: impl Fn(&T) -> Value + 'static) -> Getter {
        let type_name = Rc::clone(&self.name);
        Rc::new(move |object: Option<&dyn Bindable>| {
            Ok(get(receiver::<T>(object, &type_name)?))
        })
    }

    fn instance_setter<T: 'static>(
        &self,
        set: impl Fn(&T, Value) -> Result<()> + 'static,
    ) -> Setter {
        let type_name = Rc::clone(&self.name);
        Rc::new(move |object: Option<&dyn Bindable>, value: Value| {
            set(receiver::<T>(object, &type_name)?, value)
        })
    }

    /// Read-only instance property.
    #[must_use]
    pub fn property<T: 'static>(
        mut self,
        name: &str,
        kind: ValueKind,
        get: impl Fn(&T) -> Value + 'static,
    ) -> Self {
        let get = self.instance_getter(get);
        self.properties.push(PropertyDef {
            name: Rc::from(name),
            kind,
            is_static: false,
            get: Some(get),
            set: None,
        });
        self
    }

    /// Read-write instance property.
    #[must_use]
    pub fn property_rw<T: 'static>(
        mut self,
        name: &str,
        kind: ValueKind,
        get: impl Fn(&T) -> Value + 'static,
        set: impl Fn(&T, Value) -> Result<()> + 'static,
    ) -> Self {
        let get = self.instance_getter(get);
        let set = self.instance_setter(set);
        self.properties.push(PropertyDef {
            name: Rc::from(name),
            kind,
            is_static: false,
            get: Some(get),
            set: Some(set),
        });
        self
    }

    /// Write-only instance property.
    #[must_use]
    pub fn property_wo<T: 'static>(
        mut self,
        name: &str,
        kind: ValueKind,
        set: impl Fn(&T, Value) -> Result<()> + 'static,
    ) -> Self {
        let set = self.instance_setter(set);
        self.properties.push(PropertyDef {
            name: Rc::from(name),
            kind,
            is_static: false,
            get: None,
            set: Some(set),
        });
        self
    }

    /// Read-write instance field.
    #[must_use]
    pub fn field<T: 'static>(
        mut self,
        name: &str,
        kind: ValueKind,
        get: impl Fn(&T) -> Value + 'static,
        set: impl Fn(&T, Value) -> Result<()> + 'static,
    ) -> Self {
        let get = self.instance_getter(get);
        let set = self.instance_setter(set);
        self.fields.push(PropertyDef {
            name: Rc::from(name),
            kind,
            is_static: false,
            get: Some(get),
            set: Some(set),
        });
        self
    }

    /// Static property; `set` may be omitted for read-only statics.
    #[must_use]
    pub fn static_property(
        mut self,
        name: &str,
        kind: ValueKind,
        get: impl Fn() -> Value + 'static,
        set: Option<Rc<dyn Fn(Value) -> Result<()>>>,
    ) -> Self {
        let set = set.map(|set| -> Setter {
            Rc::new(move |_: Option<&dyn Bindable>, value: Value| set(value))
        });
        self.properties.push(PropertyDef {
            name: Rc::from(name),
            kind,
            is_static: true,
            get: Some(Rc::new(move |_: Option<&dyn Bindable>| Ok(get()))),
            set,
        });
        self
    }

    /// Read-only indexer.
    #[must_use]
    pub fn indexer<T: 'static>(
        mut self,
        key: ValueKind,
        value: ValueKind,
        get: impl Fn(&T, &Value) -> Result<Value> + 'static,
    ) -> Self {
        let type_name = Rc::clone(&self.name);
        self.indexers.push(IndexerDef {
            key,
            value,
            get: Rc::new(move |object: &dyn Bindable, k: &Value| {
                get(receiver::<T>(Some(object), &type_name)?, k)
            }),
            set: None,
        });
        self
    }

    /// Read-write indexer.
    #[must_use]
    pub fn indexer_rw<T: 'static>(
        mut self,
        key: ValueKind,
        value: ValueKind,
        get: impl Fn(&T, &Value) -> Result<Value> + 'static,
        set: impl Fn(&T, &Value, Value) -> Result<()> + 'static,
    ) -> Self {
        let get_name = Rc::clone(&self.name);
        let set_name = Rc::clone(&self.name);
        self.indexers.push(IndexerDef {
            key,
            value,
            get: Rc::new(move |object: &dyn Bindable, k: &Value| {
                get(receiver::<T>(Some(object), &get_name)?, k)
            }),
            set: Some(Rc::new(move |object: &dyn Bindable, k: &Value, v: Value| {
                set(receiver::<T>(Some(object), &set_name)?, k, v)
            })),
        });
        self
    }

    /// Instance method overload.
    #[must_use]
    pub fn method<T: 'static>(
        mut self,
        name: &str,
        params: &[ValueKind],
        returns: ValueKind,
        invoke: impl Fn(&T, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        let type_name = Rc::clone(&self.name);
        self.methods.push(MethodDef {
            name: Rc::from(name),
            params: Rc::from(params),
            returns,
            is_static: false,
            invoke: Rc::new(move |object: Option<&dyn Bindable>, args: &[Value]| {
                invoke(receiver::<T>(object, &type_name)?, args)
            }),
        });
        self
    }

    /// Static method overload. Extension types declare their methods this
    /// way, with the extended instance as the first parameter.
    #[must_use]
    pub fn static_method(
        mut self,
        name: &str,
        params: &[ValueKind],
        returns: ValueKind,
        invoke: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.methods.push(MethodDef {
            name: Rc::from(name),
            params: Rc::from(params),
            returns,
            is_static: true,
            invoke: Rc::new(move |_: Option<&dyn Bindable>, args: &[Value]| invoke(args)),
        });
        self
    }

    /// Declare an instance event.
    #[must_use]
    pub fn event(mut self, name: &str) -> Self {
        self.events.push(EventDef {
            name: Rc::from(name),
            is_static: false,
        });
        self
    }

    /// Declare a type-level event backed by the descriptor's own hub.
    #[must_use]
    pub fn static_event(mut self, name: &str) -> Self {
        self.events.push(EventDef {
            name: Rc::from(name),
            is_static: true,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Rc<TypeDescriptor> {
        Rc::new(TypeDescriptor {
            key: TypeKey::next(),
            name: self.name,
            properties: self.properties,
            fields: self.fields,
            indexers: self.indexers,
            methods: self.methods,
            events: self.events,
            static_events: EventHub::new(),
        })
    }
}
