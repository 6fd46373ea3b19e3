#![forbid(unsafe_code)]

//! The bindable object contract.
//!
//! Every object that can sit at either end of a binding implements
//! [`Bindable`]. Its [`TypeDescriptor`] plays the role of runtime reflection:
//! it names the properties, fields, indexers, methods and events the type
//! exposes, and carries typed closures to reach them.
//!
//! The engine only ever stores [`WeakObject`]s. Whoever created an object
//! keeps it alive through an [`ObjectRef`]; once the last strong handle goes,
//! the engine observes the object as gone and degrades to defaults.

use std::any::Any;
use std::rc::{Rc, Weak};

use crate::descriptor::TypeDescriptor;
use crate::error::Result;
use crate::event::EventHub;
use crate::value::Value;

/// Strong handle to a bindable object.
pub type ObjectRef = Rc<dyn Bindable>;

/// Weak handle to a bindable object.
pub type WeakObject = Weak<dyn Bindable>;

/// An object reachable by name-based member access.
pub trait Bindable: Any {
    /// The type table describing this object's members.
    fn descriptor(&self) -> Rc<TypeDescriptor>;

    /// Upcast used by descriptor closures to reach the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Backing storage for instance events, if the type raises any.
    fn events(&self) -> Option<&EventHub> {
        None
    }

    /// Sequential or keyed view used by indexers and collection bindings.
    fn container(&self) -> Option<Container<'_>> {
        None
    }
}

/// Indexable shape of an object.
#[derive(Clone, Copy)]
pub enum Container<'a> {
    List(&'a dyn ListAccess),
    Map(&'a dyn MapAccess),
}

/// Positional access to a list-like object.
///
/// Mutating calls raise the owner's change notifications before returning.
pub trait ListAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<Value>;

    /// Snapshot of all items in order.
    fn items(&self) -> Vec<Value>;

    fn set(&self, index: usize, value: Value) -> Result<()>;

    fn insert(&self, index: usize, value: Value) -> Result<()>;

    fn remove_at(&self, index: usize) -> Result<Value>;

    fn clear(&self) -> Result<()>;
}

/// Keyed access to a dictionary-like object.
pub trait MapAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_key(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<Value>;

    fn keys(&self) -> Vec<Rc<str>>;

    fn insert(&self, key: &str, value: Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<Option<Value>>;
}

/// Identity comparison: both handles point at the same allocation.
#[must_use]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Stable address of an object, usable as a hash key while it is alive.
#[must_use]
pub fn object_addr(object: &ObjectRef) -> usize {
    Rc::as_ptr(object).cast::<()>() as usize
}

/// Address of a weakly held object (valid for identity while it is alive).
#[must_use]
pub fn weak_addr(object: &WeakObject) -> usize {
    Weak::as_ptr(object).cast::<()>() as usize
}

/// Downgrade a strong handle.
#[must_use]
pub fn downgrade(object: &ObjectRef) -> WeakObject {
    Rc::downgrade(object)
}
