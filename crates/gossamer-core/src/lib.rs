#![forbid(unsafe_code)]

//! Object model for Gossamer data binding.
//!
//! This crate provides:
//! - [`Value`] / [`ValueKind`] for dynamically typed member values
//! - [`Bindable`] and [`TypeDescriptor`], the name-based stand-in for runtime reflection
//! - [`EventHub`] for named events whose handlers are only weakly held
//! - [`MemberAccessor`] for cached property, indexer, method and event dispatch
//! - Ready-made bindable types: [`DynObject`], [`ObservableList`], [`ObservableMap`], [`Command`]

pub mod accessor;
pub mod collections;
pub mod command;
pub mod descriptor;
pub mod dynamic;
pub mod error;
pub mod event;
pub mod locale;
pub mod object;
pub mod value;

pub use accessor::{CacheStats, MemberAccessor, MethodHandle};
pub use collections::{ObservableList, ObservableMap};
pub use command::{CAN_EXECUTE, Command, EXECUTE};
pub use descriptor::{
    EventDef, IndexerDef, MethodDef, PropertyDef, TypeDescriptor, TypeDescriptorBuilder, TypeKey,
};
pub use dynamic::{DynClass, DynClassBuilder, DynObject};
pub use error::{BindError, Result};
pub use event::{
    CAN_EXECUTE_CHANGED, COLLECTION_CHANGED, CollectionChange, EventArgs, EventHandler, EventHub,
    EventSubscription, INDEXER_NAME, PROPERTY_CHANGED,
};
pub use locale::Locale;
pub use object::{
    Bindable, Container, ListAccess, MapAccess, ObjectRef, WeakObject, downgrade, object_addr,
    same_object, weak_addr,
};
pub use value::{Value, ValueKind, WeakValue};
