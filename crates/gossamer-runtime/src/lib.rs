#![forbid(unsafe_code)]

//! The Gossamer binding engine.
//!
//! This crate provides:
//! - [`PropertyPath`] parsing and live [`PathObservation`] chains
//! - [`Endpoint`], one side of a binding with a source-changed notification
//! - [`WeakEvent`], event subscriptions that never extend an object's life
//! - [`Binding`] and its collection, command, method and notify variants
//! - [`BindingRegistry`] for per-target de-duplication and bulk clearing
//! - [`Engine`], the shared accessor and [`BindingConfig`] behind every binding
//!
//! Every object reference held by the engine is weak. Once the application
//! drops an object, reads through it yield defaults, writes are dropped and a
//! binding whose target is gone clears itself on its next delivery.
//!
//! # Example
//!
//! ```
//! use gossamer_core::{DynClass, ObjectRef, Value, ValueKind};
//! use gossamer_runtime::Engine;
//!
//! let class = DynClass::builder("Form")
//!     .property("Text", ValueKind::Str)
//!     .build();
//! let view = class.instantiate();
//! let vm = class.instantiate();
//!
//! let engine = Engine::new();
//! let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
//! let _binding = engine.bind(&target, "Text", &source, "Text").unwrap();
//!
//! vm.set("Text", "A").unwrap();
//! assert_eq!(view.get("Text"), Some(Value::from("A")));
//! ```

pub mod binding;
pub mod config;
pub mod convert;
pub mod endpoint;
pub mod engine;
pub mod path;
pub mod registry;
pub mod weak_event;

pub use binding::{
    BindMode, Binding, BindingId, BindingKind, BindingState, ChangeHandler, ChangeNotice,
    CollectionBinding, CommandBinding, HandlerSlot, MethodBinding, NotifyBinding,
};
pub use config::BindingConfig;
pub use convert::{
    CollectionHandler, DataGenerator, Flow, PropertyGetter, PropertySetter, ValueConverter,
};
pub use endpoint::{Endpoint, SourceChange, SourceChangedGuard, SourceMode};
pub use engine::Engine;
pub use path::{PathKey, PathObservation, PathSegment, PropertyPath};
pub use registry::BindingRegistry;
pub use weak_event::{EventFilter, Forward, WeakEvent};
