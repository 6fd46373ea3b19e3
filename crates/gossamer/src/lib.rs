#![forbid(unsafe_code)]

//! Gossamer public facade.
//!
//! Re-exports the object model from `gossamer-core` and, with the default
//! `runtime` feature, the binding engine from `gossamer-runtime`. Most
//! applications only need the [`prelude`].
//!
//! ```
//! use gossamer::prelude::*;
//!
//! let class = DynClass::builder("Form")
//!     .property("Text", ValueKind::Str)
//!     .build();
//! let (view, vm) = (class.instantiate(), class.instantiate());
//! let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
//!
//! let binding = Engine::new().bind(&target, "Text", &source, "Text")?;
//! binding.set_mode(BindMode::TWO_WAY)?;
//!
//! view.set("Text", "typed")?;
//! assert_eq!(vm.get("Text"), Some(Value::from("typed")));
//! # Ok::<(), BindError>(())
//! ```

pub use gossamer_core as core;
#[cfg(feature = "runtime")]
pub use gossamer_runtime as runtime;

pub use gossamer_core::{
    BindError, Bindable, Command, DynClass, DynObject, EventArgs, MemberAccessor, ObjectRef,
    ObservableList, ObservableMap, Result, TypeDescriptor, Value, ValueKind,
};
#[cfg(feature = "runtime")]
pub use gossamer_runtime::{
    BindMode, Binding, BindingConfig, BindingKind, BindingRegistry, BindingState,
    CollectionBinding, CommandBinding, Engine, Flow, MethodBinding, NotifyBinding,
    ValueConverter,
};

/// The names most applications import.
pub mod prelude {
    pub use gossamer_core::{
        BindError, Bindable, Command, DynClass, DynObject, EventArgs, ObjectRef, ObservableList,
        ObservableMap, Value, ValueKind,
    };
    #[cfg(feature = "runtime")]
    pub use gossamer_runtime::{
        BindMode, Binding, BindingConfig, BindingKind, BindingRegistry, Engine, Flow,
        ValueConverter,
    };
}
