#![forbid(unsafe_code)]

//! Shared binding context.

use std::rc::Rc;

use gossamer_core::{MemberAccessor, ObjectRef, Result};

use crate::binding::{
    Binding, BindingKind, CollectionBinding, CommandBinding, KindState, MethodBinding,
    NotifyBinding,
};
use crate::config::BindingConfig;
use crate::registry::BindingRegistry;

/// One member accessor and one configuration, shared by every binding
/// created through it. Cloning is cheap and shares both.
#[derive(Clone, Default)]
pub struct Engine {
    accessor: Rc<MemberAccessor>,
    config: Rc<BindingConfig>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: BindingConfig) -> Self {
        Self {
            accessor: Rc::new(MemberAccessor::new()),
            config: Rc::new(config),
        }
    }

    #[must_use]
    pub fn accessor(&self) -> &Rc<MemberAccessor> {
        &self.accessor
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Build and initialize a binding of `kind`.
    pub fn create(
        &self,
        kind: BindingKind,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<Binding> {
        let binding = Binding::build(
            &self.accessor,
            &self.config,
            KindState::for_kind(kind),
            target,
            target_path,
            source,
            source_path,
        )?;
        binding.initialize()?;
        tracing::debug!(binding = binding.id().get(), ?kind, "binding created");
        Ok(binding)
    }

    /// Property binding `target.target_path <- source.source_path`.
    pub fn bind(
        &self,
        target: &ObjectRef,
        target_path: &str,
        source: &ObjectRef,
        source_path: &str,
    ) -> Result<Binding> {
        self.create(
            BindingKind::Property,
            target,
            Some(target_path),
            source,
            Some(source_path),
        )
    }

    /// Keep the list at `target_path` (or `target` itself) in step with the
    /// collection at `source_path`.
    pub fn bind_collection(
        &self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<CollectionBinding> {
        self.create(BindingKind::Collection, target, target_path, source, source_path)?
            .try_into()
    }

    /// Run the command at `source_path` from a target event. Attach the
    /// event with [`Binding::attach_target_event`].
    pub fn bind_command(
        &self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<CommandBinding> {
        self.create(BindingKind::Command, target, target_path, source, source_path)?
            .try_into()
    }

    pub fn bind_method(
        &self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<MethodBinding> {
        self.create(BindingKind::Method, target, target_path, source, source_path)?
            .try_into()
    }

    pub fn bind_notify(
        &self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<NotifyBinding> {
        self.create(BindingKind::Notify, target, target_path, source, source_path)?
            .try_into()
    }

    /// A new, empty registry sharing this engine.
    #[must_use]
    pub fn registry(&self) -> BindingRegistry {
        BindingRegistry::new(self.clone())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("accessor", &self.accessor)
            .field("config", &self.config)
            .finish()
    }
}
