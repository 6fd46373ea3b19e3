#![forbid(unsafe_code)]

//! Collection bindings: a target list mirrors a source collection.
//!
//! A full update clears the target and regenerates it item by item. Incremental
//! `CollectionChanged` notifications are replayed as single-item inserts and
//! removals; `Replace` is a removal followed by an insert at the same index.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use gossamer_core::{BindError, CollectionChange, Container, ListAccess, Result, Value};

use super::{Binding, BindingCore, KindState};
use crate::convert::{CollectionHandler, DataGenerator};
use crate::endpoint::Endpoint;

#[derive(Default)]
pub(crate) struct CollectionState {
    generator: RefCell<Option<Rc<dyn DataGenerator>>>,
    handler: RefCell<Option<Rc<dyn CollectionHandler>>>,
}

/// Items of an enumerable source value. Maps enumerate their values in key
/// order; null is empty.
fn source_items(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(object) => match object.container() {
            Some(Container::List(list)) => Ok(list.items()),
            Some(Container::Map(map)) => Ok(map
                .keys()
                .iter()
                .filter_map(|key| map.get(key))
                .collect()),
            None => Err(BindError::NotSupported(format!(
                "'{}' is not an enumerable collection",
                object.descriptor().name()
            ))),
        },
        other => Err(BindError::NotSupported(format!(
            "a {} value is not an enumerable collection",
            other.kind()
        ))),
    }
}

/// Run `f` on the target list. A null target is skipped.
fn with_list(target: &Value, f: impl FnOnce(&dyn ListAccess) -> Result<()>) -> Result<()> {
    match target {
        Value::Null => Ok(()),
        Value::Object(object) => match object.container() {
            Some(Container::List(list)) => f(list),
            _ => Err(BindError::NotSupported(format!(
                "collection target '{}' is not a list and no handler is set",
                object.descriptor().name()
            ))),
        },
        other => Err(BindError::NotSupported(format!(
            "collection target of kind {} is not a list",
            other.kind()
        ))),
    }
}

impl CollectionState {
    fn generate(&self, core: &BindingCore, item: &Value) -> Result<Value> {
        let generator = self.generator.borrow().clone();
        match generator {
            Some(generator) => generator.generate(item, &core.parameter()),
            None => Ok(item.clone()),
        }
    }

    fn insert(&self, target: &Value, index: usize, item: Value) -> Result<()> {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => handler.insert(target, index, item),
            None => with_list(target, |list| list.insert(index, item)),
        }
    }

    fn remove_at(&self, target: &Value, index: usize) -> Result<()> {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => handler.remove_at(target, index),
            None => with_list(target, |list| list.remove_at(index).map(drop)),
        }
    }

    fn clear(&self, target: &Value) -> Result<()> {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => handler.clear(target),
            None => with_list(target, |list| list.clear()),
        }
    }

    pub(super) fn regenerate(
        &self,
        core: &BindingCore,
        source: &Endpoint,
        target: &Endpoint,
    ) -> Result<()> {
        let items = source_items(&source.value()?)?;
        let list = target.value()?;
        self.clear(&list)?;
        for (index, item) in items.iter().enumerate() {
            let generated = self.generate(core, item)?;
            self.insert(&list, index, generated)?;
        }
        tracing::trace!(binding = core.id.get(), items = items.len(), "collection regenerated");
        Ok(())
    }

    pub(super) fn apply(
        &self,
        core: &BindingCore,
        change: &CollectionChange,
        source: &Endpoint,
        target: &Endpoint,
    ) -> Result<()> {
        let list = target.value()?;
        match change {
            CollectionChange::Add { index, items } => {
                for (offset, item) in items.iter().enumerate() {
                    let generated = self.generate(core, item)?;
                    self.insert(&list, index + offset, generated)?;
                }
            }
            CollectionChange::Remove { index, items } => {
                for _ in items {
                    self.remove_at(&list, *index)?;
                }
            }
            CollectionChange::Replace { index, old, new } => {
                for _ in old {
                    self.remove_at(&list, *index)?;
                }
                for (offset, item) in new.iter().enumerate() {
                    let generated = self.generate(core, item)?;
                    self.insert(&list, index + offset, generated)?;
                }
            }
            CollectionChange::Reset => return self.regenerate(core, source, target),
        }
        tracing::trace!(binding = core.id.get(), ?change, "collection change applied");
        Ok(())
    }
}

/// A [`Binding`] that keeps a target list in step with a source collection.
#[derive(Clone)]
pub struct CollectionBinding {
    binding: Binding,
    state: Rc<CollectionState>,
}

impl CollectionBinding {
    /// Transform each source item before it is inserted into the target.
    pub fn set_generator(&self, generator: impl DataGenerator + 'static) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        *self.state.generator.borrow_mut() = Some(Rc::new(generator));
        self.binding.core.configured()?;
        Ok(self)
    }

    /// Route target mutations through `handler` instead of a list.
    pub fn set_handler(&self, handler: impl CollectionHandler + 'static) -> Result<&Self> {
        self.binding.core.ensure_live()?;
        *self.state.handler.borrow_mut() = Some(Rc::new(handler));
        self.binding.core.configured()?;
        Ok(self)
    }

    #[must_use]
    pub fn into_binding(self) -> Binding {
        self.binding
    }
}

impl Deref for CollectionBinding {
    type Target = Binding;

    fn deref(&self) -> &Binding {
        &self.binding
    }
}

impl TryFrom<Binding> for CollectionBinding {
    type Error = BindError;

    fn try_from(binding: Binding) -> Result<Self> {
        let state = match &binding.core.kind {
            KindState::Collection(state) => Rc::clone(state),
            _ => {
                return Err(BindError::NotSupported(format!(
                    "{:?} binding is not a collection binding",
                    binding.kind()
                )));
            }
        };
        Ok(Self { binding, state })
    }
}

impl std::fmt::Debug for CollectionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionBinding")
            .field("binding", &self.binding)
            .field("generator", &self.state.generator.borrow().is_some())
            .field("handler", &self.state.handler.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingKind;
    use crate::config::BindingConfig;
    use gossamer_core::{
        Bindable, COLLECTION_CHANGED, DynClass, MemberAccessor, ObjectRef, ObservableList,
        ObservableMap, ValueKind,
    };

    fn bind(target: ObjectRef, source: ObjectRef, source_path: Option<&str>) -> CollectionBinding {
        let binding = Binding::build(
            &Rc::new(MemberAccessor::new()),
            &Rc::new(BindingConfig::default()),
            KindState::for_kind(BindingKind::Collection),
            &target,
            None,
            &source,
            source_path,
        )
        .unwrap();
        binding.initialize().unwrap();
        CollectionBinding::try_from(binding).unwrap()
    }

    fn ints(list: &ObservableList) -> Vec<i64> {
        list.items().iter().filter_map(Value::as_int).collect()
    }

    #[test]
    fn initial_regeneration_copies_items() {
        let source = ObservableList::from_items(vec![Value::Int(1), Value::Int(2)]);
        let target = ObservableList::new();
        let _binding = bind(target.clone(), source.clone(), None);
        assert_eq!(ints(&target), vec![1, 2]);
    }

    #[test]
    fn replace_is_remove_then_add() {
        let source = ObservableList::from_items(vec![Value::Int(1), Value::Int(2)]);
        let target = ObservableList::new();
        let _binding = bind(target.clone(), source.clone(), None);
        source.set(1, Value::Int(9)).unwrap();
        assert_eq!(ints(&target), vec![1, 9]);
    }

    #[test]
    fn generator_transforms_items() {
        let source = ObservableList::from_items(vec![Value::Int(3)]);
        let target = ObservableList::new();
        let binding = bind(target.clone(), source.clone(), None);
        binding
            .set_generator(|item: &Value, _: &Value| -> Result<Value> {
                Ok(Value::Int(item.as_int().unwrap_or(0) * 10))
            })
            .unwrap();
        assert_eq!(ints(&target), vec![30]);
        source.push(Value::Int(4)).unwrap();
        assert_eq!(ints(&target), vec![30, 40]);
    }

    #[test]
    fn map_source_enumerates_values_in_key_order() {
        let source = ObservableMap::new();
        source.insert("b", 2).unwrap();
        source.insert("a", 1).unwrap();
        let target = ObservableList::new();
        let _binding = bind(target.clone(), source.clone(), None);
        assert_eq!(ints(&target), vec![1, 2]);
        source.insert("c", 3).unwrap();
        assert_eq!(ints(&target), vec![1, 2, 3]);
    }

    #[test]
    fn non_list_target_without_handler_is_not_supported() {
        let source = ObservableList::from_items(vec![Value::Int(1)]);
        let class = DynClass::builder("Plain").property("X", ValueKind::Int).build();
        let target: ObjectRef = class.instantiate();
        let source: ObjectRef = source;
        let binding = Binding::build(
            &Rc::new(MemberAccessor::new()),
            &Rc::new(BindingConfig::default()),
            KindState::for_kind(BindingKind::Collection),
            &target,
            None,
            &source,
            None,
        )
        .unwrap();
        assert!(binding.initialize().unwrap_err().is_not_supported());
    }

    #[test]
    fn replaced_source_collection_is_followed() {
        let class = DynClass::builder("Vm")
            .property("Items", ValueKind::Object)
            .build();
        let vm = class.instantiate();
        let first = ObservableList::from_items(vec![Value::Int(1)]);
        vm.set("Items", first.clone() as ObjectRef).unwrap();
        let target = ObservableList::new();
        let _binding = bind(target.clone(), vm.clone(), Some("Items"));
        assert_eq!(ints(&target), vec![1]);

        let second = ObservableList::from_items(vec![Value::Int(5), Value::Int(6)]);
        vm.set("Items", second.clone() as ObjectRef).unwrap();
        assert_eq!(ints(&target), vec![5, 6]);
        assert_eq!(first.events().unwrap().handler_count(COLLECTION_CHANGED), 0);

        second.remove_at(0).unwrap();
        assert_eq!(ints(&target), vec![6]);
    }
}
