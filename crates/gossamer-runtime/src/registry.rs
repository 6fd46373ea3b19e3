#![forbid(unsafe_code)]

//! Per-target binding table.
//!
//! The registry owns the bindings it hands out and keys them by their target
//! object, which it only references weakly. A key is the triple
//! `(target path, source identity, source path)`; asking twice for the same
//! key returns the existing binding, and asking for a different kind is an
//! error that leaves the existing binding untouched.

use std::rc::Rc;

use ahash::AHashMap;
use gossamer_core::{BindError, ObjectRef, Result, WeakObject, object_addr, weak_addr};

use crate::binding::{Binding, BindingKind};
use crate::engine::Engine;

/// Identifies one logical binding of a target.
#[derive(Clone)]
struct EntryKey {
    target_path: Option<Rc<str>>,
    source: WeakObject,
    source_path: Option<Rc<str>>,
}

impl EntryKey {
    fn matches(&self, target_path: Option<&str>, source: &ObjectRef, source_path: Option<&str>) -> bool {
        self.target_path.as_deref() == target_path
            && self.source_path.as_deref() == source_path
            && self.source.strong_count() > 0
            && weak_addr(&self.source) == object_addr(source)
    }
}

struct Entry {
    key: EntryKey,
    binding: Binding,
}

struct TargetEntry {
    target: WeakObject,
    entries: Vec<Entry>,
}

impl TargetEntry {
    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// Bindings grouped by target object.
pub struct BindingRegistry {
    engine: Engine,
    targets: AHashMap<usize, TargetEntry>,
}

impl BindingRegistry {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            targets: AHashMap::new(),
        }
    }

    /// The binding for this key, created on first request.
    ///
    /// # Errors
    ///
    /// `NotSupported` if the key is already bound with a different kind, and
    /// any error raised while building the new binding.
    pub fn set_binding(
        &mut self,
        kind: BindingKind,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Result<Binding> {
        if let Some(existing) = self.get_binding(target, target_path, source, source_path) {
            if existing.kind() != kind {
                return Err(BindError::NotSupported(format!(
                    "'{}' is already bound as {:?}, cannot rebind as {kind:?}",
                    target_path.unwrap_or("<self>"),
                    existing.kind()
                )));
            }
            return Ok(existing);
        }

        let binding = self
            .engine
            .create(kind, target, target_path, source, source_path)?;
        let slot = self.slot(target);
        slot.entries.push(Entry {
            key: EntryKey {
                target_path: target_path.map(Rc::from),
                source: Rc::downgrade(source),
                source_path: source_path.map(Rc::from),
            },
            binding: binding.clone(),
        });
        tracing::debug!(binding = binding.id().get(), ?kind, "binding registered");
        Ok(binding)
    }

    /// The target's entry, replacing one left behind by a dead object at
    /// the same address.
    fn slot(&mut self, target: &ObjectRef) -> &mut TargetEntry {
        let entry = self
            .targets
            .entry(object_addr(target))
            .or_insert_with(|| TargetEntry {
                target: Rc::downgrade(target),
                entries: Vec::new(),
            });
        if !entry.is_alive() {
            for stale in entry.entries.drain(..) {
                stale.binding.clear();
            }
            entry.target = Rc::downgrade(target);
        }
        entry
    }

    fn live_entry(&self, target: &ObjectRef) -> Option<&TargetEntry> {
        self.targets
            .get(&object_addr(target))
            .filter(|entry| entry.is_alive())
    }

    #[must_use]
    pub fn get_binding(
        &self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> Option<Binding> {
        self.live_entry(target)?
            .entries
            .iter()
            .find(|e| e.key.matches(target_path, source, source_path))
            .map(|e| e.binding.clone())
    }

    /// Every binding registered for `target`.
    #[must_use]
    pub fn bindings(&self, target: &ObjectRef) -> Vec<Binding> {
        self.live_entry(target)
            .map(|entry| entry.entries.iter().map(|e| e.binding.clone()).collect())
            .unwrap_or_default()
    }

    /// Clear and forget one binding. Returns whether it existed.
    pub fn clear_binding(
        &mut self,
        target: &ObjectRef,
        target_path: Option<&str>,
        source: &ObjectRef,
        source_path: Option<&str>,
    ) -> bool {
        let addr = object_addr(target);
        let Some(entry) = self.targets.get_mut(&addr) else {
            return false;
        };
        let Some(index) = entry
            .entries
            .iter()
            .position(|e| e.key.matches(target_path, source, source_path))
        else {
            return false;
        };
        entry.entries.remove(index).binding.clear();
        if entry.entries.is_empty() {
            self.targets.remove(&addr);
        }
        true
    }

    /// Clear and forget every binding of `target`. Returns how many.
    pub fn clear_bindings(&mut self, target: &ObjectRef) -> usize {
        let Some(entry) = self.targets.remove(&object_addr(target)) else {
            return 0;
        };
        let count = entry.entries.len();
        for e in entry.entries {
            e.binding.clear();
        }
        count
    }

    /// Every registered binding whose source is `source`.
    #[must_use]
    pub fn bindings_for_source(&self, source: &ObjectRef) -> Vec<Binding> {
        let addr = object_addr(source);
        self.targets
            .values()
            .filter(|entry| entry.is_alive())
            .flat_map(|entry| &entry.entries)
            .filter(|e| e.key.source.strong_count() > 0 && weak_addr(&e.key.source) == addr)
            .map(|e| e.binding.clone())
            .collect()
    }

    /// Clear and forget every binding whose source is `source`.
    pub fn clear_bindings_for_source(&mut self, source: &ObjectRef) -> usize {
        let addr = object_addr(source);
        let mut cleared = 0;
        for entry in self.targets.values_mut() {
            entry.entries.retain(|e| {
                let hit = e.key.source.strong_count() > 0 && weak_addr(&e.key.source) == addr;
                if hit {
                    e.binding.clear();
                    cleared += 1;
                }
                !hit
            });
        }
        self.targets.retain(|_, entry| !entry.entries.is_empty());
        cleared
    }

    /// Drop entries whose target is gone, clearing their bindings. Returns
    /// how many bindings were dropped.
    pub fn purge(&mut self) -> usize {
        let mut purged = 0;
        self.targets.retain(|_, entry| {
            if entry.is_alive() {
                return true;
            }
            purged += entry.entries.len();
            for e in &entry.entries {
                e.binding.clear();
            }
            false
        });
        if purged > 0 {
            tracing::debug!(purged, "registry purged dead targets");
        }
        purged
    }

    /// Number of bindings held for live targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets
            .values()
            .filter(|entry| entry.is_alive())
            .map(|entry| entry.entries.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("targets", &self.targets.len())
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossamer_core::{DynClass, DynObject, ValueKind};

    fn form() -> Rc<DynClass> {
        DynClass::builder("Form")
            .property("Text", ValueKind::Str)
            .property("Title", ValueKind::Str)
            .build()
    }

    fn obj(o: &Rc<DynObject>) -> ObjectRef {
        o.clone()
    }

    #[test]
    fn same_key_returns_the_same_binding() {
        let class = form();
        let (view, vm) = (obj(&class.instantiate()), obj(&class.instantiate()));
        let mut registry = Engine::default().registry();
        let first = registry
            .set_binding(BindingKind::Property, &view, Some("Text"), &vm, Some("Title"))
            .unwrap();
        let again = registry
            .set_binding(BindingKind::Property, &view, Some("Text"), &vm, Some("Title"))
            .unwrap();
        assert!(first.ptr_eq(&again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clearing_by_target_and_source() {
        let class = form();
        let view = obj(&class.instantiate());
        let (a, b) = (obj(&class.instantiate()), obj(&class.instantiate()));
        let mut registry = Engine::default().registry();
        let ba = registry
            .set_binding(BindingKind::Property, &view, Some("Text"), &a, Some("Title"))
            .unwrap();
        registry
            .set_binding(BindingKind::Property, &view, Some("Title"), &b, Some("Title"))
            .unwrap();
        assert_eq!(registry.bindings_for_source(&a).len(), 1);

        assert_eq!(registry.clear_bindings_for_source(&a), 1);
        assert_eq!(ba.state(), crate::binding::BindingState::Cleared);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.clear_bindings(&view), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn purge_drops_dead_targets() {
        let class = form();
        let vm = obj(&class.instantiate());
        let mut registry = Engine::default().registry();
        {
            let view = obj(&class.instantiate());
            registry
                .set_binding(BindingKind::Property, &view, Some("Text"), &vm, Some("Title"))
                .unwrap();
        }
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.purge(), 1);
        assert_eq!(registry.purge(), 0);
    }
}
