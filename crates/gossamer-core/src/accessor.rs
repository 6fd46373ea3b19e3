#![forbid(unsafe_code)]

//! Name-based member access with resolution caching.
//!
//! [`MemberAccessor`] is the dispatch layer between the binding engine and
//! the objects it binds. Given an object (or a type, for statics) and a member
//! name it resolves the member through the object's [`TypeDescriptor`],
//! caches the resolution, and invokes it.
//!
//! # Resolution Rules
//!
//! - Properties and fields are looked up by exact name.
//! - Indexers: containers ([`Container::List`] / [`Container::Map`]) first;
//!   otherwise the first declared indexer whose key kind the key converts to,
//!   in declaration order.
//! - Methods: first instance (or static) overload with matching arity whose
//!   parameters accept the arguments, in declaration order; failing that, the
//!   first static method of each registered extension type (in registration
//!   order) taking the instance as an implicit first argument.
//! - Events: declared instance or static events.
//!
//! Resolutions are cached per `(type, name, arity, member kind)`. The cache is
//! owned by the accessor, so independent accessors never share state.
//!
//! # Failure Modes
//!
//! | Failure | Result |
//! |---------|--------|
//! | Unknown member, or missing getter/setter | `MissingMember` |
//! | No overload accepts the arguments | `MissingMember` |
//! | `contains_index` on a non-container | `NotSupported` |
//! | Key of the wrong shape for a list | `TypeMismatch` |
//! | Raise of a declared event without subscribers | `Ok(())` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::descriptor::{IndexerDef, MethodDef, PropertyDef, TypeDescriptor, TypeKey};
use crate::error::{BindError, Result};
use crate::event::EventArgs;
use crate::object::{Bindable, Container, ObjectRef};
use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MemberKind {
    Property,
    Field,
    Indexer,
    Method,
    StaticMethod,
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    ty: TypeKey,
    name: Rc<str>,
    arity: usize,
    member: MemberKind,
}

/// A method overload candidate, possibly contributed by an extension type.
#[derive(Clone, Debug)]
struct Candidate {
    def: MethodDef,
    origin: TypeKey,
    extension: bool,
}

#[derive(Clone, Debug)]
enum Resolved {
    Property(PropertyDef),
    Indexers(Rc<[IndexerDef]>),
    Methods(Rc<[Candidate]>),
    Event,
}

impl Resolved {
    fn points_into(&self, ty: TypeKey) -> bool {
        match self {
            Self::Methods(candidates) => candidates.iter().any(|c| c.origin == ty),
            _ => false,
        }
    }
}

/// Cache statistics, mainly for tests and benchmarks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// A method chosen by overload resolution, ready to invoke.
#[derive(Clone)]
pub struct MethodHandle {
    def: MethodDef,
    extension: bool,
}

impl MethodHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[must_use]
    pub fn returns(&self) -> ValueKind {
        self.def.returns
    }

    #[must_use]
    pub fn is_extension(&self) -> bool {
        self.extension
    }

    /// Invoke on `instance` (ignored by static overloads).
    pub fn invoke(&self, instance: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
        if self.extension {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(instance.map_or(Value::Null, |o| Value::Object(Rc::clone(o))));
            full.extend_from_slice(args);
            return (self.def.invoke)(None, &full);
        }
        let receiver: Option<&dyn Bindable> = if self.def.is_static {
            None
        } else {
            instance.map(|o| &**o)
        };
        (self.def.invoke)(receiver, args)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("def", &self.def)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Resolves and invokes members by name.
#[derive(Default)]
pub struct MemberAccessor {
    cache: RefCell<AHashMap<CacheKey, Resolved>>,
    extensions: RefCell<AHashMap<TypeKey, Vec<Rc<TypeDescriptor>>>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl MemberAccessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Properties and fields
    // ------------------------------------------------------------------

    pub fn get_property(&self, instance: &ObjectRef, name: &str) -> Result<Value> {
        let desc = instance.descriptor();
        let def = self.resolve_slot(&desc, name, MemberKind::Property)?;
        read_slot(&desc, &def, Some(&**instance))
    }

    pub fn set_property(&self, instance: &ObjectRef, name: &str, value: Value) -> Result<()> {
        let desc = instance.descriptor();
        let def = self.resolve_slot(&desc, name, MemberKind::Property)?;
        write_slot(&desc, &def, Some(&**instance), value)
    }

    pub fn get_field(&self, instance: &ObjectRef, name: &str) -> Result<Value> {
        let desc = instance.descriptor();
        let def = self.resolve_slot(&desc, name, MemberKind::Field)?;
        read_slot(&desc, &def, Some(&**instance))
    }

    pub fn set_field(&self, instance: &ObjectRef, name: &str, value: Value) -> Result<()> {
        let desc = instance.descriptor();
        let def = self.resolve_slot(&desc, name, MemberKind::Field)?;
        write_slot(&desc, &def, Some(&**instance), value)
    }

    pub fn get_static_property(&self, ty: &TypeDescriptor, name: &str) -> Result<Value> {
        let def = self.resolve_slot(ty, name, MemberKind::Property)?;
        if !def.is_static {
            return Err(ty.missing(name));
        }
        read_slot(ty, &def, None)
    }

    pub fn set_static_property(&self, ty: &TypeDescriptor, name: &str, value: Value) -> Result<()> {
        let def = self.resolve_slot(ty, name, MemberKind::Property)?;
        if !def.is_static {
            return Err(ty.missing(name));
        }
        write_slot(ty, &def, None, value)
    }

    /// Property, falling back to a field of the same name.
    pub fn get_member(&self, instance: &ObjectRef, name: &str) -> Result<Value> {
        let desc = instance.descriptor();
        let def = self.resolve_member_slot(&desc, name)?;
        read_slot(&desc, &def, Some(&**instance))
    }

    /// Property, falling back to a field of the same name.
    pub fn set_member(&self, instance: &ObjectRef, name: &str, value: Value) -> Result<()> {
        let desc = instance.descriptor();
        let def = self.resolve_member_slot(&desc, name)?;
        write_slot(&desc, &def, Some(&**instance), value)
    }

    /// Declared kind of a property or field on the instance's runtime type.
    pub fn property_kind(&self, instance: &ObjectRef, name: &str) -> Result<ValueKind> {
        let desc = instance.descriptor();
        Ok(self.resolve_member_slot(&desc, name)?.kind)
    }

    fn resolve_member_slot(&self, desc: &TypeDescriptor, name: &str) -> Result<PropertyDef> {
        match self.resolve_slot(desc, name, MemberKind::Property) {
            Err(err) if err.is_missing_member() => self.resolve_slot(desc, name, MemberKind::Field),
            other => other,
        }
    }

    fn resolve_slot(
        &self,
        desc: &TypeDescriptor,
        name: &str,
        member: MemberKind,
    ) -> Result<PropertyDef> {
        let key = CacheKey {
            ty: desc.key(),
            name: Rc::from(name),
            arity: 0,
            member,
        };
        if let Some(Resolved::Property(def)) = self.cached(&key) {
            return Ok(def);
        }
        let found = match member {
            MemberKind::Field => desc.field(name),
            _ => desc.property(name),
        };
        let def = found.cloned().ok_or_else(|| desc.missing(name))?;
        self.store(key, Resolved::Property(def.clone()));
        Ok(def)
    }

    // ------------------------------------------------------------------
    // Indexers
    // ------------------------------------------------------------------

    pub fn get_indexed(&self, instance: &ObjectRef, key: &Value) -> Result<Value> {
        let desc = instance.descriptor();
        match instance.container() {
            Some(Container::List(list)) => {
                let index = list_index(key)?;
                list.get(index).ok_or_else(|| {
                    BindError::ArgumentInvalid(format!(
                        "index {index} out of range for {} of length {}",
                        desc.name(),
                        list.len()
                    ))
                })
            }
            Some(Container::Map(map)) => {
                let k = map_key(key);
                map.get(&k)
                    .ok_or_else(|| BindError::ArgumentInvalid(format!("key '{k}' not present")))
            }
            None => {
                let (def, key) = self.resolve_indexer(&desc, key)?;
                (def.get)(&**instance, &key)
            }
        }
    }

    pub fn set_indexed(&self, instance: &ObjectRef, key: &Value, value: Value) -> Result<()> {
        let desc = instance.descriptor();
        match instance.container() {
            Some(Container::List(list)) => list.set(list_index(key)?, value),
            Some(Container::Map(map)) => map.insert(&map_key(key), value),
            None => {
                let (def, key) = self.resolve_indexer(&desc, key)?;
                let set = def.set.as_ref().ok_or_else(|| desc.missing("[]"))?;
                set(&**instance, &key, value)
            }
        }
    }

    /// Presence check for an indexed item.
    ///
    /// Maps answer by key lookup; lists bounds-check integer keys (keys that
    /// are not integers are never present). Any other indexable type is
    /// `NotSupported`.
    pub fn contains_index(&self, instance: &ObjectRef, key: &Value) -> Result<bool> {
        match instance.container() {
            Some(Container::List(list)) => {
                Ok(list_index(key).is_ok_and(|index| index < list.len()))
            }
            Some(Container::Map(map)) => Ok(map.contains_key(&map_key(key))),
            None => Err(BindError::NotSupported(format!(
                "type '{}' is neither a list nor a dictionary",
                instance.descriptor().name()
            ))),
        }
    }

    /// Declared value kind of the indexer that would serve `key`.
    pub fn indexer_kind(&self, instance: &ObjectRef, key: &Value) -> Result<ValueKind> {
        if instance.container().is_some() {
            return Ok(ValueKind::Any);
        }
        let desc = instance.descriptor();
        Ok(self.resolve_indexer(&desc, key)?.0.value)
    }

    fn resolve_indexer(&self, desc: &TypeDescriptor, key: &Value) -> Result<(IndexerDef, Value)> {
        let cache_key = CacheKey {
            ty: desc.key(),
            name: Rc::from("[]"),
            arity: 1,
            member: MemberKind::Indexer,
        };
        let indexers = match self.cached(&cache_key) {
            Some(Resolved::Indexers(list)) => list,
            _ => {
                let list: Rc<[IndexerDef]> = Rc::from(desc.indexers());
                self.store(cache_key, Resolved::Indexers(Rc::clone(&list)));
                list
            }
        };
        indexers
            .iter()
            .find_map(|def| key.convert_to(def.key).ok().map(|k| (def.clone(), k)))
            .ok_or_else(|| desc.missing("[]"))
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    /// Overload resolution without invocation.
    pub fn resolve_method(
        &self,
        instance: &ObjectRef,
        name: &str,
        args: &[Value],
    ) -> Result<MethodHandle> {
        let desc = instance.descriptor();
        let candidates = self.method_candidates(&desc, name, args.len(), true);
        candidates
            .iter()
            .find(|c| {
                if c.extension {
                    c.def.params.len() == args.len() + 1
                        && c.def.params[0].accepts(&Value::Object(Rc::clone(instance)))
                        && c.def.params[1..]
                            .iter()
                            .zip(args)
                            .all(|(kind, arg)| kind.accepts(arg))
                } else {
                    c.def.accepts(args)
                }
            })
            .map(|c| MethodHandle {
                def: c.def.clone(),
                extension: c.extension,
            })
            .ok_or_else(|| desc.missing(name))
    }

    pub fn invoke_method(&self, instance: &ObjectRef, name: &str, args: &[Value]) -> Result<Value> {
        self.resolve_method(instance, name, args)?
            .invoke(Some(instance), args)
    }

    /// Invoke a static method declared directly on `ty`.
    pub fn invoke_static(&self, ty: &TypeDescriptor, name: &str, args: &[Value]) -> Result<Value> {
        let candidates = self.method_candidates(ty, name, args.len(), false);
        let def = candidates
            .iter()
            .find(|c| c.def.is_static && c.def.accepts(args))
            .map(|c| c.def.clone())
            .ok_or_else(|| ty.missing(name))?;
        (def.invoke)(None, args)
    }

    fn method_candidates(
        &self,
        desc: &TypeDescriptor,
        name: &str,
        arity: usize,
        with_extensions: bool,
    ) -> Rc<[Candidate]> {
        let key = CacheKey {
            ty: desc.key(),
            name: Rc::from(name),
            arity,
            member: if with_extensions {
                MemberKind::Method
            } else {
                MemberKind::StaticMethod
            },
        };
        if let Some(Resolved::Methods(list)) = self.cached(&key) {
            return list;
        }
        let mut list: Vec<Candidate> = desc
            .methods_named(name)
            .filter(|m| m.params.len() == arity)
            .map(|m| Candidate {
                def: m.clone(),
                origin: desc.key(),
                extension: false,
            })
            .collect();
        if with_extensions {
            if let Some(exts) = self.extensions.borrow().get(&desc.key()) {
                for ext in exts {
                    list.extend(
                        ext.methods_named(name)
                            .filter(|m| m.is_static && m.params.len() == arity + 1)
                            .map(|m| Candidate {
                                def: m.clone(),
                                origin: ext.key(),
                                extension: true,
                            }),
                    );
                }
            }
        }
        let list: Rc<[Candidate]> = Rc::from(list);
        self.store(key, Resolved::Methods(Rc::clone(&list)));
        list
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Verify that `name` is a declared event of the instance's runtime type.
    pub fn resolve_event(&self, ty: &TypeDescriptor, name: &str) -> Result<()> {
        let key = CacheKey {
            ty: ty.key(),
            name: Rc::from(name),
            arity: 0,
            member: MemberKind::Event,
        };
        if let Some(Resolved::Event) = self.cached(&key) {
            return Ok(());
        }
        if !ty.declares_event(name) {
            return Err(ty.missing(name));
        }
        self.store(key, Resolved::Event);
        Ok(())
    }

    /// Raise a declared instance event. No subscribers is not an error.
    pub fn raise_event(&self, instance: &ObjectRef, name: &str, args: &EventArgs) -> Result<()> {
        let desc = instance.descriptor();
        self.resolve_event(&desc, name)?;
        match instance.events() {
            Some(hub) => hub.raise(&Value::Object(Rc::clone(instance)), name, args),
            None => Ok(()),
        }
    }

    /// Raise a declared static event.
    pub fn raise_static_event(&self, ty: &TypeDescriptor, name: &str, args: &EventArgs) -> Result<()> {
        self.resolve_event(ty, name)?;
        ty.static_events().raise(&Value::Null, name, args)
    }

    // ------------------------------------------------------------------
    // Extensions and cache lifecycle
    // ------------------------------------------------------------------

    /// Make the static methods of `extension` callable as instance methods of
    /// `ty`. Registering the same extension twice is a no-op.
    pub fn register_extension_type(&self, ty: &TypeDescriptor, extension: Rc<TypeDescriptor>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            ty = ty.name(),
            extension = extension.name(),
            "register extension type"
        );
        {
            let mut exts = self.extensions.borrow_mut();
            let list = exts.entry(ty.key()).or_default();
            if list.iter().any(|e| e.key() == extension.key()) {
                return;
            }
            list.push(extension);
        }
        let target = ty.key();
        self.cache
            .borrow_mut()
            .retain(|k, _| !(k.ty == target && k.member == MemberKind::Method));
    }

    /// Remove an extension and purge every cached resolution pointing into it.
    /// Returns whether it was registered.
    pub fn unregister_extension_type(&self, ty: &TypeDescriptor, extension: &TypeDescriptor) -> bool {
        let removed = {
            let mut exts = self.extensions.borrow_mut();
            let Some(list) = exts.get_mut(&ty.key()) else {
                return false;
            };
            let before = list.len();
            list.retain(|e| e.key() != extension.key());
            before != list.len()
        };
        let gone = extension.key();
        let target = ty.key();
        self.cache.borrow_mut().retain(|k, resolved| {
            !resolved.points_into(gone) && !(k.ty == target && k.member == MemberKind::Method)
        });
        removed
    }

    /// Registered extension type names for `ty`, in lookup order.
    #[must_use]
    pub fn extension_types(&self, ty: &TypeDescriptor) -> Vec<Rc<TypeDescriptor>> {
        self.extensions
            .borrow()
            .get(&ty.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every cached resolution.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
        self.hits.set(0);
        self.misses.set(0);
    }

    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
            entries: self.cache.borrow().len(),
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<Resolved> {
        let found = self.cache.borrow().get(key).cloned();
        if found.is_some() {
            self.hits.set(self.hits.get() + 1);
        } else {
            self.misses.set(self.misses.get() + 1);
            #[cfg(feature = "tracing")]
            tracing::trace!(ty = key.ty.id(), name = %key.name, member = ?key.member, "member cache miss");
        }
        found
    }

    fn store(&self, key: CacheKey, resolved: Resolved) {
        self.cache.borrow_mut().insert(key, resolved);
    }
}

impl fmt::Debug for MemberAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberAccessor")
            .field("stats", &self.cache_stats())
            .field("extended_types", &self.extensions.borrow().len())
            .finish()
    }
}

fn read_slot(desc: &TypeDescriptor, def: &PropertyDef, receiver: Option<&dyn Bindable>) -> Result<Value> {
    let get = def.get.as_ref().ok_or_else(|| desc.missing(&def.name))?;
    get(if def.is_static { None } else { receiver })
}

fn write_slot(
    desc: &TypeDescriptor,
    def: &PropertyDef,
    receiver: Option<&dyn Bindable>,
    value: Value,
) -> Result<()> {
    let set = def.set.as_ref().ok_or_else(|| desc.missing(&def.name))?;
    set(if def.is_static { None } else { receiver }, value)
}

fn list_index(key: &Value) -> Result<usize> {
    let index = key.convert_to(ValueKind::Int)?;
    index
        .as_int()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| BindError::ArgumentInvalid(format!("negative list index {index:?}")))
}

fn map_key(key: &Value) -> String {
    key.to_string()
}
