#![forbid(unsafe_code)]

//! Property paths and their live observation chains.
//!
//! A path such as `"Order.Lines[2].Product.Name"` parses into a list of
//! [`PathKey`]s. A [`PathObservation`] turns that list into a chain of
//! [`PathSegment`]s, one per key, each holding a weak reference to the object
//! it currently reads from.
//!
//! # Grammar
//!
//! ```text
//! path    := segment ('.' segment)*
//! segment := name | name index+ | index+
//! index   := '[' key ']'
//! ```
//!
//! Parsing scans left to right; whichever of `.` or `[` comes first decides
//! how the current component ends. Keys that parse as integers become
//! `Value::Int`, anything else a string key. Nothing is validated at parse
//! time: `"A..B"` yields an empty name that only fails once it is resolved.
//!
//! # Invariants
//!
//! 1. Each segment holds at most one set of subscriptions, on its current
//!    source only. Assigning a new source drops the old subscriptions first.
//! 2. A change on a segment's source is pushed down to every later segment
//!    before the chain owner is notified.
//! 3. Reads never fail because of a dead or null link: they yield the default
//!    of the kind the leaf last resolved to instead.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use gossamer_core::{
    COLLECTION_CHANGED, EventSubscription, INDEXER_NAME, MemberAccessor, ObjectRef,
    PROPERTY_CHANGED, Result, Value, ValueKind, WeakObject,
};

/// One component of a property path.
#[derive(Clone, Debug, PartialEq)]
pub enum PathKey {
    Property(Rc<str>),
    Index(Value),
}

impl PathKey {
    fn index(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(i) => Self::Index(Value::Int(i)),
            Err(_) => {
                let unquoted = raw
                    .strip_prefix('"')
                    .and_then(|r| r.strip_suffix('"'))
                    .unwrap_or(raw);
                Self::Index(Value::from(unquoted))
            }
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(name) => f.write_str(name),
            Self::Index(key) => write!(f, "[{key}]"),
        }
    }
}

/// A parsed property path.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPath {
    keys: Vec<PathKey>,
}

impl PropertyPath {
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut keys = Vec::new();
        let mut rest = path;
        loop {
            match rest.find(['.', '[']) {
                None => {
                    keys.push(PathKey::Property(Rc::from(rest)));
                    break;
                }
                Some(at) if rest.as_bytes()[at] == b'.' => {
                    keys.push(PathKey::Property(Rc::from(&rest[..at])));
                    rest = &rest[at + 1..];
                }
                Some(at) => {
                    if at > 0 {
                        keys.push(PathKey::Property(Rc::from(&rest[..at])));
                    }
                    rest = &rest[at..];
                    // One or more `[key]` groups.
                    while let Some(inner) = rest.strip_prefix('[') {
                        match inner.find(']') {
                            Some(close) => {
                                keys.push(PathKey::index(&inner[..close]));
                                rest = &inner[close + 1..];
                            }
                            None => {
                                keys.push(PathKey::index(inner));
                                rest = "";
                            }
                        }
                    }
                    if rest.is_empty() {
                        break;
                    }
                    rest = rest.strip_prefix('.').unwrap_or(rest);
                }
            }
        }
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// A single plain property name.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(self.keys.as_slice(), [PathKey::Property(_)])
    }

    #[must_use]
    pub fn leaf(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    /// Name of the final component, if it is a property.
    #[must_use]
    pub fn leaf_property(&self) -> Option<&str> {
        match self.keys.last() {
            Some(PathKey::Property(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 && matches!(key, PathKey::Property(_)) {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

pub(crate) type TailCallback = Rc<dyn Fn() -> Result<()>>;

/// One live link of an observation chain.
pub struct PathSegment {
    key: PathKey,
    accessor: Rc<MemberAccessor>,
    source: RefCell<Option<WeakObject>>,
    kind: Cell<ValueKind>,
    child: Option<Rc<PathSegment>>,
    subscriptions: RefCell<Vec<EventSubscription>>,
    tail: TailCallback,
}

impl PathSegment {
    #[must_use]
    pub fn key(&self) -> &PathKey {
        &self.key
    }

    /// Declared kind of the member this segment reads.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind.get()
    }

    #[must_use]
    pub fn source(&self) -> Option<ObjectRef> {
        self.source.borrow().as_ref().and_then(WeakObject::upgrade)
    }

    /// Number of live event subscriptions held on the current source.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Point this segment at a new source, re-subscribe, and propagate.
    fn set_source(self: &Rc<Self>, source: Option<ObjectRef>) -> Result<()> {
        self.subscriptions.borrow_mut().clear();
        *self.source.borrow_mut() = source.as_ref().map(Rc::downgrade);

        if let Some(object) = &source {
            let kind = match &self.key {
                PathKey::Property(name) => self.accessor.property_kind(object, name)?,
                PathKey::Index(key) => self.accessor.indexer_kind(object, key)?,
            };
            self.kind.set(kind);
            self.subscribe(object);
        }
        self.propagate()
    }

    fn subscribe(self: &Rc<Self>, object: &ObjectRef) {
        let Some(hub) = object.events() else {
            return;
        };
        let desc = object.descriptor();
        let weak = Rc::downgrade(self);
        let subscription = match &self.key {
            PathKey::Property(name) => {
                if !desc.declares_event(PROPERTY_CHANGED) {
                    return;
                }
                let name = Rc::clone(name);
                hub.subscribe(PROPERTY_CHANGED, move |_, args| {
                    match (weak.upgrade(), args.property_name()) {
                        (Some(segment), Some(changed)) if changed == &*name => segment.propagate(),
                        _ => Ok(()),
                    }
                })
            }
            PathKey::Index(key) if desc.declares_event(COLLECTION_CHANGED) => {
                let position = key.as_int().and_then(|i| usize::try_from(i).ok());
                hub.subscribe(COLLECTION_CHANGED, move |_, args| {
                    let Some(segment) = weak.upgrade() else {
                        return Ok(());
                    };
                    let hit = match (args.collection_change(), position) {
                        (Some(change), Some(index)) => change.touches_index(index),
                        // Keyed containers carry no position.
                        (Some(_), None) => true,
                        (None, _) => false,
                    };
                    if hit { segment.propagate() } else { Ok(()) }
                })
            }
            PathKey::Index(_) => {
                if !desc.declares_event(PROPERTY_CHANGED) {
                    return;
                }
                hub.subscribe(PROPERTY_CHANGED, move |_, args| {
                    match weak.upgrade() {
                        Some(segment) if args.property_name() == Some(INDEXER_NAME) => {
                            segment.propagate()
                        }
                        _ => Ok(()),
                    }
                })
            }
        };
        self.subscriptions.borrow_mut().push(subscription);
    }

    /// Re-read this segment and hand the result to the next one, or to the
    /// chain owner at the tail.
    fn propagate(&self) -> Result<()> {
        match &self.child {
            Some(child) => {
                let next = self.value()?.as_object().cloned();
                child.set_source(next)
            }
            None => (self.tail)(),
        }
    }

    /// Current value, or the declared default when the source is gone or the
    /// indexed item is absent.
    pub fn value(&self) -> Result<Value> {
        let Some(object) = self.source() else {
            return Ok(self.kind.get().default_value());
        };
        match &self.key {
            PathKey::Property(name) => self.accessor.get_member(&object, name),
            PathKey::Index(key) => {
                // Only lists and dictionaries can answer whether a key is present.
                if self.accessor.contains_index(&object, key)? {
                    self.accessor.get_indexed(&object, key)
                } else {
                    Ok(self.kind.get().default_value())
                }
            }
        }
    }

    /// Write through to the current source. A dead source drops the write.
    pub fn set_value(&self, value: Value) -> Result<()> {
        let Some(object) = self.source() else {
            return Ok(());
        };
        match &self.key {
            PathKey::Property(name) => self.accessor.set_member(&object, name, value),
            PathKey::Index(key) => self.accessor.set_indexed(&object, key, value),
        }
    }

    fn detach(&self) {
        self.subscriptions.borrow_mut().clear();
        *self.source.borrow_mut() = None;
        if let Some(child) = &self.child {
            child.detach();
        }
    }
}

impl fmt::Debug for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSegment")
            .field("key", &self.key)
            .field("kind", &self.kind.get())
            .field("alive", &self.source().is_some())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// A live chain of [`PathSegment`]s rooted at one object.
pub struct PathObservation {
    path: PropertyPath,
    head: Rc<PathSegment>,
    leaf: Rc<PathSegment>,
}

impl PathObservation {
    /// Build the chain without a root. `tail` runs whenever the leaf may have
    /// changed.
    pub(crate) fn new(accessor: &Rc<MemberAccessor>, path: PropertyPath, tail: TailCallback) -> Self {
        let make = |key: PathKey, child: Option<Rc<PathSegment>>| {
            Rc::new(PathSegment {
                key,
                accessor: Rc::clone(accessor),
                source: RefCell::new(None),
                kind: Cell::new(ValueKind::Any),
                child,
                subscriptions: RefCell::new(Vec::new()),
                tail: Rc::clone(&tail),
            })
        };
        let mut keys = path.keys().to_vec();
        let last = keys
            .pop()
            .unwrap_or_else(|| PathKey::Property(Rc::from("")));
        let leaf = make(last, None);
        let mut head = Rc::clone(&leaf);
        for key in keys.into_iter().rev() {
            head = make(key, Some(head));
        }
        Self { path, head, leaf }
    }

    #[must_use]
    pub fn path(&self) -> &PropertyPath {
        &self.path
    }

    /// Resolve the whole chain from a new root.
    pub fn set_root(&self, root: Option<ObjectRef>) -> Result<()> {
        self.head.set_source(root)
    }

    /// Segments from root to leaf.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        std::iter::successors(Some(&*self.head), |s| s.child.as_deref())
    }

    #[must_use]
    pub fn leaf(&self) -> &PathSegment {
        &self.leaf
    }

    pub fn value(&self) -> Result<Value> {
        self.leaf().value()
    }

    pub fn set_value(&self, value: Value) -> Result<()> {
        self.leaf().set_value(value)
    }

    /// The object the leaf member is read from.
    #[must_use]
    pub fn resolved_source(&self) -> Option<ObjectRef> {
        self.leaf().source()
    }

    #[must_use]
    pub fn leaf_kind(&self) -> ValueKind {
        self.leaf().kind()
    }

    /// Drop every subscription and forget every source.
    pub fn detach(&self) {
        self.head.detach();
    }
}

impl fmt::Debug for PathObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathObservation")
            .field("path", &self.path.to_string())
            .field("segments", &self.segments().collect::<Vec<_>>())
            .finish()
    }
}
