#![forbid(unsafe_code)]

//! Observable list and dictionary.
//!
//! Both containers raise `PropertyChanged` and `CollectionChanged` after every
//! mutation, with the borrow on their contents already released, so handlers
//! may read (or even mutate) the container re-entrantly.
//!
//! Notification order for a list mutation:
//!
//! 1. `PropertyChanged("Count")` when the length changed
//! 2. `PropertyChanged("Item[]")`
//! 3. `CollectionChanged(..)`

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::descriptor::TypeDescriptor;
use crate::error::{BindError, Result};
use crate::event::{
    COLLECTION_CHANGED, CollectionChange, EventArgs, EventHub, INDEXER_NAME, PROPERTY_CHANGED,
};
use crate::object::{Bindable, Container, ListAccess, MapAccess, ObjectRef};
use crate::value::{Value, ValueKind};

thread_local! {
    static LIST_TYPE: Rc<TypeDescriptor> = TypeDescriptor::builder("ObservableList")
        .property::<ObservableList>("Count", ValueKind::Int, |l| Value::from(l.len()))
        .method::<ObservableList>("Add", &[ValueKind::Any], ValueKind::Any, |l, args| {
            l.push(args[0].clone()).map(|()| Value::Null)
        })
        .method::<ObservableList>(
            "Insert",
            &[ValueKind::Int, ValueKind::Any],
            ValueKind::Any,
            |l, args| {
                let index = index_arg(&args[0])?;
                l.insert(index, args[1].clone()).map(|()| Value::Null)
            },
        )
        .method::<ObservableList>("RemoveAt", &[ValueKind::Int], ValueKind::Any, |l, args| {
            l.remove_at(index_arg(&args[0])?)
        })
        .method::<ObservableList>("Clear", &[], ValueKind::Any, |l, _| {
            l.clear().map(|()| Value::Null)
        })
        .event(PROPERTY_CHANGED)
        .event(COLLECTION_CHANGED)
        .build();

    static MAP_TYPE: Rc<TypeDescriptor> = TypeDescriptor::builder("ObservableMap")
        .property::<ObservableMap>("Count", ValueKind::Int, |m| Value::from(m.len()))
        .method::<ObservableMap>("ContainsKey", &[ValueKind::Str], ValueKind::Bool, |m, args| {
            Ok(Value::Bool(m.contains_key(&args[0].to_string())))
        })
        .method::<ObservableMap>("Remove", &[ValueKind::Str], ValueKind::Any, |m, args| {
            m.remove(&args[0].to_string()).map(Value::from)
        })
        .event(PROPERTY_CHANGED)
        .event(COLLECTION_CHANGED)
        .build();
}

fn index_arg(value: &Value) -> Result<usize> {
    value
        .as_int()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| BindError::ArgumentInvalid(format!("invalid list index {value:?}")))
}

fn out_of_range(index: usize, len: usize) -> BindError {
    BindError::ArgumentInvalid(format!("index {index} out of range for length {len}"))
}

/// A list that reports every mutation.
pub struct ObservableList {
    items: RefCell<Vec<Value>>,
    hub: EventHub,
    me: Weak<ObservableList>,
}

impl ObservableList {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::from_items(Vec::new())
    }

    #[must_use]
    pub fn from_items(items: Vec<Value>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            items: RefCell::new(items),
            hub: EventHub::new(),
            me: me.clone(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn push(&self, value: Value) -> Result<()> {
        let index = self.len();
        self.insert(index, value)
    }

    pub fn insert(&self, index: usize, value: Value) -> Result<()> {
        {
            let mut items = self.items.borrow_mut();
            if index > items.len() {
                return Err(out_of_range(index, items.len()));
            }
            items.insert(index, value.clone());
        }
        self.changed(
            true,
            CollectionChange::Add {
                index,
                items: vec![value],
            },
        )
    }

    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let old = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let slot = items.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
            if *slot == value {
                return Ok(());
            }
            std::mem::replace(slot, value.clone())
        };
        self.changed(
            false,
            CollectionChange::Replace {
                index,
                old: vec![old],
                new: vec![value],
            },
        )
    }

    pub fn remove_at(&self, index: usize) -> Result<Value> {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return Err(out_of_range(index, items.len()));
            }
            items.remove(index)
        };
        self.changed(
            true,
            CollectionChange::Remove {
                index,
                items: vec![removed.clone()],
            },
        )?;
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        let had_items = {
            let mut items = self.items.borrow_mut();
            let had = !items.is_empty();
            items.clear();
            had
        };
        self.changed(had_items, CollectionChange::Reset)
    }

    /// Replace the whole content with a single `Reset` notification.
    pub fn reset(&self, items: Vec<Value>) -> Result<()> {
        let count_changed = {
            let mut current = self.items.borrow_mut();
            let changed = current.len() != items.len();
            *current = items;
            changed
        };
        self.changed(count_changed, CollectionChange::Reset)
    }

    fn changed(&self, count_changed: bool, change: CollectionChange) -> Result<()> {
        let sender = self
            .me
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc as ObjectRef));
        if count_changed {
            self.hub
                .raise(&sender, PROPERTY_CHANGED, &EventArgs::property_changed("Count"))?;
        }
        self.hub
            .raise(&sender, PROPERTY_CHANGED, &EventArgs::property_changed(INDEXER_NAME))?;
        self.hub
            .raise(&sender, COLLECTION_CHANGED, &EventArgs::CollectionChanged(change))
    }
}

impl ListAccess for ObservableList {
    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn get(&self, index: usize) -> Option<Value> {
        ObservableList::get(self, index)
    }

    fn items(&self) -> Vec<Value> {
        ObservableList::items(self)
    }

    fn set(&self, index: usize, value: Value) -> Result<()> {
        ObservableList::set(self, index, value)
    }

    fn insert(&self, index: usize, value: Value) -> Result<()> {
        ObservableList::insert(self, index, value)
    }

    fn remove_at(&self, index: usize) -> Result<Value> {
        ObservableList::remove_at(self, index)
    }

    fn clear(&self) -> Result<()> {
        ObservableList::clear(self)
    }
}

impl Bindable for ObservableList {
    fn descriptor(&self) -> Rc<TypeDescriptor> {
        LIST_TYPE.with(Rc::clone)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn events(&self) -> Option<&EventHub> {
        Some(&self.hub)
    }

    fn container(&self) -> Option<Container<'_>> {
        Some(Container::List(self))
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}

/// A string-keyed dictionary that reports every mutation.
///
/// Keyed changes carry no position, so every mutation is reported as
/// `CollectionChange::Reset`.
pub struct ObservableMap {
    entries: RefCell<BTreeMap<Rc<str>, Value>>,
    hub: EventHub,
    me: Weak<ObservableMap>,
}

impl ObservableMap {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            entries: RefCell::new(BTreeMap::new()),
            hub: EventHub::new(),
            me: me.clone(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn insert(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let added = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(key) {
                Some(slot) if *slot == value => return Ok(()),
                Some(slot) => {
                    *slot = value;
                    false
                }
                None => {
                    entries.insert(Rc::from(key), value);
                    true
                }
            }
        };
        self.changed(added)
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let removed = self.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.changed(true)?;
        }
        Ok(removed)
    }

    fn changed(&self, count_changed: bool) -> Result<()> {
        let sender = self
            .me
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc as ObjectRef));
        if count_changed {
            self.hub
                .raise(&sender, PROPERTY_CHANGED, &EventArgs::property_changed("Count"))?;
        }
        self.hub
            .raise(&sender, PROPERTY_CHANGED, &EventArgs::property_changed(INDEXER_NAME))?;
        self.hub.raise(
            &sender,
            COLLECTION_CHANGED,
            &EventArgs::CollectionChanged(CollectionChange::Reset),
        )
    }
}

impl MapAccess for ObservableMap {
    fn len(&self) -> usize {
        ObservableMap::len(self)
    }

    fn contains_key(&self, key: &str) -> bool {
        ObservableMap::contains_key(self, key)
    }

    fn get(&self, key: &str) -> Option<Value> {
        ObservableMap::get(self, key)
    }

    fn keys(&self) -> Vec<Rc<str>> {
        ObservableMap::keys(self)
    }

    fn insert(&self, key: &str, value: Value) -> Result<()> {
        ObservableMap::insert(self, key, value)
    }

    fn remove(&self, key: &str) -> Result<Option<Value>> {
        ObservableMap::remove(self, key)
    }
}

impl Bindable for ObservableMap {
    fn descriptor(&self) -> Rc<TypeDescriptor> {
        MAP_TYPE.with(Rc::clone)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn events(&self) -> Option<&EventHub> {
        Some(&self.hub)
    }

    fn container(&self) -> Option<Container<'_>> {
        Some(Container::Map(self))
    }
}

impl fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSubscription;

    fn record(object: &dyn Bindable) -> (Rc<RefCell<Vec<String>>>, Vec<EventSubscription>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = object.events().unwrap();
        let l1 = Rc::clone(&log);
        let a = hub.subscribe(PROPERTY_CHANGED, move |_, args| {
            l1.borrow_mut()
                .push(format!("prop:{}", args.property_name().unwrap_or_default()));
            Ok(())
        });
        let l2 = Rc::clone(&log);
        let b = hub.subscribe(COLLECTION_CHANGED, move |_, args| {
            let tag = match args.collection_change() {
                Some(CollectionChange::Add { index, .. }) => format!("add:{index}"),
                Some(CollectionChange::Remove { index, .. }) => format!("remove:{index}"),
                Some(CollectionChange::Replace { index, .. }) => format!("replace:{index}"),
                Some(CollectionChange::Reset) => "reset".to_string(),
                None => "?".to_string(),
            };
            l2.borrow_mut().push(tag);
            Ok(())
        });
        (log, vec![a, b])
    }

    #[test]
    fn list_add_notifies_count_indexer_then_collection() {
        let list = ObservableList::new();
        let (log, _subs) = record(&*list);
        list.push(Value::Int(1)).unwrap();
        assert_eq!(*log.borrow(), vec!["prop:Count", "prop:Item[]", "add:0"]);
    }

    #[test]
    fn list_set_is_replace_without_count() {
        let list = ObservableList::from_items(vec![Value::Int(1), Value::Int(2)]);
        let (log, _subs) = record(&*list);
        list.set(1, Value::Int(5)).unwrap();
        list.set(1, Value::Int(5)).unwrap();
        assert_eq!(*log.borrow(), vec!["prop:Item[]", "replace:1"]);
        assert_eq!(list.get(1), Some(Value::Int(5)));
    }

    #[test]
    fn list_remove_and_bounds() {
        let list = ObservableList::from_items(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.remove_at(0).unwrap(), Value::Int(1));
        assert!(list.remove_at(5).is_err());
        assert!(list.insert(3, Value::Null).is_err());
        assert_eq!(list.items(), vec![Value::Int(2)]);
    }

    #[test]
    fn list_clear_resets() {
        let list = ObservableList::from_items(vec![Value::Int(1)]);
        let (log, _subs) = record(&*list);
        list.clear().unwrap();
        assert!(list.is_empty());
        assert_eq!(*log.borrow(), vec!["prop:Count", "prop:Item[]", "reset"]);
    }

    #[test]
    fn list_is_a_container() {
        let list = ObservableList::from_items(vec![Value::from("a")]);
        match list.container() {
            Some(Container::List(view)) => assert_eq!(view.get(0), Some(Value::from("a"))),
            _ => panic!("expected a list container"),
        }
    }

    #[test]
    fn map_insert_update_remove() {
        let map = ObservableMap::new();
        let (log, _subs) = record(&*map);
        map.insert("a", 1).unwrap();
        map.insert("a", 1).unwrap();
        map.insert("a", 2).unwrap();
        assert_eq!(map.remove("a").unwrap(), Some(Value::Int(2)));
        assert_eq!(map.remove("a").unwrap(), None);
        assert_eq!(
            *log.borrow(),
            vec![
                "prop:Count",
                "prop:Item[]",
                "reset",
                "prop:Item[]",
                "reset",
                "prop:Count",
                "prop:Item[]",
                "reset",
            ]
        );
    }

    #[test]
    fn map_keys_are_sorted() {
        let map = ObservableMap::new();
        map.insert("b", 2).unwrap();
        map.insert("a", 1).unwrap();
        let keys: Vec<String> = map.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
