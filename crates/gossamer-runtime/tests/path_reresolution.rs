//! Compound paths follow replaced intermediate objects.

use std::rc::Rc;

use gossamer_core::{Bindable, DynClass, DynObject, ObjectRef, PROPERTY_CHANGED, Value, ValueKind};
use gossamer_runtime::Engine;

fn node() -> Rc<DynClass> {
    DynClass::builder("Node")
        .property("A", ValueKind::Object)
        .property("B", ValueKind::Object)
        .property("Name", ValueKind::Str)
        .build()
}

fn named(class: &Rc<DynClass>, name: &str) -> Rc<DynObject> {
    let object = class.instantiate();
    object.set("Name", name).unwrap();
    object
}

fn as_ref(o: &Rc<DynObject>) -> ObjectRef {
    o.clone()
}

#[test]
fn replacing_an_intermediate_rebinds_the_leaf() {
    let class = node();
    let root = class.instantiate();
    let a = class.instantiate();
    let old_b = named(&class, "one");
    a.set("B", as_ref(&old_b)).unwrap();
    root.set("A", as_ref(&a)).unwrap();

    let view = class.instantiate();
    let engine = Engine::new();
    let _binding = engine
        .bind(&as_ref(&view), "Name", &as_ref(&root), "A.B.Name")
        .unwrap();
    assert_eq!(view.get("Name"), Some(Value::from("one")));

    let new_b = named(&class, "two");
    a.set("B", as_ref(&new_b)).unwrap();
    assert_eq!(view.get("Name"), Some(Value::from("two")));
    assert_eq!(old_b.events().unwrap().handler_count(PROPERTY_CHANGED), 0);

    old_b.set("Name", "stale").unwrap();
    assert_eq!(view.get("Name"), Some(Value::from("two")));

    new_b.set("Name", "three").unwrap();
    assert_eq!(view.get("Name"), Some(Value::from("three")));
}

#[test]
fn broken_link_yields_default_until_restored() {
    let class = node();
    let root = class.instantiate();
    let a = class.instantiate();
    let b = named(&class, "leaf");
    a.set("B", as_ref(&b)).unwrap();
    root.set("A", as_ref(&a)).unwrap();

    let view = class.instantiate();
    let engine = Engine::new();
    let binding = engine
        .bind(&as_ref(&view), "Name", &as_ref(&root), "A.B.Name")
        .unwrap();

    root.set("A", Value::Null).unwrap();
    assert_eq!(view.get("Name"), Some(Value::Null));
    assert!(binding.source().resolved_source().is_none());

    root.set("A", as_ref(&a)).unwrap();
    assert_eq!(view.get("Name"), Some(Value::from("leaf")));
    assert!(
        binding
            .source()
            .resolved_source()
            .is_some_and(|owner| gossamer_core::same_object(&owner, &as_ref(&b)))
    );
}

#[test]
fn writes_back_through_the_current_chain() {
    let class = node();
    let root = class.instantiate();
    let a = class.instantiate();
    let b = named(&class, "before");
    a.set("B", as_ref(&b)).unwrap();
    root.set("A", as_ref(&a)).unwrap();

    let view = class.instantiate();
    let engine = Engine::new();
    let binding = engine
        .bind(&as_ref(&view), "Name", &as_ref(&root), "A.B.Name")
        .unwrap();
    binding
        .set_mode(gossamer_runtime::BindMode::TWO_WAY)
        .unwrap();

    view.set("Name", "after").unwrap();
    assert_eq!(b.get("Name"), Some(Value::from("after")));
}
