//! Indexed path segments follow list mutations.

use std::rc::Rc;

use gossamer_core::{DynClass, DynObject, MemberAccessor, ObjectRef, ObservableList, Value, ValueKind};
use gossamer_runtime::Engine;

fn person(class: &Rc<DynClass>, name: &str) -> Value {
    let p = class.instantiate();
    p.set("Name", name).unwrap();
    Value::object(p)
}

struct Fixture {
    people: Rc<DynClass>,
    items: Rc<ObservableList>,
    view: Rc<DynObject>,
    _vm: Rc<DynObject>,
    _binding: gossamer_runtime::Binding,
}

fn fixture(names: &[&str]) -> Fixture {
    let people = DynClass::builder("Person")
        .property("Name", ValueKind::Str)
        .build();
    let items = ObservableList::from_items(names.iter().map(|n| person(&people, n)).collect());
    let vm = DynClass::builder("Vm")
        .property("Items", ValueKind::Object)
        .build()
        .instantiate();
    vm.set("Items", items.clone() as ObjectRef).unwrap();
    let view = DynClass::builder("Label")
        .property("Text", ValueKind::Str)
        .build()
        .instantiate();

    let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
    let binding = Engine::new()
        .bind(&target, "Text", &source, "Items[1].Name")
        .unwrap();
    Fixture {
        people,
        items,
        view,
        _vm: vm,
        _binding: binding,
    }
}

fn text(f: &Fixture) -> Option<Value> {
    f.view.get("Text")
}

#[test]
fn removing_the_indexed_item_yields_the_default() {
    let f = fixture(&["ann", "bob"]);
    assert_eq!(text(&f), Some(Value::from("bob")));

    f.items.remove_at(1).unwrap();
    assert_eq!(text(&f), Some(Value::Null));

    f.items.push(person(&f.people, "cy")).unwrap();
    assert_eq!(text(&f), Some(Value::from("cy")));
}

#[test]
fn shifts_and_replacements_are_followed() {
    let f = fixture(&["ann", "bob", "cy"]);
    f.items.insert(0, person(&f.people, "zed")).unwrap();
    assert_eq!(text(&f), Some(Value::from("ann")));

    f.items.set(1, person(&f.people, "dee")).unwrap();
    assert_eq!(text(&f), Some(Value::from("dee")));

    f.items.clear().unwrap();
    assert_eq!(text(&f), Some(Value::Null));
}

#[test]
fn item_property_changes_reach_the_target() {
    let f = fixture(&["ann", "bob"]);
    let Some(Value::Object(bob)) = f.items.get(1) else {
        panic!("expected an object at index 1");
    };
    MemberAccessor::new()
        .set_member(&bob, "Name", Value::from("robert"))
        .unwrap();
    assert_eq!(text(&f), Some(Value::from("robert")));
}
