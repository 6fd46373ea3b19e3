//! Bindings never keep the objects they connect alive.

use std::rc::Rc;

use gossamer_core::{Bindable, DynClass, ObjectRef, PROPERTY_CHANGED, Value, ValueKind};
use gossamer_runtime::{BindingState, Engine};

fn form() -> Rc<DynClass> {
    DynClass::builder("Form")
        .property("Text", ValueKind::Str)
        .build()
}

#[test]
fn dropped_target_is_collected_and_binding_clears_itself() {
    let class = form();
    let vm = class.instantiate();
    let view = class.instantiate();
    let engine = Engine::new();

    let binding = {
        let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
        engine.bind(&target, "Text", &source, "Text").unwrap()
    };
    let weak_view = Rc::downgrade(&view);
    drop(view);
    assert!(weak_view.upgrade().is_none());
    assert_eq!(binding.state(), BindingState::Active);

    // The next delivery notices the dead target.
    vm.set("Text", "late").unwrap();
    assert_eq!(binding.state(), BindingState::Cleared);
    assert_eq!(vm.events().unwrap().handler_count(PROPERTY_CHANGED), 0);
}

#[test]
fn dropped_source_reads_as_default_and_is_collected() {
    let class = form();
    let view = class.instantiate();
    let vm = class.instantiate();
    vm.set("Text", "kept").unwrap();
    let engine = Engine::new();

    let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
    let binding = engine.bind(&target, "Text", &source, "Text").unwrap();
    drop(source);
    assert_eq!(view.get("Text"), Some(Value::from("kept")));

    let weak_vm = Rc::downgrade(&vm);
    drop(vm);
    assert!(weak_vm.upgrade().is_none());
    assert!(!binding.source().is_alive());
    assert_eq!(binding.source().value().unwrap(), Value::Null);

    // Nothing flows from a dead source.
    binding.update(true).unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("kept")));
}

#[test]
fn dropping_the_binding_detaches_its_listeners() {
    let class = form();
    let (view, vm) = (class.instantiate(), class.instantiate());
    let engine = Engine::new();
    let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
    let binding = engine.bind(&target, "Text", &source, "Text").unwrap();
    assert_eq!(vm.events().unwrap().handler_count(PROPERTY_CHANGED), 1);

    drop(binding);
    assert_eq!(vm.events().unwrap().handler_count(PROPERTY_CHANGED), 0);
    vm.set("Text", "ignored").unwrap();
    assert_eq!(view.get("Text"), Some(Value::Null));
}
