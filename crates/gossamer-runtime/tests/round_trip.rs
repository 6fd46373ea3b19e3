//! Two-way bindings and converters.

use std::cell::Cell;
use std::rc::Rc;

use gossamer_core::{DynClass, DynObject, Locale, ObjectRef, Result, Value, ValueKind};
use gossamer_runtime::{BindMode, Binding, BindingConfig, Engine, Flow, ValueConverter};

fn pair() -> (Rc<DynObject>, Rc<DynObject>) {
    let view = DynClass::builder("View")
        .property("Text", ValueKind::Str)
        .build()
        .instantiate();
    let vm = DynClass::builder("Vm")
        .property("Count", ValueKind::Int)
        .property("Name", ValueKind::Str)
        .build()
        .instantiate();
    (view, vm)
}

fn bind(engine: &Engine, view: &Rc<DynObject>, vm: &Rc<DynObject>, path: &str) -> Binding {
    let (target, source): (ObjectRef, ObjectRef) = (view.clone(), vm.clone());
    engine.bind(&target, "Text", &source, path).unwrap()
}

#[test]
fn two_way_flows_both_directions_without_echo() {
    let (view, vm) = pair();
    let engine = Engine::with_config(BindingConfig::default().with_default_mode(BindMode::TWO_WAY));
    let binding = bind(&engine, &view, &vm, "Name");

    let source_writes = Rc::new(Cell::new(0));
    let s = Rc::clone(&source_writes);
    binding
        .set_source_changed(move |_| s.set(s.get() + 1))
        .unwrap();

    vm.set("Name", "from vm").unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("from vm")));
    assert_eq!(source_writes.get(), 0);

    view.set("Text", "from view").unwrap();
    assert_eq!(vm.get("Name"), Some(Value::from("from view")));
    assert_eq!(source_writes.get(), 1);
}

#[test]
fn two_way_coerces_through_declared_kinds() {
    let (view, vm) = pair();
    let engine = Engine::new();
    let binding = bind(&engine, &view, &vm, "Count");
    binding.set_mode(BindMode::TWO_WAY).unwrap();

    vm.set("Count", 7).unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("7")));

    view.set("Text", " 12 ").unwrap();
    assert_eq!(vm.get("Count"), Some(Value::Int(12)));
}

#[test]
fn one_way_to_source_only_pulls() {
    let (view, vm) = pair();
    vm.set("Name", "untouched").unwrap();
    let engine = Engine::with_config(
        BindingConfig::default().with_default_mode(BindMode::ONE_WAY_TO_SOURCE),
    );
    let _binding = bind(&engine, &view, &vm, "Name");

    view.set("Text", "typed").unwrap();
    assert_eq!(vm.get("Name"), Some(Value::from("typed")));

    vm.set("Name", "pushed").unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("typed")));
}

/// Shows `"<n> items"`; parses the number back and ignores anything else.
struct Items;

impl ValueConverter for Items {
    fn convert(&self, value: &Value, _: ValueKind, _: &Value, _: &Locale) -> Result<Flow> {
        Ok(Flow::Set(Value::from(format!("{value} items"))))
    }

    fn convert_back(&self, value: &Value, _: ValueKind, _: &Value, _: &Locale) -> Result<Flow> {
        let parsed = value
            .as_str()
            .and_then(|s| s.strip_suffix(" items"))
            .and_then(|n| n.parse::<i64>().ok());
        Ok(parsed.map_or(Flow::DoNothing, |n| Flow::Set(Value::Int(n))))
    }
}

#[test]
fn converter_round_trips_and_can_decline() {
    let (view, vm) = pair();
    let engine = Engine::new();
    let binding = bind(&engine, &view, &vm, "Count");
    binding.set_converter(Items).unwrap();
    binding.set_mode(BindMode::TWO_WAY).unwrap();

    vm.set("Count", 3).unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("3 items")));

    view.set("Text", "5 items").unwrap();
    assert_eq!(vm.get("Count"), Some(Value::Int(5)));

    view.set("Text", "lots").unwrap();
    assert_eq!(vm.get("Count"), Some(Value::Int(5)));
}
