//! Collection bindings keep a target list equal to the source collection.

use std::rc::Rc;

use gossamer_core::{DynClass, DynObject, ObjectRef, ObservableList, Result, Value, ValueKind};
use gossamer_runtime::{CollectionBinding, Engine};
use proptest::prelude::*;

struct Fixture {
    vm: Rc<DynObject>,
    source: Rc<ObservableList>,
    target: Rc<ObservableList>,
    binding: CollectionBinding,
}

fn fixture(items: Vec<Value>) -> Fixture {
    let vm = DynClass::builder("Vm")
        .property("Items", ValueKind::Object)
        .build()
        .instantiate();
    let source = ObservableList::from_items(items);
    vm.set("Items", source.clone() as ObjectRef).unwrap();
    let target = ObservableList::new();
    let (t, s): (ObjectRef, ObjectRef) = (target.clone(), vm.clone());
    let binding = Engine::new()
        .bind_collection(&t, None, &s, Some("Items"))
        .unwrap();
    Fixture {
        vm,
        source,
        target,
        binding,
    }
}

#[test]
fn incremental_changes_are_mirrored() {
    let f = fixture(vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(f.target.items(), f.source.items());

    f.source.push(Value::Int(3)).unwrap();
    f.source.insert(0, Value::Int(0)).unwrap();
    f.source.remove_at(2).unwrap();
    f.source.set(1, Value::Int(10)).unwrap();
    assert_eq!(
        f.target.items(),
        vec![Value::Int(0), Value::Int(10), Value::Int(3)]
    );

    f.source.clear().unwrap();
    assert!(f.target.is_empty());
}

#[test]
fn replacing_the_source_collection_resets_the_target() {
    let f = fixture(vec![Value::from("a")]);
    let other = ObservableList::from_items(vec![Value::from("x"), Value::from("y")]);
    f.vm.set("Items", other.clone() as ObjectRef).unwrap();
    assert_eq!(f.target.items(), other.items());

    // The old collection is no longer followed.
    f.source.push(Value::from("b")).unwrap();
    assert_eq!(f.target.len(), 2);
    other.push(Value::from("z")).unwrap();
    assert_eq!(f.target.len(), 3);
}

#[test]
fn generator_maps_each_item() {
    let f = fixture(vec![Value::Int(1), Value::Int(2)]);
    f.binding
        .set_generator(|item: &Value, _: &Value| -> Result<Value> {
            Ok(Value::from(format!("#{item}")))
        })
        .unwrap();
    assert_eq!(f.target.items(), vec![Value::from("#1"), Value::from("#2")]);

    f.source.push(Value::Int(3)).unwrap();
    assert_eq!(f.target.get(2), Some(Value::from("#3")));
}

#[derive(Clone, Debug)]
enum Op {
    Push(i64),
    Insert(usize, i64),
    Remove(usize),
    Set(usize, i64),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i64>().prop_map(Op::Push),
        3 => (0usize..16, any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
        3 => (0usize..16).prop_map(Op::Remove),
        2 => (0usize..16, any::<i64>()).prop_map(|(i, v)| Op::Set(i, v)),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn target_always_equals_source(ops in proptest::collection::vec(op(), 0..40)) {
        let f = fixture(Vec::new());
        for op in ops {
            let len = f.source.len();
            match op {
                Op::Push(v) => f.source.push(Value::Int(v)).unwrap(),
                Op::Insert(i, v) => f.source.insert(i.min(len), Value::Int(v)).unwrap(),
                Op::Remove(i) if len > 0 => {
                    f.source.remove_at(i % len).unwrap();
                }
                Op::Set(i, v) if len > 0 => f.source.set(i % len, Value::Int(v)).unwrap(),
                Op::Clear => f.source.clear().unwrap(),
                Op::Remove(_) | Op::Set(..) => {}
            }
            prop_assert_eq!(f.target.items(), f.source.items());
        }
    }
}
