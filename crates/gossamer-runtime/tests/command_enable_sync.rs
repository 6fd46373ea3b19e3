//! Command bindings gate execution and mirror `CanExecute` into the target.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gossamer_core::{Command, DynClass, DynObject, EventArgs, ObjectRef, Result, Value, ValueKind};
use gossamer_runtime::{CommandBinding, Engine};

struct Fixture {
    button: Rc<DynObject>,
    vm: Rc<DynObject>,
    allowed: Rc<Cell<bool>>,
    runs: Rc<Cell<u32>>,
    command: Rc<Command>,
    binding: CommandBinding,
}

fn counting_command(allowed: &Rc<Cell<bool>>, runs: &Rc<Cell<u32>>) -> Rc<Command> {
    let (allowed, runs) = (Rc::clone(allowed), Rc::clone(runs));
    Command::with_can_execute(
        move |_: &Value| -> Result<()> {
            runs.set(runs.get() + 1);
            Ok(())
        },
        move |_: &Value| allowed.get(),
    )
}

fn fixture() -> Fixture {
    let button = DynClass::builder("Button")
        .property("Enabled", ValueKind::Bool)
        .property("Visible", ValueKind::Bool)
        .event("Clicked")
        .build()
        .instantiate();
    let vm = DynClass::builder("Vm")
        .property("Save", ValueKind::Object)
        .property("Dirty", ValueKind::Bool)
        .build()
        .instantiate();
    let allowed = Rc::new(Cell::new(false));
    let runs = Rc::new(Cell::new(0));
    let command = counting_command(&allowed, &runs);
    vm.set("Save", command.clone() as ObjectRef).unwrap();

    let (target, source): (ObjectRef, ObjectRef) = (button.clone(), vm.clone());
    let binding = Engine::new()
        .bind_command(&target, None, &source, Some("Save"))
        .unwrap();
    binding.attach_target_event("Clicked", None).unwrap();
    binding.add_enable_property("Enabled").unwrap();
    Fixture {
        button,
        vm,
        allowed,
        runs,
        command,
        binding,
    }
}

fn enabled(f: &Fixture) -> Option<Value> {
    f.button.get("Enabled")
}

#[test]
fn enable_follows_can_execute_changed() {
    let f = fixture();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));

    f.allowed.set(true);
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
    f.command.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));

    f.allowed.set(false);
    f.command.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
}

#[test]
fn click_executes_only_when_allowed() {
    let f = fixture();
    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(f.runs.get(), 0);

    f.allowed.set(true);
    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(f.runs.get(), 2);
}

#[test]
fn replacing_the_command_resyncs_and_rewires() {
    let f = fixture();
    let other_allowed = Rc::new(Cell::new(true));
    let other_runs = Rc::new(Cell::new(0));
    let other = counting_command(&other_allowed, &other_runs);
    f.vm.set("Save", other.clone() as ObjectRef).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));

    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(other_runs.get(), 1);
    assert_eq!(f.runs.get(), 0);

    // The replaced command no longer drives the button.
    f.allowed.set(true);
    other_allowed.set(false);
    f.command.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));
    other.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
}

#[test]
fn null_command_disables_and_ignores_clicks() {
    let f = fixture();
    f.allowed.set(true);
    f.command.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));

    f.vm.set("Save", Value::Null).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(f.runs.get(), 0);
}

#[test]
fn cleared_binding_stops_syncing() {
    let f = fixture();
    f.binding.clear();
    f.allowed.set(true);
    f.command.raise_can_execute_changed().unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(f.runs.get(), 0);
}

#[test]
fn watched_property_updates_only_enable_properties() {
    let f = fixture();
    let vm: ObjectRef = f.vm.clone();
    f.binding.watch(Some(&vm), "Dirty").unwrap();
    assert_eq!(f.binding.watch_count(), 1);

    f.allowed.set(true);
    f.vm.set("Dirty", true).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));
    assert_eq!(f.button.get("Visible"), Some(Value::Bool(false)));

    assert!(f.binding.unwatch(Some(&vm), "Dirty").unwrap());
    f.allowed.set(false);
    f.vm.set("Dirty", false).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));
}

#[test]
fn execute_clearing_a_watched_property_disables() {
    let f = fixture();
    let weak_vm = Rc::downgrade(&f.vm);
    let reader = weak_vm.clone();
    let save = Command::with_can_execute(
        move |_: &Value| -> Result<()> {
            if let Some(vm) = weak_vm.upgrade() {
                vm.set("Dirty", false)?;
            }
            Ok(())
        },
        move |_: &Value| {
            reader
                .upgrade()
                .and_then(|vm| vm.get("Dirty"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        },
    );
    f.vm.set("Save", save as ObjectRef).unwrap();
    let vm: ObjectRef = f.vm.clone();
    f.binding.watch(Some(&vm), "Dirty").unwrap();

    f.vm.set("Dirty", true).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));

    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(f.vm.get("Dirty"), Some(Value::Bool(false)));
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
}

#[test]
fn can_execute_changed_raised_by_execute_is_synced() {
    let f = fixture();
    let allowed = Rc::new(Cell::new(true));
    let me: Rc<RefCell<Weak<Command>>> = Rc::new(RefCell::new(Weak::new()));
    let (a, slot) = (Rc::clone(&allowed), Rc::clone(&me));
    let once = Command::with_can_execute(
        move |_: &Value| -> Result<()> {
            a.set(false);
            let command = slot.borrow().upgrade();
            match command {
                Some(command) => command.raise_can_execute_changed(),
                None => Ok(()),
            }
        },
        move |_: &Value| allowed.get(),
    );
    *me.borrow_mut() = Rc::downgrade(&once);
    f.vm.set("Save", once.clone() as ObjectRef).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(true)));

    f.button.raise("Clicked", &EventArgs::Empty).unwrap();
    assert_eq!(enabled(&f), Some(Value::Bool(false)));
}
