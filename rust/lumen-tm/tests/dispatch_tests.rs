//! End-to-end dispatch through the public VM surface.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_tm::meta::{try_binary, try_order};
use lumen_tm::{CallOrigin, DispatchConfig, Event, OrderResult, OverrideMap, Table, Value, VmError, VM};

type CallLog = Rc<RefCell<Vec<Vec<Value>>>>;

/// Helper: a handler that records its arguments and returns `ret`.
fn recording(ret: Value) -> (Value, CallLog) {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let f = Value::function("recording", move |_vm, args| {
        sink.borrow_mut().push(args.to_vec());
        Ok(vec![ret.clone()])
    });
    (f, log)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ─── Binary operators ───

#[test]
fn add_handler_receives_owner_then_operands() {
    init_tracing();
    let mut vm = VM::new();
    let (h, log) = recording(Value::Int(99));
    let t = Value::table_with(OverrideMap::from_entries([("__add", h)]));
    let dest = vm.push(Value::Nil).unwrap();
    vm.arith(Event::Add, &t, &Value::Int(5), dest, CallOrigin::Interpreted)
        .unwrap();
    assert_eq!(log.borrow()[0], vec![t.clone(), t.clone(), Value::Int(5)]);
    assert_eq!(vm.get(dest), Value::Int(99));
    assert_eq!(vm.top(), dest + 1);
}

#[test]
fn second_operand_owns_when_first_has_no_handler() {
    let mut vm = VM::new();
    let (h, log) = recording(Value::from("sub"));
    let b = Value::table_with(OverrideMap::from_entries([("__sub", h)]));
    let dest = vm.push(Value::Nil).unwrap();
    vm.arith(Event::Sub, &Value::Int(1), &b, dest, CallOrigin::Interpreted)
        .unwrap();
    assert_eq!(log.borrow()[0], vec![b.clone(), Value::Int(1), b.clone()]);
    assert_eq!(vm.get(dest), Value::from("sub"));
}

#[test]
fn same_proxy_on_both_sides_is_unwrapped_twice() {
    let mut vm = VM::new();
    let (h, log) = recording(Value::Bool(true));
    let inner = Value::table(Table::new());
    let p = Value::proxy_with(inner.clone(), OverrideMap::from_entries([("__mul", h)]));
    let dest = vm.push(Value::Nil).unwrap();
    vm.arith(Event::Mul, &p, &p, dest, CallOrigin::Interpreted).unwrap();
    assert_eq!(log.borrow()[0], vec![inner.clone(), inner.clone(), inner.clone()]);
}

#[test]
fn unary_minus_passes_operand_twice() {
    let mut vm = VM::new();
    let (h, log) = recording(Value::Int(-1));
    let t = Value::table_with(OverrideMap::from_entries([("__unm", h)]));
    let dest = vm.push(Value::Nil).unwrap();
    vm.arith(Event::Unm, &t, &Value::Nil, dest, CallOrigin::Interpreted)
        .unwrap();
    assert_eq!(log.borrow()[0], vec![t.clone(), t.clone(), t.clone()]);
    assert_eq!(vm.get(dest), Value::Int(-1));
}

// ─── Failures ───

#[test]
fn concat_failure_names_display_type() {
    let mut vm = VM::new();
    let t = Value::table_with(OverrideMap::from_entries([("__type", Value::from("Point"))]));
    let dest = vm.push(Value::Nil).unwrap();
    let err = vm
        .concat(&Value::from("p = "), &t, dest, CallOrigin::Interpreted)
        .unwrap_err();
    assert!(matches!(&err, VmError::Concat { operand, .. } if operand == "Point"));
    assert_eq!(
        err.to_string(),
        "attempt to concatenate a Point value (string .. Point)"
    );
}

#[test]
fn arithmetic_failure_blames_non_numeric_operand() {
    let mut vm = VM::new();
    let dest = vm.push(Value::Nil).unwrap();
    let err = vm
        .arith(Event::Add, &Value::Int(1), &Value::Bool(false), dest, CallOrigin::Interpreted)
        .unwrap_err();
    assert_eq!(err.to_string(), "attempt to perform arithmetic on a boolean value");
    let err = vm
        .arith(Event::BAnd, &Value::from("x"), &Value::Int(1), dest, CallOrigin::Interpreted)
        .unwrap_err();
    assert_eq!(err.to_string(), "attempt to perform bitwise operation on a string value");
}

#[test]
fn handler_error_is_not_reclassified() {
    let mut vm = VM::new();
    let failing = Value::function("failing", |_vm, _args| Err(VmError::Runtime("nope".into())));
    let t = Value::table_with(OverrideMap::from_entries([("__concat", failing)]));
    let dest = vm.push(Value::Nil).unwrap();
    let err = vm
        .concat(&t, &Value::from("s"), dest, CallOrigin::Interpreted)
        .unwrap_err();
    assert_eq!(err, VmError::Runtime("nope".into()));
    assert_eq!(vm.top(), dest + 1);
}

// ─── Ordering ───

#[test]
fn no_handler_is_distinct_from_false_result() {
    let mut vm = VM::new();
    let (h, log) = recording(Value::Nil);
    let t = Value::table_with(OverrideMap::from_entries([("__lt", h)]));
    let plain = Value::table(Table::new());

    let r = try_order(&mut vm, &t, &plain, Event::Lt, CallOrigin::Interpreted).unwrap();
    assert_eq!(r, OrderResult::False);
    assert_eq!(log.borrow().len(), 1);

    let r = try_order(&mut vm, &plain, &plain, Event::Lt, CallOrigin::Interpreted).unwrap();
    assert_eq!(r, OrderResult::NoHandler);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(vm.top(), 0);
}

#[test]
fn try_binary_reports_owner() {
    let mut vm = VM::new();
    let (h, _log) = recording(Value::Int(0));
    let b = Value::table_with(OverrideMap::from_entries([("__div", h)]));
    let dest = vm.push(Value::Nil).unwrap();
    let resolved = try_binary(&mut vm, &Value::Int(1), &b, dest, Event::Div, CallOrigin::Interpreted)
        .unwrap()
        .expect("b has a handler");
    assert!(resolved.owner_is_second);
}

// ─── Absence cache ───

#[test]
fn absence_cache_hides_late_bindings_until_cleared() {
    let mut vm = VM::new();
    let map = OverrideMap::new();
    let t = Value::table_with(map.clone());
    let dest = vm.push(Value::Nil).unwrap();

    vm.length(&t, dest, CallOrigin::Interpreted).unwrap();
    assert_eq!(vm.get(dest), Value::Int(0));

    map.set("__len", Value::function("len", |_vm, _args| Ok(vec![Value::Int(7)])));
    vm.length(&t, dest, CallOrigin::Interpreted).unwrap();
    assert_eq!(vm.get(dest), Value::Int(0));

    map.clear_absence_cache();
    vm.length(&t, dest, CallOrigin::Interpreted).unwrap();
    assert_eq!(vm.get(dest), Value::Int(7));
}

#[test]
fn absence_cache_can_be_disabled() {
    let config = DispatchConfig {
        absence_cache: false,
        ..DispatchConfig::default()
    };
    let mut vm = VM::with_config(config);
    let map = OverrideMap::new();
    let t = Value::table_with(map.clone());
    let dest = vm.push(Value::Nil).unwrap();

    vm.length(&t, dest, CallOrigin::Interpreted).unwrap();
    map.set("__len", Value::function("len", |_vm, _args| Ok(vec![Value::Int(7)])));
    vm.length(&t, dest, CallOrigin::Interpreted).unwrap();
    assert_eq!(vm.get(dest), Value::Int(7));
}

// ─── Suspension ───

#[test]
fn interpreted_handler_may_suspend_native_may_not() {
    let mut vm = VM::new();
    let yielder = Value::function("yielder", |vm, _args| Err(vm.suspend()));
    let t = Value::table_with(OverrideMap::from_entries([("__eq", yielder.clone()), ("__gc", yielder)]));
    let u = Value::table(Table::new());

    assert_eq!(vm.equals(&t, &u, CallOrigin::Interpreted), Err(VmError::Yield));
    let err = vm.finalize(&t).unwrap_err();
    assert!(err.to_string().contains("yield across a native call boundary"));
    assert_eq!(vm.top(), 0);
}
