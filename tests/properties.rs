//! The property protocol: built-ins, class descriptors, accessors and
//! `super` chains.

use sable_vm::prelude::*;

use std::cell::RefCell;
use std::rc::Rc;

fn eval(source: &str) -> Value {
    let mut ctx = Context::new();
    ctx.eval_source(source)
        .unwrap_or_else(|e| panic!("program failed: {e}"))
}

fn hashmap(entries: &[(&str, Value)]) -> Value {
    let mut map = ValueMap::new();
    for (key, value) in entries {
        map.set_str(key, value.clone());
    }
    Value::Hashmap(Rc::new(RefCell::new(map)))
}

fn upper(_vm: &mut Vm, args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Str(s)) => Ok(Value::from(s.to_uppercase())),
        _ => Ok(Value::Nil),
    }
}

fn constant_getter(_vm: &mut Vm, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Int(99))
}

#[test]
fn length_is_built_in() {
    assert_eq!(eval(r#"return "hello".length;"#), Value::Int(5));
    assert_eq!(eval("return [1, 2, 3].length;"), Value::Int(3));
    assert_eq!(eval(r#"return { "a": 1 }.length;"#), Value::Int(1));
}

#[test]
fn hashmap_reads_fall_back_to_raw_lookup() {
    assert_eq!(eval(r#"return { "a": 1 }.a;"#), Value::Int(1));
    // An absent key reads as nil rather than trapping.
    assert_eq!(eval(r#"return typeof { "a": 1 }.b;"#), Value::from("nil"));
}

#[test]
fn property_reads_without_any_getter_trap() {
    let mut ctx = Context::new();
    let error = ctx.eval_source("return 1.missing;").unwrap_err();

    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };
    assert!(matches!(trap.error, RuntimeError::NoGetter(_)));
}

#[test]
fn type_classes_provide_methods_for_primitives() {
    let mut ctx = Context::new();
    ctx.set_class(
        Value::from("string"),
        hashmap(&[("upper", Value::native("upper", upper))]),
    )
    .unwrap();

    assert_eq!(
        ctx.eval_source(r#"let s = "abc"; return s.upper(s);"#).unwrap(),
        Value::from("ABC")
    );
}

#[test]
fn method_lookup_without_a_class_traps() {
    let mut ctx = Context::new();
    let error = ctx.eval_source("let n = 1; return n.frob(n);").unwrap_err();

    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };
    assert_eq!(trap.error, RuntimeError::NoClass("number"));
}

#[test]
fn method_lookup_finding_nil_fails_only_at_the_call() {
    let mut ctx = Context::new();
    ctx.set_class(Value::from("number"), hashmap(&[])).unwrap();

    let error = ctx.eval_source("let n = 1; return n.frob(n);").unwrap_err();
    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };
    assert_eq!(trap.error, RuntimeError::NotCallable("nil"));
}

#[test]
fn accessors_intercept_reads() {
    let mut ctx = Context::new();
    let accessor = hashmap(&[("get", Value::native("get", constant_getter))]);
    ctx.set_class(Value::from("number"), hashmap(&[("magic", accessor)]))
        .unwrap();

    assert_eq!(
        ctx.eval_source("let n = 1; return n.magic;").unwrap(),
        Value::Int(99)
    );
}

#[test]
fn super_chains_are_followed() {
    let mut ctx = Context::new();
    let base = hashmap(&[("inherited", Value::Int(5))]);
    let derived = hashmap(&[("own", Value::Int(6)), ("super", base)]);
    ctx.set_class(Value::from("number"), derived).unwrap();

    assert_eq!(
        ctx.eval_source("let n = 1; return n.own + n.inherited;").unwrap(),
        Value::Int(11)
    );
}

#[test]
fn cyclic_super_chains_trap_instead_of_spinning() {
    let mut ctx = Context::new();
    let class = hashmap(&[]);
    if let Value::Hashmap(map) = &class {
        map.borrow_mut().set_str("super", class.clone());
    }
    ctx.set_class(Value::from("number"), class).unwrap();

    let error = ctx.eval_source("let n = 1; return n.anything;").unwrap_err();
    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };
    assert_eq!(trap.error, RuntimeError::ClassChainTooDeep);
}

#[test]
fn setters_receive_value_and_name() {
    // A hashmap whose `target` property is an accessor: writes to it are
    // redirected into the `written` key by a script setter.
    assert_eq!(
        eval(
            r#"let h = {};
               h.target = {
                   "set": fn(self_, value, name) { self_.written = value; }
               };
               h.target = 41;
               return h.written + 1;"#
        ),
        Value::Int(42)
    );
}
