//! Native extension functions: registration, grouping, re-entrancy and
//! error propagation.

use sable_vm::prelude::*;

use std::rc::Rc;

fn double(_vm: &mut Vm, args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Int(i)) => Ok(Value::Int(i * 2)),
        Some(other) => Err(RuntimeError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
        None => Ok(Value::Nil),
    }
}

fn join(_vm: &mut Vm, args: &[Value]) -> Result<Value, RuntimeError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Ok(Value::from(out))
}

fn fail(_vm: &mut Vm, _args: &[Value]) -> Result<Value, RuntimeError> {
    Err(RuntimeError::Native {
        name: Rc::from("fail"),
        message: "deliberate".into(),
    })
}

/// Re-enters the VM with the function value it was handed.
fn call_twice(vm: &mut Vm, args: &[Value]) -> Result<Value, RuntimeError> {
    let func = args.first().cloned().unwrap_or(Value::Nil);
    let arg = args.get(1).cloned().unwrap_or(Value::Nil);

    let once = vm.call_function(&func, &[arg]).map_err(|t| t.error)?;
    let twice = vm.call_function(&func, &[once]).map_err(|t| t.error)?;
    Ok(twice)
}

#[test]
fn flat_registration_lands_in_globals() {
    let mut ctx = Context::new();
    ctx.register_library(
        None,
        &[("double", double)],
        &[("answer", Value::Int(42))],
    );

    assert_eq!(
        ctx.eval_source("return double(answer);").unwrap(),
        Value::Int(84)
    );
}

#[test]
fn grouped_registration_lands_under_the_library_name() {
    let mut ctx = Context::new();
    ctx.register_library(
        Some("strings"),
        &[("join", join)],
        &[("empty", Value::from(""))],
    );

    assert_eq!(
        ctx.eval_source(r#"return strings.join("a", 1, "b");"#).unwrap(),
        Value::from("a1b")
    );
    assert_eq!(
        ctx.eval_source("return strings.empty;").unwrap(),
        Value::from("")
    );
}

#[test]
fn native_errors_become_runtime_traps_with_the_native_in_the_trace() {
    let mut ctx = Context::new();
    ctx.register_library(None, &[("fail", fail)], &[]);

    let error = ctx.eval_source("return fail();").unwrap_err();
    let Error::Runtime(trap) = error else {
        panic!("expected runtime trap");
    };

    assert!(matches!(trap.error, RuntimeError::Native { .. }));
    let names: Vec<&str> = trap.backtrace.iter().map(|f| f.name()).collect();
    assert!(names.contains(&"fail"));
}

#[test]
fn natives_reenter_the_vm() {
    let mut ctx = Context::new();
    ctx.register_library(None, &[("call_twice", call_twice)], &[]);

    assert_eq!(
        ctx.eval_source(
            "fn inc(n) { return n + 1; }
             return call_twice(inc, 40);"
        )
        .unwrap(),
        Value::Int(42)
    );
}

#[test]
fn a_failed_call_leaves_the_return_slot_untouched() {
    let mut ctx = Context::new();
    ctx.register_library(None, &[("fail", fail)], &[]);

    // The failing call unwinds before any write to the return slot.
    let result = ctx.eval_source(
        "let keep = 7;
         keep = fail();
         return keep;",
    );
    assert!(result.is_err());
}

#[test]
fn host_calls_a_native_value_directly() {
    let mut ctx = Context::new();
    let func = Value::native("double", double);

    assert_eq!(
        ctx.call(&func, &[Value::Int(21)]).unwrap(),
        Value::Int(42)
    );

    let error = ctx.call(&func, &[Value::from("x")]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
}
