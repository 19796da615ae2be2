//! Closures, upvalue capture and the variadic argument array.

use sable_vm::prelude::*;

fn eval(source: &str) -> Value {
    let mut ctx = Context::new();
    ctx.eval_source(source)
        .unwrap_or_else(|e| panic!("program failed: {e}"))
}

#[test]
fn captures_are_bound_by_value_at_construction() {
    assert_eq!(
        eval(
            "let x = 1;
             let f = fn() { return x; };
             x = 2;
             return f();"
        ),
        Value::Int(1)
    );
}

#[test]
fn each_call_captures_fresh_values() {
    assert_eq!(
        eval(
            "fn make(n) { return fn() { return n * 10; }; }
             let a = make(1);
             let b = make(2);
             return a() + b();"
        ),
        Value::Int(30)
    );
}

#[test]
fn nested_closures_reach_through_outer_captures() {
    assert_eq!(
        eval(
            "fn outer(a) {
                 return fn(b) {
                     return fn(c) { return a + b + c; };
                 };
             }
             return outer(100)(20)(3);"
        ),
        Value::Int(123)
    );
}

#[test]
fn self_capture_sees_the_closure_not_the_prototype() {
    // Recursion through a local function name requires CLOSURE to install
    // the closure before consuming its descriptors.
    assert_eq!(
        eval(
            "fn fib(n) {
                 if n < 2 { return n; }
                 return fib(n - 1) + fib(n - 2);
             }
             return fib(10);"
        ),
        Value::Int(55)
    );
}

#[test]
fn mutual_recursion_through_globals() {
    assert_eq!(
        eval(
            "const is_even = fn(n) { return n == 0 ? true : is_odd(n - 1); },
                   is_odd = fn(n) { return n == 0 ? false : is_even(n - 1); };
             return is_even(10);"
        ),
        Value::Bool(true)
    );
}

#[test]
fn argv_length_is_the_real_argument_count() {
    assert_eq!(
        eval("fn f(a, b) { return $.length; } return f(1);"),
        Value::Int(1)
    );
    assert_eq!(
        eval("fn f(a, b) { return $.length; } return f(1, 2, 3, 4);"),
        Value::Int(4)
    );
}

#[test]
fn argv_reaches_the_variadic_tail() {
    assert_eq!(
        eval("fn f(a) { return $[2]; } return f(1, 2, 33);"),
        Value::Int(33)
    );
}

#[test]
fn argv_is_cached_per_frame() {
    // Two ARGV in one frame must yield the same array instance.
    assert_eq!(
        eval("fn f() { return $ == $; } return f(1, 2);"),
        Value::Bool(true)
    );
}

#[test]
fn lambdas_pass_as_values() {
    assert_eq!(
        eval(
            "fn apply(f, x) { return f(x); }
             return apply(fn(v) { return v + 1; }, 41);"
        ),
        Value::Int(42)
    );
}

#[test]
fn host_arguments_reach_named_parameters() {
    let mut ctx = Context::new();
    let program = ctx
        .compile_source("fn add(a, b) { return a + b; } return add;")
        .unwrap();

    let add = ctx.call(&program, &[]).unwrap();
    let sum = ctx.call(&add, &[Value::Int(2), Value::Int(40)]).unwrap();

    assert_eq!(sum, Value::Int(42));
}
