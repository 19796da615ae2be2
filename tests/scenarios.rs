//! End-to-end scenarios: source text in, final value out — directly and
//! after an object-file round trip.

use sable_vm::prelude::*;

use rstest::rstest;

fn eval(source: &str) -> Value {
    let mut ctx = Context::new();
    ctx.eval_source(source)
        .unwrap_or_else(|e| panic!("program failed: {e}"))
}

#[rstest]
#[case("return 1 + 2 * 3;", Value::Int(7))]
#[case("let a = [10, 20, 30]; return a[1] + a[2];", Value::Int(50))]
#[case(
    "fn fact(n) { if n < 2 { return 1; } return n * fact(n - 1); } return fact(6);",
    Value::Int(720)
)]
#[case(
    "fn adder(x) { return fn(y) { return x + y; }; } let a5 = adder(5); return a5(3) + a5(4);",
    Value::Int(17)
)]
#[case(
    r#"let h = { "a": 1, "b": 2 }; h.c = 3; return h.a + h.b + h.c;"#,
    Value::Int(6)
)]
#[case(r#"let s = "hello"; return s.length;"#, Value::Int(5))]
fn scenario(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), expected);

    // The same program must survive serialisation to the object format,
    // reloading, and re-execution.
    let mut ctx = Context::new();
    let program = ctx.compile_source(source).unwrap();
    let bytes = ctx.dump_object(&program).unwrap();
    let reloaded = ctx.load_object(&bytes).unwrap();
    assert_eq!(ctx.call(&reloaded, &[]).unwrap(), expected);
}

#[rstest]
#[case("return nil;", Value::Nil)]
#[case("return true;", Value::Bool(true))]
#[case("return 42;", Value::Int(42))]
#[case("return 2.5;", Value::Float(2.5))]
#[case(r#"return "hi";"#, Value::from("hi"))]
fn literal_round_trips(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source), expected);
}

#[test]
fn executing_twice_produces_identical_results() {
    let mut ctx = Context::new();
    let program = ctx
        .compile_source("let n = 0; let i = 0; while i < 10 { n += i; i = i + 1; } return n;")
        .unwrap();

    let first = ctx.call(&program, &[]).unwrap();
    let second = ctx.call(&program, &[]).unwrap();

    assert_eq!(first, Value::Int(45));
    assert_eq!(first, second);
}

#[test]
fn control_flow_kitchen_sink() {
    assert_eq!(
        eval(
            "let total = 0;
             for (let i = 0; i < 10; i = i + 1) {
                 if i % 2 == 0 { continue; }
                 if i == 9 { break; }
                 total += i;
             }
             return total;"
        ),
        Value::Int(1 + 3 + 5 + 7)
    );

    assert_eq!(
        eval("let n = 0; do { n = n + 1; } while n < 3; return n;"),
        Value::Int(3)
    );

    assert_eq!(eval("return true ? 1 : 2;"), Value::Int(1));
    assert_eq!(eval("return false || true ? 1 : 2;"), Value::Int(1));
    assert_eq!(eval("return 1 < 2 && 2 < 3;"), Value::Bool(true));
}

#[test]
fn operators_cover_the_full_table() {
    assert_eq!(eval("return 7 / 2;"), Value::Int(3));
    assert_eq!(eval("return 7 % 3;"), Value::Int(1));
    assert_eq!(eval("return 7.0 / 2.0;"), Value::Float(3.5));
    assert_eq!(eval("return 1 + 0.5;"), Value::Float(1.5));
    assert_eq!(eval("return -(3);"), Value::Int(-3));
    assert_eq!(eval("return 0xf0 & 0x3c;"), Value::Int(0x30));
    assert_eq!(eval("return 1 | 6;"), Value::Int(7));
    assert_eq!(eval("return 5 ^ 3;"), Value::Int(6));
    assert_eq!(eval("return 1 << 4;"), Value::Int(16));
    assert_eq!(eval("return 256 >> 4;"), Value::Int(16));
    assert_eq!(eval("return ~0;"), Value::Int(-1));
    assert_eq!(eval("return !false;"), Value::Bool(true));
    assert_eq!(eval(r#"return "ab" .. "cd";"#), Value::from("abcd"));
    assert_eq!(eval("return 1 == 1.0;"), Value::Bool(true));
    assert_eq!(eval(r#"return "a" != "b";"#), Value::Bool(true));
    assert_eq!(eval(r#"return "abc" < "abd";"#), Value::Bool(true));
    assert_eq!(eval("return typeof 1;"), Value::from("number"));
    assert_eq!(eval("return typeof nil;"), Value::from("nil"));
    assert_eq!(eval(r#"return typeof "x";"#), Value::from("string"));
}

#[test]
fn increments_and_compound_assignment() {
    assert_eq!(eval("let x = 1; x++; return x;"), Value::Int(2));
    assert_eq!(eval("let x = 1; return x++;"), Value::Int(1));
    assert_eq!(eval("let x = 1; return ++x;"), Value::Int(2));
    assert_eq!(eval("let x = 8; x /= 2; return x;"), Value::Int(4));
    assert_eq!(
        eval("let a = [1, 2]; a[0] += 10; return a[0];"),
        Value::Int(11)
    );
    assert_eq!(
        eval(r#"let h = { "n": 1 }; h.n += 5; return h.n;"#),
        Value::Int(6)
    );
}

#[test]
fn strings_index_as_bytes() {
    assert_eq!(eval(r#"return "A"[0];"#), Value::Int(65));
    assert_eq!(eval(r#"let s = "hi"; return s[1];"#), Value::Int(105));
}

#[test]
fn arrays_and_hashmaps_nest() {
    assert_eq!(
        eval(r#"let m = { "xs": [1, 2, 3] }; return m.xs[2];"#),
        Value::Int(3)
    );
    assert_eq!(
        eval(r#"let m = { 1: { 2: 30 } }; return m[1][2];"#),
        Value::Int(30)
    );
    // Int and float keys unify.
    assert_eq!(
        eval(r#"let m = { 1: "one" }; return m[1.0];"#),
        Value::from("one")
    );
}

#[test]
fn shadowing_is_permitted() {
    assert_eq!(
        eval("let x = 1; { let x = 2; } return x;"),
        Value::Int(1)
    );
    assert_eq!(
        eval("let x = 1; { let x = 2; x = 3; } return x;"),
        Value::Int(1)
    );
}

#[test]
fn function_arguments_default_to_nil() {
    assert_eq!(
        eval("fn f(a, b) { return typeof b; } return f(1);"),
        Value::from("nil")
    );
}

#[test]
fn program_header_matches_the_top_level_function_header() {
    let mut ctx = Context::new();
    let compiled = ctx.compile_source("let a = 1; let b = 2; return a + b;").unwrap();

    let Value::Function(func) = &compiled else {
        panic!("compiler must produce a function value");
    };
    let Function::Program(program) = func.as_ref() else {
        panic!("compiler must produce a top-level program");
    };

    let code = program.code();
    // Frame size in the program header equals NREGS in the function
    // header at the entry point.
    assert_eq!(code[3] as usize, program.frame_size());
    assert_eq!(code[4 + 2] as usize, program.frame_size());
    // Declared argc of the top level is zero and fits its registers.
    assert_eq!(code[4 + 1], 0);
}

#[test]
fn compilation_is_deterministic() {
    let source = "fn f(x) { return x * 2; } return f(21);";

    let mut ctx = Context::new();
    let a = ctx.compile_source(source).unwrap();
    let b = ctx.compile_source(source).unwrap();

    assert_eq!(ctx.dump_object(&a).unwrap(), ctx.dump_object(&b).unwrap());
}
