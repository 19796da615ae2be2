//! Error taxonomy, traps, stack traces and the global/symbol protocols.

use sable_vm::prelude::*;

fn eval_err(source: &str) -> Error {
    let mut ctx = Context::new();
    match ctx.eval_source(source) {
        Ok(value) => panic!("expected failure, got {value}"),
        Err(error) => error,
    }
}

fn runtime_err(source: &str) -> RuntimeError {
    match eval_err(source) {
        Error::Runtime(trap) => trap.error,
        other => panic!("expected runtime error, got {other}"),
    }
}

#[test]
fn error_kinds_map_to_their_stage() {
    assert_eq!(eval_err("return 1 +;").kind(), ErrorKind::Syntax);
    assert_eq!(eval_err("break;").kind(), ErrorKind::Semantic);
    assert_eq!(eval_err("return 1 / 0;").kind(), ErrorKind::Runtime);

    let mut ctx = Context::new();
    assert_eq!(
        ctx.load_object(b"not a program").unwrap_err().kind(),
        ErrorKind::Generic
    );
}

#[test]
fn syntax_and_semantic_errors_carry_locations() {
    let error = eval_err("let x = 1;\n  return 1 +;");
    assert_eq!(error.location(), Some(SourceLocation::new(2, 13)));

    let error = eval_err("\n\n  continue;");
    assert_eq!(error.location(), Some(SourceLocation::new(3, 3)));
}

#[test]
fn division_and_modulo_by_zero() {
    assert_eq!(runtime_err("return 1 / 0;"), RuntimeError::DivisionByZero);
    assert_eq!(runtime_err("return 1 % 0;"), RuntimeError::DivisionByZero);

    // Floats follow IEEE-754 instead of trapping.
    let mut ctx = Context::new();
    assert_eq!(
        ctx.eval_source("return 1.0 / 0.0;").unwrap(),
        Value::Float(f64::INFINITY)
    );
}

#[test]
fn negative_and_oversized_indices_trap() {
    assert_eq!(
        runtime_err("let a = [1]; return a[-1];"),
        RuntimeError::IndexOutOfBounds { index: -1, len: 1 }
    );
    assert_eq!(
        runtime_err("let a = [1]; return a[1];"),
        RuntimeError::IndexOutOfBounds { index: 1, len: 1 }
    );
}

#[test]
fn invalid_hashmap_keys_trap() {
    assert_eq!(
        runtime_err("let h = {}; h[0.0 / 0.0] = 1;"),
        RuntimeError::InvalidKey("NaN")
    );
    assert_eq!(
        runtime_err("let h = {}; h[nil] = 1;"),
        RuntimeError::InvalidKey("nil")
    );
}

#[test]
fn calling_a_non_function_traps() {
    assert_eq!(
        runtime_err("let x = 1; return x();"),
        RuntimeError::NotCallable("number")
    );
}

#[test]
fn ordering_number_against_string_traps() {
    assert_eq!(
        runtime_err(r#"return 1 < "a";"#),
        RuntimeError::NotComparable {
            left: "number",
            right: "string",
        }
    );
}

#[test]
fn conditions_must_be_booleans() {
    assert!(matches!(
        runtime_err("if 1 { return 2; } return 3;"),
        RuntimeError::TypeMismatch {
            expected: "bool",
            ..
        }
    ));
}

#[test]
fn undefined_global_reports_its_name() {
    match runtime_err("return missing();") {
        RuntimeError::UndefinedGlobal(name) => assert_eq!(name.as_ref(), "missing"),
        other => panic!("expected undefined global, got {other}"),
    }
}

#[test]
fn global_redefinition_traps_on_the_second_run() {
    let mut ctx = Context::new();
    let program = ctx.compile_source("const answer = 42; return answer;").unwrap();

    assert_eq!(ctx.call(&program, &[]).unwrap(), Value::Int(42));

    match ctx.call(&program, &[]) {
        Err(Error::Runtime(trap)) => match trap.error {
            RuntimeError::GlobalRedefinition(name) => assert_eq!(name.as_ref(), "answer"),
            other => panic!("expected redefinition error, got {other}"),
        },
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn ldsym_resolution_is_memoised_per_program() {
    let mut ctx = Context::new();
    ctx.set_global("g", Value::Int(1));

    let program = ctx.compile_source("return g;").unwrap();
    assert_eq!(ctx.call(&program, &[]).unwrap(), Value::Int(1));

    // The stub was promoted in place; later global changes are invisible
    // to this program instance.
    ctx.set_global("g", Value::Int(2));
    assert_eq!(ctx.call(&program, &[]).unwrap(), Value::Int(1));

    // A fresh compilation resolves anew.
    assert_eq!(ctx.eval_source("return g;").unwrap(), Value::Int(2));
}

#[test]
fn traps_carry_an_address_and_a_backtrace() {
    let mut ctx = Context::new();
    let error = ctx
        .eval_source(
            "fn inner() { return 1 / 0; }
             fn outer() { return inner(); }
             return outer();",
        )
        .unwrap_err();

    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };

    assert_eq!(trap.error, RuntimeError::DivisionByZero);
    assert!(trap.address.is_some());

    let names: Vec<&str> = trap.backtrace.iter().map(|f| f.name()).collect();
    assert_eq!(names[0], "inner");
    assert_eq!(names[1], "outer");
    assert_eq!(names.last(), Some(&"<script>"));

    // The trap stays readable on the context until the next entry.
    assert_eq!(ctx.backtrace().len(), names.len());
}

#[test]
fn the_first_trap_wins_until_the_next_entry() {
    let mut ctx = Context::new();

    ctx.eval_source("return 1 / 0;").unwrap_err();
    let first = ctx.vm().last_trap().cloned().unwrap();
    assert_eq!(first.error, RuntimeError::DivisionByZero);

    // A successful entry clears the slot.
    ctx.eval_source("return 1;").unwrap();
    assert!(ctx.vm().last_trap().is_none());
}

#[test]
fn last_error_record_summarises() {
    let mut ctx = Context::new();

    ctx.eval_source("return 1 +;").unwrap_err();
    let record = ctx.last_error().unwrap();
    assert_eq!(record.kind, ErrorKind::Syntax);
    assert!(record.location.is_some());

    ctx.eval_source("return 1;").unwrap();
    assert!(ctx.last_error().is_none());
}

#[test]
fn assignment_to_undeclared_or_captured_names_is_semantic() {
    assert_eq!(eval_err("x = 1;").kind(), ErrorKind::Semantic);
    assert_eq!(
        eval_err("let x = 1; let f = fn() { x = 2; }; f();").kind(),
        ErrorKind::Semantic
    );
}

#[test]
fn call_depth_limit_unwinds_cooperatively() {
    let mut ctx = Context::with_params(VmParams {
        max_call_depth: 32,
        ..VmParams::default()
    });

    let error = ctx
        .eval_source("fn loop_(n) { return loop_(n + 1); } return loop_(0);")
        .unwrap_err();

    let Error::Runtime(trap) = error else {
        panic!("expected runtime error");
    };
    assert_eq!(trap.error, RuntimeError::CallDepthExceeded(32));

    // The VM is usable again after unwinding.
    assert_eq!(ctx.eval_source("return 1;").unwrap(), Value::Int(1));
}
