//! Whole Lox programs, run through `Vm::interpret`, checked against `print`
//! output and exit-relevant error cases.

use indoc::indoc;
use lox_vm::{CapturingHost, InterpretError, Vm};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Result<Vec<String>, InterpretError> {
    let host = CapturingHost::default();
    let mut vm = Vm::new().with_host(Box::new(host.clone()));
    vm.interpret(source)?;
    let lines = host.0.borrow().clone();
    Ok(lines)
}

#[test]
fn arithmetic_precedence() {
    let out = run("print 1 + 2 * 3;").unwrap();
    assert_eq!(out, vec!["7"]);
}

#[test]
fn string_concatenation() {
    let out = run(r#"var a = "foo"; var b = "bar"; print a + b;"#).unwrap();
    assert_eq!(out, vec!["foobar"]);
}

#[test]
fn for_loop_accumulation() {
    let out = run("var n = 0; for (var i = 0; i < 5; i = i + 1) n = n + i; print n;").unwrap();
    assert_eq!(out, vec!["10"]);
}

#[test]
fn closures_capture_and_share_state_across_calls() {
    let source = indoc! {"
        fun make() {
            var x = 0;
            fun inc() {
                x = x + 1;
                return x;
            }
            return inc;
        }
        var c = make();
        print c();
        print c();
        print c();
    "};
    let out = run(source).unwrap();
    assert_eq!(out, vec!["1", "2", "3"]);
}

#[test]
fn undefined_global_read_is_a_runtime_error() {
    let err = run("print undefined_var;").unwrap_err();
    match err {
        InterpretError::Runtime(e) => {
            assert_eq!(e.message, "Undefined variable undefined_var.");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn calling_with_wrong_arity_is_a_runtime_error() {
    let err = run("fun f(a,b){return a+b;} print f(1);").unwrap_err();
    match err {
        InterpretError::Runtime(e) => {
            assert_eq!(e.message, "Expected 2 arguments but got 1.");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn compile_errors_surface_instead_of_running() {
    let err = run("1 + ;").unwrap_err();
    assert!(matches!(err, InterpretError::Compile(_)));
}

#[test]
fn captured_local_reads_last_assigned_value_after_scope_closes() {
    let source = indoc! {"
        fun outer() {
            var x = 1;
            fun inner() { return x; }
            x = 99;
            return inner;
        }
        print outer()();
    "};
    let out = run(source).unwrap();
    assert_eq!(out, vec!["99"]);
}

#[test]
fn frame_depth_512_is_ok_513_overflows() {
    let source = "fun rec(n) { if (n == 0) return 0; return rec(n - 1); } print rec(510);";
    assert!(run(source).is_ok());

    let overflow_source = "fun rec(n) { if (n == 0) return 0; return rec(n - 1); } print rec(511);";
    let err = run(overflow_source).unwrap_err();
    match err {
        InterpretError::Runtime(e) => assert_eq!(e.message, "Stack overflow."),
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn clock_native_returns_a_number() {
    let out = run("print clock() >= 0;").unwrap();
    assert_eq!(out, vec!["true"]);
}

#[test]
fn vm_is_usable_again_after_a_runtime_error_mid_call_stack() {
    let host = CapturingHost::default();
    let mut vm = Vm::new().with_host(Box::new(host.clone()));

    let source = indoc! {"
        fun inner() { return 1 / nope; }
        fun outer() { return inner(); }
        outer();
    "};
    assert!(matches!(vm.interpret(source), Err(InterpretError::Runtime(_))));

    // A fresh top-level program must run cleanly on the same `Vm`, the way
    // a REPL reuses one `Vm` across lines: stale frames/stack from the
    // failed call above must not resurface.
    vm.interpret("print 1 + 1;").unwrap();
    assert_eq!(host.0.borrow().clone(), vec!["2"]);
}

#[test]
fn runtime_error_carries_a_stack_trace_through_nested_calls() {
    let source = indoc! {"
        fun inner() { return 1 / nope; }
        fun outer() { return inner(); }
        outer();
    "};
    let err = run(source).unwrap_err();
    match err {
        InterpretError::Runtime(e) => {
            assert!(e.trace.iter().any(|f| f.name.as_deref() == Some("inner")));
            assert!(e.trace.iter().any(|f| f.name.as_deref() == Some("outer")));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}
