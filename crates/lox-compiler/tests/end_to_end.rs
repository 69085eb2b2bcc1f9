//! Whole-program compiles, checked by disassembling the result.
//!
//! Complements the in-module unit tests in `src/compiler.rs`, which probe
//! individual emission decisions; these exercise `compile()` the way a
//! caller actually does, end to end.

use indoc::indoc;
use lox_core::disasm::disassemble_chunk;
use lox_core::{Heap, Obj};

fn compile_ok(source: &str) -> String {
    let mut heap = Heap::new();
    let function = lox_compiler::compile(source, &mut heap).expect("source should compile");
    disassemble_chunk(&function.chunk, "test")
}

#[test]
fn arithmetic_expression_statement_compiles() {
    let text = compile_ok("print 1 + 2 * 3;");
    assert!(text.contains("OP_CONSTANT"));
    assert!(text.contains("OP_MULTIPLY"));
    assert!(text.contains("OP_ADD"));
    assert!(text.contains("OP_PRINT"));
}

#[test]
fn constant_pool_past_256_entries_forces_long_form() {
    let mut source = String::new();
    for i in 0..257 {
        source.push_str(&format!("print {i};\n"));
    }
    let text = compile_ok(&source);
    assert!(text.contains("OP_CONSTANT_LONG"));
}

#[test]
fn function_with_255_parameters_compiles() {
    let params: Vec<String> = (0..255).map(|i| format!("p{i}")).collect();
    let source = format!("fun f({}) {{ return p0; }}", params.join(", "));
    compile_ok(&source);
}

#[test]
fn function_with_256_parameters_is_a_compile_error() {
    let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
    let source = format!("fun f({}) {{ return p0; }}", params.join(", "));
    let mut heap = Heap::new();
    let errs = lox_compiler::compile(&source, &mut heap).unwrap_err();
    assert!(errs.iter().any(|e| e.message.contains("Can't have more than 255 parameters")));
}

#[test]
fn nested_closure_program_compiles_end_to_end() {
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
    "};
    let mut heap = Heap::new();
    let function = lox_compiler::compile(source, &mut heap).expect("should compile");
    let text = disassemble_chunk(&function.chunk, "script");
    assert!(text.contains("OP_CLOSURE"));

    let make_const = function
        .chunk
        .constants
        .iter()
        .find_map(|v| match v {
            lox_core::Value::Obj(Obj::Function(f)) => Some(f.clone()),
            _ => None,
        })
        .expect("make() constant present");
    let make_text = disassemble_chunk(&make_const.chunk, "make");
    assert!(make_text.contains("OP_CLOSURE"));
    assert!(make_text.contains("local"));

    let inc_const = make_const
        .chunk
        .constants
        .iter()
        .find_map(|v| match v {
            lox_core::Value::Obj(Obj::Function(f)) => Some(f.clone()),
            _ => None,
        })
        .expect("inc() constant present");
    let inc_text = disassemble_chunk(&inc_const.chunk, "inc");
    assert!(inc_text.contains("OP_GET_UPVALUE"));
    assert!(inc_text.contains("OP_SET_UPVALUE"));
}

#[test]
fn return_at_top_level_is_a_compile_error() {
    let mut heap = Heap::new();
    let errs = lox_compiler::compile("return 1;", &mut heap).unwrap_err();
    assert!(errs.iter().any(|e| e.message.contains("Can't return from top-level code")));
}

#[test]
fn invalid_assignment_target_reports_every_error_after_synchronizing() {
    let source = indoc! {"
        1 + 2 = 3;
        var x = 4 = 5;
    "};
    let mut heap = Heap::new();
    let errs = lox_compiler::compile(source, &mut heap).unwrap_err();
    assert!(errs.len() >= 2);
    assert!(errs.iter().all(|e| e.message.contains("Invalid assignment target")));
}
