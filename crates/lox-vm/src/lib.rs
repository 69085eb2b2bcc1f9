//! The stack-based Lox virtual machine: value stack, call frames, globals,
//! upvalues, and the dispatch loop that walks a compiled `Chunk`.

pub mod error;
pub mod host;
pub mod vm;

pub use error::RuntimeError;
pub use host::{CapturingHost, Host, StdHost};
pub use lox_compiler::CompileError;
pub use vm::Vm;

/// The two ways a run can fail, mirroring the `{Ok, CompileError,
/// RuntimeError}` result the interpreter's entry point produces.
#[derive(Debug)]
pub enum InterpretError {
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

impl std::fmt::Display for InterpretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpretError::Compile(errs) => {
                for (i, e) in errs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
            InterpretError::Runtime(e) => write!(f, "{}", e.report()),
        }
    }
}

impl std::error::Error for InterpretError {}
