//! Value representation, object heap, and bytecode `Chunk` for the Lox VM.
//!
//! This crate has no notion of compiling or executing bytecode — it only
//! defines the data the compiler emits and the VM interprets.

pub mod chunk;
pub mod disasm;
pub mod object;
pub mod opcode;
pub mod value;

pub use chunk::Chunk;
pub use object::{Heap, Obj};
pub use opcode::Op;
pub use value::Value;
