//! Human-readable disassembler, used by tests and by `lox-cli --trace`.
//!
//! Grounded on `vitte-core::bytecode::disasm`'s compact-view shape and on
//! `clox/debug.c`'s per-instruction layout (`simpleInstruction`,
//! `byteInstruction`, `constantInstruction`).

use std::fmt::Write as _;

use crate::chunk::Chunk;
use crate::opcode::Op;

/// Disassembles every instruction in `chunk`, one line each.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        let _ = writeln!(out, "{line}");
        offset = next;
    }
    out
}

/// Disassembles one instruction at `offset`, returning its text and the
/// offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut line = format!("{offset:04} ");
    if offset > 0 && chunk.line_of(offset) == chunk.line_of(offset - 1) {
        line.push_str("   | ");
    } else {
        let _ = write!(line, "{:4} ", chunk.line_of(offset));
    }

    let byte = chunk.read_u8(offset);
    let Ok(op) = Op::try_from(byte) else {
        let _ = write!(line, "Unknown opcode {byte}");
        return (line, offset + 1);
    };

    let next = match op {
        Op::Constant => constant_instruction(&mut line, chunk, op, offset, 1),
        Op::ConstantLong => constant_instruction(&mut line, chunk, op, offset, 3),
        Op::GetLocal | Op::SetLocal | Op::GetGlobal | Op::DefineGlobal | Op::SetGlobal
        | Op::GetUpvalue | Op::SetUpvalue | Op::Call => byte_instruction(&mut line, chunk, op, offset),
        Op::Jump | Op::JumpIfFalse => jump_instruction(&mut line, chunk, op, offset, 1),
        Op::Loop => jump_instruction(&mut line, chunk, op, offset, -1),
        Op::Closure => closure_instruction(&mut line, chunk, offset),
        _ => simple_instruction(&mut line, op, offset),
    };
    (line, next)
}

fn simple_instruction(out: &mut String, op: Op, offset: usize) -> usize {
    out.push_str(op.mnemonic());
    offset + 1
}

fn byte_instruction(out: &mut String, chunk: &Chunk, op: Op, offset: usize) -> usize {
    let slot = chunk.read_u8(offset + 1);
    let _ = write!(out, "{:<16} {:>4}", op.mnemonic(), slot);
    offset + 2
}

fn constant_instruction(out: &mut String, chunk: &Chunk, op: Op, offset: usize, operand_size: usize) -> usize {
    let index = if operand_size == 1 { chunk.read_u8(offset + 1) as usize } else { chunk.read_u24(offset + 1) };
    let value = chunk.constants.get(index).map(|v| v.to_string()).unwrap_or_else(|| "<invalid>".to_string());
    let _ = write!(out, "{:<16} {:>4} '{value}'", op.mnemonic(), index);
    offset + 1 + operand_size
}

fn jump_instruction(out: &mut String, chunk: &Chunk, op: Op, offset: usize, sign: i32) -> usize {
    let jump = chunk.read_u16(offset + 1) as i32;
    let target = offset as i32 + 3 + sign * jump;
    let _ = write!(out, "{:<16} {:>4} -> {}", op.mnemonic(), offset, target);
    offset + 3
}

fn closure_instruction(out: &mut String, chunk: &Chunk, offset: usize) -> usize {
    use crate::object::Obj;
    use crate::value::Value;

    let const_index = chunk.read_u8(offset + 1) as usize;
    let constant = chunk.constants.get(const_index);
    let value = constant.map(|v| v.to_string()).unwrap_or_else(|| "<invalid>".to_string());
    let _ = write!(out, "{:<16} {:>4} '{value}'", Op::Closure.mnemonic(), const_index);

    let upvalue_count = match constant {
        Some(Value::Obj(Obj::Function(f))) => f.upvalue_count,
        _ => 0,
    };
    let mut pos = offset + 2;
    for _ in 0..upvalue_count {
        let is_local = chunk.read_u8(pos);
        let index = chunk.read_u8(pos + 1);
        let _ = write!(out, "\n{pos:04}      |                     {} {}", if is_local != 0 { "local" } else { "upvalue" }, index);
        pos += 2;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn disassembles_a_simple_constant_and_return() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1).unwrap();
        chunk.write_op(Op::Return, 1);
        let text = disassemble_chunk(&chunk, "test");
        assert!(text.contains("OP_CONSTANT"));
        assert!(text.contains("OP_RETURN"));
    }
}
