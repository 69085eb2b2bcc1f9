//! Opcode table for the Lox bytecode format.
//!
//! One byte opcode per instruction, followed by whatever operand bytes the
//! instruction needs (see the table in the spec). Variants are numbered
//! explicitly and must never be reordered or renumbered once bytecode exists
//! that embeds them — new opcodes are appended at the end.

/// A single bytecode instruction tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `u8` constant index.
    Constant = 0,
    /// `u24` little-endian constant index.
    ConstantLong,
    Nil,
    True,
    False,
    Pop,
    /// `u8` local slot.
    GetLocal,
    /// `u8` local slot.
    SetLocal,
    /// `u8` constant index naming the global.
    GetGlobal,
    /// `u8` constant index naming the global.
    DefineGlobal,
    /// `u8` constant index naming the global.
    SetGlobal,
    /// `u8` upvalue index.
    GetUpvalue,
    /// `u8` upvalue index.
    SetUpvalue,
    Equal,
    Greater,
    Less,
    Not,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Print,
    Assert,
    /// `u16` big-endian forward offset.
    Jump,
    /// `u16` big-endian forward offset; does not pop the condition.
    JumpIfFalse,
    /// `u16` big-endian backward offset.
    Loop,
    /// `u8` argument count.
    Call,
    /// `u8` constant index of the function, then `upvalue_count` pairs of
    /// `(is_local: u8, index: u8)`.
    Closure,
    CloseUpvalue,
    Return,
}

impl Op {
    /// The mnemonic used by the disassembler, matching the opcode name.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Constant => "OP_CONSTANT",
            Op::ConstantLong => "OP_CONSTANT_LONG",
            Op::Nil => "OP_NIL",
            Op::True => "OP_TRUE",
            Op::False => "OP_FALSE",
            Op::Pop => "OP_POP",
            Op::GetLocal => "OP_GET_LOCAL",
            Op::SetLocal => "OP_SET_LOCAL",
            Op::GetGlobal => "OP_GET_GLOBAL",
            Op::DefineGlobal => "OP_DEFINE_GLOBAL",
            Op::SetGlobal => "OP_SET_GLOBAL",
            Op::GetUpvalue => "OP_GET_UPVALUE",
            Op::SetUpvalue => "OP_SET_UPVALUE",
            Op::Equal => "OP_EQUAL",
            Op::Greater => "OP_GREATER",
            Op::Less => "OP_LESS",
            Op::Not => "OP_NOT",
            Op::Negate => "OP_NEGATE",
            Op::Add => "OP_ADD",
            Op::Subtract => "OP_SUBTRACT",
            Op::Multiply => "OP_MULTIPLY",
            Op::Divide => "OP_DIVIDE",
            Op::Print => "OP_PRINT",
            Op::Assert => "OP_ASSERT",
            Op::Jump => "OP_JUMP",
            Op::JumpIfFalse => "OP_JUMP_IF_FALSE",
            Op::Loop => "OP_LOOP",
            Op::Call => "OP_CALL",
            Op::Closure => "OP_CLOSURE",
            Op::CloseUpvalue => "OP_CLOSE_UPVALUE",
            Op::Return => "OP_RETURN",
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        use Op::*;
        Ok(match byte {
            0 => Constant,
            1 => ConstantLong,
            2 => Nil,
            3 => True,
            4 => False,
            5 => Pop,
            6 => GetLocal,
            7 => SetLocal,
            8 => GetGlobal,
            9 => DefineGlobal,
            10 => SetGlobal,
            11 => GetUpvalue,
            12 => SetUpvalue,
            13 => Equal,
            14 => Greater,
            15 => Less,
            16 => Not,
            17 => Negate,
            18 => Add,
            19 => Subtract,
            20 => Multiply,
            21 => Divide,
            22 => Print,
            23 => Assert,
            24 => Jump,
            25 => JumpIfFalse,
            26 => Loop,
            27 => Call,
            28 => Closure,
            29 => CloseUpvalue,
            30 => Return,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode() {
        for op in [
            Op::Constant, Op::ConstantLong, Op::Nil, Op::True, Op::False, Op::Pop,
            Op::GetLocal, Op::SetLocal, Op::GetGlobal, Op::DefineGlobal, Op::SetGlobal,
            Op::GetUpvalue, Op::SetUpvalue, Op::Equal, Op::Greater, Op::Less, Op::Not,
            Op::Negate, Op::Add, Op::Subtract, Op::Multiply, Op::Divide, Op::Print,
            Op::Assert, Op::Jump, Op::JumpIfFalse, Op::Loop, Op::Call, Op::Closure,
            Op::CloseUpvalue, Op::Return,
        ] {
            assert_eq!(Op::try_from(op.as_u8()), Ok(op));
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert_eq!(Op::try_from(255), Err(255));
    }
}
