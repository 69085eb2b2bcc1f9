//! A single-pass Pratt parser that emits bytecode directly — no
//! intermediate AST. Locals, upvalues and jump patching are all resolved
//! while walking tokens once.

use lox_core::object::{FunctionRef, LoxFunction, Obj};
use lox_core::value::Value;
use lox_core::{Chunk, Heap, Op};

use crate::error::CompileError;
use crate::scanner::{Scanner, Token, TokenKind};

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

struct ParseRule<'src> {
    prefix: Option<ParseFn<'src>>,
    infix: Option<ParseFn<'src>>,
    precedence: Precedence,
}

fn rule_for<'src>(kind: TokenKind) -> ParseRule<'src> {
    use TokenKind::*;
    let (prefix, infix, precedence): (Option<ParseFn<'src>>, Option<ParseFn<'src>>, Precedence) = match kind {
        LeftParen => (Some(Compiler::grouping), Some(Compiler::call), Precedence::Call),
        Minus => (Some(Compiler::unary), Some(Compiler::binary), Precedence::Term),
        Plus => (None, Some(Compiler::binary), Precedence::Term),
        Slash => (None, Some(Compiler::binary), Precedence::Factor),
        Star => (None, Some(Compiler::binary), Precedence::Factor),
        Bang => (Some(Compiler::unary), None, Precedence::None),
        BangEqual => (None, Some(Compiler::binary), Precedence::Equality),
        EqualEqual => (None, Some(Compiler::binary), Precedence::Equality),
        Greater => (None, Some(Compiler::binary), Precedence::Comparison),
        GreaterEqual => (None, Some(Compiler::binary), Precedence::Comparison),
        Less => (None, Some(Compiler::binary), Precedence::Comparison),
        LessEqual => (None, Some(Compiler::binary), Precedence::Comparison),
        Identifier => (Some(Compiler::variable), None, Precedence::None),
        String => (Some(Compiler::string), None, Precedence::None),
        Number => (Some(Compiler::number), None, Precedence::None),
        And => (None, Some(Compiler::and_), Precedence::And),
        Or => (None, Some(Compiler::or_), Precedence::Or),
        False => (Some(Compiler::literal), None, Precedence::None),
        Nil => (Some(Compiler::literal), None, Precedence::None),
        True => (Some(Compiler::literal), None, Precedence::None),
        _ => (None, None, Precedence::None),
    };
    ParseRule { prefix, infix, precedence }
}

#[derive(Debug)]
struct Local {
    name: String,
    depth: i32,
    is_captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UpvalueDesc {
    index: u8,
    is_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

struct FuncCtx {
    kind: FunctionKind,
    name: Option<String>,
    arity: u8,
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: i32,
    upvalues: Vec<UpvalueDesc>,
}

impl FuncCtx {
    fn new(kind: FunctionKind, name: Option<String>) -> Self {
        // Slot 0 is reserved for the callee itself (the running closure).
        let locals = vec![Local { name: String::new(), depth: 0, is_captured: false }];
        Self { kind, name, arity: 0, chunk: Chunk::new(), locals, scope_depth: 0, upvalues: Vec::new() }
    }
}

/// Compiles Lox source into a top-level script `FunctionRef`.
pub struct Compiler<'src> {
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<CompileError>,
    heap: &'src mut Heap,
    funcs: Vec<FuncCtx>,
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str, heap: &'src mut Heap) -> Self {
        let dummy = Token { kind: TokenKind::Eof, lexeme: "", line: 0 };
        Self {
            scanner: Scanner::new(source),
            previous: dummy,
            current: dummy,
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
            heap,
            funcs: vec![FuncCtx::new(FunctionKind::Script, None)],
        }
    }

    fn current_func(&mut self) -> &mut FuncCtx {
        self.funcs.last_mut().expect("compiler always has a function context")
    }

    fn chunk(&mut self) -> &mut Chunk {
        &mut self.current_func().chunk
    }

    // ---- token stream -----------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let msg = self.current.lexeme.to_string();
            self.error_at_current(&msg);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            tracing::trace!(target: "lox_compiler::diag", line = token.line, "suppressed cascaded error: {message}");
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let lexeme = if token.kind == TokenKind::Eof { String::new() } else { token.lexeme.to_string() };
        tracing::debug!(target: "lox_compiler::diag", line = token.line, lexeme = %lexeme, "{message}");
        self.errors.push(CompileError { line: token.line, lexeme, message: message.to_string() });
    }

    // ---- bytecode emission -------------------------------------------

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: Op) {
        self.emit_byte(op.as_u8());
    }

    fn emit_op_byte(&mut self, op: Op, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(Op::Loop);
        let offset = self.chunk().code.len() + 2 - loop_start;
        if offset > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    fn emit_jump(&mut self, op: Op) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.chunk().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk().code.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let chunk = self.chunk();
        chunk.code[offset] = ((jump >> 8) & 0xff) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_return(&mut self) {
        self.emit_op(Op::Nil);
        self.emit_op(Op::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk().add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let line = self.previous.line;
        if self.chunk().write_constant(value, line).is_err() {
            self.error("Too many constants in one chunk.");
        }
    }

    // ---- scopes & locals -----------------------------------------------

    fn begin_scope(&mut self) {
        self.current_func().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_func().scope_depth -= 1;
        let depth = self.current_func().scope_depth;
        while let Some(local) = self.current_func().locals.last() {
            if local.depth <= depth {
                break;
            }
            if self.current_func().locals.last().unwrap().is_captured {
                self.emit_op(Op::CloseUpvalue);
            } else {
                self.emit_op(Op::Pop);
            }
            self.current_func().locals.pop();
        }
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let str_ref = self.heap.intern(name);
        self.make_constant(Value::Obj(Obj::Str(str_ref)))
    }

    fn resolve_local(&mut self, func_index: usize, name: &str) -> Option<u8> {
        for (slot, local) in self.funcs[func_index].locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(slot as u8);
            }
        }
        None
    }

    fn resolve_upvalue(&mut self, func_index: usize, name: &str) -> Option<u8> {
        if func_index == 0 {
            return None;
        }
        let enclosing = func_index - 1;
        if let Some(local_slot) = self.resolve_local(enclosing, name) {
            self.funcs[enclosing].locals[local_slot as usize].is_captured = true;
            return Some(self.add_upvalue(func_index, local_slot, true));
        }
        if let Some(upvalue_index) = self.resolve_upvalue(enclosing, name) {
            return Some(self.add_upvalue(func_index, upvalue_index, false));
        }
        None
    }

    fn add_upvalue(&mut self, func_index: usize, index: u8, is_local: bool) -> u8 {
        let upvalues = &mut self.funcs[func_index].upvalues;
        for (i, up) in upvalues.iter().enumerate() {
            if up.index == index && up.is_local == is_local {
                return i as u8;
            }
        }
        if upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        upvalues.push(UpvalueDesc { index, is_local });
        (upvalues.len() - 1) as u8
    }

    fn add_local(&mut self, name: String) {
        let func = self.current_func();
        if func.locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        func.locals.push(Local { name, depth: -1, is_captured: false });
    }

    fn declare_variable(&mut self) {
        if self.current_func().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.to_string();
        let depth = self.current_func().scope_depth;
        let mut redeclared = false;
        for local in self.current_func().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name == name {
                redeclared = true;
                break;
            }
        }
        if redeclared {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    fn mark_initialized(&mut self) {
        let func = self.current_func();
        if func.scope_depth == 0 {
            return;
        }
        let depth = func.scope_depth;
        if let Some(local) = func.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn parse_variable(&mut self, error_message: &str) -> u8 {
        self.consume(TokenKind::Identifier, error_message);
        self.declare_variable();
        if self.current_func().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.to_string();
        self.identifier_constant(&name)
    }

    fn define_variable(&mut self, global: u8) {
        if self.current_func().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_byte(Op::DefineGlobal, global);
    }

    // ---- expressions ----------------------------------------------------

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule_for(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            let infix = rule_for(self.previous.kind).infix.expect("infix rule must exist at this precedence");
            infix(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().expect("scanner only yields valid numeric lexemes");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let str_ref = self.heap.intern(contents);
        self.emit_constant(Value::Obj(Obj::Str(str_ref)));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(Op::False),
            TokenKind::True => self.emit_op(Op::True),
            TokenKind::Nil => self.emit_op(Op::Nil),
            _ => unreachable!("literal() only dispatched for false/true/nil"),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match kind {
            TokenKind::Minus => self.emit_op(Op::Negate),
            TokenKind::Bang => self.emit_op(Op::Not),
            _ => unreachable!("unary() only dispatched for -/!"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        let rule = rule_for(kind);
        self.parse_precedence(rule.precedence.next());
        match kind {
            TokenKind::Plus => self.emit_op(Op::Add),
            TokenKind::Minus => self.emit_op(Op::Subtract),
            TokenKind::Star => self.emit_op(Op::Multiply),
            TokenKind::Slash => self.emit_op(Op::Divide),
            TokenKind::BangEqual => {
                self.emit_op(Op::Equal);
                self.emit_op(Op::Not);
            }
            TokenKind::EqualEqual => self.emit_op(Op::Equal),
            TokenKind::Greater => self.emit_op(Op::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(Op::Less);
                self.emit_op(Op::Not);
            }
            TokenKind::Less => self.emit_op(Op::Less),
            TokenKind::LessEqual => {
                self.emit_op(Op::Greater);
                self.emit_op(Op::Not);
            }
            _ => unreachable!("binary() only dispatched for arithmetic/comparison operators"),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(Op::JumpIfFalse);
        let end_jump = self.emit_jump(Op::Jump);
        self.patch_jump(else_jump);
        self.emit_op(Op::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.to_string();
        self.named_variable(&name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let func_index = self.funcs.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(func_index, name) {
            (Op::GetLocal, Op::SetLocal, slot)
        } else if let Some(slot) = self.resolve_upvalue(func_index, name) {
            (Op::GetUpvalue, Op::SetUpvalue, slot)
        } else {
            let slot = self.identifier_constant(name);
            (Op::GetGlobal, Op::SetGlobal, slot)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op_byte(Op::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: u16 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if argc == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                argc += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        argc as u8
    }

    // ---- statements -------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Assert
                | TokenKind::Return => return,
                _ => self.advance(),
            }
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(Op::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    fn function(&mut self, kind: FunctionKind) {
        let name = self.previous.lexeme.to_string();
        self.funcs.push(FuncCtx::new(kind, Some(name)));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                let func = self.current_func();
                if func.arity == 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.current_func().arity += 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        self.emit_return();
        let func_ctx = self.funcs.pop().expect("just pushed a function context");
        let upvalues = func_ctx.upvalues.clone();
        let function = LoxFunction {
            arity: func_ctx.arity,
            upvalue_count: upvalues.len(),
            name: func_ctx.name.map(|n| self.heap.intern(&n)),
            chunk: func_ctx.chunk,
        };
        let function_ref = self.heap.alloc_function(function);
        let constant = self.make_constant(Value::Obj(Obj::Function(function_ref)));
        self.emit_op_byte(Op::Closure, constant);
        for upvalue in upvalues {
            self.emit_byte(if upvalue.is_local { 1 } else { 0 });
            self.emit_byte(upvalue.index);
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::Assert) {
            self.assert_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(Op::Print);
    }

    fn assert_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(Op::Assert);
    }

    fn return_statement(&mut self) {
        if self.funcs.last().unwrap().kind == FunctionKind::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(Op::Return);
        }
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(Op::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.statement();

        let else_jump = self.emit_jump(Op::Jump);
        self.patch_jump(then_jump);
        self.emit_op(Op::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk().code.len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(Op::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semicolon) {
            // no initializer
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk().code.len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(Op::JumpIfFalse));
            self.emit_op(Op::Pop);
        }

        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(Op::Jump);
            let increment_start = self.chunk().code.len();
            self.expression();
            self.emit_op(Op::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(Op::Pop);
        }
        self.end_scope();
    }
}

/// Compiles `source` into a top-level script function, or the list of
/// diagnostics collected along the way.
pub fn compile(source: &str, heap: &mut Heap) -> Result<FunctionRef, Vec<CompileError>> {
    let mut compiler = Compiler::new(source, heap);
    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.emit_return();

    if compiler.had_error {
        return Err(compiler.errors);
    }

    let func_ctx = compiler.funcs.pop().expect("script function context always present");
    let function = LoxFunction {
        arity: func_ctx.arity,
        upvalue_count: func_ctx.upvalues.len(),
        name: None,
        chunk: func_ctx.chunk,
    };
    Ok(compiler.heap.alloc_function(function))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lox_core::disasm::disassemble_chunk;
    use pretty_assertions::assert_eq;

    fn compile_ok(source: &str) -> FunctionRef {
        let mut heap = Heap::new();
        compile(source, &mut heap).unwrap_or_else(|errs| panic!("unexpected compile errors: {errs:?}"))
    }

    #[test]
    fn compiles_arithmetic_precedence() {
        let function = compile_ok("1 + 2 * 3;");
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_MULTIPLY"));
        assert!(text.contains("OP_ADD"));
    }

    #[test]
    fn global_variables_use_single_byte_name_index() {
        let function = compile_ok("var x = 1; x = 2; print x;");
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_DEFINE_GLOBAL"));
        assert!(text.contains("OP_SET_GLOBAL"));
        assert!(text.contains("OP_GET_GLOBAL"));
    }

    #[test]
    fn locals_resolve_to_slots_not_globals() {
        let function = compile_ok("{ var a = 1; a = a + 1; }");
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_GET_LOCAL"));
        assert!(text.contains("OP_SET_LOCAL"));
        assert!(!text.contains("OP_GET_GLOBAL"));
    }

    #[test]
    fn closures_capture_enclosing_locals_as_upvalues() {
        let function = compile_ok(indoc::indoc! {"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
        "});
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_CLOSURE"));

        let make_counter = function
            .chunk
            .constants
            .iter()
            .find_map(|v| match v {
                lox_core::Value::Obj(lox_core::Obj::Function(f)) => Some(f.clone()),
                _ => None,
            })
            .expect("makeCounter should be a constant in the script chunk");
        let inner_text = disassemble_chunk(&make_counter.chunk, "makeCounter");
        assert!(inner_text.contains("local"));
    }

    #[test]
    fn undefined_assignment_target_is_a_compile_error() {
        let mut heap = Heap::new();
        let result = compile("1 + 2 = 3;", &mut heap);
        let errs = result.expect_err("assigning to a non-variable must fail to compile");
        assert!(errs.iter().any(|e| e.message.contains("Invalid assignment target")));
    }

    #[test]
    fn reports_multiple_errors_after_synchronizing() {
        let mut heap = Heap::new();
        let result = compile("var ; var ;", &mut heap);
        let errs = result.expect_err("missing identifiers must fail to compile");
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn for_loop_desugars_to_while_with_increment() {
        let function = compile_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_LOOP"));
        assert!(text.contains("OP_JUMP_IF_FALSE"));
    }
}
