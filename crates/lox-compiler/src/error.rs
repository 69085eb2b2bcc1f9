//! Compile-time diagnostics.

/// One reported compile error, with enough context to point a user at the
/// offending source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.render())]
pub struct CompileError {
    pub line: u32,
    pub lexeme: String,
    pub message: String,
}

impl CompileError {
    fn render(&self) -> String {
        if self.lexeme.is_empty() {
            format!("[line {}] Error: {}", self.line, self.message)
        } else {
            format!("[line {}] Error at '{}': {}", self.line, self.lexeme, self.message)
        }
    }
}
