//! Runtime diagnostics, with the call-stack trace the spec requires.

use std::fmt;

/// One frame of a runtime-error stack trace, top (innermost) first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: u32,
    /// `None` for the top-level script frame.
    pub name: Option<String>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "[line {}] in {name}", self.line),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A failure raised while executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), trace: Vec::new() }
    }

    /// Renders the message followed by the frame trace, one line each, the
    /// way the spec's runtime-error report is printed.
    pub fn report(&self) -> String {
        let mut out = self.message.clone();
        for frame in &self.trace {
            out.push('\n');
            out.push_str(&frame.to_string());
        }
        out
    }
}
