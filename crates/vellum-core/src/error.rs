use std::fmt;

use crate::value::Value;

/// A position in a source text: file id (host-assigned), 1-based line and column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLoc {
    pub file_id: u16,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn new(file_id: u16, line: u32, column: u32) -> Self {
        SourceLoc {
            file_id,
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lex/parse or runtime failure, always carrying a source location.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    #[error("syntax error at {loc}: {message}")]
    Syntax { message: String, loc: SourceLoc },

    #[error("runtime error at {loc}: {message}")]
    Runtime { message: String, loc: SourceLoc },
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, loc: SourceLoc) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            loc,
        }
    }

    pub fn runtime(message: impl Into<String>, loc: SourceLoc) -> Self {
        ScriptError::Runtime {
            message: message.into(),
            loc,
        }
    }

    pub fn loc(&self) -> SourceLoc {
        match self {
            ScriptError::Syntax { loc, .. } | ScriptError::Runtime { loc, .. } => *loc,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScriptError::Syntax { message, .. } | ScriptError::Runtime { message, .. } => message,
        }
    }
}

/// Non-local exit from evaluation.
///
/// `return` is carried on a channel distinct from errors so that nothing which
/// handles errors can accidentally swallow it; only function-call boundaries
/// (and the top of a script run) unwrap `Return`.
#[derive(Debug, Clone)]
pub enum EvalBreak {
    Return(Value),
    Error(ScriptError),
}

impl From<ScriptError> for EvalBreak {
    fn from(err: ScriptError) -> Self {
        EvalBreak::Error(err)
    }
}

pub type EvalResult<T = Value> = Result<T, EvalBreak>;
