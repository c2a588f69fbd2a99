//! Shared error and span types for the Knight toolchain.

pub mod span;

use thiserror::Error;

use span::Span;

/// Any error the interpreter can surface to the user, plus the internal
/// variant for broken invariants that should never be reachable from
/// well-formed input.
#[derive(Debug, Error)]
pub enum Error {
    #[error("lex error: {message}")]
    Lex { span: Span, message: String },

    #[error("parse error: {message}")]
    Parse { span: Option<Span>, message: String },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("shell error: {message}")]
    Shell { message: String },

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn lex(span: Span, message: impl Into<String>) -> Self {
        Self::Lex {
            span,
            message: message.into(),
        }
    }

    pub fn parse(span: Span, message: impl Into<String>) -> Self {
        Self::Parse {
            span: Some(span),
            message: message.into(),
        }
    }

    /// A parse error with no position, e.g. truncated input.
    pub fn parse_eof(message: impl Into<String>) -> Self {
        Self::Parse {
            span: None,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::UndefinedVariable { name: name.into() }
    }

    pub fn shell(message: impl Into<String>) -> Self {
        Self::Shell {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The source range this error points at, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lex { span, .. } => Some(*span),
            Self::Parse { span, .. } => *span,
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
