//! Runtime errors for the trellis evaluator

use crate::lexer::Span;
use thiserror::Error;

/// A runtime error that occurred during template evaluation
#[derive(Debug, Clone)]
pub struct RuntimeError {
    /// The kind of error
    pub kind: RuntimeErrorKind,
    /// Source location where the error occurred
    pub span: Span,
    /// Output accumulated before the failure; attached by the
    /// top-level render loop, empty for errors surfaced elsewhere
    pub partial: String,
}

impl RuntimeError {
    /// Create a new runtime error
    #[must_use]
    pub fn new(kind: RuntimeErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            partial: String::new(),
        }
    }

    /// Attach the output accumulated before this error
    #[must_use]
    pub fn with_partial(mut self, partial: String) -> Self {
        self.partial = partial;
        self
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

impl std::error::Error for RuntimeError {}

/// The kind of runtime error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// Type mismatch in an operation
    #[error("type error: {operation} expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
        operation: &'static str,
    },

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Call of a name with no binding
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Indexing an array with a non-integer
    #[error("cannot index {target} with type {got}")]
    InvalidIndexType {
        target: &'static str,
        got: &'static str,
    },

    /// Wrong number of arguments to a function
    #[error("'{name}' expected {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// `for` over a value that cannot be iterated
    #[error("{0} is not iterable")]
    NotIterable(&'static str),

    /// Call of a value that is not a function
    #[error("{0} is not callable")]
    NotCallable(&'static str),

    /// A host function or helper returned an error
    #[error("'{name}' failed: {message}")]
    HelperFailed { name: String, message: String },

    /// A helper asked for its block but the call had none attached
    #[error("'{0}' was called without a block")]
    MissingBlock(String),
}

/// Result type for evaluator operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
