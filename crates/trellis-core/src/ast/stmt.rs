//! Statement AST nodes for trellis templates

use crate::lexer::Span;

use super::{Expr, Fence, Ident, Spanned};

/// A statement with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// The kind of statement
    pub kind: StmtKind,
    /// Source location
    pub span: Span,
}

impl Stmt {
    /// Create a new statement
    #[must_use]
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create an expression statement
    #[must_use]
    pub fn expr(expr: Expr) -> Self {
        let span = expr.span;
        Self::new(StmtKind::Expr(expr), span)
    }
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}

/// The kind of statement
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Variable declaration (let x = value)
    Let {
        /// Variable name
        name: Ident,
        /// Initial value
        value: Expr,
    },

    /// Assignment to an existing binding (x = value)
    Assign {
        /// Variable name
        name: Ident,
        /// New value
        value: Expr,
    },

    /// Return statement (return, return value)
    Return(Option<Expr>),

    /// Expression statement
    Expr(Expr),

    /// A literal text chunk inside a braced block, emitted verbatim
    /// (`{ %>text<% }`)
    Text(String),

    /// A nested fence inside a braced block (`{ %><%= v %><% }`)
    Fence(Fence),
}
