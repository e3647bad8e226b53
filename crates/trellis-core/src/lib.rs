//! Trellis - a server-side templating engine
//!
//! Templates mix literal text (usually HTML) with a small embedded
//! language. `<%= … %>` fences evaluate an expression and write its
//! HTML-escaped rendering into the output; `<% … %>` fences run
//! statements for their effects only.
//!
//! ```
//! use trellis_core::{render, Context};
//!
//! let mut ctx = Context::new();
//! ctx.set("names", vec!["John", "Paul"]);
//!
//! let html = render(
//!     "<ul><%= for (n) in names { %><li><%= n %></li><% } %></ul>",
//!     &ctx,
//! )
//! .unwrap();
//! assert_eq!(html, "<ul><li>John</li><li>Paul</li></ul>");
//! ```
//!
//! The pipeline: the [`lexer`] alternates between text and code modes
//! to tokenize the document, the [`parser`] builds a [`Program`](ast::Program)
//! with a Pratt expression parser, and the [`eval`] module walks the
//! tree against a scoped binding environment.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lexer module - tokenization of mixed text/code template source
pub mod lexer;

/// Abstract Syntax Tree - parsed representation of a template
pub mod ast;

/// Parser module - converts tokens into an AST
pub mod parser;

/// Runtime values and the host bridge
pub mod runtime;

/// Evaluator module - renders a parsed template
pub mod eval;

mod context;

pub use context::Context;
pub use eval::{Evaluator, HelperContext, RuntimeError, RuntimeErrorKind};
pub use lexer::Lexer;
pub use parser::{ParseError, Parser};
pub use runtime::{HostValue, Value};

use thiserror::Error;

/// Any failure while rendering a template
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// The template could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The template failed while evaluating
    #[error("render error: {0}")]
    Eval(#[from] RuntimeError),
}

impl RenderError {
    /// The output accumulated before the failure
    ///
    /// Parse errors happen before any output exists, so their partial
    /// output is always empty.
    #[must_use]
    pub fn partial_output(&self) -> &str {
        match self {
            RenderError::Parse(_) => "",
            RenderError::Eval(e) => &e.partial,
        }
    }
}

/// Render a template against a context
///
/// Any error aborts the render. The output accumulated before the
/// failure travels with the error and can be read back through
/// [`RenderError::partial_output`].
///
/// # Errors
/// Returns [`RenderError::Parse`] for syntax errors (the first error is
/// authoritative when several are collected) and [`RenderError::Eval`]
/// for runtime failures.
pub fn render(source: &str, context: &Context) -> Result<String, RenderError> {
    let program = Parser::parse(source).map_err(|mut errors| errors.remove(0))?;
    let mut evaluator = Evaluator::new(context);
    Ok(evaluator.render(&program)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn render_round_trip() {
        assert_eq!(render("<p>Hi</p>", &Context::new()).unwrap(), "<p>Hi</p>");
    }

    #[test]
    fn parse_errors_surface() {
        let err = render("<%= let %>", &Context::new()).unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
    }

    #[test]
    fn eval_errors_surface() {
        let err = render("<%= boom() %>", &Context::new()).unwrap_err();
        assert!(matches!(err, RenderError::Eval(_)));
    }

    #[test]
    fn partial_output_rides_on_the_error() {
        let err = render("<p>so far</p><%= boom() %>", &Context::new()).unwrap_err();
        assert_eq!(err.partial_output(), "<p>so far</p>");

        let err = render("<%= let %>", &Context::new()).unwrap_err();
        assert_eq!(err.partial_output(), "");
    }
}
