//! Lexer for trellis templates
//!
//! The lexer converts a mixed text/code document into a stream of tokens.
//! It alternates between two modes:
//! - **Text mode** collects literal template text until a fence opener
//!   (`<%=` or `<%`) appears.
//! - **Code mode** scans the embedded language (identifiers, literals,
//!   operators, keywords) until the fence closer `%>` flips it back.

#![allow(clippy::cast_possible_truncation)] // We intentionally use u32 for spans; templates > 4GB are unsupported

mod span;
mod token;

pub use span::{LineIndex, Location, Span};
pub use token::TokenKind;

use logos::Logos;
use thiserror::Error;

/// A token with its kind, span, and source text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source
    pub span: Span,
    /// The source text of the token (unescaped for strings, raw otherwise)
    pub lexeme: String,
}

impl Token {
    /// Create a new token
    #[must_use]
    pub fn new(kind: TokenKind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }
}

/// Lexer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar,
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// A lexer error with location information
#[derive(Debug, Clone)]
pub struct SpannedError {
    pub error: LexError,
    pub span: Span,
}

impl SpannedError {
    #[must_use]
    pub fn new(error: LexError, span: Span) -> Self {
        Self { error, span }
    }
}

impl std::fmt::Display for SpannedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.error, self.span)
    }
}

impl std::error::Error for SpannedError {}

/// Lexer state: outside or inside a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexerMode {
    /// Literal template text
    Text,
    /// Inside a fence, scanning the embedded language
    Code,
}

/// The trellis lexer
pub struct Lexer<'source> {
    source: &'source str,
    /// Current position in the source (byte offset)
    position: usize,
    /// Current lexer mode
    mode: LexerMode,
    /// Collected errors during lexing
    errors: Vec<SpannedError>,
    /// Whether the trailing Eof token has been produced
    done: bool,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given template source
    #[must_use]
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            position: 0,
            mode: LexerMode::Text,
            errors: Vec::new(),
            done: false,
        }
    }

    /// Tokenize the entire source, returning all tokens and any errors
    #[must_use]
    pub fn tokenize(source: &str) -> (Vec<Token>, Vec<SpannedError>) {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.collect_all();
        (tokens, lexer.errors)
    }

    /// Collect all tokens from the source, ending with a single Eof
    pub fn collect_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        match self.mode {
            LexerMode::Text => self.lex_text(),
            LexerMode::Code => self.lex_code(),
        }
    }

    fn eof_token(&mut self) -> Option<Token> {
        self.done = true;
        Some(Token::new(
            TokenKind::Eof,
            Span::new(self.position as u32, self.position as u32),
            "",
        ))
    }

    /// Lex in text mode: everything up to the next fence opener is one
    /// Text token
    fn lex_text(&mut self) -> Option<Token> {
        if self.position >= self.source.len() {
            return self.eof_token();
        }

        let remaining = &self.source[self.position..];

        if let Some(idx) = remaining.find("<%") {
            if idx > 0 {
                // Text before the opener
                let start = self.position;
                self.position += idx;
                return Some(Token::new(
                    TokenKind::Text,
                    Span::new(start as u32, self.position as u32),
                    &remaining[..idx],
                ));
            }
            // At the opener; `<%=` must be checked before `<%`
            let start = self.position;
            let (kind, len) = if remaining.starts_with("<%=") {
                (TokenKind::OpenEmit, 3)
            } else {
                (TokenKind::OpenSilent, 2)
            };
            self.position += len;
            self.mode = LexerMode::Code;
            Some(Token::new(
                kind,
                Span::new(start as u32, self.position as u32),
                &remaining[..len],
            ))
        } else {
            // No more fences: the rest is text
            let start = self.position;
            self.position = self.source.len();
            Some(Token::new(
                TokenKind::Text,
                Span::new(start as u32, self.position as u32),
                remaining,
            ))
        }
    }

    /// Lex one code-mode token using logos
    fn lex_code(&mut self) -> Option<Token> {
        if self.position >= self.source.len() {
            return self.eof_token();
        }

        let remaining = &self.source[self.position..];
        let mut logos_lexer = TokenKind::lexer(remaining);

        match logos_lexer.next() {
            Some(Ok(kind)) => {
                let span_range = logos_lexer.span();
                let lexeme = logos_lexer.slice();
                // span_range is relative to the remaining slice, accounting
                // for skipped whitespace
                let start = self.position + span_range.start;
                let end = self.position + span_range.end;
                self.position = end;

                if kind == TokenKind::Close {
                    self.mode = LexerMode::Text;
                }

                let lexeme = if kind == TokenKind::Str {
                    unescape_string(lexeme)
                } else {
                    lexeme.to_string()
                };

                Some(Token::new(kind, Span::new(start as u32, end as u32), lexeme))
            }
            Some(Err(())) => {
                // Error recovery: skip the invalid input and keep going
                let span_range = logos_lexer.span();
                let start = self.position + span_range.start;
                let mut end = self.position + span_range.end;
                if end == start {
                    // Always make progress, even on an empty error span
                    let width = self.source[start..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
                    end = start + width;
                }
                self.position = end;

                let slice = &self.source[start..end];
                let error = if slice.starts_with('"') {
                    LexError::UnterminatedString
                } else {
                    LexError::UnexpectedChar
                };
                self.errors.push(SpannedError::new(
                    error,
                    Span::new(start as u32, end as u32),
                ));

                Some(Token::new(
                    TokenKind::Error,
                    Span::new(start as u32, end as u32),
                    slice,
                ))
            }
            None => self.eof_token(),
        }
    }

    /// Get all errors collected during lexing
    #[must_use]
    pub fn errors(&self) -> &[SpannedError] {
        &self.errors
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Strip the quotes from a string lexeme and decode `\"`.
///
/// Only the `\"` escape is part of the language; any other backslash
/// sequence passes through byte-for-byte.
fn unescape_string(lexeme: &str) -> String {
    let inner = &lexeme[1..lexeme.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'"') {
            out.push('"');
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
