//! Token types for the trellis lexer

use logos::Logos;

/// The kind of token produced by the lexer
///
/// Code-mode tokens are matched by logos; `Text`, `OpenEmit`, and
/// `OpenSilent` are produced by the lexer's text mode and never matched
/// here.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("return")]
    Return,
    #[token("fn")]
    Fn,

    // ========== Literals ==========
    /// Integer literal
    #[regex(r"[0-9]+")]
    Int,

    /// Float literal (a `.` followed by digits)
    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    /// Double-quoted string literal; only `\"` is an escape
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // ========== Identifiers ==========
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ========== Operators ==========
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // ========== Fence markers ==========
    /// End of a fence: `%>` (flips the lexer back to text mode)
    #[token("%>")]
    Close,

    /// Start of an emitting fence: `<%=` (produced by the lexer's text mode)
    OpenEmit,

    /// Start of a silent fence: `<%` (produced by the lexer's text mode)
    OpenSilent,

    /// A run of literal template text (produced by the lexer's text mode)
    Text,

    // ========== Special ==========
    /// End of file (added by the lexer, not matched by logos)
    Eof,

    /// Lexer error - invalid character
    Error,
}

impl TokenKind {
    /// Returns true if this token is a keyword
    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        matches!(
            self,
            Self::Let
                | Self::If
                | Self::Else
                | Self::For
                | Self::In
                | Self::Return
                | Self::Fn
                | Self::True
                | Self::False
                | Self::Nil
        )
    }

    /// Returns true if this token opens a fence
    #[must_use]
    pub const fn is_opener(&self) -> bool {
        matches!(self, Self::OpenEmit | Self::OpenSilent)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Let => write!(f, "let"),
            Self::If => write!(f, "if"),
            Self::Else => write!(f, "else"),
            Self::For => write!(f, "for"),
            Self::In => write!(f, "in"),
            Self::Return => write!(f, "return"),
            Self::Fn => write!(f, "fn"),
            Self::Int => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "string"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Nil => write!(f, "nil"),
            Self::Ident => write!(f, "identifier"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Eq => write!(f, "="),
            Self::EqEq => write!(f, "=="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Gt => write!(f, ">"),
            Self::LtEq => write!(f, "<="),
            Self::GtEq => write!(f, ">="),
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
            Self::Not => write!(f, "!"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBrace => write!(f, "{{"),
            Self::RBrace => write!(f, "}}"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
            Self::Colon => write!(f, ":"),
            Self::Semicolon => write!(f, ";"),
            Self::Dot => write!(f, "."),
            Self::Close => write!(f, "%>"),
            Self::OpenEmit => write!(f, "<%="),
            Self::OpenSilent => write!(f, "<%"),
            Self::Text => write!(f, "text"),
            Self::Eof => write!(f, "end of file"),
            Self::Error => write!(f, "error"),
        }
    }
}
