/// Tokenizer for the dialect, built on sqlparser's tokenizer
///
/// sqlparser handles quoting, escapes and location tracking; this module
/// narrows its token set down to what the dialect grammar accepts and drops
/// whitespace and comments.

use crate::{Error, Result};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token as SqlToken, Tokenizer};
use std::fmt;

/// 1-based source position of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }

    pub fn syntax_error(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword or identifier; `quoted` identifiers are never keywords
    Word { value: String, quoted: bool },
    /// Single-quoted string literal (escapes already resolved)
    String(String),
    Number(String),
    Placeholder,
    Eq,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Star,
    Minus,
    SemiColon,
    /// Any token the grammar never accepts, kept for error reporting
    Other(String),
}

impl TokenKind {
    /// True for an unquoted word matching `keyword`, ignoring case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, TokenKind::Word { value, quoted: false } if value.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word { value, quoted: true } => write!(f, "\"{}\"", value),
            TokenKind::Word { value, quoted: false } => f.write_str(value),
            TokenKind::String(s) => write!(f, "'{}'", s),
            TokenKind::Number(n) => f.write_str(n),
            TokenKind::Placeholder => f.write_str("?"),
            TokenKind::Eq => f.write_str("="),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::SemiColon => f.write_str(";"),
            TokenKind::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// Tokenizes dialect text. Whitespace and comments are dropped.
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let dialect = GenericDialect {};
    let raw = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| {
            Position::new(e.location.line, e.location.column).syntax_error(e.message)
        })?;

    let mut tokens = Vec::with_capacity(raw.len());
    for t in raw {
        let position = Position::new(t.location.line, t.location.column);
        let kind = match t.token {
            SqlToken::Whitespace(_) | SqlToken::EOF => continue,
            SqlToken::Word(w) => TokenKind::Word {
                value: w.value,
                quoted: w.quote_style.is_some(),
            },
            SqlToken::SingleQuotedString(s) => TokenKind::String(s),
            SqlToken::Number(n, _) => TokenKind::Number(n),
            SqlToken::Placeholder(p) if p == "?" => TokenKind::Placeholder,
            SqlToken::Placeholder(p) => {
                return Err(position.syntax_error(format!(
                    "unsupported placeholder '{}', only positional '?' is allowed",
                    p
                )))
            }
            SqlToken::Eq => TokenKind::Eq,
            SqlToken::LBrace => TokenKind::LBrace,
            SqlToken::RBrace => TokenKind::RBrace,
            SqlToken::LBracket => TokenKind::LBracket,
            SqlToken::RBracket => TokenKind::RBracket,
            SqlToken::Colon => TokenKind::Colon,
            SqlToken::Comma => TokenKind::Comma,
            SqlToken::Mul => TokenKind::Star,
            SqlToken::Minus => TokenKind::Minus,
            SqlToken::SemiColon => TokenKind::SemiColon,
            other => TokenKind::Other(other.to_string()),
        };
        tokens.push(Token { kind, position });
    }
    Ok(tokens)
}

/// Position just past the last character of `sql`
pub fn end_position(sql: &str) -> Position {
    let line = 1 + sql.matches('\n').count() as u64;
    let last_line = sql.rsplit('\n').next().unwrap_or("");
    Position::new(line, last_line.chars().count() as u64 + 1)
}
