use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Skip whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    // Anything that is not a paren or whitespace. Numbers vs symbols are
    // decided later by the atom classifier.
    #[regex(r"[^()\s]+", |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Atom(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

/// Splits raw text into parens and atom tokens, each tagged with its byte span.
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: range.into(),
            }),
            Err(error) => Err(LexerError {
                error,
                span: range.into(),
            }),
        })
        .collect()
}
