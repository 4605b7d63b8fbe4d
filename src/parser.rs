use crate::Span;
use crate::atom;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::Node;
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token '{}' at {}, expected {expected}", .found.kind, .found.span)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error("Lexer error: {0}")]
    LexerError(#[from] LexerError),
    #[error("Integer literal '{0}' is out of range")]
    InvalidInteger(String, Span),
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// True once every token has been consumed.
    pub fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// Parses one expression off the front of the token stream.
    /// Returns `None` if there are no tokens left.
    pub fn parse_expr(&mut self) -> ParseResult<Option<Node>> {
        match self.next_token() {
            Some(token) => self.parse_expr_with_token(token).map(Some),
            None => Ok(None),
        }
    }

    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Node> {
        match token.kind {
            TokenKind::LParen => self.parse_list(token.span),
            TokenKind::RParen => Err(ParseError::UnexpectedToken {
                found: token,
                expected: "an atom or '('".to_string(),
            }),
            TokenKind::Atom(text) => atom::classify(&text, token.span),
        }
    }

    /// Parses the elements of a list whose `(` has already been consumed.
    fn parse_list(&mut self, lparen_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                }) => return Ok(Node::new_list(elements, lparen_span.merge(rparen_span))),
                Some(token) => elements.push(self.parse_expr_with_token(token)?),
                // Reached EOF before finding ')'
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }
}

/// Reads one expression from a chunk of text.
///
/// Blank input reads as `None`. Anything after the first complete
/// expression is discarded.
pub fn read(input: &str) -> ParseResult<Option<Node>> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse_expr()
}
