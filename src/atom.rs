use crate::parser::{ParseError, ParseResult};
use crate::source::Span;
use crate::types::Node;

/// Turns the text of a single atom token into an integer or a symbol.
///
/// A token is an integer only when the whole token is an optional sign
/// followed by decimal digits. Everything else, including `12x`, is a symbol.
pub fn classify(text: &str, span: Span) -> ParseResult<Node> {
    if !is_integer_literal(text) {
        return Ok(Node::new_symbol(text, span));
    }
    text.parse::<i64>()
        .map(|n| Node::new_integer(n, span))
        .map_err(|_| ParseError::InvalidInteger(text.to_string(), span))
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
