pub mod atom;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod prelude;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, evaluate};
pub use interpreter::{Error, Interpreter};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, read};
pub use source::Span;
pub use types::{Node, PrimitiveFunc, Sexpr};
