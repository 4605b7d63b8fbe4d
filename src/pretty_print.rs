use crate::{EnvError, Error, EvalError, ParseError, Span};
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

const SOURCE_ID: &str = "REPL";

type ReplSpan = (&'static str, Range<usize>);

fn error_report(message: String, span: Span, label: String) -> Report<'static, ReplSpan> {
    Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, span.to_range())).with_message(label))
        .finish()
}

impl EvalError {
    fn report(&self) -> Option<Report<'static, ReplSpan>> {
        let report = match self {
            EvalError::EnvError(EnvError::UnboundSymbol(symbol, span)) => error_report(
                format!("Unbound symbol `{}`", symbol),
                *span,
                "This symbol is not defined in the current scope".to_string(),
            ),
            EvalError::NotCallable(sexpr, span) => error_report(
                format!("Not callable: {}", sexpr),
                *span,
                format!("This evaluates to a {}, not a procedure", sexpr.type_name()),
            ),
            EvalError::ArityMismatch {
                expected,
                found,
                span,
            } => error_report(
                "Arity mismatch".to_string(),
                *span,
                format!("Expected {} arguments, got {}", expected, found),
            ),
            EvalError::TypeMismatch {
                expected,
                found,
                span,
            } => error_report(
                format!("Type mismatch: {}", found),
                *span,
                format!("Expected {}, found {}", expected, found.type_name()),
            ),
            EvalError::NotASymbol(sexpr, span) => error_report(
                format!("Not a symbol: {}", sexpr),
                *span,
                format!("Expected a symbol but found a {}", sexpr.type_name()),
            ),
            EvalError::InvalidSpecialForm(message, span) => error_report(
                format!("Invalid special form: {}", message),
                *span,
                "This special form is malformed or incomplete".to_string(),
            ),
            EvalError::IntegerOverflow(operator, span) => error_report(
                format!("Integer overflow in `{}`", operator),
                *span,
                "The result does not fit in a 64-bit integer".to_string(),
            ),
            EvalError::Exit => return None,
        };
        Some(report)
    }

    /// Writes a labelled report of this error against `input` to stderr.
    pub fn pretty_print(&self, input: &str) -> io::Result<()> {
        match self.report() {
            Some(report) => report.eprint((SOURCE_ID, Source::from(input))),
            None => Ok(()),
        }
    }
}

impl ParseError {
    fn report(&self, input: &str) -> Report<'static, ReplSpan> {
        match self {
            ParseError::UnexpectedToken { found, expected } => error_report(
                format!("Unexpected token: {}", found.kind),
                found.span,
                format!("Expected {}", expected),
            ),
            ParseError::UnexpectedEof(expected) => error_report(
                "Unexpected end of input".to_string(),
                Span::new(input.len(), input.len()),
                format!("Expected {}", expected),
            ),
            ParseError::LexerError(lex_err) => error_report(
                "Lexer error".to_string(),
                lex_err.span,
                lex_err.error.to_string(),
            ),
            ParseError::InvalidInteger(text, span) => error_report(
                format!("Invalid integer literal `{}`", text),
                *span,
                "Does not fit in a 64-bit integer".to_string(),
            ),
        }
    }

    /// Writes a labelled report of this error against `input` to stderr.
    pub fn pretty_print(&self, input: &str) -> io::Result<()> {
        self.report(input)
            .eprint((SOURCE_ID, Source::from(input)))
    }
}

impl Error {
    /// Reports against `input`, or against the failing form for load errors.
    pub fn pretty_print(&self, input: &str) -> io::Result<()> {
        match self {
            Error::Parse(err) => err.pretty_print(input),
            Error::Eval(err) => err.pretty_print(input),
            Error::Load { chunk, source } => source.pretty_print(chunk),
        }
    }
}
