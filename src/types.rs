use crate::environment::Environment;
use crate::{evaluator::EvalResult, source::Span};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The actual S-expression data
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Sexpr::Integer(n), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Symbol(name.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(elements), span)
    }

    pub fn new_bool(b: bool, span: Span) -> Self {
        Node::new(Sexpr::Boolean(b), span)
    }

    pub fn new_nil(span: Span) -> Self {
        Node::new(Sexpr::Nil, span)
    }

    pub fn new_primitive(func: PrimitiveFunc, name: &str, span: Span) -> Self {
        Node::new(
            Sexpr::Procedure(Procedure::Primitive(func, name.to_string())),
            span,
        )
    }

    pub fn new_closure(closure: Closure, span: Span) -> Self {
        Node::new(Sexpr::Procedure(Procedure::Closure(Rc::new(closure))), span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// A parsed expression or an evaluated value.
///
/// The parser only ever produces `Integer`, `Symbol` and `List`. The other
/// variants exist only as evaluation results.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Integer(i64),
    Symbol(String),
    List(Vec<Node>),
    Boolean(bool),
    /// The absent value: blank input, an `if` with no taken branch, `(+)`.
    Nil,
    Procedure(Procedure),
}

impl Sexpr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Sexpr::Integer(_) => "integer",
            Sexpr::Symbol(_) => "symbol",
            Sexpr::List(_) => "list",
            Sexpr::Boolean(_) => "boolean",
            Sexpr::Nil => "nil",
            Sexpr::Procedure(_) => "procedure",
        }
    }

    /// Only nil and false are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Sexpr::Nil | Sexpr::Boolean(false))
    }

    /// Structural equality that ignores source spans.
    pub fn same_value(&self, other: &Sexpr) -> bool {
        match (self, other) {
            (Sexpr::List(left), Sexpr::List(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(l, r)| l.kind.same_value(&r.kind))
            }
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Integer(n) => write!(f, "{}", n),
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::Boolean(b) => write!(f, "{}", b),
            Sexpr::Nil => write!(f, "nil"),
            Sexpr::List(list) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in list {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
            Sexpr::Procedure(procedure) => match procedure {
                Procedure::Primitive(_, name) => write!(f, "#<primitive:{}>", name),
                Procedure::Closure(closure) => {
                    write!(f, "#<lambda:({})>", closure.params.join(" "))
                }
            },
        }
    }
}

pub type PrimitiveFunc = fn(Vec<Node>, Span) -> EvalResult;

/// A user-defined function produced by `lambda`.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Vec<Node>,
    /// The environment the `lambda` was evaluated in.
    pub env: Rc<RefCell<Environment>>,
}

#[derive(Clone)]
pub enum Procedure {
    Primitive(PrimitiveFunc, String), // The function pointer and its name (for display/debug)
    Closure(Rc<Closure>),
}

// Closures hold their environment, which may hold the closure again.
// Debug must not walk into it.
impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(_, name) => write!(f, "Primitive({})", name),
            Procedure::Closure(closure) => write!(f, "Closure({:?})", closure.params),
        }
    }
}

// Primitives compare by name, closures by identity.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Primitive(_, n1), Procedure::Primitive(_, n2)) => n1 == n2,
            (Procedure::Closure(c1), Procedure::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}
