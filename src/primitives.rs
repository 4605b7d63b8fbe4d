use crate::{EvalError, EvalResult, Node, PrimitiveFunc, Sexpr, Span};

/// Every primitive bound in a fresh global environment.
pub const PRIMITIVES: &[(&str, PrimitiveFunc)] = &[
    ("+", prim_add),
    ("-", prim_sub),
    ("<", prim_less_than),
    (">", prim_greater_than),
    ("=", prim_equals),
    ("not", prim_not),
    ("and", prim_and),
    ("or", prim_or),
    ("exit", prim_exit),
];

fn expect_integer(node: &Node) -> EvalResult<i64> {
    match node.kind {
        Sexpr::Integer(n) => Ok(n),
        _ => Err(EvalError::TypeMismatch {
            expected: "integer",
            found: node.kind.clone(),
            span: node.span,
        }),
    }
}

/// Left fold over integer arguments. No arguments gives nil and a single
/// argument is returned as is.
fn fold_integers(
    args: Vec<Node>,
    span: Span,
    func: fn(i64, i64) -> Option<i64>,
    operator: &str,
) -> EvalResult {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        return Ok(Node::new_nil(span));
    };
    let mut acc = expect_integer(&first)?;
    for node in args {
        let num = expect_integer(&node)?;
        acc = func(acc, num).ok_or_else(|| EvalError::IntegerOverflow(operator.to_string(), span))?;
    }
    Ok(Node::new_integer(acc, span))
}

// Only the first and the last argument take part. Missing ones are nil.
fn first_and_last(args: &[Node], span: Span) -> (Node, Node) {
    let first = args.first().cloned().unwrap_or_else(|| Node::new_nil(span));
    let last = args.last().cloned().unwrap_or_else(|| Node::new_nil(span));
    (first, last)
}

fn compare_integers(args: Vec<Node>, span: Span, compare: fn(i64, i64) -> bool) -> EvalResult {
    let (first, last) = first_and_last(&args, span);
    let result = compare(expect_integer(&first)?, expect_integer(&last)?);
    Ok(Node::new_bool(result, span))
}

pub fn prim_add(args: Vec<Node>, span: Span) -> EvalResult {
    // (+ 1 2 3) -> 6
    fold_integers(args, span, i64::checked_add, "+")
}

pub fn prim_sub(args: Vec<Node>, span: Span) -> EvalResult {
    // (- 10 3 2) -> 5, (- 5) -> 5
    fold_integers(args, span, i64::checked_sub, "-")
}

pub fn prim_less_than(args: Vec<Node>, span: Span) -> EvalResult {
    compare_integers(args, span, |left, right| left < right)
}

pub fn prim_greater_than(args: Vec<Node>, span: Span) -> EvalResult {
    compare_integers(args, span, |left, right| left > right)
}

pub fn prim_equals(args: Vec<Node>, span: Span) -> EvalResult {
    let (first, last) = first_and_last(&args, span);
    Ok(Node::new_bool(first.kind.same_value(&last.kind), span))
}

pub fn prim_not(args: Vec<Node>, span: Span) -> EvalResult {
    let truthy = args.first().is_some_and(|node| node.kind.is_truthy());
    Ok(Node::new_bool(!truthy, span))
}

pub fn prim_and(args: Vec<Node>, span: Span) -> EvalResult {
    let (first, last) = first_and_last(&args, span);
    Ok(if first.kind.is_truthy() { last } else { first })
}

pub fn prim_or(args: Vec<Node>, span: Span) -> EvalResult {
    let (first, last) = first_and_last(&args, span);
    Ok(if first.kind.is_truthy() { first } else { last })
}

pub fn prim_exit(_args: Vec<Node>, _span: Span) -> EvalResult {
    Err(EvalError::Exit)
}
