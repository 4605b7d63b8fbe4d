use crate::environment::{EnvError, Environment};
use crate::source::Span;
use crate::types::{Closure, Node, Procedure, Sexpr};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError),
    #[error("Expected a procedure, but got: {0}")]
    NotCallable(Sexpr, Span),
    #[error("Expected {expected} arguments, got {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("Expected {expected}, found {}", .found.type_name())]
    TypeMismatch {
        expected: &'static str,
        found: Sexpr,
        span: Span,
    },
    #[error("Expected a symbol, but got: {0}")]
    NotASymbol(Sexpr, Span),
    #[error("Invalid special form - {0}")]
    InvalidSpecialForm(String, Span),
    #[error("Integer overflow in '{0}'")]
    IntegerOverflow(String, Span),
    /// Raised by the `exit` primitive. Not a failure: the driver decides
    /// how to terminate.
    #[error("Exit requested")]
    Exit,
}

// Result type alias for convenience
pub type EvalResult<T = Node> = Result<T, EvalError>;

/// The syntactic forms whose operands are not evaluated up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    If,
    Def,
    Let,
    Lambda,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 4] = [
        SpecialForm::If,
        SpecialForm::Def,
        SpecialForm::Let,
        SpecialForm::Lambda,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::If => "if",
            SpecialForm::Def => "def",
            SpecialForm::Let => "let",
            SpecialForm::Lambda => "lambda",
        }
    }

    pub fn from_symbol(name: &str) -> Option<SpecialForm> {
        SpecialForm::ALL.into_iter().find(|form| form.name() == name)
    }

    fn of_head(head: &Node) -> Option<SpecialForm> {
        match &head.kind {
            Sexpr::Symbol(name) => SpecialForm::from_symbol(name),
            _ => None,
        }
    }
}

pub fn special_form_identifiers() -> HashSet<String> {
    SpecialForm::ALL
        .into_iter()
        .map(|form| form.name().to_string())
        .collect()
}

// --- Evaluate Function ---

/// Evaluates a freshly read expression. Blank input (`None`) evaluates to nil.
pub fn evaluate_input(node: Option<&Node>, env: &Rc<RefCell<Environment>>) -> EvalResult {
    match node {
        Some(node) => evaluate(node, env),
        None => Ok(Node::new_nil(Span::default())),
    }
}

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
    match &node.kind {
        Sexpr::Integer(_) | Sexpr::Boolean(_) | Sexpr::Nil | Sexpr::Procedure(_) => {
            Ok(node.clone())
        }

        Sexpr::Symbol(name) => Ok(env.borrow().get(name, node.span)?),

        Sexpr::List(elements) => match elements.split_first() {
            // `()` is just the empty list
            None => Ok(node.clone()),
            Some((head, rest)) => match SpecialForm::of_head(head) {
                Some(form) => evaluate_special_form(form, rest, env, node.span),
                None => evaluate_application(head, rest, env, node.span),
            },
        },
    }
}

fn evaluate_special_form(
    form: SpecialForm,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    match form {
        SpecialForm::If => evaluate_if(operands, env, span),
        SpecialForm::Def => evaluate_def(operands, env, span),
        SpecialForm::Let => evaluate_let(operands, env, span),
        SpecialForm::Lambda => evaluate_lambda(operands, env, span),
    }
}

fn evaluate_if(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    if let [predicate, consequent, maybe_alternate @ ..] = operands
        && maybe_alternate.len() <= 1
    {
        if evaluate(predicate, env)?.kind.is_truthy() {
            evaluate(consequent, env)
        } else if let [alternate] = maybe_alternate {
            evaluate(alternate, env)
        } else {
            Ok(Node::new_nil(span))
        }
    } else {
        Err(EvalError::InvalidSpecialForm(
            "if expects a predicate, a consequent and an optional alternate".to_string(),
            span,
        ))
    }
}

/// `(def name value)` always binds in the global environment.
fn evaluate_def(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [name, value] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "def expects a name and a value".to_string(),
            span,
        ));
    };
    let name = expect_symbol(name)?;
    let value = evaluate(value, env)?;
    Environment::define_global(env, name.to_string(), value.clone());
    Ok(value)
}

/// `(let ((name value) ...) body ...)`. Every value is evaluated in the
/// outer environment before any name is bound.
fn evaluate_let(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [bindings, body @ ..] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "let expects a binding list and a body".to_string(),
            span,
        ));
    };
    let Sexpr::List(pairs) = &bindings.kind else {
        return Err(EvalError::InvalidSpecialForm(
            "let bindings must be a list".to_string(),
            bindings.span,
        ));
    };

    let mut evaluated = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (name, value) = binding_pair(pair)?;
        evaluated.push((name.to_string(), evaluate(value, env)?));
    }

    let let_env = Environment::extend(env, evaluated);
    evaluate_body(body, &let_env, span)
}

fn binding_pair(pair: &Node) -> EvalResult<(&str, &Node)> {
    match &pair.kind {
        Sexpr::List(items) if items.len() == 2 => Ok((expect_symbol(&items[0])?, &items[1])),
        _ => Err(EvalError::InvalidSpecialForm(
            format!("let binding must look like (name value), got {}", pair),
            pair.span,
        )),
    }
}

fn evaluate_lambda(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [params, body @ ..] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "lambda expects a parameter list and a body".to_string(),
            span,
        ));
    };
    let Sexpr::List(params) = &params.kind else {
        return Err(EvalError::InvalidSpecialForm(
            "lambda parameters must be a list".to_string(),
            params.span,
        ));
    };
    let params = params
        .iter()
        .map(|param| expect_symbol(param).map(str::to_string))
        .collect::<EvalResult<Vec<_>>>()?;

    Ok(Node::new_closure(
        Closure {
            params,
            body: body.to_vec(),
            env: Rc::clone(env),
        },
        span,
    ))
}

fn evaluate_application(
    operator: &Node,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let procedure = match evaluate(operator, env)?.kind {
        Sexpr::Procedure(procedure) => procedure,
        other => return Err(EvalError::NotCallable(other, operator.span)),
    };

    // Arguments are evaluated left to right in the caller's environment
    let args = operands
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect::<EvalResult<Vec<_>>>()?;

    apply(&procedure, args, span)
}

/// Calls `procedure` with already evaluated arguments.
pub fn apply(procedure: &Procedure, args: Vec<Node>, span: Span) -> EvalResult {
    match procedure {
        Procedure::Primitive(func, _) => func(args, span),
        Procedure::Closure(closure) => {
            if args.len() != closure.params.len() {
                return Err(EvalError::ArityMismatch {
                    expected: closure.params.len(),
                    found: args.len(),
                    span,
                });
            }
            let call_env = Environment::extend(
                &closure.env,
                closure.params.iter().cloned().zip(args),
            );
            evaluate_body(&closure.body, &call_env, span)
        }
    }
}

/// Evaluates each expression in order and returns the last value,
/// or nil for an empty body.
fn evaluate_body(body: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let mut result = Node::new_nil(span);
    for expr in body {
        result = evaluate(expr, env)?;
    }
    Ok(result)
}

fn expect_symbol(node: &Node) -> EvalResult<&str> {
    match &node.kind {
        Sexpr::Symbol(name) => Ok(name.as_str()),
        other => Err(EvalError::NotASymbol(other.clone(), node.span)),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read;

    fn eval_in(input: &str, env: &Rc<RefCell<Environment>>) -> EvalResult {
        match read(input) {
            Ok(node) => evaluate_input(node.as_ref(), env),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper to evaluate input string and check result kind (ignores span)
    fn assert_eval_kind(input: &str, expected_kind: Sexpr, env: Option<Rc<RefCell<Environment>>>) {
        let env = env.unwrap_or_else(Environment::new_global_populated);
        match eval_in(input, &env) {
            Ok(result_node) => assert!(
                result_node.kind.same_value(&expected_kind),
                "Input: '{}', expected {}, got {}",
                input,
                expected_kind,
                result_node
            ),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors
    fn assert_eval_error(
        input: &str,
        expected_error_variant: &EvalError,
        env: Option<Rc<RefCell<Environment>>>,
    ) {
        let env = env.unwrap_or_else(Environment::new_global_populated);
        match eval_in(input, &env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn run_all(inputs: &[&str], env: &Rc<RefCell<Environment>>) {
        for input in inputs {
            if let Err(e) = eval_in(input, env) {
                panic!("Evaluation failed for input '{}': {}", input, e);
            }
        }
    }

    fn unbound() -> EvalError {
        EvalError::EnvError(EnvError::UnboundSymbol("".into(), Span::default()))
    }

    fn invalid_form() -> EvalError {
        EvalError::InvalidSpecialForm("".into(), Span::default())
    }

    #[test]
    fn test_eval_self_evaluating() {
        assert_eval_kind("123", Sexpr::Integer(123), None);
        assert_eval_kind("-4", Sexpr::Integer(-4), None);
        assert_eval_kind("()", Sexpr::List(vec![]), None);
    }

    #[test]
    fn test_eval_empty_input_is_nil() {
        assert_eval_kind("", Sexpr::Nil, None);
        assert_eval_kind("   \t ", Sexpr::Nil, None);
    }

    #[test]
    fn test_eval_symbol_lookup() {
        let env = Environment::new();
        env.borrow_mut()
            .define("x".to_string(), Node::new_integer(100, Span::default()));
        assert_eval_kind("x", Sexpr::Integer(100), Some(env.clone()));
        assert_eval_error("y", &unbound(), Some(env));
    }

    #[test]
    fn test_symbols_are_case_sensitive() {
        let env = Environment::new_global_populated();
        run_all(&["(def abc 1)"], &env);
        assert_eval_error("ABC", &unbound(), Some(env));
    }

    #[test]
    fn test_eval_addition_and_subtraction() {
        for (n, m) in [(0, 0), (1, 2), (-5, 3), (100, -250), (i64::MAX, 0)] {
            assert_eval_kind(&format!("(+ {} {})", n, m), Sexpr::Integer(n + m), None);
            assert_eval_kind(&format!("(- {} {})", n, m), Sexpr::Integer(n - m), None);
        }
        assert_eval_kind("(+ 1 2 3 4)", Sexpr::Integer(10), None);
        assert_eval_kind("(- 10 3 2)", Sexpr::Integer(5), None);
        assert_eval_kind("(+ 1 (- 10 4))", Sexpr::Integer(7), None);
    }

    #[test]
    fn test_eval_if() {
        assert_eval_kind("(if 1 2 3)", Sexpr::Integer(2), None);
        assert_eval_kind("(if 0 2 3)", Sexpr::Integer(2), None); // 0 is truthy
        assert_eval_kind("(if () 2 3)", Sexpr::Integer(2), None); // () is truthy
        assert_eval_kind("(if (< 2 1) 2 3)", Sexpr::Integer(3), None);
        assert_eval_kind("(if (< 2 1) 2)", Sexpr::Nil, None);
        assert_eval_kind("(if (> 2 1) 2)", Sexpr::Integer(2), None);
    }

    #[test]
    fn test_eval_if_does_not_evaluate_unused_branch() {
        let env = Environment::new_global_populated();
        assert_eval_kind("(if 1 (def taken 1) (def skipped 2))", Sexpr::Integer(1), Some(env.clone()));
        assert_eval_kind("taken", Sexpr::Integer(1), Some(env.clone()));
        assert_eval_error("skipped", &unbound(), Some(env.clone()));

        assert_eval_kind("(if (not 1) (def left 1) (def right 2))", Sexpr::Integer(2), Some(env.clone()));
        assert_eval_error("left", &unbound(), Some(env.clone()));

        // An unbound symbol in the untaken branch is never looked up
        assert_eval_kind("(if 1 5 unbound-variable)", Sexpr::Integer(5), Some(env));
    }

    #[test]
    fn test_eval_if_errors() {
        assert_eval_error("(if)", &invalid_form(), None);
        assert_eval_error("(if 1)", &invalid_form(), None);
        assert_eval_error("(if 1 2 3 4)", &invalid_form(), None);
        assert_eval_error("(if nope 1 2)", &unbound(), None);
    }

    #[test]
    fn test_eval_def_returns_value_and_binds_globally() {
        let env = Environment::new_global_populated();
        assert_eval_kind("(def x (+ 1 2))", Sexpr::Integer(3), Some(env.clone()));
        assert_eval_kind("x", Sexpr::Integer(3), Some(env.clone()));
        assert_eval_kind("(def x 4)", Sexpr::Integer(4), Some(env.clone()));
        assert_eval_kind("x", Sexpr::Integer(4), Some(env));
    }

    #[test]
    fn test_eval_def_inside_let_is_global() {
        let env = Environment::new_global_populated();
        assert_eval_kind("(let ((a 1)) (def inner (+ a 41)))", Sexpr::Integer(42), Some(env.clone()));
        assert_eval_kind("inner", Sexpr::Integer(42), Some(env.clone()));
        assert_eval_error("a", &unbound(), Some(env));
    }

    #[test]
    fn test_eval_def_inside_closure_call_is_global() {
        let env = Environment::new_global_populated();
        run_all(&["(def setter (lambda (v) (def stored v)))", "(setter 9)"], &env);
        assert_eval_kind("stored", Sexpr::Integer(9), Some(env));
    }

    #[test]
    fn test_eval_def_errors() {
        assert_eval_error(
            "(def 1 2)",
            &EvalError::NotASymbol(Sexpr::Nil, Span::default()),
            None,
        );
        assert_eval_error("(def x)", &invalid_form(), None);
        assert_eval_error("(def x 1 2)", &invalid_form(), None);
    }

    #[test]
    fn test_eval_let() {
        assert_eval_kind("(let ((x 1) (y 2)) (+ x y))", Sexpr::Integer(3), None);
        assert_eval_kind("(let () 7)", Sexpr::Integer(7), None);
        assert_eval_kind("(let ((x 1)) 5 6 x)", Sexpr::Integer(1), None);
        assert_eval_kind("(let ((x 1)))", Sexpr::Nil, None);
    }

    #[test]
    fn test_eval_let_is_simultaneous() {
        // y's value expression must not see the x bound by the same let
        assert_eval_error("(let ((x 1) (y x)) y)", &unbound(), None);

        let env = Environment::new_global_populated();
        run_all(&["(def x 100)"], &env);
        assert_eval_kind("(let ((x 1) (y x)) y)", Sexpr::Integer(100), Some(env));
    }

    #[test]
    fn test_eval_let_shadowing() {
        assert_eval_kind("(let ((x 10)) (let ((x 30)) x))", Sexpr::Integer(30), None);
        // The outer x is untouched once the inner let returns
        assert_eval_kind("(let ((x 10)) (let ((x 30)) x) x)", Sexpr::Integer(10), None);
    }

    #[test]
    fn test_eval_let_does_not_leak() {
        let env = Environment::new_global_populated();
        run_all(&["(let ((temp 1)) temp)"], &env);
        assert_eval_error("temp", &unbound(), Some(env));
    }

    #[test]
    fn test_eval_let_errors() {
        assert_eval_error("(let)", &invalid_form(), None);
        assert_eval_error("(let x x)", &invalid_form(), None);
        assert_eval_error("(let ((x)) x)", &invalid_form(), None);
        assert_eval_error("(let ((x 1 2)) x)", &invalid_form(), None);
        assert_eval_error(
            "(let ((1 2)) 1)",
            &EvalError::NotASymbol(Sexpr::Nil, Span::default()),
            None,
        );
    }

    #[test]
    fn test_eval_lambda_and_call() {
        assert_eval_kind("((lambda (a b) (- a b)) 10 4)", Sexpr::Integer(6), None);
        assert_eval_kind("((lambda () 1 2 3))", Sexpr::Integer(3), None);
        assert_eval_kind("((lambda ()))", Sexpr::Nil, None);

        let env = Environment::new_global_populated();
        let closure = eval_in("(lambda (n) n)", &env).expect("lambda");
        assert!(matches!(
            closure.kind,
            Sexpr::Procedure(Procedure::Closure(ref c)) if c.params == vec!["n".to_string()]
        ));
    }

    #[test]
    fn test_eval_recursive_fib() {
        let env = Environment::new_global_populated();
        run_all(
            &[
                "(def <= (lambda (a b) (not (> a b))))",
                "(def fib (lambda (n) (if (<= n 2) 1 (+ (fib (- n 1)) (fib (- n 2))))))",
            ],
            &env,
        );
        assert_eval_kind("(fib 1)", Sexpr::Integer(1), Some(env.clone()));
        assert_eval_kind("(fib 10)", Sexpr::Integer(55), Some(env));
    }

    // Closures capture the environment they were created in.
    #[test]
    fn test_eval_closures_capture_lexically() {
        assert_eval_kind("(let ((x 5)) ((lambda () x)))", Sexpr::Integer(5), None);

        let env = Environment::new_global_populated();
        run_all(
            &[
                "(def make-adder (lambda (n) (lambda (m) (+ n m))))",
                "(def add3 (make-adder 3))",
            ],
            &env,
        );
        assert_eval_kind("(add3 4)", Sexpr::Integer(7), Some(env.clone()));
        // n is not visible outside the closure
        assert_eval_error("n", &unbound(), Some(env));
    }

    #[test]
    fn test_eval_closure_sees_later_global_definitions() {
        let env = Environment::new_global_populated();
        run_all(&["(def call-later (lambda () (later)))", "(def later (lambda () 11))"], &env);
        assert_eval_kind("(call-later)", Sexpr::Integer(11), Some(env));
    }

    #[test]
    fn test_eval_arguments_evaluated_in_caller_env() {
        let env = Environment::new_global_populated();
        run_all(&["(def id (lambda (v) v))"], &env);
        assert_eval_kind("(let ((v 8)) (id (+ v 1)))", Sexpr::Integer(9), Some(env));
    }

    #[test]
    fn test_eval_arity_mismatch() {
        let arity = EvalError::ArityMismatch {
            expected: 0,
            found: 0,
            span: Span::default(),
        };
        assert_eval_error("((lambda (a b) a) 1)", &arity, None);
        assert_eval_error("((lambda (a) a) 1 2)", &arity, None);
        assert_eval_error("((lambda () 1) 1)", &arity, None);
    }

    #[test]
    fn test_eval_lambda_errors() {
        assert_eval_error("(lambda)", &invalid_form(), None);
        assert_eval_error("(lambda x x)", &invalid_form(), None);
        assert_eval_error(
            "(lambda (a 1) a)",
            &EvalError::NotASymbol(Sexpr::Nil, Span::default()),
            None,
        );
    }

    #[test]
    fn test_eval_not_callable() {
        let not_callable = EvalError::NotCallable(Sexpr::Nil, Span::default());
        assert_eval_error("(1 2 3)", &not_callable, None);
        assert_eval_error("(() 1)", &not_callable, None);
        assert_eval_error("((< 1 2) 1)", &not_callable, None);
        assert_eval_error("(missing 1)", &unbound(), None);
    }

    #[test]
    fn test_eval_exit_signal() {
        assert_eq!(
            eval_in("(exit)", &Environment::new_global_populated()),
            Err(EvalError::Exit)
        );
        // Arguments are evaluated before the call
        assert_eval_error("(exit nope)", &unbound(), None);
    }

    #[test]
    fn test_rebinding_if_keeps_the_special_form() {
        let env = Environment::new_global_populated();
        run_all(&["(def if 5)"], &env);
        assert_eval_kind("if", Sexpr::Integer(5), Some(env.clone()));
        assert_eval_kind("(if 1 2 3)", Sexpr::Integer(2), Some(env));
    }

    #[test]
    fn test_special_form_lookup() {
        assert_eq!(SpecialForm::from_symbol("lambda"), Some(SpecialForm::Lambda));
        assert_eq!(SpecialForm::from_symbol("define"), None);
        let names = special_form_identifiers();
        assert_eq!(names.len(), 4);
        assert!(names.contains("def"));
    }
}
