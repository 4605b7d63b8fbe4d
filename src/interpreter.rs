use crate::environment::Environment;
use crate::evaluator::{EvalError, evaluate_input};
use crate::parser::{ParseError, read};
use crate::prelude;
use crate::types::Node;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// A bootstrap form failed. `chunk` is the text of that form.
    #[error("while loading `{chunk}`: {source}")]
    Load {
        chunk: String,
        #[source]
        source: Box<Error>,
    },
}

/// A global environment plus the read-evaluate step the REPL drives.
pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter with only the primitives bound.
    pub fn new() -> Self {
        Interpreter {
            env: Environment::new_global_populated(),
        }
    }

    /// An interpreter with the bootstrap prelude already loaded.
    pub fn with_prelude() -> Result<Self, Error> {
        let interpreter = Interpreter::new();
        interpreter.load(prelude::PRELUDE)?;
        Ok(interpreter)
    }

    pub fn env(&self) -> &Rc<RefCell<Environment>> {
        &self.env
    }

    /// Reads one expression from `input` and evaluates it in the global
    /// environment. Blank input evaluates to nil.
    pub fn eval_str(&self, input: &str) -> Result<Node, Error> {
        let node = read(input)?;
        Ok(evaluate_input(node.as_ref(), &self.env)?)
    }

    /// Evaluates each blank-line separated form of `source` in order.
    pub fn load(&self, source: &str) -> Result<(), Error> {
        for chunk in prelude::chunks(source) {
            self.eval_str(chunk).map_err(|err| Error::Load {
                chunk: chunk.to_string(),
                source: Box::new(err),
            })?;
        }
        Ok(())
    }
}
