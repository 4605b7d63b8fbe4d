use crate::source::Span;
use crate::types::{Node, PrimitiveFunc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("Unbound symbol: '{0}'")]
    UnboundSymbol(String, Span), // Symbol name, span where lookup happened
}

/// One frame of bindings plus a link to the frame it was layered over.
///
/// Only the root frame (the global environment) is ever mutated after
/// creation; layered frames are filled once by [`Environment::extend`].
#[derive(Debug)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Node>,
}

impl Environment {
    /// Creates a new, empty top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// Creates a global environment holding every primitive.
    pub fn new_global_populated() -> Rc<RefCell<Environment>> {
        let env_ptr = Environment::new();
        {
            let mut env = env_ptr.borrow_mut();
            for (name, func) in crate::primitives::PRIMITIVES {
                env.add_primitive(name, *func);
            }
        }
        env_ptr
    }

    /// Layers `bindings` over `outer` without touching `outer`.
    pub fn extend(
        outer: &Rc<RefCell<Environment>>,
        bindings: impl IntoIterator<Item = (String, Node)>,
    ) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(Rc::clone(outer)),
            bindings: bindings.into_iter().collect(),
        }))
    }

    /// Returns the root of the chain `env` belongs to.
    pub fn global(env: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        loop {
            let outer = current.borrow().outer.clone();
            match outer {
                Some(outer_env) => current = outer_env,
                None => return current,
            }
        }
    }

    /// Binds `name` in the global environment reachable from `env`,
    /// replacing any previous global binding.
    pub fn define_global(env: &Rc<RefCell<Environment>>, name: String, value_node: Node) {
        Environment::global(env).borrow_mut().define(name, value_node);
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: String, value_node: Node) {
        self.bindings.insert(name, value_node);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    /// `lookup_span` is the location where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Node, EnvError> {
        if let Some(value_node) = self.bindings.get(name) {
            Ok(value_node.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnboundSymbol(name.to_string(), lookup_span)),
            }
        }
    }

    fn add_primitive(&mut self, name: &str, func: PrimitiveFunc) {
        let node = Node::new_primitive(func, name, Span::default());
        self.define(name.to_string(), node);
    }

    /// Gets every identifier visible from this environment.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}
