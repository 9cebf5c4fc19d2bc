//! Callables handed out by the code host.

use std::fmt;
use std::sync::Arc;

use compass_core::Expr;
use serde::{Serialize, Serializer};

use crate::environment::{Environment, Frame};
use crate::evaluate::eval_expr;
use crate::types::{EvalError, Value};

/// Something the scene can invoke to obtain a value.
pub trait Evaluate: fmt::Debug + Send + Sync {
    fn call(&self, env: &dyn Environment, args: &[Value]) -> Result<Value, EvalError>;

    /// Formal parameter names, in call order.
    fn params(&self) -> &[String] {
        &[]
    }

    /// Source-like rendering for diagnostics and CLI output.
    fn describe(&self) -> String;
}

/// A shared, cheaply clonable callable.
#[derive(Clone)]
pub struct Callable(Arc<dyn Evaluate>);

impl Callable {
    pub fn new(inner: impl Evaluate + 'static) -> Self {
        Callable(Arc::new(inner))
    }

    /// A callable that ignores its environment.
    pub fn constant(value: Value) -> Self {
        Callable::new(ConstantFn(value))
    }

    pub fn call(&self, env: &dyn Environment, args: &[Value]) -> Result<Value, EvalError> {
        self.0.call(env, args)
    }

    /// Call and require a numeric result.
    pub fn call_number(&self, env: &dyn Environment, args: &[f64]) -> Result<f64, EvalError> {
        let args: Vec<Value> = args.iter().map(|a| Value::Number(*a)).collect();
        self.call(env, &args)?.as_number()
    }

    pub fn params(&self) -> &[String] {
        self.0.params()
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Callables serialize as their source description.
impl Serialize for Callable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.describe())
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.describe())
    }
}

// ──────────────────────────────────────────────
// Implementations
// ──────────────────────────────────────────────

#[derive(Debug)]
struct ConstantFn(Value);

impl Evaluate for ConstantFn {
    fn call(&self, _env: &dyn Environment, _args: &[Value]) -> Result<Value, EvalError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        self.0.to_string()
    }
}

/// A generated expression with named parameters.
#[derive(Debug)]
pub struct CompiledExpr {
    params: Vec<String>,
    body: Expr,
}

impl CompiledExpr {
    pub fn body(&self) -> &Expr {
        &self.body
    }
}

impl Evaluate for CompiledExpr {
    fn call(&self, env: &dyn Environment, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != self.params.len() {
            return Err(EvalError::Arity {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        eval_expr(&self.body, env, &Frame::new(&self.params, args))
    }

    fn params(&self) -> &[String] {
        &self.params
    }

    fn describe(&self) -> String {
        if self.params.is_empty() {
            self.body.to_string()
        } else {
            format!("({}) => {}", self.params.join(", "), self.body)
        }
    }
}

// ──────────────────────────────────────────────
// Code host
// ──────────────────────────────────────────────

/// Turns generated fragments into callables.
pub trait CodeHost {
    fn compile(&self, fragment: &Expr, free_variables: &[String]) -> Result<Callable, EvalError>;
}

/// The default host: evaluates the expression tree directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeHost;

impl CodeHost for TreeHost {
    fn compile(&self, fragment: &Expr, free_variables: &[String]) -> Result<Callable, EvalError> {
        if let Some(unbound) = fragment
            .params()
            .into_iter()
            .find(|p| !free_variables.iter().any(|v| v == p))
        {
            return Err(EvalError::UnboundParameter {
                name: unbound.to_owned(),
            });
        }
        Ok(Callable::new(CompiledExpr {
            params: free_variables.to_vec(),
            body: fragment.clone(),
        }))
    }
}
