//! compass-eval: the evaluable-code host.
//!
//! Generated expression trees from `compass-core` are compiled into
//! [`Callable`]s by a [`CodeHost`]. Callables read scene state through an
//! [`Environment`] at call time, so a callable compiled before an object
//! moves still sees its current position.

pub mod callable;
pub mod environment;
pub mod evaluate;
pub mod types;

pub use callable::{Callable, CodeHost, CompiledExpr, Evaluate, TreeHost};
pub use environment::{EmptyEnvironment, Environment, Frame};
pub use evaluate::eval_expr;
pub use types::{EvalError, Value};

/// Evaluate a closed expression: no scene, no parameters.
pub fn evaluate_closed(expr: &compass_core::Expr) -> Result<Value, EvalError> {
    eval_expr(expr, &EmptyEnvironment, &Frame::empty())
}
