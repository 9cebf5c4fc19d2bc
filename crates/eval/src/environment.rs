//! What generated code can see of the scene.

use compass_core::Observer;

use crate::types::{EvalError, Value};

/// Read access to scene state, consulted lazily at call time.
pub trait Environment {
    /// Read `observer` on the object called `name`.
    fn observe(&self, name: &str, observer: Observer) -> Result<Value, EvalError>;

    /// Call the zero-argument scene function `name`.
    fn free_value(&self, name: &str) -> Result<Value, EvalError>;

    /// Value of a bare object reference used as a scalar.
    fn reference(&self, name: &str) -> Result<Value, EvalError> {
        self.observe(name, Observer::Value)
    }
}

/// An environment with no objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn observe(&self, name: &str, _observer: Observer) -> Result<Value, EvalError> {
        Err(EvalError::UnknownObject {
            name: name.to_owned(),
        })
    }

    fn free_value(&self, name: &str) -> Result<Value, EvalError> {
        Err(EvalError::UnknownObject {
            name: name.to_owned(),
        })
    }
}

/// Parameter bindings for one call.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    params: &'a [String],
    args: &'a [Value],
}

impl<'a> Frame<'a> {
    pub fn new(params: &'a [String], args: &'a [Value]) -> Self {
        Frame { params, args }
    }

    pub fn empty() -> Frame<'static> {
        Frame {
            params: &[],
            args: &[],
        }
    }

    pub fn get(&self, name: &str) -> Result<&'a Value, EvalError> {
        self.params
            .iter()
            .position(|p| p == name)
            .and_then(|i| self.args.get(i))
            .ok_or_else(|| EvalError::UnboundParameter {
                name: name.to_owned(),
            })
    }
}
