//! Runtime values and evaluation errors.

pub mod values;

use std::fmt;

pub use values::Value;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that can occur while compiling or calling generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// No scene object or free value with this name.
    UnknownObject { name: String },
    /// The object exists but cannot report the requested observer.
    MissingObserver { name: String, observer: String },
    /// An operand had the wrong runtime type.
    TypeMismatch { expected: String, got: String },
    /// A formal parameter was referenced but not bound.
    UnboundParameter { name: String },
    /// A callable was invoked with the wrong number of arguments.
    Arity { expected: usize, got: usize },
    /// The scene could not produce a value (e.g. an undefined intersection).
    Undefined { message: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownObject { name } => write!(f, "unknown object '{}'", name),
            EvalError::MissingObserver { name, observer } => {
                write!(f, "object '{}' has no {} observer", name, observer)
            }
            EvalError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            EvalError::UnboundParameter { name } => write!(f, "unbound parameter '{}'", name),
            EvalError::Arity { expected, got } => {
                write!(f, "expected {} argument(s), got {}", expected, got)
            }
            EvalError::Undefined { message } => write!(f, "undefined value: {}", message),
        }
    }
}

impl std::error::Error for EvalError {}
