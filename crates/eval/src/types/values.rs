//! Runtime values produced by generated code.

use std::fmt;

use serde::Serialize;

use super::EvalError;

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
        }
    }

    /// Numeric view for arithmetic. Booleans count as 0 and 1.
    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) => Err(EvalError::TypeMismatch {
                expected: "number".to_owned(),
                got: self.type_name().to_owned(),
            }),
        }
    }

    /// Explicit numeric coercion: unparsable text becomes NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            other => other.as_number().unwrap_or(f64::NAN),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_display_without_trailing_zero() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn text_is_not_implicitly_numeric() {
        let err = Value::Text("3".to_owned()).as_number().unwrap_err();
        assert_eq!(
            err,
            EvalError::TypeMismatch {
                expected: "number".to_owned(),
                got: "text".to_owned()
            }
        );
        assert_eq!(Value::Text(" 3 ".to_owned()).to_number(), 3.0);
        assert!(Value::Text("abc".to_owned()).to_number().is_nan());
    }

    #[test]
    fn truthiness_follows_value_kind() {
        assert!(Value::Number(2.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::Text(String::new()).truthy());
        assert!(Value::Bool(true).truthy());
    }
}
