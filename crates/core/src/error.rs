use serde::Serialize;
use thiserror::Error;

use crate::lexer::TokenKind;

/// A syntax error recorded during panic-mode recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("parse error at offset {offset} (line {line}): expected one of {}", render_expected(.expected))]
pub struct SyntaxError {
    /// Byte offset of the offending lookahead.
    pub offset: usize,
    /// One-based line of the offending lookahead.
    pub line: usize,
    /// Terminals the parser could have accepted at that point.
    pub expected: Vec<TokenKind>,
}

impl SyntaxError {
    pub fn new(src: &str, offset: usize, expected: Vec<TokenKind>) -> Self {
        let line = src
            .get(..offset)
            .map_or(1, |prefix| prefix.matches('\n').count() + 1);
        SyntaxError {
            offset,
            line,
            expected,
        }
    }
}

fn render_expected(expected: &[TokenKind]) -> String {
    if expected.is_empty() {
        return "nothing".to_owned();
    }
    expected
        .iter()
        .map(|k| k.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Notes produced while generating code for an otherwise valid parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodegenDiagnostic {
    #[error("unresolved name '{name}'")]
    UnresolvedName { name: String },
    #[error("'{context}' needs a scalar operand; using the x component of a point value")]
    ShapeMismatch { context: String },
    #[error("unsupported command '{lexeme}'")]
    UnsupportedCommand { lexeme: String },
}
