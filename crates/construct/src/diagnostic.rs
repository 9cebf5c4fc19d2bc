use std::fmt;

use compass_core::{CodegenDiagnostic, SyntaxError};
use serde::Serialize;

/// A non-fatal problem found while interpreting one document entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// The name being constructed when the problem surfaced.
    pub subject: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnresolvedReference {
        name: String,
    },
    /// `path` starts at the outermost name and ends with the repeated one.
    Cycle {
        path: Vec<String>,
    },
    UnknownType {
        tag: String,
    },
    BuildFailed {
        message: String,
    },
    Syntax {
        source_text: String,
        errors: Vec<SyntaxError>,
        #[serde(skip_serializing_if = "is_zero")]
        suppressed: usize,
    },
    Codegen {
        note: CodegenDiagnostic,
    },
    NoOutputs,
    Duplicate {
        message: String,
    },
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Diagnostic {
    pub fn new(subject: impl Into<String>, kind: DiagnosticKind) -> Self {
        Diagnostic {
            subject: subject.into(),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.subject)?;
        match &self.kind {
            DiagnosticKind::UnresolvedReference { name } => {
                write!(f, "unresolved reference '{}'", name)
            }
            DiagnosticKind::Cycle { path } => write!(f, "reference cycle {}", path.join(" -> ")),
            DiagnosticKind::UnknownType { tag } => {
                write!(f, "unknown construction type '{}'", tag)
            }
            DiagnosticKind::BuildFailed { message } => f.write_str(message),
            DiagnosticKind::Syntax {
                source_text,
                errors,
                suppressed,
            } => {
                write!(f, "syntax error in '{}'", source_text)?;
                if let Some(first) = errors.first() {
                    write!(f, ": {}", first)?;
                }
                let more = errors.len().saturating_sub(1) + suppressed;
                if more > 0 {
                    write!(f, " (and {} more)", more)?;
                }
                Ok(())
            }
            DiagnosticKind::Codegen { note } => write!(f, "{}", note),
            DiagnosticKind::NoOutputs => f.write_str("command has no outputs"),
            DiagnosticKind::Duplicate { message } => f.write_str(message),
        }
    }
}
