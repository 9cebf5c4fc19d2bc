//! compass-core: the expression compiler of the construction interpreter.
//!
//! Turns expression source into shape-tagged expression trees:
//!
//! - [`lexer`] -- maximal-munch DFA tokenizer
//! - [`grammar`] -- LALR(1) action/goto tables
//! - [`parser`] -- shift/reduce engine with panic-mode recovery
//! - [`codegen`] -- semantic actions, scalar/vector promotion, name resolution
//! - [`ast`] -- the generated [`Expr`] / [`ExprValue`] trees
//!
//! [`generate()`] runs the whole pipeline for one expression.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod function;
pub mod grammar;
pub mod lexer;
pub mod normalize;
pub mod parser;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{BinaryOp, Constant, Expr, ExprValue, MathFn, Observer, UnaryOp};
pub use codegen::{Capability, CodeGen, Generated, NoSymbols, Op, Symbol, SymbolTable};
pub use error::{CodegenDiagnostic, SyntaxError};
pub use lexer::{Token, TokenKind};
pub use parser::{ParseOutcome, Parsed, SemanticActions, DEFAULT_MAX_ERRORS, MAX_NESTING};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use codegen::generate;
pub use function::{rewrite_params, split_definition, FunctionDefinition};
pub use normalize::normalize_symbols;
pub use parser::{parse_with, parse_with_limit};
