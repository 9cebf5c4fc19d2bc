//! Expression code generator.
//!
//! [`CodeGen`] is the semantic-action layer of the parser: every reduction
//! becomes a call to [`CodeGen::apply`] or one of the literal and variable
//! helpers, producing shape-tagged [`ExprValue`]s. Names are resolved
//! through a [`SymbolTable`] supplied by the caller.

use serde::Serialize;

use crate::ast::{BinaryOp, Constant, Expr, ExprValue, MathFn, Observer, UnaryOp};
use crate::error::CodegenDiagnostic;
use crate::grammar::Rule;
use crate::parser::{parse_with, ParseOutcome, SemanticActions, StackValue};

// ──────────────────────────────────────────────
// Symbols
// ──────────────────────────────────────────────

/// What a constructed scene object can report, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Sliders, angles, distances and other objects with a numeric value.
    NumericValue,
    /// Closed regions: polygons, circles, sectors.
    Area,
    /// Text objects whose content can be read as a number.
    PlainText,
    /// Vectors, usable as a pair of direction components.
    Direction,
    /// Segments and lines, read as their length.
    Length,
    /// Points and everything else.
    Generic,
}

/// How a bare name resolves in the current scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// A zero-argument function defined on the scene.
    FreeValue,
    Object(Capability),
    Unknown,
}

pub trait SymbolTable {
    fn resolve(&mut self, name: &str) -> Symbol;
}

/// A symbol table in which nothing is defined.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbols;

impl SymbolTable for NoSymbols {
    fn resolve(&mut self, _name: &str) -> Symbol {
        Symbol::Unknown
    }
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

/// Operator tags accepted by [`CodeGen::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
    /// Logical negation.
    Neg,
    /// Numeric sign flip.
    NegMult,
    /// Parenthesization.
    Bra,
    Coord,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Lt => "lt",
            Op::Le => "le",
            Op::Gt => "gt",
            Op::Ge => "ge",
            Op::Eq => "eq",
            Op::Neq => "neq",
            Op::And => "and",
            Op::Or => "or",
            Op::Neg => "neg",
            Op::NegMult => "negmult",
            Op::Bra => "bra",
            Op::Coord => "coord",
        }
    }
}

/// Literal terminals accepted by [`CodeGen::literal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Int,
    Float,
    Param,
    Html,
    Str,
    Command,
}

// ──────────────────────────────────────────────
// Generator
// ──────────────────────────────────────────────

pub struct CodeGen<'t> {
    symbols: &'t mut dyn SymbolTable,
    diagnostics: Vec<CodegenDiagnostic>,
    references: Vec<String>,
}

impl<'t> CodeGen<'t> {
    pub fn new(symbols: &'t mut dyn SymbolTable) -> Self {
        CodeGen {
            symbols,
            diagnostics: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[CodegenDiagnostic] {
        &self.diagnostics
    }

    /// Scene names resolved so far, in first-use order.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Combine operands under `op`. Unary operators ignore `second`.
    pub fn apply(&mut self, op: Op, first: ExprValue, second: Option<ExprValue>) -> ExprValue {
        let second = second.unwrap_or_else(|| ExprValue::scalar(Expr::number(0.0)));
        match op {
            Op::Add => arithmetic(BinaryOp::Add, promote(first), promote(second)),
            Op::Sub => arithmetic(BinaryOp::Sub, promote(first), promote(second)),
            Op::Mul => arithmetic(BinaryOp::Mul, promote(first), promote(second)),
            Op::Div => arithmetic(BinaryOp::Div, promote(first), promote(second)),
            Op::Lt => self.scalar_binary(op, BinaryOp::Lt, first, second),
            Op::Le => self.scalar_binary(op, BinaryOp::Le, first, second),
            Op::Gt => self.scalar_binary(op, BinaryOp::Gt, first, second),
            Op::Ge => self.scalar_binary(op, BinaryOp::Ge, first, second),
            Op::Eq => self.scalar_binary(op, BinaryOp::Eq, first, second),
            Op::Neq => self.scalar_binary(op, BinaryOp::Neq, first, second),
            Op::And => self.scalar_binary(op, BinaryOp::And, first, second),
            Op::Or => self.scalar_binary(op, BinaryOp::Or, first, second),
            Op::Pow => {
                let base = self.scalar(op, first);
                let exponent = self.scalar(op, second);
                ExprValue::scalar(Expr::call(MathFn::Pow, vec![base, exponent]))
            }
            Op::Neg => {
                let operand = self.scalar(op, first);
                ExprValue::scalar(Expr::unary(UnaryOp::Not, operand))
            }
            Op::NegMult => match promote(first) {
                ExprValue::Scalar { expr } => ExprValue::scalar(negate(expr)),
                ExprValue::Vector2 { x, y } => ExprValue::vector(negate(x), negate(y)),
            },
            Op::Bra => match first {
                ExprValue::Scalar { expr } => ExprValue::scalar(Expr::group(expr)),
                ExprValue::Vector2 { x, y } => ExprValue::vector(Expr::group(x), Expr::group(y)),
            },
            Op::Coord => {
                let x = self.scalar(op, first);
                let y = self.scalar(op, second);
                ExprValue::vector(x, y)
            }
        }
    }

    fn scalar_binary(
        &mut self,
        op: Op,
        bin: BinaryOp,
        first: ExprValue,
        second: ExprValue,
    ) -> ExprValue {
        let left = self.scalar(op, first);
        let right = self.scalar(op, second);
        ExprValue::scalar(Expr::binary(bin, left, right))
    }

    /// Coerce a raw lexeme into its literal fragment.
    pub fn literal(&mut self, kind: Literal, lexeme: &str) -> ExprValue {
        let expr = match kind {
            Literal::Int | Literal::Float => Expr::number(lexeme.parse().unwrap_or(f64::NAN)),
            Literal::Param => Expr::Param {
                name: lexeme.trim_start_matches('_').to_owned(),
            },
            Literal::Html => Expr::text(lexeme),
            Literal::Str => Expr::text(unquote(lexeme)),
            Literal::Command => self.command(lexeme),
        };
        ExprValue::scalar(expr)
    }

    /// `"text" + e`
    pub fn concat(&mut self, text: &str, rest: ExprValue) -> ExprValue {
        let rest = self.scalar_named("string", rest);
        ExprValue::scalar(Expr::binary(
            BinaryOp::Concat,
            Expr::text(unquote(text)),
            rest,
        ))
    }

    /// Resolve a bare name.
    pub fn var(&mut self, name: &str) -> ExprValue {
        if name == "PI" {
            return ExprValue::scalar(Expr::Constant {
                constant: Constant::Pi,
            });
        }
        let symbol = self.symbols.resolve(name);
        if !self.references.iter().any(|r| r == name) {
            self.references.push(name.to_owned());
        }
        match symbol {
            Symbol::FreeValue => ExprValue::scalar(Expr::FreeValue {
                name: name.to_owned(),
            }),
            Symbol::Object(Capability::NumericValue) => {
                ExprValue::scalar(Expr::observe(name, Observer::Value))
            }
            Symbol::Object(Capability::Area) => {
                ExprValue::scalar(Expr::observe(name, Observer::Area))
            }
            Symbol::Object(Capability::PlainText) => ExprValue::scalar(Expr::unary(
                UnaryOp::ToNumber,
                Expr::observe(name, Observer::Text),
            )),
            Symbol::Object(Capability::Direction) => ExprValue::vector(
                Expr::observe(name, Observer::DirectionX),
                Expr::observe(name, Observer::DirectionY),
            ),
            Symbol::Object(Capability::Length) => {
                ExprValue::scalar(Expr::observe(name, Observer::Length))
            }
            Symbol::Object(Capability::Generic) => ExprValue::scalar(Expr::reference(name)),
            Symbol::Unknown => {
                self.diagnostics.push(CodegenDiagnostic::UnresolvedName {
                    name: name.to_owned(),
                });
                ExprValue::scalar(Expr::reference(name))
            }
        }
    }

    /// `name(arg)`: coordinate extraction, a math call, or an implicit
    /// product.
    pub fn var_call(&mut self, name: &str, arg: ExprValue) -> ExprValue {
        let observer = if name.eq_ignore_ascii_case("x") {
            Some(Observer::X)
        } else if name.eq_ignore_ascii_case("y") {
            Some(Observer::Y)
        } else {
            None
        };
        if let Some(observer) = observer {
            return match arg {
                ExprValue::Scalar {
                    expr: Expr::Reference { name },
                } => ExprValue::scalar(Expr::observe(name, observer)),
                ExprValue::Vector2 { x, y } => {
                    ExprValue::scalar(if observer == Observer::X { x } else { y })
                }
                scalar => scalar,
            };
        }
        if let Some(func) = MathFn::from_name(&name.to_ascii_lowercase()) {
            let arg = self.scalar_named(func.name(), arg);
            return ExprValue::scalar(Expr::call(func, vec![arg]));
        }
        let factor = self.var(name);
        let arg = self.apply(Op::Bra, arg, None);
        self.apply(Op::Mul, factor, Some(arg))
    }

    fn command(&mut self, lexeme: &str) -> Expr {
        if let Some(arg) = lexeme
            .strip_prefix("Name[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return Expr::text(arg);
        }
        self.diagnostics.push(CodegenDiagnostic::UnsupportedCommand {
            lexeme: lexeme.to_owned(),
        });
        Expr::text("")
    }

    fn scalar(&mut self, op: Op, value: ExprValue) -> Expr {
        self.scalar_named(op.name(), value)
    }

    fn scalar_named(&mut self, context: &str, value: ExprValue) -> Expr {
        match value {
            ExprValue::Scalar { expr } => expr,
            ExprValue::Vector2 { x, .. } => {
                self.diagnostics.push(CodegenDiagnostic::ShapeMismatch {
                    context: context.to_owned(),
                });
                x
            }
        }
    }
}

impl SemanticActions for CodeGen<'_> {
    fn reduce(&mut self, rule: Rule, mut operands: Vec<StackValue<'_>>) -> ExprValue {
        let binary = |rule: Rule| -> Option<Op> {
            let op = match rule {
                Rule::Le => Op::Le,
                Rule::Ge => Op::Ge,
                Rule::Eq => Op::Eq,
                Rule::Neq => Op::Neq,
                Rule::Lt => Op::Lt,
                Rule::Gt => Op::Gt,
                Rule::Add => Op::Add,
                Rule::Sub => Op::Sub,
                Rule::Pow => Op::Pow,
                Rule::Or => Op::Or,
                Rule::And => Op::And,
                Rule::Mul => Op::Mul,
                Rule::Div => Op::Div,
                _ => return None,
            };
            Some(op)
        };
        if let Some(op) = binary(rule) {
            let left = take(&mut operands, 0);
            let right = take(&mut operands, 2);
            return self.apply(op, left, Some(right));
        }

        let lexeme = operands.first().map_or("", StackValue::lexeme);
        match rule {
            Rule::Accept | Rule::Finish => take(&mut operands, 0),
            Rule::Coord => {
                let x = take(&mut operands, 1);
                let y = take(&mut operands, 3);
                self.apply(Op::Coord, x, Some(y))
            }
            Rule::Not => {
                let operand = take(&mut operands, 1);
                self.apply(Op::Neg, operand, None)
            }
            Rule::Negate => {
                let operand = take(&mut operands, 1);
                self.apply(Op::NegMult, operand, None)
            }
            Rule::Group => {
                let inner = take(&mut operands, 1);
                self.apply(Op::Bra, inner, None)
            }
            Rule::Concat => {
                let rest = take(&mut operands, 2);
                self.concat(lexeme, rest)
            }
            Rule::Int => self.literal(Literal::Int, lexeme),
            Rule::Float => self.literal(Literal::Float, lexeme),
            Rule::Param => self.literal(Literal::Param, lexeme),
            Rule::Html => self.literal(Literal::Html, lexeme),
            Rule::Str => self.literal(Literal::Str, lexeme),
            Rule::Command => self.literal(Literal::Command, lexeme),
            Rule::VarCall => {
                let arg = take(&mut operands, 2);
                self.var_call(lexeme, arg)
            }
            Rule::Var => self.var(lexeme),
            _ => take(&mut operands, 0),
        }
    }
}

fn take(operands: &mut [StackValue<'_>], index: usize) -> ExprValue {
    match operands.get_mut(index) {
        Some(slot) => std::mem::replace(slot, StackValue::Sentinel).into_value(),
        None => ExprValue::scalar(Expr::number(0.0)),
    }
}

fn unquote(lexeme: &str) -> &str {
    lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme)
}

/// Split a bare reference into its coordinate accessors.
fn promote(value: ExprValue) -> ExprValue {
    match value {
        ExprValue::Scalar {
            expr: Expr::Reference { name },
        } => ExprValue::vector(
            Expr::observe(name.clone(), Observer::X),
            Expr::observe(name, Observer::Y),
        ),
        other => other,
    }
}

fn arithmetic(op: BinaryOp, left: ExprValue, right: ExprValue) -> ExprValue {
    match (left, right) {
        (ExprValue::Scalar { expr: a }, ExprValue::Scalar { expr: b }) => {
            ExprValue::scalar(Expr::binary(op, a, b))
        }
        (ExprValue::Vector2 { x: ax, y: ay }, ExprValue::Vector2 { x: bx, y: by }) => {
            ExprValue::vector(Expr::binary(op, ax, bx), Expr::binary(op, ay, by))
        }
        (ExprValue::Vector2 { x, y }, ExprValue::Scalar { expr: c }) => {
            ExprValue::vector(Expr::binary(op, x, c.clone()), Expr::binary(op, y, c))
        }
        (ExprValue::Scalar { expr: c }, ExprValue::Vector2 { x, y }) => {
            ExprValue::vector(Expr::binary(op, c.clone(), x), Expr::binary(op, c, y))
        }
    }
}

fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Number { value } => Expr::number(-value),
        other => Expr::unary(UnaryOp::Negate, other),
    }
}

// ──────────────────────────────────────────────
// Entry point
// ──────────────────────────────────────────────

/// Parse and generate code for one expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generated {
    pub outcome: ParseOutcome,
    pub diagnostics: Vec<CodegenDiagnostic>,
    /// Scene names the expression reads.
    pub references: Vec<String>,
}

pub fn generate(src: &str, symbols: &mut dyn SymbolTable) -> Generated {
    let mut codegen = CodeGen::new(symbols);
    let outcome = parse_with(src, &mut codegen);
    Generated {
        outcome,
        diagnostics: codegen.diagnostics,
        references: codegen.references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Scene(HashMap<&'static str, Symbol>);

    impl SymbolTable for Scene {
        fn resolve(&mut self, name: &str) -> Symbol {
            self.0.get(name).copied().unwrap_or(Symbol::Unknown)
        }
    }

    fn scene() -> Scene {
        let mut s = Scene::default();
        s.0.insert("A", Symbol::Object(Capability::Generic));
        s.0.insert("B", Symbol::Object(Capability::Generic));
        s.0.insert("a", Symbol::Object(Capability::NumericValue));
        s.0.insert("poly", Symbol::Object(Capability::Area));
        s.0.insert("t", Symbol::Object(Capability::PlainText));
        s.0.insert("u", Symbol::Object(Capability::Direction));
        s.0.insert("s", Symbol::Object(Capability::Length));
        s.0.insert("k", Symbol::FreeValue);
        s
    }

    fn gen(src: &str) -> Generated {
        generate(src, &mut scene())
    }

    fn value(src: &str) -> ExprValue {
        let g = gen(src);
        assert!(g.outcome.errors.is_empty(), "{:?}", g.outcome.errors);
        g.outcome.into_value().expect("parse succeeded")
    }

    #[test]
    fn scalar_addition() {
        let mut symbols = NoSymbols;
        let mut cg = CodeGen::new(&mut symbols);
        let out = cg.apply(
            Op::Add,
            ExprValue::scalar(Expr::number(2.0)),
            Some(ExprValue::scalar(Expr::number(3.0))),
        );
        assert_eq!(
            out,
            ExprValue::scalar(Expr::binary(
                BinaryOp::Add,
                Expr::number(2.0),
                Expr::number(3.0)
            ))
        );
    }

    #[test]
    fn vector_plus_scalar_broadcasts() {
        let mut symbols = NoSymbols;
        let mut cg = CodeGen::new(&mut symbols);
        let out = cg.apply(
            Op::Add,
            ExprValue::vector(Expr::number(1.0), Expr::number(2.0)),
            Some(ExprValue::scalar(Expr::observe("c", Observer::Value))),
        );
        match out {
            ExprValue::Vector2 { x, y } => {
                assert_eq!(x.to_string(), "(1 + $c.Value())");
                assert_eq!(y.to_string(), "(2 + $c.Value())");
            }
            other => panic!("expected vector, got {:?}", other),
        }
    }

    #[test]
    fn point_references_promote_in_arithmetic() {
        assert_eq!(value("A + B").to_string(), "[($A.X() + $B.X()), ($A.Y() + $B.Y())]");
        assert_eq!(value("2 * A").to_string(), "[(2 * $A.X()), (2 * $A.Y())]");
    }

    #[test]
    fn comparisons_use_x_component_of_vectors() {
        let g = gen("A + B < 3");
        // `<` binds tighter than `+`, so the comparison sees a bare reference.
        assert!(g.diagnostics.is_empty(), "{:?}", g.diagnostics);
        let g = gen("(A + B) < 3");
        assert_eq!(
            g.diagnostics,
            vec![CodegenDiagnostic::ShapeMismatch {
                context: "lt".to_owned()
            }]
        );
    }

    #[test]
    fn negation_of_literals_is_folded() {
        assert_eq!(value("-2"), ExprValue::scalar(Expr::number(-2.0)));
        assert_eq!(value("-a").to_string(), "-($a.Value())");
        assert_eq!(value("-A").to_string(), "[-($A.X()), -($A.Y())]");
    }

    #[test]
    fn variable_resolution_follows_capabilities() {
        assert_eq!(value("k").to_string(), "k()");
        assert_eq!(value("a").to_string(), "$a.Value()");
        assert_eq!(value("poly").to_string(), "$poly.Area()");
        assert_eq!(value("t").to_string(), "num($t.plaintext())");
        assert_eq!(value("u").to_string(), "[$u.dx(), $u.dy()]");
        assert_eq!(value("s").to_string(), "$s.L()");
        assert_eq!(value("A").to_string(), "$A");
        assert_eq!(value("PI").to_string(), "PI");
    }

    #[test]
    fn unknown_names_are_reported() {
        let g = gen("zz + 1");
        assert_eq!(
            g.diagnostics,
            vec![CodegenDiagnostic::UnresolvedName {
                name: "zz".to_owned()
            }]
        );
        assert_eq!(g.references, vec!["zz".to_owned()]);
    }

    #[test]
    fn calls_cover_coordinates_math_and_implicit_products() {
        assert_eq!(value("x(A)").to_string(), "$A.X()");
        assert_eq!(value("y(A + B)").to_string(), "($A.Y() + $B.Y())");
        assert_eq!(value("X(A)").to_string(), "$A.X()");
        assert_eq!(value("Y(A + B)").to_string(), "($A.Y() + $B.Y())");
        assert_eq!(value("Sin(a)").to_string(), "sin($a.Value())");
        assert_eq!(value("a(2)").to_string(), "($a.Value() * (2))");
    }

    #[test]
    fn coordinate_pairs_become_vectors() {
        assert_eq!(value("(1, a)").to_string(), "[1, $a.Value()]");
    }

    #[test]
    fn strings_concatenate_and_commands_name_objects() {
        assert_eq!(value("\"len = \" + s").to_string(), "(\"len = \" + $s.L())");
        assert_eq!(value("Name[A]"), ExprValue::scalar(Expr::text("A")));
        let g = gen("Other[A]");
        assert_eq!(g.diagnostics.len(), 1);
    }

    #[test]
    fn parameters_drop_their_prefix() {
        let v = value("__x ^ 2");
        assert_eq!(v.to_string(), "pow(x, 2)");
        assert_eq!(v.as_scalar().unwrap().params(), vec!["x"]);
    }

    #[test]
    fn generation_is_deterministic() {
        for src in ["A + 2 * B", "(x(A), y(B) - 1)", "\"a\" + k", "!(a < 2) && a > 1"] {
            assert_eq!(gen(src), gen(src));
        }
    }

    #[test]
    fn invalid_input_is_returned_unchanged() {
        let g = gen("(A + ");
        assert!(g.outcome.is_degraded());
        assert!(!g.outcome.errors.is_empty());
        assert_eq!(
            g.outcome.result,
            crate::parser::Parsed::Degraded {
                text: "(A + ".to_owned()
            }
        );
    }
}
