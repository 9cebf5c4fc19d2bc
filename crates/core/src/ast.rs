//! Generated expression trees.
//!
//! The code generator emits [`ExprValue`]s: either a single scalar [`Expr`]
//! or a pair of them for point-valued expressions. Trees carry no source
//! positions; they are the evaluable form handed to the code host.

use std::fmt;

use serde::Serialize;

/// A scalar expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Number { value: f64 },
    Text { value: String },
    Bool { value: bool },
    Constant { constant: Constant },
    /// Formal parameter of a function definition.
    Param { name: String },
    /// The named scene object itself.
    Reference { name: String },
    /// An observer read on a named scene object.
    Observe { target: String, observer: Observer },
    /// Call of a zero-argument function defined on the scene.
    FreeValue { name: String },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Call { func: MathFn, args: Vec<Expr> },
    Group { inner: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Pi,
}

/// Readable properties of scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Observer {
    X,
    Y,
    Value,
    Area,
    Text,
    Length,
    DirectionX,
    DirectionY,
    Name,
}

impl Observer {
    pub fn method(self) -> &'static str {
        match self {
            Observer::X => "X",
            Observer::Y => "Y",
            Observer::Value => "Value",
            Observer::Area => "Area",
            Observer::Text => "plaintext",
            Observer::Length => "L",
            Observer::DirectionX => "dx",
            Observer::DirectionY => "dy",
            Observer::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
    /// Numeric coercion of text.
    ToNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add | BinaryOp::Concat => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Math library functions reachable as `name(arg)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MathFn {
    Abs,
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Exp,
    Floor,
    Log,
    Max,
    Min,
    Pow,
    Random,
    Round,
    Sin,
    Sqrt,
    Tan,
}

impl MathFn {
    /// Look up a library function by its lowercase name.
    pub fn from_name(name: &str) -> Option<MathFn> {
        let f = match name {
            "abs" => MathFn::Abs,
            "acos" => MathFn::Acos,
            "asin" => MathFn::Asin,
            "atan" => MathFn::Atan,
            "ceil" => MathFn::Ceil,
            "cos" => MathFn::Cos,
            "exp" => MathFn::Exp,
            "floor" => MathFn::Floor,
            "log" => MathFn::Log,
            "max" => MathFn::Max,
            "min" => MathFn::Min,
            "pow" => MathFn::Pow,
            "random" => MathFn::Random,
            "round" => MathFn::Round,
            "sin" => MathFn::Sin,
            "sqrt" => MathFn::Sqrt,
            "tan" => MathFn::Tan,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(self) -> &'static str {
        match self {
            MathFn::Abs => "abs",
            MathFn::Acos => "acos",
            MathFn::Asin => "asin",
            MathFn::Atan => "atan",
            MathFn::Ceil => "ceil",
            MathFn::Cos => "cos",
            MathFn::Exp => "exp",
            MathFn::Floor => "floor",
            MathFn::Log => "log",
            MathFn::Max => "max",
            MathFn::Min => "min",
            MathFn::Pow => "pow",
            MathFn::Random => "random",
            MathFn::Round => "round",
            MathFn::Sin => "sin",
            MathFn::Sqrt => "sqrt",
            MathFn::Tan => "tan",
        }
    }
}

// ──────────────────────────────────────────────
// Constructors
// ──────────────────────────────────────────────

impl Expr {
    pub fn number(value: f64) -> Expr {
        Expr::Number { value }
    }

    pub fn text(value: impl Into<String>) -> Expr {
        Expr::Text {
            value: value.into(),
        }
    }

    pub fn reference(name: impl Into<String>) -> Expr {
        Expr::Reference { name: name.into() }
    }

    pub fn observe(target: impl Into<String>, observer: Observer) -> Expr {
        Expr::Observe {
            target: target.into(),
            observer,
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(func: MathFn, args: Vec<Expr>) -> Expr {
        Expr::Call { func, args }
    }

    pub fn group(inner: Expr) -> Expr {
        Expr::Group {
            inner: Box::new(inner),
        }
    }

    /// The referenced name, if this is a bare reference.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Expr::Reference { name } => Some(name),
            _ => None,
        }
    }

    /// Visit every scene name this expression reads.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Reference { name } | Expr::FreeValue { name } => push_unique(out, name),
            Expr::Observe { target, .. } => push_unique(out, target),
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_names(out)),
            Expr::Group { inner } => inner.collect_names(out),
            Expr::Number { .. }
            | Expr::Text { .. }
            | Expr::Bool { .. }
            | Expr::Constant { .. }
            | Expr::Param { .. } => {}
        }
    }

    /// Formal parameters referenced anywhere in the tree.
    pub fn params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Param { name } => push_unique(out, name),
            Expr::Unary { operand, .. } => operand.collect_params(out),
            Expr::Binary { left, right, .. } => {
                left.collect_params(out);
                right.collect_params(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_params(out)),
            Expr::Group { inner } => inner.collect_params(out),
            _ => {}
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: &'a str) {
    if !out.contains(&name) {
        out.push(name);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number { value } => write!(f, "{}", value),
            Expr::Text { value } => write!(f, "{:?}", value),
            Expr::Bool { value } => write!(f, "{}", value),
            Expr::Constant {
                constant: Constant::Pi,
            } => f.write_str("PI"),
            Expr::Param { name } => f.write_str(name),
            Expr::Reference { name } => write!(f, "${}", name),
            Expr::Observe { target, observer } => write!(f, "${}.{}()", target, observer.method()),
            Expr::FreeValue { name } => write!(f, "{}()", name),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!({})", operand),
                UnaryOp::Negate => write!(f, "-({})", operand),
                UnaryOp::ToNumber => write!(f, "num({})", operand),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Group { inner } => write!(f, "({})", inner),
        }
    }
}

// ──────────────────────────────────────────────
// Expression values
// ──────────────────────────────────────────────

/// Shape-tagged result of a semantic action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ExprValue {
    Scalar { expr: Expr },
    Vector2 { x: Expr, y: Expr },
}

impl ExprValue {
    pub fn scalar(expr: Expr) -> ExprValue {
        ExprValue::Scalar { expr }
    }

    pub fn vector(x: Expr, y: Expr) -> ExprValue {
        ExprValue::Vector2 { x, y }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, ExprValue::Vector2 { .. })
    }

    pub fn as_scalar(&self) -> Option<&Expr> {
        match self {
            ExprValue::Scalar { expr } => Some(expr),
            ExprValue::Vector2 { .. } => None,
        }
    }

    /// Names read by either component.
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            ExprValue::Scalar { expr } => expr.referenced_names(),
            ExprValue::Vector2 { x, y } => {
                let mut names = x.referenced_names();
                for name in y.referenced_names() {
                    push_unique(&mut names, name);
                }
                names
            }
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Scalar { expr } => write!(f, "{}", expr),
            ExprValue::Vector2 { x, y } => write!(f, "[{}, {}]", x, y),
        }
    }
}
