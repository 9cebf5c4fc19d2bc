//! Tree-walking evaluation of generated expressions.

use compass_core::{BinaryOp, Constant, Expr, MathFn, UnaryOp};

use crate::environment::{Environment, Frame};
use crate::types::{EvalError, Value};

/// Evaluate `expr` against `env` with parameters bound by `frame`.
pub fn eval_expr(expr: &Expr, env: &dyn Environment, frame: &Frame<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Number { value } => Ok(Value::Number(*value)),
        Expr::Text { value } => Ok(Value::Text(value.clone())),
        Expr::Bool { value } => Ok(Value::Bool(*value)),
        Expr::Constant {
            constant: Constant::Pi,
        } => Ok(Value::Number(std::f64::consts::PI)),
        Expr::Param { name } => frame.get(name).cloned(),
        Expr::Reference { name } => env.reference(name),
        Expr::Observe { target, observer } => env.observe(target, *observer),
        Expr::FreeValue { name } => env.free_value(name),
        Expr::Group { inner } => eval_expr(inner, env, frame),

        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, env, frame)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                UnaryOp::Negate => Ok(Value::Number(-v.as_number()?)),
                UnaryOp::ToNumber => Ok(Value::Number(v.to_number())),
            }
        }

        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, env, frame)?;
            // Logical operators short-circuit.
            match op {
                BinaryOp::And if !l.truthy() => return Ok(Value::Bool(false)),
                BinaryOp::Or if l.truthy() => return Ok(Value::Bool(true)),
                _ => {}
            }
            let r = eval_expr(right, env, frame)?;
            eval_binary(*op, l, r)
        }

        Expr::Call { func, args } => {
            let mut nums = Vec::with_capacity(args.len());
            for arg in args {
                nums.push(eval_expr(arg, env, frame)?.as_number()?);
            }
            Ok(Value::Number(eval_call(*func, &nums)))
        }
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    let v = match op {
        BinaryOp::Concat => Value::Text(format!("{}{}", l, r)),
        BinaryOp::Add => match (&l, &r) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::Text(format!("{}{}", l, r)),
            _ => Value::Number(l.as_number()? + r.as_number()?),
        },
        BinaryOp::Sub => Value::Number(l.as_number()? - r.as_number()?),
        BinaryOp::Mul => Value::Number(l.as_number()? * r.as_number()?),
        BinaryOp::Div => Value::Number(l.as_number()? / r.as_number()?),
        BinaryOp::And | BinaryOp::Or => Value::Bool(r.truthy()),
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (&l, &r) {
                (Value::Text(a), Value::Text(b)) => a == b,
                _ => l.as_number()? == r.as_number()?,
            };
            Value::Bool(if op == BinaryOp::Eq { equal } else { !equal })
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
                _ => l.as_number()?.partial_cmp(&r.as_number()?),
            };
            let holds = match ordering {
                None => false,
                Some(o) => match op {
                    BinaryOp::Lt => o.is_lt(),
                    BinaryOp::Le => o.is_le(),
                    BinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            };
            Value::Bool(holds)
        }
    };
    Ok(v)
}

fn eval_call(func: MathFn, args: &[f64]) -> f64 {
    let a = args.first().copied().unwrap_or(f64::NAN);
    match func {
        MathFn::Abs => a.abs(),
        MathFn::Acos => a.acos(),
        MathFn::Asin => a.asin(),
        MathFn::Atan => a.atan(),
        MathFn::Ceil => a.ceil(),
        MathFn::Cos => a.cos(),
        MathFn::Exp => a.exp(),
        MathFn::Floor => a.floor(),
        MathFn::Log => a.ln(),
        MathFn::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        MathFn::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
        MathFn::Pow => a.powf(args.get(1).copied().unwrap_or(f64::NAN)),
        MathFn::Random => rand::random::<f64>(),
        // Halves round toward positive infinity.
        MathFn::Round => (a + 0.5).floor(),
        MathFn::Sin => a.sin(),
        MathFn::Sqrt => a.sqrt(),
        MathFn::Tan => a.tan(),
    }
}
