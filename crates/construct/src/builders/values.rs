//! Numbers, booleans, measurements and texts.

use compass_core::{BinaryOp, Expr, MathFn, Observer};
use compass_eval::{Callable, Value};
use compass_interchange::StartPoint;

use super::{parse_number, BuildError, BuildRequest, Built, Resolved};
use crate::interpret::InterpreterContext;
use crate::registry::ObjectClass;
use crate::scene::Parent;

/// `numeric` and `boolean`. With a slider the value is a scene object;
/// otherwise it is a free value defined on the scene.
pub fn numeric(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let element = req.element;
    if let Some(slider) = element.and_then(|e| e.slider.as_ref()) {
        let start = element.and_then(|e| e.value).unwrap_or(slider.min);
        let parents = [
            Parent::Number(slider.min),
            Parent::Number(slider.max),
            Parent::Number(start.clamp(slider.min.min(slider.max), slider.max.max(slider.min))),
        ];
        return ctx
            .create("slider", &parents, &req.attributes, ObjectClass::Value)
            .map(Built::object);
    }

    let boolean = req.tag == "boolean";
    let constant = |v: f64| {
        Callable::constant(if boolean {
            Value::Bool(v != 0.0)
        } else {
            Value::Number(v)
        })
    };
    let (value, dependencies) = if let Some(source) = element.and_then(|e| e.expression.as_deref()) {
        ctx.compile_scalar(req.name, source, &[])?
    } else if let Some(v) = element.and_then(|e| e.value) {
        (constant(v), Vec::new())
    } else if let Some(text) = req.literal(0) {
        let v = parse_number(text).ok_or_else(|| BuildError::BadLiteral {
            text: text.to_owned(),
        })?;
        (constant(v), Vec::new())
    } else {
        return Err(BuildError::BadInputs {
            tag: req.tag.to_owned(),
            expected: "a value, an expression or a slider",
        });
    };

    ctx.scene().define_value(req.name, value.clone())?;
    Ok(Built::value(value).with_dependencies(dependencies))
}

/// Angle at the middle of three points, in radians.
pub fn angle(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[3], "three points")?;
    let parents = req.objects(0..3)?;
    ctx.create("angle", &parents, &req.attributes, ObjectClass::Value)
        .map(Built::object)
}

/// Distance between two points, bound to a generated expression over
/// their coordinates.
pub fn distance(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "two points")?;
    let parents = req.objects(0..2)?;
    for i in 0..2 {
        if !req.is_object(i, ObjectClass::Point) {
            return Err(BuildError::BadInputs {
                tag: req.tag.to_owned(),
                expected: "two points",
            });
        }
    }

    let expr = distance_expr(req.input_names[0], req.input_names[1]);
    let definition = ctx.callable(&expr, &[])?;
    let object = ctx.create("distance", &parents, &req.attributes, ObjectClass::Value)?;
    ctx.scene().bind_value(object.handle, definition.clone())?;
    Ok(Built::object(object).with_definition(definition))
}

fn distance_expr(a: &str, b: &str) -> Expr {
    let squared = |observer| {
        let delta = Expr::binary(
            BinaryOp::Sub,
            Expr::observe(a, observer),
            Expr::observe(b, observer),
        );
        Expr::call(MathFn::Pow, vec![delta, Expr::number(2.0)])
    };
    Expr::call(
        MathFn::Sqrt,
        vec![Expr::binary(
            BinaryOp::Add,
            squared(Observer::X),
            squared(Observer::Y),
        )],
    )
}

/// A text label. Content is the element's expression when it has one,
/// else its caption. It is anchored at `start_point`, else at its own
/// coordinates.
pub fn text(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let element = req.element.ok_or_else(|| BuildError::BadInputs {
        tag: req.tag.to_owned(),
        expected: "a text element",
    })?;

    let mut parents = Vec::with_capacity(3);
    let mut dependencies = Vec::new();
    match &element.start_point {
        Some(StartPoint::Expression { exp }) => match ctx.ensure_constructed(exp) {
            Resolved::Object(anchor) => {
                dependencies.push(exp.clone());
                parents.push(Parent::Object(anchor.handle));
            }
            _ => return Err(BuildError::MissingInput { name: exp.clone() }),
        },
        Some(StartPoint::Absolute(coords)) => {
            let (x, y) = coords.cartesian();
            parents.extend([Parent::Number(x), Parent::Number(y)]);
        }
        None => {
            let (x, y) = element.position().unwrap_or((0.0, 0.0));
            parents.extend([Parent::Number(x), Parent::Number(y)]);
        }
    }

    let mut definition = None;
    match element.expression.as_deref() {
        Some(source) => {
            let (content, references) = ctx.compile_scalar(req.name, source, &[])?;
            dependencies.extend(references);
            parents.push(Parent::Function(content.clone()));
            definition = Some(content);
        }
        None => {
            let caption = element.caption.as_deref().unwrap_or(&element.id);
            parents.push(Parent::Text(caption.to_owned()));
        }
    }

    let attrs = req.attributes.clone().with("digits", ctx.decimals());
    let object = ctx.create("text", &parents, &attrs, ObjectClass::Text)?;
    let built = Built::object(object).with_dependencies(dependencies);
    Ok(match definition {
        Some(definition) => built.with_definition(definition),
        None => built,
    })
}
