//! Circles, arcs, conics and function graphs.

use compass_core::{rewrite_params, split_definition};

use super::{BuildError, BuildRequest, Built};
use crate::interpret::InterpreterContext;
use crate::registry::ObjectClass;
use crate::scene::Parent;

/// A circle from center and point, center and radius, center and segment,
/// or through three points.
pub fn circle(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2, 3], "a center and a radius, or three points")?;
    let (tag, parents) = if req.inputs.len() == 3 {
        ("circumcircle", req.objects(0..3)?)
    } else {
        let center = Parent::Object(req.object(0)?.handle);
        let through = if req.is_object(1, ObjectClass::Point) || req.is_object(1, ObjectClass::Line) {
            Parent::Object(req.object(1)?.handle)
        } else {
            req.scalar(1)?
        };
        ("circle", vec![center, through])
    };
    ctx.create(tag, &parents, &req.attributes, ObjectClass::Circle)
        .map(Built::object)
}

/// `circlearc`, `circlesector` (center, start, end) and their
/// circumcircle forms (three points on the arc).
pub fn arc(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[3], "three points")?;
    let parents = req.objects(0..3)?;
    let class = if req.tag.ends_with("sector") {
        ObjectClass::Region
    } else {
        ObjectClass::Arc
    };
    ctx.create(req.tag, &parents, &req.attributes, class)
        .map(Built::object)
}

pub fn semicircle(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "two points")?;
    let parents = req.objects(0..2)?;
    ctx.create("semicircle", &parents, &req.attributes, ObjectClass::Arc)
        .map(Built::object)
}

/// Ellipse from two foci and a point on it, or two foci and the semi-major
/// axis.
pub fn ellipse(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[3], "two foci and a point or a semi-axis")?;
    let mut parents = req.objects(0..2)?;
    parents.push(if req.is_object(2, ObjectClass::Point) {
        Parent::Object(req.object(2)?.handle)
    } else {
        req.scalar(2)?
    });
    ctx.create("ellipse", &parents, &req.attributes, ObjectClass::Region)
        .map(Built::object)
}

/// Conic through five points.
pub fn conic(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[5], "five points")?;
    let parents = req.objects(0..5)?;
    ctx.create("conic", &parents, &req.attributes, ObjectClass::Curve)
        .map(Built::object)
}

/// Graph of a function.
///
/// The element expression `f(x, ..) = body` is split into parameters and
/// body. Without a definition, the first input (or the bare expression) is
/// a term in `x`. Two further inputs bound the domain.
pub fn function(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let expression = req.element.and_then(|e| e.expression.as_deref());
    let (params, body) = match expression.and_then(split_definition) {
        Some(definition) => (definition.params, definition.body),
        None => {
            let term = req
                .literal(0)
                .or(expression)
                .ok_or_else(|| BuildError::BadInputs {
                    tag: req.tag.to_owned(),
                    expected: "a definition or a term in x",
                })?;
            let params = vec!["x".to_owned()];
            let body = rewrite_params(term, &params);
            (params, body)
        }
    };

    let (term, references) = ctx.compile_scalar(req.name, &body, &params)?;
    let mut parents = vec![Parent::Function(term.clone())];
    if req.inputs.len() == 3 {
        parents.push(req.scalar(1)?);
        parents.push(req.scalar(2)?);
    }
    let object = ctx.create("functiongraph", &parents, &req.attributes, ObjectClass::Curve)?;
    Ok(Built::object(object)
        .with_definition(term)
        .with_dependencies(references))
}

/// Definite integral of a function graph between two bounds.
pub fn integral(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[3], "a function and two bounds")?;
    let parents = [
        Parent::Object(req.object(0)?.handle),
        req.scalar(1)?,
        req.scalar(2)?,
    ];
    ctx.create("integral", &parents, &req.attributes, ObjectClass::Value)
        .map(Built::object)
}
