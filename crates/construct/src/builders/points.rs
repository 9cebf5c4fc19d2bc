//! Point-valued constructions.

use compass_core::ExprValue;

use super::{BuildError, BuildRequest, Built};
use crate::interpret::InterpreterContext;
use crate::registry::{Binding, ObjectClass};
use crate::scene::Parent;

/// A free point from coordinates, a point-valued expression such as
/// `(A + B) / 2`, or a point bound to an object (`Point(c)`).
pub fn point(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let position = req.element.and_then(|e| e.position());

    if !req.inputs.is_empty() {
        if let Ok(host) = req.object(0) {
            let (x, y) = position.unwrap_or((0.0, 0.0));
            let parents = [
                Parent::Object(host.handle),
                Parent::Number(x),
                Parent::Number(y),
            ];
            return ctx
                .create("glider", &parents, &req.attributes, ObjectClass::Point)
                .map(Built::object);
        }
        req.arity(&[2], "an object or two coordinates")?;
        let parents = [req.scalar(0)?, req.scalar(1)?];
        return ctx
            .create("point", &parents, &req.attributes, ObjectClass::Point)
            .map(Built::object);
    }

    if let Some(source) = req.element.and_then(|e| e.expression.as_deref()) {
        let compiled = ctx.compile(req.name, source)?;
        let ExprValue::Vector2 { x, y } = compiled.value else {
            return Err(BuildError::BadInputs {
                tag: req.tag.to_owned(),
                expected: "a point-valued expression",
            });
        };
        let parents = [
            Parent::Function(ctx.callable(&x, &[])?),
            Parent::Function(ctx.callable(&y, &[])?),
        ];
        let object = ctx.create("point", &parents, &req.attributes, ObjectClass::Point)?;
        return Ok(Built::object(object).with_dependencies(compiled.references));
    }

    let (x, y) = position.ok_or_else(|| BuildError::BadInputs {
        tag: req.tag.to_owned(),
        expected: "coordinates or an expression",
    })?;
    let parents = [Parent::Number(x), Parent::Number(y)];
    ctx.create("point", &parents, &req.attributes, ObjectClass::Point)
        .map(Built::object)
}

/// Midpoint of two points or of a segment.
pub fn midpoint(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[1, 2], "two points or a segment")?;
    let parents = req.objects(0..req.inputs.len())?;
    ctx.create("midpoint", &parents, &req.attributes, ObjectClass::Point)
        .map(Built::object)
}

/// Intersection points of two objects.
///
/// With an explicit branch index only that intersection is built. Otherwise
/// the first output is branch 0 and a second output, when present, is the
/// other intersection.
pub fn intersect(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2, 3], "two objects and an optional branch index")?;
    let pair = req.objects(0..2)?;

    if req.inputs.len() == 3 {
        let branch = match req.scalar(2)? {
            Parent::Number(n) if n >= 1.0 => n - 1.0,
            _ => {
                return Err(BuildError::BadInputs {
                    tag: req.tag.to_owned(),
                    expected: "a positive branch index",
                })
            }
        };
        let parents = [pair[0].clone(), pair[1].clone(), Parent::Number(branch)];
        return ctx
            .create("intersection", &parents, &req.attributes, ObjectClass::Point)
            .map(Built::object);
    }

    let parents = [pair[0].clone(), pair[1].clone(), Parent::Number(0.0)];
    let first = ctx.create("intersection", &parents, &req.attributes, ObjectClass::Point)?;
    let mut built = Built::object(first.clone());
    if let Some(other) = req.outputs.get(1) {
        let attrs = ctx.attributes_for(other, "point");
        let parents = [pair[0].clone(), pair[1].clone(), Parent::Object(first.handle)];
        let binding = match ctx.create("otherintersection", &parents, &attrs, ObjectClass::Point) {
            Ok(object) => Binding::object(object),
            Err(err) => ctx.failed_extra(other, "otherintersection", err),
        };
        built = built.with_extra(other, binding);
    }
    Ok(built)
}

/// Center of a circle, arc or conic.
pub fn center(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[1], "one circle")?;
    let parents = req.objects(0..1)?;
    ctx.create("center", &parents, &req.attributes, ObjectClass::Point)
        .map(Built::object)
}

/// `mirror`, `rotate`, `dilate` and `translate`. The image keeps the class
/// of the transformed object.
pub fn transform(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let source = req.object(0)?;
    let class = source.class;
    let mut parents = vec![Parent::Object(source.handle)];
    match req.tag {
        "mirror" | "translate" => {
            req.arity(&[2], "an object and a point, line or vector")?;
            parents.push(Parent::Object(req.object(1)?.handle));
        }
        _ => {
            req.arity(&[2, 3], "an object, an amount and an optional center")?;
            parents.push(req.scalar(1)?);
            if req.inputs.len() == 3 {
                parents.push(Parent::Object(req.object(2)?.handle));
            }
        }
    }
    ctx.create(req.tag, &parents, &req.attributes, class)
        .map(Built::object)
}

