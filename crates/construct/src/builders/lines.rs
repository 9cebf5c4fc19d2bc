//! Straight objects: lines, segments, rays, vectors, polygons.

use super::{parse_number, BuildError, BuildRequest, Built};
use crate::interpret::InterpreterContext;
use crate::registry::{Binding, ObjectClass, SceneObject};
use crate::scene::{Parent, SubObjects};

/// `segment`, `line` and `ray` through two objects.
pub fn through_two(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "two points")?;
    let parents = req.objects(0..2)?;
    ctx.create(req.tag, &parents, &req.attributes, ObjectClass::Line)
        .map(Built::object)
}

/// A vector between two points, or the position vector of one.
pub fn vector(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[1, 2], "one or two points")?;
    let parents = req.objects(0..req.inputs.len())?;
    ctx.create("vector", &parents, &req.attributes, ObjectClass::Vector)
        .map(Built::object)
}

/// The line through a point perpendicular to a line.
pub fn orthogonal(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "a point and a line")?;
    let parents = req.objects(0..2)?;
    ctx.create("orthogonalline", &parents, &req.attributes, ObjectClass::Line)
        .map(Built::object)
}

/// Perpendicular bisector of two points or of a segment.
pub fn bisector(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[1, 2], "two points or a segment")?;
    let parents = req.objects(0..req.inputs.len())?;
    ctx.create("linebisector", &parents, &req.attributes, ObjectClass::Line)
        .map(Built::object)
}

/// Bisector of the angle at the middle of three points.
pub fn angular_bisector(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[3], "three points")?;
    let parents = req.objects(0..3)?;
    ctx.create("angularbisector", &parents, &req.attributes, ObjectClass::Line)
        .map(Built::object)
}

/// Polar line of a point with respect to a circle.
pub fn polar(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "a point and a circle")?;
    let parents = req.objects(0..2)?;
    ctx.create("polar", &parents, &req.attributes, ObjectClass::Line)
        .map(Built::object)
}

/// Tangents from a point to a circle, one per output.
pub fn tangent(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    req.arity(&[2], "a point and a circle")?;
    let pair = req.objects(0..2)?;
    let mut built = Built::object(tangent_line(ctx, req, &pair, 0.0, req.name)?);
    if let Some(second) = req.outputs.get(1) {
        let binding = match tangent_line(ctx, req, &pair, 1.0, second) {
            Ok(object) => Binding::object(object),
            Err(err) => ctx.failed_extra(second, "tangent", err),
        };
        built = built.with_extra(second, binding);
    }
    Ok(built)
}

fn tangent_line(
    ctx: &mut InterpreterContext<'_>,
    req: &BuildRequest<'_>,
    pair: &[Parent],
    branch: f64,
    name: &str,
) -> Result<SceneObject, BuildError> {
    let attrs = if name == req.name {
        req.attributes.clone()
    } else {
        ctx.attributes_for(name, "line")
    };
    let parents = [pair[0].clone(), pair[1].clone(), Parent::Number(branch)];
    ctx.create("tangent", &parents, &attrs, ObjectClass::Line)
}

/// A polygon through its vertices, or the regular polygon `(A, B, n)`.
///
/// Outputs after the first name the borders in vertex order, then any
/// vertices the regular form creates.
pub fn polygon(ctx: &mut InterpreterContext<'_>, req: &BuildRequest<'_>) -> Result<Built, BuildError> {
    let regular = req.inputs.len() == 3
        && req
            .literal(2)
            .and_then(parse_number)
            .is_some_and(|n| n.fract() == 0.0);

    let (tag, parents) = if regular {
        let mut parents = req.objects(0..2)?;
        parents.push(req.scalar(2)?);
        ("regularpolygon", parents)
    } else {
        if req.inputs.len() < 3 {
            return Err(BuildError::BadInputs {
                tag: req.tag.to_owned(),
                expected: "at least three points",
            });
        }
        ("polygon", req.objects(0..req.inputs.len())?)
    };

    let object = ctx.create(tag, &parents, &req.attributes, ObjectClass::Region)?;
    let handle = object.handle;
    let mut built = Built::object(object);

    let borders = ctx.scene().sub_objects(handle, SubObjects::Borders);
    let vertices = ctx.scene().sub_objects(handle, SubObjects::Vertices);
    let names = req.outputs.iter().skip(1);
    let named = borders
        .into_iter()
        .map(|h| (h, "segment", ObjectClass::Line))
        .chain(vertices.into_iter().map(|h| (h, "point", ObjectClass::Point)));
    for ((sub, sub_tag, class), name) in named.zip(names) {
        ctx.scene().name_object(sub, name)?;
        built = built.with_extra(name, Binding::object(SceneObject::new(sub, sub_tag, class)));
    }
    Ok(built)
}
