//! An in-memory scene.
//!
//! [`MemoryScene`] stores every object with its parents and recomputes
//! geometry whenever an observer is read, so dependents follow their
//! parents. It backs the CLI `build` command and the integration tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use compass_core::Observer;
use compass_eval::{Callable, Environment, EvalError, Value};
use serde::Serialize;
use tracing::debug;

use crate::scene::{Attributes, ObjectHandle, Parent, SceneError, SceneFactory, SubObjects};

const EPSILON: f64 = 1e-9;
const MAX_DEPTH: usize = 64;
const SIMPSON_STEPS: usize = 200;
const MAX_CORNERS: f64 = 1000.0;

// ──────────────────────────────────────────────
// Plane helpers
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pt {
    x: f64,
    y: f64,
}

impl Pt {
    const ORIGIN: Pt = Pt { x: 0.0, y: 0.0 };

    fn new(x: f64, y: f64) -> Pt {
        Pt { x, y }
    }

    fn add(self, o: Pt) -> Pt {
        Pt::new(self.x + o.x, self.y + o.y)
    }

    fn sub(self, o: Pt) -> Pt {
        Pt::new(self.x - o.x, self.y - o.y)
    }

    fn scale(self, k: f64) -> Pt {
        Pt::new(self.x * k, self.y * k)
    }

    fn dot(self, o: Pt) -> f64 {
        self.x * o.x + self.y * o.y
    }

    fn cross(self, o: Pt) -> f64 {
        self.x * o.y - self.y * o.x
    }

    fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    fn dist(self, o: Pt) -> f64 {
        self.sub(o).norm()
    }

    fn perp(self) -> Pt {
        Pt::new(-self.y, self.x)
    }

    fn rotate(self, angle: f64) -> Pt {
        let (s, c) = angle.sin_cos();
        Pt::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    fn mid(self, o: Pt) -> Pt {
        self.add(o).scale(0.5)
    }
}

/// Reflection of `p` across the line through `a` and `b`.
fn reflect(p: Pt, a: Pt, b: Pt) -> Pt {
    let d = b.sub(a);
    let t = p.sub(a).dot(d) / d.dot(d);
    a.add(d.scale(t)).scale(2.0).sub(p)
}

fn circumcircle(a: Pt, b: Pt, c: Pt) -> Option<(Pt, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPSILON {
        return None;
    }
    let (a2, b2, c2) = (a.dot(a), b.dot(b), c.dot(c));
    let center = Pt::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    );
    Some((center, center.dist(a)))
}

fn line_line(a1: Pt, b1: Pt, a2: Pt, b2: Pt) -> Vec<Pt> {
    let (d1, d2) = (b1.sub(a1), b2.sub(a2));
    let denom = d1.cross(d2);
    if denom.abs() < EPSILON {
        return Vec::new();
    }
    let t = a2.sub(a1).cross(d2) / denom;
    vec![a1.add(d1.scale(t))]
}

fn line_circle(a: Pt, b: Pt, center: Pt, r: f64) -> Vec<Pt> {
    let d = b.sub(a);
    let f = a.sub(center);
    let (qa, qb, qc) = (d.dot(d), 2.0 * f.dot(d), f.dot(f) - r * r);
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < -EPSILON || qa < EPSILON {
        return Vec::new();
    }
    let root = disc.max(0.0).sqrt();
    [(-qb - root) / (2.0 * qa), (-qb + root) / (2.0 * qa)]
        .into_iter()
        .map(|t| a.add(d.scale(t)))
        .collect()
}

fn circle_circle(c1: Pt, r1: f64, c2: Pt, r2: f64) -> Vec<Pt> {
    let d = c1.dist(c2);
    if d < EPSILON || d > r1 + r2 + EPSILON || d < (r1 - r2).abs() - EPSILON {
        return Vec::new();
    }
    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    let axis = c2.sub(c1).scale(1.0 / d);
    let base = c1.add(axis.scale(a));
    vec![base.sub(axis.perp().scale(h)), base.add(axis.perp().scale(h))]
}

/// Corners of the regular polygon on edge `a`, `b`, counter-clockwise.
fn regular_corners(a: Pt, b: Pt, n: usize) -> Vec<Pt> {
    let mut corners = vec![a, b];
    let turn = TAU / n as f64;
    while corners.len() < n {
        let k = corners.len();
        let edge = corners[k - 1].sub(corners[k - 2]);
        corners.push(corners[k - 1].add(edge.rotate(turn)));
    }
    corners
}

fn shoelace(corners: &[Pt]) -> f64 {
    let n = corners.len();
    let twice: f64 = (0..n).map(|i| corners[i].cross(corners[(i + 1) % n])).sum();
    twice.abs() / 2.0
}

fn undefined(message: impl Into<String>) -> SceneError {
    SceneError::Eval(EvalError::Undefined {
        message: message.into(),
    })
}

fn degenerate(tag: &str, reason: &'static str) -> SceneError {
    SceneError::Degenerate {
        tag: tag.to_owned(),
        reason,
    }
}

// ──────────────────────────────────────────────
// Construction types
// ──────────────────────────────────────────────

enum Arity {
    OneOf(&'static [usize]),
    AtLeast(usize),
}

impl Arity {
    fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::OneOf(counts) => counts.contains(&n),
            Arity::AtLeast(min) => n >= *min,
        }
    }
}

fn arity(tag: &str) -> Option<(Arity, &'static str)> {
    use Arity::{AtLeast, OneOf};
    let entry = match tag {
        "point" | "segment" | "line" | "ray" | "orthogonalline" | "polar" | "mirror"
        | "translate" | "circle" | "semicircle" | "distance" | "vertex" => (OneOf(&[2]), "2"),
        "glider" | "intersection" | "otherintersection" | "angularbisector" | "tangent"
        | "regularpolygon" | "circumcircle" | "circlearc" | "circlesector"
        | "circumcirclearc" | "circumcirclesector" | "ellipse" | "integral" | "slider"
        | "angle" => (OneOf(&[3]), "3"),
        "midpoint" | "vector" | "linebisector" => (OneOf(&[1, 2]), "1 or 2"),
        "rotate" | "dilate" | "text" => (OneOf(&[2, 3]), "2 or 3"),
        "center" => (OneOf(&[1]), "1"),
        "axis" => (OneOf(&[4]), "4"),
        "conic" => (OneOf(&[5]), "5"),
        "functiongraph" => (OneOf(&[1, 3]), "1 or 3"),
        "polygon" => (AtLeast(3), "at least 3"),
        _ => return None,
    };
    Some(entry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Point,
    Line,
    Circle,
    Polygon,
    Value,
    Text,
    Other,
}

fn is_transform(tag: &str) -> bool {
    matches!(tag, "mirror" | "rotate" | "dilate" | "translate")
}

// ──────────────────────────────────────────────
// Scene
// ──────────────────────────────────────────────

/// One object owned by a [`MemoryScene`].
#[derive(Debug, Clone)]
pub struct SceneEntry {
    pub tag: String,
    pub name: Option<String>,
    pub parents: Vec<Parent>,
    pub attributes: Attributes,
    /// Defining function attached after creation.
    pub bound: Option<Callable>,
    borders: Vec<ObjectHandle>,
    vertices: Vec<ObjectHandle>,
}

/// Current readings of one object. Observers the object does not have are
/// left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryScene {
    objects: Vec<SceneEntry>,
    names: HashMap<String, ObjectHandle>,
    free_values: HashMap<String, Callable>,
    updates: usize,
    depth: Cell<usize>,
}

impl MemoryScene {
    pub fn new() -> Self {
        MemoryScene::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn entry(&self, handle: ObjectHandle) -> Option<&SceneEntry> {
        self.objects.get(handle.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.names.get(name).copied()
    }

    pub fn free_value_names(&self) -> impl Iterator<Item = &str> {
        self.free_values.keys().map(String::as_str)
    }

    /// Number of full updates received.
    pub fn full_updates(&self) -> usize {
        self.updates
    }

    pub fn measure(&self, handle: ObjectHandle) -> Measurements {
        let point = self.point(handle).ok();
        Measurements {
            x: point.map(|p| p.x),
            y: point.map(|p| p.y),
            value: self.value(handle).ok(),
            length: self.length(handle).ok(),
            area: self.area(handle).ok(),
            text: self.text(handle).ok(),
        }
    }

    fn get(&self, handle: ObjectHandle) -> Result<&SceneEntry, SceneError> {
        self.entry(handle).ok_or(SceneError::UnknownHandle(handle))
    }

    fn no(&self, handle: ObjectHandle, what: &'static str) -> SceneError {
        SceneError::NoGeometry {
            tag: self.entry(handle).map(|e| e.tag.clone()).unwrap_or_default(),
            handle,
            what,
        }
    }

    fn descend<T>(&self, f: impl FnOnce() -> Result<T, SceneError>) -> Result<T, SceneError> {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            return Err(undefined("evaluation nested too deeply"));
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }

    fn parent_object(&self, handle: ObjectHandle, index: usize) -> Result<ObjectHandle, SceneError> {
        let entry = self.get(handle)?;
        entry
            .parents
            .get(index)
            .and_then(Parent::as_object)
            .ok_or_else(|| SceneError::ParentKind {
                tag: entry.tag.clone(),
                index,
                expected: "an object",
            })
    }

    fn parent_point(&self, handle: ObjectHandle, index: usize) -> Result<Pt, SceneError> {
        self.point(self.parent_object(handle, index)?)
    }

    fn parent_number(&self, handle: ObjectHandle, index: usize) -> Result<f64, SceneError> {
        let entry = self.get(handle)?;
        let parent = entry.parents.get(index).ok_or_else(|| SceneError::ParentKind {
            tag: entry.tag.clone(),
            index,
            expected: "a number",
        })?;
        self.number(parent)
    }

    /// Numeric reading of any parent.
    fn number(&self, parent: &Parent) -> Result<f64, SceneError> {
        match parent {
            Parent::Number(n) => Ok(*n),
            Parent::Function(f) => Ok(f.call_number(self, &[])?),
            Parent::Object(h) => match self.shape(*h) {
                Shape::Line => self.length(*h),
                _ => self.value(*h),
            },
            Parent::Text(s) => s.trim().parse().map_err(|_| {
                SceneError::Eval(EvalError::TypeMismatch {
                    expected: "number".to_owned(),
                    got: "text".to_owned(),
                })
            }),
        }
    }

    fn shape(&self, handle: ObjectHandle) -> Shape {
        let Some(entry) = self.entry(handle) else {
            return Shape::Other;
        };
        match entry.tag.as_str() {
            "point" | "glider" | "midpoint" | "intersection" | "otherintersection" | "center"
            | "vertex" => Shape::Point,
            "segment" | "line" | "ray" | "vector" | "axis" | "orthogonalline" | "linebisector"
            | "angularbisector" | "polar" | "tangent" => Shape::Line,
            "circle" | "circumcircle" | "circlearc" | "circlesector" | "circumcirclearc"
            | "circumcirclesector" | "semicircle" => Shape::Circle,
            "polygon" | "regularpolygon" => Shape::Polygon,
            "slider" | "angle" | "distance" | "integral" => Shape::Value,
            "text" => Shape::Text,
            tag if is_transform(tag) => entry
                .parents
                .first()
                .and_then(Parent::as_object)
                .map_or(Shape::Other, |source| self.shape(source)),
            _ => Shape::Other,
        }
    }

    // ── Transforms ──

    fn transform_point(&self, handle: ObjectHandle, p: Pt) -> Result<Pt, SceneError> {
        let entry = self.get(handle)?;
        let center = |index: usize| -> Result<Pt, SceneError> {
            match entry.parents.get(index) {
                Some(_) => self.parent_point(handle, index),
                None => Ok(Pt::ORIGIN),
            }
        };
        match entry.tag.as_str() {
            "mirror" => {
                let axis = self.parent_object(handle, 1)?;
                match self.shape(axis) {
                    Shape::Point => Ok(self.point(axis)?.scale(2.0).sub(p)),
                    Shape::Line => {
                        let (a, b) = self.line(axis)?;
                        Ok(reflect(p, a, b))
                    }
                    _ => Err(self.no(axis, "mirror axis")),
                }
            }
            "rotate" => {
                let c = center(2)?;
                Ok(c.add(p.sub(c).rotate(self.parent_number(handle, 1)?)))
            }
            "dilate" => {
                let c = center(2)?;
                Ok(c.add(p.sub(c).scale(self.parent_number(handle, 1)?)))
            }
            "translate" => {
                let by = self.parent_object(handle, 1)?;
                let offset = match self.shape(by) {
                    Shape::Line => {
                        let (a, b) = self.line(by)?;
                        b.sub(a)
                    }
                    Shape::Point => self.point(by)?,
                    _ => return Err(self.no(by, "translation vector")),
                };
                Ok(p.add(offset))
            }
            _ => Ok(p),
        }
    }

    // ── Geometry ──

    fn point(&self, handle: ObjectHandle) -> Result<Pt, SceneError> {
        let entry = self.get(handle)?;
        match entry.tag.as_str() {
            "point" => Ok(Pt::new(
                self.parent_number(handle, 0)?,
                self.parent_number(handle, 1)?,
            )),
            "glider" => {
                let host = self.parent_object(handle, 0)?;
                let p = Pt::new(self.parent_number(handle, 1)?, self.parent_number(handle, 2)?);
                match self.shape(host) {
                    Shape::Line => {
                        let (a, b) = self.line(host)?;
                        let d = b.sub(a);
                        Ok(a.add(d.scale(p.sub(a).dot(d) / d.dot(d))))
                    }
                    Shape::Circle => {
                        let (c, r) = self.circle(host)?;
                        let offset = p.sub(c);
                        let norm = offset.norm();
                        if norm < EPSILON {
                            Ok(c.add(Pt::new(r, 0.0)))
                        } else {
                            Ok(c.add(offset.scale(r / norm)))
                        }
                    }
                    Shape::Point => self.point(host),
                    _ => Ok(p),
                }
            }
            "midpoint" => {
                if entry.parents.len() == 2 {
                    Ok(self.parent_point(handle, 0)?.mid(self.parent_point(handle, 1)?))
                } else {
                    let (a, b) = self.line(self.parent_object(handle, 0)?)?;
                    Ok(a.mid(b))
                }
            }
            "intersection" => {
                let points = self.intersections(handle)?;
                let branch = self.parent_number(handle, 2)?;
                points
                    .get(branch.max(0.0) as usize)
                    .copied()
                    .ok_or_else(|| undefined("the objects do not intersect"))
            }
            "otherintersection" => {
                let points = self.intersections(handle)?;
                let first = self.parent_point(handle, 2)?;
                points
                    .into_iter()
                    .max_by(|a, b| a.dist(first).total_cmp(&b.dist(first)))
                    .ok_or_else(|| undefined("the objects do not intersect"))
            }
            "center" => {
                let of = self.parent_object(handle, 0)?;
                match self.shape(of) {
                    Shape::Circle => Ok(self.circle(of)?.0),
                    Shape::Polygon => {
                        let corners = self.corners(of)?;
                        let sum = corners.iter().fold(Pt::ORIGIN, |acc, p| acc.add(*p));
                        Ok(sum.scale(1.0 / corners.len() as f64))
                    }
                    _ if self.get(of)?.tag == "ellipse" => {
                        Ok(self.parent_point(of, 0)?.mid(self.parent_point(of, 1)?))
                    }
                    _ => Err(self.no(of, "center")),
                }
            }
            "vertex" => {
                let polygon = self.parent_object(handle, 0)?;
                let index = self.parent_number(handle, 1)? as usize;
                self.corners(polygon)?
                    .get(index)
                    .copied()
                    .ok_or_else(|| self.no(polygon, "such vertex"))
            }
            "text" => match entry.parents.first() {
                Some(Parent::Object(anchor)) => self.point(*anchor),
                _ => Ok(Pt::new(
                    self.parent_number(handle, 0)?,
                    self.parent_number(handle, 1)?,
                )),
            },
            tag if is_transform(tag) && self.shape(handle) == Shape::Point => {
                let source = self.parent_point(handle, 0)?;
                self.transform_point(handle, source)
            }
            _ => Err(self.no(handle, "position")),
        }
    }

    /// Candidate intersection points of an intersection's first two parents.
    fn intersections(&self, handle: ObjectHandle) -> Result<Vec<Pt>, SceneError> {
        let (a, b) = (self.parent_object(handle, 0)?, self.parent_object(handle, 1)?);
        match (self.shape(a), self.shape(b)) {
            (Shape::Line, Shape::Line) => {
                let ((a1, b1), (a2, b2)) = (self.line(a)?, self.line(b)?);
                Ok(line_line(a1, b1, a2, b2))
            }
            (Shape::Line, Shape::Circle) => {
                let ((p, q), (c, r)) = (self.line(a)?, self.circle(b)?);
                Ok(line_circle(p, q, c, r))
            }
            (Shape::Circle, Shape::Line) => {
                let ((c, r), (p, q)) = (self.circle(a)?, self.line(b)?);
                Ok(line_circle(p, q, c, r))
            }
            (Shape::Circle, Shape::Circle) => {
                let ((c1, r1), (c2, r2)) = (self.circle(a)?, self.circle(b)?);
                Ok(circle_circle(c1, r1, c2, r2))
            }
            (Shape::Line | Shape::Circle, _) => Err(self.no(b, "intersectable curve")),
            _ => Err(self.no(a, "intersectable curve")),
        }
    }

    /// Two distinct points on a straight object, in its direction.
    fn line(&self, handle: ObjectHandle) -> Result<(Pt, Pt), SceneError> {
        let entry = self.get(handle)?;
        match entry.tag.as_str() {
            "segment" | "line" | "ray" => {
                Ok((self.parent_point(handle, 0)?, self.parent_point(handle, 1)?))
            }
            "vector" => {
                if entry.parents.len() == 2 {
                    Ok((self.parent_point(handle, 0)?, self.parent_point(handle, 1)?))
                } else {
                    Ok((Pt::ORIGIN, self.parent_point(handle, 0)?))
                }
            }
            "axis" => {
                let origin = Pt::new(self.parent_number(handle, 0)?, self.parent_number(handle, 1)?);
                let d = Pt::new(self.parent_number(handle, 2)?, self.parent_number(handle, 3)?);
                Ok((origin, origin.add(d)))
            }
            "orthogonalline" => {
                let p = self.parent_point(handle, 0)?;
                let (a, b) = self.line(self.parent_object(handle, 1)?)?;
                Ok((p, p.add(b.sub(a).perp())))
            }
            "linebisector" => {
                let (a, b) = if entry.parents.len() == 2 {
                    (self.parent_point(handle, 0)?, self.parent_point(handle, 1)?)
                } else {
                    self.line(self.parent_object(handle, 0)?)?
                };
                let m = a.mid(b);
                Ok((m, m.add(b.sub(a).perp())))
            }
            "angularbisector" => {
                let (a, b, c) = (
                    self.parent_point(handle, 0)?,
                    self.parent_point(handle, 1)?,
                    self.parent_point(handle, 2)?,
                );
                let (u, v) = (a.sub(b), c.sub(b));
                let (lu, lv) = (u.norm(), v.norm());
                if lu < EPSILON || lv < EPSILON {
                    return Err(degenerate(&entry.tag, "coincident defining points"));
                }
                let (u, v) = (u.scale(1.0 / lu), v.scale(1.0 / lv));
                let mut dir = u.add(v);
                if dir.norm() < EPSILON {
                    dir = u.perp();
                }
                Ok((b, b.add(dir)))
            }
            "polar" => {
                let p = self.parent_point(handle, 0)?;
                let (c, r) = self.circle(self.parent_object(handle, 1)?)?;
                let d = p.sub(c);
                let k = d.dot(d);
                if k < EPSILON {
                    return Err(degenerate(&entry.tag, "pole at the center"));
                }
                let foot = c.add(d.scale(r * r / k));
                Ok((foot, foot.add(d.perp())))
            }
            "tangent" => {
                let p = self.parent_point(handle, 0)?;
                let (c, r) = self.circle(self.parent_object(handle, 1)?)?;
                let d = p.dist(c);
                if d < r - EPSILON {
                    return Err(degenerate(&entry.tag, "point inside the circle"));
                }
                if (d - r).abs() <= EPSILON {
                    return Ok((p, p.add(p.sub(c).perp())));
                }
                let spread = (r / d).acos();
                let branch = if self.parent_number(handle, 2)? >= 1.0 {
                    -spread
                } else {
                    spread
                };
                let touch = c.add(Pt::new(r, 0.0).rotate(p.sub(c).angle() + branch));
                Ok((p, touch))
            }
            tag if is_transform(tag) && self.shape(handle) == Shape::Line => {
                let (a, b) = self.line(self.parent_object(handle, 0)?)?;
                Ok((self.transform_point(handle, a)?, self.transform_point(handle, b)?))
            }
            _ => Err(self.no(handle, "line")),
        }
    }

    /// Center and radius of a circle or circular arc.
    fn circle(&self, handle: ObjectHandle) -> Result<(Pt, f64), SceneError> {
        let entry = self.get(handle)?;
        match entry.tag.as_str() {
            "circle" => {
                let c = self.parent_point(handle, 0)?;
                let r = match &entry.parents[1] {
                    Parent::Object(through) if self.shape(*through) == Shape::Point => {
                        c.dist(self.point(*through)?)
                    }
                    other => self.number(other)?,
                };
                Ok((c, r))
            }
            "circumcircle" | "circumcirclearc" | "circumcirclesector" => circumcircle(
                self.parent_point(handle, 0)?,
                self.parent_point(handle, 1)?,
                self.parent_point(handle, 2)?,
            )
            .ok_or_else(|| degenerate(&entry.tag, "collinear points")),
            "circlearc" | "circlesector" => {
                let c = self.parent_point(handle, 0)?;
                Ok((c, c.dist(self.parent_point(handle, 1)?)))
            }
            "semicircle" => {
                let (a, b) = (self.parent_point(handle, 0)?, self.parent_point(handle, 1)?);
                Ok((a.mid(b), a.dist(b) / 2.0))
            }
            tag if is_transform(tag) && self.shape(handle) == Shape::Circle => {
                let (c, r) = self.circle(self.parent_object(handle, 0)?)?;
                let r = if tag == "dilate" {
                    r * self.parent_number(handle, 1)?.abs()
                } else {
                    r
                };
                Ok((self.transform_point(handle, c)?, r))
            }
            _ => Err(self.no(handle, "circle")),
        }
    }

    /// Counter-clockwise sweep of an arc, in radians.
    fn sweep(&self, handle: ObjectHandle) -> Result<f64, SceneError> {
        let entry = self.get(handle)?;
        let (c, _) = self.circle(handle)?;
        let angle_of = |index| -> Result<f64, SceneError> {
            Ok(self.parent_point(handle, index)?.sub(c).angle())
        };
        match entry.tag.as_str() {
            "circlearc" | "circlesector" => Ok((angle_of(2)? - angle_of(1)?).rem_euclid(TAU)),
            "circumcirclearc" | "circumcirclesector" => {
                let start = angle_of(0)?;
                let through = (angle_of(1)? - start).rem_euclid(TAU);
                let end = (angle_of(2)? - start).rem_euclid(TAU);
                Ok(if through <= end { end } else { TAU - end })
            }
            "semicircle" => Ok(PI),
            "circle" | "circumcircle" => Ok(TAU),
            tag if is_transform(tag) => self.sweep(self.parent_object(handle, 0)?),
            _ => Err(self.no(handle, "arc")),
        }
    }

    fn corners(&self, handle: ObjectHandle) -> Result<Vec<Pt>, SceneError> {
        let entry = self.get(handle)?;
        match entry.tag.as_str() {
            "polygon" => (0..entry.parents.len())
                .map(|i| self.parent_point(handle, i))
                .collect(),
            "regularpolygon" => {
                let n = self.parent_number(handle, 2)?.round();
                if n.is_nan() || n < 3.0 {
                    return Err(degenerate(&entry.tag, "fewer than three corners"));
                }
                if n > MAX_CORNERS {
                    return Err(degenerate(&entry.tag, "too many corners"));
                }
                let (a, b) = (self.parent_point(handle, 0)?, self.parent_point(handle, 1)?);
                if a.dist(b) < EPSILON {
                    return Err(degenerate(&entry.tag, "coincident defining points"));
                }
                Ok(regular_corners(a, b, n as usize))
            }
            tag if is_transform(tag) && self.shape(handle) == Shape::Polygon => self
                .corners(self.parent_object(handle, 0)?)?
                .into_iter()
                .map(|p| self.transform_point(handle, p))
                .collect(),
            _ => Err(self.no(handle, "corners")),
        }
    }

    fn area(&self, handle: ObjectHandle) -> Result<f64, SceneError> {
        let entry = self.get(handle)?;
        match (self.shape(handle), entry.tag.as_str()) {
            (Shape::Polygon, _) => Ok(shoelace(&self.corners(handle)?)),
            (Shape::Circle, tag) if !tag.ends_with("arc") && !self.is_arc_transform(handle) => {
                let (_, r) = self.circle(handle)?;
                Ok(r * r * self.sweep(handle)? / 2.0)
            }
            (_, "ellipse") => {
                let (f1, f2) = (self.parent_point(handle, 0)?, self.parent_point(handle, 1)?);
                let semi_major = match &entry.parents[2] {
                    Parent::Object(on) if self.shape(*on) == Shape::Point => {
                        let p = self.point(*on)?;
                        (p.dist(f1) + p.dist(f2)) / 2.0
                    }
                    other => self.number(other)?,
                };
                let focal = f1.dist(f2) / 2.0;
                if semi_major <= focal {
                    return Err(degenerate(&entry.tag, "semi-axis shorter than the focal distance"));
                }
                let semi_minor = (semi_major * semi_major - focal * focal).sqrt();
                Ok(PI * semi_major * semi_minor)
            }
            _ => Err(self.no(handle, "area")),
        }
    }

    fn is_arc_transform(&self, handle: ObjectHandle) -> bool {
        let mut current = handle;
        while let Some(entry) = self.entry(current) {
            if !is_transform(&entry.tag) {
                return entry.tag.ends_with("arc");
            }
            match entry.parents.first().and_then(Parent::as_object) {
                Some(source) => current = source,
                None => return false,
            }
        }
        false
    }

    fn length(&self, handle: ObjectHandle) -> Result<f64, SceneError> {
        let entry = self.get(handle)?;
        let base = if is_transform(&entry.tag) {
            self.base_tag(handle)
        } else {
            entry.tag.as_str()
        };
        match (self.shape(handle), base) {
            (Shape::Line, "segment" | "vector") => {
                let (a, b) = self.line(handle)?;
                Ok(a.dist(b))
            }
            (Shape::Circle, _) => {
                let (_, r) = self.circle(handle)?;
                Ok(r * self.sweep(handle)?)
            }
            (Shape::Polygon, _) => {
                let corners = self.corners(handle)?;
                let n = corners.len();
                Ok((0..n).map(|i| corners[i].dist(corners[(i + 1) % n])).sum())
            }
            _ => Err(self.no(handle, "length")),
        }
    }

    fn base_tag(&self, handle: ObjectHandle) -> &str {
        let mut current = handle;
        while let Some(entry) = self.entry(current) {
            match entry.parents.first().and_then(Parent::as_object) {
                Some(source) if is_transform(&entry.tag) => current = source,
                _ => return &entry.tag,
            }
        }
        ""
    }

    fn direction(&self, handle: ObjectHandle) -> Result<Pt, SceneError> {
        match self.shape(handle) {
            Shape::Line => {
                let (a, b) = self.line(handle)?;
                Ok(b.sub(a))
            }
            _ => Err(self.no(handle, "direction")),
        }
    }

    fn value(&self, handle: ObjectHandle) -> Result<f64, SceneError> {
        let entry = self.get(handle)?;
        if let Some(bound) = &entry.bound {
            return Ok(bound.call_number(self, &[])?);
        }
        match entry.tag.as_str() {
            "slider" => self.parent_number(handle, 2),
            "angle" => {
                let (a, b, c) = (
                    self.parent_point(handle, 0)?,
                    self.parent_point(handle, 1)?,
                    self.parent_point(handle, 2)?,
                );
                Ok((c.sub(b).angle() - a.sub(b).angle()).rem_euclid(TAU))
            }
            "distance" => Ok(self.parent_point(handle, 0)?.dist(self.parent_point(handle, 1)?)),
            "integral" => self.integral(handle),
            "text" => self
                .text(handle)?
                .trim()
                .parse()
                .map_err(|_| self.no(handle, "numeric value")),
            _ => Err(self.no(handle, "value")),
        }
    }

    /// Simpson's rule over the graph's defining function.
    fn integral(&self, handle: ObjectHandle) -> Result<f64, SceneError> {
        let graph = self.parent_object(handle, 0)?;
        let f = match self.get(graph)? {
            SceneEntry { tag, parents, .. } if tag == "functiongraph" => match parents.first() {
                Some(Parent::Function(f)) => f,
                _ => return Err(self.no(graph, "function term")),
            },
            _ => return Err(self.no(graph, "function term")),
        };
        let (a, b) = (self.parent_number(handle, 1)?, self.parent_number(handle, 2)?);
        let h = (b - a) / SIMPSON_STEPS as f64;
        let mut sum = f.call_number(self, &[a])? + f.call_number(self, &[b])?;
        for i in 1..SIMPSON_STEPS {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * f.call_number(self, &[a + h * i as f64])?;
        }
        Ok(sum * h / 3.0)
    }

    fn text(&self, handle: ObjectHandle) -> Result<String, SceneError> {
        let entry = self.get(handle)?;
        if entry.tag != "text" {
            return Err(self.no(handle, "text"));
        }
        let digits = entry
            .attributes
            .get("digits")
            .and_then(|d| d.as_u64())
            .unwrap_or(2) as usize;
        match entry.parents.last() {
            Some(Parent::Text(s)) => Ok(s.clone()),
            Some(Parent::Function(f)) => Ok(match f.call(self, &[])? {
                Value::Number(n) => format!("{:.*}", digits, n),
                other => other.to_string(),
            }),
            Some(Parent::Number(n)) => Ok(format!("{:.*}", digits, n)),
            _ => Err(self.no(handle, "text")),
        }
    }

    fn read(&self, handle: ObjectHandle, observer: Observer) -> Result<Value, SceneError> {
        self.descend(|| match observer {
            Observer::X => Ok(Value::Number(self.point(handle)?.x)),
            Observer::Y => Ok(Value::Number(self.point(handle)?.y)),
            Observer::Value => Ok(Value::Number(self.value(handle)?)),
            Observer::Area => Ok(Value::Number(self.area(handle)?)),
            Observer::Length => Ok(Value::Number(self.length(handle)?)),
            Observer::DirectionX => Ok(Value::Number(self.direction(handle)?.x)),
            Observer::DirectionY => Ok(Value::Number(self.direction(handle)?.y)),
            Observer::Text => Ok(Value::Text(self.text(handle)?)),
            Observer::Name => self
                .get(handle)?
                .name
                .clone()
                .map(Value::Text)
                .ok_or_else(|| self.no(handle, "name")),
        })
    }

    /// Rejects configurations that have no geometry at all.
    fn check(&self, handle: ObjectHandle) -> Result<(), SceneError> {
        let entry = self.get(handle)?;
        let tag = entry.tag.as_str();
        let probe = match self.shape(handle) {
            Shape::Point => self.point(handle).map(drop),
            Shape::Line => self.line(handle).and_then(|(a, b)| {
                if a.dist(b) < EPSILON {
                    Err(degenerate(tag, "coincident defining points"))
                } else {
                    Ok(())
                }
            }),
            Shape::Circle => self.circle(handle).and_then(|(_, r)| {
                if r.is_nan() || r <= 0.0 {
                    Err(degenerate(tag, "non-positive radius"))
                } else {
                    Ok(())
                }
            }),
            Shape::Polygon => self.corners(handle).map(drop),
            Shape::Value | Shape::Text | Shape::Other => Ok(()),
        };
        match probe {
            Err(
                err @ (SceneError::Degenerate { .. }
                | SceneError::ParentKind { .. }
                | SceneError::NoGeometry { .. }),
            ) => Err(err),
            _ => Ok(()),
        }
    }

    fn push(&mut self, tag: &str, parents: Vec<Parent>, attributes: Attributes) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(SceneEntry {
            tag: tag.to_owned(),
            name: None,
            parents,
            attributes,
            bound: None,
            borders: Vec::new(),
            vertices: Vec::new(),
        });
        handle
    }

    /// Corner objects and border segments of a new polygon.
    fn attach_polygon_parts(&mut self, polygon: ObjectHandle) -> Result<(), SceneError> {
        let entry = self.get(polygon)?;
        let mut corners: Vec<ObjectHandle> = Vec::new();
        let mut vertices = Vec::new();
        if entry.tag == "regularpolygon" {
            let n = self.corners(polygon)?.len();
            corners.push(self.parent_object(polygon, 0)?);
            corners.push(self.parent_object(polygon, 1)?);
            for i in 2..n {
                let vertex = self.push(
                    "vertex",
                    vec![Parent::Object(polygon), Parent::Number(i as f64)],
                    Attributes::new(),
                );
                corners.push(vertex);
                vertices.push(vertex);
            }
        } else {
            corners = entry.parents.iter().filter_map(Parent::as_object).collect();
        }

        let borders = (0..corners.len())
            .map(|i| {
                let ends = vec![
                    Parent::Object(corners[i]),
                    Parent::Object(corners[(i + 1) % corners.len()]),
                ];
                self.push("segment", ends, Attributes::new())
            })
            .collect();

        let entry = &mut self.objects[polygon.0 as usize];
        entry.borders = borders;
        entry.vertices = vertices;
        Ok(())
    }
}

impl SceneFactory for MemoryScene {
    fn create(
        &mut self,
        tag: &str,
        parents: &[Parent],
        attributes: &Attributes,
    ) -> Result<ObjectHandle, SceneError> {
        let (expected, description) = arity(tag).ok_or_else(|| SceneError::UnknownType {
            tag: tag.to_owned(),
        })?;
        if !expected.accepts(parents.len()) {
            return Err(SceneError::Arity {
                tag: tag.to_owned(),
                expected: description,
                got: parents.len(),
            });
        }
        if let Some(missing) = parents
            .iter()
            .filter_map(Parent::as_object)
            .find(|h| self.entry(*h).is_none())
        {
            return Err(SceneError::UnknownHandle(missing));
        }

        let handle = self.push(tag, parents.to_vec(), attributes.clone());
        if let Err(err) = self.check(handle) {
            self.objects.pop();
            debug!(tag, error = %err, "rejected construction");
            return Err(err);
        }
        if matches!(tag, "polygon" | "regularpolygon") {
            self.attach_polygon_parts(handle)?;
        }
        if let Some(name) = attributes.name() {
            self.name_object(handle, name)?;
        }
        Ok(handle)
    }

    fn name_object(&mut self, handle: ObjectHandle, name: &str) -> Result<(), SceneError> {
        let entry = self
            .objects
            .get_mut(handle.0 as usize)
            .ok_or(SceneError::UnknownHandle(handle))?;
        entry.name = Some(name.to_owned());
        self.names.insert(name.to_owned(), handle);
        Ok(())
    }

    fn sub_objects(&self, handle: ObjectHandle, which: SubObjects) -> Vec<ObjectHandle> {
        self.entry(handle)
            .map(|entry| match which {
                SubObjects::Borders => entry.borders.clone(),
                SubObjects::Vertices => entry.vertices.clone(),
            })
            .unwrap_or_default()
    }

    fn define_value(&mut self, name: &str, value: Callable) -> Result<(), SceneError> {
        self.free_values.insert(name.to_owned(), value);
        Ok(())
    }

    fn bind_value(&mut self, handle: ObjectHandle, value: Callable) -> Result<(), SceneError> {
        let entry = self
            .objects
            .get_mut(handle.0 as usize)
            .ok_or(SceneError::UnknownHandle(handle))?;
        entry.bound = Some(value);
        Ok(())
    }

    fn full_update(&mut self) {
        self.updates += 1;
        debug!(objects = self.objects.len(), "full update");
    }
}

impl Environment for MemoryScene {
    fn observe(&self, name: &str, observer: Observer) -> Result<Value, EvalError> {
        let handle = self.by_name(name).ok_or_else(|| EvalError::UnknownObject {
            name: name.to_owned(),
        })?;
        self.read(handle, observer).map_err(|err| match err {
            SceneError::Eval(inner) => inner,
            SceneError::NoGeometry { .. } => EvalError::MissingObserver {
                name: name.to_owned(),
                observer: observer.method().to_owned(),
            },
            other => EvalError::Undefined {
                message: other.to_string(),
            },
        })
    }

    fn free_value(&self, name: &str) -> Result<Value, EvalError> {
        match self.free_values.get(name) {
            Some(value) => self
                .descend(|| value.call(self, &[]).map_err(SceneError::from))
                .map_err(|err| match err {
                    SceneError::Eval(inner) => inner,
                    other => EvalError::Undefined {
                        message: other.to_string(),
                    },
                }),
            None => self.observe(name, Observer::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use compass_core::{BinaryOp, Expr};
    use compass_eval::{CodeHost, TreeHost};

    use super::*;

    fn named(name: &str) -> Attributes {
        Attributes::new().with("name", name)
    }

    fn point(scene: &mut MemoryScene, name: &str, x: f64, y: f64) -> ObjectHandle {
        scene
            .create("point", &[Parent::Number(x), Parent::Number(y)], &named(name))
            .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn midpoint_follows_its_parents() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 1.0, 2.0);
        let b = point(&mut scene, "B", 3.0, 4.0);
        let m = scene
            .create("midpoint", &[Parent::Object(a), Parent::Object(b)], &named("M"))
            .unwrap();
        let reading = scene.measure(m);
        assert_eq!((reading.x, reading.y), (Some(2.0), Some(3.0)));
        assert_eq!(scene.observe("M", Observer::Y).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn degenerate_segments_are_rejected() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 1.0, 1.0);
        let b = point(&mut scene, "B", 1.0, 1.0);
        let err = scene
            .create("segment", &[Parent::Object(a), Parent::Object(b)], &named("s"))
            .unwrap_err();
        assert!(matches!(err, SceneError::Degenerate { .. }));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.by_name("s"), None);
    }

    #[test]
    fn unknown_tags_and_wrong_arity_fail() {
        let mut scene = MemoryScene::new();
        assert!(matches!(
            scene.create("hyperboloid", &[], &Attributes::new()),
            Err(SceneError::UnknownType { .. })
        ));
        assert_eq!(
            scene
                .create("segment", &[Parent::Number(1.0)], &Attributes::new())
                .unwrap_err()
                .to_string(),
            "'segment' expects 2 parents, got 1"
        );
        assert!(matches!(
            scene.create("center", &[Parent::Object(ObjectHandle(9))], &Attributes::new()),
            Err(SceneError::UnknownHandle(ObjectHandle(9)))
        ));
    }

    #[test]
    fn polygons_create_borders_and_measure_area() {
        let mut scene = MemoryScene::new();
        let corners: Vec<Parent> = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Parent::Object(point(&mut scene, &format!("P{i}"), *x, *y)))
            .collect();
        let poly = scene.create("polygon", &corners, &named("poly")).unwrap();
        assert_eq!(scene.sub_objects(poly, SubObjects::Borders).len(), 4);
        assert!(scene.sub_objects(poly, SubObjects::Vertices).is_empty());
        assert!(close(scene.area(poly).unwrap(), 4.0));
        assert!(close(scene.length(poly).unwrap(), 8.0));
    }

    #[test]
    fn regular_polygons_create_their_missing_corners() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 0.0, 0.0);
        let b = point(&mut scene, "B", 1.0, 0.0);
        let square = scene
            .create(
                "regularpolygon",
                &[Parent::Object(a), Parent::Object(b), Parent::Number(4.0)],
                &named("sq"),
            )
            .unwrap();
        let vertices = scene.sub_objects(square, SubObjects::Vertices);
        assert_eq!(vertices.len(), 2);
        let c = scene.measure(vertices[0]);
        let d = scene.measure(vertices[1]);
        assert!(close(c.x.unwrap(), 1.0) && close(c.y.unwrap(), 1.0));
        assert!(close(d.x.unwrap(), 0.0) && close(d.y.unwrap(), 1.0));
        assert!(close(scene.area(square).unwrap(), 1.0));
    }

    #[test]
    fn regular_polygons_need_three_corners() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 0.0, 0.0);
        let b = point(&mut scene, "B", 1.0, 0.0);
        let err = scene
            .create(
                "regularpolygon",
                &[Parent::Object(a), Parent::Object(b), Parent::Number(2.0)],
                &Attributes::new(),
            )
            .unwrap_err();
        assert!(matches!(err, SceneError::Degenerate { .. }));
    }

    #[test]
    fn regular_polygons_cap_their_corner_count() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 0.0, 0.0);
        let b = point(&mut scene, "B", 1.0, 0.0);
        let before = scene.len();
        for n in [2.0e7, 1.0e300, f64::INFINITY, f64::NAN] {
            let err = scene
                .create(
                    "regularpolygon",
                    &[Parent::Object(a), Parent::Object(b), Parent::Number(n)],
                    &Attributes::new(),
                )
                .unwrap_err();
            assert!(matches!(err, SceneError::Degenerate { .. }), "n = {n}");
        }
        assert_eq!(scene.len(), before);
    }

    #[test]
    fn line_and_circle_intersect_in_two_branches() {
        let mut scene = MemoryScene::new();
        let o = point(&mut scene, "O", 0.0, 0.0);
        let circle = scene
            .create("circle", &[Parent::Object(o), Parent::Number(1.0)], &named("c"))
            .unwrap();
        let a = point(&mut scene, "A", -2.0, 0.0);
        let b = point(&mut scene, "B", 2.0, 0.0);
        let line = scene
            .create("line", &[Parent::Object(a), Parent::Object(b)], &named("l"))
            .unwrap();
        let first = scene
            .create(
                "intersection",
                &[Parent::Object(line), Parent::Object(circle), Parent::Number(0.0)],
                &named("S"),
            )
            .unwrap();
        let other = scene
            .create(
                "otherintersection",
                &[Parent::Object(line), Parent::Object(circle), Parent::Object(first)],
                &named("T"),
            )
            .unwrap();
        let (s, t) = (scene.point(first).unwrap(), scene.point(other).unwrap());
        assert!(close(s.x.abs(), 1.0) && close(t.x.abs(), 1.0));
        assert!(close(s.x, -t.x));
    }

    #[test]
    fn tangents_from_inside_are_degenerate() {
        let mut scene = MemoryScene::new();
        let o = point(&mut scene, "O", 0.0, 0.0);
        let circle = scene
            .create("circle", &[Parent::Object(o), Parent::Number(2.0)], &named("c"))
            .unwrap();
        let inside = point(&mut scene, "P", 0.5, 0.0);
        let err = scene
            .create(
                "tangent",
                &[Parent::Object(inside), Parent::Object(circle), Parent::Number(0.0)],
                &Attributes::new(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "degenerate tangent: point inside the circle");
    }

    #[test]
    fn angles_are_counter_clockwise() {
        let mut scene = MemoryScene::new();
        let a = point(&mut scene, "A", 1.0, 0.0);
        let b = point(&mut scene, "B", 0.0, 0.0);
        let c = point(&mut scene, "C", 0.0, 1.0);
        let angle = scene
            .create(
                "angle",
                &[Parent::Object(a), Parent::Object(b), Parent::Object(c)],
                &named("alpha"),
            )
            .unwrap();
        assert!(close(scene.value(angle).unwrap(), PI / 2.0));
    }

    #[test]
    fn integrals_use_the_graph_function() {
        let mut scene = MemoryScene::new();
        let x = || Expr::Param {
            name: "x".to_owned(),
        };
        let square = TreeHost
            .compile(&Expr::binary(BinaryOp::Mul, x(), x()), &["x".to_owned()])
            .unwrap();
        let graph = scene
            .create("functiongraph", &[Parent::Function(square)], &named("f"))
            .unwrap();
        let integral = scene
            .create(
                "integral",
                &[Parent::Object(graph), Parent::Number(0.0), Parent::Number(3.0)],
                &named("I"),
            )
            .unwrap();
        assert!(close(scene.value(integral).unwrap(), 9.0));
    }

    #[test]
    fn missing_observers_are_reported_by_method_name() {
        let mut scene = MemoryScene::new();
        point(&mut scene, "A", 0.0, 0.0);
        assert_eq!(
            scene.observe("A", Observer::Area),
            Err(EvalError::MissingObserver {
                name: "A".to_owned(),
                observer: "Area".to_owned(),
            })
        );
        assert_eq!(
            scene.observe("nobody", Observer::X),
            Err(EvalError::UnknownObject {
                name: "nobody".to_owned()
            })
        );
    }

    #[test]
    fn free_values_are_called_on_demand() {
        let mut scene = MemoryScene::new();
        scene
            .define_value("a", Callable::constant(Value::Number(4.0)))
            .unwrap();
        assert_eq!(scene.free_value("a").unwrap(), Value::Number(4.0));
        assert!(scene.free_value("b").is_err());
    }

    #[test]
    fn texts_format_numbers_with_their_digits() {
        let mut scene = MemoryScene::new();
        let content = Callable::constant(Value::Number(2.0 / 3.0));
        let text = scene
            .create(
                "text",
                &[Parent::Number(0.0), Parent::Number(0.0), Parent::Function(content)],
                &named("t").with("digits", 3),
            )
            .unwrap();
        assert_eq!(scene.text(text).unwrap(), "0.667");
    }

    #[test]
    fn full_updates_are_counted() {
        let mut scene = MemoryScene::new();
        scene.full_update();
        assert_eq!(scene.full_updates(), 1);
    }
}
