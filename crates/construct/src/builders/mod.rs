//! Per-type builders and the table that dispatches to them.
//!
//! A builder receives the resolved inputs of one command (or none, for a
//! standalone element), creates objects through the interpreter context,
//! and reports what each output name is bound to.

pub mod curves;
pub mod lines;
pub mod points;
pub mod values;

use std::collections::HashMap;
use std::fmt;

use compass_eval::{Callable, EvalError};
use compass_interchange::Element;
use thiserror::Error;

use crate::interpret::InterpreterContext;
use crate::registry::{Binding, ObjectClass, SceneObject};
use crate::scene::{Attributes, Parent, SceneError};

// ──────────────────────────────────────────────
// Requests and results
// ──────────────────────────────────────────────

/// A command input after reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Literal(String),
    Object(SceneObject),
    Value(Callable),
    /// Unresolved, cyclic, or failed to construct.
    Missing(String),
}

impl Resolved {
    pub fn from_binding(name: &str, binding: &Binding) -> Resolved {
        match binding {
            Binding::Object { object } => Resolved::Object(object.clone()),
            Binding::Value { value } => Resolved::Value(value.clone()),
            Binding::NoObject => Resolved::Missing(name.to_owned()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Resolved::Missing(_))
    }
}

pub struct BuildRequest<'r> {
    /// Lowercase construction-type tag.
    pub tag: &'r str,
    /// Command name as written, when built from a command.
    pub command: Option<&'r str>,
    /// Primary output name.
    pub name: &'r str,
    pub inputs: Vec<Resolved>,
    /// Input text as written, parallel to `inputs`.
    pub input_names: Vec<&'r str>,
    pub outputs: &'r [String],
    /// Document descriptor of the primary output.
    pub element: Option<&'r Element>,
    /// Derived display attributes of the primary output.
    pub attributes: Attributes,
}

impl BuildRequest<'_> {
    fn input(&self, index: usize) -> Result<&Resolved, BuildError> {
        match self.inputs.get(index) {
            Some(Resolved::Missing(name)) => Err(BuildError::MissingInput { name: name.clone() }),
            Some(input) => Ok(input),
            None => Err(BuildError::BadInputs {
                tag: self.tag.to_owned(),
                expected: "more inputs",
            }),
        }
    }

    pub fn object(&self, index: usize) -> Result<&SceneObject, BuildError> {
        match self.input(index)? {
            Resolved::Object(object) => Ok(object),
            _ => Err(BuildError::BadInputs {
                tag: self.tag.to_owned(),
                expected: "an object input",
            }),
        }
    }

    /// Objects at `indices`, as scene parents.
    pub fn objects(&self, indices: std::ops::Range<usize>) -> Result<Vec<Parent>, BuildError> {
        indices
            .map(|i| self.object(i).map(|o| Parent::Object(o.handle)))
            .collect()
    }

    /// A numeric input: a literal (degrees when marked `°`), a value
    /// object, or a free value.
    pub fn scalar(&self, index: usize) -> Result<Parent, BuildError> {
        match self.input(index)? {
            Resolved::Literal(text) => parse_number(text)
                .map(Parent::Number)
                .ok_or_else(|| BuildError::BadLiteral { text: text.clone() }),
            Resolved::Object(object) => Ok(Parent::Object(object.handle)),
            Resolved::Value(value) => Ok(Parent::Function(value.clone())),
            Resolved::Missing(name) => Err(BuildError::MissingInput { name: name.clone() }),
        }
    }

    pub fn literal(&self, index: usize) -> Option<&str> {
        match self.inputs.get(index) {
            Some(Resolved::Literal(text)) => Some(text),
            _ => None,
        }
    }

    pub fn is_object(&self, index: usize, class: ObjectClass) -> bool {
        matches!(self.inputs.get(index), Some(Resolved::Object(o)) if o.class == class)
    }

    pub fn arity(&self, accepted: &[usize], expected: &'static str) -> Result<(), BuildError> {
        if accepted.contains(&self.inputs.len()) {
            Ok(())
        } else {
            Err(BuildError::BadInputs {
                tag: self.tag.to_owned(),
                expected,
            })
        }
    }
}

/// Parse a numeric literal. `°` marks degrees and converts to radians.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    match text.strip_suffix('°') {
        Some(degrees) => degrees.trim().parse::<f64>().ok().map(f64::to_radians),
        None => text.parse().ok(),
    }
}

/// What a builder produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub primary: Binding,
    /// Secondary outputs: borders, vertices, second branches.
    pub extras: Vec<(String, Binding)>,
    /// Defining function compiled from the element's own expression.
    pub definition: Option<Callable>,
    /// Names the construction read beyond its command inputs.
    pub dependencies: Vec<String>,
}

impl Built {
    pub fn object(object: SceneObject) -> Self {
        Built::binding(Binding::object(object))
    }

    pub fn value(value: Callable) -> Self {
        Built::binding(Binding::value(value))
    }

    fn binding(primary: Binding) -> Self {
        Built {
            primary,
            extras: Vec::new(),
            definition: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_extra(mut self, name: &str, binding: Binding) -> Self {
        self.extras.push((name.to_owned(), binding));
        self
    }

    pub fn with_definition(mut self, definition: Callable) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown construction type '{tag}'")]
    UnknownType { tag: String },
    #[error("missing input '{name}'")]
    MissingInput { name: String },
    #[error("'{tag}' expects {expected}")]
    BadInputs { tag: String, expected: &'static str },
    #[error("'{text}' is not a number")]
    BadLiteral { text: String },
    #[error("expression '{source_text}' could not be compiled")]
    Expression { source_text: String },
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

// ──────────────────────────────────────────────
// Dispatch
// ──────────────────────────────────────────────

pub trait Builder: Send + Sync {
    fn build(
        &self,
        ctx: &mut InterpreterContext<'_>,
        request: &BuildRequest<'_>,
    ) -> Result<Built, BuildError>;
}

impl<F> Builder for F
where
    F: Fn(&mut InterpreterContext<'_>, &BuildRequest<'_>) -> Result<Built, BuildError>
        + Send
        + Sync,
{
    fn build(
        &self,
        ctx: &mut InterpreterContext<'_>,
        request: &BuildRequest<'_>,
    ) -> Result<Built, BuildError> {
        self(ctx, request)
    }
}

/// Construction-type tag → builder.
#[derive(Default)]
pub struct BuilderTable {
    builders: HashMap<String, Box<dyn Builder>>,
}

impl BuilderTable {
    pub fn new() -> Self {
        BuilderTable::default()
    }

    /// Every tag the standard scene understands.
    pub fn standard() -> Self {
        let mut table = BuilderTable::new();
        table.register("point", points::point);
        table.register("midpoint", points::midpoint);
        table.register("intersect", points::intersect);
        table.register("center", points::center);
        table.register("mirror", points::transform);
        table.register("rotate", points::transform);
        table.register("dilate", points::transform);
        table.register("translate", points::transform);

        table.register("segment", lines::through_two);
        table.register("line", lines::through_two);
        table.register("ray", lines::through_two);
        table.register("vector", lines::vector);
        table.register("orthogonalline", lines::orthogonal);
        table.register("linebisector", lines::bisector);
        table.register("angularbisector", lines::angular_bisector);
        table.register("polar", lines::polar);
        table.register("tangent", lines::tangent);
        table.register("polygon", lines::polygon);

        table.register("circle", curves::circle);
        table.register("circlearc", curves::arc);
        table.register("circlesector", curves::arc);
        table.register("circumcirclearc", curves::arc);
        table.register("circumcirclesector", curves::arc);
        table.register("semicircle", curves::semicircle);
        table.register("ellipse", curves::ellipse);
        table.register("conic", curves::conic);
        table.register("function", curves::function);
        table.register("integral", curves::integral);

        table.register("numeric", values::numeric);
        table.register("boolean", values::numeric);
        table.register("angle", values::angle);
        table.register("distance", values::distance);
        table.register("text", values::text);
        table
    }

    /// Install `builder` for `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: &str, builder: F)
    where
        F: Fn(&mut InterpreterContext<'_>, &BuildRequest<'_>) -> Result<Built, BuildError>
            + Send
            + Sync
            + 'static,
    {
        self.register_builder(tag, Box::new(builder));
    }

    pub fn register_builder(&mut self, tag: &str, builder: Box<dyn Builder>) {
        self.builders.insert(tag.to_ascii_lowercase(), builder);
    }

    pub fn get(&self, tag: &str) -> Option<&dyn Builder> {
        self.builders.get(tag).map(|b| b.as_ref())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.builders.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl fmt::Debug for BuilderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderTable")
            .field("tags", &self.tags())
            .finish()
    }
}
