//! The construction graph builder.
//!
//! Commands are replayed in document order, but any name can be
//! constructed earlier: resolving a reference constructs its definition on
//! the spot ([`InterpreterContext::ensure_constructed`]). Every name is
//! constructed at most once, and a name met again while it is still being
//! resolved is reported as a cycle instead of recursing.

use std::collections::HashSet;
use std::fmt;

use compass_core::{
    generate, lexer::is_identifier, normalize_symbols, CodegenDiagnostic, Expr, ExprValue,
    Symbol, SymbolTable,
};
use compass_eval::{Callable, CodeHost, TreeHost};
use compass_interchange::{Command, ConstructionDocument, Element, InputRef};
use tracing::{debug, info, warn};

use crate::attributes;
use crate::builders::{BuildError, BuildRequest, BuilderTable, Built, Resolved};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::index::DocumentIndex;
use crate::registry::{Binding, ObjectClass, Registry, SceneObject};
use crate::scene::{Attributes, Parent, SceneFactory};

/// Knobs for one interpretation pass.
pub struct InterpreterOptions {
    pub builders: BuilderTable,
    pub host: Box<dyn CodeHost>,
    /// Send the final full-update signal to the scene.
    pub full_update: bool,
    /// Label precision. Falls back to the document's, then 2.
    pub decimals: Option<u32>,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        InterpreterOptions {
            builders: BuilderTable::standard(),
            host: Box::new(TreeHost),
            full_update: true,
            decimals: None,
        }
    }
}

impl fmt::Debug for InterpreterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterOptions")
            .field("builders", &self.builders)
            .field("full_update", &self.full_update)
            .field("decimals", &self.decimals)
            .finish_non_exhaustive()
    }
}

/// The result of one pass: everything that was settled, and what went wrong.
#[derive(Debug)]
pub struct Interpretation {
    pub registry: Registry,
    pub diagnostics: Vec<Diagnostic>,
}

/// A compiled expression and the names it read.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub value: ExprValue,
    pub references: Vec<String>,
}

/// Interpret `document` against `scene`. Never fails as a whole; problems
/// with individual entries end up in [`Interpretation::diagnostics`].
pub fn interpret(
    document: &ConstructionDocument,
    scene: &mut dyn SceneFactory,
    options: &InterpreterOptions,
) -> Interpretation {
    info!(
        commands = document.commands.len(),
        elements = document.elements.len(),
        "interpreting construction document"
    );
    let mut ctx = InterpreterContext {
        index: DocumentIndex::new(document),
        registry: Registry::new(),
        scene,
        host: options.host.as_ref(),
        builders: &options.builders,
        resolving: Vec::new(),
        missing: HashSet::new(),
        diagnostics: Vec::new(),
        decimals: options.decimals.or(document.decimals).unwrap_or(2),
    };

    for command in &document.commands {
        match command.outputs.first() {
            Some(primary) => {
                ctx.ensure_constructed(primary);
            }
            None => ctx.diagnose(&command.name, DiagnosticKind::NoOutputs),
        }
    }

    for element in &document.elements {
        if !ctx.registry.contains(&element.id) {
            ctx.ensure_constructed(&element.id);
        }
    }
    for element in &document.elements {
        if ctx.index.producer(&element.id).is_none() {
            ctx.bind_definition(element);
        }
    }

    if options.full_update {
        ctx.scene.full_update();
    }
    info!(
        registered = ctx.registry.len(),
        diagnostics = ctx.diagnostics.len(),
        "construction document interpreted"
    );
    Interpretation {
        registry: ctx.registry,
        diagnostics: ctx.diagnostics,
    }
}

/// State threaded through one interpretation pass.
pub struct InterpreterContext<'a> {
    index: DocumentIndex<'a>,
    registry: Registry,
    scene: &'a mut dyn SceneFactory,
    host: &'a dyn CodeHost,
    builders: &'a BuilderTable,
    /// Names currently being constructed, outermost first.
    resolving: Vec<String>,
    /// Names already reported as unresolved.
    missing: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    decimals: u32,
}

impl<'a> InterpreterContext<'a> {
    pub fn scene(&mut self) -> &mut (dyn SceneFactory + 'a) {
        &mut *self.scene
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn element(&self, name: &str) -> Option<&'a Element> {
        self.index.element(name)
    }

    pub fn diagnose(&mut self, subject: &str, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic::new(subject, kind));
    }

    /// Display attributes for `name`, from its document element if any.
    pub fn attributes_for(&self, name: &str, kind: &str) -> Attributes {
        attributes::derive(name, kind, self.index.element(name))
    }

    /// Create a scene object and describe it for the registry.
    pub fn create(
        &mut self,
        tag: &str,
        parents: &[Parent],
        attributes: &Attributes,
        class: ObjectClass,
    ) -> Result<SceneObject, BuildError> {
        let handle = self.scene.create(tag, parents, attributes)?;
        Ok(SceneObject::new(handle, tag, class))
    }

    /// Binding for an extra output whose construction failed. The failure is
    /// reported against `name` like a failed primary output.
    pub fn failed_extra(&mut self, name: &str, tag: &str, err: BuildError) -> Binding {
        warn!(name = %name, tag = %tag, error = %err, "extra output failed, registering no object");
        self.diagnose(
            name,
            DiagnosticKind::BuildFailed {
                message: err.to_string(),
            },
        );
        Binding::NoObject
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Return the binding of `name`, constructing it first if needed.
    pub fn ensure_constructed(&mut self, name: &str) -> Resolved {
        if let Some(entry) = self.registry.get(name) {
            return Resolved::from_binding(name, &entry.binding);
        }
        if self.missing.contains(name) {
            return Resolved::Missing(name.to_owned());
        }
        if self.resolving.iter().any(|n| n == name) {
            let mut path = self.resolving.clone();
            path.push(name.to_owned());
            warn!(name = %name, path = %path.join(" -> "), "reference cycle");
            let subject = self.subject();
            self.diagnose(&subject, DiagnosticKind::Cycle { path });
            return Resolved::Missing(name.to_owned());
        }

        self.resolving.push(name.to_owned());
        let resolved = self.construct(name);
        self.resolving.pop();
        resolved
    }

    fn construct(&mut self, name: &str) -> Resolved {
        if let Some(command) = self.index.producer(name) {
            self.process_command(command);
            return self.settled(name);
        }
        if let Some(element) = self.index.element(name) {
            self.construct_element(element);
            return self.settled(name);
        }
        if let Some(axis) = Axis::named(name) {
            return self.construct_axis(axis);
        }
        if let Some(element) = self.index.by_expression(name) {
            if element.id != name {
                return self.ensure_constructed(&element.id);
            }
        }
        if !is_identifier(name.trim()) {
            return self.inline_value(name);
        }
        self.unresolved(name)
    }

    fn settled(&mut self, name: &str) -> Resolved {
        match self.registry.get(name) {
            Some(entry) => Resolved::from_binding(name, &entry.binding),
            None => self.unresolved(name),
        }
    }

    fn unresolved(&mut self, name: &str) -> Resolved {
        let subject = self.referrer().unwrap_or(name).to_owned();
        warn!(name = %name, referrer = %subject, "unresolved reference");
        self.missing.insert(name.to_owned());
        self.diagnose(
            &subject,
            DiagnosticKind::UnresolvedReference {
                name: name.to_owned(),
            },
        );
        Resolved::Missing(name.to_owned())
    }

    /// The name that asked for the one currently being resolved.
    fn referrer(&self) -> Option<&str> {
        let n = self.resolving.len();
        (n >= 2).then(|| self.resolving[n - 2].as_str())
    }

    fn subject(&self) -> String {
        self.resolving.last().cloned().unwrap_or_default()
    }

    /// A non-identifier input is an expression in its own right.
    fn inline_value(&mut self, source: &str) -> Resolved {
        let subject = self.referrer().unwrap_or(source).to_owned();
        match self.compile_scalar(&subject, source, &[]) {
            Ok((value, _)) => {
                debug!(source = %source, "inline expression compiled");
                Resolved::Value(value)
            }
            Err(err) => {
                warn!(source = %source, error = %err, "inline expression failed");
                Resolved::Missing(source.to_owned())
            }
        }
    }

    fn construct_axis(&mut self, axis: Axis) -> Resolved {
        let (dx, dy) = axis.direction();
        let parents = [
            Parent::Number(0.0),
            Parent::Number(0.0),
            Parent::Number(dx),
            Parent::Number(dy),
        ];
        let attrs = self.attributes_for(axis.name(), "axis");
        let built = self
            .create("axis", &parents, &attrs, ObjectClass::Axis)
            .map(Built::object);
        self.record(axis.name(), "axis", "axis", Vec::new(), built);
        self.settled(axis.name())
    }

    // ── Construction ─────────────────────────────────────────────────

    fn process_command(&mut self, command: &'a Command) {
        let Some(primary) = command.outputs.first() else {
            return;
        };
        if self.registry.contains(primary) {
            debug!(name = %primary, command = %command.name, "already constructed, skipping");
            return;
        }

        let classified = command.classified_inputs();
        let mut inputs = Vec::with_capacity(classified.len());
        let mut dependencies = Vec::new();
        for input in &classified {
            match input {
                InputRef::Literal(text) => inputs.push(Resolved::Literal((*text).to_owned())),
                InputRef::Reference(name) => {
                    dependencies.push((*name).to_owned());
                    inputs.push(self.ensure_constructed(name));
                }
            }
        }
        // Input resolution may have reached this command through another output.
        if self.registry.contains(primary) {
            return;
        }

        let tag = command.tag();
        let element = self.index.element(primary);
        let kind = element.map_or(tag.as_str(), |e| e.kind.as_str()).to_owned();
        let request = BuildRequest {
            tag: &tag,
            command: Some(&command.name),
            name: primary,
            inputs,
            input_names: classified.iter().map(InputRef::text).collect(),
            outputs: &command.outputs,
            element,
            attributes: self.attributes_for(primary, &kind),
        };
        let built = self.dispatch(&request);
        self.record(primary, &kind, &tag, dependencies, built);
    }

    fn construct_element(&mut self, element: &'a Element) {
        let tag = element.kind.to_ascii_lowercase();
        let request = BuildRequest {
            tag: &tag,
            command: None,
            name: &element.id,
            inputs: Vec::new(),
            input_names: Vec::new(),
            outputs: std::slice::from_ref(&element.id),
            element: Some(element),
            attributes: self.attributes_for(&element.id, &tag),
        };
        let built = self.dispatch(&request);
        self.record(&element.id, &element.kind, &tag, Vec::new(), built);
    }

    fn dispatch(&mut self, request: &BuildRequest<'_>) -> Result<Built, BuildError> {
        let builders = self.builders;
        match builders.get(request.tag) {
            Some(builder) => builder.build(self, request),
            None => Err(BuildError::UnknownType {
                tag: request.tag.to_owned(),
            }),
        }
    }

    fn record(
        &mut self,
        name: &str,
        kind: &str,
        tag: &str,
        mut dependencies: Vec<String>,
        built: Result<Built, BuildError>,
    ) {
        let built = match built {
            Ok(built) => built,
            Err(err) => {
                let kind_of_failure = match err {
                    BuildError::UnknownType { tag } => DiagnosticKind::UnknownType { tag },
                    other => DiagnosticKind::BuildFailed {
                        message: other.to_string(),
                    },
                };
                warn!(name = %name, tag = %tag, "construction failed, registering no object");
                self.diagnose(name, kind_of_failure);
                self.register(name, kind, dependencies, Binding::NoObject);
                return;
            }
        };

        for dep in built.dependencies {
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }
        debug!(name = %name, tag = %tag, "constructed");
        self.register(name, kind, dependencies, built.primary);
        if let Some(definition) = built.definition {
            if let Err(err) = self.registry.attach_definition(name, definition) {
                self.diagnose(
                    name,
                    DiagnosticKind::Duplicate {
                        message: err.to_string(),
                    },
                );
            }
        }
        for (extra, binding) in built.extras {
            let extra_kind = match (self.index.element(&extra), &binding) {
                (Some(element), _) => element.kind.clone(),
                (None, Binding::Object { object }) => object.tag.clone(),
                (None, _) => kind.to_owned(),
            };
            self.register(&extra, &extra_kind, vec![name.to_owned()], binding);
        }
    }

    fn register(&mut self, name: &str, kind: &str, dependencies: Vec<String>, binding: Binding) {
        if let Err(err) = self.registry.register(name, kind, dependencies, binding) {
            warn!(name = %name, error = %err, "registration rejected");
            self.diagnose(
                name,
                DiagnosticKind::Duplicate {
                    message: err.to_string(),
                },
            );
        }
    }

    /// Bind a standalone value or text element to its defining expression,
    /// unless its builder already did.
    fn bind_definition(&mut self, element: &'a Element) {
        let Some(source) = element.expression.as_deref() else {
            return;
        };
        let handle = match self.registry.get(&element.id) {
            Some(entry) if entry.definition.is_none() => match &entry.binding {
                Binding::Object { object }
                    if matches!(object.class, ObjectClass::Value | ObjectClass::Text) =>
                {
                    object.handle
                }
                _ => return,
            },
            _ => return,
        };
        self.resolving.push(element.id.clone());
        let compiled = self.compile_scalar(&element.id, source, &[]);
        self.resolving.pop();
        let result = compiled.and_then(|(definition, _)| {
            self.scene.bind_value(handle, definition.clone())?;
            Ok(definition)
        });
        match result {
            Ok(definition) => {
                debug!(name = %element.id, "definition bound");
                if let Err(err) = self.registry.attach_definition(&element.id, definition) {
                    self.diagnose(
                        &element.id,
                        DiagnosticKind::Duplicate {
                            message: err.to_string(),
                        },
                    );
                }
            }
            Err(err) => self.diagnose(
                &element.id,
                DiagnosticKind::BuildFailed {
                    message: err.to_string(),
                },
            ),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    /// Normalize, parse and generate `source`, resolving names against the
    /// registry and document. Syntax errors and generation notes become
    /// diagnostics on `subject`.
    pub fn compile(&mut self, subject: &str, source: &str) -> Result<Compiled, BuildError> {
        let normalized = normalize_symbols(source);
        let generated = generate(&normalized, self);
        if !generated.outcome.errors.is_empty() {
            self.diagnose(
                subject,
                DiagnosticKind::Syntax {
                    source_text: source.to_owned(),
                    errors: generated.outcome.errors.clone(),
                    suppressed: generated.outcome.suppressed_errors,
                },
            );
        }
        for note in generated.diagnostics {
            self.diagnose(subject, DiagnosticKind::Codegen { note });
        }
        match generated.outcome.into_value() {
            Some(value) => Ok(Compiled {
                value,
                references: generated.references,
            }),
            None => Err(BuildError::Expression {
                source_text: source.to_owned(),
            }),
        }
    }

    /// Compile `source` as a scalar function of `params`.
    pub fn compile_scalar(
        &mut self,
        subject: &str,
        source: &str,
        params: &[String],
    ) -> Result<(Callable, Vec<String>), BuildError> {
        let compiled = self.compile(subject, source)?;
        let expr = match compiled.value {
            ExprValue::Scalar { expr } => expr,
            ExprValue::Vector2 { x, .. } => {
                self.diagnose(
                    subject,
                    DiagnosticKind::Codegen {
                        note: CodegenDiagnostic::ShapeMismatch {
                            context: subject.to_owned(),
                        },
                    },
                );
                x
            }
        };
        Ok((self.callable(&expr, params)?, compiled.references))
    }

    pub fn callable(&self, expr: &Expr, params: &[String]) -> Result<Callable, BuildError> {
        Ok(self.host.compile(expr, params)?)
    }
}

impl SymbolTable for InterpreterContext<'_> {
    fn resolve(&mut self, name: &str) -> Symbol {
        if let Some(entry) = self.registry.get(name) {
            return entry.binding.symbol();
        }
        if !self.index.defines(name) && Axis::named(name).is_none() {
            return Symbol::Unknown;
        }
        match self.ensure_constructed(name) {
            Resolved::Object(object) => Symbol::Object(object.capability),
            Resolved::Value(_) => Symbol::FreeValue,
            Resolved::Literal(_) | Resolved::Missing(_) => Symbol::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn named(name: &str) -> Option<Axis> {
        match name {
            "xAxis" => Some(Axis::X),
            "yAxis" => Some(Axis::Y),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Axis::X => "xAxis",
            Axis::Y => "yAxis",
        }
    }

    fn direction(self) -> (f64, f64) {
        match self {
            Axis::X => (1.0, 0.0),
            Axis::Y => (0.0, 1.0),
        }
    }
}
