//! Interpreting whole construction documents into an in-memory scene.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use compass_construct::builders::points;
use compass_construct::{
    interpret, Attributes, Binding, BuilderTable, DiagnosticKind, InterpreterOptions,
    Interpretation, MemoryScene, ObjectHandle, Parent, SceneError, SceneFactory, SubObjects,
};
use compass_core::Observer;
use compass_eval::{Callable, Environment, EvalError, Value};
use compass_interchange::{from_json_str, from_value, ConstructionDocument};
use serde_json::json;

fn fixture(name: &str) -> ConstructionDocument {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name);
    let src = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    from_json_str(&src).unwrap()
}

fn run(document: &ConstructionDocument) -> (MemoryScene, Interpretation) {
    let mut scene = MemoryScene::new();
    let result = interpret(document, &mut scene, &InterpreterOptions::default());
    (scene, result)
}

fn position(scene: &MemoryScene, name: &str) -> (f64, f64) {
    let handle = scene
        .by_name(name)
        .unwrap_or_else(|| panic!("no scene object named {}", name));
    let m = scene.measure(handle);
    (m.x.unwrap(), m.y.unwrap())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ──────────────────────────────────────────────
// Resolution order
// ──────────────────────────────────────────────

#[test]
fn test_forward_references_resolve() {
    let doc = fixture("midpoint.json");
    let (scene, result) = run(&doc);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(position(&scene, "M"), (2.0, 3.0));

    let order: Vec<&str> = result.registry.names().collect();
    assert_eq!(order, vec!["A", "B", "M", "s"]);
    assert_eq!(result.registry.get("M").unwrap().dependencies, vec!["A", "B"]);
}

#[test]
fn test_every_name_is_built_once() {
    let doc = from_value(json!({
        "commands": [
            { "name": "Segment", "inputs": ["A", "B"], "outputs": ["s"] },
            { "name": "Midpoint", "inputs": ["A", "B"], "outputs": ["M"] },
            { "name": "Line", "inputs": ["A", "M"], "outputs": ["l"] }
        ],
        "elements": [
            { "id": "A", "kind": "point", "coords": { "x": 0, "y": 0 } },
            { "id": "B", "kind": "point", "coords": { "x": 2, "y": 0 } }
        ]
    }))
    .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut builders = BuilderTable::standard();
    builders.register("point", move |ctx, req| {
        counter.fetch_add(1, Ordering::SeqCst);
        points::point(ctx, req)
    });
    let options = InterpreterOptions {
        builders,
        ..InterpreterOptions::default()
    };

    let mut scene = MemoryScene::new();
    let result = interpret(&doc, &mut scene, &options);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.registry.len(), 5);
    assert_eq!(scene.len(), 5);
}

#[test]
fn test_elements_without_commands_are_built() {
    let doc = from_value(json!({
        "elements": [
            { "id": "P", "kind": "point", "coords": { "x": 4, "y": 6, "z": 2 } },
            { "id": "r", "kind": "numeric", "value": 1.5 }
        ]
    }))
    .unwrap();
    let (scene, result) = run(&doc);
    assert_eq!(position(&scene, "P"), (2.0, 3.0));
    assert!(matches!(
        result.registry.get("r").unwrap().binding,
        Binding::Value { .. }
    ));
}

// ──────────────────────────────────────────────
// Failure isolation
// ──────────────────────────────────────────────

#[test]
fn test_failures_stay_local() {
    let doc = fixture("broken.json");
    let (scene, result) = run(&doc);

    assert_eq!(position(&scene, "N"), (2.0, 1.0));
    for name in ["H", "s", "M"] {
        assert!(
            !result.registry.get(name).unwrap().binding.is_constructed(),
            "{} should have no object",
            name
        );
    }

    let kinds: Vec<(&str, &DiagnosticKind)> = result
        .diagnostics
        .iter()
        .map(|d| (d.subject.as_str(), &d.kind))
        .collect();
    assert!(kinds
        .iter()
        .any(|(s, k)| *s == "H" && matches!(k, DiagnosticKind::UnknownType { tag } if tag == "hyperboloid")));
    assert!(kinds.iter().any(|(s, k)| *s == "s"
        && matches!(k, DiagnosticKind::BuildFailed { message } if message.contains("degenerate"))));
    assert!(kinds.iter().any(|(s, k)| *s == "M"
        && matches!(k, DiagnosticKind::UnresolvedReference { name } if name == "Z")));
}

#[test]
fn test_cycles_are_reported_not_followed() {
    let doc = fixture("cycle.json");
    let (_, result) = run(&doc);

    let cycle = result
        .diagnostics
        .iter()
        .find_map(|d| match &d.kind {
            DiagnosticKind::Cycle { path } => Some(path.clone()),
            _ => None,
        })
        .expect("a cycle diagnostic");
    assert_eq!(cycle, vec!["a", "b", "a"]);
    assert!(!result.registry.get("a").unwrap().binding.is_constructed());
    assert!(!result.registry.get("b").unwrap().binding.is_constructed());
    assert!(result.registry.get("A").unwrap().binding.is_constructed());
}

#[test]
fn test_commands_without_outputs_are_diagnosed() {
    let doc = from_value(json!({
        "commands": [ { "name": "Segment", "inputs": ["A", "B"] } ]
    }))
    .unwrap();
    let (_, result) = run(&doc);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::NoOutputs);
    assert!(result.registry.is_empty());
}

// ──────────────────────────────────────────────
// Builders end to end
// ──────────────────────────────────────────────

#[test]
fn test_polygon_outputs_name_borders_and_vertices() {
    let doc = fixture("polygon.json");
    let (scene, result) = run(&doc);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let poly = scene.by_name("poly").unwrap();
    assert_eq!(scene.sub_objects(poly, SubObjects::Borders).len(), 4);
    assert!(close(scene.measure(poly).area.unwrap(), 12.0));
    assert!(close(scene.measure(scene.by_name("b").unwrap()).length.unwrap(), 3.0));
    assert_eq!(result.registry.get("a").unwrap().dependencies, vec!["poly"]);

    let (ex, ey) = position(&scene, "E");
    assert!(close(ex, 2.0));
    assert!(close(ey, 12f64.sqrt()));

    let area = result.registry.get("area").unwrap();
    assert_eq!(area.dependencies, vec!["poly"]);
}

#[test]
fn test_functions_sliders_and_texts() {
    let doc = fixture("function.json");
    let (scene, result) = run(&doc);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let integral = scene.measure(scene.by_name("I").unwrap());
    assert!(close(integral.value.unwrap(), 18.0));

    let label = scene.measure(scene.by_name("label").unwrap());
    assert_eq!(label.text.as_deref(), Some("18.0"));
    assert_eq!((label.x, label.y), (Some(1.0), Some(1.0)));

    let note = scene.measure(scene.by_name("note").unwrap());
    assert_eq!(note.text.as_deref(), Some("Area under f"));

    let f = result.registry.get("f").unwrap();
    assert_eq!(f.dependencies, vec!["k"]);
    assert_eq!(f.definition.as_ref().unwrap().params(), ["x".to_owned()]);
    assert!(scene.free_value_names().any(|n| n == "half"));
}

#[test]
fn test_standalone_values_get_their_definition_bound() {
    let doc = from_value(json!({
        "commands": [ { "name": "Distance", "inputs": ["A", "B"], "outputs": ["d"] } ],
        "elements": [
            { "id": "A", "kind": "point", "coords": { "x": 0, "y": 0 } },
            { "id": "B", "kind": "point", "coords": { "x": 3, "y": 4 } },
            { "id": "d", "kind": "numeric" }
        ]
    }))
    .unwrap();
    let (scene, result) = run(&doc);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let d = result.registry.get("d").unwrap();
    assert!(d.definition.is_some());
    assert!(close(scene.measure(scene.by_name("d").unwrap()).value.unwrap(), 5.0));
}

#[test]
fn test_full_update_is_sent_once() {
    let doc = fixture("midpoint.json");
    let (scene, _) = run(&doc);
    assert_eq!(scene.full_updates(), 1);

    let mut quiet = MemoryScene::new();
    let options = InterpreterOptions {
        full_update: false,
        ..InterpreterOptions::default()
    };
    interpret(&doc, &mut quiet, &options);
    assert_eq!(quiet.full_updates(), 0);
}

#[test]
fn test_display_attributes_reach_the_scene() {
    let doc = fixture("midpoint.json");
    let (scene, _) = run(&doc);
    let m = scene.entry(scene.by_name("M").unwrap()).unwrap();
    assert_eq!(m.attributes.get("strokeColor"), Some(&json!("#ff0000")));
    assert_eq!(m.attributes.get("face"), Some(&json!("cross")));
    let s = scene.entry(scene.by_name("s").unwrap()).unwrap();
    assert_eq!(s.attributes.get("strokeWidth"), Some(&json!(2.0)));
    assert_eq!(s.attributes.get("dash"), Some(&json!(3)));
}

#[test]
fn test_unresolved_names_are_reported_once() {
    let doc = from_value(json!({
        "commands": [
            { "name": "Midpoint", "inputs": ["A", "Z"], "outputs": ["M"] },
            { "name": "Segment", "inputs": ["A", "Z"], "outputs": ["s"] },
            { "name": "Line", "inputs": ["Z", "A"], "outputs": ["l"] }
        ],
        "elements": [
            { "id": "A", "kind": "point", "coords": { "x": 0, "y": 0 } }
        ]
    }))
    .unwrap();
    let (_, result) = run(&doc);
    let misses = result
        .diagnostics
        .iter()
        .filter(|d| matches!(&d.kind, DiagnosticKind::UnresolvedReference { name } if name == "Z"))
        .count();
    assert_eq!(misses, 1, "{:?}", result.diagnostics);
    for name in ["M", "s", "l"] {
        assert!(!result.registry.get(name).unwrap().binding.is_constructed());
    }
}

#[test]
fn test_regular_polygon_with_huge_corner_count_is_rejected() {
    for n in ["20000000", "1e300"] {
        let doc = from_value(json!({
            "commands": [
                { "name": "Polygon", "inputs": ["A", "B", n], "outputs": ["tri"] },
                { "name": "Midpoint", "inputs": ["A", "B"], "outputs": ["M"] }
            ],
            "elements": [
                { "id": "A", "kind": "point", "coords": { "x": 0, "y": 0 } },
                { "id": "B", "kind": "point", "coords": { "x": 1, "y": 0 } }
            ]
        }))
        .unwrap();
        let (scene, result) = run(&doc);
        assert!(!result.registry.get("tri").unwrap().binding.is_constructed());
        assert!(result.diagnostics.iter().any(|d| d.subject == "tri"
            && matches!(&d.kind, DiagnosticKind::BuildFailed { message } if message.contains("too many corners"))));
        assert_eq!(position(&scene, "M"), (0.5, 0.0));
    }
}

// ──────────────────────────────────────────────
// Extra outputs
// ──────────────────────────────────────────────

/// A memory scene that refuses some constructions.
struct RefusingScene {
    inner: MemoryScene,
    refuse: fn(&str, &[Parent]) -> bool,
}

impl Environment for RefusingScene {
    fn observe(&self, name: &str, observer: Observer) -> Result<Value, EvalError> {
        self.inner.observe(name, observer)
    }

    fn free_value(&self, name: &str) -> Result<Value, EvalError> {
        self.inner.free_value(name)
    }
}

impl SceneFactory for RefusingScene {
    fn create(
        &mut self,
        tag: &str,
        parents: &[Parent],
        attributes: &Attributes,
    ) -> Result<ObjectHandle, SceneError> {
        if (self.refuse)(tag, parents) {
            return Err(SceneError::Degenerate {
                tag: tag.to_owned(),
                reason: "refused",
            });
        }
        self.inner.create(tag, parents, attributes)
    }

    fn name_object(&mut self, handle: ObjectHandle, name: &str) -> Result<(), SceneError> {
        self.inner.name_object(handle, name)
    }

    fn sub_objects(&self, handle: ObjectHandle, which: SubObjects) -> Vec<ObjectHandle> {
        self.inner.sub_objects(handle, which)
    }

    fn define_value(&mut self, name: &str, value: Callable) -> Result<(), SceneError> {
        self.inner.define_value(name, value)
    }

    fn bind_value(&mut self, handle: ObjectHandle, value: Callable) -> Result<(), SceneError> {
        self.inner.bind_value(handle, value)
    }

    fn full_update(&mut self) {
        self.inner.full_update()
    }
}

fn run_refusing(
    document: &ConstructionDocument,
    refuse: fn(&str, &[Parent]) -> bool,
) -> (MemoryScene, Interpretation) {
    let mut scene = RefusingScene {
        inner: MemoryScene::new(),
        refuse,
    };
    let result = interpret(document, &mut scene, &InterpreterOptions::default());
    (scene.inner, result)
}

fn assert_extra_failed(result: &Interpretation, name: &str) {
    assert!(!result.registry.get(name).unwrap().binding.is_constructed());
    assert!(
        result.diagnostics.iter().any(|d| d.subject == name
            && matches!(&d.kind, DiagnosticKind::BuildFailed { message } if message.contains("refused"))),
        "{:?}",
        result.diagnostics
    );
}

#[test]
fn test_failed_second_intersection_is_diagnosed() {
    let doc = from_value(json!({
        "commands": [
            { "name": "Line", "inputs": ["A", "B"], "outputs": ["l"] },
            { "name": "Line", "inputs": ["C", "D"], "outputs": ["m"] },
            { "name": "Intersect", "inputs": ["l", "m"], "outputs": ["P", "Q"] }
        ],
        "elements": [
            { "id": "A", "kind": "point", "coords": { "x": 0, "y": 0 } },
            { "id": "B", "kind": "point", "coords": { "x": 2, "y": 2 } },
            { "id": "C", "kind": "point", "coords": { "x": 0, "y": 2 } },
            { "id": "D", "kind": "point", "coords": { "x": 2, "y": 0 } }
        ]
    }))
    .unwrap();
    let (scene, result) = run_refusing(&doc, |tag, _| tag == "otherintersection");
    let (x, y) = position(&scene, "P");
    assert!(close(x, 1.0) && close(y, 1.0));
    assert_extra_failed(&result, "Q");
}

#[test]
fn test_failed_second_tangent_is_diagnosed() {
    let doc = from_value(json!({
        "commands": [
            { "name": "Circle", "inputs": ["O", "1"], "outputs": ["c"] },
            { "name": "Tangent", "inputs": ["P", "c"], "outputs": ["t1", "t2"] }
        ],
        "elements": [
            { "id": "O", "kind": "point", "coords": { "x": 0, "y": 0 } },
            { "id": "P", "kind": "point", "coords": { "x": 3, "y": 0 } }
        ]
    }))
    .unwrap();
    let (_, result) = run_refusing(&doc, |tag, parents| {
        tag == "tangent" && matches!(parents.get(2), Some(Parent::Number(n)) if *n >= 1.0)
    });
    assert!(result.registry.get("t1").unwrap().binding.is_constructed());
    assert_extra_failed(&result, "t2");
}
