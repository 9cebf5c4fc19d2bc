//! End-to-end expression compilation: normalization, definitions, parsing
//! and code generation together.

use compass_core::{
    generate, normalize_symbols, split_definition, Capability, CodegenDiagnostic, ExprValue,
    NoSymbols, Parsed, Symbol, SymbolTable,
};

struct Points;

impl SymbolTable for Points {
    fn resolve(&mut self, name: &str) -> Symbol {
        match name {
            "A" | "B" | "C" => Symbol::Object(Capability::Generic),
            "r" => Symbol::Object(Capability::NumericValue),
            _ => Symbol::Unknown,
        }
    }
}

#[test]
fn unicode_source_compiles_after_normalization() {
    let src = normalize_symbols("π r²");
    // Juxtaposition is not multiplication; the parser recovers past `r`.
    let g = generate(&src, &mut Points);
    assert_eq!(g.outcome.errors.len(), 1);

    let src = normalize_symbols("PI*r²");
    let g = generate(&src, &mut Points);
    assert!(g.outcome.is_clean());
    assert_eq!(
        g.outcome.value().unwrap().to_string(),
        "(PI * pow($r.Value(), 2))"
    );
}

#[test]
fn midpoint_expression_stays_vector_valued() {
    let g = generate("(A + B) / 2", &mut Points);
    let value = g.outcome.into_value().unwrap();
    assert!(value.is_vector());
    assert_eq!(
        value.to_string(),
        "[((($A.X() + $B.X())) / 2), ((($A.Y() + $B.Y())) / 2)]"
    );
}

#[test]
fn function_definition_body_uses_parameters() {
    let def = split_definition("f(x) = r*x^2").unwrap();
    let g = generate(&def.body, &mut Points);
    assert!(g.diagnostics.is_empty(), "{:?}", g.diagnostics);
    let expr = match g.outcome.into_value().unwrap() {
        ExprValue::Scalar { expr } => expr,
        other => panic!("expected scalar, got {:?}", other),
    };
    assert_eq!(expr.params(), vec!["x"]);
    assert_eq!(expr.referenced_names(), vec!["r"]);
}

#[test]
fn closed_expressions_need_no_scene() {
    let g = generate("1 + 2 * 3", &mut NoSymbols);
    assert!(g.outcome.is_clean());
    assert!(g.references.is_empty());
}

#[test]
fn unresolved_names_do_not_abort_generation() {
    let g = generate("Q + 1", &mut NoSymbols);
    assert!(!g.outcome.is_degraded());
    assert!(matches!(
        g.diagnostics.as_slice(),
        [CodegenDiagnostic::UnresolvedName { name }] if name == "Q"
    ));
}

#[test]
fn outcomes_serialize_with_status_tags() {
    let g = generate("(1", &mut NoSymbols);
    let json = serde_json::to_value(&g.outcome).unwrap();
    assert_eq!(json["result"]["status"], "degraded");
    assert_eq!(json["result"]["text"], "(1");
    assert_eq!(json["errors"][0]["offset"], 2);

    let g = generate("(1, 2)", &mut NoSymbols);
    let json = serde_json::to_value(&g.outcome).unwrap();
    assert_eq!(json["result"]["status"], "value");
    assert_eq!(json["result"]["value"]["shape"], "vector2");
    assert!(matches!(g.outcome.result, Parsed::Value { .. }));
}
