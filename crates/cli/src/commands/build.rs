use std::path::Path;
use std::process;

use compass_construct::{
    interpret, Binding, InterpreterOptions, Measurements, MemoryScene, NamedElement,
};
use serde::Serialize;

use crate::{report_error, OutputFormat};

#[derive(Serialize)]
struct BuiltObject<'a> {
    #[serde(flatten)]
    element: &'a NamedElement,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurements: Option<Measurements>,
}

pub(crate) fn cmd_build(
    document_path: &Path,
    decimals: Option<u32>,
    strict: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let doc_str = match std::fs::read_to_string(document_path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", document_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let document = match compass_interchange::from_json_str(&doc_str) {
        Ok(d) => d,
        Err(e) => {
            let msg = format!("error in '{}': {}", document_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let options = InterpreterOptions {
        decimals,
        ..InterpreterOptions::default()
    };
    let mut scene = MemoryScene::new();
    let result = interpret(&document, &mut scene, &options);

    let objects: Vec<BuiltObject<'_>> = result
        .registry
        .iter()
        .map(|element| BuiltObject {
            element,
            measurements: element
                .binding
                .as_object()
                .map(|object| scene.measure(object.handle)),
        })
        .collect();

    if !quiet {
        match output {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "objects": objects,
                    "diagnostics": result.diagnostics,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
            OutputFormat::Text => {
                for object in &objects {
                    println!("{}", render(object));
                }
                for diagnostic in &result.diagnostics {
                    eprintln!("warning: {}", diagnostic);
                }
                println!(
                    "{} names, {} scene objects, {} diagnostics",
                    result.registry.len(),
                    scene.len(),
                    result.diagnostics.len()
                );
            }
        }
    }

    if strict && !result.diagnostics.is_empty() {
        process::exit(1);
    }
}

fn render(object: &BuiltObject<'_>) -> String {
    let element = object.element;
    let mut line = format!("{} ({})", element.name, element.kind);
    match &element.binding {
        Binding::NoObject => line.push_str(": no object"),
        Binding::Value { value } => line.push_str(&format!(" = {}", value.describe())),
        Binding::Object { object: scene_object } => {
            line.push_str(&format!(" {} {}", scene_object.tag, scene_object.handle));
        }
    }
    if let Some(m) = &object.measurements {
        if let (Some(x), Some(y)) = (m.x, m.y) {
            line.push_str(&format!(" at ({}, {})", x, y));
        }
        if let Some(value) = m.value {
            line.push_str(&format!(" value {}", value));
        }
        if let Some(length) = m.length {
            line.push_str(&format!(" length {}", length));
        }
        if let Some(area) = m.area {
            line.push_str(&format!(" area {}", area));
        }
        if let Some(text) = &m.text {
            line.push_str(&format!(" text {:?}", text));
        }
    }
    line
}
