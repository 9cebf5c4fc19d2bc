use std::collections::HashSet;

use thiserror::Error;

use crate::types::ConstructionDocument;

/// Errors while reading a construction document.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("invalid construction document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("element at index {index} has an empty id")]
    EmptyId { index: usize },
    #[error("duplicate element id '{id}'")]
    DuplicateElement { id: String },
    #[error("'{name}' is an output of more than one command")]
    DuplicateOutput { name: String },
}

/// Parse a construction document from JSON text.
pub fn from_json_str(src: &str) -> Result<ConstructionDocument, InterchangeError> {
    let document: ConstructionDocument = serde_json::from_str(src)?;
    check(&document)?;
    Ok(document)
}

/// Deserialize a construction document from an already-parsed JSON value.
pub fn from_value(value: serde_json::Value) -> Result<ConstructionDocument, InterchangeError> {
    let document: ConstructionDocument = serde_json::from_value(value)?;
    check(&document)?;
    Ok(document)
}

/// Structural checks serde cannot express: ids are non-empty and unique,
/// and every name is produced by at most one command.
///
/// A command with no outputs passes; the interpreter reports it.
pub fn check(document: &ConstructionDocument) -> Result<(), InterchangeError> {
    let mut ids = HashSet::new();
    for (index, element) in document.elements.iter().enumerate() {
        if element.id.is_empty() {
            return Err(InterchangeError::EmptyId { index });
        }
        if !ids.insert(element.id.as_str()) {
            return Err(InterchangeError::DuplicateElement {
                id: element.id.clone(),
            });
        }
    }

    let mut outputs = HashSet::new();
    for name in document.commands.iter().flat_map(|c| c.outputs.iter()) {
        if !outputs.insert(name.as_str()) {
            return Err(InterchangeError::DuplicateOutput { name: name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Input, InputRef, StartPoint};
    use serde_json::json;

    fn make_document(commands: serde_json::Value, elements: serde_json::Value) -> serde_json::Value {
        json!({
            "format": "compass/1",
            "commands": commands,
            "elements": elements
        })
    }

    #[test]
    fn test_empty_document() {
        let doc = from_value(json!({})).unwrap();
        assert!(doc.commands.is_empty());
        assert!(doc.elements.is_empty());
        assert_eq!(doc.decimals, None);
    }

    #[test]
    fn test_parse_points_and_command() {
        let doc = from_value(make_document(
            json!([{ "name": "Midpoint", "inputs": ["A", "B"], "outputs": ["M"] }]),
            json!([
                { "id": "M", "kind": "point" },
                { "id": "A", "kind": "point", "coords": { "x": 1, "y": 2 } },
                { "id": "B", "kind": "point", "coords": { "x": 3, "y": 4, "z": 1 } }
            ]),
        ))
        .unwrap();
        assert_eq!(doc.commands[0].tag(), "midpoint");
        assert_eq!(
            doc.commands[0].classified_inputs(),
            vec![InputRef::Reference("A"), InputRef::Reference("B")]
        );
        assert_eq!(doc.element("A").unwrap().position(), Some((1.0, 2.0)));
        assert_eq!(doc.element("M").unwrap().position(), None);
        assert_eq!(doc.producer("M").unwrap().name, "Midpoint");
        assert!(doc.producer("A").is_none());
    }

    #[test]
    fn test_parse_explicit_inputs() {
        let doc = from_value(make_document(
            json!([{
                "name": "Rotate",
                "inputs": [{ "ref": "P" }, { "literal": "30" }, "C"],
                "outputs": ["P'"]
            }]),
            json!([]),
        ))
        .unwrap();
        assert_eq!(
            doc.commands[0].inputs[0],
            Input::Reference {
                name: "P".to_owned()
            }
        );
        assert_eq!(
            doc.commands[0].classified_inputs(),
            vec![
                InputRef::Reference("P"),
                InputRef::Literal("30"),
                InputRef::Reference("C")
            ]
        );
    }

    #[test]
    fn test_parse_text_with_anchor_and_style() {
        let doc = from_value(make_document(
            json!([]),
            json!([{
                "id": "t",
                "kind": "text",
                "caption": "hello",
                "start_point": { "exp": "A" },
                "style": {
                    "color": { "r": 0, "g": 128, "b": 255, "alpha": 0.25 },
                    "show_label": false,
                    "line_type": 15
                }
            }]),
        ))
        .unwrap();
        let t = doc.element("t").unwrap();
        assert_eq!(
            t.start_point,
            Some(StartPoint::Expression {
                exp: "A".to_owned()
            })
        );
        assert_eq!(t.style.color.unwrap().hex(), "#0080ff");
        assert_eq!(t.style.show_label, Some(false));
        assert_eq!(t.style.line_type, Some(15));
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let err = from_value(make_document(
            json!([]),
            json!([
                { "id": "A", "kind": "point" },
                { "id": "A", "kind": "point" }
            ]),
        ))
        .unwrap_err();
        assert!(matches!(err, InterchangeError::DuplicateElement { ref id } if id == "A"));
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let err = from_value(make_document(
            json!([
                { "name": "Midpoint", "inputs": ["A", "B"], "outputs": ["M"] },
                { "name": "Point", "inputs": ["c"], "outputs": ["M"] }
            ]),
            json!([]),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "'M' is an output of more than one command");
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = from_value(make_document(json!([]), json!([{ "id": "", "kind": "point" }])))
            .unwrap_err();
        assert!(matches!(err, InterchangeError::EmptyId { index: 0 }));
    }

    #[test]
    fn test_command_without_outputs_is_accepted() {
        let doc = from_value(make_document(
            json!([{ "name": "Segment", "inputs": ["A", "B"] }]),
            json!([]),
        ))
        .unwrap();
        assert!(doc.commands[0].outputs.is_empty());
    }

    #[test]
    fn test_malformed_json_reported() {
        let err = from_json_str("{\"elements\": [").unwrap_err();
        assert!(matches!(err, InterchangeError::Json(_)));
        let err = from_json_str("{\"elements\": [{\"id\": \"A\"}]}").unwrap_err();
        assert!(err.to_string().contains("kind"), "{}", err);
    }
}
