//! Name lookups over one construction document.

use std::collections::HashMap;

use compass_interchange::{Command, ConstructionDocument, Element};

/// Where each name in a document is defined.
#[derive(Debug, Clone)]
pub struct DocumentIndex<'d> {
    elements: HashMap<&'d str, &'d Element>,
    producers: HashMap<&'d str, &'d Command>,
    expressions: HashMap<&'d str, &'d Element>,
}

impl<'d> DocumentIndex<'d> {
    pub fn new(document: &'d ConstructionDocument) -> Self {
        let mut elements = HashMap::new();
        let mut expressions = HashMap::new();
        for element in &document.elements {
            elements.entry(element.id.as_str()).or_insert(element);
            if let Some(expression) = &element.expression {
                expressions.entry(expression.trim()).or_insert(element);
            }
        }
        let mut producers = HashMap::new();
        for command in &document.commands {
            for output in &command.outputs {
                producers.entry(output.as_str()).or_insert(command);
            }
        }
        DocumentIndex {
            elements,
            producers,
            expressions,
        }
    }

    pub fn element(&self, name: &str) -> Option<&'d Element> {
        self.elements.get(name).copied()
    }

    /// The command listing `name` among its outputs.
    pub fn producer(&self, name: &str) -> Option<&'d Command> {
        self.producers.get(name).copied()
    }

    /// The element whose defining expression is exactly `text`.
    pub fn by_expression(&self, text: &str) -> Option<&'d Element> {
        self.expressions.get(text.trim()).copied()
    }

    /// Whether the document can construct `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.elements.contains_key(name)
            || self.producers.contains_key(name)
            || self.expressions.contains_key(name.trim())
    }
}
