//! Typed structs for the construction document JSON format.
//!
//! A document is two flat lists: the commands that derive objects from
//! other objects, and the elements that describe every named object.
//! Order in either list carries no meaning; references may point forward.

use serde::{Deserialize, Serialize};

/// Top-level construction document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConstructionDocument {
    /// Format identifier written by the producing application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Preferred rounding for displayed values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl ConstructionDocument {
    /// Linear lookup of an element by id.
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// The command listing `name` among its outputs.
    pub fn producer(&self, name: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.outputs.iter().any(|o| o == name))
    }
}

// ──────────────────────────────────────────────
// Commands
// ──────────────────────────────────────────────

/// A construction step: `name(inputs...) -> outputs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Command {
    /// Inputs with plain strings classified as references or literals.
    pub fn classified_inputs(&self) -> Vec<InputRef<'_>> {
        self.inputs
            .iter()
            .map(|input| input.classify(&self.name))
            .collect()
    }

    /// Lowercased command name used for builder dispatch.
    pub fn tag(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// A command argument as written in the document.
///
/// Explicit `{"ref": ..}` and `{"literal": ..}` objects say what they are.
/// A bare string is classified by [`Input::classify`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Input {
    Reference {
        #[serde(rename = "ref")]
        name: String,
    },
    Literal {
        literal: String,
    },
    Plain(String),
}

/// A classified command argument borrowed from its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRef<'a> {
    Reference(&'a str),
    Literal(&'a str),
}

impl<'a> InputRef<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            InputRef::Reference(s) | InputRef::Literal(s) => s,
        }
    }
}

impl Input {
    pub fn text(&self) -> &str {
        match self {
            Input::Reference { name } => name,
            Input::Literal { literal } => literal,
            Input::Plain(s) => s,
        }
    }

    /// Decide whether an argument names an object or is literal text.
    ///
    /// Plain strings are literal when they hold an angle (`°`), a number,
    /// a circle descriptor, or any argument of a `Function` command.
    pub fn classify(&self, command: &str) -> InputRef<'_> {
        match self {
            Input::Reference { name } => InputRef::Reference(name),
            Input::Literal { literal } => InputRef::Literal(literal),
            Input::Plain(s) => {
                if is_literal_text(s) || command.eq_ignore_ascii_case("function") {
                    InputRef::Literal(s)
                } else {
                    InputRef::Reference(s)
                }
            }
        }
    }
}

fn is_literal_text(s: &str) -> bool {
    let trimmed = s.trim();
    s.contains('°')
        || s.contains("Circle")
        || (!trimmed.is_empty() && trimmed.parse::<f64>().is_ok())
}

// ──────────────────────────────────────────────
// Elements
// ──────────────────────────────────────────────

/// Descriptor of one named object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    pub id: String,
    /// Lowercase object type, e.g. `point`, `segment`, `numeric`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coords>,
    /// Source text for expression-defined objects (`f(x) = ...`, `a + 1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Anchor of a text label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_point: Option<StartPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slider: Option<Slider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "ElementStyle::is_empty")]
    pub style: ElementStyle,
}

impl Element {
    /// Cartesian position, dividing through by a non-zero `z`.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.coords.as_ref().map(Coords::cartesian)
    }
}

/// Homogeneous coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    #[serde(default = "unit")]
    pub z: f64,
}

fn unit() -> f64 {
    1.0
}

impl Coords {
    pub fn cartesian(&self) -> (f64, f64) {
        if self.z == 0.0 || self.z == 1.0 {
            (self.x, self.y)
        } else {
            (self.x / self.z, self.y / self.z)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StartPoint {
    /// Anchored to another object, or an expression over objects.
    Expression { exp: String },
    Absolute(Coords),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slider {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

// ──────────────────────────────────────────────
// Style
// ──────────────────────────────────────────────

/// Visual properties. Every field is optional; absent means "use the
/// scene's default".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_object: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_label: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_style: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_offset: Option<Offset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<bool>,
}

impl ElementStyle {
    pub fn is_empty(&self) -> bool {
        self == &ElementStyle::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl Color {
    /// `#rrggbb` form.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Input {
        Input::Plain(s.to_owned())
    }

    #[test]
    fn test_plain_inputs_are_classified() {
        assert_eq!(plain("A").classify("Segment"), InputRef::Reference("A"));
        assert_eq!(plain("45°").classify("Rotate"), InputRef::Literal("45°"));
        assert_eq!(plain("3").classify("Polygon"), InputRef::Literal("3"));
        assert_eq!(plain("-2.5").classify("Dilate"), InputRef::Literal("-2.5"));
        assert_eq!(
            plain("xAxisCircle").classify("Intersect"),
            InputRef::Literal("xAxisCircle")
        );
        assert_eq!(plain("f").classify("Function"), InputRef::Literal("f"));
    }

    #[test]
    fn test_explicit_inputs_win_over_classification() {
        let input = Input::Reference {
            name: "3".to_owned(),
        };
        assert_eq!(input.classify("Polygon"), InputRef::Reference("3"));
        let input = Input::Literal {
            literal: "A".to_owned(),
        };
        assert_eq!(input.classify("Segment"), InputRef::Literal("A"));
    }

    #[test]
    fn test_homogeneous_coords_are_projected() {
        let c = Coords {
            x: 4.0,
            y: 6.0,
            z: 2.0,
        };
        assert_eq!(c.cartesian(), (2.0, 3.0));
        let c = Coords {
            x: 1.0,
            y: 0.0,
            z: 0.0,
        };
        assert_eq!(c.cartesian(), (1.0, 0.0));
    }

    #[test]
    fn test_color_hex() {
        let c = Color {
            r: 255,
            g: 0,
            b: 16,
            alpha: None,
        };
        assert_eq!(c.hex(), "#ff0010");
    }
}
