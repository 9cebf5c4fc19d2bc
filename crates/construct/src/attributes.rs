//! Display-attribute derivation shared by every builder.

use compass_interchange::{Color, Element, ElementStyle};

use crate::scene::Attributes;

/// Marker shape for a document point style.
pub fn face(point_style: u32) -> &'static str {
    match point_style {
        1 => "cross",
        3 => "plus",
        4 | 5 => "diamond",
        6 => "triangleup",
        7 => "triangledown",
        8 => "triangleright",
        9 => "triangleleft",
        _ => "circle",
    }
}

/// Dash pattern index for a document line type.
pub fn dash(line_type: u32) -> u32 {
    match line_type {
        10 => 2,
        15 => 3,
        20 => 1,
        30 => 6,
        _ => 0,
    }
}

/// Attributes for the object called `name`, described by `element` when the
/// document has one.
pub fn derive(name: &str, kind: &str, element: Option<&Element>) -> Attributes {
    let mut attrs = Attributes::new().with("name", name);
    let Some(element) = element else {
        if kind == "point" {
            attrs.set("face", "circle");
        }
        return attrs;
    };

    if let Some(caption) = &element.caption {
        attrs.set("label", caption.as_str());
    }
    apply_style(&mut attrs, &element.style, kind);
    attrs
}

fn apply_style(attrs: &mut Attributes, style: &ElementStyle, kind: &str) {
    if let Some(color) = &style.color {
        apply_color(attrs, color);
    }
    if let Some(show) = style.show_object {
        attrs.set("visible", show);
    }
    if let Some(show) = style.show_label {
        attrs.set("withLabel", show);
    }
    if let Some(size) = style.point_size {
        attrs.set("size", size);
    }
    match style.point_style {
        Some(s) => attrs.set("face", face(s)),
        None if kind == "point" => attrs.set("face", "circle"),
        None => {}
    }
    if let Some(thickness) = style.line_thickness {
        attrs.set("strokeWidth", thickness / 2.0);
    }
    if let Some(line_type) = style.line_type {
        attrs.set("dash", dash(line_type));
    }
    if let Some(offset) = &style.label_offset {
        attrs.set("labelOffset", vec![offset.x, offset.y]);
    }
    if let Some(trace) = style.trace {
        attrs.set("trace", trace);
    }
    if let Some(fixed) = style.fixed {
        attrs.set("fixed", fixed);
    }
}

fn apply_color(attrs: &mut Attributes, color: &Color) {
    let hex = color.hex();
    for key in ["strokeColor", "fillColor", "highlightFillColor", "labelColor"] {
        attrs.set(key, hex.as_str());
    }
    if let Some(alpha) = color.alpha {
        attrs.set("fillOpacity", alpha);
    }
}
