//! Source normalization applied before lexing.
//!
//! Documents spell some operators and constants with Unicode symbols the
//! lexer does not accept.

use std::borrow::Cow;

const REPLACEMENTS: [(char, &str); 9] = [
    ('π', "PI"),
    ('²', "^2"),
    ('³', "^3"),
    ('≟', "=="),
    ('≠', "!="),
    ('≤', "<="),
    ('≥', ">="),
    ('∧', "&&"),
    ('∨', "||"),
];

fn replacement(c: char) -> Option<&'static str> {
    REPLACEMENTS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// Replace Unicode operator symbols with their ASCII spelling.
pub fn normalize_symbols(src: &str) -> Cow<'_, str> {
    if !src.chars().any(|c| replacement(c).is_some()) {
        return Cow::Borrowed(src);
    }
    let mut out = String::with_capacity(src.len() + 8);
    for c in src.chars() {
        match replacement(c) {
            Some(to) => out.push_str(to),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}
