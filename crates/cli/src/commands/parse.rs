use std::process;
use std::str::FromStr;

use compass_core::{generate, normalize_symbols, split_definition, Capability, Symbol, SymbolTable};

use crate::{report_error, OutputFormat};

/// A scene object declared on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectDecl {
    name: String,
    capability: Capability,
}

impl FromStr for ObjectDecl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, capability) = match s.split_once(':') {
            Some((name, cap)) => (name, parse_capability(cap)?),
            None => (s, Capability::Generic),
        };
        if !compass_core::lexer::is_identifier(name) {
            return Err(format!("'{}' is not an identifier", name));
        }
        Ok(ObjectDecl {
            name: name.to_owned(),
            capability,
        })
    }
}

fn parse_capability(s: &str) -> Result<Capability, String> {
    match s.to_ascii_lowercase().as_str() {
        "value" => Ok(Capability::NumericValue),
        "area" => Ok(Capability::Area),
        "text" => Ok(Capability::PlainText),
        "direction" => Ok(Capability::Direction),
        "length" => Ok(Capability::Length),
        "generic" => Ok(Capability::Generic),
        other => Err(format!("unknown capability '{}'", other)),
    }
}

struct Declared<'a>(&'a [ObjectDecl]);

impl SymbolTable for Declared<'_> {
    fn resolve(&mut self, name: &str) -> Symbol {
        self.0
            .iter()
            .find(|d| d.name == name)
            .map_or(Symbol::Unknown, |d| Symbol::Object(d.capability))
    }
}

pub(crate) fn cmd_parse(expression: &str, objects: &[ObjectDecl], output: OutputFormat, quiet: bool) {
    let normalized = normalize_symbols(expression);
    let (params, body) = match split_definition(&normalized) {
        Some(definition) => (definition.params, definition.body),
        None => (Vec::new(), normalized.into_owned()),
    };
    let generated = generate(&body, &mut Declared(objects));
    let degraded = generated.outcome.is_degraded();

    if !quiet {
        match output {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "params": params,
                    "outcome": generated.outcome,
                    "diagnostics": generated.diagnostics,
                    "references": generated.references,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
            OutputFormat::Text => {
                match generated.outcome.value() {
                    Some(value) if params.is_empty() => println!("{}", value),
                    Some(value) => println!("({}) => {}", params.join(", "), value),
                    None => println!("degraded: {}", body),
                }
                for err in &generated.outcome.errors {
                    eprintln!("  - {}", err);
                }
                if generated.outcome.suppressed_errors > 0 {
                    eprintln!("  ... and {} more", generated.outcome.suppressed_errors);
                }
                for note in &generated.diagnostics {
                    eprintln!("  note: {}", note);
                }
            }
        }
    }

    if degraded {
        report_error(
            &format!("could not parse '{}'", expression),
            output,
            quiet,
        );
        process::exit(1);
    }
}
