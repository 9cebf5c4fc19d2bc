use std::process;

use compass_core::{generate, normalize_symbols, ExprValue, NoSymbols};
use compass_eval::{evaluate_closed, EvalError, Value};

use crate::{report_error, OutputFormat};

pub(crate) fn cmd_eval(expression: &str, output: OutputFormat, quiet: bool) {
    let normalized = normalize_symbols(expression);
    let generated = generate(&normalized, &mut NoSymbols);

    if let Some(name) = generated.references.first() {
        let msg = format!(
            "error: '{}' needs a scene to evaluate (unknown name '{}')",
            expression, name
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    let value = match generated.outcome.into_value() {
        Some(value) => value,
        None => {
            let msg = format!("error: could not parse '{}'", expression);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let result: Result<Vec<Value>, EvalError> = match &value {
        ExprValue::Scalar { expr } => evaluate_closed(expr).map(|v| vec![v]),
        ExprValue::Vector2 { x, y } => {
            evaluate_closed(x).and_then(|x| Ok(vec![x, evaluate_closed(y)?]))
        }
    };
    let values = match result {
        Ok(values) => values,
        Err(e) => {
            let msg = format!("error: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = match values.as_slice() {
                [single] => serde_json::json!({ "value": single }),
                _ => serde_json::json!({ "value": values }),
            };
            println!("{}", json);
        }
        OutputFormat::Text => {
            let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
            match rendered.as_slice() {
                [single] => println!("{}", single),
                _ => println!("({})", rendered.join(", ")),
            }
        }
    }
}
