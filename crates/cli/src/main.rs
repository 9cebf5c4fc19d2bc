mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{cmd_build, cmd_eval, cmd_parse, cmd_validate, ObjectDecl};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Construction document interpreter.
#[derive(Parser)]
#[command(name = "compass", version, about = "Construction document interpreter")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log interpreter progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and print the generated tree
    Parse {
        /// Expression source, e.g. "(A + B) / 2"
        expression: String,
        /// Declare a scene object as NAME or NAME:CAPABILITY
        /// (value, area, text, direction, length, generic)
        #[arg(long = "object", value_name = "NAME[:CAPABILITY]")]
        objects: Vec<ObjectDecl>,
    },

    /// Evaluate a closed expression
    Eval {
        /// Expression source, e.g. "sqrt(2) * PI"
        expression: String,
    },

    /// Validate a construction document against the JSON Schema
    Validate {
        /// Path to the construction document
        document: PathBuf,
    },

    /// Interpret a construction document into an in-memory scene
    Build {
        /// Path to the construction document
        document: PathBuf,
        /// Label precision, overriding the document's
        #[arg(long)]
        decimals: Option<u32>,
        /// Exit with status 1 when any diagnostic is reported
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Parse {
            expression,
            objects,
        } => {
            cmd_parse(&expression, &objects, cli.output, cli.quiet);
        }
        Commands::Eval { expression } => {
            cmd_eval(&expression, cli.output, cli.quiet);
        }
        Commands::Validate { document } => {
            cmd_validate(&document, cli.output, cli.quiet);
        }
        Commands::Build {
            document,
            decimals,
            strict,
        } => {
            cmd_build(&document, decimals, strict, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "warn",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Report an error message in the appropriate output format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
