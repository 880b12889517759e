mod registry;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use nestgen_config::{
    ConfigError, GenerationConfig, ValidationReport, config_json_schema, load_config,
};
use nestgen_core::{Form, Type, Value, check_consistency};
use nestgen_generate::{GenerationEngine, GenerationError};
use registry::{RunContext, init_run_logging, start_run, write_triples};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent triple: {0}")]
    Inconsistent(String),
}

#[derive(Parser, Debug)]
#[command(name = "nestgen", version, about = "Nested array triple generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate triples into a new run directory.
    Generate(GenerateArgs),
    /// Print the JSON Schema of generation configs.
    Schema(SchemaArgs),
    /// Validate a generation config.
    Validate(ValidateArgs),
    /// Check a JSON triple (any subset of type, form and value) for consistency.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Config file (TOML or JSON); defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the config's seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Override the config's triple count.
    #[arg(long)]
    count: Option<usize>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Optional extra NDJSON output path.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Mirror log events to stderr.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    config: PathBuf,
}

#[derive(Args, Debug)]
struct CheckArgs {
    triple: PathBuf,
}

/// A possibly partial triple read from disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TripleDocument {
    #[serde(default, rename = "type")]
    ty: Option<Type>,
    #[serde(default)]
    form: Option<Form>,
    #[serde(default)]
    value: Option<Value>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Schema(args) => run_schema(args),
        Command::Validate(args) => run_validate(args),
        Command::Check(args) => run_check(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        config: config_path,
        seed,
        count,
        run_dir,
        out,
        verbose,
    } = args;

    let mut config = match &config_path {
        Some(path) => load_config(path)?.config,
        None => GenerationConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(count) = count {
        config.count = count;
    }

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir,
        config_path,
        config: config.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path, verbose)?;

    tracing::info!(event = "run_started", run_id = %run_id, seed = config.seed, count = config.count);
    let timer = Instant::now();

    let engine = GenerationEngine::from_config(&config);
    let request = GenerationEngine::request_for(&config);
    let outputs = match engine.run(&request, config.seed, config.count) {
        Ok(outputs) => outputs,
        Err(err) => {
            tracing::error!(event = "run_failed", error = %err);
            return Err(err.into());
        }
    };

    write_triples(&run_paths, &outputs, out.as_deref())?;
    tracing::info!(
        event = "triples_written",
        path = %run_paths.triples_path.display(),
        count = outputs.len()
    );

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);

    println!("run_dir={}", run_paths.root.display());
    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = serde_json::to_string_pretty(&config_json_schema())?;
    match args.out {
        Some(path) => write_text(&path, &schema)?,
        None => println!("{schema}"),
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    match load_config(&args.config) {
        Ok(validated) => {
            if validated.warnings.is_empty() {
                println!("config validated successfully");
            } else {
                eprintln!("config validated with warnings:");
                print_report(&ValidationReport {
                    errors: Vec::new(),
                    warnings: validated.warnings,
                });
            }
            Ok(())
        }
        Err(ConfigError::Invalid(report)) => {
            print_report(&report);
            Err(ConfigError::Invalid(report).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_check(args: CheckArgs) -> Result<(), CliError> {
    let contents = std::fs::read_to_string(&args.triple)?;
    let document: TripleDocument = serde_json::from_str(&contents)?;
    check_consistency(
        document.ty.as_ref(),
        document.form.as_ref(),
        document.value.as_ref(),
    )
    .map_err(|violation| CliError::Inconsistent(violation.to_string()))?;
    println!("triple is consistent");
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in report.issues() {
        eprintln!("{issue}");
    }
}

fn write_text(path: &Path, text: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}
