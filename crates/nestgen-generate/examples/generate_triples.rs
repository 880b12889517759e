use std::env;
use std::path::PathBuf;

use nestgen_config::{GenerationConfig, load_config};
use nestgen_generate::GenerationEngine;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;
    let mut count: Option<usize> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--seed" => seed = args.next().map(|value| value.parse()).transpose()?,
            "--count" => count = args.next().map(|value| value.parse()).transpose()?,
            _ => return Err(format!("unexpected argument {arg}").into()),
        }
    }

    let config = match config_path {
        Some(path) => load_config(&path)?.config,
        None => GenerationConfig::default(),
    };

    let engine = GenerationEngine::from_config(&config);
    let request = GenerationEngine::request_for(&config);
    let outputs = engine.run(
        &request,
        seed.unwrap_or(config.seed),
        count.unwrap_or(config.count),
    )?;

    for output in outputs {
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}
