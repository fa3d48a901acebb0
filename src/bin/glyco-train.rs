//! CLI entry point for the training pipeline.

use std::path::PathBuf;

use glyco::logging;
use glyco::params::{DEFAULT_PARAMS_FILE, load_train_params};
use glyco::pipeline::train;
use glyco::tracking::{TRACKING_URI_VAR, TrackingClient, TrackingConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging unavailable: {err}");
    }

    let mut params = load_train_params(&options.config).map_err(|err| err.to_string())?;
    if let Some(seed) = options.seed {
        params.random_state = seed;
    }

    let client = if options.no_track {
        None
    } else {
        let config = TrackingConfig::from_env().map_err(|err| err.to_string())?;
        if config.is_none() {
            tracing::warn!("Tracking disabled; {TRACKING_URI_VAR} is not set");
        }
        config.map(TrackingClient::new)
    };

    let outcome = train(&params, client.as_ref()).map_err(|err| err.to_string())?;

    println!("accuracy: {:.4}", outcome.accuracy);
    println!("cv accuracy: {:.4}", outcome.cv_accuracy);
    println!("model written to {}", outcome.model_path.display());
    if let Some(records) = outcome.tracked_records {
        println!("tracking records attached: {records}");
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: PathBuf,
    seed: Option<u64>,
    no_track: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config = PathBuf::from(DEFAULT_PARAMS_FILE);
    let mut seed: Option<u64> = None;
    let mut no_track = false;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = PathBuf::from(value);
            }
            "--seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--no-track" => {
                no_track = true;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        config,
        seed,
        no_track,
    })
}

fn help_text() -> String {
    [
        "glyco-train",
        "",
        "Trains a random-forest outcome classifier with grid-search tuning.",
        "",
        "Usage:",
        "  glyco-train [--config params.toml] [options]",
        "",
        "Options:",
        "  --config <file>  Params document with a [train] section (default: params.toml).",
        "  --seed <u64>     Override the configured random_state.",
        "  --no-track       Skip the experiment tracker even when configured.",
    ]
    .join("\n")
}
