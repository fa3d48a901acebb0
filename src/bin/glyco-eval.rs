//! CLI entry point for the evaluation pipeline.

use std::path::PathBuf;

use glyco::logging;
use glyco::params::{DEFAULT_PARAMS_FILE, load_train_params};
use glyco::pipeline::{ScoreScope, TEST_FRACTION, evaluate};
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

    let params = load_train_params(&options.config).map_err(|err| err.to_string())?;
    let scope = if options.holdout {
        ScoreScope::Holdout {
            test_fraction: options.test_fraction,
            seed: options.seed.unwrap_or(params.random_state),
        }
    } else {
        ScoreScope::Full
    };

    let client = if options.no_track {
        None
    } else {
        let config = TrackingConfig::from_env().map_err(|err| err.to_string())?;
        if config.is_none() {
            tracing::warn!("Tracking disabled; {TRACKING_URI_VAR} is not set");
        }
        config.map(TrackingClient::new)
    };

    let outcome = evaluate(&params, scope, client.as_ref()).map_err(|err| err.to_string())?;

    println!(
        "model accuracy: {:.4} ({} rows)",
        outcome.accuracy, outcome.rows_scored
    );
    for (idx, stats) in outcome.confusion.per_class().iter().enumerate() {
        println!(
            "class {:>2} {:<4}  precision={:.3}  recall={:.3}  f1={:.3}  support={}",
            idx, outcome.classes[idx], stats.precision, stats.recall, stats.f1, stats.support
        );
    }
    println!("confusion matrix (rows=true, cols=pred):");
    for truth in 0..outcome.confusion.n_classes {
        let mut row = String::new();
        for pred in 0..outcome.confusion.n_classes {
            row.push_str(&format!("{:6}", outcome.confusion.get(truth, pred)));
        }
        println!("{row}");
    }
    if let Some(records) = outcome.tracked_records {
        println!("tracking records attached: {records}");
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: PathBuf,
    holdout: bool,
    test_fraction: f32,
    seed: Option<u64>,
    no_track: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config = PathBuf::from(DEFAULT_PARAMS_FILE);
    let mut holdout = false;
    let mut test_fraction = TEST_FRACTION;
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
            "--holdout" => {
                holdout = true;
            }
            "--test-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-fraction requires a value".to_string())?;
                test_fraction = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --test-fraction value: {value}"))?;
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
        holdout,
        test_fraction,
        seed,
        no_track,
    })
}

fn help_text() -> String {
    [
        "glyco-eval",
        "",
        "Scores a persisted forest model against a dataset and tracks the accuracy.",
        "",
        "Usage:",
        "  glyco-eval [--config params.toml] [options]",
        "",
        "Options:",
        "  --config <file>        Params document with a [train] section (default: params.toml).",
        "  --holdout              Score a seeded held-out partition instead of the full dataset.",
        "  --test-fraction <f32>  Held-out fraction used with --holdout (default: 0.2).",
        "  --seed <u64>           Partition seed used with --holdout (default: random_state).",
        "  --no-track             Skip the experiment tracker even when configured.",
    ]
    .join("\n")
}
