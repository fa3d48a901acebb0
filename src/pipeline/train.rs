//! Training pipeline: load, split, tune, fit, score, persist, track.

use std::path::PathBuf;

use tracing::info;

use super::{CV_FOLDS, PipelineError, TEST_FRACTION};
use crate::dataset::{self, LABEL_COLUMN, outcome_classes};
use crate::ml::forest::{ForestDataset, TrainOptions, train_forest};
use crate::ml::metrics::ConfusionMatrix;
use crate::ml::signature::infer_signature;
use crate::ml::tuning::{GridSearchReport, ParamGrid, grid_search};
use crate::params::TrainParams;
use crate::tracking::{DEFAULT_EXPERIMENT_ID, RunStatus, TrackingClient, TrackingRun};

/// What the training pipeline produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Accuracy on the held-out partition.
    pub accuracy: f32,
    /// Mean cross-validation accuracy of the winning candidate.
    pub cv_accuracy: f32,
    /// Hyperparameters of the winning candidate.
    pub best_options: TrainOptions,
    /// Where the model artifact was written.
    pub model_path: PathBuf,
    /// Records attached to the tracking run, when tracking was enabled.
    pub tracked_records: Option<usize>,
}

/// Run the full training pipeline.
///
/// Splits off a seeded 20% test partition, grid-searches the forest
/// hyperparameters with 3-fold cross-validation, refits the winner on the
/// training partition, scores the held-out rows, persists the model and
/// attaches params, metrics, signature and artifact path to a tracking run.
pub fn train(
    params: &TrainParams,
    tracker: Option<&TrackingClient>,
) -> Result<TrainOutcome, PipelineError> {
    let table = dataset::load_csv(&params.data)?;
    let features = table.split_label(LABEL_COLUMN)?;
    info!(
        rows = features.len(),
        features = features.feature_names.len(),
        "Loaded dataset from {}",
        params.data.display()
    );

    let mut run = match tracker {
        Some(client) => Some(TrackingRun::start(client, DEFAULT_EXPERIMENT_ID, "train")?),
        None => None,
    };

    let split = dataset::train_test_split(&features, TEST_FRACTION, params.random_state)?;
    let train_dataset = ForestDataset {
        feature_names: split.train.feature_names.clone(),
        classes: outcome_classes(),
        x: split.train.x.clone(),
        y: split.train.y.clone(),
    };

    let grid = ParamGrid::default().anchor(params.n_estimators, params.max_depth);
    let report = grid_search(&train_dataset, &grid, CV_FOLDS, params.random_state)
        .map_err(PipelineError::Training)?;
    info!(
        candidates = report.candidates.len(),
        cv_accuracy = report.best.mean_accuracy,
        "Grid search finished"
    );

    let model =
        train_forest(&train_dataset, &report.best.options).map_err(PipelineError::Training)?;

    let mut cm = ConfusionMatrix::new(model.classes.len());
    for (row, &truth) in split.test.x.iter().zip(split.test.y.iter()) {
        cm.add(truth, model.predict_class_index(row));
    }
    let accuracy = cm.accuracy();

    model.save_json(&params.model)?;
    info!("Model written to {}", params.model.display());

    let signature = infer_signature(&features.feature_names, LABEL_COLUMN);
    let tracked_records = match run.take() {
        Some(mut run) => {
            log_training_run(&mut run, params, &report, accuracy)?;
            run.set_tag("model_signature", &signature.to_json()?)?;
            run.set_tag("model_path", &params.model.display().to_string())?;
            Some(run.finish(RunStatus::Finished)?)
        }
        None => None,
    };

    Ok(TrainOutcome {
        accuracy,
        cv_accuracy: report.best.mean_accuracy,
        best_options: report.best.options.clone(),
        model_path: params.model.clone(),
        tracked_records,
    })
}

fn log_training_run(
    run: &mut TrackingRun<'_>,
    params: &TrainParams,
    report: &GridSearchReport,
    accuracy: f32,
) -> Result<(), PipelineError> {
    let best = &report.best.options;
    run.log_param("random_state", &params.random_state.to_string())?;
    run.log_param("n_estimators", &best.n_estimators.to_string())?;
    run.log_param(
        "max_depth",
        &best
            .max_depth
            .map(|depth| depth.to_string())
            .unwrap_or_else(|| "none".to_string()),
    )?;
    run.log_param("min_samples_split", &best.min_samples_split.to_string())?;
    run.log_param("min_samples_leaf", &best.min_samples_leaf.to_string())?;
    run.log_param("cv_folds", &report.folds.to_string())?;
    run.log_metric("cv_accuracy", report.best.mean_accuracy as f64)?;
    run.log_metric("accuracy", accuracy as f64)?;
    Ok(())
}
