//! Evaluation pipeline: load a persisted model and score a dataset.

use tracing::info;

use super::PipelineError;
use crate::dataset::{self, DatasetError, FeatureTable, LABEL_COLUMN};
use crate::ml::forest::RandomForestModel;
use crate::ml::metrics::ConfusionMatrix;
use crate::params::TrainParams;
use crate::tracking::{DEFAULT_EXPERIMENT_ID, RunStatus, TrackingClient, TrackingRun};

/// Which rows the evaluation accuracy is computed over.
///
/// Scoring the full dataset reproduces in-sample accuracy when the dataset
/// is the training file; a held-out partition estimates generalization. The
/// two measure different things, so the caller must pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreScope {
    /// Score every row of the provided dataset.
    Full,
    /// Score a seeded held-out partition of the dataset.
    Holdout {
        /// Fraction of rows held out for scoring.
        test_fraction: f32,
        /// Seed for the partition shuffle.
        seed: u64,
    },
}

/// What the evaluation pipeline produced.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// Accuracy over the scored rows.
    pub accuracy: f32,
    /// Number of rows scored.
    pub rows_scored: usize,
    /// Class identifiers in confusion-matrix order.
    pub classes: Vec<String>,
    /// Truth-by-prediction counts over the scored rows.
    pub confusion: ConfusionMatrix,
    /// Records attached to the tracking run, when tracking was enabled.
    pub tracked_records: Option<usize>,
}

/// Score a persisted model against a dataset and track the accuracy metric.
///
/// The dataset's feature columns must match the columns the model was
/// fitted on; a mismatch fails before any prediction is attempted.
pub fn evaluate(
    params: &TrainParams,
    scope: ScoreScope,
    tracker: Option<&TrackingClient>,
) -> Result<EvalOutcome, PipelineError> {
    let table = dataset::load_csv(&params.data)?;
    let features = table.split_label(LABEL_COLUMN)?;

    let model = RandomForestModel::load_json(&params.model)?;
    if model.feature_names != features.feature_names {
        return Err(DatasetError::FeatureMismatch {
            expected: model.feature_names.clone(),
            found: features.feature_names.clone(),
        }
        .into());
    }

    let scored: FeatureTable = match scope {
        ScoreScope::Full => features,
        ScoreScope::Holdout {
            test_fraction,
            seed,
        } => dataset::train_test_split(&features, test_fraction, seed)?.test,
    };

    let mut cm = ConfusionMatrix::new(model.classes.len());
    for (row, &truth) in scored.x.iter().zip(scored.y.iter()) {
        cm.add(truth, model.predict_class_index(row));
    }
    let accuracy = cm.accuracy();
    info!(
        rows = scored.len(),
        accuracy,
        "Scored {} with model {}",
        params.data.display(),
        params.model.display()
    );

    let tracked_records = match tracker {
        Some(client) => {
            let mut run = TrackingRun::start(client, DEFAULT_EXPERIMENT_ID, "evaluate")?;
            run.log_metric("accuracy", accuracy as f64)?;
            Some(run.finish(RunStatus::Finished)?)
        }
        None => None,
    };

    Ok(EvalOutcome {
        accuracy,
        rows_scored: scored.len(),
        classes: model.classes.clone(),
        confusion: cm,
        tracked_records,
    })
}
