//! End-to-end training and evaluation pipelines.
//!
//! Both operations are single-pass and linear; errors propagate to the
//! caller, and an open tracking run is closed as failed on the way out.

mod evaluate;
mod train;

pub use evaluate::{EvalOutcome, ScoreScope, evaluate};
pub use train::{TrainOutcome, train};

use thiserror::Error;

use crate::dataset::DatasetError;
use crate::ml::forest::ModelError;
use crate::tracking::TrackingError;

/// Fraction of rows held out for testing by the training pipeline.
pub const TEST_FRACTION: f32 = 0.2;
/// Fold count used by grid-search cross-validation.
pub const CV_FOLDS: usize = 3;

/// Errors surfaced by the pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Grid search or forest fitting failed.
    #[error("Training failed: {0}")]
    Training(String),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    /// The model signature could not be encoded for the tracker.
    #[error("Failed to encode model signature: {0}")]
    Signature(#[from] serde_json::Error),
}
