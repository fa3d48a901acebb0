//! Tabular dataset ingestion, schema handling and partitioning.

use std::path::PathBuf;

use thiserror::Error;

mod loader;
mod split;
mod table;

pub use loader::load_csv;
pub use split::{TrainTestSplit, train_test_split};
pub use table::{FeatureTable, TabularData, outcome_classes};

/// Column name of the binary label.
pub const LABEL_COLUMN: &str = "Outcome";

/// Errors that may occur while loading or partitioning a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Failed to open or read the dataset file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Dataset file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The file is not well-formed delimited text.
    #[error("Invalid delimited data in {path}: {source}")]
    Csv {
        /// Dataset file path.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
    /// A cell did not parse as a number.
    #[error("Row {row}, column {column:?}: {value:?} is not a number")]
    BadCell {
        /// Zero-based data row index (header excluded).
        row: usize,
        /// Column name from the header.
        column: String,
        /// Offending cell text.
        value: String,
    },
    /// The header has no column with the expected label name.
    #[error("Dataset has no label column named {0:?}")]
    MissingLabel(String),
    /// A label cell held something other than 0 or 1.
    #[error("Row {row}: label {value} is not a binary outcome")]
    NonBinaryLabel {
        /// Zero-based data row index.
        row: usize,
        /// Offending label value.
        value: f32,
    },
    /// The file contains a header but no data rows.
    #[error("Dataset has no data rows")]
    Empty,
    /// Too few rows to carve out the requested partition.
    #[error("Dataset has {rows} rows; need at least {min} to split")]
    TooSmall {
        /// Rows available.
        rows: usize,
        /// Rows required.
        min: usize,
    },
    /// The test fraction must leave rows on both sides.
    #[error("Test fraction {0} is outside (0, 1)")]
    BadFraction(f32),
    /// The dataset's feature columns differ from what the model was fitted on.
    #[error("Model expects features {expected:?} but dataset provides {found:?}")]
    FeatureMismatch {
        /// Feature names the model was fitted on.
        expected: Vec<String>,
        /// Feature names found in the dataset.
        found: Vec<String>,
    },
}
