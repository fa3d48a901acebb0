//! Machine learning building blocks for the training and evaluation pipelines.
//!
//! Hand-built models with serde-serializable artifacts, evaluation metrics
//! and grid-search tuning.

pub mod forest;
pub mod metrics;
pub mod signature;
pub mod tuning;
