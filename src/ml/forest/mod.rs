//! Bagged random-forest classifier with a serde-serializable artifact.

mod model;
mod train;

pub use model::{DecisionTree, ModelError, RandomForestModel, TreeNode};
pub use train::{ForestDataset, TrainOptions, train_forest};
