use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that may occur while persisting or loading a model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Failed to read the model file.
    #[error("Failed to read model file {path}: {source}")]
    Read {
        /// Model file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to write the model file.
    #[error("Failed to write model file {path}: {source}")]
    Write {
        /// Model file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The file is not a valid serialized forest (truncated or incompatible).
    #[error("Model file {path} is not a valid forest artifact: {source}")]
    Json {
        /// Model file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The artifact parsed but violates a structural invariant.
    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Node of a fitted decision tree, stored in an index-addressed arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split: `feature <= threshold` goes left.
    Split {
        /// Feature index used for the split.
        feature_index: usize,
        /// Threshold in feature units.
        threshold: f32,
        /// Arena index of the left child.
        left: usize,
        /// Arena index of the right child.
        right: usize,
    },
    /// Leaf with per-class sample counts from fitting.
    Leaf {
        /// Training sample counts per class at this leaf.
        class_counts: Vec<u32>,
    },
}

/// Single fitted decision tree. Index 0 is the root; children always have
/// larger indices than their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node arena.
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk the tree for a feature vector and return the leaf's class counts.
    ///
    /// Returns `None` when the arena is malformed (dangling child index).
    pub fn leaf_counts(&self, features: &[f32]) -> Option<&[u32]> {
        let mut idx = 0usize;
        let mut hops = 0usize;
        loop {
            match self.nodes.get(idx)? {
                TreeNode::Leaf { class_counts } => return Some(class_counts),
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature_index).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
            hops += 1;
            if hops > self.nodes.len() {
                return None;
            }
        }
    }

    /// Maximum depth of the tree, root counted as depth 0.
    pub fn depth(&self) -> usize {
        fn depth_at(nodes: &[TreeNode], idx: usize, hops: usize) -> usize {
            if hops > nodes.len() {
                return hops;
            }
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => depth_at(nodes, *left, hops + 1)
                    .max(depth_at(nodes, *right, hops + 1)),
                _ => hops,
            }
        }
        depth_at(&self.nodes, 0, 0)
    }
}

/// Bagged ensemble of Gini-split decision trees for classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestModel {
    /// Model format version.
    pub model_version: i64,
    /// Feature names the model was fitted on, in matrix order.
    pub feature_names: Vec<String>,
    /// Ordered class identifiers.
    pub classes: Vec<String>,
    /// Fitted trees.
    pub trees: Vec<DecisionTree>,
}

impl RandomForestModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.classes.len() < 2 {
            return Err(ModelError::Invalid(
                "Model must contain at least 2 classes".to_string(),
            ));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("Model has no trees".to_string()));
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("Tree {tree_idx} is empty")));
            }
            for (node_idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split { left, right, .. } => {
                        for &child in [left, right] {
                            if child <= node_idx || child >= tree.nodes.len() {
                                return Err(ModelError::Invalid(format!(
                                    "Tree {tree_idx} node {node_idx} has child index {child} out of order",
                                )));
                            }
                        }
                    }
                    TreeNode::Leaf { class_counts } => {
                        if class_counts.len() != self.classes.len() {
                            return Err(ModelError::Invalid(format!(
                                "Tree {tree_idx} leaf {node_idx} has {} class counts but expected {}",
                                class_counts.len(),
                                self.classes.len()
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Fraction of trees voting for each class.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let mut votes = vec![0.0f32; self.classes.len()];
        let mut voters = 0usize;
        for tree in &self.trees {
            let Some(counts) = tree.leaf_counts(features) else {
                continue;
            };
            votes[argmax_u32(counts)] += 1.0;
            voters += 1;
        }
        if voters == 0 {
            return vec![1.0 / self.classes.len() as f32; self.classes.len()];
        }
        for vote in &mut votes {
            *vote /= voters as f32;
        }
        votes
    }

    /// Majority-vote class index for a feature vector.
    pub fn predict_class_index(&self, features: &[f32]) -> usize {
        argmax_f32(&self.predict_proba(features))
    }

    /// Load and validate a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|source| ModelError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Write the model to a JSON file, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ModelError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| ModelError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, bytes).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn argmax_u32(values: &[u32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = 0u32;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_val {
            best_val = value;
            best_idx = idx;
        }
    }
    best_idx
}

fn argmax_f32(values: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_val {
            best_val = value;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature_index: usize, threshold: f32) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    class_counts: vec![5, 0],
                },
                TreeNode::Leaf {
                    class_counts: vec![0, 5],
                },
            ],
        }
    }

    fn model() -> RandomForestModel {
        RandomForestModel {
            model_version: 1,
            feature_names: vec!["F1".into(), "F2".into()],
            classes: vec!["0".into(), "1".into()],
            trees: vec![stump(0, 0.5), stump(0, 0.5), stump(1, 10.0)],
        }
    }

    #[test]
    fn traversal_follows_thresholds() {
        let tree = stump(0, 0.5);
        assert_eq!(tree.leaf_counts(&[0.0, 0.0]), Some(&[5, 0][..]));
        assert_eq!(tree.leaf_counts(&[0.5, 0.0]), Some(&[5, 0][..]));
        assert_eq!(tree.leaf_counts(&[0.6, 0.0]), Some(&[0, 5][..]));
    }

    #[test]
    fn majority_vote_wins() {
        let model = model();
        // Two trees vote class 1 for F1 > 0.5, one votes class 0 for F2 <= 10.
        assert_eq!(model.predict_class_index(&[1.0, 0.0]), 1);
        assert_eq!(model.predict_class_index(&[0.0, 0.0]), 0);
        let proba = model.predict_proba(&[1.0, 0.0]);
        assert!((proba[1] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_dangling_children() {
        let mut broken = model();
        broken.trees[0].nodes[0] = TreeNode::Split {
            feature_index: 0,
            threshold: 0.5,
            left: 1,
            right: 9,
        };
        assert!(matches!(broken.validate(), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_wrong_leaf_width() {
        let mut broken = model();
        broken.trees[0].nodes[1] = TreeNode::Leaf {
            class_counts: vec![1, 2, 3],
        };
        assert!(matches!(broken.validate(), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = model();
        original.save_json(&path).unwrap();
        let loaded = RandomForestModel::load_json(&path).unwrap();
        assert_eq!(loaded.trees.len(), original.trees.len());
        assert_eq!(loaded.feature_names, original.feature_names);
        assert_eq!(
            loaded.predict_class_index(&[1.0, 0.0]),
            original.predict_class_index(&[1.0, 0.0])
        );
    }

    #[test]
    fn truncated_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let bytes = serde_json::to_vec(&model()).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let err = RandomForestModel::load_json(&path).unwrap_err();
        assert!(matches!(err, ModelError::Json { .. }));
    }

    #[test]
    fn depth_of_a_stump_is_one() {
        assert_eq!(stump(0, 0.5).depth(), 1);
        let leaf_only = DecisionTree {
            nodes: vec![TreeNode::Leaf {
                class_counts: vec![1, 0],
            }],
        };
        assert_eq!(leaf_only.depth(), 0);
    }
}
