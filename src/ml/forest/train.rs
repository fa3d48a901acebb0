use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};

use super::model::{DecisionTree, RandomForestModel, TreeNode};

/// Number of bins used for threshold search at each split.
const SPLIT_BINS: usize = 32;

/// Training hyperparameters for the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOptions {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,
    /// Depth limit per tree; `None` grows until nodes are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split.
    pub min_samples_split: usize,
    /// Minimum samples each side of a split must keep.
    pub min_samples_leaf: usize,
    /// Seed for bootstrap resampling and feature subsampling.
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// In-memory dataset used for training and cross-validation.
#[derive(Debug, Clone)]
pub struct ForestDataset {
    /// Feature column names, matrix order.
    pub feature_names: Vec<String>,
    /// Ordered list of class identifiers.
    pub classes: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

/// Train a bagged forest of Gini-split decision trees.
///
/// Each tree fits a bootstrap resample and considers a random
/// sqrt-of-features subset at every split. All randomness derives from
/// `options.seed`, so identical inputs produce an identical forest.
pub fn train_forest(
    dataset: &ForestDataset,
    options: &TrainOptions,
) -> Result<RandomForestModel, String> {
    if dataset.x.is_empty() {
        return Err("Empty training set".to_string());
    }
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched training inputs/labels".to_string());
    }
    let n_classes = dataset.classes.len();
    if n_classes < 2 {
        return Err("Need at least 2 classes".to_string());
    }
    if options.n_estimators == 0 {
        return Err("n_estimators must be at least 1".to_string());
    }
    if options.min_samples_split < 2 {
        return Err("min_samples_split must be at least 2".to_string());
    }
    if options.min_samples_leaf == 0 {
        return Err("min_samples_leaf must be at least 1".to_string());
    }
    let n_features = dataset.feature_names.len();
    for row in &dataset.x {
        if row.len() != n_features {
            return Err(format!(
                "Inconsistent feature row length {} (expected {n_features})",
                row.len()
            ));
        }
    }
    for &label in &dataset.y {
        if label >= n_classes {
            return Err(format!("Label index {label} outside {n_classes} classes"));
        }
    }

    let n = dataset.x.len();
    let features_per_split = ((n_features as f32).sqrt().round() as usize)
        .clamp(1, n_features.max(1));

    let mut master = StdRng::seed_from_u64(options.seed);
    let mut trees = Vec::with_capacity(options.n_estimators);
    for _ in 0..options.n_estimators {
        let tree_seed: u64 = master.random();
        let mut rng = StdRng::seed_from_u64(tree_seed);
        let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
        let mut builder = TreeBuilder {
            x: &dataset.x,
            y: &dataset.y,
            n_classes,
            n_features,
            features_per_split,
            max_depth: options.max_depth,
            min_samples_split: options.min_samples_split,
            min_samples_leaf: options.min_samples_leaf,
            nodes: Vec::new(),
            rng,
        };
        builder.grow(sample, 0);
        trees.push(DecisionTree {
            nodes: builder.nodes,
        });
    }

    Ok(RandomForestModel {
        model_version: 1,
        feature_names: dataset.feature_names.clone(),
        classes: dataset.classes.clone(),
        trees,
    })
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f32>],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    features_per_split: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    nodes: Vec<TreeNode>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy)]
struct CandidateSplit {
    feature_index: usize,
    threshold: f32,
    score: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `indices` and return its arena index.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            class_counts: counts.clone(),
        });

        if self.is_terminal(&indices, &counts, depth) {
            return node_idx;
        }
        let Some(split) = self.best_split(&indices) else {
            return node_idx;
        };

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for &row in &indices {
            if self.x[row][split.feature_index] <= split.threshold {
                left_rows.push(row);
            } else {
                right_rows.push(row);
            }
        }
        // Binned scoring approximates the realized partition; re-check it.
        if left_rows.len() < self.min_samples_leaf || right_rows.len() < self.min_samples_leaf {
            return node_idx;
        }

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature_index: split.feature_index,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<u32> {
        let mut counts = vec![0u32; self.n_classes];
        for &row in indices {
            counts[self.y[row]] += 1;
        }
        counts
    }

    fn is_terminal(&self, indices: &[usize], counts: &[u32], depth: usize) -> bool {
        indices.len() < self.min_samples_split
            || counts.iter().filter(|&&count| count > 0).count() <= 1
            || self.max_depth.is_some_and(|limit| depth >= limit)
    }

    fn best_split(&mut self, indices: &[usize]) -> Option<CandidateSplit> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.features_per_split);

        let mut best: Option<CandidateSplit> = None;
        for &feature_idx in &features {
            let Some(split) = self.best_split_for_feature(indices, feature_idx) else {
                continue;
            };
            if best.is_none_or(|current| split.score < current.score) {
                best = Some(split);
            }
        }
        best
    }

    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<CandidateSplit> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &row in indices {
            let value = self.x[row][feature_idx];
            if value.is_finite() {
                min = min.min(value);
                max = max.max(value);
            }
        }
        if !min.is_finite() || min == max {
            return None;
        }

        let mut bin_counts = vec![0u32; SPLIT_BINS * self.n_classes];
        let mut bin_totals = vec![0u32; SPLIT_BINS];
        for &row in indices {
            let value = self.x[row][feature_idx];
            let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
            let bin = (t * (SPLIT_BINS - 1) as f32).round() as usize;
            bin_counts[bin * self.n_classes + self.y[row]] += 1;
            bin_totals[bin] += 1;
        }

        let total: u32 = bin_totals.iter().sum();
        let total_counts = {
            let mut counts = vec![0u32; self.n_classes];
            for bin in 0..SPLIT_BINS {
                for class in 0..self.n_classes {
                    counts[class] += bin_counts[bin * self.n_classes + class];
                }
            }
            counts
        };

        let mut best_score = f64::INFINITY;
        let mut best_bin = None;
        let mut left_counts = vec![0u32; self.n_classes];
        let mut left_total = 0u32;

        for split_bin in 0..(SPLIT_BINS - 1) {
            for class in 0..self.n_classes {
                left_counts[class] += bin_counts[split_bin * self.n_classes + class];
            }
            left_total += bin_totals[split_bin];
            let right_total = total - left_total;
            if (left_total as usize) < self.min_samples_leaf
                || (right_total as usize) < self.min_samples_leaf
            {
                continue;
            }
            let right_counts: Vec<u32> = total_counts
                .iter()
                .zip(left_counts.iter())
                .map(|(&all, &left)| all - left)
                .collect();
            let score = weighted_gini(&left_counts, left_total)
                + weighted_gini(&right_counts, right_total);
            if score < best_score {
                best_score = score;
                best_bin = Some(split_bin);
            }
        }

        let split_bin = best_bin?;
        let threshold = min + ((split_bin + 1) as f32 / SPLIT_BINS as f32) * (max - min);
        Some(CandidateSplit {
            feature_index: feature_idx,
            threshold,
            score: best_score,
        })
    }
}

/// Gini impurity of one side, weighted by the side's sample count.
fn weighted_gini(counts: &[u32], total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total_f = total as f64;
    let mut sum_sq = 0.0f64;
    for &count in counts {
        let p = count as f64 / total_f;
        sum_sq += p * p;
    }
    total_f * (1.0 - sum_sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(rows: usize) -> ForestDataset {
        // Class 1 iff F1 > 0.5; F2 is noise-free ballast.
        let x: Vec<Vec<f32>> = (0..rows)
            .map(|i| {
                let v = i as f32 / rows as f32;
                vec![v, 1.0 - v]
            })
            .collect();
        let y: Vec<usize> = x.iter().map(|row| usize::from(row[0] > 0.5)).collect();
        ForestDataset {
            feature_names: vec!["F1".into(), "F2".into()],
            classes: vec!["0".into(), "1".into()],
            x,
            y,
        }
    }

    fn in_sample_accuracy(model: &RandomForestModel, dataset: &ForestDataset) -> f32 {
        let correct = dataset
            .x
            .iter()
            .zip(dataset.y.iter())
            .filter(|&(ref row, &truth)| model.predict_class_index(row) == truth)
            .count();
        correct as f32 / dataset.x.len() as f32
    }

    #[test]
    fn learns_a_separable_dataset() {
        let dataset = separable(60);
        let options = TrainOptions {
            n_estimators: 25,
            ..TrainOptions::default()
        };
        let model = train_forest(&dataset, &options).unwrap();
        assert_eq!(model.trees.len(), 25);
        assert!(in_sample_accuracy(&model, &dataset) >= 0.95);
        model.validate().unwrap();
    }

    #[test]
    fn same_seed_same_forest() {
        let dataset = separable(40);
        let options = TrainOptions {
            n_estimators: 10,
            seed: 7,
            ..TrainOptions::default()
        };
        let a = serde_json::to_string(&train_forest(&dataset, &options).unwrap()).unwrap();
        let b = serde_json::to_string(&train_forest(&dataset, &options).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_changes_the_forest() {
        let dataset = separable(40);
        let base = TrainOptions {
            n_estimators: 10,
            ..TrainOptions::default()
        };
        let other = TrainOptions { seed: 43, ..base.clone() };
        let a = serde_json::to_string(&train_forest(&dataset, &base).unwrap()).unwrap();
        let b = serde_json::to_string(&train_forest(&dataset, &other).unwrap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn max_depth_bounds_every_tree() {
        let dataset = separable(80);
        let options = TrainOptions {
            n_estimators: 15,
            max_depth: Some(3),
            ..TrainOptions::default()
        };
        let model = train_forest(&dataset, &options).unwrap();
        for tree in &model.trees {
            assert!(tree.depth() <= 3, "tree depth {} exceeds limit", tree.depth());
        }
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let dataset = separable(10);
        let empty = ForestDataset {
            x: Vec::new(),
            y: Vec::new(),
            ..dataset.clone()
        };
        assert!(train_forest(&empty, &TrainOptions::default()).is_err());

        let mismatched = ForestDataset {
            y: vec![0],
            ..dataset.clone()
        };
        assert!(train_forest(&mismatched, &TrainOptions::default()).is_err());

        let no_trees = TrainOptions {
            n_estimators: 0,
            ..TrainOptions::default()
        };
        assert!(train_forest(&dataset, &no_trees).is_err());
    }

    #[test]
    fn single_valued_features_produce_leaf_trees() {
        let dataset = ForestDataset {
            feature_names: vec!["F1".into()],
            classes: vec!["0".into(), "1".into()],
            x: vec![vec![1.0]; 8],
            y: vec![0, 1, 0, 1, 0, 1, 0, 1],
        };
        let options = TrainOptions {
            n_estimators: 3,
            ..TrainOptions::default()
        };
        let model = train_forest(&dataset, &options).unwrap();
        for tree in &model.trees {
            assert_eq!(tree.depth(), 0);
        }
    }
}
