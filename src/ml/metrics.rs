//! Evaluation metrics for classification models.

/// Confusion matrix for a `K`-class classifier.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    counts: Vec<u32>,
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone)]
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Harmonic mean of precision and recall.
    pub f1: f32,
    /// Total number of true examples for the class.
    pub support: u32,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Record one observation. Out-of-range indices are ignored.
    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Total observations recorded.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&count| count as u64).sum()
    }

    /// Fraction of observations on the diagonal.
    pub fn accuracy(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.n_classes)
            .map(|idx| self.get(idx, idx) as u64)
            .sum();
        (correct as f32) / (total as f32)
    }

    /// Per-class precision, recall and F1.
    pub fn per_class(&self) -> Vec<PerClassStats> {
        let k = self.n_classes;
        let mut stats = Vec::with_capacity(k);
        for class_idx in 0..k {
            let tp = self.get(class_idx, class_idx) as f32;
            let mut fp = 0f32;
            let mut fn_ = 0f32;
            let mut support = 0u32;
            for predicted in 0..k {
                let count = self.get(class_idx, predicted);
                support = support.saturating_add(count);
                if predicted != class_idx {
                    fn_ += count as f32;
                }
            }
            for truth in 0..k {
                if truth != class_idx {
                    fp += self.get(truth, class_idx) as f32;
                }
            }
            let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
            let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            stats.push(PerClassStats {
                precision,
                recall,
                f1,
                support,
            });
        }
        stats
    }
}
