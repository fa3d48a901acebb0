//! Grid search with k-fold cross-validation over forest hyperparameters.

use std::collections::VecDeque;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{SeedableRng, seq::SliceRandom};
use tracing::debug;

use super::forest::{ForestDataset, TrainOptions, train_forest};

/// Hyperparameter grid explored by [`grid_search`].
#[derive(Debug, Clone)]
pub struct ParamGrid {
    /// Candidate ensemble sizes.
    pub n_estimators: Vec<usize>,
    /// Candidate depth limits (`None` = unbounded).
    pub max_depth: Vec<Option<usize>>,
    /// Candidate split minimums.
    pub min_samples_split: Vec<usize>,
    /// Candidate leaf minimums.
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![Some(5), Some(10), None],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
        }
    }
}

impl ParamGrid {
    /// Make sure the configured anchor point is part of the grid.
    pub fn anchor(mut self, n_estimators: usize, max_depth: Option<usize>) -> Self {
        if !self.n_estimators.contains(&n_estimators) {
            self.n_estimators.push(n_estimators);
        }
        if !self.max_depth.contains(&max_depth) {
            self.max_depth.push(max_depth);
        }
        self
    }

    /// Expand into concrete candidates in deterministic order.
    pub fn candidates(&self, seed: u64) -> Vec<TrainOptions> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(TrainOptions {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Scored candidate from a finished search.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The candidate's hyperparameters.
    pub options: TrainOptions,
    /// Mean held-fold accuracy across all folds.
    pub mean_accuracy: f32,
}

/// Result of a grid search.
#[derive(Debug, Clone)]
pub struct GridSearchReport {
    /// The winning candidate.
    pub best: ScoredCandidate,
    /// Every candidate with its score, in grid order.
    pub candidates: Vec<ScoredCandidate>,
    /// Fold count the scores were averaged over.
    pub folds: usize,
}

/// Exhaustively score every grid candidate with k-fold cross-validation.
///
/// Candidates are distributed over a worker pool sized to the available
/// parallelism. Scoring is deterministic for a fixed seed: fold membership
/// and per-candidate training RNG all derive from `seed`. Ties on the score
/// go to the earlier candidate in grid order.
pub fn grid_search(
    dataset: &ForestDataset,
    grid: &ParamGrid,
    folds: usize,
    seed: u64,
) -> Result<GridSearchReport, String> {
    let candidates = grid.candidates(seed);
    if candidates.is_empty() {
        return Err("Empty parameter grid".to_string());
    }
    if folds < 2 {
        return Err("Cross-validation needs at least 2 folds".to_string());
    }
    if dataset.x.len() < folds {
        return Err(format!(
            "Dataset has {} rows; need at least {folds} for {folds}-fold CV",
            dataset.x.len()
        ));
    }

    let fold_sets = assign_folds(dataset.x.len(), folds, seed);
    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(candidates.len())
        .max(1);

    let queue: Arc<Mutex<VecDeque<(usize, TrainOptions)>>> = Arc::new(Mutex::new(
        candidates.iter().cloned().enumerate().collect(),
    ));
    let (tx, rx) = channel::<Result<(usize, f32), String>>();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let fold_sets = &fold_sets;
            scope.spawn(move || {
                loop {
                    let job = {
                        let mut guard = match queue.lock() {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                        guard.pop_front()
                    };
                    let Some((candidate_idx, options)) = job else {
                        break;
                    };
                    let result = score_candidate(dataset, &options, fold_sets)
                        .map(|accuracy| (candidate_idx, accuracy));
                    if tx.send(result).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);
    });

    let mut scores = vec![None; candidates.len()];
    for result in rx {
        let (candidate_idx, accuracy) = result?;
        scores[candidate_idx] = Some(accuracy);
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for (options, score) in candidates.into_iter().zip(scores) {
        let mean_accuracy =
            score.ok_or_else(|| "Grid search worker dropped a candidate".to_string())?;
        debug!(
            n_estimators = options.n_estimators,
            max_depth = ?options.max_depth,
            mean_accuracy,
            "scored candidate"
        );
        scored.push(ScoredCandidate {
            options,
            mean_accuracy,
        });
    }

    let mut best_idx = 0usize;
    for (idx, candidate) in scored.iter().enumerate() {
        if candidate.mean_accuracy > scored[best_idx].mean_accuracy {
            best_idx = idx;
        }
    }

    Ok(GridSearchReport {
        best: scored[best_idx].clone(),
        candidates: scored,
        folds,
    })
}

/// Shuffle row indices with a seeded RNG and deal them into `folds` groups.
fn assign_folds(rows: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let mut sets = vec![Vec::with_capacity(rows / folds + 1); folds];
    for (position, row) in indices.into_iter().enumerate() {
        sets[position % folds].push(row);
    }
    sets
}

/// Mean held-fold accuracy for one candidate.
fn score_candidate(
    dataset: &ForestDataset,
    options: &TrainOptions,
    fold_sets: &[Vec<usize>],
) -> Result<f32, String> {
    let mut accuracy_sum = 0.0f32;
    for held in 0..fold_sets.len() {
        let mut train_rows = Vec::new();
        for (fold_idx, fold) in fold_sets.iter().enumerate() {
            if fold_idx != held {
                train_rows.extend_from_slice(fold);
            }
        }
        let fold_train = subset(dataset, &train_rows);
        let model = train_forest(&fold_train, options)?;

        let held_rows = &fold_sets[held];
        if held_rows.is_empty() {
            return Err("Empty cross-validation fold".to_string());
        }
        let correct = held_rows
            .iter()
            .filter(|&&row| model.predict_class_index(&dataset.x[row]) == dataset.y[row])
            .count();
        accuracy_sum += correct as f32 / held_rows.len() as f32;
    }
    Ok(accuracy_sum / fold_sets.len() as f32)
}

fn subset(dataset: &ForestDataset, rows: &[usize]) -> ForestDataset {
    ForestDataset {
        feature_names: dataset.feature_names.clone(),
        classes: dataset.classes.clone(),
        x: rows.iter().map(|&row| dataset.x[row].clone()).collect(),
        y: rows.iter().map(|&row| dataset.y[row]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(rows: usize) -> ForestDataset {
        let x: Vec<Vec<f32>> = (0..rows)
            .map(|i| {
                let v = i as f32 / rows as f32;
                vec![v, (i % 3) as f32]
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

    fn small_grid() -> ParamGrid {
        ParamGrid {
            n_estimators: vec![5, 10],
            max_depth: vec![Some(3), None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        }
    }

    #[test]
    fn default_grid_has_24_candidates() {
        assert_eq!(ParamGrid::default().candidates(42).len(), 24);
    }

    #[test]
    fn anchor_extends_the_grid_without_duplicates() {
        let grid = ParamGrid::default().anchor(100, Some(5));
        assert_eq!(grid.candidates(42).len(), 24);
        let grid = ParamGrid::default().anchor(50, Some(7));
        assert_eq!(grid.candidates(42).len(), 3 * 4 * 2 * 2);
    }

    #[test]
    fn fold_assignment_partitions_all_rows() {
        let sets = assign_folds(10, 3, 42);
        assert_eq!(sets.len(), 3);
        let mut all: Vec<usize> = sets.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert!(sets.iter().all(|fold| !fold.is_empty()));
    }

    #[test]
    fn fold_assignment_is_seeded() {
        assert_eq!(assign_folds(20, 3, 9), assign_folds(20, 3, 9));
        assert_ne!(assign_folds(20, 3, 9), assign_folds(20, 3, 10));
    }

    #[test]
    fn grid_search_scores_every_candidate() {
        let dataset = separable(30);
        let report = grid_search(&dataset, &small_grid(), 3, 42).unwrap();
        assert_eq!(report.candidates.len(), 4);
        assert_eq!(report.folds, 3);
        for candidate in &report.candidates {
            assert!((0.0..=1.0).contains(&candidate.mean_accuracy));
        }
        assert!(report.best.mean_accuracy >= 0.7);
    }

    #[test]
    fn grid_search_is_deterministic() {
        let dataset = separable(30);
        let a = grid_search(&dataset, &small_grid(), 3, 42).unwrap();
        let b = grid_search(&dataset, &small_grid(), 3, 42).unwrap();
        assert_eq!(a.best.options, b.best.options);
        let scores_a: Vec<f32> = a.candidates.iter().map(|c| c.mean_accuracy).collect();
        let scores_b: Vec<f32> = b.candidates.iter().map(|c| c.mean_accuracy).collect();
        assert_eq!(scores_a, scores_b);
    }

    #[test]
    fn rejects_degenerate_searches() {
        let dataset = separable(30);
        let empty = ParamGrid {
            n_estimators: Vec::new(),
            max_depth: Vec::new(),
            min_samples_split: Vec::new(),
            min_samples_leaf: Vec::new(),
        };
        assert!(grid_search(&dataset, &empty, 3, 42).is_err());
        assert!(grid_search(&dataset, &small_grid(), 1, 42).is_err());
        let tiny = separable(2);
        assert!(grid_search(&tiny, &small_grid(), 3, 42).is_err());
    }
}
