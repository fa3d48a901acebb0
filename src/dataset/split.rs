//! Seeded train/test partitioning.

use rand::rngs::StdRng;
use rand::{SeedableRng, seq::SliceRandom};

use super::DatasetError;
use super::table::FeatureTable;

/// Train/test partition of a feature table.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    /// Rows used for fitting.
    pub train: FeatureTable,
    /// Held-out rows used for scoring.
    pub test: FeatureTable,
}

/// Shuffle rows with a seeded RNG and carve off a test fraction.
///
/// The same seed and input always produce the same partition. Both sides
/// keep at least one row.
pub fn train_test_split(
    table: &FeatureTable,
    test_fraction: f32,
    seed: u64,
) -> Result<TrainTestSplit, DatasetError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DatasetError::BadFraction(test_fraction));
    }
    if table.len() < 2 {
        return Err(DatasetError::TooSmall {
            rows: table.len(),
            min: 2,
        });
    }

    let mut indices: Vec<usize> = (0..table.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((table.len() as f32) * test_fraction).round() as usize;
    let test_len = test_len.clamp(1, table.len() - 1);
    let (test_idx, train_idx) = indices.split_at(test_len);

    Ok(TrainTestSplit {
        train: subset(table, train_idx),
        test: subset(table, test_idx),
    })
}

fn subset(table: &FeatureTable, indices: &[usize]) -> FeatureTable {
    let mut x = Vec::with_capacity(indices.len());
    let mut y = Vec::with_capacity(indices.len());
    for &idx in indices {
        x.push(table.x[idx].clone());
        y.push(table.y[idx]);
    }
    FeatureTable {
        feature_names: table.feature_names.clone(),
        x,
        y,
    }
}
