//! In-memory tabular data and label/feature separation.

use super::DatasetError;

/// Tabular rows with named columns, label still attached.
#[derive(Debug, Clone)]
pub struct TabularData {
    /// Header names in file order.
    pub columns: Vec<String>,
    /// Row-major cell values aligned with `columns`.
    pub rows: Vec<Vec<f32>>,
}

/// Feature matrix plus aligned binary labels.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Feature column names, file order minus the label.
    pub feature_names: Vec<String>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f32>>,
    /// Class indices aligned with `x` (0 or 1).
    pub y: Vec<usize>,
}

/// Ordered class identifiers for the binary outcome label.
pub fn outcome_classes() -> Vec<String> {
    vec!["0".to_string(), "1".to_string()]
}

impl TabularData {
    /// Split off the label column, validating the schema up front.
    ///
    /// Fails before any model is fitted or applied: a missing label column
    /// or a non-binary label cell is a schema error, not a prediction-time
    /// surprise.
    pub fn split_label(&self, label: &str) -> Result<FeatureTable, DatasetError> {
        let Some(label_idx) = self.columns.iter().position(|column| column == label) else {
            return Err(DatasetError::MissingLabel(label.to_string()));
        };
        let feature_names: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != label_idx)
            .map(|(_, name)| name.clone())
            .collect();

        let mut x = Vec::with_capacity(self.rows.len());
        let mut y = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let value = row.get(label_idx).copied().unwrap_or(f32::NAN);
            if value != 0.0 && value != 1.0 {
                return Err(DatasetError::NonBinaryLabel {
                    row: row_idx,
                    value,
                });
            }
            y.push(value as usize);
            x.push(
                row.iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != label_idx)
                    .map(|(_, &cell)| cell)
                    .collect(),
            );
        }
        Ok(FeatureTable {
            feature_names,
            x,
            y,
        })
    }
}

impl FeatureTable {
    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}
