//! CSV ingestion for delimited tabular files with a header row.

use std::fs::File;
use std::path::Path;

use super::DatasetError;
use super::table::TabularData;

/// Load a delimited tabular file with named columns into memory.
///
/// Every cell must parse as `f32`; the header row supplies column names.
pub fn load_csv(path: &Path) -> Result<TabularData, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let mut row = Vec::with_capacity(columns.len());
        for (col_idx, cell) in record.iter().enumerate() {
            let value = cell
                .trim()
                .parse::<f32>()
                .map_err(|_| DatasetError::BadCell {
                    row: row_idx,
                    column: columns
                        .get(col_idx)
                        .cloned()
                        .unwrap_or_else(|| format!("#{col_idx}")),
                    value: cell.to_string(),
                })?;
            row.push(value);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(TabularData { columns, rows })
}
