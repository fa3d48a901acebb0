//! Pipeline configuration loaded from a TOML params document.
//!
//! Both binaries read the same document; the `[train]` section carries the
//! dataset path, the model artifact path and the training hyperparameters.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default params document shared by the training and evaluation binaries.
pub const DEFAULT_PARAMS_FILE: &str = "params.toml";

/// Errors that may occur while loading the params document.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// Failed to read the params file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse the document or the section contents.
    #[error("Invalid params file at {path}: {source}")]
    Parse {
        /// Params file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// The expected section is absent from the document.
    #[error("Missing [{section}] section in {path}")]
    MissingSection {
        /// Section name that was looked up.
        section: String,
        /// Params file path.
        path: PathBuf,
    },
}

/// Contents of the `[train]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainParams {
    /// Path to the delimited dataset file.
    pub data: PathBuf,
    /// Path the model artifact is written to and read from.
    pub model: PathBuf,
    /// Seed for every randomized step in the pipeline.
    pub random_state: u64,
    /// Forest size anchoring the candidate grid.
    pub n_estimators: usize,
    /// Tree depth limit; absent means unbounded.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Load the `[train]` section from a TOML params document.
pub fn load_train_params(path: &Path) -> Result<TrainParams, ParamsError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: toml::Value = toml::from_str(&text).map_err(|source| ParamsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let Some(section) = value.get("train") else {
        return Err(ParamsError::MissingSection {
            section: "train".to_string(),
            path: path.to_path_buf(),
        });
    };
    section
        .clone()
        .try_into()
        .map_err(|source| ParamsError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_params(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_train_section() {
        let file = write_params(
            "[train]\ndata = \"data.csv\"\nmodel = \"model.json\"\nrandom_state = 42\nn_estimators = 100\nmax_depth = 5\n",
        );
        let params = load_train_params(file.path()).unwrap();
        assert_eq!(params.data, PathBuf::from("data.csv"));
        assert_eq!(params.model, PathBuf::from("model.json"));
        assert_eq!(params.random_state, 42);
        assert_eq!(params.n_estimators, 100);
        assert_eq!(params.max_depth, Some(5));
    }

    #[test]
    fn absent_max_depth_means_unbounded() {
        let file = write_params(
            "[train]\ndata = \"d.csv\"\nmodel = \"m.json\"\nrandom_state = 7\nn_estimators = 200\n",
        );
        let params = load_train_params(file.path()).unwrap();
        assert_eq!(params.max_depth, None);
    }

    #[test]
    fn missing_train_section_is_descriptive() {
        let file = write_params("[evaluate]\ndata = \"d.csv\"\n");
        let err = load_train_params(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[train]"), "unexpected error: {message}");
        assert!(matches!(err, ParamsError::MissingSection { .. }));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let file = write_params("[train\ndata =");
        let err = load_train_params(file.path()).unwrap_err();
        assert!(matches!(err, ParamsError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_train_params(Path::new("/nonexistent/params.toml")).unwrap_err();
        assert!(matches!(err, ParamsError::Read { .. }));
    }
}
