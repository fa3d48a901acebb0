//! Input/output schema descriptors attached to tracking runs.

use serde::{Deserialize, Serialize};

/// Column spec in a model signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Value type identifier (`double` for features, `long` for the label).
    pub dtype: String,
}

/// Expected input/output schema of a trained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Feature columns in matrix order.
    pub inputs: Vec<ColumnSpec>,
    /// Label column the model predicts.
    pub output: ColumnSpec,
}

/// Infer the signature from feature names and the label column.
pub fn infer_signature(feature_names: &[String], label: &str) -> Signature {
    Signature {
        inputs: feature_names
            .iter()
            .map(|name| ColumnSpec {
                name: name.clone(),
                dtype: "double".to_string(),
            })
            .collect(),
        output: ColumnSpec {
            name: label.to_string(),
            dtype: "long".to_string(),
        },
    }
}

impl Signature {
    /// Encode the signature as a single-line JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_lists_inputs_in_order() {
        let signature = infer_signature(&["F1".to_string(), "F2".to_string()], "Outcome");
        assert_eq!(signature.inputs.len(), 2);
        assert_eq!(signature.inputs[0].name, "F1");
        assert_eq!(signature.inputs[0].dtype, "double");
        assert_eq!(signature.output.name, "Outcome");
        assert_eq!(signature.output.dtype, "long");
    }

    #[test]
    fn json_roundtrip() {
        let signature = infer_signature(&["F1".to_string()], "Outcome");
        let encoded = signature.to_json().unwrap();
        let decoded: Signature = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, signature);
    }
}
