use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifact::{
    FeatureRow, InferenceError, Predictor, FEATURE_COLUMNS, MEDICINE_COLUMN, WEIGHT_COLUMN,
};

pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ArtifactFormatError {
    #[error("artifact is not a valid dosage model")]
    Decode(#[from] serde_json::Error),
    #[error("unsupported artifact format version {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("artifact was trained on features {found:?}, expected {expected:?}")]
    FeatureMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },
}

/// What to do with a `medicine` value the model has no coefficient for.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

/// Linear regression over `weight_kg` and a one-hot encoded `medicine`,
/// exported offline as JSON.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DosageModel {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub weight_coefficient: f64,
    pub medicine_coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DosageModel {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactFormatError> {
        let model: DosageModel = serde_json::from_slice(bytes)?;
        model.check_compatible()?;
        Ok(model)
    }

    fn check_compatible(&self) -> Result<(), ArtifactFormatError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ArtifactFormatError::IncompatibleVersion {
                found: self.format_version,
                expected: SUPPORTED_FORMAT_VERSION,
            });
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            return Err(ArtifactFormatError::FeatureMismatch {
                found: self.feature_names.clone(),
                expected: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        }
        Ok(())
    }

    fn predict_row(&self, row: &FeatureRow) -> Result<f64, InferenceError> {
        if !row.weight_kg.is_finite() {
            return Err(InferenceError::NonFiniteInput(WEIGHT_COLUMN));
        }
        let medicine_term = match self.medicine_coefficients.get(&row.medicine) {
            Some(coefficient) => *coefficient,
            None if self.handle_unknown == HandleUnknown::Ignore => 0.0,
            None => {
                return Err(InferenceError::UnknownCategory {
                    column: MEDICINE_COLUMN,
                    category: row.medicine.clone(),
                })
            }
        };
        Ok(self.intercept + self.weight_coefficient * row.weight_kg + medicine_term)
    }
}

impl Predictor for DosageModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError> {
        debug!("Predicting {} row(s)", rows.len());
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    fn describe(&self) -> String {
        let name = self
            .metadata
            .get("name")
            .and_then(|name| name.as_str())
            .unwrap_or("unnamed");
        format!(
            "{} (format v{}, {} medicines, handle_unknown={:?})",
            name,
            self.format_version,
            self.medicine_coefficients.len(),
            self.handle_unknown
        )
    }
}
