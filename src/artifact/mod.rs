//! The boundary between the service and the trained dosage artifact.
//!
//! Everything behind [`Predictor`] is opaque to the HTTP layer: it only knows
//! how to build a [`FeatureRow`] and read back a single number.

use serde::Serialize;
use thiserror::Error;

pub mod loader;
pub mod regression;

pub const WEIGHT_COLUMN: &str = "weight_kg";
pub const MEDICINE_COLUMN: &str = "medicine";

/// Column layout the artifact was trained against, in order.
pub const FEATURE_COLUMNS: [&str; 2] = [WEIGHT_COLUMN, MEDICINE_COLUMN];

/// A single input row with the columns in [`FEATURE_COLUMNS`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub weight_kg: f64,
    pub medicine: String,
}

impl FeatureRow {
    pub fn new(weight_kg: f64, medicine: impl Into<String>) -> Self {
        Self {
            weight_kg,
            medicine: medicine.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Found unknown category '{category}' in column '{column}' during transform")]
    UnknownCategory {
        column: &'static str,
        category: String,
    },
    #[error("Input contains a non-finite value in column '{0}'")]
    NonFiniteInput(&'static str),
    #[error("Model produced a non-finite prediction: {0}")]
    NonFiniteOutput(f64),
    #[error("Model returned no predictions for the input row")]
    EmptyOutput,
}

pub trait Predictor: Send + Sync {
    /// Runs the artifact over `rows`, returning one prediction per row.
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, InferenceError>;

    /// Short human readable summary used in startup logs.
    fn describe(&self) -> String;
}

/// Predicts a single row and returns the first output element.
#[tracing::instrument(level = "debug", skip(predictor))]
pub fn predict_one(predictor: &dyn Predictor, row: FeatureRow) -> Result<f64, InferenceError> {
    let output = predictor.predict(std::slice::from_ref(&row))?;
    let value = *output.first().ok_or(InferenceError::EmptyOutput)?;
    if !value.is_finite() {
        return Err(InferenceError::NonFiniteOutput(value));
    }
    Ok(value)
}
