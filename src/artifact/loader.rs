use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::artifact::regression::{ArtifactFormatError, DosageModel};
use crate::artifact::Predictor;

#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("failed to read dosage model from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize dosage model from {path}")]
    Format {
        path: PathBuf,
        #[source]
        source: ArtifactFormatError,
    },
}

/// Outcome of loading the artifact at startup. Built once, then only read.
pub enum LoadState {
    Loaded(Arc<dyn Predictor>),
    /// Human readable failure including the full cause chain.
    Failed(String),
}

impl LoadState {
    /// Loads the artifact at `path`. Never fails: a load error is captured and
    /// kept so it can be reported on every request.
    #[tracing::instrument(level = "info")]
    pub fn load(path: &Path) -> Self {
        match load_model(path) {
            Ok(model) => {
                info!("Model loaded successfully: {}", model.describe());
                LoadState::Loaded(Arc::new(model))
            }
            Err(err) => {
                let err = anyhow::Error::new(err);
                error!("Error loading model: {:#}", err);
                let trace = format!("{:?}", err);
                error!("{}", trace);
                LoadState::Failed(trace)
            }
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        match self {
            LoadState::Loaded(_) => None,
            LoadState::Failed(error) => Some(error),
        }
    }
}

pub fn load_model(path: &Path) -> Result<DosageModel, ArtifactLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    DosageModel::from_slice(&bytes).map_err(|source| ArtifactLoadError::Format {
        path: path.to_path_buf(),
        source,
    })
}
