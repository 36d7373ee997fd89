//! Binary classifiers behind a small capability trait, plus train/score stages.
//!
//! The pipeline only needs to fit a model on labeled rows and ask it for a
//! class-1 probability or a hard label. [`Classifier`] captures exactly that, so
//! training and scoring can run against any implementation, including test stubs.

mod logreg;
mod score;
mod stumps;
mod train;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logreg::{LogRegParams, LogisticRegression};
pub use score::{BINARY_COLUMN, PROBABILITY_COLUMN, ScoreError, score_model};
pub use stumps::{BoostedStumps, Stump, StumpParams};
pub use train::{TrainError, TrainOutput, train_model};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Empty training set")]
    EmptyTrainingSet,
    #[error("Mismatched training inputs ({rows} rows) and labels ({labels})")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Training rows need at least one feature")]
    NoFeatures,
    #[error("Row {row} has {found} features, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Label {0} is not a binary class")]
    InvalidLabel(u8),
}

/// Capability required from a binary classifier.
pub trait Classifier {
    /// Fit on row-major features and `0`/`1` labels.
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError>;

    /// Probability that `row` belongs to class `1`.
    fn predict_probability(&self, row: &[f64]) -> f64;

    /// Hard class label for `row`.
    fn predict(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_probability(row) >= 0.5)
    }

    /// Number of features the fitted model expects, when known.
    fn feature_count(&self) -> Option<usize> {
        None
    }
}

/// Hyperparameters selecting and configuring the classifier to train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    BoostedStumps(StumpParams),
    LogisticRegression(LogRegParams),
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::BoostedStumps(StumpParams::default())
    }
}

/// Serializable fitted (or fresh) model of any supported kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    BoostedStumps(BoostedStumps),
    LogisticRegression(LogisticRegression),
}

impl TrainedModel {
    /// Create an unfitted model for the given hyperparameters.
    pub fn from_params(params: &ModelParams) -> Self {
        match params {
            ModelParams::BoostedStumps(params) => {
                Self::BoostedStumps(BoostedStumps::new(params.clone()))
            }
            ModelParams::LogisticRegression(params) => {
                Self::LogisticRegression(LogisticRegression::new(params.clone()))
            }
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::BoostedStumps(model) => model,
            Self::LogisticRegression(model) => model,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError> {
        match self {
            Self::BoostedStumps(model) => model.fit(rows, labels),
            Self::LogisticRegression(model) => model.fit(rows, labels),
        }
    }

    fn predict_probability(&self, row: &[f64]) -> f64 {
        self.inner().predict_probability(row)
    }

    fn feature_count(&self) -> Option<usize> {
        self.inner().feature_count()
    }
}

#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("Failed to write model {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model blob {path}: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl ModelIoError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Read { .. })
    }
}

/// Persist a model as an opaque blob, creating parent directories as needed.
pub fn save_model(model: &TrainedModel, path: &Path) -> Result<(), ModelIoError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ModelIoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let bytes = serde_json::to_vec(model).map_err(|source| ModelIoError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, bytes).map_err(|source| ModelIoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Model saved to {}", path.display());
    Ok(())
}

/// Load a model written by [`save_model`].
pub fn load_model(path: &Path) -> Result<TrainedModel, ModelIoError> {
    let bytes = std::fs::read(path).map_err(|source| ModelIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ModelIoError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// Logistic function that stays finite for large `|z|`.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Shared shape checks for `fit` implementations; returns the feature width.
pub(crate) fn check_training_set(rows: &[Vec<f64>], labels: &[u8]) -> Result<usize, ModelError> {
    if rows.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if rows.len() != labels.len() {
        return Err(ModelError::LengthMismatch {
            rows: rows.len(),
            labels: labels.len(),
        });
    }
    let width = rows[0].len();
    if width == 0 {
        return Err(ModelError::NoFeatures);
    }
    if let Some((row, found)) = rows
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|(_, len)| *len != width)
    {
        return Err(ModelError::RowWidth {
            row,
            expected: width,
            found,
        });
    }
    if let Some(&label) = labels.iter().find(|&&label| label > 1) {
        return Err(ModelError::InvalidLabel(label));
    }
    Ok(width)
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two Gaussian-ish blobs separated along both features.
    pub(crate) fn blobs(n_per_class: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n_per_class * 2);
        let mut labels = Vec::with_capacity(n_per_class * 2);
        for label in [0u8, 1u8] {
            let center = if label == 0 { -2.0 } else { 2.0 };
            for _ in 0..n_per_class {
                rows.push(vec![
                    center + rng.random_range(-1.0..1.0),
                    10.0 * center + rng.random_range(-5.0..5.0),
                ]);
                labels.push(label);
            }
        }
        (rows, labels)
    }
}
