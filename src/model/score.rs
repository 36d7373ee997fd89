use ndarray::Array1;
use thiserror::Error;

use super::Classifier;
use crate::config::{MissingKey, ScoreConfig, require};
use crate::dataset::{Dataset, DatasetError};

/// Column holding the class-1 probability in a score table.
pub const PROBABILITY_COLUMN: &str = "predicted_probability";
/// Column holding the hard `0`/`1` prediction in a score table.
pub const BINARY_COLUMN: &str = "predicted_binary";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error(transparent)]
    MissingColumn(#[from] DatasetError),
    #[error("Model expects {expected} features but {found} are configured")]
    FeatureCount { expected: usize, found: usize },
}

/// Predict every row of `test` using the configured feature columns.
///
/// Returns a two-column table aligned row for row with `test`.
pub fn score_model<M>(
    test: &Dataset,
    model: &M,
    config: &ScoreConfig,
) -> Result<Dataset, ScoreError>
where
    M: Classifier + ?Sized,
{
    let features = require(&config.initial_features, "score_model.initial_features")?;
    match model.feature_count() {
        Some(expected) if expected != features.len() => {
            return Err(ScoreError::FeatureCount {
                expected,
                found: features.len(),
            });
        }
        _ => {}
    }
    let rows = test.rows(features)?;
    let probabilities: Array1<f64> = rows
        .iter()
        .map(|row| model.predict_probability(row))
        .collect();
    let binary: Array1<f64> = rows.iter().map(|row| f64::from(model.predict(row))).collect();

    let mut scores = Dataset::new();
    scores.insert_column(PROBABILITY_COLUMN, probabilities)?;
    scores.insert_column(BINARY_COLUMN, binary)?;
    tracing::info!("Scored {} rows", scores.n_rows());
    Ok(scores)
}
