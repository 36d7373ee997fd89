use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};

use super::{Classifier, ModelError, TrainedModel};
use crate::config::{MissingKey, TrainConfig, require};
use crate::dataset::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error("Invalid train/test split: {0}")]
    InvalidSplit(String),
    #[error(transparent)]
    MissingColumn(#[from] DatasetError),
    #[error("Target value {value} at row {row} is not a binary class")]
    InvalidLabel { row: usize, value: f64 },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Fitted model plus the two split tables, each carrying the target column last.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model: TrainedModel,
    pub train: Dataset,
    pub test: Dataset,
}

/// Split `dataset` into train/test, then fit the configured classifier on the
/// training rows restricted to `initial_features`.
pub fn train_model(dataset: &Dataset, config: &TrainConfig) -> Result<TrainOutput, TrainError> {
    let target = require(&config.target, "train_model.target")?;
    let test_size = *require(&config.test_size, "train_model.test_size")?;
    let features = require(&config.initial_features, "train_model.initial_features")?;
    let params = require(&config.model_params, "train_model.model_params")?;

    dataset.column(target)?;
    for feature in features {
        dataset.column(feature)?;
    }
    let (train_idx, test_idx) = split_indices(dataset.n_rows(), test_size, config.random_state)?;
    let train = with_target_last(dataset.take_rows(&train_idx), target)?;
    let test = with_target_last(dataset.take_rows(&test_idx), target)?;

    let (rows, labels) = training_rows(&train, features, target)?;
    let mut model = TrainedModel::from_params(params);
    model.fit(&rows, &labels)?;
    info!(
        "Model trained on {} rows ({} held out for testing)",
        rows.len(),
        test.n_rows()
    );
    Ok(TrainOutput { model, train, test })
}

/// Shuffle row positions and cut off the first `ceil(test_size * n)` as the test set.
fn split_indices(
    n_rows: usize,
    test_size: f64,
    random_state: Option<u64>,
) -> Result<(Vec<usize>, Vec<usize>), TrainError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrainError::InvalidSplit(format!(
            "test_size {test_size} must be strictly between 0 and 1"
        )));
    }
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(TrainError::InvalidSplit(format!(
            "test_size {test_size} leaves an empty split of {n_rows} rows"
        )));
    }
    let mut rng = match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

fn with_target_last(mut table: Dataset, target: &str) -> Result<Dataset, DatasetError> {
    let values = table.remove_column(target)?;
    table.insert_column(target, values)?;
    Ok(table)
}

/// Feature rows and labels for fitting; rows with non-finite features are dropped.
fn training_rows(
    train: &Dataset,
    features: &[String],
    target: &str,
) -> Result<(Vec<Vec<f64>>, Vec<u8>), TrainError> {
    let targets = train.column(target)?;
    let mut rows = Vec::with_capacity(train.n_rows());
    let mut labels = Vec::with_capacity(train.n_rows());
    let mut skipped = 0usize;
    for (row, (values, &value)) in train.rows(features)?.into_iter().zip(targets).enumerate() {
        let label = match value {
            v if v == 0.0 => 0,
            v if v == 1.0 => 1,
            value => return Err(TrainError::InvalidLabel { row, value }),
        };
        if values.iter().any(|v| !v.is_finite()) {
            skipped += 1;
            continue;
        }
        rows.push(values);
        labels.push(label);
    }
    if skipped > 0 {
        warn!("Excluded {skipped} training row(s) with non-finite feature values");
    }
    if rows.is_empty() {
        return Err(TrainError::InvalidSplit(
            "no training rows with finite feature values".to_string(),
        ));
    }
    Ok((rows, labels))
}
