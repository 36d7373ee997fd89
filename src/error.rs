use std::path::PathBuf;

use thiserror::Error;

use crate::acquire::AcquireError;
use crate::config::{ConfigError, MissingKey};
use crate::dataset::assemble::AssembleError;
use crate::dataset::csv_io::CsvError;
use crate::features::FeatureError;
use crate::figures::FigureError;
use crate::metrics::{EvaluateError, MetricsIoError};
use crate::model::{ModelIoError, ScoreError, TrainError};
use crate::storage::StorageError;

/// Process exit status for failures reading or writing a path.
pub const EXIT_FILE_ACCESS: i32 = 2;
/// Process exit status for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Any failure of a pipeline stage, as seen by the top-level runner.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Figures(#[from] FigureError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Evaluate(#[from] EvaluateError),
    #[error(transparent)]
    ModelIo(#[from] ModelIoError),
    #[error(transparent)]
    MetricsIo(#[from] MetricsIoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    pub fn is_file_access(&self) -> bool {
        match self {
            Self::Config(err) => err.is_file_access(),
            Self::CreateDir { .. } => true,
            Self::Acquire(err) => err.is_file_access(),
            Self::Assemble(err) => matches!(err, AssembleError::FileAccess { .. }),
            Self::Csv(err) => err.is_file_access(),
            Self::Figures(err) => err.is_file_access(),
            Self::ModelIo(err) => err.is_file_access(),
            Self::MetricsIo(err) => err.is_file_access(),
            Self::Storage(err) => err.is_file_access(),
            Self::MissingKey(_)
            | Self::Features(_)
            | Self::Train(_)
            | Self::Score(_)
            | Self::Evaluate(_) => false,
        }
    }

    /// Exit status distinguishing file-access failures from everything else.
    pub fn exit_code(&self) -> i32 {
        if self.is_file_access() {
            EXIT_FILE_ACCESS
        } else {
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_access_failures_get_their_own_exit_code() {
        let err = PipelineError::CreateDir {
            path: PathBuf::from("/nowhere"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.exit_code(), EXIT_FILE_ACCESS);
        let err = PipelineError::from(AssembleError::FileAccess {
            path: PathBuf::from("raw.data"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(err.exit_code(), EXIT_FILE_ACCESS);
    }

    #[test]
    fn configuration_failures_exit_with_generic_code() {
        let err = PipelineError::from(MissingKey("train_model.target"));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert_eq!(err.to_string(), "Missing configuration key `train_model.target`");
    }
}
