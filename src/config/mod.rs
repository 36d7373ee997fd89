//! Pipeline configuration: one TOML table per stage.

mod io;
mod types;

use thiserror::Error;

pub use io::{ConfigError, load_config, save_config};
pub use types::{
    AcquireConfig, CloudDataIndex, CreateDatasetConfig, EvaluateConfig, PipelineConfig, RunConfig,
    ScoreConfig, TrainConfig,
};

/// A configuration key the running stage requires is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing configuration key `{0}`")]
pub struct MissingKey(pub &'static str);

/// Borrow a required optional setting or report its dotted key.
pub fn require<'a, T>(value: &'a Option<T>, key: &'static str) -> Result<&'a T, MissingKey> {
    value.as_ref().ok_or(MissingKey(key))
}
