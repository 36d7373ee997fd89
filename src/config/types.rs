use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSpec;
use crate::figures::HistogramStyle;
use crate::http_client::RetryConfig;
use crate::model::ModelParams;
use crate::storage::AwsConfig;

/// Whole configuration document.
///
/// Keys a stage cannot run without are optional here and checked when that
/// stage starts, so a partial document can still drive the stages it covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub run: RunConfig,
    pub acquire_data: AcquireConfig,
    pub create_dataset: CreateDatasetConfig,
    pub generate_features: FeatureSpec,
    pub analysis: HistogramStyle,
    pub train_model: TrainConfig,
    pub score_model: ScoreConfig,
    pub evaluate_performance: EvaluateConfig,
    pub aws: AwsConfig,
}

/// Run metadata and output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Root under which each run gets its own timestamped directory.
    pub output: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "cloud-classification".to_string(),
            author: None,
            version: None,
            description: None,
            output: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Source of the raw data. When absent, `raw_path` must already exist.
    pub url: Option<String>,
    pub raw_path: PathBuf,
    pub attempts: usize,
    /// Seconds to wait after the first failed attempt.
    pub wait: f64,
    pub wait_multiple: u32,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            url: None,
            raw_path: PathBuf::from("data/raw/clouds.data"),
            attempts: 4,
            wait: 3.0,
            wait_multiple: 2,
        }
    }
}

impl AcquireConfig {
    pub fn retry(&self) -> RetryConfig {
        let base_delay = Duration::try_from_secs_f64(self.wait.max(0.0)).unwrap_or(Duration::ZERO);
        RetryConfig {
            max_attempts: self.attempts.max(1),
            base_delay,
            multiplier: self.wait_multiple.max(1),
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateDatasetConfig {
    /// Names assigned, in order, to the tokens of each raw line.
    pub columns: Option<Vec<String>>,
    pub cloud_data_index: Option<CloudDataIndex>,
}

/// Half-open `[start, end)` line ranges of the two classes in the raw file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudDataIndex {
    pub cloud1: Option<[usize; 2]>,
    pub cloud2: Option<[usize; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub target: Option<String>,
    /// Fraction of rows held out for testing, in `(0, 1)`.
    pub test_size: Option<f64>,
    pub initial_features: Option<Vec<String>>,
    /// Seed for the train/test shuffle; OS entropy when absent.
    pub random_state: Option<u64>,
    pub model_params: Option<ModelParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub initial_features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateConfig {
    pub target: Option<String>,
    pub prob_col: Option<String>,
    pub bin_col: Option<String>,
}
