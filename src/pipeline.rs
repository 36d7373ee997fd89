//! Run every stage in order, persisting each intermediate artifact.
//!
//! A run writes into its own directory:
//!
//! ```text
//! <root>/<unix seconds>/
//!     config.toml  clouds.csv  features.csv  figures/*.png
//!     train.csv  test.csv  trained_model.json  scores.csv  metrics.toml
//! ```

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::acquire;
use crate::config::{PipelineConfig, save_config};
use crate::dataset::assemble::create_dataset;
use crate::dataset::csv_io::write_csv;
use crate::error::PipelineError;
use crate::features::generate_features;
use crate::figures::save_figures;
use crate::metrics::{evaluate, save_metrics};
use crate::model::{save_model, score_model, train_model};
use crate::storage::upload_artifacts;

pub const CONFIG_FILE: &str = "config.toml";
pub const CLOUDS_FILE: &str = "clouds.csv";
pub const FEATURES_FILE: &str = "features.csv";
pub const FIGURES_DIR: &str = "figures";
pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const MODEL_FILE: &str = "trained_model.json";
pub const SCORES_FILE: &str = "scores.csv";
pub const METRICS_FILE: &str = "metrics.toml";

/// Run the full pipeline into a fresh timestamped directory under `artifacts_root`.
///
/// Returns the run directory.
pub fn run(config: &PipelineConfig, artifacts_root: &Path) -> Result<PathBuf, PipelineError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let run_dir = artifacts_root.join(stamp.to_string());
    run_in(config, &run_dir)?;
    Ok(run_dir)
}

/// Run the full pipeline writing artifacts into `run_dir`.
pub fn run_in(config: &PipelineConfig, run_dir: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(run_dir).map_err(|source| PipelineError::CreateDir {
        path: run_dir.to_path_buf(),
        source,
    })?;
    info!("Run `{}` writing artifacts to {}", config.run.name, run_dir.display());
    save_config(config, &run_dir.join(CONFIG_FILE))?;

    let acquire_cfg = &config.acquire_data;
    match &acquire_cfg.url {
        Some(url) => acquire::acquire_data(url, &acquire_cfg.raw_path, acquire_cfg.retry())?,
        None if acquire_cfg.raw_path.exists() => {
            info!("No data URL configured; using {}", acquire_cfg.raw_path.display());
        }
        None => warn!(
            "No data URL configured and {} does not exist",
            acquire_cfg.raw_path.display()
        ),
    }

    let clouds = create_dataset(&acquire_cfg.raw_path, &config.create_dataset)?;
    write_csv(&clouds, &run_dir.join(CLOUDS_FILE))?;

    let features = generate_features(clouds, &config.generate_features)?;
    write_csv(&features, &run_dir.join(FEATURES_FILE))?;

    save_figures(&features, &run_dir.join(FIGURES_DIR), &config.analysis)?;

    let trained = train_model(&features, &config.train_model)?;
    write_csv(&trained.train, &run_dir.join(TRAIN_FILE))?;
    write_csv(&trained.test, &run_dir.join(TEST_FILE))?;
    save_model(&trained.model, &run_dir.join(MODEL_FILE))?;

    let scores = score_model(&trained.test, &trained.model, &config.score_model)?;
    write_csv(&scores, &run_dir.join(SCORES_FILE))?;

    let metrics = evaluate(&scores, &trained.test, &config.evaluate_performance)?;
    save_metrics(&metrics, &run_dir.join(METRICS_FILE))?;

    if config.aws.upload {
        let locators = upload_artifacts(run_dir, &config.aws)?;
        info!("Uploaded {} artifact(s)", locators.len());
    }
    info!("Run finished: {}", run_dir.display());
    Ok(())
}
