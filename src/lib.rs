//! Batch pipeline that classifies cloud observations from satellite imagery
//! statistics: acquire, assemble, engineer features, train, score, evaluate,
//! plot and upload.

/// Raw data download with retry.
pub mod acquire;
/// Application directory resolution.
pub mod app_dirs;
/// Configuration document and persistence.
pub mod config;
/// Tabular dataset, CSV persistence and raw-file assembly.
pub mod dataset;
/// Top-level pipeline error and exit codes.
pub mod error;
/// Configuration-driven feature generation.
pub mod features;
/// Class-split histogram rendering.
pub mod figures;
/// Shared HTTP helpers.
pub mod http_client;
/// Logging setup.
pub mod logging;
/// Evaluation metrics.
pub mod metrics;
/// Classifiers and the train/score stages.
pub mod model;
/// Stage orchestration.
pub mod pipeline;
/// Object storage upload.
pub mod storage;
