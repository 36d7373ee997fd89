use std::path::{Path, PathBuf};

use cloudcls::config::{CloudDataIndex, PipelineConfig};
use cloudcls::model::{ModelParams, StumpParams};

pub const DEFAULT_CONFIG: &str = include_str!("../../config/default-config.toml");

/// Lines per class in the synthetic raw file.
pub const ROWS_PER_CLASS: usize = 40;

/// Write a raw file shaped like the cloud data: a header, one block per class
/// and a separator line between them. Returns the two half-open line ranges.
pub fn write_raw_clouds(path: &Path) -> ([usize; 2], [usize; 2]) {
    let mut lines = vec!["CLOUD DATA (synthetic)".to_string(), String::new()];
    let cloud1_start = lines.len();
    for i in 0..ROWS_PER_CLASS {
        let i = i as f64;
        lines.push(raw_line(0.02 + 0.0005 * i, 800.0 + i, 210.0 + 0.1 * i, 240.0, 160.0));
    }
    let cloud1 = [cloud1_start, lines.len()];
    lines.push("SECOND CLOUD".to_string());
    let cloud2_start = lines.len();
    for i in 0..ROWS_PER_CLASS {
        let i = i as f64;
        lines.push(raw_line(0.5 + 0.01 * i, 300.0 + i, 180.0, 230.0 - 0.2 * i, 120.0));
    }
    let cloud2 = [cloud2_start, lines.len()];
    std::fs::write(path, lines.join("\n") + "\n").expect("write raw data");
    (cloud1, cloud2)
}

fn raw_line(entropy: f64, contrast: f64, ir_min: f64, ir_max: f64, ir_mean: f64) -> String {
    format!(
        "  3.0  140.0  0.0  3.2  {contrast:.4}  {entropy:.4}  0.9500  \
         {ir_mean:.1}  {ir_max:.1}  {ir_min:.4}"
    )
}

/// Shipped defaults pointed at a local raw file, with small figures and a fast model.
pub fn local_config(raw_path: PathBuf, cloud1: [usize; 2], cloud2: [usize; 2]) -> PipelineConfig {
    let mut config: PipelineConfig = toml::from_str(DEFAULT_CONFIG).expect("parse default config");
    config.acquire_data.url = None;
    config.acquire_data.raw_path = raw_path;
    config.create_dataset.cloud_data_index = Some(CloudDataIndex {
        cloud1: Some(cloud1),
        cloud2: Some(cloud2),
    });
    config.analysis.width = 96;
    config.analysis.height = 64;
    config.analysis.margin = 6;
    config.train_model.model_params = Some(ModelParams::BoostedStumps(StumpParams {
        rounds: 30,
        ..StumpParams::default()
    }));
    config
}
