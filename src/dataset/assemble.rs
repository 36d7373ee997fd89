//! Build the labeled dataset from the raw whitespace-delimited cloud file.
//!
//! The raw file holds two blocks of observations at known line ranges. Lines in
//! the first block are labeled `0`, lines in the second `1`, and the two blocks
//! are stacked in that order.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::{CLASS_COLUMN, Dataset, DatasetError};
use crate::config::{CreateDatasetConfig, MissingKey, require};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Failed to read raw data {path}: {source}")]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error("Line {line}: `{token}` is not a number")]
    Parse { line: usize, token: String },
    #[error("Line {line}: expected {expected} values, found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Range {name} = [{start}, {end}) is invalid for a file of {lines} lines")]
    InvalidRange {
        name: &'static str,
        start: usize,
        end: usize,
        lines: usize,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Parse `raw_path` into one dataset with the configured columns plus `class`.
pub fn create_dataset(
    raw_path: &Path,
    config: &CreateDatasetConfig,
) -> Result<Dataset, AssembleError> {
    let columns = require(&config.columns, "create_dataset.columns")?;
    let index = require(&config.cloud_data_index, "create_dataset.cloud_data_index")?;
    let cloud1 = *require(&index.cloud1, "create_dataset.cloud_data_index.cloud1")?;
    let cloud2 = *require(&index.cloud2, "create_dataset.cloud_data_index.cloud2")?;

    let text = std::fs::read_to_string(raw_path).map_err(|source| AssembleError::FileAccess {
        path: raw_path.to_path_buf(),
        source,
    })?;
    let lines: Vec<&str> = text.lines().collect();
    debug!("Read {} raw lines from {}", lines.len(), raw_path.display());

    let first = labeled_block(&lines, "cloud1", cloud1, columns, 0.0)?;
    let second = labeled_block(&lines, "cloud2", cloud2, columns, 1.0)?;
    let combined = first.concat(&second)?;
    info!(
        "Dataset created: {} rows ({} class 0, {} class 1)",
        combined.n_rows(),
        first.n_rows(),
        second.n_rows()
    );
    Ok(combined)
}

fn labeled_block(
    lines: &[&str],
    name: &'static str,
    [start, end]: [usize; 2],
    columns: &[String],
    label: f64,
) -> Result<Dataset, AssembleError> {
    if start > end || end > lines.len() {
        return Err(AssembleError::InvalidRange {
            name,
            start,
            end,
            lines: lines.len(),
        });
    }
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(end - start); columns.len()];
    for (offset, line) in lines[start..end].iter().enumerate() {
        let row = parse_line(line, start + offset, columns.len())?;
        for (column, value) in values.iter_mut().zip(row) {
            column.push(value);
        }
    }
    let mut block = Dataset::from_columns(columns.iter().cloned().zip(values))?;
    if block.has_column(CLASS_COLUMN) {
        return Err(DatasetError::DuplicateColumn(CLASS_COLUMN.to_string()).into());
    }
    block.insert_column(CLASS_COLUMN, ndarray::Array1::from_elem(end - start, label))?;
    Ok(block)
}

/// Split one raw line on whitespace and parse every token as `f64`.
///
/// `line` is the 0-based line index, used for error reporting.
pub fn parse_line(text: &str, line: usize, expected: usize) -> Result<Vec<f64>, AssembleError> {
    let row = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| AssembleError::Parse {
                line,
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;
    if row.len() != expected {
        return Err(AssembleError::RowWidth {
            line,
            expected,
            found: row.len(),
        });
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudDataIndex;
    use tempfile::tempdir;

    fn config(cloud1: [usize; 2], cloud2: [usize; 2]) -> CreateDatasetConfig {
        CreateDatasetConfig {
            columns: Some(vec!["a".into(), "b".into(), "c".into()]),
            cloud_data_index: Some(CloudDataIndex {
                cloud1: Some(cloud1),
                cloud2: Some(cloud2),
            }),
        }
    }

    fn write_raw(lines: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clouds.data");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        (dir, path)
    }

    fn ten_rows() -> Vec<String> {
        (0..10)
            .map(|i| format!("  {i}.0   {}.5 {}", i * 2, i * 100))
            .collect()
    }

    #[test]
    fn labels_blocks_in_order() {
        let rows = ten_rows();
        let lines: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (_dir, path) = write_raw(&lines);
        let data = create_dataset(&path, &config([0, 5], [5, 10])).unwrap();
        assert_eq!(data.n_rows(), 10);
        assert_eq!(data.column_names(), ["a", "b", "c", "class"]);
        assert_eq!(
            data.column(CLASS_COLUMN).unwrap().to_vec(),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(data.column("b").unwrap()[3], 6.5);
    }

    #[test]
    fn class_zero_rows_come_first_even_when_later_in_file() {
        let rows = ten_rows();
        let lines: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (_dir, path) = write_raw(&lines);
        let data = create_dataset(&path, &config([8, 10], [1, 3])).unwrap();
        assert_eq!(data.column("a").unwrap().to_vec(), vec![8.0, 9.0, 1.0, 2.0]);
        assert_eq!(data.column(CLASS_COLUMN).unwrap().to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn lines_outside_ranges_are_not_parsed() {
        let (_dir, path) = write_raw(&["header text here", "1 2 3", "4 5 6"]);
        let data = create_dataset(&path, &config([1, 2], [2, 3])).unwrap();
        assert_eq!(data.n_rows(), 2);
    }

    #[test]
    fn missing_keys_are_reported() {
        let (_dir, path) = write_raw(&["1 2 3"]);
        let mut cfg = config([0, 1], [0, 1]);
        cfg.columns = None;
        assert!(matches!(
            create_dataset(&path, &cfg),
            Err(AssembleError::MissingKey(MissingKey("create_dataset.columns")))
        ));
        let mut cfg = config([0, 1], [0, 1]);
        cfg.cloud_data_index.as_mut().unwrap().cloud2 = None;
        assert!(matches!(
            create_dataset(&path, &cfg),
            Err(AssembleError::MissingKey(MissingKey("create_dataset.cloud_data_index.cloud2")))
        ));
    }

    #[test]
    fn unreadable_path_is_file_access_error() {
        let dir = tempdir().unwrap();
        let err = create_dataset(&dir.path().join("absent"), &config([0, 1], [1, 2])).unwrap_err();
        assert!(matches!(err, AssembleError::FileAccess { .. }));
    }

    #[test]
    fn bad_token_and_width_are_reported_with_line() {
        let (_dir, path) = write_raw(&["1 2 3", "4 x 6", "7 8"]);
        assert!(matches!(
            create_dataset(&path, &config([0, 2], [2, 3])),
            Err(AssembleError::Parse { line: 1, ref token }) if token == "x"
        ));
        assert!(matches!(
            create_dataset(&path, &config([0, 1], [2, 3])),
            Err(AssembleError::RowWidth { line: 2, expected: 3, found: 2 })
        ));
    }

    #[test]
    fn range_past_end_of_file_is_rejected() {
        let (_dir, path) = write_raw(&["1 2 3"]);
        assert!(matches!(
            create_dataset(&path, &config([0, 1], [1, 4])),
            Err(AssembleError::InvalidRange { name: "cloud2", .. })
        ));
    }
}
