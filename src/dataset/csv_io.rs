//! Delimited-text persistence: a header row followed by comma-separated values.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use ndarray::Array1;
use thiserror::Error;

use super::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path}: row {row}, column `{column}`: `{value}` is not a number")]
    Parse {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },
    #[error("{path}: {source}")]
    Shape {
        path: PathBuf,
        source: DatasetError,
    },
}

impl CsvError {
    pub fn is_file_access(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Csv { source, .. } => source.is_io_error(),
            _ => false,
        }
    }
}

/// Write `dataset` as CSV with a header row and no index column.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<(), CsvError> {
    let csv_err = |source| CsvError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    writer.write_record(dataset.column_names()).map_err(csv_err)?;
    let columns: Vec<&Array1<f64>> = dataset.iter_columns().map(|(_, column)| column).collect();
    let mut record = Vec::with_capacity(columns.len());
    for row in 0..dataset.n_rows() {
        record.clear();
        record.extend(columns.iter().map(|column| column[row].to_string()));
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Dataset saved to {} ({} rows)", path.display(), dataset.n_rows());
    Ok(())
}

/// Read a CSV file written by [`write_csv`] (or any numeric CSV with a header).
pub fn read_csv(path: &Path) -> Result<Dataset, CsvError> {
    let file = File::open(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));
    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| CsvError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|source| CsvError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        for (idx, field) in record.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| CsvError::Parse {
                path: path.to_path_buf(),
                row,
                column: headers[idx].clone(),
                value: field.to_string(),
            })?;
            columns[idx].push(value);
        }
    }
    Dataset::from_columns(headers.into_iter().zip(columns)).map_err(|source| CsvError::Shape {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows_without_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let data =
            Dataset::from_columns([("a", vec![1.5, -2.0]), ("class", vec![0.0, 1.0])]).unwrap();
        write_csv(&data, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a,class\n1.5,0\n-2,1\n");
        assert_eq!(read_csv(&path).unwrap(), data);
    }

    #[test]
    fn non_finite_values_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let data = Dataset::from_columns([("x", vec![f64::NEG_INFINITY, f64::INFINITY])]).unwrap();
        write_csv(&data, &path).unwrap();
        assert_eq!(read_csv(&path).unwrap(), data);
    }

    #[test]
    fn non_numeric_field_reports_row_and_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n3,oops\n").unwrap();
        match read_csv(&path).unwrap_err() {
            CsvError::Parse { row, column, value, .. } => {
                assert_eq!((row, column.as_str(), value.as_str()), (1, "b", "oops"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn unwritable_destination_is_a_file_access_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let data = Dataset::from_columns([("a", vec![1.0])]).unwrap();
        assert!(write_csv(&data, &path).unwrap_err().is_file_access());
    }
}
