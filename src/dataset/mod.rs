//! In-memory tabular dataset shared by every pipeline stage.
//!
//! Columns are named `f64` vectors of equal length kept in insertion order.
//! Row identity is positional: row `i` of every column describes one observation.

pub mod assemble;
pub mod csv_io;

use ndarray::{Array1, Axis};
use thiserror::Error;

/// Name of the binary label column attached during dataset assembly.
pub const CLASS_COLUMN: &str = "class";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("Missing column `{0}`")]
    MissingColumn(String),
    #[error("Column `{column}` has {found} rows but the dataset has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate column `{0}`")]
    DuplicateColumn(String),
    #[error("Cannot concatenate datasets with different columns")]
    SchemaMismatch,
}

/// Ordered mapping from column name to an equal-length numeric column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
}

impl Dataset {
    /// Create an empty dataset with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from `(name, values)` pairs, rejecting duplicates and ragged columns.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut dataset = Self::new();
        for (name, values) in columns {
            let name = name.into();
            if dataset.has_column(&name) {
                return Err(DatasetError::DuplicateColumn(name));
            }
            dataset.insert_column(name, Array1::from(values))?;
        }
        Ok(dataset)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |column| column.len())
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Column names in their current order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Borrow a column by name.
    pub fn column(&self, name: &str) -> Result<&Array1<f64>, DatasetError> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// Iterate `(name, column)` pairs in order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Array1<f64>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    /// Insert or replace a column.
    ///
    /// A replaced column keeps its position; a new one is appended. The first column
    /// of an empty dataset sets the row count.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Array1<f64>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.n_rows() {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.n_rows(),
                found: values.len(),
            });
        }
        match self.position(&name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Remove a column and return its values.
    pub fn remove_column(&mut self, name: &str) -> Result<Array1<f64>, DatasetError> {
        let idx = self
            .position(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        self.names.remove(idx);
        Ok(self.columns.remove(idx))
    }

    /// Project onto the named columns, in the order given.
    pub fn select(&self, names: &[String]) -> Result<Dataset, DatasetError> {
        let mut out = Dataset::new();
        for name in names {
            out.insert_column(name.clone(), self.column(name)?.clone())?;
        }
        Ok(out)
    }

    /// Gather the given row positions into a new dataset with the same columns.
    ///
    /// Every index must be below [`Dataset::n_rows`].
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| column.select(Axis(0), indices))
                .collect(),
        }
    }

    /// Stack `other` below `self`. Both must have identical column names and order.
    pub fn concat(&self, other: &Dataset) -> Result<Dataset, DatasetError> {
        if self.names != other.names {
            return Err(DatasetError::SchemaMismatch);
        }
        let columns = self
            .columns
            .iter()
            .zip(other.columns.iter())
            .map(|(top, bottom)| top.iter().chain(bottom.iter()).copied().collect())
            .collect();
        Ok(Dataset {
            names: self.names.clone(),
            columns,
        })
    }

    /// Row-major copy of the named columns, one `Vec` per row.
    pub fn rows(&self, names: &[String]) -> Result<Vec<Vec<f64>>, DatasetError> {
        let selected = names
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((0..self.n_rows())
            .map(|row| selected.iter().map(|column| column[row]).collect())
            .collect())
    }

    /// Replace or append a column derived from this dataset's own columns.
    pub(crate) fn put_derived(&mut self, name: &str, values: Array1<f64>) {
        debug_assert!(self.columns.is_empty() || values.len() == self.n_rows());
        match self.position(name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|existing| existing == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Dataset {
        Dataset::from_columns([
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![10.0, 20.0, 30.0]),
        ])
        .unwrap()
    }

    #[test]
    fn from_columns_rejects_ragged_and_duplicate_columns() {
        let ragged = Dataset::from_columns([("a", vec![1.0]), ("b", vec![1.0, 2.0])]);
        assert!(matches!(ragged, Err(DatasetError::LengthMismatch { .. })));
        let dup = Dataset::from_columns([("a", vec![1.0]), ("a", vec![2.0])]);
        assert_eq!(dup.unwrap_err(), DatasetError::DuplicateColumn("a".into()));
    }

    #[test]
    fn insert_existing_column_overwrites_in_place() {
        let mut data = sample();
        data.insert_column("a", array![7.0, 8.0, 9.0]).unwrap();
        assert_eq!(data.column_names(), ["a", "b"]);
        assert_eq!(data.column("a").unwrap(), &array![7.0, 8.0, 9.0]);
    }

    #[test]
    fn take_rows_and_concat_preserve_alignment() {
        let data = sample();
        let head = data.take_rows(&[2, 0]);
        assert_eq!(head.column("b").unwrap(), &array![30.0, 10.0]);
        let both = head.concat(&data.take_rows(&[1])).unwrap();
        assert_eq!(both.n_rows(), 3);
        assert_eq!(both.column("a").unwrap(), &array![3.0, 1.0, 2.0]);
    }

    #[test]
    fn concat_rejects_different_schemas() {
        let data = sample();
        let other = data.select(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(data.concat(&other).unwrap_err(), DatasetError::SchemaMismatch);
    }

    #[test]
    fn rows_are_row_major_in_requested_order() {
        let rows = sample().rows(&["b".into(), "a".into()]).unwrap();
        assert_eq!(rows, vec![vec![10.0, 1.0], vec![20.0, 2.0], vec![30.0, 3.0]]);
        let missing = sample().rows(&["zzz".into()]).unwrap_err();
        assert_eq!(missing, DatasetError::MissingColumn("zzz".into()));
    }
}
