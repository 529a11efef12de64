//! Dense row-major tables used for data points, datasets and background pools.
//!
//! Every input row handed to a [`Predictor`](crate::oracle::Predictor) lives in
//! a [`Dataset`]. Feature identity is positional: column `i` is feature `i`.

use serde::{Deserialize, Serialize};

/// Shape violations detected while building or combining datasets.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("dataset must contain at least one row and one feature")]
    Empty,
    #[display("value count {len} is not a multiple of feature count {n_features}")]
    UnalignedValues { len: usize, n_features: usize },
    #[display("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[display("row index {row} out of range for {n_rows} rows")]
    RowOutOfRange { row: usize, n_rows: usize },
    #[display("column index {column} out of range for {n_features} features")]
    ColumnOutOfRange { column: usize, n_features: usize },
    #[display(
        "shape mismatch: expected {expected_rows}x{expected_features}, found {found_rows}x{found_features}"
    )]
    Mismatch {
        expected_rows: usize,
        expected_features: usize,
        found_rows: usize,
        found_features: usize,
    },
}

/// A table of `f64` values with a fixed number of features per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Dataset {
    n_features: usize,
    values: Vec<f64>,
}

impl Dataset {
    /// Builds a dataset from flat row-major values.
    ///
    /// An empty value vector is allowed and yields a dataset without rows.
    pub fn new(n_features: usize, values: Vec<f64>) -> Result<Self, ShapeError> {
        if n_features == 0 {
            return Err(ShapeError::Empty);
        }
        if !values.len().is_multiple_of(n_features) {
            return Err(ShapeError::UnalignedValues {
                len: values.len(),
                n_features,
            });
        }
        Ok(Self { n_features, values })
    }

    /// Builds a dataset from a list of rows of equal width.
    ///
    /// # Examples
    ///
    /// ```
    /// use qii_engine::dataset::Dataset;
    ///
    /// let data = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// assert_eq!(data.n_rows(), 2);
    /// assert_eq!(data.row(1), &[3.0, 4.0]);
    /// ```
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Result<Self, ShapeError>
    where
        R: AsRef<[f64]>,
    {
        let mut n_features = None;
        let mut values = vec![];
        for (i, row) in rows.into_iter().enumerate() {
            let row = row.as_ref();
            let expected = *n_features.get_or_insert(row.len());
            if row.len() != expected {
                return Err(ShapeError::RaggedRow {
                    row: i,
                    expected,
                    found: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Self::new(n_features.ok_or(ShapeError::Empty)?, values)
    }

    /// Returns `n` copies of a single row.
    pub fn repeat_row(row: &[f64], n: usize) -> Result<Self, ShapeError> {
        let values = row.repeat(n);
        Self::new(row.len(), values)
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.len() / self.n_features
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.n_rows()`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_features..(i + 1) * self.n_features]
    }

    #[must_use]
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.n_features)
    }

    /// Copies the given rows, in order, into a new dataset.
    ///
    /// Indices may repeat, which is how bootstrap pools are drawn.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self, ShapeError> {
        let n_rows = self.n_rows();
        let mut values = Vec::with_capacity(indices.len() * self.n_features);
        for &row in indices {
            if row >= n_rows {
                return Err(ShapeError::RowOutOfRange { row, n_rows });
            }
            values.extend_from_slice(self.row(row));
        }
        Self::new(self.n_features, values)
    }

    /// Overwrites `column` with the same column taken from `other`.
    pub fn copy_column_from(&mut self, column: usize, other: &Dataset) -> Result<(), ShapeError> {
        if self.n_features != other.n_features || self.n_rows() != other.n_rows() {
            return Err(ShapeError::Mismatch {
                expected_rows: self.n_rows(),
                expected_features: self.n_features,
                found_rows: other.n_rows(),
                found_features: other.n_features,
            });
        }
        if column >= self.n_features {
            return Err(ShapeError::ColumnOutOfRange {
                column,
                n_features: self.n_features,
            });
        }
        let n = self.n_features;
        let src = other.column(column);
        for (dst, value) in iter_column_mut(&mut self.values, n, column).zip(src) {
            *dst = value;
        }
        Ok(())
    }

    /// Iterates over the values of one column.
    pub fn column(&self, column: usize) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .skip(column)
            .step_by(self.n_features)
            .copied()
    }
}

fn iter_column_mut(
    values: &mut [f64],
    n_features: usize,
    column: usize,
) -> impl Iterator<Item = &mut f64> {
    values.iter_mut().skip(column).step_by(n_features)
}

impl TryFrom<Vec<Vec<f64>>> for Dataset {
    type Error = ShapeError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Dataset> for Vec<Vec<f64>> {
    fn from(data: Dataset) -> Self {
        data.rows().map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let err = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_from_rows_rejects_empty_input() {
        let rows: Vec<Vec<f64>> = vec![];
        assert_eq!(Dataset::from_rows(rows).unwrap_err(), ShapeError::Empty);
    }

    #[test]
    fn test_new_rejects_unaligned_values() {
        let err = Dataset::new(3, vec![1.0; 7]).unwrap_err();
        assert!(matches!(err, ShapeError::UnalignedValues { len: 7, .. }));
    }

    #[test]
    fn test_select_rows_allows_duplicates() {
        let data = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let picked = data.select_rows(&[1, 1, 0]).unwrap();
        assert_eq!(picked.n_rows(), 3);
        assert_eq!(picked.row(0), &[3.0, 4.0]);
        assert_eq!(picked.row(1), &[3.0, 4.0]);
        assert_eq!(picked.row(2), &[1.0, 2.0]);
    }

    #[test]
    fn test_select_rows_out_of_range() {
        let data = Dataset::from_rows(vec![vec![1.0]]).unwrap();
        assert_eq!(
            data.select_rows(&[2]).unwrap_err(),
            ShapeError::RowOutOfRange { row: 2, n_rows: 1 }
        );
    }

    #[test]
    fn test_copy_column_from_replaces_only_that_column() {
        let mut batch = Dataset::repeat_row(&[0.0, 0.0, 0.0], 2).unwrap();
        let pool = Dataset::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        batch.copy_column_from(1, &pool).unwrap();
        assert_eq!(batch.row(0), &[0.0, 2.0, 0.0]);
        assert_eq!(batch.row(1), &[0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_copy_column_from_shape_mismatch() {
        let mut batch = Dataset::repeat_row(&[0.0, 0.0], 3).unwrap();
        let pool = Dataset::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            batch.copy_column_from(0, &pool),
            Err(ShapeError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_serde_as_rows() {
        let data = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, "[[1.0,2.0],[3.0,4.0]]");
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);

        let ragged: Result<Dataset, _> = serde_json::from_str("[[1.0],[2.0,3.0]]");
        assert!(ragged.is_err());
    }
}
