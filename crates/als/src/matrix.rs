//! Dense user-item interaction matrix
//!
//! Rows are users, columns are items. Zero means no observed interaction and
//! positive values are interaction strength (rating, view count, ...).

use implicit_rec_core::{RecError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Check that an interaction table is non-empty, finite and non-negative
pub fn validate_interactions(values: ArrayView2<'_, f64>) -> Result<()> {
    let (rows, cols) = values.dim();
    if rows == 0 || cols == 0 {
        return Err(RecError::invalid_input(format!(
            "interaction matrix must have at least one row and one column (got {}x{})",
            rows, cols
        )));
    }

    for ((u, i), &value) in values.indexed_iter() {
        if !value.is_finite() {
            return Err(RecError::invalid_input(format!(
                "interaction ({}, {}) is not finite: {}",
                u, i, value
            )));
        }
        if value < 0.0 {
            return Err(RecError::invalid_input(format!(
                "interaction ({}, {}) is negative: {}",
                u, i, value
            )));
        }
    }

    Ok(())
}

/// Validated M x N interaction matrix
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    values: Array2<f64>,
}

impl InteractionMatrix {
    /// Wrap a dense table after validating it
    pub fn new(values: Array2<f64>) -> Result<Self> {
        validate_interactions(values.view())?;
        Ok(Self { values })
    }

    /// Build from nested rows; every row must have the same length
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let num_items = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * num_items);

        for (u, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != num_items {
                return Err(RecError::invalid_input(format!(
                    "row {} has {} columns, expected {}",
                    u,
                    row.len(),
                    num_items
                )));
            }
            data.extend_from_slice(row);
        }

        let values = Array2::from_shape_vec((rows.len(), num_items), data)
            .map_err(|e| RecError::invalid_input(format!("invalid matrix shape: {}", e)))?;
        Self::new(values)
    }

    /// Build from `(user_index, item_index, value)` entries
    ///
    /// Later entries for the same cell overwrite earlier ones.
    pub fn from_entries<I>(num_users: usize, num_items: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut values = Array2::<f64>::zeros((num_users, num_items));
        for (u, i, value) in entries {
            if u >= num_users || i >= num_items {
                return Err(RecError::invalid_input(format!(
                    "entry ({}, {}) is outside a {}x{} matrix",
                    u, i, num_users, num_items
                )));
            }
            values[[u, i]] = value;
        }
        Self::new(values)
    }

    pub fn num_users(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, user_idx: usize, item_idx: usize) -> f64 {
        self.values[[user_idx, item_idx]]
    }

    /// One user's interactions; panics if `user_idx` is out of range
    pub fn row(&self, user_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(user_idx)
    }

    /// Number of observed (non-zero) interactions
    pub fn nnz(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }

    /// Fraction of cells with an observed interaction
    pub fn density(&self) -> f64 {
        self.nnz() as f64 / (self.num_users() * self.num_items()) as f64
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_entries() {
        let matrix =
            InteractionMatrix::from_entries(2, 3, vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)])
                .unwrap();

        assert_eq!(matrix.num_users(), 2);
        assert_eq!(matrix.num_items(), 3);
        assert_eq!(matrix.get(0, 0), 1.0);
        assert_eq!(matrix.get(0, 2), 2.0);
        assert_eq!(matrix.get(1, 1), 3.0);
        assert_eq!(matrix.get(1, 0), 0.0);
        assert_eq!(matrix.nnz(), 3);
        assert!((matrix.density() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_entries_out_of_range() {
        let result = InteractionMatrix::from_entries(2, 2, vec![(2, 0, 1.0)]);
        assert!(result.unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_rejects_negative_entry() {
        let err = InteractionMatrix::new(array![[1.0, -2.0], [0.0, 1.0]]).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_rejects_non_finite_entry() {
        let err = InteractionMatrix::new(array![[1.0, f64::NAN]]).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_empty_matrix() {
        assert!(InteractionMatrix::new(Array2::zeros((0, 3)))
            .unwrap_err()
            .is_invalid_input());
        assert!(InteractionMatrix::new(Array2::zeros((3, 0)))
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_from_rows_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(InteractionMatrix::from_rows(&rows)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_from_rows() {
        let matrix = InteractionMatrix::from_rows(&[[1.0, 0.0, 3.0], [0.0, 5.0, 0.0]]).unwrap();
        assert_eq!(matrix.values(), &array![[1.0, 0.0, 3.0], [0.0, 5.0, 0.0]]);
        assert_eq!(matrix.row(1).to_vec(), vec![0.0, 5.0, 0.0]);
    }
}
