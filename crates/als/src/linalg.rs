//! Small dense linear solves for the per-row least squares systems
//!
//! The systems are F x F with F in the tens, so a straightforward Cholesky
//! factorization is both exact and cheap.

use ndarray::{Array1, Array2};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("matrix is {rows}x{cols} but right-hand side has length {rhs}")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },

    #[error("matrix is singular or not positive definite (pivot {pivot:e} at column {column}, tolerance {tolerance:e})")]
    NotPositiveDefinite {
        column: usize,
        pivot: f64,
        tolerance: f64,
    },
}

/// Pivot threshold below which a Cholesky pivot counts as zero
///
/// `n * EPSILON * max|A_ii|`: the rounding error accumulated by an n-term
/// dot product relative to the largest diagonal entry.
pub fn singularity_tolerance(a: &Array2<f64>) -> f64 {
    let max_diag = a.diag().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    a.nrows() as f64 * f64::EPSILON * max_diag
}

/// Lower-triangular Cholesky factor L with A = L * L^T
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>, LinalgError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(LinalgError::DimensionMismatch {
            rows: n,
            cols: a.ncols(),
            rhs: n,
        });
    }

    let tolerance = singularity_tolerance(a);
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if !diag.is_finite() || diag <= tolerance {
                    return Err(LinalgError::NotPositiveDefinite {
                        column: i,
                        pivot: diag,
                        tolerance,
                    });
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Ok(l)
}

/// Solve A * x = b for symmetric positive definite A
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
    let n = a.nrows();
    if b.len() != n {
        return Err(LinalgError::DimensionMismatch {
            rows: n,
            cols: a.ncols(),
            rhs: b.len(),
        });
    }

    let l = cholesky(a)?;

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd_system() {
        let a = array![[4.0, 2.0, 0.6], [2.0, 5.0, 1.0], [0.6, 1.0, 3.0]];
        let expected = array![1.0, -2.0, 0.5];
        let b = a.dot(&expected);

        let x = cholesky_solve(&a, &b).unwrap();
        for (got, want) in x.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_cholesky_factor_reconstructs() {
        let a = array![[9.0, 3.0], [3.0, 5.0]];
        let l = cholesky(&a).unwrap();
        assert_eq!(l, array![[3.0, 0.0], [1.0, 2.0]]);
        assert_eq!(l.dot(&l.t()), a);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        // Rank one: second row is twice the first
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let err = cholesky_solve(&a, &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            LinalgError::NotPositiveDefinite { column: 1, .. }
        ));
    }

    #[test]
    fn test_zero_matrix_rejected() {
        let a = Array2::<f64>::zeros((3, 3));
        assert!(cholesky(&a).is_err());
    }

    #[test]
    fn test_indefinite_matrix_rejected() {
        let a = array![[1.0, 0.0], [0.0, -1.0]];
        assert!(matches!(
            cholesky(&a),
            Err(LinalgError::NotPositiveDefinite { column: 1, .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        assert!(matches!(
            cholesky_solve(&a, &array![1.0, 2.0, 3.0]),
            Err(LinalgError::DimensionMismatch { rhs: 3, .. })
        ));
    }
}
