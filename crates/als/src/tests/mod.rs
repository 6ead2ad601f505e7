//! Cross-module property tests


use crate::matrix::InteractionMatrix;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The 5x3 matrix used throughout the solver tests
pub(crate) fn reference_matrix() -> InteractionMatrix {
    InteractionMatrix::from_rows(&[
        [1.0, 2.0, 3.0],
        [4.0, 5.0, 0.0],
        [1.0, 5.0, 3.0],
        [7.0, 3.0, 9.0],
        [0.0, 4.0, 3.0],
    ])
    .unwrap()
}

/// Sparse count matrix with roughly `density` of cells observed
pub(crate) fn random_counts(rows: usize, cols: usize, density: f64, seed: u64) -> InteractionMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = Array2::from_shape_fn((rows, cols), |_| {
        if rng.gen_bool(density) {
            rng.gen_range(1..6) as f64
        } else {
            0.0
        }
    });
    InteractionMatrix::new(values).unwrap()
}
