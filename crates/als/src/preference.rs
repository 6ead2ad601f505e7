//! Preference and confidence derivation for implicit feedback
//!
//! P[u,i] = 1 if R[u,i] != 0 else 0
//! C[u,i] = 1 + alpha * R[u,i]

use crate::matrix::validate_interactions;
use implicit_rec_core::{RecError, Result};
use ndarray::{Array2, ArrayView2};

/// Confidence scaling used when none is configured
pub const DEFAULT_ALPHA: f64 = 40.0;

/// Derives (P, C) from raw interaction strengths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreferenceModel {
    alpha: f64,
}

impl PreferenceModel {
    pub fn new(alpha: f64) -> Result<Self> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(RecError::invalid_config(
                format!("alpha must be a positive finite number (got {})", alpha),
                "alpha",
            ));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Compute the preference and confidence matrices
    ///
    /// Pure and deterministic. Fails with `InvalidInput` on a negative,
    /// non-finite or empty interaction table.
    pub fn derive(&self, interactions: &Array2<f64>) -> Result<Preferences> {
        validate_interactions(interactions.view())?;

        let preference = interactions.mapv(|r| if r != 0.0 { 1.0 } else { 0.0 });
        let confidence = interactions.mapv(|r| 1.0 + self.alpha * r);

        Ok(Preferences {
            preference,
            confidence,
        })
    }
}

impl Default for PreferenceModel {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// Immutable (P, C) pair, user-major
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    preference: Array2<f64>,
    confidence: Array2<f64>,
}

impl Preferences {
    pub fn preference(&self) -> &Array2<f64> {
        &self.preference
    }

    pub fn confidence(&self) -> &Array2<f64> {
        &self.confidence
    }

    pub fn num_users(&self) -> usize {
        self.preference.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.preference.ncols()
    }

    /// Views with items as rows, for the item half-step
    pub fn transposed(&self) -> (ArrayView2<'_, f64>, ArrayView2<'_, f64>) {
        (self.preference.t(), self.confidence.t())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_derive_preference_and_confidence() {
        let model = PreferenceModel::default();
        let r = array![[1.0, 0.0, 3.0], [0.0, 0.5, 0.0]];

        let prefs = model.derive(&r).unwrap();

        assert_eq!(
            prefs.preference(),
            &array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0]]
        );
        assert_eq!(
            prefs.confidence(),
            &array![[41.0, 1.0, 121.0], [1.0, 21.0, 1.0]]
        );
    }

    #[test]
    fn test_custom_alpha() {
        let model = PreferenceModel::new(2.0).unwrap();
        let prefs = model.derive(&array![[0.0, 4.0]]).unwrap();
        assert_eq!(prefs.confidence(), &array![[1.0, 9.0]]);
        assert_eq!(model.alpha(), 2.0);
    }

    #[test]
    fn test_rejects_negative_interaction() {
        let model = PreferenceModel::default();
        let err = model.derive(&array![[1.0, -1.0]]).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_non_positive_alpha() {
        assert!(PreferenceModel::new(0.0).unwrap_err().is_invalid_config());
        assert!(PreferenceModel::new(-3.0).unwrap_err().is_invalid_config());
        assert!(PreferenceModel::new(f64::INFINITY)
            .unwrap_err()
            .is_invalid_config());
    }

    #[test]
    fn test_transposed_views() {
        let prefs = PreferenceModel::default()
            .derive(&array![[1.0, 0.0, 2.0], [0.0, 0.0, 1.0]])
            .unwrap();
        let (p_t, c_t) = prefs.transposed();

        assert_eq!(p_t.dim(), (3, 2));
        assert_eq!(p_t[[2, 1]], 1.0);
        assert_eq!(c_t[[2, 0]], 81.0);
        assert_eq!(prefs.num_users(), 2);
        assert_eq!(prefs.num_items(), 3);
    }
}
