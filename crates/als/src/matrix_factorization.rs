//! Matrix Factorization using Weighted Alternating Least Squares (WALS)
//!
//! Implements the implicit-feedback ALS of Hu, Koren and Volinsky. The
//! interaction matrix R is turned into a binary preference matrix P and a
//! confidence matrix C, then user factors U and item factors V are solved in
//! alternation. Each half-step is an exact regularized least squares solve per
//! row:
//!
//! ```text
//! x_u = (YᵗY + Yᵗ(C_u − I)Y + λI)⁻¹ · YᵗC_u·p_u
//! ```
//!
//! where Y is the factor matrix held fixed during that half-step. YᵗY is shared
//! by every row and computed once per half-step.

use crate::linalg::cholesky_solve;
use crate::matrix::InteractionMatrix;
use crate::preference::{PreferenceModel, Preferences, DEFAULT_ALPHA};
use implicit_rec_core::config::{parse_env_var, parse_optional_env_var, ConfigLoader};
use implicit_rec_core::{RecError, Result, SolveSide};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// ALS configuration parameters
///
/// # Environment Variables
///
/// - `IMPLICIT_REC_FACTORS`: number of latent factors (default: 10)
/// - `IMPLICIT_REC_ITERATIONS`: number of full iterations (default: 20)
/// - `IMPLICIT_REC_REGULARIZATION`: lambda (default: 0.001)
/// - `IMPLICIT_REC_ALPHA`: confidence scaling (default: 40.0)
/// - `IMPLICIT_REC_TOLERANCE`: relative loss improvement for early stop (default: unset)
/// - `IMPLICIT_REC_PARALLEL`: solve rows on the rayon pool (default: false)
/// - `IMPLICIT_REC_SEED`: seed for factor initialization (default: unset, random)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ALSConfig {
    /// Number of latent factors (embedding dimension)
    pub latent_factors: usize,
    /// Regularization parameter (lambda)
    pub regularization: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Confidence scaling for implicit feedback
    pub alpha: f64,
    /// Stop early once the relative loss improvement drops below this
    pub tolerance: Option<f64>,
    /// Solve rows of a half-step in parallel
    pub parallel: bool,
    /// Seed for the factor initialization
    pub seed: Option<u64>,
}

impl Default for ALSConfig {
    fn default() -> Self {
        Self {
            latent_factors: 10,
            regularization: 0.001,
            iterations: 20,
            alpha: DEFAULT_ALPHA,
            tolerance: None,
            parallel: false,
            seed: None,
        }
    }
}

impl ALSConfig {
    /// Validate against the dimensions of a concrete interaction matrix
    ///
    /// Adds the `latent_factors <= min(num_users, num_items)` check to
    /// [`ConfigLoader::validate`].
    pub fn validate_for(&self, num_users: usize, num_items: usize) -> Result<()> {
        self.validate()?;

        let limit = num_users.min(num_items);
        if self.latent_factors > limit {
            return Err(RecError::invalid_config(
                format!(
                    "latent_factors ({}) cannot exceed min(num_users, num_items) = {}",
                    self.latent_factors, limit
                ),
                "latent_factors",
            ));
        }

        Ok(())
    }
}

impl ConfigLoader for ALSConfig {
    fn from_env() -> Result<Self> {
        let defaults = ALSConfig::default();

        Ok(Self {
            latent_factors: parse_env_var("IMPLICIT_REC_FACTORS", defaults.latent_factors)?,
            regularization: parse_env_var("IMPLICIT_REC_REGULARIZATION", defaults.regularization)?,
            iterations: parse_env_var("IMPLICIT_REC_ITERATIONS", defaults.iterations)?,
            alpha: parse_env_var("IMPLICIT_REC_ALPHA", defaults.alpha)?,
            tolerance: parse_optional_env_var("IMPLICIT_REC_TOLERANCE")?,
            parallel: parse_env_var("IMPLICIT_REC_PARALLEL", defaults.parallel)?,
            seed: parse_optional_env_var("IMPLICIT_REC_SEED")?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.latent_factors == 0 {
            return Err(RecError::invalid_config(
                "latent_factors must be greater than 0",
                "latent_factors",
            ));
        }

        if self.iterations == 0 {
            return Err(RecError::invalid_config(
                "iterations must be greater than 0",
                "iterations",
            ));
        }

        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(RecError::invalid_config(
                format!(
                    "regularization must be a non-negative finite number (got {})",
                    self.regularization
                ),
                "regularization",
            ));
        }

        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(RecError::invalid_config(
                format!("alpha must be a positive finite number (got {})", self.alpha),
                "alpha",
            ));
        }

        if let Some(tolerance) = self.tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(RecError::invalid_config(
                    format!("tolerance must be a positive finite number (got {})", tolerance),
                    "tolerance",
                ));
            }
        }

        Ok(())
    }
}

/// User and item latent factors
#[derive(Debug, Clone, PartialEq)]
pub struct Factors {
    /// User latent factors: [num_users x latent_factors]
    pub user_factors: Array2<f64>,
    /// Item latent factors: [num_items x latent_factors]
    pub item_factors: Array2<f64>,
}

impl Factors {
    /// Pair up factor matrices, checking they share a latent dimension
    pub fn new(user_factors: Array2<f64>, item_factors: Array2<f64>) -> Result<Self> {
        if user_factors.ncols() != item_factors.ncols() {
            return Err(RecError::invalid_input(format!(
                "user factors have {} columns but item factors have {}",
                user_factors.ncols(),
                item_factors.ncols()
            )));
        }
        if user_factors.ncols() == 0 {
            return Err(RecError::invalid_input(
                "factor matrices must have at least one latent factor",
            ));
        }
        Ok(Self {
            user_factors,
            item_factors,
        })
    }

    /// Fresh factors drawn uniformly from [0, 1), users first, row-major
    pub fn random<R: Rng + ?Sized>(
        num_users: usize,
        num_items: usize,
        latent_factors: usize,
        rng: &mut R,
    ) -> Self {
        let user_factors = Array2::from_shape_fn((num_users, latent_factors), |_| rng.gen::<f64>());
        let item_factors = Array2::from_shape_fn((num_items, latent_factors), |_| rng.gen::<f64>());
        Self {
            user_factors,
            item_factors,
        }
    }

    pub fn num_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn latent_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    /// Predicted preference for a user-item pair
    pub fn predict(&self, user_idx: usize, item_idx: usize) -> Option<f64> {
        let user = self.user_embedding(user_idx)?;
        let item = self.item_embedding(item_idx)?;
        Some(user.dot(&item))
    }

    pub fn user_embedding(&self, user_idx: usize) -> Option<ArrayView1<'_, f64>> {
        (user_idx < self.num_users()).then(|| self.user_factors.row(user_idx))
    }

    pub fn item_embedding(&self, item_idx: usize) -> Option<ArrayView1<'_, f64>> {
        (item_idx < self.num_items()).then(|| self.item_factors.row(item_idx))
    }

    /// Full predicted preference matrix U · Vᵗ
    pub fn reconstruct(&self) -> Array2<f64> {
        self.user_factors.dot(&self.item_factors.t())
    }

    /// True when every factor is a finite number
    pub fn is_finite(&self) -> bool {
        self.user_factors.iter().all(|v| v.is_finite())
            && self.item_factors.iter().all(|v| v.is_finite())
    }
}

/// Progress report emitted after every full iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitInfo {
    /// 1-based iteration number
    pub iteration: usize,
    /// Weighted regularized loss after the iteration
    pub loss: f64,
}

/// Weighted regularized loss
///
/// L(U,V) = Σ C[u,i]·(P[u,i] − U_u·V_i)² + λ(‖U‖² + ‖V‖²)
///
/// Panics if the factor shapes do not match the preference matrices.
pub fn weighted_loss(prefs: &Preferences, factors: &Factors, regularization: f64) -> f64 {
    let predicted = factors.reconstruct();

    let mut loss = 0.0;
    Zip::from(&predicted)
        .and(prefs.preference())
        .and(prefs.confidence())
        .for_each(|&x, &p, &c| {
            let err = p - x;
            loss += c * err * err;
        });

    let norm = factors.user_factors.iter().map(|v| v * v).sum::<f64>()
        + factors.item_factors.iter().map(|v| v * v).sum::<f64>();

    loss + regularization * norm
}

/// ALS-based matrix factorization
#[derive(Debug, Clone)]
pub struct MatrixFactorization {
    config: ALSConfig,
}

impl MatrixFactorization {
    pub fn new(config: ALSConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ALSConfig {
        &self.config
    }

    /// Train on an interaction matrix
    ///
    /// Uses `config.seed` when set, otherwise an entropy-seeded generator.
    pub fn fit(&self, matrix: &InteractionMatrix) -> Result<Factors> {
        match self.config.seed {
            Some(seed) => self.fit_with_rng(matrix, &mut StdRng::seed_from_u64(seed)),
            None => self.fit_with_rng(matrix, &mut StdRng::from_entropy()),
        }
    }

    /// Train with an injected random source for the initial factors
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &self,
        matrix: &InteractionMatrix,
        rng: &mut R,
    ) -> Result<Factors> {
        self.fit_with_callback(matrix, rng, |_| {})
    }

    /// Train and report every iteration to `callback`
    ///
    /// All validation happens before the factors are allocated. The loop runs
    /// exactly `config.iterations` times unless `config.tolerance` is set.
    pub fn fit_with_callback<R, C>(
        &self,
        matrix: &InteractionMatrix,
        rng: &mut R,
        mut callback: C,
    ) -> Result<Factors>
    where
        R: Rng + ?Sized,
        C: FnMut(&FitInfo),
    {
        let num_users = matrix.num_users();
        let num_items = matrix.num_items();
        self.config.validate_for(num_users, num_items)?;

        let prefs = PreferenceModel::new(self.config.alpha)?.derive(matrix.values())?;

        let mut factors = Factors::random(num_users, num_items, self.config.latent_factors, rng);

        tracing::info!(
            num_users,
            num_items,
            latent_factors = self.config.latent_factors,
            iterations = self.config.iterations,
            regularization = self.config.regularization,
            parallel = self.config.parallel,
            "Starting ALS fit"
        );

        let start = Instant::now();
        let mut previous_loss: Option<f64> = None;
        let mut completed = 0;

        for iteration in 1..=self.config.iterations {
            self.solve_users(&prefs, &mut factors)?;
            self.solve_items(&prefs, &mut factors)?;
            completed = iteration;

            let loss = weighted_loss(&prefs, &factors, self.config.regularization);
            tracing::debug!("ALS iteration {}: loss = {:.6}", iteration, loss);
            callback(&FitInfo { iteration, loss });

            if let (Some(tolerance), Some(previous)) = (self.config.tolerance, previous_loss) {
                let improvement = (previous - loss) / previous.abs().max(f64::MIN_POSITIVE);
                if improvement < tolerance {
                    tracing::info!(
                        iteration,
                        improvement,
                        tolerance,
                        "ALS converged before iteration limit"
                    );
                    break;
                }
            }
            previous_loss = Some(loss);
        }

        tracing::info!(
            iterations = completed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ALS fit finished"
        );

        Ok(factors)
    }

    /// Half-step: solve every user row with item factors fixed
    pub fn solve_users(&self, prefs: &Preferences, factors: &mut Factors) -> Result<()> {
        check_shapes(prefs, factors)?;

        let solved = solve_side(
            SolveSide::Users,
            &factors.item_factors,
            prefs.preference().view(),
            prefs.confidence().view(),
            self.config.regularization,
            self.config.parallel,
        )?;
        factors.user_factors.assign(&solved);
        Ok(())
    }

    /// Half-step: solve every item row with user factors fixed
    pub fn solve_items(&self, prefs: &Preferences, factors: &mut Factors) -> Result<()> {
        check_shapes(prefs, factors)?;

        let (preference_t, confidence_t) = prefs.transposed();
        let solved = solve_side(
            SolveSide::Items,
            &factors.user_factors,
            preference_t,
            confidence_t,
            self.config.regularization,
            self.config.parallel,
        )?;
        factors.item_factors.assign(&solved);
        Ok(())
    }
}

fn check_shapes(prefs: &Preferences, factors: &Factors) -> Result<()> {
    if prefs.num_users() != factors.num_users() || prefs.num_items() != factors.num_items() {
        return Err(RecError::invalid_input(format!(
            "factors cover {}x{} users/items but preferences are {}x{}",
            factors.num_users(),
            factors.num_items(),
            prefs.num_users(),
            prefs.num_items()
        )));
    }
    if factors.user_factors.ncols() != factors.item_factors.ncols() {
        return Err(RecError::invalid_input(
            "user and item factors have different latent dimensions",
        ));
    }
    Ok(())
}

/// Solve all rows of one side; nothing is written unless every row succeeds
fn solve_side(
    side: SolveSide,
    fixed: &Array2<f64>,
    preference: ArrayView2<'_, f64>,
    confidence: ArrayView2<'_, f64>,
    regularization: f64,
    parallel: bool,
) -> Result<Array2<f64>> {
    let num_rows = preference.nrows();
    let k = fixed.ncols();

    // YᵗY is shared by every row of this half-step
    let gram = fixed.t().dot(fixed);

    let solve_row = |row: usize| -> Result<Array1<f64>> {
        solve_row_system(
            side,
            row,
            fixed,
            &gram,
            preference.row(row),
            confidence.row(row),
            regularization,
        )
    };

    let rows: Vec<Array1<f64>> = if parallel {
        (0..num_rows)
            .into_par_iter()
            .map(solve_row)
            .collect::<Result<_>>()?
    } else {
        (0..num_rows).map(solve_row).collect::<Result<_>>()?
    };

    let mut solved = Array2::<f64>::zeros((num_rows, k));
    for (mut target, row) in solved.rows_mut().into_iter().zip(rows.iter()) {
        target.assign(row);
    }
    Ok(solved)
}

/// Solve (YᵗY + Yᵗ(C_u − I)Y + λI) x = YᵗC_u p_u for one row
fn solve_row_system(
    side: SolveSide,
    row: usize,
    fixed: &Array2<f64>,
    gram: &Array2<f64>,
    preference: ArrayView1<'_, f64>,
    confidence: ArrayView1<'_, f64>,
    regularization: f64,
) -> Result<Array1<f64>> {
    let k = fixed.ncols();
    let mut a = gram.clone();
    let mut b = Array1::<f64>::zeros(k);

    for (j, (&p, &c)) in preference.iter().zip(confidence.iter()).enumerate() {
        let weight = c - 1.0;
        if weight == 0.0 && p == 0.0 {
            continue;
        }

        let y = fixed.row(j);

        // A += (c - 1) * y^T * y
        if weight != 0.0 {
            for i in 0..k {
                let wy = weight * y[i];
                for l in 0..k {
                    a[[i, l]] += wy * y[l];
                }
            }
        }

        // b += c * p * y
        if p != 0.0 {
            b.scaled_add(c * p, &y);
        }
    }

    // A += lambda * I
    for i in 0..k {
        a[[i, i]] += regularization;
    }

    cholesky_solve(&a, &b).map_err(|e| RecError::NumericalInstability {
        side,
        row,
        message: e.to_string(),
    })
}
