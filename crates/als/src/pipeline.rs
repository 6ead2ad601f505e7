//! End-to-end recommendation pipeline
//!
//! Loads interactions, reuses persisted factors when they still match the
//! data, otherwise fits and persists fresh ones, then ranks items for one user
//! and attaches external ids and titles.

use crate::catalog::CatalogLookup;
use crate::factor_store::FactorStore;
use crate::interactions::{InteractionData, InteractionStore};
use crate::matrix_factorization::{ALSConfig, Factors, MatrixFactorization};
use crate::recommendation::recommend_for_user;
use implicit_rec_core::{RecError, Result};
use serde::Serialize;

/// Where the factors used for a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorSource {
    Loaded,
    Fitted,
}

/// A recommended item with its external id and display title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub item_id: u64,
    pub index: usize,
    pub score: f64,
    pub title: Option<String>,
    /// The user already interacted with this item (back-filled or `include_seen`)
    pub seen: bool,
}

/// Recommendations for one external user id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecommendations {
    pub user_id: u64,
    pub requested: usize,
    pub truncated: bool,
    pub backfilled: usize,
    pub source: FactorSource,
    pub items: Vec<RankedItem>,
}

/// Options for a single recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendRequest {
    pub user_id: u64,
    pub k: usize,
    pub include_seen: bool,
    /// Ignore persisted factors and fit again
    pub refit: bool,
}

pub struct RecommendationPipeline {
    solver: MatrixFactorization,
    interactions: Box<dyn InteractionStore>,
    factor_store: Box<dyn FactorStore>,
    catalog: Option<Box<dyn CatalogLookup>>,
}

impl RecommendationPipeline {
    pub fn new(
        config: ALSConfig,
        interactions: Box<dyn InteractionStore>,
        factor_store: Box<dyn FactorStore>,
    ) -> Self {
        Self {
            solver: MatrixFactorization::new(config),
            interactions,
            factor_store,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Box<dyn CatalogLookup>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &ALSConfig {
        self.solver.config()
    }

    pub fn load_data(&self) -> Result<InteractionData> {
        self.interactions.load()
    }

    /// Fit fresh factors and persist them
    pub fn fit(&self, data: &InteractionData) -> Result<Factors> {
        let factors = self.solver.fit(&data.matrix)?;
        self.factor_store.save(&factors)?;
        Ok(factors)
    }

    /// Stored factors when their shape fits the data, else a fresh fit
    ///
    /// Only the shape is compared: factors saved under a different
    /// regularization, alpha or seed are reused as long as the user count,
    /// item count and latent dimension agree. Unreadable factor files are
    /// replaced by a fresh fit.
    pub fn factors_for(&self, data: &InteractionData, refit: bool) -> Result<(Factors, FactorSource)> {
        if !refit {
            match self.factor_store.load() {
                Ok(Some(stored)) if self.is_compatible(&stored, data) => {
                    tracing::info!(location = %self.factor_store.location(), "Using previously saved factors");
                    return Ok((stored, FactorSource::Loaded));
                }
                Ok(Some(stored)) => {
                    tracing::warn!(
                        location = %self.factor_store.location(),
                        stored_users = stored.num_users(),
                        stored_items = stored.num_items(),
                        stored_factors = stored.latent_factors(),
                        "Saved factors do not match the shape of the current data; refitting"
                    );
                }
                Ok(None) => {}
                Err(e) if e.is_invalid_input() || matches!(e, RecError::Serialization(_)) => {
                    tracing::warn!(
                        location = %self.factor_store.location(),
                        error = %e,
                        "Saved factors could not be read; refitting"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok((self.fit(data)?, FactorSource::Fitted))
    }

    fn is_compatible(&self, factors: &Factors, data: &InteractionData) -> bool {
        factors.num_users() == data.matrix.num_users()
            && factors.num_items() == data.matrix.num_items()
            && factors.latent_factors() == self.config().latent_factors
            && factors.is_finite()
    }

    /// Load, fit or reuse factors, then rank items for `request.user_id`
    pub fn recommend(&self, request: RecommendRequest) -> Result<UserRecommendations> {
        let data = self.load_data()?;
        // Validate the request before any fitting work
        let user_index = data.user_index(request.user_id)?;
        if request.k == 0 {
            return Err(RecError::invalid_input("k must be at least 1"));
        }
        let (factors, source) = self.factors_for(&data, request.refit)?;

        let ranked = recommend_for_user(
            &factors,
            &data.matrix,
            user_index,
            request.k,
            request.include_seen,
        )?;

        let observed = data.matrix.row(user_index);
        let items = ranked
            .items
            .iter()
            .filter_map(|scored| {
                let item_id = data.items.id_of(scored.index)?;
                Some(RankedItem {
                    item_id,
                    index: scored.index,
                    score: scored.score,
                    title: self
                        .catalog
                        .as_ref()
                        .and_then(|catalog| catalog.title(item_id))
                        .map(str::to_string),
                    seen: observed[scored.index] != 0.0,
                })
            })
            .collect();

        Ok(UserRecommendations {
            user_id: request.user_id,
            requested: ranked.requested,
            truncated: ranked.truncated,
            backfilled: ranked.backfilled,
            source,
            items,
        })
    }
}
