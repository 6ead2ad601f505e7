//! Implicit-feedback recommender built on Weighted Alternating Least Squares
//!
//! Data flow: [`InteractionStore`] → [`PreferenceModel`] → [`MatrixFactorization`]
//! → [`FactorStore`] → [`Recommender`].

pub mod catalog;
pub mod factor_store;
pub mod interactions;
pub mod linalg;
pub mod matrix;
pub mod matrix_factorization;
pub mod pipeline;
pub mod preference;
pub mod recommendation;

// Re-export key types
pub use catalog::{CatalogLookup, ItemCatalog};
pub use factor_store::{FactorSnapshot, FactorStore, SnapshotFactorStore, TsvFactorStore};
pub use interactions::{
    IdMap, InMemoryInteractionStore, InteractionData, InteractionStore, RatingsFileStore,
};
pub use matrix::InteractionMatrix;
pub use matrix_factorization::{weighted_loss, ALSConfig, Factors, FitInfo, MatrixFactorization};
pub use pipeline::{
    FactorSource, RankedItem, RecommendRequest, RecommendationPipeline, UserRecommendations,
};
pub use preference::{PreferenceModel, Preferences, DEFAULT_ALPHA};
pub use recommendation::{
    recommend_for_user, Recommendations, Recommender, ScoredItem, MASKED_SCORE,
};

pub use implicit_rec_core::{RecError, Result};

#[cfg(test)]
mod tests;
