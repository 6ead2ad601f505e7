//! Top-K item ranking from latent factors
//!
//! Scores every item as `s = u · Vᵗ`. When seen items are excluded they are
//! given [`MASKED_SCORE`] rather than dropped, so a request for more items than
//! remain unseen is back-filled with seen items instead of failing.

use crate::matrix::InteractionMatrix;
use crate::matrix_factorization::Factors;
use implicit_rec_core::{RecError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::Serialize;
use std::cmp::Ordering;

/// Score given to seen items when they are excluded; below every finite score
pub const MASKED_SCORE: f64 = f64::NEG_INFINITY;

/// One ranked item
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredItem {
    /// 0-based row in the item factor matrix
    pub index: usize,
    pub score: f64,
}

impl ScoredItem {
    pub fn is_masked(&self) -> bool {
        self.score == MASKED_SCORE
    }
}

/// Ranked result of a top-K request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    /// Items in descending score order, ties by ascending index
    pub items: Vec<ScoredItem>,
    /// The K that was asked for
    pub requested: usize,
    /// K exceeded the catalog size; `items` holds the whole catalog
    pub truncated: bool,
    /// Number of masked (seen) items used to fill the quota
    pub backfilled: usize,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.index).collect()
    }
}

/// Descending score, then ascending index
fn rank_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

/// Ranks items for a user against a fixed item factor matrix
#[derive(Debug, Clone, Copy)]
pub struct Recommender<'a> {
    item_factors: &'a Array2<f64>,
}

impl<'a> Recommender<'a> {
    pub fn new(item_factors: &'a Array2<f64>) -> Self {
        Self { item_factors }
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.nrows()
    }

    /// Raw preference scores `u · Vᵗ` for every item
    pub fn score(&self, user_row: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let latent_factors = self.item_factors.ncols();
        if user_row.len() != latent_factors {
            return Err(RecError::invalid_input(format!(
                "user factor row has {} entries, item factors have {} columns",
                user_row.len(),
                latent_factors
            )));
        }
        if user_row.iter().any(|v| !v.is_finite()) {
            return Err(RecError::invalid_input("user factor row is not finite"));
        }
        if self.item_factors.iter().any(|v| !v.is_finite()) {
            return Err(RecError::invalid_input("item factors are not finite"));
        }

        Ok(self.item_factors.dot(&user_row))
    }

    /// Top-`k` items for one user
    ///
    /// `observed_row` holds the user's interactions (non-zero = seen). With
    /// `include_seen == false` seen items are masked; they only appear when
    /// fewer than `k` unseen items exist. `k` larger than the catalog returns
    /// every item and sets `truncated`.
    pub fn recommend(
        &self,
        user_row: ArrayView1<'_, f64>,
        observed_row: ArrayView1<'_, f64>,
        k: usize,
        include_seen: bool,
    ) -> Result<Recommendations> {
        if k == 0 {
            return Err(RecError::invalid_input("k must be at least 1"));
        }
        let num_items = self.num_items();
        if observed_row.len() != num_items {
            return Err(RecError::invalid_input(format!(
                "observed row has {} entries but there are {} items",
                observed_row.len(),
                num_items
            )));
        }

        let mut scores = self.score(user_row)?;

        if !include_seen {
            for (score, &observed) in scores.iter_mut().zip(observed_row.iter()) {
                if observed != 0.0 {
                    *score = MASKED_SCORE;
                }
            }
        }

        let mut candidates: Vec<ScoredItem> = scores
            .iter()
            .enumerate()
            .map(|(index, &score)| ScoredItem { index, score })
            .collect();

        let take = k.min(num_items);
        if take < candidates.len() {
            candidates.select_nth_unstable_by(take - 1, rank_order);
            candidates.truncate(take);
        }
        candidates.sort_by(rank_order);

        let truncated = k > num_items;
        let backfilled = candidates.iter().filter(|item| item.is_masked()).count();

        if truncated {
            tracing::warn!(
                requested = k,
                available = num_items,
                "Requested more recommendations than items in the catalog"
            );
        }
        if backfilled > 0 {
            tracing::warn!(
                requested = k,
                backfilled,
                "Too few unseen items; filled remaining slots with seen items"
            );
        }

        Ok(Recommendations {
            items: candidates,
            requested: k,
            truncated,
            backfilled,
        })
    }
}

/// Top-`k` items for the user at `user_index`, using their row of `interactions`
pub fn recommend_for_user(
    factors: &Factors,
    interactions: &InteractionMatrix,
    user_index: usize,
    k: usize,
    include_seen: bool,
) -> Result<Recommendations> {
    if interactions.num_users() != factors.num_users()
        || interactions.num_items() != factors.num_items()
    {
        return Err(RecError::invalid_input(format!(
            "factors cover {}x{} users/items but interactions are {}x{}",
            factors.num_users(),
            factors.num_items(),
            interactions.num_users(),
            interactions.num_items()
        )));
    }

    let user_row = factors.user_embedding(user_index).ok_or_else(|| {
        RecError::invalid_input(format!(
            "user index {} is out of range (0..{})",
            user_index,
            factors.num_users()
        ))
    })?;

    Recommender::new(&factors.item_factors).recommend(
        user_row,
        interactions.row(user_index),
        k,
        include_seen,
    )
}
