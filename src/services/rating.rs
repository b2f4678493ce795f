//! Elo-style rating updates derived from final game scores.
//!
//! A finished game is treated as a round-robin of pairwise duels: every
//! pair of players is compared once, in registration order, and each side
//! collects a rounded Elo delta against the other. Deltas are summed and
//! applied in one batch so that intermediate updates never feed back into
//! the expectation formula.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::info;

use crate::{
    dao::{RatingStore, StorageResult},
    gateway::UserId,
};

/// Rating assigned to players never seen before.
pub const DEFAULT_RATING: i32 = 1500;

/// K-factor of the pairwise update.
const K_FACTOR: f64 = 10.0;

/// Expected score of a player against one opponent.
fn expected(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Summed pairwise Elo deltas for one finished game.
///
/// `scores` must be in registration order; the pair enumeration and
/// therefore the result order follow it. Ratings are read once up front
/// through `rating_of`.
pub fn pairwise_deltas(
    scores: &IndexMap<UserId, i32>,
    rating_of: impl Fn(UserId) -> i32,
) -> IndexMap<UserId, i32> {
    let entries: Vec<(UserId, i32, i32)> = scores
        .iter()
        .map(|(&user, &score)| (user, score, rating_of(user)))
        .collect();

    let mut deltas: IndexMap<UserId, i32> =
        entries.iter().map(|&(user, _, _)| (user, 0)).collect();

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (user_i, score_i, rating_i) = entries[i];
            let (user_j, score_j, rating_j) = entries[j];
            let outcome_i = match score_i.cmp(&score_j) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Less => 0.0,
                std::cmp::Ordering::Equal => 0.5,
            };
            let delta_i = (K_FACTOR * (outcome_i - expected(rating_i, rating_j))).round() as i32;
            let delta_j =
                (K_FACTOR * ((1.0 - outcome_i) - expected(rating_j, rating_i))).round() as i32;
            deltas[&user_i] += delta_i;
            deltas[&user_j] += delta_j;
        }
    }
    deltas
}

/// Apply the rating update of one finished game and commit it.
///
/// Ratings never drop below 1. Display names are refreshed alongside so
/// the rating table always shows the latest known names.
pub fn update_ratings(
    store: &dyn RatingStore,
    scores: &IndexMap<UserId, i32>,
    names: &HashMap<UserId, String>,
) -> StorageResult<()> {
    let deltas = pairwise_deltas(scores, |user| store.rating(user));
    for (&user, &delta) in &deltas {
        let updated = (store.rating(user) + delta).max(1);
        store.set_rating(user, updated);
        if let Some(name) = names.get(&user) {
            store.set_name(user, name.clone());
        }
        info!(user, delta, rating = updated, "rating updated");
    }
    store.commit_ratings()
}

/// One decay step: pull a rating a tenth of the way back to the default.
///
/// Integer arithmetic, truncating toward zero, so repeated application
/// converges on [`DEFAULT_RATING`] from both sides.
pub fn decay(rating: i32) -> i32 {
    DEFAULT_RATING + (rating - DEFAULT_RATING) * 9 / 10
}

/// Decay every stored rating once and commit the result.
pub fn decay_all(store: &dyn RatingStore) -> StorageResult<()> {
    let records = store.all_ratings();
    let count = records.len();
    for (user, _, rating) in records {
        store.set_rating(user, decay(rating));
    }
    info!(players = count, "ratings decayed toward the default");
    store.commit_ratings()
}
