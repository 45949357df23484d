use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    models::{MovieDetail, MovieId, PreferenceProfile, RecommendationCandidate},
    services::catalog::{fetch_details_batch, MovieCatalog},
    services::signals::MAX_BILLED_ACTORS,
};

/// Merged candidates that get a detail fetch and a score
pub const RANKING_CANDIDATE_LIMIT: usize = 20;
/// Size of the final top-picks list
pub const TOP_PICKS_LIMIT: usize = 10;

const GENRE_WEIGHT: f64 = 2.0;
const ACTOR_WEIGHT: f64 = 1.5;
const DIRECTOR_WEIGHT: f64 = 2.5;

/// Concatenates pools in order, keeping the first occurrence of each movie
///
/// Watched movies are dropped and the result is truncated to
/// `RANKING_CANDIDATE_LIMIT`; no reordering happens here.
pub fn merge_candidates(
    pools: &[&[RecommendationCandidate]],
    watched: &HashSet<MovieId>,
) -> Vec<RecommendationCandidate> {
    let mut seen = HashSet::new();
    pools
        .iter()
        .flat_map(|pool| pool.iter())
        .filter(|c| !watched.contains(&c.movie_id) && seen.insert(c.movie_id))
        .take(RANKING_CANDIDATE_LIMIT)
        .cloned()
        .collect()
}

/// Weighted similarity of a movie to the user's preference maps
///
/// With full detail: genres, top-billed cast and directors all count. Without it,
/// only the candidate's genre ids are available, so only the genre term applies.
pub fn similarity_score(
    candidate: &RecommendationCandidate,
    detail: Option<&MovieDetail>,
    profile: &PreferenceProfile,
) -> f64 {
    let Some(detail) = detail else {
        return candidate
            .genre_ids
            .iter()
            .map(|&id| profile.genres.weight(id) * GENRE_WEIGHT)
            .sum();
    };

    let genre_term: f64 = detail
        .genres
        .iter()
        .map(|g| profile.genres.weight(g.id) * GENRE_WEIGHT)
        .sum();

    let actor_term: f64 = detail
        .top_billed(MAX_BILLED_ACTORS)
        .iter()
        .enumerate()
        .map(|(billing_index, actor)| {
            let billing_weight =
                (MAX_BILLED_ACTORS - billing_index) as f64 / MAX_BILLED_ACTORS as f64;
            profile.actors.weight(actor.id) * ACTOR_WEIGHT * billing_weight
        })
        .sum();

    let director_term: f64 = detail
        .directors()
        .map(|d| profile.directors.weight(d.id) * DIRECTOR_WEIGHT)
        .sum();

    genre_term + actor_term + director_term
}

/// Scores candidates and keeps the best `TOP_PICKS_LIMIT`
///
/// `details[i]` belongs to `candidates[i]`. The sort is stable, so equal scores
/// keep their merge order.
pub fn rank_candidates(
    candidates: Vec<RecommendationCandidate>,
    details: Vec<Option<MovieDetail>>,
    profile: &PreferenceProfile,
) -> Vec<RecommendationCandidate> {
    let mut scored: Vec<RecommendationCandidate> = candidates
        .into_iter()
        .zip(details.into_iter().chain(std::iter::repeat(None)))
        .map(|(mut candidate, detail)| {
            let score = similarity_score(&candidate, detail.as_ref(), profile);
            if let Some(detail) = detail {
                candidate.genre_ids = detail.genres.iter().map(|g| g.id).collect();
            }
            candidate.similarity_score = Some(score);
            candidate
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity_score
            .unwrap_or(0.0)
            .total_cmp(&a.similarity_score.unwrap_or(0.0))
    });
    scored.truncate(TOP_PICKS_LIMIT);
    scored
}

/// Merge, fetch details for, score and rank the given pools
pub async fn top_picks(
    catalog: &Arc<dyn MovieCatalog>,
    pools: [&[RecommendationCandidate]; 3],
    watched: &HashSet<MovieId>,
    profile: &PreferenceProfile,
) -> Vec<RecommendationCandidate> {
    let merged = merge_candidates(&pools, watched);
    if merged.is_empty() {
        return Vec::new();
    }

    let ids: Vec<MovieId> = merged.iter().map(|c| c.movie_id).collect();
    let details = fetch_details_batch(catalog, &ids).await;
    let picks = rank_candidates(merged, details, profile);

    tracing::info!(
        candidates = ids.len(),
        picks = picks.len(),
        "Top picks ranked"
    );

    picks
}
