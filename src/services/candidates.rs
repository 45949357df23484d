use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        MovieId, MovieSummary, PreferenceMap, RecommendationCandidate, RecommendedBecause,
        WatchHistoryEntry,
    },
    services::catalog::{DiscoverQuery, MovieCatalog},
};

/// How many recent movies seed the history pool
pub const HISTORY_SEED_COUNT: usize = 3;
/// How many favorite genres feed the genre pool
pub const TOP_GENRE_COUNT: usize = 3;
/// Maximum size of each pool
pub const POOL_LIMIT: usize = 10;
/// Discover results need at least this many votes
const MIN_VOTE_COUNT: u32 = 100;

/// Builds the three independent candidate pools from the catalog
#[derive(Clone)]
pub struct CandidateFetcher {
    catalog: Arc<dyn MovieCatalog>,
}

impl CandidateFetcher {
    pub fn new(catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { catalog }
    }

    /// Movies similar to the most recently watched ones
    ///
    /// Queries the catalog once per seed, concurrently. A failed seed contributes
    /// nothing; the pool only fails when every seed failed. Results are sorted by
    /// popularity, then vote average.
    pub async fn history_pool(
        &self,
        history: &[WatchHistoryEntry],
    ) -> AppResult<Vec<RecommendationCandidate>> {
        let seeds: Vec<&WatchHistoryEntry> = history.iter().take(HISTORY_SEED_COUNT).collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let tasks: Vec<_> = seeds
            .iter()
            .map(|seed| {
                let catalog = Arc::clone(&self.catalog);
                let movie_id = seed.movie_id;
                tokio::spawn(async move { catalog.recommendations(movie_id).await })
            })
            .collect();

        let mut candidates = Vec::new();
        let mut errors = Vec::new();

        for (seed, task) in seeds.iter().zip(tasks) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(AppError::Internal(e.to_string())),
            };

            match result {
                Ok(page) => {
                    let because = RecommendedBecause::Movie {
                        movie_id: seed.movie_id,
                        movie_title: seed.title.clone(),
                        poster_path: seed.poster_path.clone(),
                    };
                    candidates.extend(page.results.into_iter().map(|movie| {
                        RecommendationCandidate::from_summary(movie, because.clone())
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        seed_movie_id = seed.movie_id,
                        error = %e,
                        "Similar-movie query failed"
                    );
                    errors.push(e);
                }
            }
        }

        if candidates.is_empty() && errors.len() == seeds.len() {
            return Err(AppError::ExternalApi(format!(
                "All {} similar-movie queries failed",
                errors.len()
            )));
        }

        candidates.sort_by(|a, b| {
            b.popularity
                .total_cmp(&a.popularity)
                .then_with(|| b.vote_average.total_cmp(&a.vote_average))
        });

        let pool = finalize_pool(candidates, &watched_ids(history));
        tracing::info!(pool = "history", count = pool.len(), "Candidate pool fetched");
        Ok(pool)
    }

    /// Popular movies in any of the top favorite genres
    pub async fn genre_pool(
        &self,
        genres: &PreferenceMap,
        history: &[WatchHistoryEntry],
    ) -> AppResult<Vec<RecommendationCandidate>> {
        let top = genres.top(TOP_GENRE_COUNT);
        if top.is_empty() {
            return Ok(Vec::new());
        }

        let query = DiscoverQuery::by_genres(top.iter().map(|g| g.id).collect())
            .min_votes(MIN_VOTE_COUNT);
        let because = RecommendedBecause::Genres {
            genres: top
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        };

        let page = self.catalog.discover(&query).await?;
        let pool = tag_and_finalize(page.results, because, history);
        tracing::info!(pool = "genres", count = pool.len(), "Candidate pool fetched");
        Ok(pool)
    }

    /// Popular movies featuring the favorite actor
    pub async fn actor_pool(
        &self,
        actors: &PreferenceMap,
        history: &[WatchHistoryEntry],
    ) -> AppResult<Vec<RecommendationCandidate>> {
        let Some(actor) = actors.top(1).into_iter().next() else {
            return Ok(Vec::new());
        };

        let query = DiscoverQuery::by_cast(actor.id);
        let because = RecommendedBecause::Actor {
            actor: actor.name.clone(),
        };

        let page = self.catalog.discover(&query).await?;
        let pool = tag_and_finalize(page.results, because, history);
        tracing::info!(
            pool = "actors",
            actor_id = actor.id,
            count = pool.len(),
            "Candidate pool fetched"
        );
        Ok(pool)
    }
}

fn watched_ids(history: &[WatchHistoryEntry]) -> HashSet<MovieId> {
    history.iter().map(|e| e.movie_id).collect()
}

fn tag_and_finalize(
    movies: Vec<MovieSummary>,
    because: RecommendedBecause,
    history: &[WatchHistoryEntry],
) -> Vec<RecommendationCandidate> {
    let candidates = movies
        .into_iter()
        .map(|movie| RecommendationCandidate::from_summary(movie, because.clone()))
        .collect();
    finalize_pool(candidates, &watched_ids(history))
}

/// Drops watched movies and duplicates (first wins), then caps the pool
fn finalize_pool(
    candidates: Vec<RecommendationCandidate>,
    watched: &HashSet<MovieId>,
) -> Vec<RecommendationCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !watched.contains(&c.movie_id) && seen.insert(c.movie_id))
        .take(POOL_LIMIT)
        .collect()
}
