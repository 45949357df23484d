/// Movie catalog abstraction
///
/// The catalog is the read-only source of movie metadata: listings, full detail with
/// credits, per-movie recommendations and discovery queries. The recommendation
/// engine only talks to the `MovieCatalog` trait, so TMDB can be replaced by a test
/// double or another metadata provider.
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Genre, Keyword, MovieDetail, MovieId, MovieSummary, Page},
};

pub mod tmdb;

pub use tmdb::TmdbClient;

/// Filters for the catalog's discover endpoint
///
/// Id lists are OR-combined (`a|b|c`) when sent.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverQuery {
    pub with_genres: Vec<u64>,
    pub without_genres: Vec<u64>,
    pub with_cast: Vec<u64>,
    pub with_keywords: Vec<u64>,
    pub sort_by: String,
    pub min_vote_count: Option<u32>,
    pub page: u32,
}

impl Default for DiscoverQuery {
    fn default() -> Self {
        Self {
            with_genres: Vec::new(),
            without_genres: Vec::new(),
            with_cast: Vec::new(),
            with_keywords: Vec::new(),
            sort_by: "popularity.desc".to_string(),
            min_vote_count: None,
            page: 1,
        }
    }
}

impl DiscoverQuery {
    pub fn by_genres(genre_ids: Vec<u64>) -> Self {
        Self {
            with_genres: genre_ids,
            ..Self::default()
        }
    }

    pub fn by_cast(person_id: u64) -> Self {
        Self {
            with_cast: vec![person_id],
            ..Self::default()
        }
    }

    pub fn min_votes(mut self, count: u32) -> Self {
        self.min_vote_count = Some(count);
        self
    }

    /// Query-string parameters, omitting empty filters
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("sort_by", self.sort_by.clone()),
            ("page", self.page.to_string()),
        ];

        for (name, ids) in [
            ("with_genres", &self.with_genres),
            ("without_genres", &self.without_genres),
            ("with_cast", &self.with_cast),
            ("with_keywords", &self.with_keywords),
        ] {
            if !ids.is_empty() {
                params.push((name, join_ids(ids)));
            }
        }

        if let Some(count) = self.min_vote_count {
            params.push(("vote_count.gte", count.to_string()));
        }

        params
    }

    /// Stable string form used as a cache key
    pub fn signature(&self) -> String {
        self.to_params()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// Read-only movie metadata source
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Trending movies this week
    async fn trending(&self, page: u32) -> AppResult<Page<MovieSummary>>;

    /// Free-text title search, adult titles excluded
    async fn search(&self, query: &str, page: u32) -> AppResult<Page<MovieSummary>>;

    /// Full detail with genres, credits and videos
    async fn movie_detail(&self, movie_id: MovieId) -> AppResult<MovieDetail>;

    /// Movies the catalog recommends for a given movie
    async fn recommendations(&self, movie_id: MovieId) -> AppResult<Page<MovieSummary>>;

    async fn discover(&self, query: &DiscoverQuery) -> AppResult<Page<MovieSummary>>;

    async fn genres(&self) -> AppResult<Vec<Genre>>;

    /// Keyword id lookup
    async fn search_keywords(&self, query: &str) -> AppResult<Vec<Keyword>>;
}

/// Fetches full detail for several movies concurrently
///
/// Returns one slot per requested id, in request order. A failed fetch is logged
/// and leaves `None` in its slot; it never affects the other fetches.
pub async fn fetch_details_batch(
    catalog: &Arc<dyn MovieCatalog>,
    movie_ids: &[MovieId],
) -> Vec<Option<MovieDetail>> {
    let tasks: Vec<_> = movie_ids
        .iter()
        .map(|&movie_id| {
            let catalog = Arc::clone(catalog);
            tokio::spawn(async move { catalog.movie_detail(movie_id).await })
        })
        .collect();

    let mut details = Vec::with_capacity(tasks.len());
    let mut failures = 0;

    for (movie_id, task) in movie_ids.iter().zip(tasks) {
        match task.await {
            Ok(Ok(detail)) => details.push(Some(detail)),
            Ok(Err(e)) => {
                tracing::warn!(movie_id, error = %e, "Detail fetch failed");
                failures += 1;
                details.push(None);
            }
            Err(e) => {
                tracing::error!(movie_id, error = %e, "Task join error");
                failures += 1;
                details.push(None);
            }
        }
    }

    if failures > 0 {
        tracing::warn!(
            success_count = movie_ids.len() - failures,
            error_count = failures,
            "Partial detail fetch failure"
        );
    }

    details
}
