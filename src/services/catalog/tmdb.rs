/// TMDB (The Movie Database) catalog client
///
/// API Flow:
/// 1. Listings: /trending/movie/week, /search/movie, /discover/movie,
///    /movie/{id}/recommendations → paginated `MovieSummary` results
/// 2. Detail: /movie/{id}?append_to_response=videos,credits → `MovieDetail`
/// 3. Lookups: /genre/movie/list, /search/keyword
///
/// Every call is cached in the key-value store. The detail call additionally runs
/// with an explicit timeout and translates failures into typed errors.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        ApiGenreList, ApiMovieDetail, Genre, Keyword, MovieDetail, MovieId, MovieSummary, Page,
    },
    services::catalog::{DiscoverQuery, MovieCatalog},
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const LISTING_CACHE_TTL: u64 = 3600; // 1 hour
const DETAIL_CACHE_TTL: u64 = 86400; // 1 day
const LOOKUP_CACHE_TTL: u64 = 604800; // 1 week

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_url: String,
    cache: Cache,
    detail_timeout: Duration,
}

impl TmdbClient {
    pub fn new(
        cache: Cache,
        api_key: String,
        api_url: String,
        image_url: String,
        detail_timeout: Duration,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_url: image_url.trim_end_matches('/').to_string(),
            cache,
            detail_timeout,
        }
    }

    /// Absolute image URL for a poster/backdrop/profile path, e.g. size `w500`
    pub fn image_url(&self, size: &str, path: &str) -> String {
        format!("{}/{}{}", self.image_url, size, path)
    }

    /// GET a JSON endpoint; non-success statuses become `ExternalApi` errors
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn fetch_detail(&self, movie_id: MovieId) -> AppResult<MovieDetail> {
        let url = format!("{}/movie/{}", self.api_url, movie_id);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "videos,credits"),
            ])
            .timeout(self.detail_timeout)
            .send()
            .await
            .map_err(|e| translate_transport_error(movie_id, e))?;

        if !response.status().is_success() {
            return Err(translate_status(movie_id, response.status()));
        }

        let api_detail: ApiMovieDetail = response
            .json()
            .await
            .map_err(|e| translate_transport_error(movie_id, e))?;
        let detail = MovieDetail::from(api_detail);

        tracing::info!(
            movie_id,
            genres = detail.genres.len(),
            cast = detail.cast.len(),
            provider = "tmdb",
            "Movie detail fetched"
        );

        Ok(detail)
    }
}

/// Maps a failed detail status to a typed error
fn translate_status(movie_id: MovieId, status: StatusCode) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => {
            AppError::Unauthorized("Invalid TMDB API key. Check TMDB_API_KEY.".to_string())
        }
        StatusCode::NOT_FOUND => AppError::NotFound(format!("Movie {} was not found", movie_id)),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(
            "Too many requests to TMDB. Try again in a moment.".to_string(),
        ),
        other => AppError::ExternalApi(format!(
            "TMDB API returned status {} for movie {}",
            other, movie_id
        )),
    }
}

/// Maps a detail transport failure: timeout, no response, or a bad body
fn translate_transport_error(movie_id: MovieId, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("Loading movie {} took too long", movie_id))
    } else if err.is_connect() || err.is_request() {
        AppError::NoResponse(format!(
            "Could not reach TMDB for movie {}: {}",
            movie_id, err
        ))
    } else {
        AppError::HttpClient(err)
    }
}

#[async_trait::async_trait]
impl MovieCatalog for TmdbClient {
    async fn trending(&self, page: u32) -> AppResult<Page<MovieSummary>> {
        cached!(
            self.cache,
            CacheKey::Trending(page),
            LISTING_CACHE_TTL,
            async move {
                self.get_json("/trending/movie/week", &[("page", page.to_string())])
                    .await
            }
        )
    }

    async fn search(&self, query: &str, page: u32) -> AppResult<Page<MovieSummary>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache,
            CacheKey::Search {
                query: query.to_string(),
                page,
            },
            LISTING_CACHE_TTL,
            async move {
                let results: Page<MovieSummary> = self
                    .get_json(
                        "/search/movie",
                        &[
                            ("query", query.trim().to_string()),
                            ("page", page.to_string()),
                            ("include_adult", "false".to_string()),
                        ],
                    )
                    .await?;

                tracing::info!(
                    query = %query,
                    results = results.results.len(),
                    provider = "tmdb",
                    "Movie search completed"
                );

                Ok::<_, AppError>(results)
            }
        )
    }

    async fn movie_detail(&self, movie_id: MovieId) -> AppResult<MovieDetail> {
        if movie_id == 0 {
            return Err(AppError::InvalidInput("Movie id is required".to_string()));
        }

        cached!(
            self.cache,
            CacheKey::MovieDetail(movie_id),
            DETAIL_CACHE_TTL,
            self.fetch_detail(movie_id)
        )
    }

    async fn recommendations(&self, movie_id: MovieId) -> AppResult<Page<MovieSummary>> {
        cached!(
            self.cache,
            CacheKey::Recommendations(movie_id),
            LISTING_CACHE_TTL,
            async move {
                self.get_json(&format!("/movie/{}/recommendations", movie_id), &[])
                    .await
            }
        )
    }

    async fn discover(&self, query: &DiscoverQuery) -> AppResult<Page<MovieSummary>> {
        cached!(
            self.cache,
            CacheKey::Discover(query.signature()),
            LISTING_CACHE_TTL,
            async move { self.get_json("/discover/movie", &query.to_params()).await }
        )
    }

    async fn genres(&self) -> AppResult<Vec<Genre>> {
        cached!(self.cache, CacheKey::GenreList, LOOKUP_CACHE_TTL, async move {
            let list: ApiGenreList = self.get_json("/genre/movie/list", &[]).await?;
            Ok::<_, AppError>(list.genres)
        })
    }

    async fn search_keywords(&self, query: &str) -> AppResult<Vec<Keyword>> {
        cached!(
            self.cache,
            CacheKey::Keyword(query.to_string()),
            LOOKUP_CACHE_TTL,
            async move {
                let page: Page<Keyword> = self
                    .get_json("/search/keyword", &[("query", query.to_string())])
                    .await?;
                Ok::<_, AppError>(page.results)
            }
        )
    }
}
