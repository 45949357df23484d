use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::AppState,
    error::AppResult,
    models::{Genre, MovieDetail, MovieId, MovieSummary, Page},
    services::discovery::Mood,
};

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "super::first_page")]
    pub page: u32,
}

pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    let page = state.discovery.trending(query.page).await?;
    Ok(Json(page))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    let page = state.discovery.search_movies(&query.q, query.page).await?;
    Ok(Json(page))
}

pub async fn movie_detail(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<MovieDetail>> {
    let detail = state.catalog.movie_detail(movie_id).await?;
    Ok(Json(detail))
}

pub async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.catalog.genres().await?))
}

pub async fn discover_by_mood(
    State(state): State<AppState>,
    Path(mood): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    let mood: Mood = mood.parse()?;
    let page = state.discovery.discover_by_mood(mood, query.page).await?;
    Ok(Json(page))
}
