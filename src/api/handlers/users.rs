use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    api::AppState,
    error::{AppError, AppResult},
    models::{Favorite, MovieId, PreferenceProfile, Rating, RatingScale, WatchHistoryEntry},
};

#[derive(Debug, Deserialize)]
pub struct AddToHistoryRequest {
    pub movie_id: MovieId,
}

#[derive(Debug, Deserialize)]
pub struct RateMovieRequest {
    pub movie_id: MovieId,
    pub rating: f32,
    #[serde(default)]
    pub scale: RatingScale,
}

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub movie_id: MovieId,
}

pub async fn watch_history(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<WatchHistoryEntry>>> {
    let session = state.session(&username).await?;
    Ok(Json(session.watch_history().await))
}

/// Records a view and returns the updated history
pub async fn add_to_watch_history(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<AddToHistoryRequest>,
) -> AppResult<Json<Vec<WatchHistoryEntry>>> {
    let session = state.session(&username).await?;
    session.add_to_watch_history(request.movie_id, None).await?;
    Ok(Json(session.watch_history().await))
}

pub async fn clear_watch_history(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    let session = state.session(&username).await?;
    session.clear_watch_history().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ratings(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<HashMap<MovieId, Rating>>> {
    let session = state.session(&username).await?;
    Ok(Json(session.ratings().await))
}

pub async fn rate_movie(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<RateMovieRequest>,
) -> AppResult<Json<HashMap<MovieId, Rating>>> {
    let session = state.session(&username).await?;
    session
        .rate_movie(request.movie_id, request.rating, request.scale)
        .await?;
    Ok(Json(session.ratings().await))
}

pub async fn favorites(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<Favorite>>> {
    let session = state.session(&username).await?;
    Ok(Json(session.favorites().await))
}

/// 201 when newly added, 200 when it already was a favorite
pub async fn add_favorite(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<AddFavoriteRequest>,
) -> AppResult<(StatusCode, Json<Vec<Favorite>>)> {
    let session = state.session(&username).await?;
    let added = session.add_favorite(request.movie_id).await?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(session.favorites().await)))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Path((username, movie_id)): Path<(String, MovieId)>,
) -> AppResult<StatusCode> {
    let session = state.session(&username).await?;
    if session.remove_favorite(movie_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Movie {} is not a favorite",
            movie_id
        )))
    }
}

pub async fn preferences(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<PreferenceProfile>> {
    let session = state.session(&username).await?;
    Ok(Json(session.preferences().await))
}
