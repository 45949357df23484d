use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::AppState,
    error::{AppError, AppResult},
    models::RecommendationState,
};

/// Last committed recommendations, without refreshing
pub async fn current(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<RecommendationState>> {
    let session = state.session(&username).await?;
    Ok(Json(session.snapshot()))
}

/// Refreshes every pool and the top picks
///
/// Pool failures do not fail the request; they are reported in the body's `error`.
pub async fn refresh(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<RecommendationState>> {
    let session = state.session(&username).await?;
    Ok(Json(session.load_all_recommendations().await))
}

pub async fn top_picks(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<RecommendationState>> {
    let session = state.session(&username).await?;
    Ok(Json(session.get_personalized_top_picks().await))
}

/// Refreshes one pool: `history`, `genres` or `actors`
pub async fn refresh_category(
    State(state): State<AppState>,
    Path((username, category)): Path<(String, String)>,
) -> AppResult<Json<RecommendationState>> {
    let session = state.session(&username).await?;
    let updated = match category.as_str() {
        "history" => session.get_recommendations_based_on_watch_history().await,
        "genres" => session.get_recommendations_based_on_genres().await,
        "actors" => session.get_recommendations_based_on_actors().await,
        other => {
            return Err(AppError::NotFound(format!(
                "Unknown recommendation category: {}",
                other
            )))
        }
    };
    Ok(Json(updated))
}
