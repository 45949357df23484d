use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{self, movies, recommendations, users};
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog browsing
        .route("/movies/trending", get(movies::trending))
        .route("/movies/search", get(movies::search))
        .route("/movies/:id", get(movies::movie_detail))
        .route("/genres", get(movies::genres))
        .route("/discover/mood/:mood", get(movies::discover_by_mood))
        // User signals
        .route(
            "/users/:username/history",
            get(users::watch_history)
                .post(users::add_to_watch_history)
                .delete(users::clear_watch_history),
        )
        .route(
            "/users/:username/ratings",
            get(users::ratings).post(users::rate_movie),
        )
        .route(
            "/users/:username/favorites",
            get(users::favorites).post(users::add_favorite),
        )
        .route(
            "/users/:username/favorites/:id",
            delete(users::remove_favorite),
        )
        .route("/users/:username/preferences", get(users::preferences))
        // Recommendations
        .route(
            "/users/:username/recommendations",
            get(recommendations::current),
        )
        .route(
            "/users/:username/recommendations/refresh",
            post(recommendations::refresh),
        )
        .route(
            "/users/:username/recommendations/top-picks",
            post(recommendations::top_picks),
        )
        .route(
            "/users/:username/recommendations/:category",
            post(recommendations::refresh_category),
        )
}
