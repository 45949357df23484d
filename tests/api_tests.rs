use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use marquee_api::{
    api::{create_router, AppState},
    db::MemoryStore,
    error::{AppError, AppResult},
    models::{
        CastMember, CrewMember, Genre, Keyword, MovieDetail, MovieId, MovieSummary, Page,
    },
    services::{catalog::DiscoverQuery, MovieCatalog},
};

/// Small fixed catalog: The Matrix, Heat, and a few recommendable titles
struct FakeCatalog;

fn genre(id: u64, name: &str) -> Genre {
    Genre {
        id,
        name: name.to_string(),
    }
}

fn detail(id: MovieId) -> Option<MovieDetail> {
    let (title, genres, cast, director) = match id {
        603 => (
            "The Matrix",
            vec![genre(28, "Action"), genre(878, "Science Fiction")],
            vec![(6384, "Keanu Reeves"), (2975, "Laurence Fishburne")],
            (9339, "Lana Wachowski"),
        ),
        949 => (
            "Heat",
            vec![genre(80, "Crime"), genre(28, "Action")],
            vec![(1158, "Al Pacino"), (380, "Robert De Niro")],
            (638, "Michael Mann"),
        ),
        10 | 11 | 12 => (
            "Recommended",
            vec![genre(28, "Action")],
            vec![(6384, "Keanu Reeves")],
            (1, "Someone"),
        ),
        _ => return None,
    };

    Some(MovieDetail {
        id,
        title: title.to_string(),
        overview: None,
        poster_path: Some(format!("/{}.jpg", id)),
        backdrop_path: None,
        release_date: Some("1999-03-31".to_string()),
        runtime: Some(120),
        vote_average: 8.0,
        vote_count: 20000,
        popularity: 50.0,
        genres,
        cast: cast
            .into_iter()
            .enumerate()
            .map(|(order, (id, name))| CastMember {
                id,
                name: name.to_string(),
                character: None,
                order: order as u32,
                profile_path: None,
            })
            .collect(),
        crew: vec![CrewMember {
            id: director.0,
            name: director.1.to_string(),
            job: "Director".to_string(),
            department: Some("Directing".to_string()),
            profile_path: None,
        }],
        videos: Vec::new(),
    })
}

fn summaries(ids: &[MovieId]) -> Page<MovieSummary> {
    Page::single(
        ids.iter()
            .filter_map(|&id| detail(id).map(|d| d.summary()))
            .collect(),
    )
}

#[async_trait]
impl MovieCatalog for FakeCatalog {
    async fn trending(&self, _page: u32) -> AppResult<Page<MovieSummary>> {
        Ok(summaries(&[603, 949]))
    }

    async fn search(&self, query: &str, _page: u32) -> AppResult<Page<MovieSummary>> {
        if query.eq_ignore_ascii_case("matrix") {
            Ok(summaries(&[603]))
        } else {
            Ok(Page::single(Vec::new()))
        }
    }

    async fn movie_detail(&self, movie_id: MovieId) -> AppResult<MovieDetail> {
        detail(movie_id).ok_or_else(|| AppError::NotFound(format!("movie {}", movie_id)))
    }

    async fn recommendations(&self, movie_id: MovieId) -> AppResult<Page<MovieSummary>> {
        match movie_id {
            603 => Ok(summaries(&[10, 11, 949])),
            _ => Ok(Page::single(Vec::new())),
        }
    }

    async fn discover(&self, query: &DiscoverQuery) -> AppResult<Page<MovieSummary>> {
        if query.with_cast.is_empty() {
            Ok(summaries(&[12]))
        } else {
            Ok(summaries(&[10, 12]))
        }
    }

    async fn genres(&self) -> AppResult<Vec<Genre>> {
        Ok(vec![genre(28, "Action"), genre(80, "Crime")])
    }

    async fn search_keywords(&self, _query: &str) -> AppResult<Vec<Keyword>> {
        Ok(Vec::new())
    }
}

fn create_test_server() -> TestServer {
    let state = AppState::new(Arc::new(FakeCatalog), Arc::new(MemoryStore::new()));
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_trending_and_page_validation() {
    let server = create_test_server();

    let response = server.get("/api/v1/movies/trending").await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["results"].as_array().unwrap().len(), 2);

    let response = server
        .get("/api/v1/movies/trending")
        .add_query_param("page", 501)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Page"));
}

#[tokio::test]
async fn test_search_requires_query() {
    let server = create_test_server();

    let response = server
        .get("/api/v1/movies/search")
        .add_query_param("q", "Matrix")
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["results"][0]["id"], 603);

    let response = server.get("/api/v1/movies/search").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_movie_detail_and_not_found() {
    let server = create_test_server();

    let response = server.get("/api/v1/movies/603").await;
    response.assert_status_ok();
    let movie: Value = response.json();
    assert_eq!(movie["title"], "The Matrix");
    assert_eq!(movie["cast"][0]["name"], "Keanu Reeves");

    let response = server.get("/api/v1/movies/4242").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_mood_is_rejected() {
    let server = create_test_server();

    let response = server.get("/api/v1/discover/mood/excited").await;
    response.assert_status_ok();

    let response = server.get("/api/v1/discover/mood/grumpy").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_username_is_rejected() {
    let server = create_test_server();

    let response = server.get("/api/v1/users/not%20valid/history").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let long = "x".repeat(65);
    let response = server.get(&format!("/api/v1/users/{}/history", long)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_watch_history_flow() {
    let server = create_test_server();

    server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 603 }))
        .await
        .assert_status_ok();
    let response = server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 949 }))
        .await;
    response.assert_status_ok();
    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["movie_id"], 949);

    // Re-adding moves to the front without duplicating
    let response = server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 603 }))
        .await;
    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["movie_id"], 603);

    // Other users are unaffected
    let response = server.get("/api/v1/users/bob/history").await;
    let history: Vec<Value> = response.json();
    assert!(history.is_empty());

    let response = server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 4242 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    server
        .delete("/api/v1/users/alice/history")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let history: Vec<Value> = server.get("/api/v1/users/alice/history").await.json();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_ratings_shape_preferences() {
    let server = create_test_server();

    server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 603 }))
        .await;
    server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 949 }))
        .await;

    // Heat was watched last, so its lead outranks Keanu Reeves
    let before: Value = server.get("/api/v1/users/alice/preferences").await.json();
    assert_eq!(before["genres"]["28"]["normalized_score"], 100);
    assert_eq!(before["actors"]["1158"]["normalized_score"], 100);
    assert_eq!(before["actors"]["6384"]["normalized_score"], 50);

    let response = server
        .post("/api/v1/users/alice/ratings")
        .json(&json!({ "movie_id": 603, "rating": 10, "scale": "points" }))
        .await;
    response.assert_status_ok();
    let ratings: Value = response.json();
    assert_eq!(ratings["603"]["rating"], 5.0);

    let after: Value = server.get("/api/v1/users/alice/preferences").await.json();
    assert_eq!(after["actors"]["6384"]["normalized_score"], 100);
    assert!(
        after["genres"]["878"]["normalized_score"].as_u64()
            > before["genres"]["878"]["normalized_score"].as_u64()
    );

    let response = server
        .post("/api/v1/users/alice/ratings")
        .json(&json!({ "movie_id": 603, "rating": 6 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_favorites_flow() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/users/alice/favorites")
        .json(&json!({ "movie_id": 949 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let favorites: Vec<Value> = response.json();
    assert_eq!(favorites[0]["title"], "Heat");

    server
        .post("/api/v1/users/alice/favorites")
        .json(&json!({ "movie_id": 949 }))
        .await
        .assert_status_ok();

    server
        .delete("/api/v1/users/alice/favorites/949")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete("/api/v1/users/alice/favorites/949")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let favorites: Vec<Value> = server.get("/api/v1/users/alice/favorites").await.json();
    assert!(favorites.is_empty());
}

#[tokio::test]
async fn test_recommendation_refresh_flow() {
    let server = create_test_server();

    let empty: Value = server
        .get("/api/v1/users/alice/recommendations")
        .await
        .json();
    assert!(empty["top_picks"].as_array().unwrap().is_empty());

    server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 603 }))
        .await;

    let response = server
        .post("/api/v1/users/alice/recommendations/refresh")
        .await;
    response.assert_status_ok();
    let state: Value = response.json();

    assert_eq!(state["is_loading"], false);
    assert!(state["error"].is_null());
    assert_eq!(state["history_based"].as_array().unwrap().len(), 3);
    assert_eq!(state["history_based"][0]["recommended_because"]["kind"], "movie");
    assert_eq!(state["genre_based"][0]["movie_id"], 12);
    assert_eq!(state["actor_based"][0]["recommended_because"]["actor"], "Keanu Reeves");

    let picks = state["top_picks"].as_array().unwrap();
    let ids: Vec<u64> = picks.iter().map(|p| p["movie_id"].as_u64().unwrap()).collect();
    assert_eq!(ids.len(), 4);
    assert!(!ids.contains(&603));
    assert!(picks.iter().all(|p| p["similarity_score"].is_number()));

    let snapshot: Value = server
        .get("/api/v1/users/alice/recommendations")
        .await
        .json();
    assert_eq!(snapshot, state);
}

#[tokio::test]
async fn test_single_category_refresh() {
    let server = create_test_server();
    server
        .post("/api/v1/users/alice/history")
        .json(&json!({ "movie_id": 603 }))
        .await;

    let state: Value = server
        .post("/api/v1/users/alice/recommendations/genres")
        .await
        .json();
    assert_eq!(state["genre_based"].as_array().unwrap().len(), 1);
    assert!(state["history_based"].as_array().unwrap().is_empty());

    let state: Value = server
        .post("/api/v1/users/alice/recommendations/top-picks")
        .await
        .json();
    assert_eq!(state["top_picks"][0]["movie_id"], 12);

    server
        .post("/api/v1/users/alice/recommendations/moods")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
