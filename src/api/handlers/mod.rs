use axum::{http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

pub mod movies;
pub mod recommendations;
pub mod users;

/// `?page=`; defaults to the first page
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
