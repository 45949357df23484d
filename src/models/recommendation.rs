use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::movie::{MovieId, MovieSummary};

/// Why a candidate was suggested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendedBecause {
    /// Similar to a recently watched movie
    Movie {
        movie_id: MovieId,
        movie_title: String,
        poster_path: Option<String>,
    },
    /// Matches favorite genres (names joined with ", ")
    Genres { genres: String },
    /// Features the favorite actor
    Actor { actor: String },
}

/// A source-tagged recommendation; recomputed on every refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub movie_id: MovieId,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    pub popularity: f64,
    pub genre_ids: Vec<u64>,
    pub recommended_because: RecommendedBecause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl RecommendationCandidate {
    pub fn from_summary(movie: MovieSummary, because: RecommendedBecause) -> Self {
        Self {
            movie_id: movie.id,
            title: movie.title,
            poster_path: movie.poster_path,
            vote_average: movie.vote_average,
            popularity: movie.popularity,
            genre_ids: movie.genre_ids,
            recommended_because: because,
            similarity_score: None,
        }
    }
}

/// Recommendation slots observed by clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationState {
    pub history_based: Vec<RecommendationCandidate>,
    pub genre_based: Vec<RecommendationCandidate>,
    pub actor_based: Vec<RecommendationCandidate>,
    pub top_picks: Vec<RecommendationCandidate>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Newest refresh generation that has committed to this state
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
}
