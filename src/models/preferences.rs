use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::movie::{CastMember, CrewMember, Genre, MovieDetail, MovieId, MovieSummary};
use crate::error::{AppError, AppResult};

/// One viewed movie, with the credits needed for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryEntry {
    pub movie_id: MovieId,
    pub title: String,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
    #[serde(default)]
    pub poster_path: Option<String>,
    pub last_watched_at: DateTime<Utc>,
}

impl WatchHistoryEntry {
    pub fn from_detail(detail: &MovieDetail, watched_at: DateTime<Utc>) -> Self {
        Self {
            movie_id: detail.id,
            title: detail.title.clone(),
            genres: detail.genres.clone(),
            cast: detail.cast.clone(),
            crew: detail.crew.clone(),
            poster_path: detail.poster_path.clone(),
            last_watched_at: watched_at,
        }
    }

    pub fn directors(&self) -> impl Iterator<Item = &CrewMember> {
        self.crew.iter().filter(|member| member.is_director())
    }
}

/// An explicit rating on the canonical 0.5–5 star scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rating: f32,
    pub timestamp: DateTime<Utc>,
}

/// Scale a rating was given on; everything is stored as stars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingScale {
    /// 0.5 to 5 stars
    #[default]
    Stars,
    /// 1 to 10 points, as the catalog's vote averages
    Points,
}

impl RatingScale {
    pub const MIN_STARS: f32 = 0.5;
    pub const MAX_STARS: f32 = 5.0;

    /// Validates `value` against this scale and converts it to stars
    pub fn to_stars(self, value: f32) -> AppResult<f32> {
        let (min, max) = match self {
            RatingScale::Stars => (Self::MIN_STARS, Self::MAX_STARS),
            RatingScale::Points => (1.0, 10.0),
        };

        if !value.is_finite() || value < min || value > max {
            return Err(AppError::InvalidInput(format!(
                "Rating {} is outside the {:?} range {}-{}",
                value, self, min, max
            )));
        }

        Ok(match self {
            RatingScale::Stars => value,
            RatingScale::Points => value / 2.0,
        })
    }
}

/// A favorited movie; membership is what scoring reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub movie_id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Favorite {
    pub fn from_summary(movie: &MovieSummary, added_at: DateTime<Utc>) -> Self {
        Self {
            movie_id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            vote_average: movie.vote_average,
            release_date: movie.release_date.clone(),
            added_at,
        }
    }
}

/// Derived preference for one genre, actor or director
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceScore {
    pub id: u64,
    pub name: String,
    pub raw_score: f64,
    pub occurrence_count: u32,
    /// `round(100 * raw_score / max raw_score in the set)`
    pub normalized_score: u8,
}

/// Preference scores for one category, keyed by entity id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceMap(HashMap<u64, PreferenceScore>);

impl PreferenceMap {
    pub fn get(&self, id: u64) -> Option<&PreferenceScore> {
        self.0.get(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreferenceScore> {
        self.0.values()
    }

    /// Weight in 0.0..=1.0 for an entity, 0.0 when it has no score
    pub fn weight(&self, id: u64) -> f64 {
        self.get(id)
            .map(|score| f64::from(score.normalized_score) / 100.0)
            .unwrap_or(0.0)
    }

    /// The `n` best entries, highest normalized score first
    ///
    /// Ties fall back to raw score, then id, so the order is deterministic.
    pub fn top(&self, n: usize) -> Vec<&PreferenceScore> {
        let mut scores: Vec<&PreferenceScore> = self.0.values().collect();
        scores.sort_by(|a, b| {
            b.normalized_score
                .cmp(&a.normalized_score)
                .then_with(|| b.raw_score.total_cmp(&a.raw_score))
                .then_with(|| a.id.cmp(&b.id))
        });
        scores.truncate(n);
        scores
    }
}

impl FromIterator<PreferenceScore> for PreferenceMap {
    fn from_iter<I: IntoIterator<Item = PreferenceScore>>(iter: I) -> Self {
        Self(iter.into_iter().map(|score| (score.id, score)).collect())
    }
}

/// All three preference categories derived from one snapshot of user signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub genres: PreferenceMap,
    pub actors: PreferenceMap,
    pub directors: PreferenceMap,
}
