use std::collections::{HashMap, HashSet};

use crate::models::{
    MovieId, PreferenceMap, PreferenceProfile, PreferenceScore, Rating, WatchHistoryEntry,
};

/// Only the top-billed cast members count towards actor preferences
pub const MAX_BILLED_ACTORS: usize = 5;
/// Flat boost for every entity of a favorited movie
pub const FAVORITE_BOOST: f64 = 5.0;

const GENRE_BASE_WEIGHT: f64 = 1.0;
const DIRECTOR_WEIGHT: f64 = 3.0;
/// Ratings above this many stars boost the movie's entities
const RATING_PIVOT: f64 = 3.0;
const RATING_BOOST_FACTOR: f64 = 2.0;

/// Accumulates raw scores for one category, then normalizes them
#[derive(Default)]
struct ScoreAccumulator {
    scores: HashMap<u64, PreferenceScore>,
}

impl ScoreAccumulator {
    fn add(&mut self, id: u64, name: &str, amount: f64) {
        let entry = self.scores.entry(id).or_insert_with(|| PreferenceScore {
            id,
            name: name.to_string(),
            raw_score: 0.0,
            occurrence_count: 0,
            normalized_score: 0,
        });
        entry.raw_score += amount;
        entry.occurrence_count += 1;
    }

    /// Scales every score against the category maximum (which becomes 100)
    fn finish(self) -> PreferenceMap {
        let max_raw = self
            .scores
            .values()
            .map(|score| score.raw_score)
            .fold(0.0_f64, f64::max);

        self.scores
            .into_values()
            .map(|mut score| {
                score.normalized_score = if max_raw > 0.0 {
                    (100.0 * score.raw_score / max_raw).round().clamp(0.0, 100.0) as u8
                } else {
                    0
                };
                score
            })
            .collect()
    }
}

/// Boost shared by every entity derived from one movie
fn movie_boost(rating: Option<&Rating>, is_favorite: bool) -> f64 {
    let rating_boost = match rating.map(|r| f64::from(r.rating)) {
        Some(stars) if stars > RATING_PIVOT => (stars - RATING_PIVOT) * RATING_BOOST_FACTOR,
        _ => 0.0,
    };
    let favorite_boost = if is_favorite { FAVORITE_BOOST } else { 0.0 };
    rating_boost + favorite_boost
}

/// Derives genre, actor and director preferences from the user's signals
///
/// `history` is ordered most recent first; position `i` carries a recency weight of
/// `1 / (i + 1)`. Per occurrence:
/// - genre: `recency`
/// - actor (top 5 billed): `(5 - billing_index) * recency`, so the lead weighs 5
///   and the fifth-billed weighs 1 (not `6 - billing_index`)
/// - director: flat `3`
///
/// Every entity of a movie also gets `(stars - 3) * 2` when the movie is rated above
/// three stars, and `+5` when it is a favorite. The result is a full recomputation:
/// it depends on nothing but the three inputs.
pub fn compute_profile(
    history: &[WatchHistoryEntry],
    ratings: &HashMap<MovieId, Rating>,
    favorites: &HashSet<MovieId>,
) -> PreferenceProfile {
    let mut genres = ScoreAccumulator::default();
    let mut actors = ScoreAccumulator::default();
    let mut directors = ScoreAccumulator::default();

    for (position, entry) in history.iter().enumerate() {
        let recency = 1.0 / (position as f64 + 1.0);
        let boost = movie_boost(
            ratings.get(&entry.movie_id),
            favorites.contains(&entry.movie_id),
        );

        for genre in &entry.genres {
            genres.add(genre.id, &genre.name, GENRE_BASE_WEIGHT * recency + boost);
        }

        for (billing_index, actor) in entry.cast.iter().take(MAX_BILLED_ACTORS).enumerate() {
            let billing_weight = (MAX_BILLED_ACTORS - billing_index) as f64;
            actors.add(actor.id, &actor.name, billing_weight * recency + boost);
        }

        for director in entry.directors() {
            directors.add(director.id, &director.name, DIRECTOR_WEIGHT + boost);
        }
    }

    PreferenceProfile {
        genres: genres.finish(),
        actors: actors.finish(),
        directors: directors.finish(),
    }
}
