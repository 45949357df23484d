use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    db::KeyValueStore,
    error::AppResult,
    models::{Favorite, MovieId, PreferenceProfile, Rating, WatchHistoryEntry},
    services::signals,
};

/// Watch history never holds more than this many movies
pub const WATCH_HISTORY_LIMIT: usize = 50;

/// A user's raw signals plus the profile derived from them
///
/// Commands mutate one input at a time; callers run `recompute` afterwards so the
/// profile never drifts from its inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceState {
    /// Most recent first
    pub history: Vec<WatchHistoryEntry>,
    pub ratings: HashMap<MovieId, Rating>,
    pub favorites: Vec<Favorite>,
    pub profile: PreferenceProfile,
}

impl PreferenceState {
    /// Moves an existing entry to the front and restamps it; false if not present
    pub fn touch(&mut self, movie_id: MovieId, now: DateTime<Utc>) -> bool {
        match self.history.iter().position(|e| e.movie_id == movie_id) {
            Some(index) => {
                let mut entry = self.history.remove(index);
                entry.last_watched_at = now;
                self.history.insert(0, entry);
                true
            }
            None => false,
        }
    }

    /// Puts an entry at the front, replacing any older entry for the same movie
    pub fn record_view(&mut self, entry: WatchHistoryEntry) {
        self.history.retain(|e| e.movie_id != entry.movie_id);
        self.history.insert(0, entry);
        self.history.truncate(WATCH_HISTORY_LIMIT);
    }

    /// Last write wins
    pub fn rate(&mut self, movie_id: MovieId, stars: f32, now: DateTime<Utc>) {
        self.ratings.insert(
            movie_id,
            Rating {
                rating: stars,
                timestamp: now,
            },
        );
    }

    /// Returns false if the movie was already a favorite
    pub fn add_favorite(&mut self, favorite: Favorite) -> bool {
        if self.is_favorite(favorite.movie_id) {
            return false;
        }
        self.favorites.push(favorite);
        true
    }

    pub fn remove_favorite(&mut self, movie_id: MovieId) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|f| f.movie_id != movie_id);
        self.favorites.len() != before
    }

    pub fn is_favorite(&self, movie_id: MovieId) -> bool {
        self.favorites.iter().any(|f| f.movie_id == movie_id)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn watched_ids(&self) -> HashSet<MovieId> {
        self.history.iter().map(|e| e.movie_id).collect()
    }

    pub fn favorite_ids(&self) -> HashSet<MovieId> {
        self.favorites.iter().map(|f| f.movie_id).collect()
    }

    /// Replaces the profile with a full pass over the current inputs
    pub fn recompute(&mut self) {
        self.profile = signals::compute_profile(&self.history, &self.ratings, &self.favorite_ids());
    }
}

/// Persisted keys, namespaced per user as `{username}_{suffix}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreferenceKey {
    WatchHistory,
    UserRatings,
    Favorites,
    FavoriteGenres,
    FavoriteActors,
    FavoriteDirectors,
}

impl PreferenceKey {
    fn suffix(self) -> &'static str {
        match self {
            PreferenceKey::WatchHistory => "watchHistory",
            PreferenceKey::UserRatings => "userRatings",
            PreferenceKey::Favorites => "favorites",
            PreferenceKey::FavoriteGenres => "favoriteGenres",
            PreferenceKey::FavoriteActors => "favoriteActors",
            PreferenceKey::FavoriteDirectors => "favoriteDirectors",
        }
    }
}

/// Loads and saves one user's `PreferenceState`
#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    username: String,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>, username: impl Into<String>) -> Self {
        Self {
            store,
            username: username.into(),
        }
    }

    fn key(&self, kind: PreferenceKey) -> String {
        format!("{}_{}", self.username, kind.suffix())
    }

    /// Reads a value, treating unreadable data as absent
    async fn load_or_default<T: DeserializeOwned + Default>(&self, kind: PreferenceKey) -> T {
        let key = self.key(kind);
        match self.store.get_json::<T>(&key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable preference data");
                T::default()
            }
        }
    }

    /// Loads the persisted inputs and derives a fresh profile from them
    pub async fn load(&self) -> PreferenceState {
        let mut history: Vec<WatchHistoryEntry> =
            self.load_or_default(PreferenceKey::WatchHistory).await;
        history.truncate(WATCH_HISTORY_LIMIT);

        let mut state = PreferenceState {
            history,
            ratings: self.load_or_default(PreferenceKey::UserRatings).await,
            favorites: self.load_or_default(PreferenceKey::Favorites).await,
            profile: PreferenceProfile::default(),
        };
        state.recompute();

        tracing::info!(
            username = %self.username,
            history = state.history.len(),
            ratings = state.ratings.len(),
            favorites = state.favorites.len(),
            "Preferences loaded"
        );

        state
    }

    /// Writes inputs and derived maps under the user's keys
    pub async fn save(&self, state: &PreferenceState) -> AppResult<()> {
        let store = self.store.as_ref();
        store
            .set_json(&self.key(PreferenceKey::WatchHistory), &state.history)
            .await?;
        store
            .set_json(&self.key(PreferenceKey::UserRatings), &state.ratings)
            .await?;
        store
            .set_json(&self.key(PreferenceKey::Favorites), &state.favorites)
            .await?;
        store
            .set_json(&self.key(PreferenceKey::FavoriteGenres), &state.profile.genres)
            .await?;
        store
            .set_json(&self.key(PreferenceKey::FavoriteActors), &state.profile.actors)
            .await?;
        store
            .set_json(
                &self.key(PreferenceKey::FavoriteDirectors),
                &state.profile.directors,
            )
            .await?;
        Ok(())
    }
}
