use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::{
    error::{AppError, AppResult},
    models::{
        Favorite, MovieDetail, MovieId, PreferenceProfile, Rating, RatingScale,
        RecommendationCandidate, RecommendationState, WatchHistoryEntry,
    },
    services::{
        candidates::CandidateFetcher,
        catalog::MovieCatalog,
        preference_store::{PreferenceState, PreferenceStore},
        ranking,
    },
};

/// A list in `RecommendationState` that refreshes write to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    WatchHistory,
    Genres,
    Actors,
    TopPicks,
}

impl Slot {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Slot::WatchHistory => 0,
            Slot::Genres => 1,
            Slot::Actors => 2,
            Slot::TopPicks => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::WatchHistory => "watch history",
            Slot::Genres => "genre",
            Slot::Actors => "actor",
            Slot::TopPicks => "top picks",
        }
    }

    fn of(self, state: &mut RecommendationState) -> &mut Vec<RecommendationCandidate> {
        match self {
            Slot::WatchHistory => &mut state.history_based,
            Slot::Genres => &mut state.genre_based,
            Slot::Actors => &mut state.actor_based,
            Slot::TopPicks => &mut state.top_picks,
        }
    }
}

/// Recommendation engine for one user
///
/// Owns the user's preference state and the recommendation slots. Input commands
/// (`add_to_watch_history`, `rate_movie`, favorites) run against a copy of the
/// state, which becomes current only once it is persisted. Refresh operations
/// never return errors: failures are logged and land in `RecommendationState.error`.
///
/// Every refresh draws a ticket and claims the slots it will write. When it
/// finishes it commits only the slots no later refresh has claimed, so a
/// single-pool refresh overlapping a full reload costs the reload that one slot.
pub struct RecommendationService {
    username: String,
    catalog: Arc<dyn MovieCatalog>,
    fetcher: CandidateFetcher,
    store: PreferenceStore,
    state: RwLock<PreferenceState>,
    recommendations: watch::Sender<RecommendationState>,
    tickets: AtomicU64,
    /// Newest ticket that claimed each slot
    claims: [AtomicU64; Slot::COUNT],
    in_flight: AtomicUsize,
}

impl RecommendationService {
    /// Loads the user's persisted state and derives a fresh profile
    pub async fn load(
        username: impl Into<String>,
        catalog: Arc<dyn MovieCatalog>,
        store: PreferenceStore,
    ) -> Self {
        let state = store.load().await;
        let (recommendations, _) = watch::channel(RecommendationState::default());

        Self {
            username: username.into(),
            fetcher: CandidateFetcher::new(catalog.clone()),
            catalog,
            store,
            state: RwLock::new(state),
            recommendations,
            tickets: AtomicU64::new(0),
            claims: Default::default(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Receives every committed `RecommendationState`
    pub fn subscribe(&self) -> watch::Receiver<RecommendationState> {
        self.recommendations.subscribe()
    }

    pub fn snapshot(&self) -> RecommendationState {
        self.recommendations.borrow().clone()
    }

    pub async fn watch_history(&self) -> Vec<WatchHistoryEntry> {
        self.state.read().await.history.clone()
    }

    pub async fn ratings(&self) -> HashMap<MovieId, Rating> {
        self.state.read().await.ratings.clone()
    }

    pub async fn favorites(&self) -> Vec<Favorite> {
        self.state.read().await.favorites.clone()
    }

    pub async fn preferences(&self) -> PreferenceProfile {
        self.state.read().await.profile.clone()
    }

    /// Applies a command to a copy of the state, persists the copy, then swaps it in
    ///
    /// `command` returns whether it changed anything; nothing is saved when it did
    /// not. On a failed save the current state stays as it was.
    async fn update(&self, command: impl FnOnce(&mut PreferenceState) -> bool) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        if !command(&mut next) {
            return Ok(false);
        }

        next.recompute();
        self.store.save(&next).await?;
        *state = next;
        Ok(true)
    }

    /// Records a movie view
    ///
    /// A movie already in history moves to the front with a fresh timestamp and is
    /// not fetched again. Otherwise `prefetched` detail is used when given, and the
    /// catalog is asked only when it is not.
    pub async fn add_to_watch_history(
        &self,
        movie_id: MovieId,
        prefetched: Option<MovieDetail>,
    ) -> AppResult<()> {
        if movie_id == 0 {
            return Err(AppError::InvalidInput("Movie id is required".to_string()));
        }
        if let Some(detail) = &prefetched {
            if detail.id != movie_id {
                return Err(AppError::InvalidInput(format!(
                    "Prefetched detail is for movie {}, not {}",
                    detail.id, movie_id
                )));
            }
        }

        if self.update(|state| state.touch(movie_id, Utc::now())).await? {
            tracing::debug!(username = %self.username, movie_id, "Watch history entry refreshed");
            return Ok(());
        }

        let detail = match prefetched {
            Some(detail) => detail,
            None => self.catalog.movie_detail(movie_id).await?,
        };

        self.update(|state| {
            // A concurrent add may have recorded it while the detail was in flight
            if !state.touch(movie_id, Utc::now()) {
                state.record_view(WatchHistoryEntry::from_detail(&detail, Utc::now()));
            }
            true
        })
        .await?;

        let history = self.state.read().await.history.len();
        tracing::info!(
            username = %self.username,
            movie_id,
            history,
            "Movie added to watch history"
        );
        Ok(())
    }

    /// Upserts a rating; local only, no catalog call
    pub async fn rate_movie(
        &self,
        movie_id: MovieId,
        rating: f32,
        scale: RatingScale,
    ) -> AppResult<()> {
        if movie_id == 0 {
            return Err(AppError::InvalidInput("Movie id is required".to_string()));
        }
        let stars = scale.to_stars(rating)?;

        self.update(|state| {
            state.rate(movie_id, stars, Utc::now());
            true
        })
        .await?;

        tracing::info!(username = %self.username, movie_id, stars, "Movie rated");
        Ok(())
    }

    /// Adds a movie to favorites; returns false if it already was one
    pub async fn add_favorite(&self, movie_id: MovieId) -> AppResult<bool> {
        if movie_id == 0 {
            return Err(AppError::InvalidInput("Movie id is required".to_string()));
        }
        if self.state.read().await.is_favorite(movie_id) {
            return Ok(false);
        }

        let detail = self.catalog.movie_detail(movie_id).await?;
        let favorite = Favorite::from_summary(&detail.summary(), Utc::now());

        self.update(|state| state.add_favorite(favorite)).await
    }

    /// Removes a favorite; returns false if it was not one
    pub async fn remove_favorite(&self, movie_id: MovieId) -> AppResult<bool> {
        self.update(|state| state.remove_favorite(movie_id)).await
    }

    pub async fn clear_watch_history(&self) -> AppResult<()> {
        self.update(|state| {
            state.clear_history();
            true
        })
        .await?;
        Ok(())
    }

    /// Fetches one pool against a snapshot of the current history and profile
    async fn fetch_pool(&self, slot: Slot) -> AppResult<Vec<RecommendationCandidate>> {
        let (history, profile) = {
            let state = self.state.read().await;
            (state.history.clone(), state.profile.clone())
        };

        match slot {
            Slot::WatchHistory => self.fetcher.history_pool(&history).await,
            Slot::Genres => self.fetcher.genre_pool(&profile.genres, &history).await,
            Slot::Actors => self.fetcher.actor_pool(&profile.actors, &history).await,
            Slot::TopPicks => Ok(Vec::new()),
        }
    }

    /// Draws a ticket for a refresh that will write `slots`
    fn begin(&self, slots: &[Slot]) -> u64 {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        for slot in slots {
            self.claims[slot.index()].fetch_max(ticket, Ordering::SeqCst);
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.recommendations.send_modify(|s| s.is_loading = true);
        ticket
    }

    /// Commits a finished refresh's slots that no later refresh has claimed
    ///
    /// The claim check and the write happen under the same channel lock. `error`
    /// is committed along with the slots, and dropped if none of them were.
    fn finish(
        &self,
        ticket: u64,
        results: Vec<(Slot, Vec<RecommendationCandidate>)>,
        error: Option<String>,
    ) -> RecommendationState {
        self.recommendations.send_modify(|s| {
            let mut committed = false;
            for (slot, candidates) in results {
                if self.claims[slot.index()].load(Ordering::SeqCst) == ticket {
                    *slot.of(s) = candidates;
                    committed = true;
                } else {
                    tracing::debug!(
                        username = %self.username,
                        ticket,
                        slot = slot.label(),
                        "Discarding slot claimed by a newer refresh"
                    );
                }
            }

            if committed {
                s.error = error;
                s.generation = s.generation.max(ticket);
                s.updated_at = Some(Utc::now());
            }
            s.is_loading = self.in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        });
        self.snapshot()
    }

    fn settle(
        &self,
        slot: Slot,
        result: AppResult<Vec<RecommendationCandidate>>,
        failed: &mut Vec<&'static str>,
    ) -> Vec<RecommendationCandidate> {
        result.unwrap_or_else(|e| {
            tracing::error!(
                username = %self.username,
                pool = slot.label(),
                error = %e,
                "Failed to fetch recommendations"
            );
            failed.push(slot.label());
            Vec::new()
        })
    }

    /// Refreshes a single pool slot, leaving the others untouched
    async fn refresh_pool(&self, slot: Slot) -> RecommendationState {
        let ticket = self.begin(&[slot]);

        let mut failed = Vec::new();
        let result = self.fetch_pool(slot).await;
        let pool = self.settle(slot, result, &mut failed);

        self.finish(ticket, vec![(slot, pool)], failure_message(&failed))
    }

    pub async fn get_recommendations_based_on_watch_history(&self) -> RecommendationState {
        self.refresh_pool(Slot::WatchHistory).await
    }

    pub async fn get_recommendations_based_on_genres(&self) -> RecommendationState {
        self.refresh_pool(Slot::Genres).await
    }

    pub async fn get_recommendations_based_on_actors(&self) -> RecommendationState {
        self.refresh_pool(Slot::Actors).await
    }

    async fn rank(&self, pools: [&[RecommendationCandidate]; 3]) -> Vec<RecommendationCandidate> {
        let (watched, profile) = {
            let state = self.state.read().await;
            (state.watched_ids(), state.profile.clone())
        };
        ranking::top_picks(&self.catalog, pools, &watched, &profile).await
    }

    /// Ranks the pools currently held in state into the top-picks slot
    pub async fn get_personalized_top_picks(&self) -> RecommendationState {
        let ticket = self.begin(&[Slot::TopPicks]);

        let current = self.snapshot();
        let picks = self
            .rank([
                &current.history_based,
                &current.genre_based,
                &current.actor_based,
            ])
            .await;

        self.finish(ticket, vec![(Slot::TopPicks, picks)], None)
    }

    /// Fetches all three pools, then ranks exactly those pools
    ///
    /// Pools are awaited one after another (each fans out internally); ranking
    /// starts only after all three finished and reads their fresh results, never
    /// the previous slots.
    pub async fn load_all_recommendations(&self) -> RecommendationState {
        let ticket = self.begin(&[
            Slot::WatchHistory,
            Slot::Genres,
            Slot::Actors,
            Slot::TopPicks,
        ]);

        let mut failed = Vec::new();
        let result = self.fetch_pool(Slot::WatchHistory).await;
        let history_based = self.settle(Slot::WatchHistory, result, &mut failed);
        let result = self.fetch_pool(Slot::Genres).await;
        let genre_based = self.settle(Slot::Genres, result, &mut failed);
        let result = self.fetch_pool(Slot::Actors).await;
        let actor_based = self.settle(Slot::Actors, result, &mut failed);

        let top_picks = self
            .rank([&history_based, &genre_based, &actor_based])
            .await;

        tracing::info!(
            username = %self.username,
            ticket,
            history_based = history_based.len(),
            genre_based = genre_based.len(),
            actor_based = actor_based.len(),
            top_picks = top_picks.len(),
            failed_pools = failed.len(),
            "Recommendations refreshed"
        );

        self.finish(
            ticket,
            vec![
                (Slot::WatchHistory, history_based),
                (Slot::Genres, genre_based),
                (Slot::Actors, actor_based),
                (Slot::TopPicks, top_picks),
            ],
            failure_message(&failed),
        )
    }
}

fn failure_message(failed: &[&str]) -> Option<String> {
    if failed.is_empty() {
        None
    } else {
        Some(format!("Failed to load {} recommendations", failed.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{KeyValueStore, MemoryStore};
    use crate::models::{Genre, Keyword, MovieSummary, Page, RecommendedBecause};
    use crate::services::catalog::{DiscoverQuery, MockMovieCatalog};
    use crate::test_support::{movie, summary};
    use mockall::predicate::eq;
    use std::collections::HashSet;
    use tokio::sync::Notify;

    async fn service_with(mock: MockMovieCatalog) -> RecommendationService {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        RecommendationService::load(
            "alice",
            Arc::new(mock),
            PreferenceStore::new(backend, "alice"),
        )
        .await
    }

    fn matrix() -> MovieDetail {
        movie(603, &[(28, "Action")], &[(6384, "Keanu Reeves")], &[(9339, "Lana Wachowski")])
    }

    fn heat() -> MovieDetail {
        movie(949, &[(80, "Crime"), (28, "Action")], &[(1158, "Al Pacino")], &[(638, "Michael Mann")])
    }

    #[tokio::test]
    async fn test_re_adding_moves_to_front_without_refetch() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_movie_detail()
            .with(eq(603))
            .times(1)
            .returning(|_| Ok(matrix()));
        let service = service_with(mock).await;

        service.add_to_watch_history(603, None).await.unwrap();
        service.add_to_watch_history(949, Some(heat())).await.unwrap();
        service.add_to_watch_history(603, None).await.unwrap();

        let ids: Vec<MovieId> = service
            .watch_history()
            .await
            .iter()
            .map(|e| e.movie_id)
            .collect();
        assert_eq!(ids, vec![603, 949]);
    }

    #[tokio::test]
    async fn test_prefetched_detail_is_not_fetched_again() {
        // No expectations: a catalog call would panic
        let service = service_with(MockMovieCatalog::new()).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        let prefs = service.preferences().await;
        assert_eq!(prefs.genres.get(28).unwrap().normalized_score, 100);
        assert_eq!(prefs.actors.get(6384).unwrap().normalized_score, 100);
        assert_eq!(prefs.directors.get(9339).unwrap().normalized_score, 100);
    }

    #[tokio::test]
    async fn test_mismatched_prefetched_detail_is_rejected() {
        let service = service_with(MockMovieCatalog::new()).await;
        let result = service.add_to_watch_history(1, Some(matrix())).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(service.watch_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_leaves_history_unchanged() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_movie_detail()
            .returning(|id| Err(AppError::NotFound(format!("movie {}", id))));
        let service = service_with(mock).await;

        let result = service.add_to_watch_history(42, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(service.watch_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_rating_boosts_profile_without_network() {
        let service = service_with(MockMovieCatalog::new()).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();
        service.add_to_watch_history(949, Some(heat())).await.unwrap();

        let before = service.preferences().await.genres.get(28).unwrap().raw_score;
        service.rate_movie(603, 10.0, RatingScale::Points).await.unwrap();
        let after = service.preferences().await.genres.get(28).unwrap().raw_score;

        assert!(after > before);
        assert_eq!(service.ratings().await[&603].rating, 5.0);
    }

    #[tokio::test]
    async fn test_invalid_rating_is_rejected_before_state_change() {
        let service = service_with(MockMovieCatalog::new()).await;
        assert!(service.rate_movie(603, 7.5, RatingScale::Stars).await.is_err());
        assert!(service.rate_movie(0, 4.0, RatingScale::Stars).await.is_err());
        assert!(service.ratings().await.is_empty());
    }

    #[tokio::test]
    async fn test_favorites_feed_the_profile() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_movie_detail()
            .with(eq(949))
            .times(1)
            .returning(|_| Ok(heat()));
        let service = service_with(mock).await;
        service.add_to_watch_history(949, Some(heat())).await.unwrap();

        let before = service.preferences().await.genres.get(80).unwrap().raw_score;
        assert!(service.add_favorite(949).await.unwrap());
        assert!(!service.add_favorite(949).await.unwrap());
        let after = service.preferences().await.genres.get(80).unwrap().raw_score;
        assert!((after - before - 5.0).abs() < 1e-9);

        assert!(service.remove_favorite(949).await.unwrap());
        let restored = service.preferences().await.genres.get(80).unwrap().raw_score;
        assert!((restored - before).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_state_persists_across_service_instances() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = RecommendationService::load(
            "alice",
            Arc::new(MockMovieCatalog::new()),
            PreferenceStore::new(backend.clone(), "alice"),
        )
        .await;
        first.add_to_watch_history(603, Some(matrix())).await.unwrap();
        first.rate_movie(603, 4.0, RatingScale::Stars).await.unwrap();

        let second = RecommendationService::load(
            "alice",
            Arc::new(MockMovieCatalog::new()),
            PreferenceStore::new(backend, "alice"),
        )
        .await;
        assert_eq!(second.watch_history().await.len(), 1);
        assert_eq!(second.ratings().await[&603].rating, 4.0);
        assert_eq!(second.preferences().await, first.preferences().await);
    }

    #[tokio::test]
    async fn test_load_all_with_all_pools_failing_sets_error() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_recommendations()
            .returning(|_| Err(AppError::NoResponse("offline".to_string())));
        mock.expect_discover()
            .returning(|_| Err(AppError::NoResponse("offline".to_string())));
        let service = service_with(mock).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        let state = service.load_all_recommendations().await;

        assert!(state.history_based.is_empty());
        assert!(state.genre_based.is_empty());
        assert!(state.actor_based.is_empty());
        assert!(state.top_picks.is_empty());
        assert!(!state.is_loading);
        let error = state.error.unwrap();
        assert!(error.contains("watch history"));
        assert!(error.contains("genre"));
        assert!(error.contains("actor"));
    }

    #[tokio::test]
    async fn test_load_all_ranks_fresh_pools() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_recommendations()
            .with(eq(603))
            .returning(|_| Ok(Page::single(vec![summary(10, 50.0), summary(603, 99.0)])));
        mock.expect_discover().returning(|query| {
            if query.with_cast == vec![6384] {
                Ok(Page::single(vec![summary(10, 1.0), summary(11, 1.0)]))
            } else {
                Ok(Page::single(vec![summary(12, 1.0)]))
            }
        });
        mock.expect_movie_detail().returning(|id| match id {
            10 => Ok(movie(10, &[(28, "Action")], &[(6384, "Keanu Reeves")], &[])),
            11 => Ok(movie(11, &[], &[], &[])),
            _ => Ok(movie(id, &[(28, "Action")], &[], &[])),
        });
        let service = service_with(mock).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();
        let mut updates = service.subscribe();

        let state = service.load_all_recommendations().await;

        assert_eq!(state.history_based.len(), 1);
        assert_eq!(state.genre_based.len(), 1);
        assert_eq!(state.actor_based.len(), 2);
        assert!(state.error.is_none());
        assert!(!state.is_loading);

        let ids: Vec<MovieId> = state.top_picks.iter().map(|c| c.movie_id).collect();
        assert_eq!(ids, vec![10, 12, 11]);
        assert!(matches!(
            state.top_picks[0].recommended_because,
            RecommendedBecause::Movie { movie_id: 603, .. }
        ));
        let unique: HashSet<MovieId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(!unique.contains(&603));

        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().generation, state.generation);
    }

    #[tokio::test]
    async fn test_single_pool_refresh_only_touches_its_slot() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_discover()
            .returning(|_| Ok(Page::single(vec![summary(12, 1.0)])));
        let service = service_with(mock).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        let state = service.get_recommendations_based_on_genres().await;
        assert_eq!(state.genre_based.len(), 1);
        assert!(state.history_based.is_empty());
        assert!(state.actor_based.is_empty());
        assert!(state.top_picks.is_empty());
    }

    #[tokio::test]
    async fn test_single_pool_failure_clears_slot_and_sets_error() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_discover()
            .returning(|_| Err(AppError::RateLimited("slow down".to_string())));
        let service = service_with(mock).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        let state = service.get_recommendations_based_on_actors().await;
        assert!(state.actor_based.is_empty());
        assert_eq!(state.error.as_deref(), Some("Failed to load actor recommendations"));
    }

    #[tokio::test]
    async fn test_top_picks_rank_current_slots() {
        let mut mock = MockMovieCatalog::new();
        mock.expect_discover()
            .returning(|_| Ok(Page::single(vec![summary(12, 1.0), summary(13, 1.0)])));
        mock.expect_movie_detail().returning(|id| match id {
            13 => Ok(movie(13, &[(28, "Action")], &[], &[])),
            _ => Ok(movie(id, &[], &[], &[])),
        });
        let service = service_with(mock).await;
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        service.get_recommendations_based_on_genres().await;
        let state = service.get_personalized_top_picks().await;

        let ids: Vec<MovieId> = state.top_picks.iter().map(|c| c.movie_id).collect();
        assert_eq!(ids, vec![13, 12]);
    }

    fn genre_candidate(movie_id: MovieId) -> RecommendationCandidate {
        RecommendationCandidate::from_summary(
            summary(movie_id, 1.0),
            RecommendedBecause::Genres {
                genres: "Action".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_older_refresh_keeps_only_unclaimed_slots() {
        let service = service_with(MockMovieCatalog::new()).await;

        let older = service.begin(&[Slot::Genres, Slot::Actors]);
        let newer = service.begin(&[Slot::Genres]);

        let state = service.finish(newer, vec![(Slot::Genres, vec![genre_candidate(1)])], None);
        assert!(state.is_loading);
        assert_eq!(state.generation, newer);

        let state = service.finish(
            older,
            vec![
                (Slot::Genres, vec![genre_candidate(2)]),
                (Slot::Actors, vec![genre_candidate(3)]),
            ],
            Some("Failed to load watch history recommendations".to_string()),
        );
        assert_eq!(state.genre_based[0].movie_id, 1);
        assert_eq!(state.actor_based[0].movie_id, 3);
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to load watch history recommendations")
        );
        assert_eq!(state.generation, newer);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_fully_superseded_refresh_commits_nothing() {
        let service = service_with(MockMovieCatalog::new()).await;

        let older = service.begin(&[Slot::TopPicks]);
        let newer = service.begin(&[Slot::TopPicks]);
        service.finish(newer, vec![(Slot::TopPicks, vec![genre_candidate(1)])], None);

        let state = service.finish(
            older,
            vec![(Slot::TopPicks, vec![genre_candidate(2)])],
            Some("stale".to_string()),
        );
        assert_eq!(state.top_picks[0].movie_id, 1);
        assert!(state.error.is_none());
        assert!(!state.is_loading);
    }

    /// Catalog whose per-movie recommendations wait on `release`; each discover
    /// call answers with a fresh movie id (20, 21, ...)
    struct GatedCatalog {
        release: Notify,
        discover_calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl MovieCatalog for GatedCatalog {
        async fn trending(&self, _page: u32) -> AppResult<Page<MovieSummary>> {
            Ok(Page::single(Vec::new()))
        }

        async fn search(&self, _query: &str, _page: u32) -> AppResult<Page<MovieSummary>> {
            Ok(Page::single(Vec::new()))
        }

        async fn movie_detail(&self, movie_id: MovieId) -> AppResult<MovieDetail> {
            Ok(movie(movie_id, &[(28, "Action")], &[], &[]))
        }

        async fn recommendations(&self, _movie_id: MovieId) -> AppResult<Page<MovieSummary>> {
            self.release.notified().await;
            Ok(Page::single(vec![summary(10, 1.0)]))
        }

        async fn discover(&self, _query: &DiscoverQuery) -> AppResult<Page<MovieSummary>> {
            let call = self.discover_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Page::single(vec![summary(20 + call, 1.0)]))
        }

        async fn genres(&self) -> AppResult<Vec<Genre>> {
            Ok(Vec::new())
        }

        async fn search_keywords(&self, _query: &str) -> AppResult<Vec<Keyword>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_genre_refresh_during_full_reload_keeps_both_results() {
        let catalog = Arc::new(GatedCatalog {
            release: Notify::new(),
            discover_calls: AtomicU64::new(0),
        });
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let service = Arc::new(
            RecommendationService::load(
                "alice",
                catalog.clone(),
                PreferenceStore::new(backend, "alice"),
            )
            .await,
        );
        service.add_to_watch_history(603, Some(matrix())).await.unwrap();

        let reload = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.load_all_recommendations().await }
        });
        // Wait until the reload is parked on the history pool
        while !service.snapshot().is_loading {
            tokio::task::yield_now().await;
        }

        let genres = service.get_recommendations_based_on_genres().await;
        assert_eq!(genres.genre_based[0].movie_id, 20);
        assert!(genres.is_loading);

        catalog.release.notify_one();
        let full = reload.await.unwrap();

        let ids = |slot: &[RecommendationCandidate]| -> Vec<MovieId> {
            slot.iter().map(|c| c.movie_id).collect()
        };
        assert_eq!(ids(&full.history_based), vec![10]);
        // The reload's own genre pool (21) lost to the newer genre refresh
        assert_eq!(ids(&full.genre_based), vec![20]);
        assert_eq!(ids(&full.actor_based), vec![22]);
        assert!(full.top_picks.iter().any(|c| c.movie_id == 10));
        assert!(full.error.is_none());
        assert!(!full.is_loading);
        assert_eq!(service.snapshot(), full);
    }

    /// Store that reads as empty and refuses every write
    struct FailingStore;

    #[async_trait::async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String, _ttl_secs: Option<u64>) -> AppResult<()> {
            Err(AppError::Internal("store unavailable".to_string()))
        }

        async fn delete(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_unchanged() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(FailingStore);
        let service = RecommendationService::load(
            "alice",
            Arc::new(MockMovieCatalog::new()),
            PreferenceStore::new(backend, "alice"),
        )
        .await;

        let added = service.add_to_watch_history(603, Some(matrix())).await;
        assert!(matches!(added, Err(AppError::Internal(_))));
        assert!(service.watch_history().await.is_empty());
        assert!(service.preferences().await.genres.is_empty());

        let rated = service.rate_movie(603, 4.0, RatingScale::Stars).await;
        assert!(matches!(rated, Err(AppError::Internal(_))));
        assert!(service.ratings().await.is_empty());

        assert!(service.clear_watch_history().await.is_err());
        assert!(!service.remove_favorite(603).await.unwrap());
    }
}
