use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::KeyValueStore,
    error::{AppError, AppResult},
    services::{
        catalog::MovieCatalog, discovery::DiscoveryService, preference_store::PreferenceStore,
        recommendations::RecommendationService,
    },
};

const MAX_USERNAME_LEN: usize = 64;
pub const DEFAULT_SESSION_LIMIT: usize = 1000;

struct Session {
    service: Arc<RecommendationService>,
    last_used: u64,
}

/// Loaded sessions plus a use counter that orders them by recency
#[derive(Default)]
struct Sessions {
    by_user: HashMap<String, Session>,
    clock: u64,
}

/// Shared application state
///
/// Per-user recommendation services are kept in memory up to `session_limit`;
/// past that the least recently used one is dropped. Its preferences are already
/// persisted, so the next request for that user reloads them from the store.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn MovieCatalog>,
    pub store: Arc<dyn KeyValueStore>,
    pub discovery: DiscoveryService,
    sessions: Arc<RwLock<Sessions>>,
    session_limit: usize,
}

impl AppState {
    pub fn new(catalog: Arc<dyn MovieCatalog>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            discovery: DiscoveryService::new(catalog.clone()),
            catalog,
            store,
            sessions: Arc::new(RwLock::new(Sessions::default())),
            session_limit: DEFAULT_SESSION_LIMIT,
        }
    }

    /// Caps the number of in-memory sessions (at least one)
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.session_limit = limit.max(1);
        self
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.by_user.len()
    }

    /// Returns the user's recommendation service, loading it from the store on first use
    pub async fn session(&self, username: &str) -> AppResult<Arc<RecommendationService>> {
        validate_username(username)?;

        let mut sessions = self.sessions.write().await;
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(session) = sessions.by_user.get_mut(username) {
            session.last_used = now;
            return Ok(session.service.clone());
        }

        if sessions.by_user.len() >= self.session_limit {
            let oldest = sessions
                .by_user
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(name, _)| name.clone());
            if let Some(name) = oldest {
                sessions.by_user.remove(&name);
                tracing::debug!(username = %name, "Recommendation session evicted");
            }
        }

        let service = Arc::new(
            RecommendationService::load(
                username,
                self.catalog.clone(),
                PreferenceStore::new(self.store.clone(), username),
            )
            .await,
        );
        sessions.by_user.insert(
            username.to_string(),
            Session {
                service: service.clone(),
                last_used: now,
            },
        );
        tracing::debug!(username, sessions = sessions.by_user.len(), "Recommendation session created");

        Ok(service)
    }
}

fn validate_username(username: &str) -> AppResult<()> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid username: must be 1-{} characters of letters, digits, '_', '-' or '.'",
            MAX_USERNAME_LEN
        )))
    }
}
