use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{MovieSummary, Page},
    services::catalog::{DiscoverQuery, MovieCatalog},
};

/// The catalog serves at most this many listing pages
pub const MAX_PAGE: u32 = 500;
const MOOD_MIN_VOTE_COUNT: u32 = 50;

/// How the user feels like watching tonight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Excited,
    Romantic,
    Scared,
    Thoughtful,
    Relaxed,
    Adventurous,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Excited,
        Mood::Romantic,
        Mood::Scared,
        Mood::Thoughtful,
        Mood::Relaxed,
        Mood::Adventurous,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Excited => "excited",
            Mood::Romantic => "romantic",
            Mood::Scared => "scared",
            Mood::Thoughtful => "thoughtful",
            Mood::Relaxed => "relaxed",
            Mood::Adventurous => "adventurous",
        }
    }

    /// Catalog genre ids, any of which matches
    pub fn genres(self) -> &'static [u64] {
        match self {
            // Comedy, Family, Animation
            Mood::Happy => &[35, 10751, 16],
            // Drama, Romance
            Mood::Sad => &[18, 10749],
            // Action, Thriller, Science Fiction
            Mood::Excited => &[28, 53, 878],
            // Romance, Comedy
            Mood::Romantic => &[10749, 35],
            // Horror, Thriller, Mystery
            Mood::Scared => &[27, 53, 9648],
            // Drama, Documentary, History
            Mood::Thoughtful => &[18, 99, 36],
            // Comedy, Animation, Music
            Mood::Relaxed => &[35, 16, 10402],
            // Adventure, Fantasy, Action
            Mood::Adventurous => &[12, 14, 28],
        }
    }

    pub fn excluded_genres(self) -> &'static [u64] {
        match self {
            Mood::Happy | Mood::Relaxed => &[27, 53, 10752],
            Mood::Romantic => &[27, 10752],
            Mood::Scared => &[35, 10751, 16],
            Mood::Sad | Mood::Excited | Mood::Thoughtful | Mood::Adventurous => &[],
        }
    }

    /// Keyword phrases resolved to catalog keyword ids before discovery
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Mood::Happy => &["feel-good", "friendship"],
            Mood::Sad => &["tragedy", "loss"],
            Mood::Excited => &["heist", "chase"],
            Mood::Romantic => &["love", "romance"],
            Mood::Scared => &["haunting", "supernatural"],
            Mood::Thoughtful => &["philosophy", "based on true story"],
            Mood::Relaxed => &["slice of life", "road trip"],
            Mood::Adventurous => &["quest", "exploration"],
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown mood: {}", s)))
    }
}

/// Browse, search and mood-based discovery over the catalog
#[derive(Clone)]
pub struct DiscoveryService {
    catalog: Arc<dyn MovieCatalog>,
}

impl DiscoveryService {
    pub fn new(catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn trending(&self, page: u32) -> AppResult<Page<MovieSummary>> {
        validate_page(page)?;
        self.catalog.trending(page).await
    }

    pub async fn search_movies(&self, query: &str, page: u32) -> AppResult<Page<MovieSummary>> {
        validate_page(page)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query is required".to_string(),
            ));
        }
        self.catalog.search(query, page).await
    }

    /// Looks up keyword ids concurrently; phrases with no hit or a failed lookup are skipped
    async fn resolve_keywords(&self, phrases: &[&str]) -> Vec<u64> {
        let tasks: Vec<_> = phrases
            .iter()
            .map(|&phrase| {
                let catalog = Arc::clone(&self.catalog);
                let phrase = phrase.to_string();
                tokio::spawn(async move { catalog.search_keywords(&phrase).await })
            })
            .collect();

        let mut ids = Vec::new();
        for (phrase, task) in phrases.iter().zip(tasks) {
            match task.await {
                Ok(Ok(keywords)) => {
                    if let Some(keyword) = keywords.first() {
                        ids.push(keyword.id);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(phrase = %phrase, error = %e, "Keyword lookup failed");
                }
                Err(e) => {
                    tracing::error!(phrase = %phrase, error = %e, "Task join error");
                }
            }
        }
        ids
    }

    /// Popular movies matching a mood
    ///
    /// Keyword-constrained first; when that finds nothing, genres alone.
    pub async fn discover_by_mood(&self, mood: Mood, page: u32) -> AppResult<Page<MovieSummary>> {
        validate_page(page)?;

        let base = DiscoverQuery {
            with_genres: mood.genres().to_vec(),
            without_genres: mood.excluded_genres().to_vec(),
            page,
            ..DiscoverQuery::default()
        }
        .min_votes(MOOD_MIN_VOTE_COUNT);

        let keyword_ids = self.resolve_keywords(mood.keywords()).await;
        if !keyword_ids.is_empty() {
            let query = DiscoverQuery {
                with_keywords: keyword_ids,
                ..base.clone()
            };
            let results = self.catalog.discover(&query).await?;
            if !results.results.is_empty() {
                tracing::debug!(mood = %mood, count = results.results.len(), "Mood discovery with keywords");
                return Ok(results);
            }
            tracing::debug!(mood = %mood, "No keyword matches, falling back to genres only");
        }

        self.catalog.discover(&base).await
    }
}

fn validate_page(page: u32) -> AppResult<()> {
    if (1..=MAX_PAGE).contains(&page) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Page must be between 1 and {}",
            MAX_PAGE
        )))
    }
}
