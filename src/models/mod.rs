pub mod movie;
pub mod preferences;
pub mod recommendation;

pub use movie::{
    ApiGenreList, ApiMovieDetail, CastMember, CrewMember, Genre, Keyword, MovieDetail, MovieId,
    MovieSummary, Page, Video,
};
pub use preferences::{
    Favorite, PreferenceMap, PreferenceProfile, PreferenceScore, Rating, RatingScale,
    WatchHistoryEntry,
};
pub use recommendation::{RecommendationCandidate, RecommendationState, RecommendedBecause};
