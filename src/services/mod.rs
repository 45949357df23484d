pub mod candidates;
pub mod catalog;
pub mod discovery;
pub mod preference_store;
pub mod ranking;
pub mod recommendations;
pub mod signals;

pub use candidates::CandidateFetcher;
pub use catalog::{MovieCatalog, TmdbClient};
pub use discovery::{DiscoveryService, Mood};
pub use preference_store::{PreferenceState, PreferenceStore};
pub use recommendations::RecommendationService;
