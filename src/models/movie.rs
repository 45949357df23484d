use serde::{Deserialize, Serialize};

/// Catalog (TMDB) movie identifier
pub type MovieId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// A credited cast member; `order` is the billing position (0 = top-billed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

impl CrewMember {
    pub fn is_director(&self) -> bool {
        self.job == "Director"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub video_type: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: u64,
    pub name: String,
}

/// List/search shape returned by trending, search, discover and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: MovieId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
}

/// A paginated catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

impl<T> Page<T> {
    pub fn single(results: Vec<T>) -> Self {
        let total_results = results.len() as u64;
        Self {
            results,
            page: 1,
            total_pages: 1,
            total_results,
        }
    }
}

/// Full detail shape: genres, billed cast, crew and videos
///
/// Scoring code works on this type only; list shapes are converted at the fetch
/// boundary so nothing downstream checks for optional credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: MovieId,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub popularity: f64,
    pub genres: Vec<Genre>,
    /// Ordered by billing
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
    pub videos: Vec<Video>,
}

impl MovieDetail {
    /// The first `n` billed cast members
    pub fn top_billed(&self, n: usize) -> &[CastMember] {
        &self.cast[..self.cast.len().min(n)]
    }

    pub fn directors(&self) -> impl Iterator<Item = &CrewMember> {
        self.crew.iter().filter(|member| member.is_director())
    }

    /// Preferred YouTube trailer: an official one if present, else any trailer
    pub fn trailer(&self) -> Option<&Video> {
        let trailers = || {
            self.videos
                .iter()
                .filter(|v| v.site == "YouTube" && v.video_type == "Trailer")
        };
        trailers().find(|v| v.official).or_else(|| trailers().next())
    }

    pub fn summary(&self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title.clone(),
            overview: self.overview.clone(),
            poster_path: self.poster_path.clone(),
            backdrop_path: self.backdrop_path.clone(),
            release_date: self.release_date.clone(),
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            popularity: self.popularity,
            genre_ids: self.genres.iter().map(|g| g.id).collect(),
        }
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Raw response from GET /movie/{id}?append_to_response=videos,credits
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMovieDetail {
    pub id: MovieId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub credits: Option<ApiCredits>,
    #[serde(default)]
    pub videos: Option<ApiVideos>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCredits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiVideos {
    #[serde(default)]
    pub results: Vec<Video>,
}

/// Raw response from GET /genre/movie/list
#[derive(Debug, Deserialize)]
pub struct ApiGenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl From<ApiMovieDetail> for MovieDetail {
    fn from(api: ApiMovieDetail) -> Self {
        let credits = api.credits.unwrap_or_default();
        let mut cast = credits.cast;
        cast.sort_by_key(|member| member.order);

        MovieDetail {
            id: api.id,
            title: api.title,
            overview: api.overview,
            poster_path: api.poster_path,
            backdrop_path: api.backdrop_path,
            release_date: api.release_date,
            runtime: api.runtime,
            vote_average: api.vote_average,
            vote_count: api.vote_count,
            popularity: api.popularity,
            genres: api.genres,
            cast,
            crew: credits.crew,
            videos: api.videos.unwrap_or_default().results,
        }
    }
}
