//! Fixtures shared by unit tests

use chrono::{TimeZone, Utc};

use crate::models::{
    CastMember, CrewMember, Genre, MovieDetail, MovieId, MovieSummary, WatchHistoryEntry,
};

pub fn detail(id: MovieId) -> MovieDetail {
    MovieDetail {
        id,
        title: format!("Movie {}", id),
        overview: None,
        poster_path: Some(format!("/poster-{}.jpg", id)),
        backdrop_path: None,
        release_date: None,
        runtime: None,
        vote_average: 7.0,
        vote_count: 100,
        popularity: 10.0,
        genres: Vec::new(),
        cast: Vec::new(),
        crew: Vec::new(),
        videos: Vec::new(),
    }
}

/// A detail with the given genres, billed cast (in order) and directors
pub fn movie(
    id: MovieId,
    genres: &[(u64, &str)],
    cast: &[(u64, &str)],
    directors: &[(u64, &str)],
) -> MovieDetail {
    MovieDetail {
        genres: genres
            .iter()
            .map(|&(id, name)| Genre {
                id,
                name: name.to_string(),
            })
            .collect(),
        cast: cast
            .iter()
            .enumerate()
            .map(|(order, &(id, name))| CastMember {
                id,
                name: name.to_string(),
                character: None,
                order: order as u32,
                profile_path: None,
            })
            .collect(),
        crew: directors
            .iter()
            .map(|&(id, name)| CrewMember {
                id,
                name: name.to_string(),
                job: "Director".to_string(),
                department: Some("Directing".to_string()),
                profile_path: None,
            })
            .collect(),
        ..detail(id)
    }
}

pub fn summary(id: MovieId, popularity: f64) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {}", id),
        overview: None,
        poster_path: None,
        backdrop_path: None,
        release_date: None,
        vote_average: 6.5,
        vote_count: 500,
        popularity,
        genre_ids: Vec::new(),
    }
}

pub fn watched(detail: &MovieDetail) -> WatchHistoryEntry {
    WatchHistoryEntry::from_detail(detail, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
}
