use std::{cmp::Ordering, collections::BTreeSet};

use jiff::civil::Date;
use serde::{Deserialize, Deserializer};

/// Provider-assigned movie identifier.
pub type TmdbId = i64;

/// A half-open release-date range `[start, end)` scoping one discovery query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    /// Inclusive bounds as the provider expects them, formatted `YYYY-MM-DD`.
    pub fn query_bounds(&self) -> (String, String) {
        let last = self.end.yesterday().unwrap_or(self.end);
        (self.start.to_string(), last.to_string())
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiscoveryStrategy {
    Unfiltered,
    GenreFiltered { genre_id: i32 },
}

impl DiscoveryStrategy {
    pub fn genre_filter(self) -> Option<i32> {
        match self {
            DiscoveryStrategy::Unfiltered => None,
            DiscoveryStrategy::GenreFiltered { genre_id } => Some(genre_id),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteMode {
    /// Load the stored record for the external id and overwrite it.
    #[default]
    Upsert,
    /// Always store a fresh row, even when the external id is already known.
    InsertOnly,
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(WriteMode::Upsert),
            "insert-only" | "insert_only" | "insert" => Ok(WriteMode::InsertOnly),
            other => Err(format!("unknown write mode: {other}")),
        }
    }
}

/// Genre identity is the provider id alone; the name is display data.
#[derive(Clone, Debug)]
pub struct GenreRef {
    pub id: i32,
    pub name: String,
}

impl PartialEq for GenreRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GenreRef {}

impl PartialOrd for GenreRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GenreRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MovieRecord {
    /// Storage row id, `None` until first saved.
    pub id: Option<i32>,
    pub tmdb_id: TmdbId,
    pub title: String,
    pub overview: String,
    pub poster_url: String,
    pub backdrop_url: String,
    pub release_date: String,
    pub vote_average: f64,
    pub adult: bool,
    pub actors: String,
    pub directors: String,
    pub genres: BTreeSet<GenreRef>,
}

impl MovieRecord {
    pub fn new(tmdb_id: TmdbId) -> Self {
        Self {
            id: None,
            tmdb_id,
            title: String::new(),
            overview: String::new(),
            poster_url: String::new(),
            backdrop_url: String::new(),
            release_date: String::new(),
            vote_average: 0.0,
            adult: false,
            actors: String::new(),
            directors: String::new(),
            genres: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawGenre {
    pub id: i32,
    pub name: String,
}

/// Per-movie detail payload. Text fields that arrive as `null` become empty
/// strings; `vote_average` and `adult` must be present.
#[derive(Clone, Debug, Deserialize)]
pub struct RawMovieDetail {
    pub id: TmdbId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub poster_path: String,
    /// Fetched but not stored: backdrop URLs are built from the poster path.
    #[allow(dead_code)]
    #[serde(default, deserialize_with = "null_as_empty")]
    pub backdrop_path: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub release_date: String,
    pub vote_average: f64,
    pub adult: bool,
    pub genres: Vec<RawGenre>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CastMember {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawCredit {
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
}

/// One page of discovery results.
#[derive(Clone, Debug, Default)]
pub struct DiscoverPage {
    pub ids: Vec<TmdbId>,
    pub total_pages: u32,
}

#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub total_count: usize,
    pub recent_months: u32,
    pub upcoming_months: u32,
    pub past_years: u32,
    pub per_window_cap: usize,
    pub strategy: DiscoveryStrategy,
    pub anchor: Date,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestSummary {
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mode_accepts_known_spellings() {
        assert_eq!("upsert".parse::<WriteMode>(), Ok(WriteMode::Upsert));
        assert_eq!("insert-only".parse::<WriteMode>(), Ok(WriteMode::InsertOnly));
        assert_eq!(" INSERT_ONLY ".parse::<WriteMode>(), Ok(WriteMode::InsertOnly));
    }

    #[test]
    fn write_mode_rejects_unknown_values() {
        assert_eq!("bogus".parse::<WriteMode>(), Err("unknown write mode: bogus".to_string()));
    }

    #[test]
    fn genre_filter_follows_strategy() {
        assert_eq!(DiscoveryStrategy::Unfiltered.genre_filter(), None);
        assert_eq!(DiscoveryStrategy::GenreFiltered { genre_id: 10749 }.genre_filter(), Some(10749));
    }
}
