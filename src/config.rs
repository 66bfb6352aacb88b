use std::net::SocketAddr;

use anyhow::Context;

use crate::models::{DiscoveryStrategy, WriteMode};

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub tmdb_language: String,
    pub tmdb_rps: u32,
    pub recent_months: u32,
    pub upcoming_months: u32,
    pub past_years: u32,
    pub per_window_cap: usize,
    pub default_number_of_movies: usize,
    pub strategy: DiscoveryStrategy,
    pub write_mode: WriteMode,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://reelhouse.db?mode=rwc".to_string());

        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_image_base_url = std::env::var("TMDB_IMAGE_BASE_URL")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p/".to_string());
        let tmdb_language = std::env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "ko-KR".to_string());

        let tmdb_rps: u32 = env_or("TMDB_RPS", 4);
        let recent_months: u32 = env_or("RECENT_MONTHS", 1);
        let upcoming_months: u32 = env_or("UPCOMING_MONTHS", 1);
        let past_years: u32 = env_or("PAST_YEARS", 10);
        let per_window_cap: usize = env_or("PER_WINDOW_CAP", 100);
        let default_number_of_movies: usize = env_or("DEFAULT_NUMBER_OF_MOVIES", 15_000);

        let strategy = discovery_strategy(std::env::var("DISCOVERY_GENRE_ID").ok())?;
        let write_mode = write_mode(std::env::var("WRITE_MODE").ok())?;

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_base_url,
            tmdb_image_base_url,
            tmdb_language,
            tmdb_rps,
            recent_months,
            upcoming_months,
            past_years,
            per_window_cap,
            default_number_of_movies,
            strategy,
            write_mode,
        })
    }
}

/// A set genre id switches discovery to the genre-filtered strategy. An id
/// that does not parse is an error rather than a silent fallback to
/// unfiltered discovery.
fn discovery_strategy(raw: Option<String>) -> anyhow::Result<DiscoveryStrategy> {
    match raw.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(DiscoveryStrategy::GenreFiltered {
            genre_id: id.parse().context("DISCOVERY_GENRE_ID")?,
        }),
        _ => Ok(DiscoveryStrategy::Unfiltered),
    }
}

fn write_mode(raw: Option<String>) -> anyhow::Result<WriteMode> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            raw.parse::<WriteMode>().map_err(anyhow::Error::msg).context("WRITE_MODE")
        },
        _ => Ok(WriteMode::default()),
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            tmdb_base_url: "http://127.0.0.1:9".to_string(),
            tmdb_image_base_url: "https://image.tmdb.org/t/p/".to_string(),
            tmdb_language: "ko-KR".to_string(),
            tmdb_rps: 50,
            recent_months: 1,
            upcoming_months: 1,
            past_years: 10,
            per_window_cap: 100,
            default_number_of_movies: 15_000,
            strategy: DiscoveryStrategy::Unfiltered,
            write_mode: WriteMode::Upsert,
        }
    }
}
