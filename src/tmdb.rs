use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;
use wreq::header::USER_AGENT;

use crate::{
    error::IngestError,
    models::{DateWindow, DiscoverPage, RawCredit, RawMovieDetail, TmdbId},
};

/// The catalog calls ingestion depends on.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// One page (1-based) of movies released inside `window`, most popular
    /// first.
    async fn discover_page(
        &self,
        window: &DateWindow,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<DiscoverPage, IngestError>;

    async fn movie_detail(&self, tmdb_id: TmdbId) -> Result<RawMovieDetail, IngestError>;

    async fn movie_credits(&self, tmdb_id: TmdbId) -> Result<RawCredit, IngestError>;
}

pub struct TmdbClient {
    client: wreq::Client,
    api_key: String,
    base_url: String,
    language: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: wreq::Client,
        api_key: String,
        base_url: String,
        language: String,
        rps: u32,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN),
        )));
        Self { client, api_key, base_url, language, limiter }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        call: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, IngestError> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let http_err = |source| IngestError::Http { call: call.to_string(), source };

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("reelhouse/", env!("CARGO_PKG_VERSION")))
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(params)
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(http_err)?;

        if !status.is_success() {
            return Err(IngestError::Transport {
                call: call.to_string(),
                status: status.as_u16(),
                message: status_message(&body, status.canonical_reason()),
            });
        }

        decode(call, &body)
    }
}

#[async_trait]
impl CatalogProvider for TmdbClient {
    async fn discover_page(
        &self,
        window: &DateWindow,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<DiscoverPage, IngestError> {
        let (gte, lte) = window.query_bounds();
        let mut params = vec![
            ("sort_by", "popularity.desc".to_string()),
            ("page", page.to_string()),
            ("primary_release_date.gte", gte),
            ("primary_release_date.lte", lte),
        ];
        if let Some(genre_id) = genre_id {
            params.push(("with_genres", genre_id.to_string()));
        }

        let call = format!("discover {window} page {page}");
        let resp: DiscoverResponse = self.get_json(&call, "discover/movie", &params).await?;
        debug!(window = %window, page, total_pages = resp.total_pages, results = resp.results.len(), "discover page");

        Ok(resp.into())
    }

    async fn movie_detail(&self, tmdb_id: TmdbId) -> Result<RawMovieDetail, IngestError> {
        self.get_json(&format!("movie {tmdb_id}"), &format!("movie/{tmdb_id}"), &[]).await
    }

    async fn movie_credits(&self, tmdb_id: TmdbId) -> Result<RawCredit, IngestError> {
        self.get_json(
            &format!("credits for movie {tmdb_id}"),
            &format!("movie/{tmdb_id}/credits"),
            &[],
        )
        .await
    }
}

fn decode<T: DeserializeOwned>(call: &str, body: &str) -> Result<T, IngestError> {
    serde_json::from_str(body)
        .map_err(|source| IngestError::Malformed { call: call.to_string(), source })
}

/// TMDB error bodies carry a `status_message`; anything else falls back to
/// the reason phrase.
fn status_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.status_message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| reason.unwrap_or("unknown status").to_string())
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    results: Vec<DiscoverMovie>,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct DiscoverMovie {
    id: TmdbId,
}

impl From<DiscoverResponse> for DiscoverPage {
    fn from(resp: DiscoverResponse) -> Self {
        Self { ids: resp.results.into_iter().map(|m| m.id).collect(), total_pages: resp.total_pages }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    status_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::{
        Json, Router,
        extract::{RawQuery, State},
        http::StatusCode,
        routing::get,
    };
    use jiff::civil::date;
    use serde_json::json;

    use super::*;

    type SeenQueries = Arc<Mutex<Vec<String>>>;

    /// Local stand-in for the TMDB API: discovery records its query string,
    /// movie detail always answers 401.
    async fn serve(seen: SeenQueries) -> String {
        let app = Router::new()
            .route(
                "/discover/movie",
                get(|State(seen): State<SeenQueries>, RawQuery(query): RawQuery| async move {
                    seen.lock().unwrap().push(query.unwrap_or_default());
                    Json(json!({"page": 1, "results": [{"id": 11}, {"id": 12}], "total_pages": 4}))
                }),
            )
            .route(
                "/movie/{id}",
                get(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"status_code": 7, "status_message": "Invalid API key", "success": false})),
                    )
                }),
            )
            .with_state(seen);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> TmdbClient {
        TmdbClient::new(
            wreq::Client::builder().build().unwrap(),
            "secret-key".to_string(),
            base_url,
            "ko-KR".to_string(),
            50,
        )
    }

    fn window() -> DateWindow {
        DateWindow { start: date(2024, 4, 15), end: date(2024, 5, 15) }
    }

    #[tokio::test]
    async fn discover_sends_key_locale_sort_bounds_and_genre() {
        let seen = SeenQueries::default();
        let tmdb = client(serve(seen.clone()).await);

        let page = tmdb.discover_page(&window(), Some(27), 3).await.unwrap();

        assert_eq!(page.ids, vec![11, 12]);
        assert_eq!(page.total_pages, 4);
        let query = seen.lock().unwrap()[0].clone();
        for expected in [
            "api_key=secret-key",
            "language=ko-KR",
            "sort_by=popularity.desc",
            "page=3",
            "primary_release_date.gte=2024-04-15",
            "primary_release_date.lte=2024-05-14",
            "with_genres=27",
        ] {
            assert!(query.split('&').any(|pair| pair == expected), "{expected} missing from {query}");
        }
    }

    #[tokio::test]
    async fn unfiltered_discover_omits_genre() {
        let seen = SeenQueries::default();
        let tmdb = client(serve(seen.clone()).await);

        tmdb.discover_page(&window(), None, 1).await.unwrap();

        let query = seen.lock().unwrap()[0].clone();
        assert!(!query.contains("with_genres"), "unexpected genre filter in {query}");
    }

    #[tokio::test]
    async fn rejected_detail_request_carries_status_and_provider_message() {
        let tmdb = client(serve(SeenQueries::default()).await);

        let err = tmdb.movie_detail(603).await.unwrap_err();

        match err {
            IngestError::Transport { call, status, message } => {
                assert_eq!(call, "movie 603");
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn detail_nulls_become_empty_strings() {
        let body = r#"{
            "id": 603,
            "title": "The Matrix",
            "overview": null,
            "poster_path": null,
            "backdrop_path": "/bd.jpg",
            "release_date": "",
            "vote_average": 8.2,
            "adult": false,
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}]
        }"#;

        let detail: RawMovieDetail = decode("movie 603", body).unwrap();

        assert_eq!(detail.id, 603);
        assert_eq!(detail.overview, "");
        assert_eq!(detail.poster_path, "");
        assert_eq!(detail.backdrop_path, "/bd.jpg");
        assert_eq!(detail.genres.len(), 2);
        assert_eq!(detail.genres[1].name, "Science Fiction");
    }

    #[test]
    fn detail_without_vote_average_is_malformed() {
        let body = r#"{"id": 1, "title": "x", "adult": false, "genres": []}"#;

        let err = decode::<RawMovieDetail>("movie 1", body).unwrap_err();

        match err {
            IngestError::Malformed { call, .. } => assert_eq!(call, "movie 1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_text_fields_default_to_empty() {
        let body = r#"{"id": 7, "vote_average": 0.0, "adult": true, "genres": []}"#;

        let detail: RawMovieDetail = decode("movie 7", body).unwrap();

        assert_eq!(detail.title, "");
        assert_eq!(detail.release_date, "");
        assert!(detail.adult);
    }

    #[test]
    fn credits_keep_provider_order() {
        let body = r#"{
            "id": 603,
            "cast": [{"name": "Keanu Reeves", "character": "Neo"}, {"name": "Carrie-Anne Moss"}],
            "crew": [{"name": "Lana Wachowski", "job": "Director"}, {"name": "Bill Pope", "job": "Director of Photography"}]
        }"#;

        let credits: RawCredit = decode("credits for movie 603", body).unwrap();

        assert_eq!(credits.cast[0].name, "Keanu Reeves");
        assert_eq!(credits.crew[1].job, "Director of Photography");
    }

    #[test]
    fn discover_response_maps_ids_and_page_count() {
        let body = r#"{"page": 1, "results": [{"id": 5, "title": "a"}, {"id": 9}], "total_pages": 3, "total_results": 42}"#;

        let page: DiscoverPage = decode::<DiscoverResponse>("discover", body).unwrap().into();

        assert_eq!(page.ids, vec![5, 9]);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn status_message_prefers_provider_text() {
        let body = r#"{"status_code": 7, "status_message": "Invalid API key: You must be granted a valid key.", "success": false}"#;

        assert_eq!(
            status_message(body, Some("Unauthorized")),
            "Invalid API key: You must be granted a valid key."
        );
        assert_eq!(status_message("<html>bad gateway</html>", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(status_message("", None), "unknown status");
    }

    #[test]
    fn transport_error_names_call_status_and_message() {
        let err = IngestError::Transport {
            call: "discover 2024-04-15..2024-05-15 page 2".to_string(),
            status: 401,
            message: "Invalid API key".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "failed to fetch discover 2024-04-15..2024-05-15 page 2: 401 Invalid API key"
        );
    }
}
