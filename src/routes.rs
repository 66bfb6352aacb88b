use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::error;

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::IngestRequest,
    processor::Ingestor,
    tmdb::TmdbClient,
};

#[derive(Debug, Deserialize)]
pub struct FetchAndSaveQuery {
    #[serde(default)]
    api_key: String,
    number_of_movies: Option<usize>,
}

pub async fn fetch_and_save(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FetchAndSaveQuery>,
) -> AppResult<&'static str> {
    let api_key = q.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(AppError::bad_request("api_key is required"));
    }

    let total_count = q.number_of_movies.unwrap_or(state.config.default_number_of_movies);
    if total_count == 0 {
        return Err(AppError::bad_request("number_of_movies must be positive"));
    }

    let Ok(_running) = state.ingest_lock.try_lock() else {
        return Err(AppError::conflict("an ingestion run is already in progress"));
    };

    let config = &state.config;
    let tmdb = TmdbClient::new(
        state.http.clone(),
        api_key,
        config.tmdb_base_url.clone(),
        config.tmdb_language.clone(),
        config.tmdb_rps,
    );
    let ingestor =
        Ingestor::new(&tmdb, &state.store, config.tmdb_image_base_url.clone(), config.write_mode);

    let request = IngestRequest {
        total_count,
        recent_months: config.recent_months,
        upcoming_months: config.upcoming_months,
        past_years: config.past_years,
        per_window_cap: config.per_window_cap,
        strategy: config.strategy,
        anchor: jiff::Zoned::now().date(),
    };

    if let Err(err) = ingestor.ingest(&request).await {
        error!(error = %err, "ingestion failed");
        return Err(err.into());
    }

    Ok("Successfully fetched and saved latest movies")
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, store::SeaOrmStore};

    async fn state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(Config::for_tests()),
            http: wreq::Client::builder().build().unwrap(),
            store: SeaOrmStore::in_memory().await.unwrap(),
            ingest_lock: Default::default(),
        })
    }

    async fn call(state: Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let resp = crate::router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected() {
        let (status, body) = call(state().await, "/api/movies/fetch-and-save").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "api_key is required");
    }

    #[tokio::test]
    async fn zero_movies_is_rejected() {
        let (status, body) =
            call(state().await, "/api/movies/fetch-and-save?api_key=k&number_of_movies=0").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "number_of_movies must be positive");
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let state = state().await;
        let _held = state.ingest_lock.clone().lock_owned().await;

        let (status, _) = call(state.clone(), "/api/movies/fetch-and-save?api_key=k").await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unreachable_provider_reports_server_error() {
        let (status, body) =
            call(state().await, "/api/movies/fetch-and-save?api_key=k&number_of_movies=5").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("request to discover"), "unexpected body: {body}");
    }
}
