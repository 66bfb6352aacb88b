mod config;
mod db;
mod discovery;
mod entities;
mod error;
mod genres;
mod models;
mod processor;
mod routes;
mod store;
mod tmdb;
mod windows;

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::{config::Config, store::SeaOrmStore};

pub struct AppState {
    pub config: Arc<Config>,
    pub http: wreq::Client,
    pub store: SeaOrmStore,
    /// Held for the duration of an ingestion run; runs never overlap.
    pub ingest_lock: Arc<Mutex<()>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/movies/fetch-and-save", get(routes::fetch_and_save))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelhouse=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = wreq::Client::builder().build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = SeaOrmStore::new(db);

    let state = Arc::new(AppState {
        config: config.clone(),
        http,
        store,
        ingest_lock: Arc::new(Mutex::new(())),
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
