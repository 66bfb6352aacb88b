use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures of an ingestion run. None of them are retried; the first one
/// aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to fetch {call}: {status} {message}")]
    Transport { call: String, status: u16, message: String },

    #[error("malformed response from {call}: {source}")]
    Malformed {
        call: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {call} failed: {source}")]
    Http {
        call: String,
        #[source]
        source: wreq::Error,
    },

    #[error("could not plan discovery windows: {0}")]
    Planning(#[from] jiff::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: anyhow::Error,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, inner: anyhow::anyhow!(message.into()) }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { status: StatusCode::CONFLICT, inner: anyhow::anyhow!(message.into()) }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, inner: err }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, inner: anyhow::Error::new(err) }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, inner: anyhow::Error::new(err) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
