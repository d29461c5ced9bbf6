use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mission_proto::TelemetryError;
use mission_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure a handler can report. Each kind maps to exactly one status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request body.
    #[error("{0}")]
    Decode(String),

    /// Telemetry numbers that do not parse.
    #[error(transparent)]
    Parse(#[from] TelemetryError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ApiError {
    /// - Decode: 400 Bad Request
    /// - Parse: 422 Unprocessable Entity
    /// - NotFound: 404 Not Found
    /// - Store timeout: 504 Gateway Timeout
    /// - Store (other): 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Parse(_) => "parse_error",
            Self::NotFound(_) => "not_found",
            Self::Store(StoreError::Timeout(_)) => "store_timeout",
            Self::Store(_) => "store_error",
        }
    }

    /// Maps a store failure, turning `NotFound` into a 404 with `msg`.
    pub fn from_store(e: StoreError, msg: impl FnOnce() -> String) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound(msg()),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // store internals stay in the log
        let message = match &self {
            Self::Store(e) => {
                error!(error = %e, "mission store failure");
                match e {
                    StoreError::Timeout(_) => "mission store timed out".to_string(),
                    _ => "mission store unavailable".to_string(),
                }
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}
