use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use paperdigest::{ConfigError, PaperdigestError};

/// Body of every non-success response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Request-level failures, each mapped to one status code.
#[derive(Debug)]
pub enum ApiError {
    /// 400: the body is not a valid job request.
    BadRequest(String),
    /// 502: the record or its attachment could not be fetched.
    Upstream(String),
    /// 500: the job task panicked or was cancelled.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Startup failures. Any of these stops the process.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PaperdigestError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
