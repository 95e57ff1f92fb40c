use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code.
    #[schema(example = "VALIDATION_ERROR")]
    pub error: &'static str,
    /// Human-readable error description.
    pub message: String,
}

/// Application-level error type. The kind is carried through the whole call
/// chain and only mapped to a transport status at the handler boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or inconsistent deployment configuration. Fatal at boot.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The metadata schema could not be created or healed. Fatal at boot.
    #[error("schema error: {0}")]
    Schema(String),

    /// Bad or missing request input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A blob or relay backend returned a non-success result.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A blob or relay backend did not answer in time.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "VALIDATION_ERROR",
                    message,
                },
            ),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "NOT_FOUND",
                    message,
                },
            ),
            AppError::Upstream(message) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: "UPSTREAM_ERROR",
                    message,
                },
            ),
            AppError::UpstreamTimeout(message) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorBody {
                    error: "UPSTREAM_TIMEOUT",
                    message,
                },
            ),
            AppError::Configuration(detail)
            | AppError::Schema(detail)
            | AppError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "INTERNAL_ERROR",
                        message: "Internal server error".to_string(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(format!("database error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout(err.to_string())
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}
