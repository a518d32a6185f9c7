//! API error types.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bruno_pipeline::PipelineError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Set from `ApiConfig::is_production` when the app state is built.
static REDACT_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

pub fn redact_internal_errors(enabled: bool) {
    REDACT_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Admission budget exhausted for this caller.
    #[error("Rate limit exceeded: {limit}")]
    RateLimited { limit: String, retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Pipeline(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details are hidden in production.
    fn detail(&self, redact_internal: bool) -> String {
        match self {
            ApiError::Internal(_) if redact_internal => "An internal error occurred".to_string(),
            ApiError::Pipeline(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = self.detail(REDACT_INTERNAL_ERRORS.load(Ordering::Relaxed));

        let body = Json(ErrorResponse { detail });

        match &self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
