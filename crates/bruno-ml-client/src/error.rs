//! Error types for remote service clients.

use thiserror::Error;

pub type MlClientResult<T> = Result<T, MlClientError>;

#[derive(Debug, Error)]
pub enum MlClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{0} is not supported by this service")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MlClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(service: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: msg.into(),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MlClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MlClientError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Turn a non-success response into `MlClientError::Api`.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> MlClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no body").to_string()
    } else {
        body.chars().take(500).collect()
    };

    Err(MlClientError::Api {
        service,
        status: status.as_u16(),
        message,
    })
}
