//! Persisted output download.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serve a finished video from the output directory.
pub async fn get_output(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let path = state.orchestrator.config().output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("could not read output: {}", e))),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", filename)),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// A bare file name: no separators, no parent references, not hidden.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '"'])
        && !name.contains("..")
}
