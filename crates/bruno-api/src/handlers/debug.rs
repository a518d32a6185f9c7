//! Partial pipeline runs for debugging prompts.

use axum::extract::{Multipart, State};
use axum::Json;
use bruno_pipeline::{AnalysisOutput, CancelSignal, PromptOutput};
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::upload::receive_video;

/// Analysis text and duration of the uploaded video.
pub async fn analyze_only(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<AnalysisOutput>> {
    let request = receive_video(&mut multipart, &state.orchestrator.config().work_dir).await?;
    let output = state
        .orchestrator
        .analyze_only(request, CancelSignal::never())
        .await?;

    debug!(duration = output.duration, context = %output.context, "analysis context");
    Ok(Json(output))
}

/// Analysis plus the generated music prompt; no audio is generated.
pub async fn prompt_only(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PromptOutput>> {
    let request = receive_video(&mut multipart, &state.orchestrator.config().work_dir).await?;
    let output = state
        .orchestrator
        .prompt_only(request, CancelSignal::never())
        .await?;

    debug!(tags = %output.tags, prompt = %output.suno_prompt, "generated prompt");
    Ok(Json(output))
}
