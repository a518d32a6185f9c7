//! Pipeline entry points: streaming (SSE) and non-streaming.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use bruno_models::{ProgressEvent, Stage};
use bruno_pipeline::{
    cancel_pair, progress_channel, CancelGuard, CancelSignal, PipelineError, ProgressReporter,
};
use futures_util::Stream;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use crate::upload::receive_video;

/// Run the pipeline and stream its progress records as server-sent events.
///
/// The run continues in its own task; dropping the stream (client
/// disconnect) fires the run's cancel signal.
pub async fn generate_stream(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let request = receive_video(&mut multipart, &state.orchestrator.config().work_dir).await?;

    let (reporter, rx) = progress_channel();
    let (guard, signal) = cancel_pair();
    let orchestrator = Arc::clone(&state.orchestrator);

    tokio::spawn(async move {
        match orchestrator.run(request, reporter, signal).await {
            Ok(run) => info!(
                job_id = %run.job.id,
                output = %run.output.display(),
                "streamed run complete"
            ),
            Err(e) => warn!(stage = ?e.stage(), error = %e, "streamed run failed"),
        }
    });

    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(progress_stream(rx, guard)).keep_alive(KeepAlive::default()),
    ))
}

/// Stream state; owns the cancel guard for as long as the client listens.
struct OpenStream {
    rx: mpsc::Receiver<ProgressEvent>,
    _cancel: CancelGuard,
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        metrics::sse_stream_closed();
    }
}

fn progress_stream(
    rx: mpsc::Receiver<ProgressEvent>,
    cancel: CancelGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    metrics::sse_stream_opened();
    let open = OpenStream { rx, _cancel: cancel };

    futures_util::stream::unfold(open, |mut open| async move {
        let record = open.rx.recv().await?;
        let event = match serde_json::to_string(&record) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                warn!(error = %e, "progress record not serializable");
                Event::default().comment("unserializable progress record")
            }
        };
        Some((Ok(event), open))
    })
}

/// Run the pipeline and answer with the finished MP4.
pub async fn generate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let request = receive_video(&mut multipart, &state.orchestrator.config().work_dir).await?;

    let run = state
        .orchestrator
        .run(request, ProgressReporter::disabled(), CancelSignal::never())
        .await?;

    let mut bytes = Vec::new();
    let mut video = run.video;
    video.read_to_end(&mut bytes).await.map_err(|e| {
        PipelineError::stage_failed(Stage::Merge, format!("Output file was not readable: {}", e))
    })?;
    if bytes.is_empty() {
        return Err(PipelineError::stage_failed(Stage::Merge, "Output file is empty").into());
    }

    info!(job_id = %run.job.id, bytes = bytes.len(), "returning merged video");

    let disposition = format!("inline; filename=\"with_audio_{}.mp4\"", run.job.output_stem());
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        bytes,
    )
        .into_response())
}
