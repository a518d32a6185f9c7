//! Router-level tests with scripted pipeline stages.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bruno_api::{create_router, ApiConfig, AppState};
use bruno_media::{ArtifactJanitor, TransientArtifact};
use bruno_models::{ArtifactKind, PromptBundle, SectionTimings, Stage};
use bruno_pipeline::{
    AudioGenerator, CancelSignal, DurationProbe, MediaMerger, Orchestrator, PipelineConfig,
    PipelineError, PromptComposer, StageResult, StageSet, VideoAnalyzer,
};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "bruno-test-boundary";

struct Stub {
    duration: f64,
    fail_at: Option<Stage>,
    probes: AtomicUsize,
}

impl Stub {
    fn check(&self, stage: Stage) -> StageResult<()> {
        match self.fail_at {
            Some(s) if s == stage => Err(PipelineError::stage_failed(stage, "scripted failure")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DurationProbe for Stub {
    async fn duration(&self, _video: &Path) -> StageResult<f64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.duration)
    }
}

#[async_trait]
impl VideoAnalyzer for Stub {
    async fn analyze(&self, _video: &TransientArtifact, _cancel: &CancelSignal) -> StageResult<String> {
        self.check(Stage::Analyze)?;
        Ok("=== SCENE BREAKDOWN ===\nScene 1: 0.0s - 8.0s".to_string())
    }
}

#[async_trait]
impl PromptComposer for Stub {
    async fn compose(
        &self,
        _context: &str,
        _duration: f64,
        _timings: &SectionTimings,
    ) -> StageResult<PromptBundle> {
        self.check(Stage::ComposePrompt)?;
        Ok(PromptBundle {
            prompt: "[Intro - 0 to 2 seconds]\nPop, 100 BPM".to_string(),
            tags: "Pop, 100 BPM".to_string(),
            negative_tags: "harsh".to_string(),
            tags_defaulted: false,
            negative_tags_defaulted: false,
        })
    }
}

#[async_trait]
impl AudioGenerator for Stub {
    async fn generate(
        &self,
        _bundle: &PromptBundle,
        _duration: f64,
        janitor: &ArtifactJanitor,
        _cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact> {
        self.check(Stage::GenerateAudio)?;
        let audio = janitor.acquire(ArtifactKind::GeneratedAudio)?;
        tokio::fs::write(audio.path(), b"audio").await.unwrap();
        Ok(audio)
    }
}

#[async_trait]
impl MediaMerger for Stub {
    async fn merge(
        &self,
        _video: &TransientArtifact,
        _audio: &TransientArtifact,
        janitor: &ArtifactJanitor,
        _cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact> {
        self.check(Stage::Merge)?;
        let merged = janitor.acquire(ArtifactKind::MergedVideo)?;
        tokio::fs::write(merged.path(), b"merged video").await.unwrap();
        Ok(merged)
    }
}

struct TestApp {
    router: Router,
    stub: Arc<Stub>,
    work: TempDir,
    outputs: TempDir,
}

impl TestApp {
    fn new(duration: f64, fail_at: Option<Stage>) -> Self {
        let work = TempDir::new().unwrap();
        let outputs = TempDir::new().unwrap();
        let stub = Arc::new(Stub {
            duration,
            fail_at,
            probes: AtomicUsize::new(0),
        });

        let pipeline = PipelineConfig {
            work_dir: work.path().to_path_buf(),
            output_dir: outputs.path().to_path_buf(),
            ..Default::default()
        };
        let stages = StageSet {
            probe: stub.clone(),
            analyzer: stub.clone(),
            composer: stub.clone(),
            generator: stub.clone(),
            merger: stub.clone(),
        };
        let state = AppState::with_orchestrator(ApiConfig::default(), Orchestrator::new(pipeline, stages));

        Self {
            router: create_router(state, None),
            stub,
            work,
            outputs,
        }
    }

    async fn post_video(&self, uri: &str, content_type: &str, caller: &str) -> Response {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"video\"; filename=\"beach.mp4\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             fake video bytes\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header("X-Forwarded-For", caller)
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn work_entries(&self) -> usize {
        std::fs::read_dir(self.work.path()).unwrap().count()
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn detail(response: Response) -> String {
    let value: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    value["detail"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(8.0, None);
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_rejects_non_video_upload() {
    let app = TestApp::new(8.0, None);
    let response = app.post_video("/api/generate-stream", "text/plain", "10.1.0.1").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(response).await, "Please upload a valid video file");
    assert_eq!(app.stub.probes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_emits_ordered_records() {
    let app = TestApp::new(8.0, None);
    let response = app.post_video("/api/generate-stream", "video/mp4", "10.1.0.2").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let text = body_text(response).await;
    let records: Vec<serde_json::Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|json| serde_json::from_str(json).unwrap())
        .collect();

    assert_eq!(
        records.first().unwrap(),
        &serde_json::json!({"stage": "uploading", "message": "Video uploaded successfully", "progress": 10})
    );
    let last = records.last().unwrap();
    assert_eq!(last["stage"], "done");
    assert_eq!(last["progress"], 100);
    assert_eq!(last["message"], "Complete! File: output_beach.mp4");

    let progress: Vec<u64> = records.iter().map(|r| r["progress"].as_u64().unwrap()).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    assert!(app.outputs.path().join("output_beach.mp4").exists());
    assert_eq!(app.work_entries(), 0);
}

#[tokio::test]
async fn test_stream_reports_stage_failure() {
    let app = TestApp::new(8.0, Some(Stage::GenerateAudio));
    let text = body_text(app.post_video("/api/generate-stream", "video/mp4", "10.1.0.3").await).await;

    let last: serde_json::Value = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .last()
        .map(|json| serde_json::from_str(json).unwrap())
        .unwrap();
    assert_eq!(last["stage"], "error");
    assert_eq!(last["progress"], 0);
    assert_eq!(last["message"], "Audio generation failed: scripted failure");
    assert_eq!(app.work_entries(), 0);
}

#[tokio::test]
async fn test_generate_returns_video() {
    let app = TestApp::new(8.0, None);
    let response = app.post_video("/api/generate", "video/mp4", "10.1.0.4").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"with_audio_beach.mp4\""
    );
    assert_eq!(body_text(response).await, "merged video");
}

#[tokio::test]
async fn test_generate_failure_names_the_stage() {
    let app = TestApp::new(8.0, Some(Stage::Merge));
    let response = app.post_video("/api/generate", "video/mp4", "10.1.0.5").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(detail(response).await, "Media combination failed: scripted failure");
    assert_eq!(app.work_entries(), 0);
}

#[tokio::test]
async fn test_too_long_video_is_bad_request() {
    let app = TestApp::new(90.0, None);
    let response = app.post_video("/api/generate", "video/mp4", "10.1.0.6").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        detail(response).await,
        "Video is too long (90.0s). Maximum allowed duration is 60 seconds."
    );
}

#[tokio::test]
async fn test_fourth_run_is_rate_limited() {
    let app = TestApp::new(8.0, None);
    for _ in 0..3 {
        let response = app.post_video("/api/generate", "video/mp4", "10.2.0.1").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.post_video("/api/generate", "video/mp4", "10.2.0.1").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(detail(response).await, "Rate limit exceeded: 3 per 1 hour");
    assert_eq!(app.stub.probes.load(Ordering::SeqCst), 3);

    // Another caller still has its own budget.
    let response = app.post_video("/api/generate", "video/mp4", "10.2.0.2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_debug_budget_is_separate() {
    let app = TestApp::new(8.0, None);
    for _ in 0..3 {
        app.post_video("/api/generate", "video/mp4", "10.3.0.1").await;
    }

    let response = app.post_video("/api/prompt-only", "video/mp4", "10.3.0.1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["tags"], "Pop, 100 BPM");
    assert_eq!(body["duration"], 8.0);

    for _ in 0..4 {
        let response = app.post_video("/api/analyze-only", "video/mp4", "10.3.0.1").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.post_video("/api/analyze-only", "video/mp4", "10.3.0.1").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_outputs_route() {
    let app = TestApp::new(8.0, None);
    std::fs::write(app.outputs.path().join("output_x.mp4"), b"done").unwrap();

    let found = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/outputs/output_x.mp4").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(body_text(found).await, "done");

    let missing = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/outputs/nope.mp4").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(detail(missing).await, "File not found");
}
