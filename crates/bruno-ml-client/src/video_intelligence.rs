//! Google Video Intelligence REST client.
//!
//! `videos:annotate` returns a long-running operation; callers poll it with
//! [`VideoIntelligenceClient::get_operation`] and read the annotation once
//! the operation is done. [`render_context`] turns the annotation into the
//! plain-text scene description consumed by prompt composition.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use bruno_models::RemoteStatusReport;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{BearerSource, TokenCache};
use crate::env_or;
use crate::error::{check_status, MlClientError, MlClientResult};

const SERVICE: &str = "video-intelligence";

/// Returned when the annotation renders to blank text.
pub const MINIMAL_ANALYSIS_FALLBACK: &str = "The video analysis returned minimal results. \
The video may be very short or contain limited visual content.";

const MAX_FRAME_LABELS: usize = 20;
const MAX_OBJECT_APPEARANCES: usize = 5;

#[derive(Debug, Clone)]
pub struct VideoIntelligenceConfig {
    /// API base, e.g. `https://videointelligence.googleapis.com/v1`
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for VideoIntelligenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://videointelligence.googleapis.com/v1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl VideoIntelligenceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("GCP_VIDEO_INTELLIGENCE_ENDPOINT").unwrap_or(defaults.endpoint),
            timeout: Duration::from_secs(env_or("GCP_REQUEST_TIMEOUT_SECS", 120)),
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateRequest {
    input_content: String,
    features: [&'static str; 3],
    video_context: VideoContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoContext {
    label_detection_config: LabelDetectionConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelDetectionConfig {
    label_detection_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct OperationName {
    name: String,
}

/// Long-running operation as returned by `GET /{name}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<AnnotateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateVideoResponse {
    #[serde(default)]
    pub annotation_results: Vec<AnnotationResult>,
}

/// Annotations for one input video.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResult {
    #[serde(default)]
    pub shot_annotations: Vec<VideoSegment>,
    #[serde(default)]
    pub shot_label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    pub frame_label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    pub object_annotations: Vec<ObjectTrackingAnnotation>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoSegment {
    /// Offsets are protobuf durations such as `"4.500s"`
    pub start_time_offset: Option<String>,
    pub end_time_offset: Option<String>,
}

impl VideoSegment {
    fn start(&self) -> f64 {
        parse_offset(self.start_time_offset.as_deref())
    }

    fn end(&self) -> f64 {
        parse_offset(self.end_time_offset.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Entity {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LabelAnnotation {
    #[serde(default)]
    pub entity: Entity,
    #[serde(default)]
    pub category_entities: Vec<Entity>,
    #[serde(default)]
    pub segments: Vec<LabelSegment>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LabelSegment {
    #[serde(default)]
    pub segment: VideoSegment,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObjectTrackingAnnotation {
    #[serde(default)]
    pub entity: Entity,
    #[serde(default)]
    pub segment: VideoSegment,
    #[serde(default)]
    pub confidence: f64,
}

impl Operation {
    /// Map the operation onto the generic remote status vocabulary.
    ///
    /// A finished operation's locator is its own name.
    pub fn status_report(&self) -> RemoteStatusReport {
        if !self.done {
            return RemoteStatusReport::processing();
        }
        match &self.error {
            Some(err) => {
                let message = if err.message.is_empty() {
                    format!("operation failed with code {}", err.code)
                } else {
                    err.message.clone()
                };
                RemoteStatusReport::error(message)
            }
            None => RemoteStatusReport::complete(self.name.clone()),
        }
    }

    /// First annotation result of a finished operation.
    pub fn annotation(&self) -> Option<&AnnotationResult> {
        self.response
            .as_ref()
            .and_then(|r| r.annotation_results.first())
    }
}

fn parse_offset(offset: Option<&str>) -> f64 {
    offset
        .map(|s| s.trim().trim_end_matches('s'))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Client for the Video Intelligence REST API.
pub struct VideoIntelligenceClient {
    client: Client,
    endpoint: String,
    credentials: Arc<dyn BearerSource>,
}

impl VideoIntelligenceClient {
    pub fn new(
        config: VideoIntelligenceConfig,
        credentials: Arc<dyn BearerSource>,
    ) -> MlClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Client authenticated with the service account from the environment.
    pub fn with_service_account(config: VideoIntelligenceConfig) -> MlClientResult<Self> {
        let tokens = TokenCache::from_env()?;
        Self::new(config, Arc::new(tokens))
    }

    /// Start annotating inline video bytes; returns the operation name.
    pub async fn annotate(&self, video: &[u8]) -> MlClientResult<String> {
        let body = AnnotateRequest {
            input_content: base64::engine::general_purpose::STANDARD.encode(video),
            features: ["LABEL_DETECTION", "SHOT_CHANGE_DETECTION", "OBJECT_TRACKING"],
            video_context: VideoContext {
                label_detection_config: LabelDetectionConfig {
                    label_detection_mode: "SHOT_AND_FRAME_MODE",
                },
            },
        };

        let token = self.credentials.bearer().await?;
        let response = self
            .client
            .post(format!("{}/videos:annotate", self.endpoint))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let op: OperationName = response
            .json()
            .await
            .map_err(|e| MlClientError::invalid_response(SERVICE, e.to_string()))?;
        if op.name.is_empty() {
            return Err(MlClientError::invalid_response(SERVICE, "operation has no name"));
        }

        info!(operation = %op.name, bytes = video.len(), "video annotation started");
        Ok(op.name)
    }

    pub async fn get_operation(&self, name: &str) -> MlClientResult<Operation> {
        let token = self.credentials.bearer().await?;
        let response = self
            .client
            .get(format!("{}/{}", self.endpoint, name))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let mut op: Operation = response
            .json()
            .await
            .map_err(|e| MlClientError::invalid_response(SERVICE, e.to_string()))?;
        if op.name.is_empty() {
            op.name = name.to_string();
        }
        debug!(operation = %name, done = op.done, "operation polled");
        Ok(op)
    }

    pub async fn cancel_operation(&self, name: &str) -> MlClientResult<()> {
        let token = self.credentials.bearer().await?;
        let response = self
            .client
            .post(format!("{}/{}:cancel", self.endpoint, name))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check_status(SERVICE, response).await?;
        info!(operation = %name, "operation cancelled");
        Ok(())
    }
}

/// Render an annotation as the sectioned text handed to prompt composition.
///
/// Never returns blank text: an empty rendering becomes
/// [`MINIMAL_ANALYSIS_FALLBACK`].
pub fn render_context(annotation: &AnnotationResult) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !annotation.shot_annotations.is_empty() {
        parts.push("=== SCENE BREAKDOWN ===".to_string());
        for (i, shot) in annotation.shot_annotations.iter().enumerate() {
            parts.push(format!("Scene {}: {:.1}s - {:.1}s", i + 1, shot.start(), shot.end()));
        }
    }

    if !annotation.shot_label_annotations.is_empty() {
        parts.push("\n=== DETECTED LABELS (per scene) ===".to_string());
        for label in &annotation.shot_label_annotations {
            let categories: Vec<&str> = label
                .category_entities
                .iter()
                .map(|c| c.description.as_str())
                .collect();
            if categories.is_empty() {
                parts.push(format!("Label: {}", label.entity.description));
            } else {
                parts.push(format!(
                    "Label: {} (categories: {})",
                    label.entity.description,
                    categories.join(", ")
                ));
            }
            for seg in &label.segments {
                parts.push(format!(
                    "  {:.1}s-{:.1}s (confidence: {:.2})",
                    seg.segment.start(),
                    seg.segment.end(),
                    seg.confidence
                ));
            }
        }
    }

    if !annotation.frame_label_annotations.is_empty() {
        parts.push("\n=== FRAME-LEVEL LABELS ===".to_string());
        for label in annotation.frame_label_annotations.iter().take(MAX_FRAME_LABELS) {
            parts.push(format!("- {}", label.entity.description));
        }
    }

    if !annotation.object_annotations.is_empty() {
        parts.push("\n=== TRACKED OBJECTS ===".to_string());

        // Group by name, first-seen order
        let mut grouped: Vec<(&str, Vec<String>)> = Vec::new();
        for obj in &annotation.object_annotations {
            let line = format!(
                "  {:.1}s-{:.1}s (confidence: {:.2})",
                obj.segment.start(),
                obj.segment.end(),
                obj.confidence
            );
            let name = obj.entity.description.as_str();
            match grouped.iter_mut().find(|(n, _)| *n == name) {
                Some((_, lines)) => lines.push(line),
                None => grouped.push((name, vec![line])),
            }
        }

        for (name, appearances) in grouped {
            parts.push(format!("Object: {}", name));
            parts.extend(appearances.into_iter().take(MAX_OBJECT_APPEARANCES));
        }
    }

    let context = parts.join("\n");
    if context.trim().is_empty() {
        MINIMAL_ANALYSIS_FALLBACK.to_string()
    } else {
        context
    }
}
