//! Suno music generation client.
//!
//! Generation is asynchronous: `submit` returns a clip id, `clip_status`
//! reports progress, and `download` fetches the finished audio. The service
//! has no duration parameter and no cancellation endpoint.

use std::path::Path;
use std::time::Duration;

use bruno_models::{RemoteJobStatus, RemoteStatusReport};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::env_or;
use crate::error::{check_status, MlClientError, MlClientResult};

const SERVICE: &str = "suno";

#[derive(Debug, Clone)]
pub struct SunoConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://studio-api.prod.suno.com/api/v2/external/hackathons".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl SunoConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SUNO_API_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("SUNO_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(env_or("SUNO_TIMEOUT_SECS", 60)),
        }
    }
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub tags: String,
    pub make_instrumental: bool,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_tags: Option<String>,
}

impl GenerateRequest {
    /// `duration` only labels the title.
    pub fn new(
        prompt: impl Into<String>,
        tags: impl Into<String>,
        negative_tags: Option<String>,
        duration: Option<f64>,
    ) -> Self {
        let title = match duration {
            Some(d) if d > 0.0 => format!("Bruno AI Generation ({:.0}s)", d),
            _ => "Bruno AI Generation".to_string(),
        };
        Self {
            prompt: prompt.into(),
            tags: tags.into(),
            make_instrumental: false,
            title,
            negative_tags: negative_tags.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Clip {
    #[serde(default)]
    status: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    metadata: Option<ClipMetadata>,
}

#[derive(Debug, Deserialize)]
struct ClipMetadata {
    #[serde(default)]
    error_message: Option<String>,
}

impl Clip {
    fn status_report(&self) -> RemoteStatusReport {
        match self.status.as_str() {
            // A missing audio_url stays Complete so the poller can reject it.
            "complete" => RemoteStatusReport {
                status: RemoteJobStatus::Complete,
                result_locator: self.audio_url.clone().filter(|u| !u.trim().is_empty()),
                error_message: None,
            },
            "error" => RemoteStatusReport::error(
                self.metadata
                    .as_ref()
                    .and_then(|m| m.error_message.clone())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            "submitted" => RemoteStatusReport::submitted(),
            _ => RemoteStatusReport::processing(),
        }
    }
}

/// File extension for a downloaded clip, guessed from its URL.
pub fn audio_extension(url: &str) -> &'static str {
    if url.contains("wav") {
        "wav"
    } else if url.contains("mp4") {
        "mp4"
    } else {
        "mp3"
    }
}

pub struct SunoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SunoClient {
    pub fn new(config: SunoConfig) -> MlClientResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| MlClientError::config("SUNO_API_KEY is not configured"))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Submit a generation request; returns the clip id.
    pub async fn submit(&self, request: &GenerateRequest) -> MlClientResult<String> {
        debug!(tags = %request.tags, negative_tags = ?request.negative_tags, "submitting generation");

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| MlClientError::invalid_response(SERVICE, e.to_string()))?;
        let id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MlClientError::invalid_response(SERVICE, "generate response has no id"))?;

        info!(clip_id = %id, "generation submitted");
        Ok(id)
    }

    /// Current status of a clip. A clip not yet visible reads as submitted.
    pub async fn clip_status(&self, id: &str) -> MlClientResult<RemoteStatusReport> {
        let response = self
            .client
            .get(format!("{}/clips", self.base_url))
            .query(&[("ids", id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let clips: Vec<Clip> = response
            .json()
            .await
            .map_err(|e| MlClientError::invalid_response(SERVICE, e.to_string()))?;

        Ok(clips
            .first()
            .map(Clip::status_report)
            .unwrap_or_else(RemoteStatusReport::submitted))
    }

    pub async fn cancel(&self, _id: &str) -> MlClientResult<()> {
        Err(MlClientError::Unsupported("clip cancellation"))
    }

    /// Stream the clip at `url` into `dest`; returns bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> MlClientResult<u64> {
        let response = self.client.get(url).send().await?;
        let response = check_status(SERVICE, response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MlClientError::invalid_response(SERVICE, "downloaded clip is empty"));
        }

        info!(bytes = written, dest = %dest.display(), "clip downloaded");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SunoClient {
        SunoClient::new(SunoConfig {
            base_url: server.uri(),
            api_key: Some("suno-key".into()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_generate_request_title_and_negative_tags() {
        let req = GenerateRequest::new("lyrics", "Pop, 100 BPM", Some(" ".into()), Some(17.4));
        assert_eq!(req.title, "Bruno AI Generation (17s)");
        assert_eq!(req.negative_tags, None);
        assert!(!req.make_instrumental);

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("negative_tags").is_none());
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension("https://cdn1.suno.ai/abc.wav"), "wav");
        assert_eq!(audio_extension("https://cdn1.suno.ai/abc.mp4"), "mp4");
        assert_eq!(audio_extension("https://cdn1.suno.ai/abc"), "mp3");
    }

    #[tokio::test]
    async fn test_submit_posts_payload() {
        let server = MockServer::start().await;
        let req = GenerateRequest::new("lyrics", "Pop, 100 BPM", Some("harsh".into()), Some(20.0));

        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("authorization", "Bearer suno-key"))
            .and(body_json(serde_json::json!({
                "prompt": "lyrics",
                "tags": "Pop, 100 BPM",
                "make_instrumental": false,
                "title": "Bruno AI Generation (20s)",
                "negative_tags": "harsh"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "clip-1", "status": "submitted"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).submit(&req).await.unwrap(), "clip-1");
    }

    #[tokio::test]
    async fn test_submit_without_id_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let req = GenerateRequest::new("p", "t", None, None);
        let err = client(&server).submit(&req).await.unwrap_err();
        assert!(matches!(err, MlClientError::InvalidResponse { .. }));
    }

    async fn status_for(body: serde_json::Value) -> RemoteStatusReport {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clips"))
            .and(query_param("ids", "clip-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        client(&server).clip_status("clip-1").await.unwrap()
    }

    #[tokio::test]
    async fn test_clip_status_mapping() {
        let empty = status_for(serde_json::json!([])).await;
        assert_eq!(empty.status, RemoteJobStatus::Submitted);

        let streaming = status_for(serde_json::json!([{"status": "streaming"}])).await;
        assert_eq!(streaming.status, RemoteJobStatus::Processing);

        let complete = status_for(serde_json::json!([
            {"status": "complete", "audio_url": "https://cdn.example/clip.mp3"}
        ]))
        .await;
        assert_eq!(
            complete,
            RemoteStatusReport::complete("https://cdn.example/clip.mp3")
        );

        let no_url = status_for(serde_json::json!([{"status": "complete"}])).await;
        assert_eq!(no_url.status, RemoteJobStatus::Complete);
        assert_eq!(no_url.result_locator, None);

        let blank_url =
            status_for(serde_json::json!([{"status": "complete", "audio_url": ""}])).await;
        assert_eq!(blank_url.status, RemoteJobStatus::Complete);
        assert_eq!(blank_url.result_locator, None);

        let failed = status_for(serde_json::json!([
            {"status": "error", "metadata": {"error_message": "moderation"}}
        ]))
        .await;
        assert_eq!(failed, RemoteStatusReport::error("moderation"));

        let unknown = status_for(serde_json::json!([{"status": "error"}])).await;
        assert_eq!(unknown.error_message.as_deref(), Some("Unknown error"));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/audio/clip.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("suno_clip.mp3");
        let written = client(&server)
            .download(&format!("{}/audio/clip.mp3", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 1024);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_cancel_is_unsupported() {
        let server = MockServer::start().await;
        let err = client(&server).cancel("clip-1").await.unwrap_err();
        assert!(matches!(err, MlClientError::Unsupported(_)));
    }
}
