//! OpenAI chat completions client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env_or;
use crate::error::{check_status, MlClientError, MlClientResult};

const SERVICE: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Sampling temperature of the prompt request
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sampling temperature of the negative-tag request
    pub negative_temperature: f32,
    pub negative_max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            temperature: 0.75,
            max_tokens: 800,
            negative_temperature: 0.4,
            negative_max_tokens: 50,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_API_BASE").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(env_or("OPENAI_TIMEOUT_SECS", 60)),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> MlClientResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| MlClientError::config("OPENAI_API_KEY is not configured"))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Run one chat completion and return the trimmed reply text.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> MlClientResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MlClientError::invalid_response(SERVICE, e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        debug!(model = %self.config.model, chars = text.len(), "chat completion received");
        Ok(text)
    }
}
