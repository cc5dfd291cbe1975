//! Perplexity Sonar API client
//!
//! Implements [`SearchTransport`] against the chat completions endpoint.
//! Streaming responses arrive as OpenAI-style SSE chunks; the non-streaming
//! variant backs summarization calls.

use crate::error::{SeekerError, SeekerResult};
use crate::llm::messages::WireMessage;
use crate::llm::sse::{DONE_MARKER, SseDecoder};
use crate::llm::transport::{SearchTransport, TextStream};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Chat completions endpoint
pub const API_URL: &str = "https://api.perplexity.ai/chat/completions";

/// Models accepted by the endpoint
pub const AVAILABLE_MODELS: &[&str] =
    &["sonar", "sonar-pro", "sonar-reasoning", "sonar-reasoning-pro"];

/// Default model
pub const DEFAULT_MODEL: &str = "sonar-pro";

/// Whether `model` names a known Sonar model
pub fn is_available_model(model: &str) -> bool {
    AVAILABLE_MODELS.contains(&model)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the Sonar chat completions API
pub struct SonarClient {
    http: reqwest::Client,
    api_key: String,
    model: RwLock<String>,
    max_output_tokens: usize,
}

impl SonarClient {
    /// Create a client
    ///
    /// `max_output_tokens` bounds every completion this client requests,
    /// streaming or not.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_output_tokens: usize,
    ) -> SeekerResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SeekerError::config("API key must not be empty"));
        }

        let model = model.into();
        if !is_available_model(&model) {
            return Err(SeekerError::config(format!(
                "unknown model '{model}', expected one of {AVAILABLE_MODELS:?}"
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SeekerError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            model: RwLock::new(model),
            max_output_tokens,
        })
    }

    /// Currently selected model
    pub fn model(&self) -> String {
        self.model.read().expect("model lock poisoned").clone()
    }

    /// Switch models; subsequent requests use the new model
    pub fn set_model(&self, model: impl Into<String>) -> SeekerResult<()> {
        let model = model.into();
        if !is_available_model(&model) {
            return Err(SeekerError::config(format!(
                "unknown model '{model}', expected one of {AVAILABLE_MODELS:?}"
            )));
        }
        *self.model.write().expect("model lock poisoned") = model;
        Ok(())
    }

    fn request(
        &self,
        conversation: &[WireMessage],
        stream: bool,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        let model = self.model();
        let request = ChatRequest {
            model: &model,
            messages: conversation,
            stream,
            max_tokens: Some(self.max_output_tokens),
        };

        let mut builder = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> SeekerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SeekerError::transport_status(
            format!("HTTP {status}: {body}"),
            status.as_u16(),
        ))
    }
}

#[async_trait]
impl SearchTransport for SonarClient {
    async fn stream(&self, conversation: &[WireMessage]) -> SeekerResult<TextStream> {
        debug!(
            messages = conversation.len(),
            model = %self.model(),
            "opening streaming completion"
        );

        let response = self.request(conversation, true, None).send().await?;
        let response = Self::check_status(response).await?;

        let mut decoder = SseDecoder::new();
        let mut done = false;

        let stream = response.bytes_stream().flat_map(move |chunk_result| {
            let items: Vec<SeekerResult<String>> = match chunk_result {
                Ok(bytes) if !done => decoder
                    .feed(&bytes)
                    .into_iter()
                    .filter_map(|payload| {
                        if payload == DONE_MARKER {
                            done = true;
                            return None;
                        }
                        let parsed: StreamPayload = match serde_json::from_str(&payload) {
                            Ok(parsed) => parsed,
                            // non-JSON keep-alive payload
                            Err(_) => return None,
                        };
                        parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content)
                            .filter(|content| !content.is_empty())
                            .map(Ok)
                    })
                    .collect(),
                Ok(_) => Vec::new(),
                Err(e) => vec![Err(SeekerError::transport(format!("stream error: {e}")))],
            };
            futures::stream::iter(items)
        });

        Ok(Box::pin(stream))
    }

    async fn complete(&self, conversation: &[WireMessage]) -> SeekerResult<String> {
        debug!(
            messages = conversation.len(),
            model = %self.model(),
            "requesting blocking completion"
        );

        let response = self
            .request(conversation, false, Some(Duration::from_secs(60)))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| SeekerError::transport("response contained no choices"))
    }
}
