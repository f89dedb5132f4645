//! OpenAI chat-completion client.
//!
//! Calls `/v1/chat/completions` directly with `reqwest`. Streaming responses
//! are read as server-sent events and reduced to the text deltas.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{Llm, TextStream};
use crate::message::ChatMessage;

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "OpenAI";

/// Configuration for [`OpenAIChatClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    /// Maximum wait between two stream fragments. `None` waits forever.
    pub stream_idle_timeout: Option<Duration>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
            temperature: None,
            stream_idle_timeout: None,
        }
    }

    /// Point the client at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }
}

/// OpenAI client for the chat-completions API and compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAIChatClient {
    client: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAIChatClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if the API key or model is empty.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ModelError::Config("OpenAI API key must not be empty".into()));
        }
        if config.model.is_empty() {
            return Err(ModelError::Config("model name must not be empty".into()));
        }
        Ok(Self { client: reqwest::Client::new(), config })
    }

    /// Create a client sharing an existing `reqwest` connection pool.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, model = %self.config.model, error = %e, "request failed");
                ModelError::Request { provider: PROVIDER.into(), message: e.to_string() }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            error!(provider = PROVIDER, model = %self.config.model, %status, "API error");
            return Err(ModelError::from_status(PROVIDER, status.as_u16(), detail));
        }

        Ok(response)
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Extract the provider's error message, falling back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map(|e| e.error.message).unwrap_or_else(|_| body.to_string())
}

/// Decode one SSE `data` payload into its text delta.
///
/// Returns `Ok(None)` for the `[DONE]` terminator.
fn decode_chunk(data: &str) -> Result<Option<String>> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| ModelError::InvalidResponse {
        provider: PROVIDER.into(),
        message: format!("failed to parse stream chunk: {e}"),
    })?;
    let text = chunk.choices.into_iter().filter_map(|c| c.delta.content).collect::<String>();
    Ok(Some(text))
}

/// Turn a byte stream of SSE events into answer fragments.
fn text_fragments<S, B, E>(bytes: S, idle_timeout: Option<Duration>) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    try_stream! {
        let mut events = Box::pin(bytes.eventsource());
        loop {
            let next = match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, events.next())
                    .await
                    .map_err(|_| ModelError::StreamTimeout(limit))?,
                None => events.next().await,
            };
            let Some(event) = next else { break };
            let event = event.map_err(|e| ModelError::InvalidResponse {
                provider: PROVIDER.into(),
                message: format!("failed to read stream event: {e}"),
            })?;
            match decode_chunk(&event.data)? {
                None => break,
                Some(text) if text.is_empty() => continue,
                Some(text) => yield text,
            }
        }
    }
}

// ── Llm implementation ─────────────────────────────────────────────

#[async_trait]
impl Llm for OpenAIChatClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.config.model, message_count = messages.len(), "chat completion");

        let response = self.send(messages, false).await?;
        let completion: ChatCompletion = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            ModelError::InvalidResponse {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: PROVIDER.into(),
                message: "API returned no choices".into(),
            })
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        debug!(provider = PROVIDER, model = %self.config.model, message_count = messages.len(), "streaming chat completion");

        let response = self.send(messages, true).await?;
        Ok(Box::pin(text_fragments(response.bytes_stream(), self.config.stream_idle_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let err = OpenAIChatClient::new(OpenAIConfig::new("", "gpt-4")).unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn request_omits_stream_flag_when_false() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest { model: "gpt-4", messages: &messages, temperature: None, stream: false };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn error_detail_prefers_provider_message() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(error_detail(body), "Rate limit reached");
        assert_eq!(error_detail("upstream exploded"), "upstream exploded");
    }

    #[test]
    fn decode_chunk_handles_delta_and_done() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(decode_chunk(data).unwrap(), Some("Hel".to_string()));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(decode_chunk(role_only).unwrap(), Some(String::new()));
        assert_eq!(decode_chunk(" [DONE] ").unwrap(), None);
        assert!(decode_chunk("not json").is_err());
    }

    #[tokio::test]
    async fn text_fragments_skip_empty_deltas_and_stop_at_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        let bytes = futures::stream::iter(vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())]);
        let fragments: Vec<String> = text_fragments(bytes, None)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hello".to_string(), " world".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn text_fragments_time_out_when_idle() {
        let bytes = futures::stream::pending::<std::result::Result<Vec<u8>, std::io::Error>>();
        let mut fragments = Box::pin(text_fragments(bytes, Some(Duration::from_secs(5))));
        let first = fragments.next().await.unwrap();
        assert_eq!(first, Err(ModelError::StreamTimeout(Duration::from_secs(5))));
    }
}
