//! OpenAI-compatible chat-completions client.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use boardroom_core::BackendSettings;

use crate::backend::{CompletionBackend, EventStream};
use crate::error::{Error, Result};
use crate::sse::{SseData, SseDecoder};
use crate::types::{Completion, CompletionRequest, Message, StreamEvent, TokenUsage};

const STREAM_BUFFER: usize = 64;

/// Client for any server speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiBackend {
    settings: Arc<BackendSettings>,
    endpoint: Url,
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a client, reading the API key from the environment variable
    /// named by `settings.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingApiKey` if the variable is unset or empty, or a
    /// configuration error if the base URL is invalid.
    pub fn from_settings(settings: BackendSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::missing_api_key(&settings.api_key_env))?;
        Self::with_api_key(settings, api_key)
    }

    /// Create a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn with_api_key(settings: BackendSettings, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        ))?;

        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::connection_failed(e.to_string()))?;

        Ok(Self {
            settings: Arc::new(settings),
            endpoint,
            api_key: api_key.into(),
            http_client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: request.model.as_deref().unwrap_or(&self.settings.model),
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::connection_failed(e.to_string())
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::invalid_response(format!("Failed to read error body: {e}")))?;
        warn!(status = status.as_u16(), "Chat completion request rejected");
        Err(Error::api(status.as_u16(), text))
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn default_model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = self.body(&request, false);
        info!(model = body.model, messages = body.messages.len(), "Requesting completion");
        let start = Instant::now();

        let response: ChatResponse = self.send(&body).await?.json().await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::invalid_response("response has no message content"))?;
        let usage = response.usage.map(TokenUsage::from).unwrap_or_default();

        debug!(
            model = %response.model,
            duration_ms = start.elapsed().as_millis(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Completion received"
        );

        Ok(Completion {
            text,
            model: response.model,
            usage,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let body = self.body(&request, true);
        info!(model = body.model, messages = body.messages.len(), "Starting streamed completion");

        let requested_model = body.model.to_string();
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(STREAM_BUFFER);
        tokio::spawn(pump_events(response, requested_model, tx));

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}

/// Decode the SSE body and forward events until `[DONE]`, an error, or the
/// receiver going away.
async fn pump_events(
    response: reqwest::Response,
    requested_model: String,
    tx: mpsc::Sender<Result<StreamEvent>>,
) {
    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(next) = bytes.next().await {
        match next {
            Ok(chunk) => {
                for data in decoder.feed(&chunk) {
                    if forward(&tx, data, &requested_model).await.is_break() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(Error::stream_error(e.to_string()))).await;
                return;
            }
        }
    }

    if let Some(data) = decoder.finish() {
        if forward(&tx, data, &requested_model).await.is_break() {
            return;
        }
    }
    debug!(model = %requested_model, "Event stream closed without end marker");
}

async fn forward(
    tx: &mpsc::Sender<Result<StreamEvent>>,
    data: SseData,
    requested_model: &str,
) -> ControlFlow<()> {
    let payload = match data {
        SseData::Done => {
            let _ = tx.send(Ok(StreamEvent::Done)).await;
            return ControlFlow::Break(());
        }
        SseData::Json(payload) => payload,
    };

    let chunk: ChatChunk = match serde_json::from_str(&payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            let _ = tx.send(Err(Error::Json(e))).await;
            return ControlFlow::Break(());
        }
    };

    let model = chunk
        .model
        .unwrap_or_else(|| requested_model.to_string());
    let deltas = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map(StreamEvent::Delta);
    let usage = chunk.usage.map(|usage| StreamEvent::Usage {
        model,
        usage: usage.into(),
    });

    for event in deltas.chain(usage) {
        if tx.send(Ok(event)).await.is_err() {
            warn!("Stream receiver dropped");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn settings(base_url: &str) -> BackendSettings {
        BackendSettings {
            base_url: base_url.to_string(),
            ..BackendSettings::default()
        }
    }

    #[test]
    fn test_endpoint_joins_base_path() {
        let backend = OpenAiBackend::with_api_key(settings("https://api.example.com/v1/"), "k").unwrap();
        assert_eq!(backend.endpoint().as_str(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            OpenAiBackend::with_api_key(settings("not a url"), "k"),
            Err(Error::UrlParse(_))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = BackendSettings {
            api_key_env: "BOARDROOM_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..BackendSettings::default()
        };
        let err = OpenAiBackend::from_settings(settings).unwrap_err();
        assert!(err.to_string().contains("BOARDROOM_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_request_body_defaults() {
        let backend = OpenAiBackend::with_api_key(settings("http://localhost"), "k").unwrap();
        let request = CompletionRequest::new().user("hello");

        let plain = serde_json::to_value(backend.body(&request, false)).unwrap();
        assert_eq!(plain["model"], "gpt-4.1-nano");
        assert_eq!(plain["max_tokens"], 300);
        assert!(plain.get("stream").is_none());

        let streamed = serde_json::to_value(backend.body(&request.clone().model("gpt-4o"), true)).unwrap();
        assert_eq!(streamed["model"], "gpt-4o");
        assert_eq!(streamed["stream"], true);
        assert_eq!(streamed["stream_options"]["include_usage"], true);
    }
}
