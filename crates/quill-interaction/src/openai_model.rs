//! OpenAI-compatible streaming chat client.
//!
//! Both the bundled local inference server and the hosted endpoint speak the
//! OpenAI chat-completions protocol, so one client covers every connection
//! kind. Responses stream as Server-Sent Events; see [`crate::sse`] for the
//! framing rules.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;
use crate::model::{ChatRequest, LanguageModel, ModelError, PromptMessage, TokenStream, ToolDecl};
use crate::sse::{SseEvent, SseLineBuffer};

/// Chat model backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChatModel {
    /// Creates a client for the given endpoint.
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            api_key,
            model: "defaultModel".to_string(),
        }
    }

    /// Creates a client from resolved connection settings.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.api_base.clone(), config.api_key.clone()).with_model(config.model.clone())
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, ModelError> {
        let url = format!(
            "{}/chat/completions",
            self.api_base.trim_end_matches('/')
        );
        tracing::debug!(model = %self.model, messages = request.messages.len(), "Opening chat completion stream");

        let tools = request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| ToolSpec {
                    r#type: "function",
                    function: tool,
                })
                .collect::<Vec<_>>()
        });
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            stream: true,
            tools,
        };

        let mut http_request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {key}"));
        }

        let response = http_request.send().await.map_err(|err| ModelError::Http {
            status_code: None,
            message: format!("Chat request failed: {err}"),
            is_retryable: err.is_connect() || err.is_timeout(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        Ok(sse_token_stream(response.bytes_stream()))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec<'a>>>,
}

#[derive(Serialize)]
struct ToolSpec<'a> {
    r#type: &'static str,
    function: &'a ToolDecl,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
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
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_http_error(status: StatusCode, body: String) -> ModelError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    ModelError::Http {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
    }
}

/// Extracts the text delta from one streamed completion chunk.
///
/// Returns `Ok(None)` for metadata-only chunks (role announcements, tool
/// call fragments, empty deltas).
fn parse_delta(json: &str) -> Result<Option<String>, ModelError> {
    let chunk: CompletionChunk = serde_json::from_str(json)
        .map_err(|err| ModelError::Stream(format!("Malformed stream payload: {err}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct StreamState<B, E> {
    bytes: Pin<Box<dyn Stream<Item = Result<B, E>> + Send>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<String, ModelError>>,
    done: bool,
}

impl<B, E> StreamState<B, E> {
    fn enqueue(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Data(json) => match parse_delta(&json) {
                    Ok(Some(delta)) => self.pending.push_back(Ok(delta)),
                    Ok(None) => {}
                    Err(err) => self.pending.push_back(Err(err)),
                },
                SseEvent::Done => self.done = true,
            }
        }
    }
}

/// Wraps a raw byte stream with SSE framing, yielding text deltas.
fn sse_token_stream<S, B, E>(byte_stream: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
    E: std::fmt::Display + 'static,
{
    let state = StreamState {
        bytes: Box::pin(byte_stream),
        lines: SseLineBuffer::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            // Drain pending deltas first: one network chunk can carry
            // several SSE events.
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let events = state.lines.feed(bytes.as_ref());
                    state.enqueue(events);
                }
                Some(Err(err)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(ModelError::Stream(format!("Stream read error: {err}"))));
                }
                None => {
                    state.done = true;
                    let events = state.lines.flush().into_iter().collect();
                    state.enqueue(events);
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_extracted_from_completion_chunk() {
        let json = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_delta(json).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn metadata_only_chunks_yield_nothing() {
        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(role_only).unwrap(), None);
        let empty = r#"{"choices":[]}"#;
        assert_eq!(parse_delta(empty).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_a_stream_error() {
        assert!(parse_delta("{not json").is_err());
    }

    #[tokio::test]
    async fn byte_stream_is_reframed_into_deltas() {
        let chunks: Vec<Result<&[u8], std::convert::Infallible>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: {\"choi"),
            Ok(b"ces\":[{\"delta\":{\"content\":\" there\"}}]}\n"),
            Ok(b"data: [DONE]\n"),
        ];
        let stream = sse_token_stream(futures::stream::iter(chunks));
        let collected: Vec<String> = stream.map(|item| item.unwrap()).collect().await;
        assert_eq!(collected, vec!["Hi".to_string(), " there".to_string()]);
    }
}
