//! OpenAI-compatible chat-completion provider.
//!
//! Works with any endpoint speaking the `/v1/chat/completions` wire
//! protocol — OpenAI itself, Azure, vLLM, LM Studio, LocalAI. Transient
//! failures (429, 5xx, connect/timeout) are retried a bounded number of
//! times *before* the stream starts; once streaming, errors pass through
//! to the caller.

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use drover_core::chunks::ProviderChunk;
use drover_core::messages::{Message, Role};
use drover_core::text::truncate_str;
use drover_core::tools::ToolDefinition;

use crate::errors::{ProviderError, Result};
use crate::provider::{Provider, ProviderChunkStream};
use crate::sse::parse_sse_lines;

/// Construction options for [`OpenAiCompatProvider`].
#[derive(Clone, Debug)]
pub struct OpenAiCompatOptions {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Model id.
    pub model: String,
    /// Bearer token. `None` for unauthenticated local endpoints.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries on transient failures before the stream starts.
    pub max_retries: u32,
    /// Maximum context window in tokens.
    pub max_context_tokens: u32,
    /// Maximum output tokens per completion.
    pub max_output_tokens: u32,
}

impl Default for OpenAiCompatOptions {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key: None,
            timeout: Duration::from_secs(120),
            max_retries: 2,
            max_context_tokens: 128_000,
            max_output_tokens: 4_096,
        }
    }
}

/// Stream-capable provider for any OpenAI-API-compatible endpoint.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    options: OpenAiCompatOptions,
}

impl OpenAiCompatProvider {
    /// Create a provider from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the HTTP client cannot be built.
    pub fn new(options: OpenAiCompatOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, options })
    }

    /// Create a provider, resolving the API key from the environment
    /// variable named `api_key_env`. An unset variable means
    /// unauthenticated (local endpoints); the key itself never appears in
    /// configuration.
    pub fn from_env(mut options: OpenAiCompatOptions, api_key_env: &str) -> Result<Self> {
        options.api_key = std::env::var(api_key_env).ok().filter(|k| !k.is_empty());
        if options.api_key.is_none() {
            debug!(api_key_env, "no API key in environment, sending unauthenticated");
        }
        Self::new(options)
    }

    fn build_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let wire_messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.options.model,
            "messages": wire_messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(ToolDefinition::openai_schema).collect());
            body["tool_choice"] = json!("auto");
        }
        body
    }

    async fn open_stream(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.options.api_base.trim_end_matches('/'));
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(250 * u64::from(attempt));
                debug!(attempt, ?delay, "retrying provider request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&url)
                .header("Accept", "text/event-stream")
                .json(body);
            if let Some(key) = &self.options.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        let message = response.text().await.unwrap_or_default();
                        last_error = Some(ProviderError::Api {
                            status: status.as_u16(),
                            message: truncate_str(&message, 200),
                        });
                        continue;
                    }
                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        let message = response.text().await.unwrap_or_default();
                        return Err(ProviderError::Auth {
                            message: truncate_str(&message, 200),
                        });
                    }
                    if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(ProviderError::Api {
                            status: status.as_u16(),
                            message: truncate_str(&message, 200),
                        });
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let err = ProviderError::Http(e);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::Other {
            message: "request failed with no recorded error".into(),
        }))
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.options.model
    }

    fn max_context_tokens(&self) -> u32 {
        self.options.max_context_tokens
    }

    fn max_output_tokens(&self) -> u32 {
        self.options.max_output_tokens
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ProviderChunkStream> {
        let body = self.build_body(messages, tools);
        debug!(
            model = %self.options.model,
            messages = messages.len(),
            tools = tools.len(),
            "opening completion stream"
        );
        let response = self.open_stream(&body).await?;

        let byte_stream = Box::pin(response.bytes_stream());
        let chunks = parse_sse_lines(byte_stream)
            .flat_map(|line| match line {
                Ok(data) => futures::stream::iter(chunks_from_data(&data)),
                Err(e) => futures::stream::iter(vec![Err(ProviderError::Http(e))]),
            });
        Ok(Box::pin(chunks))
    }
}

/// Convert one message to the chat-completion wire shape.
fn wire_message(message: &Message) -> Value {
    let mut m = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });
    if let Some(calls) = &message.tool_calls {
        if !calls.is_empty() {
            m["tool_calls"] = Value::Array(
                calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": serde_json::to_string(&c.arguments)
                                    .unwrap_or_else(|_| "{}".into()),
                            },
                        })
                    })
                    .collect(),
            );
        }
    }
    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            m["tool_call_id"] = json!(id);
        }
    }
    m
}

/// Convert one parsed SSE payload into provider chunks.
fn chunks_from_data(data: &str) -> Vec<std::result::Result<ProviderChunk, ProviderError>> {
    let parsed: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, data_preview = %truncate_str(data, 100), "unparseable SSE payload");
            return Vec::new();
        }
    };

    let Some(choice) = parsed.get("choices").and_then(|c| c.get(0)) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    if let Some(delta) = choice.get("delta") {
        if let Some(text) = delta.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                out.push(Ok(ProviderChunk::ContentDelta { text: text.to_owned() }));
            }
        }
        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for tc in tool_calls {
                let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
                let id = tc.get("id").and_then(Value::as_str).map(str::to_owned);
                let function = tc.get("function");
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let args_chunk = function
                    .and_then(|f| f.get("arguments"))
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                out.push(Ok(ProviderChunk::ToolCallDelta {
                    index,
                    id,
                    name,
                    args_chunk,
                }));
            }
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        out.push(Ok(ProviderChunk::Done {
            reason: reason.to_owned(),
        }));
    }

    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
