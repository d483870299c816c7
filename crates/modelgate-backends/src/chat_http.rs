//! Generic OpenAI-compatible chat HTTP adapter.
//!
//! One instance serves every model whose row routes here; the endpoint,
//! upstream credential, and upstream model id come out of the resolved
//! model's `settings` blob on each call:
//!
//! ```json
//! { "endpoint": "https://api.example.com/v1",
//!   "apiKey": "sk-…",
//!   "model": "upstream-model-id" }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use modelgate_core::{BackendReply, ChatRequest, DispatchError, Message, Usage};

use crate::traits::{BackendCall, ModelBackend};

// ─────────────────────────────────────────────
// ChatCompletionsBackend
// ─────────────────────────────────────────────

/// Talks to any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug)]
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
}

impl ChatCompletionsBackend {
    /// Create the adapter with a per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        ChatCompletionsBackend { client }
    }

    fn completions_url(endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    async fn call_upstream(
        &self,
        call: &BackendCall<'_>,
        messages: &[Message],
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        let endpoint = call.model.setting_str("endpoint").ok_or_else(|| {
            DispatchError::backend(anyhow::anyhow!(
                "model '{}' has no endpoint configured",
                call.model.name
            ))
        })?;
        let upstream_model = call
            .model
            .setting_str("model")
            .unwrap_or(&request.model)
            .to_string();

        debug!(
            backend = self.name(),
            model = %upstream_model,
            key = call.key.id,
            session = call.session_id.unwrap_or("-"),
            messages = messages.len(),
            "calling upstream chat endpoint"
        );

        let body = UpstreamChatBody {
            model: upstream_model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let mut req = self.client.post(Self::completions_url(endpoint)).json(&body);
        if let Some(api_key) = call.model.setting_str("apiKey") {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await.map_err(|e| {
            error!(backend = self.name(), error = %e, "upstream request failed");
            DispatchError::backend(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            error!(backend = self.name(), status = %status, body = %body, "upstream error");
            return Err(DispatchError::backend(anyhow::anyhow!(
                "upstream returned {status}: {body}"
            )));
        }

        let parsed: UpstreamChatResponse = response.json().await.map_err(DispatchError::backend)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DispatchError::backend(anyhow::anyhow!("no choices in response")))?;

        Ok(BackendReply {
            content,
            model: parsed.model,
            usage: parsed.usage,
        })
    }
}

#[async_trait]
impl ModelBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn chat(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        self.call_upstream(call, &request.messages, request).await
    }

    async fn complete(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        // Completion payloads carry a bare prompt; fold it into a single
        // user message so one upstream shape covers both entry points.
        let prompt = request.last_user_text().ok_or_else(|| {
            DispatchError::backend(anyhow::anyhow!("completion request has no prompt"))
        })?;
        let messages = vec![Message::user(prompt)];
        self.call_upstream(call, &messages, request).await
    }
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct UpstreamChatBody<'a> {
    model: String,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

#[derive(Deserialize)]
struct UpstreamChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<UpstreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct UpstreamChoice {
    message: UpstreamMessage,
}

#[derive(Deserialize)]
struct UpstreamMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
