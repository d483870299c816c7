//! Image generation adapter.
//!
//! Takes the last user message as the prompt, POSTs it to an
//! OpenAI-compatible `/images/generations` endpoint, and replies with a
//! markdown image so chat clients render it inline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use modelgate_core::{BackendReply, ChatRequest, DispatchError};

use crate::traits::{BackendCall, ModelBackend};

/// Image size requested when the model settings don't specify one.
const DEFAULT_SIZE: &str = "1024x1024";

// ─────────────────────────────────────────────
// PainterBackend
// ─────────────────────────────────────────────

/// Generates images from chat prompts.
#[derive(Debug)]
pub struct PainterBackend {
    client: reqwest::Client,
}

impl PainterBackend {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        PainterBackend { client }
    }

    fn generations_url(endpoint: &str) -> String {
        format!("{}/images/generations", endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelBackend for PainterBackend {
    fn name(&self) -> &str {
        "painter"
    }

    async fn chat(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        let prompt = request.last_user_text().ok_or_else(|| {
            DispatchError::backend(anyhow::anyhow!("image request has no prompt"))
        })?;
        let endpoint = call.model.setting_str("endpoint").ok_or_else(|| {
            DispatchError::backend(anyhow::anyhow!(
                "model '{}' has no endpoint configured",
                call.model.name
            ))
        })?;
        let size = call.model.setting_str("size").unwrap_or(DEFAULT_SIZE);

        debug!(
            backend = self.name(),
            key = call.key.id,
            size = size,
            "generating image"
        );

        let body = GenerationBody {
            model: call.model.setting_str("model").map(String::from),
            prompt: &prompt,
            n: 1,
            size,
        };

        let mut req = self.client.post(Self::generations_url(endpoint)).json(&body);
        if let Some(api_key) = call.model.setting_str("apiKey") {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await.map_err(|e| {
            error!(backend = self.name(), error = %e, "image request failed");
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

        let parsed: GenerationResponse = response.json().await.map_err(DispatchError::backend)?;
        let url = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| DispatchError::backend(anyhow::anyhow!("no image in response")))?;

        Ok(BackendReply::text(format!("![{}]({})", prompt, url)))
    }
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct GenerationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    url: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use modelgate_core::{AccessKey, ModelConfig};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_call_parts(endpoint: &str) -> (ModelConfig, AccessKey) {
        let model = ModelConfig {
            id: 2,
            name: "Muse".to_string(),
            backend: "painter".to_string(),
            price_in: None,
            price_out: Some(0.04),
            currency: None,
            settings: json!({"endpoint": endpoint, "size": "512x512"}),
        };
        let key = AccessKey {
            id: 1,
            name: "tester".to_string(),
            api_key: "mg-test".to_string(),
            group_id: 1,
            month_fee: 0.0,
            month_quota: 50.0,
            balance: 0.0,
            updated_at: Utc::now(),
        };
        (model, key)
    }

    #[tokio::test]
    async fn test_generates_markdown_image() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_partial_json(json!({"prompt": "a red fox", "size": "512x512"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://img.example.com/fox.png"}]
            })))
            .mount(&server)
            .await;

        let (model, key) = test_call_parts(&server.uri());
        let call = BackendCall {
            model: &model,
            key: &key,
            session_id: None,
        };

        let reply = PainterBackend::new(Duration::from_secs(5))
            .chat(&call, &ChatRequest::new("Muse", "a red fox"))
            .await
            .unwrap();
        assert_eq!(reply.content, "![a red fox](https://img.example.com/fox.png)");
    }

    #[tokio::test]
    async fn test_missing_prompt_fails() {
        let (model, key) = test_call_parts("http://unused");
        let call = BackendCall {
            model: &model,
            key: &key,
            session_id: None,
        };
        let request: ChatRequest = serde_json::from_value(json!({"model": "Muse"})).unwrap();

        let err = PainterBackend::new(Duration::from_secs(5))
            .chat(&call, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Backend(_)));
    }

    #[tokio::test]
    async fn test_empty_data_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let (model, key) = test_call_parts(&server.uri());
        let call = BackendCall {
            model: &model,
            key: &key,
            session_id: None,
        };

        let err = PainterBackend::new(Duration::from_secs(5))
            .chat(&call, &ChatRequest::new("Muse", "a fox"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Backend(_)));
    }
}
