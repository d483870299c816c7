//! Core types for Modelgate — the request, the caller, the resolved model,
//! and the backend reply.
//!
//! A request enters as caller-supplied JSON, gets a [`ModelConfig`] resolved
//! for it, has pricing stamped onto it, and is then handed to a backend
//! adapter. Backends never compute pricing themselves; the three stamped
//! fields must be populated before any backend sees the request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback billing currency when the resolved model does not declare one.
pub const DEFAULT_CURRENCY: &str = "USD";

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A single chat message.
///
/// `content` stays a raw JSON value because callers may send either a plain
/// string or a multipart array (vision payloads); the dispatcher passes it
/// through untouched and only the adapters that need text extract it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Value,
}

impl Message {
    /// Create a plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: "user".to_string(),
            content: Value::String(content.into()),
        }
    }

    /// Create a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: "assistant".to_string(),
            content: Value::String(content.into()),
        }
    }

    /// Extract the textual content of this message.
    ///
    /// Handles both the plain-string form and the multipart array form
    /// (text parts are concatenated, image parts skipped).
    pub fn text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let joined: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined.join("\n"))
                }
            }
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────
// ChatRequest
// ─────────────────────────────────────────────

/// The caller-supplied request body plus the fields the dispatcher stamps
/// onto it before dispatch.
///
/// `currency`, `price_in`, and `price_out` start out `None` and are filled
/// in by [`ChatRequest::apply_pricing`] from the resolved model. Unknown
/// caller fields ride along in `extra` so adapters can forward them
/// upstream unchanged.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Legacy completion-style payloads carry a bare prompt instead of
    /// a message list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_out: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatRequest {
    /// Build a minimal request for one model and one user prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        ChatRequest {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            prompt: None,
            stream: false,
            max_tokens: None,
            temperature: None,
            currency: None,
            price_in: None,
            price_out: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Stamp pricing from the resolved model onto this request.
    ///
    /// Missing model values fall back to `"USD"` / `0` / `0`.
    pub fn apply_pricing(&mut self, model: &ModelConfig) {
        self.currency = Some(
            model
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        );
        self.price_in = Some(model.price_in.unwrap_or(0.0));
        self.price_out = Some(model.price_out.unwrap_or(0.0));
    }

    /// Text of the most recent user message, falling back to `prompt`.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(Message::text)
            .or_else(|| self.prompt.clone())
    }
}

// ─────────────────────────────────────────────
// AccessKey (caller account)
// ─────────────────────────────────────────────

/// The credential/account making a request — quota state and group
/// membership included.
///
/// Owned by the store; the dispatch core reads it and only ever mutates
/// billing state through the store's rollover and accrual operations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccessKey {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub group_id: i64,
    /// Amount spent in the current billing period.
    pub month_fee: f64,
    /// Spending cap for the period.
    pub month_quota: f64,
    /// Prepaid credit that covers overage past the quota.
    pub balance: f64,
    /// Timestamp of the last fee mutation; drives the monthly rollover.
    pub updated_at: DateTime<Utc>,
}

impl AccessKey {
    /// Whether this is a real persisted account (system/anonymous callers
    /// carry non-positive ids and skip fee accounting).
    pub fn is_account(&self) -> bool {
        self.id > 0
    }
}

// ─────────────────────────────────────────────
// ModelConfig (resolved per request)
// ─────────────────────────────────────────────

/// Full configuration of one logical model, resolved fresh for every
/// request and immutable thereafter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub id: i64,
    /// Display name — the one users see in permission errors.
    pub name: String,
    /// Logical provider key used to select the backend adapter.
    pub backend: String,
    pub price_in: Option<f64>,
    pub price_out: Option<f64>,
    pub currency: Option<String>,
    /// Per-backend connection detail (endpoint, upstream model id, api
    /// key), opaque to the dispatch core.
    #[serde(default)]
    pub settings: Value,
}

impl ModelConfig {
    /// Read a string field out of the settings blob.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Read a numeric field out of the settings blob.
    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        self.settings.get(key).and_then(Value::as_u64)
    }
}

// ─────────────────────────────────────────────
// Backend reply
// ─────────────────────────────────────────────

/// What a backend adapter returns to the dispatcher.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendReply {
    /// Assistant-visible text (or an image URL, or fetched page content —
    /// whatever the capability produces).
    pub content: String,
    /// Upstream model identifier, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl BackendReply {
    /// Build a text-only reply.
    pub fn text(content: impl Into<String>) -> Self {
        BackendReply {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Token accounting reported by an upstream service.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(currency: Option<&str>, price_in: Option<f64>, price_out: Option<f64>) -> ModelConfig {
        ModelConfig {
            id: 7,
            name: "Atlas".to_string(),
            backend: "atlas-backend".to_string(),
            price_in,
            price_out,
            currency: currency.map(String::from),
            settings: Value::Null,
        }
    }

    // ── Message text extraction ──

    #[test]
    fn test_message_text_plain() {
        let msg = Message::user("hello");
        assert_eq!(msg.text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_message_text_multipart() {
        let msg = Message {
            role: "user".to_string(),
            content: json!([
                {"type": "text", "text": "what is"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,xx"}},
                {"type": "text", "text": "this?"}
            ]),
        };
        assert_eq!(msg.text().as_deref(), Some("what is\nthis?"));
    }

    #[test]
    fn test_message_text_non_text() {
        let msg = Message {
            role: "user".to_string(),
            content: json!(42),
        };
        assert!(msg.text().is_none());
    }

    // ── Pricing stamp ──

    #[test]
    fn test_apply_pricing_from_model() {
        let mut req = ChatRequest::new("atlas", "hi");
        req.apply_pricing(&model(Some("EUR"), Some(0.003), Some(0.015)));

        assert_eq!(req.currency.as_deref(), Some("EUR"));
        assert_eq!(req.price_in, Some(0.003));
        assert_eq!(req.price_out, Some(0.015));
    }

    #[test]
    fn test_apply_pricing_defaults() {
        let mut req = ChatRequest::new("atlas", "hi");
        req.apply_pricing(&model(None, None, None));

        assert_eq!(req.currency.as_deref(), Some(DEFAULT_CURRENCY));
        assert_eq!(req.price_in, Some(0.0));
        assert_eq!(req.price_out, Some(0.0));
    }

    // ── Request parsing ──

    #[test]
    fn test_request_deserializes_caller_body() {
        let req: ChatRequest = serde_json::from_value(json!({
            "model": "atlas",
            "messages": [{"role": "user", "content": "hello"}],
            "temperature": 0.2,
            "metadata": {"trace": "abc"}
        }))
        .unwrap();

        assert_eq!(req.model, "atlas");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.temperature, Some(0.2));
        assert!(!req.stream);
        // Unknown fields are preserved for upstream forwarding
        assert_eq!(req.extra["metadata"]["trace"], "abc");
        // Pricing is absent until the dispatcher stamps it
        assert!(req.currency.is_none());
        assert!(req.price_in.is_none());
    }

    #[test]
    fn test_last_user_text_prefers_latest_user_message() {
        let mut req = ChatRequest::new("atlas", "first");
        req.messages.push(Message::assistant("reply"));
        req.messages.push(Message::user("second"));
        assert_eq!(req.last_user_text().as_deref(), Some("second"));
    }

    #[test]
    fn test_last_user_text_falls_back_to_prompt() {
        let req: ChatRequest = serde_json::from_value(json!({
            "model": "atlas",
            "prompt": "complete me"
        }))
        .unwrap();
        assert_eq!(req.last_user_text().as_deref(), Some("complete me"));
    }

    // ── AccessKey ──

    #[test]
    fn test_is_account() {
        let mut key = AccessKey {
            id: 3,
            name: "alice".to_string(),
            api_key: "mg-abc".to_string(),
            group_id: 1,
            month_fee: 0.0,
            month_quota: 10.0,
            balance: 0.0,
            updated_at: Utc::now(),
        };
        assert!(key.is_account());
        key.id = 0;
        assert!(!key.is_account());
        key.id = -1;
        assert!(!key.is_account());
    }

    // ── ModelConfig settings ──

    #[test]
    fn test_setting_accessors() {
        let mut m = model(None, None, None);
        m.settings = json!({"endpoint": "https://api.example.com/v1", "maxChars": 9000});
        assert_eq!(m.setting_str("endpoint"), Some("https://api.example.com/v1"));
        assert_eq!(m.setting_u64("maxChars"), Some(9000));
        assert!(m.setting_str("missing").is_none());
    }

    // ── BackendReply ──

    #[test]
    fn test_reply_serialization_skips_absent_fields() {
        let reply = BackendReply::text("done");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["content"], "done");
        assert!(json.get("model").is_none());
        assert!(json.get("usage").is_none());
    }
}
