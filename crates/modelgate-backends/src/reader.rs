//! Web page reader adapter.
//!
//! Pulls `http(s)://` URLs out of the last user message, fetches each page,
//! strips markup, and replies with the extracted text. No upstream model is
//! involved; this capability is pure content retrieval.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use modelgate_core::utils::truncate_string;
use modelgate_core::{BackendReply, ChatRequest, DispatchError};

use crate::traits::{BackendCall, ModelBackend};

/// Cap on pages fetched per request.
const MAX_URLS: usize = 3;

/// Default cap on extracted characters per page; the model settings can
/// override it with a `maxChars` field.
const DEFAULT_MAX_CHARS: usize = 50_000;

// ─────────────────────────────────────────────
// ReaderBackend
// ─────────────────────────────────────────────

/// Fetches and extracts the pages a request points at.
#[derive(Debug)]
pub struct ReaderBackend {
    client: reqwest::Client,
}

impl ReaderBackend {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        ReaderBackend { client }
    }

    async fn fetch_one(&self, url: &str, max_chars: usize) -> String {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "fetch failed");
                return format!("[failed to fetch {url}: {e}]");
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "fetch returned error status");
            return format!("[{url} returned {status}]");
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return format!("[failed to read {url}: {e}]"),
        };

        let text = if content_type.contains("html") || body.trim_start().starts_with('<') {
            strip_html_tags(&body)
        } else {
            body
        };

        truncate_string(text.trim(), max_chars)
    }
}

#[async_trait]
impl ModelBackend for ReaderBackend {
    fn name(&self) -> &str {
        "reader"
    }

    async fn chat(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        let text = request.last_user_text().unwrap_or_default();
        let urls = extract_urls(&text);
        if urls.is_empty() {
            return Err(DispatchError::backend(anyhow::anyhow!(
                "no URLs found in the request"
            )));
        }

        let max_chars = call
            .model
            .setting_u64("maxChars")
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_CHARS);

        debug!(backend = self.name(), urls = urls.len(), key = call.key.id, "reading pages");

        let mut sections = Vec::with_capacity(urls.len());
        for url in urls.iter().take(MAX_URLS) {
            let content = self.fetch_one(url, max_chars).await;
            sections.push(format!("## {}\n\n{}", url, content));
        }

        Ok(BackendReply::text(sections.join("\n\n")))
    }
}

// ─────────────────────────────────────────────
// URL extraction
// ─────────────────────────────────────────────

/// Pull http/https URLs out of free-form text, trimming trailing
/// punctuation that commonly clings to pasted links.
fn extract_urls(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(|w| w.trim_end_matches([',', '.', ')', ']', ';']).to_string())
        .collect()
}

/// Remove tags, scripts, and styles from HTML, keeping line breaks at
/// block boundaries.
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut skip_depth = false;
    let mut tag_name = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag_name.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let lower = tag_name.to_lowercase();
                match lower.as_str() {
                    "script" | "style" => skip_depth = true,
                    "/script" | "/style" => skip_depth = false,
                    "br" | "br/" | "p" | "/p" | "div" | "/div" | "li" | "/li" => {
                        result.push('\n')
                    }
                    _ => {}
                }
            }
            _ if in_tag => {
                if ch.is_alphanumeric() || ch == '/' {
                    tag_name.push(ch);
                }
            }
            _ if skip_depth => {}
            _ => result.push(ch),
        }
    }

    result
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
