//! The backend capability trait.
//!
//! Adapters hold only long-lived resources (an HTTP client, static
//! defaults). Everything that belongs to one request — the resolved model
//! configuration, the caller's key, the session correlator — arrives as an
//! explicit [`BackendCall`] argument. Two concurrent requests routed to the
//! same adapter instance can therefore never observe each other's
//! configuration.

use async_trait::async_trait;

use modelgate_core::{AccessKey, BackendReply, ChatRequest, DispatchError, ModelConfig};

/// Per-call context handed to a backend operation.
#[derive(Clone, Copy, Debug)]
pub struct BackendCall<'a> {
    /// The model configuration resolved for this request.
    pub model: &'a ModelConfig,
    /// The caller making the request.
    pub key: &'a AccessKey,
    /// Opaque session correlator from the request headers, passed through
    /// unmodified.
    pub session_id: Option<&'a str>,
}

/// Trait that all backend adapters implement.
#[async_trait]
pub trait ModelBackend: Send + Sync + std::fmt::Debug {
    /// Adapter name used in logs and error reports.
    fn name(&self) -> &str;

    /// Serve a chat-style request.
    async fn chat(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError>;

    /// Serve a completion-style request.
    ///
    /// Default implementation delegates to [`ModelBackend::chat`]; adapters
    /// that distinguish the two override it.
    async fn complete(
        &self,
        call: &BackendCall<'_>,
        request: &ChatRequest,
    ) -> Result<BackendReply, DispatchError> {
        self.chat(call, request).await
    }
}
