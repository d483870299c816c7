//! Model resolution boundary.
//!
//! Given the raw request, produce the full [`ModelConfig`] (pricing,
//! currency, backend key) or fail. Resolution failure is fatal to the
//! request and propagates unchanged — no retry, no fallback model.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use modelgate_core::{ChatRequest, DispatchError, ModelConfig};
use modelgate_store::Store;

/// The model-resolution collaborator consumed by the dispatcher.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    /// Resolve the request's logical model into its full configuration.
    async fn refine(&self, request: &ChatRequest) -> Result<ModelConfig, DispatchError>;
}

// ─────────────────────────────────────────────
// StoreResolver
// ─────────────────────────────────────────────

/// Resolves models against the store's routing table, fresh on every
/// request — nothing is cached across calls.
pub struct StoreResolver {
    store: Arc<Store>,
}

impl StoreResolver {
    pub fn new(store: Arc<Store>) -> Self {
        StoreResolver { store }
    }
}

#[async_trait]
impl ModelResolver for StoreResolver {
    async fn refine(&self, request: &ChatRequest) -> Result<ModelConfig, DispatchError> {
        let model = self
            .store
            .find_model_by_name(&request.model)
            .await
            .map_err(DispatchError::store)?
            .ok_or_else(|| DispatchError::Resolution {
                reason: format!("unknown model '{}'", request.model),
            })?;

        debug!(model = %model.name, backend = %model.backend, "resolved model");
        Ok(model)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use modelgate_store::NewModel;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_registered_model() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        store
            .create_model(NewModel {
                name: "Atlas".to_string(),
                backend: "chat-completions".to_string(),
                price_in: Some(0.001),
                price_out: Some(0.002),
                currency: Some("USD".to_string()),
                settings: json!({"endpoint": "https://up.example.com/v1"}),
            })
            .await
            .unwrap();

        let resolver = StoreResolver::new(store);
        let model = resolver
            .refine(&ChatRequest::new("Atlas", "hi"))
            .await
            .unwrap();
        assert_eq!(model.backend, "chat-completions");
        assert_eq!(model.price_in, Some(0.001));
    }

    #[tokio::test]
    async fn test_unknown_model_is_resolution_error() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let resolver = StoreResolver::new(store);

        let err = resolver
            .refine(&ChatRequest::new("Nope", "hi"))
            .await
            .unwrap_err();
        match err {
            DispatchError::Resolution { reason } => assert!(reason.contains("Nope")),
            other => panic!("expected Resolution, got {other:?}"),
        }
    }
}
