//! Backend registry — the immutable name → adapter map.
//!
//! The registry is populated exactly once at process start and never
//! mutated afterwards. A lookup miss at call time means the deployment is
//! missing a provider binding — a configuration error, not a user error —
//! and [`BackendRegistry::validate_bindings`] lets deployments surface that
//! at startup instead, by checking every backend key the model table
//! references against the registered set.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use modelgate_core::DispatchError;

use crate::traits::ModelBackend;

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Immutable map from logical provider key to a shared adapter instance.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ModelBackend>>,
}

impl BackendRegistry {
    /// Start building a registry.
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder {
            backends: HashMap::new(),
        }
    }

    /// Look up the adapter for a provider key.
    ///
    /// A miss is a deployment misconfiguration and surfaces as
    /// [`DispatchError::Configuration`].
    pub fn get(&self, key: &str) -> Result<Arc<dyn ModelBackend>, DispatchError> {
        self.backends
            .get(key)
            .cloned()
            .ok_or_else(|| DispatchError::Configuration {
                backend: key.to_string(),
            })
    }

    /// Whether a provider key is bound.
    pub fn contains(&self, key: &str) -> bool {
        self.backends.contains_key(key)
    }

    /// All bound provider keys, sorted for determinism.
    pub fn backend_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.backends.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Check that every provider key in `keys` has a registered adapter.
    ///
    /// Fails with [`DispatchError::Configuration`] naming the first unbound
    /// key. Deployments run this at startup against the set of keys the
    /// model table routes to, turning call-time configuration errors into
    /// load-time ones.
    pub fn validate_bindings<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), DispatchError> {
        for key in keys {
            if !self.contains(key) {
                return Err(DispatchError::Configuration {
                    backend: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

// ─────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────

/// Builds a [`BackendRegistry`]; registration happens only here.
pub struct BackendRegistryBuilder {
    backends: HashMap<String, Arc<dyn ModelBackend>>,
}

impl BackendRegistryBuilder {
    /// Bind a provider key to an adapter.
    ///
    /// Registering the same key twice is a wiring bug and fails
    /// immediately rather than silently overwriting.
    pub fn register(
        mut self,
        key: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
    ) -> anyhow::Result<Self> {
        let key = key.into();
        if self.backends.contains_key(&key) {
            anyhow::bail!("backend key '{key}' registered twice");
        }
        info!(key = %key, adapter = backend.name(), "registered backend");
        self.backends.insert(key, backend);
        Ok(self)
    }

    /// Finish building; the registry is immutable from here on.
    pub fn build(self) -> BackendRegistry {
        BackendRegistry {
            backends: self.backends,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::BackendCall;
    use async_trait::async_trait;
    use modelgate_core::{BackendReply, ChatRequest};

    #[derive(Debug)]
    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }
        async fn chat(
            &self,
            _call: &BackendCall<'_>,
            request: &ChatRequest,
        ) -> Result<BackendReply, DispatchError> {
            Ok(BackendReply::text(
                request.last_user_text().unwrap_or_default(),
            ))
        }
    }

    fn registry_with(keys: &[&str]) -> BackendRegistry {
        let mut builder = BackendRegistry::builder();
        for key in keys {
            builder = builder.register(*key, Arc::new(EchoBackend)).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_lookup_bound_key() {
        let registry = registry_with(&["chat-completions"]);
        let backend = registry.get("chat-completions").unwrap();
        assert_eq!(backend.name(), "echo");
    }

    #[test]
    fn test_lookup_unbound_key_is_configuration_error() {
        let registry = registry_with(&["chat-completions"]);
        let err = registry.get("atlas-backend").unwrap_err();
        match err {
            DispatchError::Configuration { backend } => assert_eq!(backend, "atlas-backend"),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let builder = BackendRegistry::builder()
            .register("painter", Arc::new(EchoBackend))
            .unwrap();
        assert!(builder.register("painter", Arc::new(EchoBackend)).is_err());
    }

    #[test]
    fn test_backend_keys_sorted() {
        let registry = registry_with(&["reader", "painter", "chat-completions"]);
        assert_eq!(
            registry.backend_keys(),
            vec!["chat-completions", "painter", "reader"]
        );
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_validate_bindings_all_bound() {
        let registry = registry_with(&["painter", "reader"]);
        assert!(registry.validate_bindings(["painter", "reader"].iter().copied()).is_ok());
    }

    #[test]
    fn test_validate_bindings_names_missing_key() {
        let registry = registry_with(&["painter"]);
        let err = registry
            .validate_bindings(["painter", "atlas-backend"].iter().copied())
            .unwrap_err();
        match err {
            DispatchError::Configuration { backend } => assert_eq!(backend, "atlas-backend"),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
