//! The dispatch error taxonomy.
//!
//! Every failure mode of the routing/authorization/quota pipeline is one of
//! these variants. None of them is retried or recovered inside the core —
//! each aborts the request and surfaces to the outer service layer.

use thiserror::Error;

/// Failure vocabulary of the dispatch pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The resolved model names a provider key with no registered adapter.
    ///
    /// This is a deployment misconfiguration, not a user mistake — it must
    /// reach an operator rather than being silently defaulted.
    #[error("no backend registered for provider key '{backend}', check the deployment configuration")]
    Configuration { backend: String },

    /// The caller holds neither a group nor a personal grant for the model.
    /// Carries the model's display name, never its internal id.
    #[error("You do not have permission to access the [{model}] model, please contact the administrator.")]
    Permission { model: String },

    /// Monthly fee reached the quota and the prepaid balance is exhausted.
    #[error("Please recharge.")]
    Quota,

    /// The model-resolution collaborator failed; fatal to the request.
    #[error("model resolution failed: {reason}")]
    Resolution { reason: String },

    /// A backend adapter failed; propagated unchanged, no retry here.
    #[error("backend call failed: {0}")]
    Backend(#[source] anyhow::Error),

    /// The persistence collaborator failed mid-pipeline (including a failed
    /// monthly rollover — those are not caught separately).
    #[error("store operation failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl DispatchError {
    /// Wrap an adapter failure.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        DispatchError::Backend(err.into())
    }

    /// Wrap a persistence failure.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        DispatchError::Store(err.into())
    }

    /// Whether this failure should be shown to the caller (as opposed to
    /// an operator-facing configuration or infrastructure problem).
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            DispatchError::Permission { .. } | DispatchError::Quota | DispatchError::Resolution { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names_display_name() {
        let err = DispatchError::Permission {
            model: "Atlas Vision".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[Atlas Vision]"));
        assert!(msg.contains("contact the administrator"));
    }

    #[test]
    fn test_quota_instructs_recharge() {
        assert!(DispatchError::Quota.to_string().contains("recharge"));
    }

    #[test]
    fn test_configuration_names_backend_key() {
        let err = DispatchError::Configuration {
            backend: "atlas-backend".to_string(),
        };
        assert!(err.to_string().contains("'atlas-backend'"));
    }

    #[test]
    fn test_user_visibility_split() {
        assert!(DispatchError::Quota.is_user_visible());
        assert!(DispatchError::Permission { model: "m".into() }.is_user_visible());
        assert!(!DispatchError::Configuration { backend: "b".into() }.is_user_visible());
        assert!(!DispatchError::store(anyhow::anyhow!("db down")).is_user_visible());
    }
}
