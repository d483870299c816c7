//! The dispatcher — one pipeline from raw request to backend invocation.
//!
//! Sequence, each step short-circuiting on failure:
//!
//! 1. fee guard (store present, policy enforces it, caller is a real
//!    account)
//! 2. model resolution
//! 3. access check (store present, policy enforces it)
//! 4. pricing stamp onto the request
//! 5. backend lookup by the resolved provider key
//! 6. invoke `chat`/`complete` with the request, session correlator, and
//!    per-call context; the backend's result or failure passes through
//!    unchanged
//!
//! Which checks run is decided once per call by the outer service layer
//! through [`DispatchPolicy`] — a cached response path sets both skips
//! explicitly rather than the dispatcher inferring it from context.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use modelgate_backends::{BackendCall, BackendRegistry, ModelBackend};
use modelgate_core::{AccessKey, BackendReply, ChatRequest, DispatchError, ModelConfig};
use modelgate_store::Store;

use crate::access::check_model_access;
use crate::fee::check_fee;
use crate::resolver::ModelResolver;

// ─────────────────────────────────────────────
// Policy & call context
// ─────────────────────────────────────────────

/// Which enforcement steps to run for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub skip_fee_check: bool,
    pub skip_access_check: bool,
}

impl DispatchPolicy {
    /// Run every check (the default).
    pub fn enforce_all() -> Self {
        DispatchPolicy::default()
    }

    /// Skip fee and access checks — for responses expected to come from a
    /// cache rather than a fresh backend invocation.
    pub fn cached() -> Self {
        DispatchPolicy {
            skip_fee_check: true,
            skip_access_check: true,
        }
    }
}

/// Everything one call carries into the dispatcher.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub request: ChatRequest,
    pub key: AccessKey,
    /// Opaque per-call session identifier from the request headers.
    pub session_id: Option<String>,
    pub policy: DispatchPolicy,
}

impl CallContext {
    pub fn new(request: ChatRequest, key: AccessKey) -> Self {
        CallContext {
            request,
            key,
            session_id: None,
            policy: DispatchPolicy::enforce_all(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }
}

// ─────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────

/// Routes requests to backends after quota and access enforcement.
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    resolver: Arc<dyn ModelResolver>,
    /// Absent store means enforcement is structurally impossible (e.g.
    /// local smoke deployments); both checks are then skipped.
    store: Option<Arc<Store>>,
}

/// Output of the preparation pipeline: the selected backend plus the
/// stamped request.
pub struct Prepared {
    pub backend: Arc<dyn ModelBackend>,
    pub request: ChatRequest,
    pub model: ModelConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<BackendRegistry>,
        resolver: Arc<dyn ModelResolver>,
        store: Option<Arc<Store>>,
    ) -> Self {
        Dispatcher {
            registry,
            resolver,
            store,
        }
    }

    /// Run the enforcement + resolution pipeline without invoking the
    /// backend yet.
    pub async fn prepare(&self, ctx: &CallContext) -> Result<Prepared, DispatchError> {
        // 1. Quota guard — real accounts only
        if let Some(store) = &self.store {
            if !ctx.policy.skip_fee_check && ctx.key.is_account() {
                check_fee(store.as_ref(), &ctx.key, Utc::now()).await?;
            }
        }

        // 2. Resolve the model; failure is fatal, propagated unchanged
        let model = self.resolver.refine(&ctx.request).await?;

        // 3. Access control
        if let Some(store) = &self.store {
            if !ctx.policy.skip_access_check {
                let allowed = check_model_access(store.as_ref(), &ctx.key, model.id).await?;
                if !allowed {
                    return Err(DispatchError::Permission {
                        model: model.name.clone(),
                    });
                }
            }
        }

        // 4. Stamp pricing before any backend sees the request
        let mut request = ctx.request.clone();
        request.apply_pricing(&model);

        // 5. Select the backend
        let backend = self.registry.get(&model.backend)?;

        debug!(
            model = %model.name,
            backend = %model.backend,
            key = ctx.key.id,
            session = ctx.session_id.as_deref().unwrap_or("-"),
            "dispatching"
        );

        Ok(Prepared {
            backend,
            request,
            model,
        })
    }

    /// Chat entry point.
    pub async fn chat(&self, ctx: &CallContext) -> Result<BackendReply, DispatchError> {
        let prepared = self.prepare(ctx).await?;
        let call = BackendCall {
            model: &prepared.model,
            key: &ctx.key,
            session_id: ctx.session_id.as_deref(),
        };
        prepared.backend.chat(&call, &prepared.request).await
    }

    /// Completion entry point.
    pub async fn complete(&self, ctx: &CallContext) -> Result<BackendReply, DispatchError> {
        let prepared = self.prepare(ctx).await?;
        let call = BackendCall {
            model: &prepared.model,
            key: &ctx.key,
            session_id: ctx.session_id.as_deref(),
        };
        prepared.backend.complete(&call, &prepared.request).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
