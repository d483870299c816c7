//! Model access control.
//!
//! Two grant levels exist: group-model and key-model. The group level is
//! policy precedence, not an optimisation — when a group grant exists the
//! personal predicate must not be evaluated at all, and a personal grant
//! can never pre-empt the group check by running first.

use async_trait::async_trait;
use tracing::debug;

use modelgate_core::{AccessKey, DispatchError};
use modelgate_store::Store;

/// Grant lookups the access controller consumes.
#[async_trait]
pub trait GrantSource: Send + Sync {
    async fn group_grant_exists(&self, group_id: i64, model_id: i64) -> anyhow::Result<bool>;
    async fn personal_grant_exists(&self, key_id: i64, model_id: i64) -> anyhow::Result<bool>;
}

#[async_trait]
impl GrantSource for Store {
    async fn group_grant_exists(&self, group_id: i64, model_id: i64) -> anyhow::Result<bool> {
        Store::group_grant_exists(self, group_id, model_id).await
    }

    async fn personal_grant_exists(&self, key_id: i64, model_id: i64) -> anyhow::Result<bool> {
        Store::personal_grant_exists(self, key_id, model_id).await
    }
}

/// May `key` use the model with id `model_id`?
///
/// Group grant first; on a hit the answer is yes and the personal
/// predicate is never evaluated. Otherwise the answer is exactly the
/// personal predicate's result.
pub async fn check_model_access(
    grants: &dyn GrantSource,
    key: &AccessKey,
    model_id: i64,
) -> Result<bool, DispatchError> {
    if grants
        .group_grant_exists(key.group_id, model_id)
        .await
        .map_err(DispatchError::store)?
    {
        debug!(key = key.id, group = key.group_id, model_id, "group grant");
        return Ok(true);
    }

    let personal = grants
        .personal_grant_exists(key.id, model_id)
        .await
        .map_err(DispatchError::store)?;
    debug!(key = key.id, model_id, allowed = personal, "personal grant check");
    Ok(personal)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
