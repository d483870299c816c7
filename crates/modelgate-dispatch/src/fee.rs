//! Monthly quota guard.
//!
//! Evaluated fresh on every call; the only durable state is what the store
//! holds. When the caller's last fee mutation falls in an earlier billing
//! period, the ledger is rolled forward first, and only then is the
//! quota threshold evaluated — the order is load-bearing, because the
//! rollover zeroes the fee the threshold sees.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use modelgate_core::{AccessKey, DispatchError};
use modelgate_store::Store;

/// The billing collaborator the guard invokes for rollovers.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    async fn rebill_monthly(&self, key_id: i64) -> anyhow::Result<()>;
}

#[async_trait]
impl BillingLedger for Store {
    async fn rebill_monthly(&self, key_id: i64) -> anyhow::Result<()> {
        modelgate_store::rebill_monthly(self, key_id).await
    }
}

/// Gate a call on the caller's monthly spending state.
///
/// 1. With a zero fee counter there is nothing to roll over.
/// 2. Otherwise, a differing calendar month or a strictly later year than
///    `updated_at` opens a new billing period: the ledger is rolled
///    forward and the fee counter is treated as zero for the rest of this
///    evaluation.
/// 3. Hard stop: fee at or past the quota with no remaining balance fails
///    with [`DispatchError::Quota`].
///
/// `now` is injected rather than read from the clock so period boundaries
/// are testable.
pub async fn check_fee(
    ledger: &dyn BillingLedger,
    key: &AccessKey,
    now: DateTime<Utc>,
) -> Result<(), DispatchError> {
    let mut month_fee = key.month_fee;

    if month_fee == 0.0 {
        // Nothing accrued this period: no rollover to run, and the quota
        // threshold cannot trip. Balance alone is never checked here.
        return Ok(());
    }

    let last = key.updated_at;
    if now.month() != last.month() || now.year() > last.year() {
        debug!(key = key.id, fee = month_fee, "billing period ended, rolling over");
        ledger
            .rebill_monthly(key.id)
            .await
            .map_err(DispatchError::store)?;
        month_fee = 0.0;
    }

    if month_fee >= key.month_quota && key.balance <= 0.0 {
        debug!(key = key.id, fee = month_fee, quota = key.month_quota, "quota exhausted");
        return Err(DispatchError::Quota);
    }

    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
