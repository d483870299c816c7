//! Monthly billing rollover.
//!
//! When a new calendar month begins, the previous period's accumulated fee
//! is archived into `gate_monthly_bill` and the live counter is reset. The
//! whole read-modify-write runs inside one transaction — callers get the
//! atomicity they assume without taking locks of their own.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::info;

use crate::store::Store;

/// Roll the billing ledger forward for one account.
///
/// Writes a `gate_monthly_bill` row for the period `updated_at` falls in
/// (`"YYYY-MM"`), then zeroes `month_fee` and bumps `updated_at`.
pub async fn rebill_monthly(store: &Store, key_id: i64) -> Result<()> {
    let mut tx = store.pool().begin().await?;

    let row = sqlx::query("SELECT month_fee, updated_at FROM gate_key WHERE id = ?1")
        .bind(key_id)
        .fetch_optional(&mut *tx)
        .await?
        .with_context(|| format!("no such access key: {key_id}"))?;

    let month_fee: f64 = row.get("month_fee");
    let updated_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("updated_at"))
        .context("invalid updated_at in database")?
        .with_timezone(&Utc);
    let period = updated_at.format("%Y-%m").to_string();

    sqlx::query(
        r#"
        INSERT INTO gate_monthly_bill (key_id, period, fee, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(key_id)
    .bind(&period)
    .bind(month_fee)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE gate_key SET month_fee = 0, updated_at = ?2 WHERE id = ?1")
        .bind(key_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(key_id, period = %period, fee = month_fee, "monthly rollover");
    Ok(())
}

/// Archived bill rows for one account, newest first.
pub async fn monthly_bills(store: &Store, key_id: i64) -> Result<Vec<(String, f64)>> {
    let rows = sqlx::query(
        "SELECT period, fee FROM gate_monthly_bill WHERE key_id = ?1 ORDER BY id DESC",
    )
    .bind(key_id)
    .fetch_all(store.pool())
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| (r.get("period"), r.get("fee")))
        .collect())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
