//! SQLite store — accounts, models, grants.
//!
//! Timestamps are stored as RFC 3339 TEXT. Settings blobs are stored as
//! JSON TEXT and surfaced as `serde_json::Value`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use modelgate_core::{AccessKey, ModelConfig};

/// Table holding group-level access grants.
pub const GROUP_MODEL_TABLE: &str = "gate_group_model";
/// Table holding personal access grants.
pub const KEY_MODEL_TABLE: &str = "gate_key_model";

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

/// Connection pool plus the typed queries the dispatch core consumes.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccessKey {
    pub name: String,
    pub api_key: String,
    pub group_id: i64,
    pub month_quota: f64,
    pub balance: f64,
}

/// Parameters for registering a model.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub backend: String,
    pub price_in: Option<f64>,
    pub price_out: Option<f64>,
    pub currency: Option<String>,
    pub settings: serde_json::Value,
}

impl Store {
    /// Open (and create if missing) the database at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            path.as_ref().to_string_lossy()
        ))?
        .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database, used by tests and throwaway deployments.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Raw pool handle for collaborators that run their own queries
    /// (the billing rollover runs inside its own transaction).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gate_key (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL UNIQUE,
                group_id INTEGER NOT NULL DEFAULT 0,
                month_fee REAL NOT NULL DEFAULT 0,
                month_quota REAL NOT NULL DEFAULT 0,
                balance REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gate_model (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                backend TEXT NOT NULL,
                price_in REAL,
                price_out REAL,
                currency TEXT,
                settings TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gate_group_model (
                group_id INTEGER NOT NULL,
                model_id INTEGER NOT NULL,
                PRIMARY KEY (group_id, model_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gate_key_model (
                key_id INTEGER NOT NULL,
                model_id INTEGER NOT NULL,
                PRIMARY KEY (key_id, model_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gate_monthly_bill (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key_id INTEGER NOT NULL,
                period TEXT NOT NULL,
                fee REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Existence predicate ──

    /// Whether a row exists matching two equality conditions joined by AND.
    ///
    /// `table` and the column names in `cols` must be compile-time
    /// constants (they are interpolated into the SQL text); only the two
    /// id values are bound as parameters.
    pub async fn exists(
        &self,
        table: &str,
        cols: (&str, &str),
        ids: (i64, i64),
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2)",
            table, cols.0, cols.1
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(ids.0)
            .bind(ids.1)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    /// Group-level grant: may every member of `group_id` use `model_id`?
    pub async fn group_grant_exists(&self, group_id: i64, model_id: i64) -> Result<bool> {
        self.exists(GROUP_MODEL_TABLE, ("group_id", "model_id"), (group_id, model_id))
            .await
    }

    /// Personal grant: may the single account `key_id` use `model_id`?
    pub async fn personal_grant_exists(&self, key_id: i64, model_id: i64) -> Result<bool> {
        self.exists(KEY_MODEL_TABLE, ("key_id", "model_id"), (key_id, model_id))
            .await
    }

    // ── Accounts ──

    /// Create an account with a zeroed fee counter.
    pub async fn create_key(&self, new: NewAccessKey) -> Result<AccessKey> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO gate_key (name, api_key, group_id, month_fee, month_quota, balance, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)
            "#,
        )
        .bind(&new.name)
        .bind(&new.api_key)
        .bind(new.group_id)
        .bind(new.month_quota)
        .bind(new.balance)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key = %new.name, "created access key");

        Ok(AccessKey {
            id: result.last_insert_rowid(),
            name: new.name,
            api_key: new.api_key,
            group_id: new.group_id,
            month_fee: 0.0,
            month_quota: new.month_quota,
            balance: new.balance,
            updated_at: now,
        })
    }

    /// Look an account up by its opaque API key string.
    pub async fn find_key_by_api_key(&self, api_key: &str) -> Result<Option<AccessKey>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, api_key, group_id, month_fee, month_quota, balance, updated_at
            FROM gate_key WHERE api_key = ?1
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_key_row).transpose()
    }

    /// Look an account up by id.
    pub async fn find_key(&self, id: i64) -> Result<Option<AccessKey>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, api_key, group_id, month_fee, month_quota, balance, updated_at
            FROM gate_key WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_key_row).transpose()
    }

    /// Accrue usage fee onto an account after a completed call.
    ///
    /// Keeps `month_fee` monotonically non-decreasing within the billing
    /// period and bumps `updated_at` so the next rollover check sees the
    /// accrual month.
    pub async fn add_fee(&self, key_id: i64, amount: f64) -> Result<()> {
        let changed = sqlx::query(
            r#"
            UPDATE gate_key
            SET month_fee = month_fee + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(key_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        anyhow::ensure!(changed == 1, "no such access key: {key_id}");
        Ok(())
    }

    // ── Models ──

    /// Register a model in the routing table.
    pub async fn create_model(&self, new: NewModel) -> Result<ModelConfig> {
        let settings = serde_json::to_string(&new.settings)?;
        let result = sqlx::query(
            r#"
            INSERT INTO gate_model (name, backend, price_in, price_out, currency, settings)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&new.name)
        .bind(&new.backend)
        .bind(new.price_in)
        .bind(new.price_out)
        .bind(&new.currency)
        .bind(&settings)
        .execute(&self.pool)
        .await?;

        debug!(model = %new.name, backend = %new.backend, "registered model");

        Ok(ModelConfig {
            id: result.last_insert_rowid(),
            name: new.name,
            backend: new.backend,
            price_in: new.price_in,
            price_out: new.price_out,
            currency: new.currency,
            settings: new.settings,
        })
    }

    /// Look a model up by its display name.
    pub async fn find_model_by_name(&self, name: &str) -> Result<Option<ModelConfig>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, backend, price_in, price_out, currency, settings
            FROM gate_model WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_model_row).transpose()
    }

    /// All registered models, ordered by name.
    pub async fn list_models(&self) -> Result<Vec<ModelConfig>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, backend, price_in, price_out, currency, settings
            FROM gate_model ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_model_row).collect()
    }

    /// Distinct backend keys the model table routes to.
    pub async fn list_backend_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT backend FROM gate_model ORDER BY backend ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("backend")).collect())
    }

    // ── Grants ──

    /// Allow every member of `group_id` to use `model_id`.
    pub async fn grant_group(&self, group_id: i64, model_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO gate_group_model (group_id, model_id) VALUES (?1, ?2)",
        )
        .bind(group_id)
        .bind(model_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Allow the single account `key_id` to use `model_id`.
    pub async fn grant_key(&self, key_id: i64, model_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO gate_key_model (key_id, model_id) VALUES (?1, ?2)")
            .bind(key_id)
            .bind(model_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────

fn map_key_row(row: SqliteRow) -> Result<AccessKey> {
    Ok(AccessKey {
        id: row.get("id"),
        name: row.get("name"),
        api_key: row.get("api_key"),
        group_id: row.get("group_id"),
        month_fee: row.get("month_fee"),
        month_quota: row.get("month_quota"),
        balance: row.get("balance"),
        updated_at: parse_rfc3339(row.get::<String, _>("updated_at"))?,
    })
}

fn map_model_row(row: SqliteRow) -> Result<ModelConfig> {
    let settings: String = row.get("settings");
    Ok(ModelConfig {
        id: row.get("id"),
        name: row.get("name"),
        backend: row.get("backend"),
        price_in: row.get("price_in"),
        price_out: row.get("price_out"),
        currency: row.get("currency"),
        settings: serde_json::from_str(&settings).context("invalid settings JSON in database")?,
    })
}

fn parse_rfc3339(value: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_key(name: &str, api_key: &str, group_id: i64) -> NewAccessKey {
        NewAccessKey {
            name: name.to_string(),
            api_key: api_key.to_string(),
            group_id,
            month_quota: 50.0,
            balance: 0.0,
        }
    }

    fn sample_model(name: &str, backend: &str) -> NewModel {
        NewModel {
            name: name.to_string(),
            backend: backend.to_string(),
            price_in: Some(0.002),
            price_out: Some(0.006),
            currency: Some("USD".to_string()),
            settings: json!({"endpoint": "https://api.example.com/v1"}),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_key() {
        let store = Store::in_memory().await.unwrap();
        let created = store.create_key(sample_key("alice", "mg-a1", 2)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.month_fee, 0.0);

        let by_api = store.find_key_by_api_key("mg-a1").await.unwrap().unwrap();
        assert_eq!(by_api.id, created.id);
        assert_eq!(by_api.group_id, 2);

        let by_id = store.find_key(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "alice");
    }

    #[tokio::test]
    async fn test_find_key_missing() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.find_key_by_api_key("nope").await.unwrap().is_none());
        assert!(store.find_key(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_api_key_rejected() {
        let store = Store::in_memory().await.unwrap();
        store.create_key(sample_key("a", "mg-dup", 1)).await.unwrap();
        assert!(store.create_key(sample_key("b", "mg-dup", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_model_round_trip_with_settings() {
        let store = Store::in_memory().await.unwrap();
        let created = store.create_model(sample_model("Atlas", "chat-completions")).await.unwrap();

        let found = store.find_model_by_name("Atlas").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.backend, "chat-completions");
        assert_eq!(found.setting_str("endpoint"), Some("https://api.example.com/v1"));
        assert!(store.find_model_by_name("Nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_backend_keys_distinct_sorted() {
        let store = Store::in_memory().await.unwrap();
        store.create_model(sample_model("M1", "painter")).await.unwrap();
        store.create_model(sample_model("M2", "chat-completions")).await.unwrap();
        store.create_model(sample_model("M3", "chat-completions")).await.unwrap();

        let keys = store.list_backend_keys().await.unwrap();
        assert_eq!(keys, vec!["chat-completions", "painter"]);
    }

    #[tokio::test]
    async fn test_exists_predicate_and_grants() {
        let store = Store::in_memory().await.unwrap();
        let key = store.create_key(sample_key("carol", "mg-c", 4)).await.unwrap();
        let model = store.create_model(sample_model("Atlas", "chat-completions")).await.unwrap();

        assert!(!store.group_grant_exists(4, model.id).await.unwrap());
        assert!(!store.personal_grant_exists(key.id, model.id).await.unwrap());

        store.grant_group(4, model.id).await.unwrap();
        store.grant_key(key.id, model.id).await.unwrap();

        assert!(store.group_grant_exists(4, model.id).await.unwrap());
        assert!(store.personal_grant_exists(key.id, model.id).await.unwrap());
        // Different group / key ids don't match
        assert!(!store.group_grant_exists(5, model.id).await.unwrap());
        assert!(!store.personal_grant_exists(key.id + 1, model.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        store.grant_group(1, 2).await.unwrap();
        store.grant_group(1, 2).await.unwrap();
        assert!(store.group_grant_exists(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_fee_accrues_and_bumps_updated_at() {
        let store = Store::in_memory().await.unwrap();
        let key = store.create_key(sample_key("dave", "mg-d", 1)).await.unwrap();

        store.add_fee(key.id, 1.5).await.unwrap();
        store.add_fee(key.id, 0.5).await.unwrap();

        let after = store.find_key(key.id).await.unwrap().unwrap();
        assert_eq!(after.month_fee, 2.0);
        assert!(after.updated_at >= key.updated_at);
    }

    #[tokio::test]
    async fn test_add_fee_unknown_key_errors() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.add_fee(42, 1.0).await.is_err());
    }
}
