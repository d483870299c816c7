//! Configuration schema for a Modelgate deployment.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! `#[serde(rename_all = "camelCase")]` handles the conversion.
//!
//! Backends and models are NOT configured here — backends are registered in
//! code at startup and models live in the store, so the file stays small:
//! where the store is, and how outbound HTTP behaves.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.modelgate/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub store: StoreConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

/// Where the SQLite store lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Path to the database file. Created on first connect.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: crate::utils::default_store_path()
                .to_string_lossy()
                .into_owned(),
        }
    }
}

// ─────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────

/// Outbound HTTP behavior shared by the backend adapters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// Per-request timeout for upstream calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.store.path.ends_with("modelgate.db"));
        assert_eq!(cfg.http.timeout_secs, 120);
    }

    #[test]
    fn test_camel_case_keys() {
        let cfg: Config = serde_json::from_str(
            r#"{"store": {"path": "/tmp/gate.db"}, "http": {"timeoutSecs": 30}}"#,
        )
        .unwrap();
        assert_eq!(cfg.store.path, "/tmp/gate.db");
        assert_eq!(cfg.http.timeout_secs, 30);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"store": {"path": "/data/x.db"}}"#).unwrap();
        assert_eq!(cfg.store.path, "/data/x.db");
        assert_eq!(cfg.http.timeout_secs, 120);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["http"].get("timeoutSecs").is_some());
    }
}
