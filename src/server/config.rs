//! Server configuration types
//!
//! Contains all configuration structures for the metergate server.

use crate::retry::RetryConfig;
use metergate_ledger::{
    default_db_path, EmptyResultPolicy, LedgerConfig, PostgresParams, StoreOptions,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

/// Which backend holds the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgres,
    Memory,
}

/// Usage store configuration.
///
/// Connection parameters are passed to the store as given; only their
/// presence is checked when the store opens.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout() -> u64 {
    5
}
fn default_operation_timeout() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            url: None,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl StoreConfig {
    /// Pool and timeout settings
    pub fn options(&self) -> StoreOptions {
        StoreOptions::new()
            .with_max_connections(self.max_connections)
            .with_acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .with_operation_timeout(Duration::from_secs(self.operation_timeout_secs))
    }

    /// SQLite file location, falling back to the data directory
    pub fn sqlite_path(&self) -> PathBuf {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path)
    }

    /// PostgreSQL connection parameters
    pub fn postgres_params(&self) -> PostgresParams {
        PostgresParams {
            url: self.url.clone(),
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}

/// Ledger read policy (exposed to TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub empty_result: EmptyResultPolicy,
    #[serde(default = "default_max_recent_limit")]
    pub max_recent_limit: i64,
}

fn default_max_recent_limit() -> i64 {
    100
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            empty_result: EmptyResultPolicy::default(),
            max_recent_limit: default_max_recent_limit(),
        }
    }
}

impl From<&LedgerSettings> for LedgerConfig {
    fn from(settings: &LedgerSettings) -> Self {
        LedgerConfig {
            empty_result: settings.empty_result,
            max_recent_limit: settings.max_recent_limit,
        }
    }
}

/// Retry policy for usage writes from the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig::new()
            .with_max_attempts(settings.max_attempts)
            .with_initial_delay(Duration::from_millis(settings.initial_delay_ms))
            .with_max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Sqlite);
        assert!(config.sqlite_path().ends_with("usage.db"));

        let options = config.options();
        assert_eq!(options.max_connections, 5);
        assert_eq!(options.operation_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_store_config_debug_redacts_secrets() {
        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            url: Some("postgres://postgres:hunter2@db/ai_gateway".to_string()),
            password: Some("hunter2".to_string()),
            ..StoreConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(config.postgres_params().ensure_present().is_ok());
    }

    #[test]
    fn test_backend_deserialization() {
        let backend: StoreBackend = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_ledger_settings_conversion() {
        let settings = LedgerSettings {
            empty_result: EmptyResultPolicy::NotFound,
            max_recent_limit: 25,
        };
        let config = LedgerConfig::from(&settings);
        assert_eq!(config.empty_result, EmptyResultPolicy::NotFound);
        assert_eq!(config.max_recent_limit, 25);
    }

    #[test]
    fn test_retry_settings_conversion() {
        let retry = RetryConfig::from(&RetrySettings::default());
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(100));
        assert_eq!(retry.max_delay, Duration::from_millis(2000));
    }
}
