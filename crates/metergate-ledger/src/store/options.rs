//! Connection options shared by the SQL backends

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default maximum pooled connections
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default time to wait for a pooled connection
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upper bound for one store operation
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool and timeout settings for a store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Time to wait for a free connection before failing
    pub acquire_timeout: Duration,
    /// Upper bound for a single append or query, connection acquisition included
    pub operation_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl StoreOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum pooled connections
    #[must_use]
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Set connection acquisition timeout
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set per-operation timeout
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// PostgreSQL connection parameters.
///
/// Either `url` or the `host`/`user`/`database` triple must be present; the
/// values are otherwise passed through untouched.
#[derive(Clone, Default)]
pub struct PostgresParams {
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    /// Server host
    pub host: Option<String>,
    /// Server port (driver default when unset)
    pub port: Option<u16>,
    /// Login role
    pub user: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Database name
    pub database: Option<String>,
}

impl PostgresParams {
    /// Parameters from a full connection URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Fail with [`Error::Configuration`] when a required parameter is missing
    pub fn ensure_present(&self) -> Result<()> {
        if self.url.as_deref().is_some_and(|u| !u.is_empty()) {
            return Ok(());
        }

        let missing: Vec<&str> = [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().is_none_or(str::is_empty))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "postgres store requires a url or {}",
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Debug for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresParams")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_options_defaults() {
        let options = StoreOptions::default();
        assert_eq!(options.max_connections, 5);
        assert_eq!(options.acquire_timeout, Duration::from_secs(5));
        assert_eq!(options.operation_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_store_options_builder() {
        let options = StoreOptions::new()
            .with_max_connections(0)
            .with_operation_timeout(Duration::from_millis(250));
        assert_eq!(options.max_connections, 1);
        assert_eq!(options.operation_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_params_from_url_are_present() {
        let params = PostgresParams::from_url("postgres://postgres@localhost/ai_gateway");
        assert!(params.ensure_present().is_ok());
    }

    #[test]
    fn test_params_missing_fields() {
        let params = PostgresParams {
            host: Some("localhost".to_string()),
            ..PostgresParams::default()
        };
        let err = params.ensure_present().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("user") && m.contains("database")));
    }

    #[test]
    fn test_params_debug_redacts_password() {
        let params = PostgresParams {
            host: Some("localhost".to_string()),
            user: Some("postgres".to_string()),
            password: Some("hunter2".to_string()),
            database: Some("ai_gateway".to_string()),
            ..PostgresParams::default()
        };
        assert!(params.ensure_present().is_ok());
        let debug = format!("{params:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
