//! Store initialization functions
//!
//! Opens the configured usage store and wraps it in a ledger.

use anyhow::{Context, Result};
use metergate_ledger::{
    LedgerConfig, MemoryUsageStore, PostgresUsageStore, SqliteUsageStore, UsageLedger, UsageStore,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{AppConfig, StoreBackend, StoreConfig};

/// Open the usage store selected by `config.backend`
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn UsageStore>> {
    let options = config.options();

    let store: Arc<dyn UsageStore> = match config.backend {
        StoreBackend::Sqlite => {
            let db_path = config.sqlite_path();
            let store = SqliteUsageStore::from_path(&db_path, options)
                .await
                .context("Failed to initialize SQLite usage store")?;
            info!("SQLite usage store initialized at {}", db_path.display());
            Arc::new(store)
        }
        StoreBackend::Postgres => {
            let store = PostgresUsageStore::connect(&config.postgres_params(), options)
                .await
                .context("Failed to initialize PostgreSQL usage store")?;
            info!("PostgreSQL usage store initialized");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory usage store; usage is lost on restart");
            Arc::new(MemoryUsageStore::new())
        }
    };

    Ok(store)
}

/// Open the store and build the ledger with the configured read policy
pub async fn build_ledger(config: &AppConfig) -> Result<UsageLedger> {
    let store = open_store(&config.store).await?;
    Ok(UsageLedger::with_config(
        store,
        LedgerConfig::from(&config.ledger),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_postgres_without_parameters_fails() {
        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            ..StoreConfig::default()
        };
        let err = open_store(&config).await.err().unwrap();
        assert!(format!("{err:#}").contains("configuration error"));
    }

    #[tokio::test]
    async fn test_open_sqlite_store_at_path() {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let dir = std::env::temp_dir().join(format!("metergate-init-{}-{}", std::process::id(), nanos));
        let config = StoreConfig {
            path: Some(dir.join("usage.db").display().to_string()),
            ..StoreConfig::default()
        };

        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(dir.join("usage.db").exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
