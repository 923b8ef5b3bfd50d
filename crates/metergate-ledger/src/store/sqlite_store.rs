//! SqliteUsageStore - SQLite-based usage ledger

use super::helpers::{
    format_timestamp, row_to_aggregate, row_to_event, with_timeout, MonotonicClock,
};
use super::options::StoreOptions;
use super::traits::UsageStore;
use crate::error::{Error, Result};
use crate::event::{require_positive_limit, NewUsage, UsageAggregate, UsageEvent};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const EVENT_COLUMNS: &str =
    "id, user_id, model_name, input_tokens, output_tokens, timestamp, idempotency_key";

/// Usage store persisting the ledger to SQLite
#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
    clock: Arc<MonotonicClock>,
    options: StoreOptions,
}

impl SqliteUsageStore {
    /// Create a store over an existing pool. The schema must already exist.
    #[must_use]
    pub fn new(pool: SqlitePool, options: StoreOptions) -> Self {
        Self {
            pool,
            clock: Arc::new(MonotonicClock::new()),
            options,
        }
    }

    /// Open (or create) a ledger database file
    pub async fn from_path(db_path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!("failed to create directory: {e}"))
            })?;
        }

        let connect_options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            db_path.display()
        ))
        .map_err(|e| Error::Configuration(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await?;

        let store = Self::new(pool, options);
        store.ensure_schema().await?;

        info!("SQLite usage store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection that is never recycled: the database lives and
        // dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::new(pool, StoreOptions::default());
        store.ensure_schema().await?;

        debug!("In-memory SQLite usage store initialized");
        Ok(store)
    }

    /// Create the ledger table and indexes if missing
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                model_name TEXT NOT NULL,
                input_tokens INTEGER NOT NULL CHECK (input_tokens >= 0),
                output_tokens INTEGER NOT NULL CHECK (output_tokens >= 0),
                timestamp TEXT NOT NULL,
                idempotency_key TEXT
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_log_user_model
            ON usage_log(user_id, model_name)
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_log_user_time
            ON usage_log(user_id, timestamp DESC)
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_usage_log_idempotency
            ON usage_log(idempotency_key)
            "#,
        )
        .execute(&mut *conn)
        .await?;

        debug!("Usage ledger schema ready");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert(&self, usage: NewUsage) -> Result<UsageEvent> {
        // The guard returns the connection to the pool on every exit path.
        let mut conn = self.pool.acquire().await?;
        let timestamp = self.clock.now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO usage_log (
                user_id, model_name, input_tokens, output_tokens, timestamp, idempotency_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(idempotency_key) DO NOTHING
            "#,
        )
        .bind(&usage.user_id)
        .bind(&usage.model_name)
        .bind(usage.input_tokens)
        .bind(usage.output_tokens)
        .bind(format_timestamp(timestamp))
        .bind(&usage.idempotency_key)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let key = usage.idempotency_key.as_deref().ok_or_else(|| {
                Error::StoreUnavailable("insert affected no rows".to_string())
            })?;

            let row = sqlx::query(&format!(
                "SELECT {EVENT_COLUMNS} FROM usage_log WHERE idempotency_key = ?1"
            ))
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

            debug!(idempotency_key = key, "Usage already recorded, returning stored event");
            return usage.accept_replay(row_to_event(row)?);
        }

        Ok(usage.into_event(result.last_insert_rowid(), timestamp))
    }

    async fn aggregate(&self, user_id: &str) -> Result<Vec<UsageAggregate>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(
            r#"
            SELECT model_name,
                   SUM(input_tokens) AS input_tokens,
                   SUM(output_tokens) AS output_tokens,
                   COUNT(*) AS request_count
            FROM usage_log
            WHERE user_id = ?1
            GROUP BY model_name
            ORDER BY model_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| row_to_aggregate(user_id, row))
            .collect()
    }

    async fn recent(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM usage_log
            WHERE user_id = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }
}

#[async_trait::async_trait]
impl UsageStore for SqliteUsageStore {
    #[instrument(skip(self, usage), fields(user_id = %usage.user_id, model = %usage.model_name))]
    async fn append(&self, usage: NewUsage) -> Result<UsageEvent> {
        usage.validate()?;
        let event = with_timeout(self.options.operation_timeout, "append", self.insert(usage))
            .await?;
        debug!(id = event.id, "Appended usage event");
        Ok(event)
    }

    #[instrument(skip(self))]
    async fn aggregate_by_user(&self, user_id: &str) -> Result<Vec<UsageAggregate>> {
        with_timeout(
            self.options.operation_timeout,
            "aggregate_by_user",
            self.aggregate(user_id),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn recent_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>> {
        require_positive_limit(limit)?;
        with_timeout(
            self.options.operation_timeout,
            "recent_by_user",
            self.recent(user_id, limit),
        )
        .await
    }

    async fn ping(&self) -> Result<()> {
        with_timeout(self.options.operation_timeout, "ping", async {
            let mut conn = self.pool.acquire().await?;
            sqlx::query("SELECT 1").execute(&mut *conn).await?;
            Ok::<(), Error>(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
