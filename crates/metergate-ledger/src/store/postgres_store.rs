//! PostgresUsageStore - PostgreSQL-based usage ledger

use super::helpers::{with_timeout, MonotonicClock};
use super::options::{PostgresParams, StoreOptions};
use super::traits::UsageStore;
use crate::error::{Error, Result};
use crate::event::{require_positive_limit, NewUsage, UsageAggregate, UsageEvent};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const EVENT_COLUMNS: &str =
    "id, user_id, model_name, input_tokens, output_tokens, timestamp, idempotency_key";

/// Usage store persisting the ledger to PostgreSQL
#[derive(Clone)]
pub struct PostgresUsageStore {
    pool: PgPool,
    clock: Arc<MonotonicClock>,
    options: StoreOptions,
}

impl PostgresUsageStore {
    /// Create a store over an existing pool. The schema must already exist.
    #[must_use]
    pub fn new(pool: PgPool, options: StoreOptions) -> Self {
        Self {
            pool,
            clock: Arc::new(MonotonicClock::new()),
            options,
        }
    }

    /// Connect using externally supplied parameters and ensure the ledger table exists
    pub async fn connect(params: &PostgresParams, options: StoreOptions) -> Result<Self> {
        params.ensure_present()?;

        let connect_options = match params.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                PgConnectOptions::from_str(url).map_err(|e| Error::Configuration(e.to_string()))?
            }
            None => {
                let mut opts = PgConnectOptions::new();
                if let Some(host) = &params.host {
                    opts = opts.host(host);
                }
                if let Some(port) = params.port {
                    opts = opts.port(port);
                }
                if let Some(user) = &params.user {
                    opts = opts.username(user);
                }
                if let Some(password) = &params.password {
                    opts = opts.password(password);
                }
                if let Some(database) = &params.database {
                    opts = opts.database(database);
                }
                opts
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await?;

        let store = Self::new(pool, options);
        store.ensure_schema().await?;

        info!(
            host = params.host.as_deref().unwrap_or("<url>"),
            "PostgreSQL usage store initialized"
        );
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_log (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                model_name TEXT NOT NULL,
                input_tokens BIGINT NOT NULL CHECK (input_tokens >= 0),
                output_tokens BIGINT NOT NULL CHECK (output_tokens >= 0),
                timestamp TIMESTAMPTZ NOT NULL,
                idempotency_key TEXT UNIQUE
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

        debug!("Usage ledger schema ready");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert(&self, usage: NewUsage) -> Result<UsageEvent> {
        let mut conn = self.pool.acquire().await?;
        let timestamp = self.clock.now()?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO usage_log (
                user_id, model_name, input_tokens, output_tokens, timestamp, idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&usage.user_id)
        .bind(&usage.model_name)
        .bind(usage.input_tokens)
        .bind(usage.output_tokens)
        .bind(timestamp)
        .bind(&usage.idempotency_key)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                Ok(usage.into_event(id, timestamp))
            }
            None => {
                let key = usage.idempotency_key.as_deref().ok_or_else(|| {
                    Error::StoreUnavailable("insert returned no row".to_string())
                })?;

                let row = sqlx::query(&format!(
                    "SELECT {EVENT_COLUMNS} FROM usage_log WHERE idempotency_key = $1"
                ))
                .bind(key)
                .fetch_one(&mut *conn)
                .await?;

                debug!(idempotency_key = key, "Usage already recorded, returning stored event");
                usage.accept_replay(pg_row_to_event(row)?)
            }
        }
    }

    async fn aggregate(&self, user_id: &str) -> Result<Vec<UsageAggregate>> {
        let mut conn = self.pool.acquire().await?;

        // SUM(bigint) is NUMERIC in PostgreSQL
        let rows = sqlx::query(
            r#"
            SELECT model_name,
                   SUM(input_tokens)::BIGINT AS input_tokens,
                   SUM(output_tokens)::BIGINT AS output_tokens,
                   COUNT(*) AS request_count
            FROM usage_log
            WHERE user_id = $1
            GROUP BY model_name
            ORDER BY model_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<UsageAggregate> {
                Ok(UsageAggregate {
                    user_id: user_id.to_string(),
                    model_name: row.try_get("model_name")?,
                    input_tokens: row.try_get("input_tokens")?,
                    output_tokens: row.try_get("output_tokens")?,
                    request_count: row.try_get("request_count")?,
                })
            })
            .collect()
    }

    async fn recent(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM usage_log
            WHERE user_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(pg_row_to_event).collect()
    }
}

fn pg_row_to_event(row: PgRow) -> Result<UsageEvent> {
    Ok(UsageEvent {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        model_name: row.try_get("model_name")?,
        input_tokens: row.try_get("input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        timestamp: row.try_get("timestamp")?,
        idempotency_key: row.try_get("idempotency_key")?,
    })
}

#[async_trait::async_trait]
impl UsageStore for PostgresUsageStore {
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
        "postgres"
    }
}
