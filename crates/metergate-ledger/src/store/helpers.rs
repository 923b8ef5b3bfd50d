//! Helper functions for store module

use crate::error::{Error, Result};
use crate::event::{UsageAggregate, UsageEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Write-time clock that never goes backwards within one store instance.
///
/// Concurrent writers may still commit in a different order than their
/// timestamps; the guarantee is per clock, not across the ledger.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    /// Create a new clock
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current UTC time, clamped to the latest value previously handed out
    pub fn now(&self) -> Result<DateTime<Utc>> {
        let candidate = Utc::now().timestamp_micros();
        let previous = self.last_micros.fetch_max(candidate, Ordering::SeqCst);
        let micros = previous.max(candidate);

        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| Error::StoreUnavailable(format!("clock out of range: {micros}")))
    }
}

/// Run a store operation under a deadline; expiry is reported as unavailability
pub(crate) async fn with_timeout<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::StoreUnavailable(format!(
            "{op} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Fixed-width RFC 3339 so that lexical order matches chronological order
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StoreUnavailable(format!("invalid timestamp in ledger: {e}")))
}

/// Convert a SQLite row to a UsageEvent
pub(crate) fn row_to_event(row: SqliteRow) -> Result<UsageEvent> {
    let timestamp_str: String = row.try_get("timestamp")?;

    Ok(UsageEvent {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        model_name: row.try_get("model_name")?,
        input_tokens: row.try_get("input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        timestamp: parse_timestamp(&timestamp_str)?,
        idempotency_key: row.try_get("idempotency_key")?,
    })
}

/// Convert a SQLite aggregate row to a UsageAggregate
pub(crate) fn row_to_aggregate(user_id: &str, row: SqliteRow) -> Result<UsageAggregate> {
    Ok(UsageAggregate {
        user_id: user_id.to_string(),
        model_name: row.try_get("model_name")?,
        input_tokens: row.try_get("input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        request_count: row.try_get("request_count")?,
    })
}

/// Get the default data directory for metergate
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".metergate"))
        .unwrap_or_else(|| std::path::PathBuf::from(".metergate"))
}

/// Get the default ledger database path
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("usage.db")
}
