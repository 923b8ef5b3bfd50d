//! Ledger - the public usage-metering contract
//!
//! `UsageLedger` validates requests before they reach a [`UsageStore`] and
//! passes store failures through untouched. It holds no state of its own
//! beyond the store handle and its read policy.

use crate::error::{Error, Result};
use crate::event::{
    require_identifier, require_positive_limit, NewUsage, UsageAggregate, UsageEvent,
};
use crate::store::UsageStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default cap for `recent_usage`
const DEFAULT_MAX_RECENT_LIMIT: i64 = 100;

/// How reads treat a user with no recorded usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// Return an empty list
    #[default]
    ReturnEmpty,
    /// Report [`Error::NotFound`]
    NotFound,
}

/// Ledger read policy
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Behaviour for users without events
    pub empty_result: EmptyResultPolicy,
    /// Largest `limit` honoured by `recent_usage`; larger values are clamped
    pub max_recent_limit: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            empty_result: EmptyResultPolicy::ReturnEmpty,
            max_recent_limit: DEFAULT_MAX_RECENT_LIMIT,
        }
    }
}

/// Usage ledger service
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    config: LedgerConfig,
}

impl UsageLedger {
    /// Create a ledger with the default read policy
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    /// Create a ledger with an explicit read policy
    pub fn with_config(store: Arc<dyn UsageStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Name of the backing store
    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Read policy in effect
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Record one usage event.
    ///
    /// Invalid input fails with [`Error::InvalidArgument`] and never touches
    /// the store.
    #[instrument(skip(self))]
    pub async fn record_usage(
        &self,
        user_id: &str,
        model_name: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<UsageEvent> {
        self.record(NewUsage::new(user_id, model_name, input_tokens, output_tokens))
            .await
    }

    /// Record one usage event, de-duplicated on `idempotency_key`.
    ///
    /// A retry carrying a key that was already stored returns the original
    /// event instead of writing a second record.
    #[instrument(skip(self))]
    pub async fn record_usage_idempotent(
        &self,
        idempotency_key: &str,
        user_id: &str,
        model_name: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<UsageEvent> {
        self.record(
            NewUsage::new(user_id, model_name, input_tokens, output_tokens)
                .with_idempotency_key(idempotency_key),
        )
        .await
    }

    async fn record(&self, usage: NewUsage) -> Result<UsageEvent> {
        usage.validate()?;
        let event = self.store.append(usage).await?;
        debug!(id = event.id, "Usage recorded");
        Ok(event)
    }

    /// Per-model token totals for a user
    #[instrument(skip(self))]
    pub async fn query_usage(&self, user_id: &str) -> Result<Vec<UsageAggregate>> {
        require_identifier("user_id", user_id)?;

        let aggregates = self.store.aggregate_by_user(user_id).await?;
        self.apply_empty_policy(user_id, aggregates)
    }

    /// A user's most recent events, newest first
    #[instrument(skip(self))]
    pub async fn recent_usage(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>> {
        require_identifier("user_id", user_id)?;
        require_positive_limit(limit)?;

        let limit = limit.min(self.config.max_recent_limit.max(1));
        let events = self.store.recent_by_user(user_id, limit).await?;
        self.apply_empty_policy(user_id, events)
    }

    /// Check that the backing store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    fn apply_empty_policy<T>(&self, user_id: &str, rows: Vec<T>) -> Result<Vec<T>> {
        if rows.is_empty() && self.config.empty_result == EmptyResultPolicy::NotFound {
            return Err(Error::NotFound(format!("no usage found for user_id {user_id}")));
        }
        Ok(rows)
    }
}
