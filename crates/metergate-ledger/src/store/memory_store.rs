//! MemoryUsageStore - process-local usage ledger

use super::helpers::MonotonicClock;
use super::traits::UsageStore;
use crate::error::{Error, Result};
use crate::event::{require_positive_limit, NewUsage, UsageAggregate, UsageEvent};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Usage store that keeps the ledger in process memory.
///
/// Nothing survives a restart; intended for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    events: RwLock<Vec<UsageEvent>>,
    clock: MonotonicClock,
}

impl MemoryUsageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the ledger is empty
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

fn checked_sum(total: i64, add: i64, column: &str) -> Result<i64> {
    total
        .checked_add(add)
        .ok_or_else(|| Error::Overflow(format!("sum of {column} exceeds i64::MAX")))
}

#[async_trait::async_trait]
impl UsageStore for MemoryUsageStore {
    #[instrument(skip(self, usage), fields(user_id = %usage.user_id, model = %usage.model_name))]
    async fn append(&self, usage: NewUsage) -> Result<UsageEvent> {
        usage.validate()?;
        let mut events = self.events.write().await;

        if let Some(key) = usage.idempotency_key.as_deref() {
            if let Some(existing) = events
                .iter()
                .find(|e| e.idempotency_key.as_deref() == Some(key))
            {
                debug!(idempotency_key = key, "Usage already recorded, returning stored event");
                return usage.accept_replay(existing.clone());
            }
        }

        // Ids follow the SQL backends: 1-based and never reused.
        let id = events.len() as i64 + 1;
        let event = usage.into_event(id, self.clock.now()?);
        events.push(event.clone());

        debug!(id, "Appended usage event");
        Ok(event)
    }

    #[instrument(skip(self))]
    async fn aggregate_by_user(&self, user_id: &str) -> Result<Vec<UsageAggregate>> {
        let events = self.events.read().await;

        let mut by_model: BTreeMap<&str, UsageAggregate> = BTreeMap::new();
        for event in events.iter().filter(|e| e.user_id == user_id) {
            let agg = by_model
                .entry(event.model_name.as_str())
                .or_insert_with(|| UsageAggregate {
                    user_id: user_id.to_string(),
                    model_name: event.model_name.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    request_count: 0,
                });
            agg.input_tokens = checked_sum(agg.input_tokens, event.input_tokens, "input_tokens")?;
            agg.output_tokens =
                checked_sum(agg.output_tokens, event.output_tokens, "output_tokens")?;
            agg.request_count += 1;
        }

        Ok(by_model.into_values().collect())
    }

    #[instrument(skip(self))]
    async fn recent_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>> {
        require_positive_limit(limit)?;
        let events = self.events.read().await;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        // Appends are id- and timestamp-ordered, so reverse order is newest first.
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
