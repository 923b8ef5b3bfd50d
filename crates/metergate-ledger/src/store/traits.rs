//! Trait for usage storage backends

use crate::error::Result;
use crate::event::{NewUsage, UsageAggregate, UsageEvent};

/// Trait for usage storage backends
///
/// This trait allows different storage implementations (SQLite, PostgreSQL,
/// in-memory) to be used interchangeably by the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    /// Insert one usage record and return it with its assigned id and timestamp.
    ///
    /// When the record carries an idempotency key that is already stored, the
    /// existing event is returned and nothing is written.
    async fn append(&self, usage: NewUsage) -> Result<UsageEvent>;

    /// Per-model token sums for a user, empty when the user has no events
    async fn aggregate_by_user(&self, user_id: &str) -> Result<Vec<UsageAggregate>>;

    /// The user's most recent events, newest first, at most `limit` of them
    async fn recent_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<UsageEvent>>;

    /// Check that the backing store is reachable
    async fn ping(&self) -> Result<()>;

    /// Get the store name (for logging)
    fn name(&self) -> &'static str;
}
