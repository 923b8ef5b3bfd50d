//! Store - Usage event persistence
//!
//! This module provides the storage layer for the usage ledger. Every backend
//! implements [`UsageStore`]; the SQL backends use sqlx and scope one pooled
//! connection to each operation.

mod helpers;
mod memory_store;
mod options;
mod postgres_store;
mod sqlite_store;
mod traits;


pub use helpers::{default_data_dir, default_db_path, MonotonicClock};
pub use memory_store::MemoryUsageStore;
pub use options::{PostgresParams, StoreOptions};
pub use postgres_store::PostgresUsageStore;
pub use sqlite_store::SqliteUsageStore;
pub use traits::UsageStore;

#[cfg(test)]
pub use traits::MockUsageStore;
