//! Metergate Ledger - token usage ledger
//!
//! This crate provides the usage-metering core of metergate:
//! - Event: usage records and derived per-model aggregates
//! - Store: append-only persistence (SQLite, PostgreSQL, in-memory)
//! - Ledger: validated record/query contract over any store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod ledger;
pub mod store;

pub use error::{Error, Result};
pub use event::{NewUsage, UsageAggregate, UsageEvent};
pub use ledger::{EmptyResultPolicy, LedgerConfig, UsageLedger};
pub use store::{
    default_db_path, MemoryUsageStore, PostgresParams, PostgresUsageStore, SqliteUsageStore,
    StoreOptions, UsageStore,
};
