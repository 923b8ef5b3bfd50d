//! Web API module for metergate
//!
//! Provides REST API endpoints for:
//! - Text generation with usage metering
//! - Per-user usage totals and recent usage
//! - Health checks

pub mod error;
pub mod extract;
pub mod generate;
pub mod health;
pub mod usage;


use axum::Router;
use metergate_ledger::UsageLedger;

use crate::retry::RetryConfig;

pub use error::ApiError;
pub use extract::{ApiJson, ApiQuery};
pub use generate::generate_routes;
pub use health::health_routes;
pub use usage::usage_routes;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: UsageLedger,
    pub retry: RetryConfig,
}

impl AppState {
    pub fn new(ledger: UsageLedger, retry: RetryConfig) -> Self {
        Self { ledger, retry }
    }
}

/// Create the API router with all endpoints
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(generate_routes())
        .merge(usage_routes())
        .merge(health_routes())
        .with_state(state)
}
