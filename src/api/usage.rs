//! Usage API endpoints
//!
//! GET /usage/{user_id}: per-model token totals for a user.
//! GET /usage/{user_id}/recent: the user's latest usage events.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use metergate_ledger::{UsageAggregate, UsageEvent};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiQuery, AppState};

const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Per-model totals in the usage response
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub request_count: i64,
}

impl From<UsageAggregate> for ModelUsage {
    fn from(agg: UsageAggregate) -> Self {
        Self {
            model: agg.model_name,
            input_tokens: agg.input_tokens,
            output_tokens: agg.output_tokens,
            request_count: agg.request_count,
        }
    }
}

/// Response for GET /usage/{user_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub usage: Vec<ModelUsage>,
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
}

/// Response for GET /usage/{user_id}/recent
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentResponse {
    pub user_id: String,
    pub usage: Vec<UsageEvent>,
}

async fn get_usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UsageResponse>, ApiError> {
    let usage = state.ledger.query_usage(&user_id).await?;

    Ok(Json(UsageResponse {
        usage: usage.into_iter().map(ModelUsage::from).collect(),
    }))
}

async fn get_recent_usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiQuery(params): ApiQuery<RecentParams>,
) -> Result<Json<RecentResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let usage = state.ledger.recent_usage(&user_id, limit).await?;

    Ok(Json(RecentResponse { user_id, usage }))
}

/// Create the usage routes.
pub fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/usage/:user_id", get(get_usage))
        .route("/usage/:user_id/recent", get(get_recent_usage))
}
