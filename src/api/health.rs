//! Health check endpoint
//!
//! `/health` pings the usage store and answers 503 while it is unreachable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: StoreHealth,
}

/// Usage store status
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub backend: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let backend = state.ledger.store_name().to_string();
    let start = std::time::Instant::now();

    let (code, status, store) = match state.ledger.ping().await {
        Ok(()) => (
            StatusCode::OK,
            "healthy",
            StoreHealth {
                backend,
                status: "healthy".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
        ),
        Err(e) => {
            warn!(error = %e, "Usage store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                StoreHealth {
                    backend,
                    status: "unhealthy".to_string(),
                    latency_ms: None,
                    error: Some(e.to_string()),
                },
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store,
        }),
    )
}

/// Create the health routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
