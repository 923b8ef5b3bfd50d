//! Generation endpoint
//!
//! POST /generate: produces a placeholder completion and meters its tokens.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiJson, AppState};
use crate::retry::retry_with_backoff;

/// Output tokens charged for the larger model
const LARGE_MODEL_OUTPUT_TOKENS: i64 = 50;
/// Output tokens charged for every other model
const DEFAULT_OUTPUT_TOKENS: i64 = 20;
const LARGE_MODEL: &str = "gpt-4";

/// Request body for POST /generate
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: String,
    pub prompt: String,
    pub model_name: String,
}

/// Response for POST /generate
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Rough token counts for a prompt: one input token per word, a fixed
/// output size per model.
pub fn estimate_tokens(prompt: &str, model_name: &str) -> (i64, i64) {
    let input = prompt.split_whitespace().count() as i64;
    let output = if model_name == LARGE_MODEL {
        LARGE_MODEL_OUTPUT_TOKENS
    } else {
        DEFAULT_OUTPUT_TOKENS
    };
    (input, output)
}

/// POST /generate handler.
///
/// The write carries a fresh idempotency key, so retrying it after a store
/// fault never double-counts.
async fn generate(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let (input_tokens, output_tokens) = estimate_tokens(&req.prompt, &req.model_name);
    let response = format!("Generated text using model {}", req.model_name);

    let key = Uuid::new_v4().to_string();
    let event = retry_with_backoff(
        &state.retry,
        || {
            state.ledger.record_usage_idempotent(
                &key,
                &req.user_id,
                &req.model_name,
                input_tokens,
                output_tokens,
            )
        },
        metergate_ledger::Error::is_retryable,
    )
    .await?;

    info!(
        user_id = %event.user_id,
        model = %event.model_name,
        input_tokens,
        output_tokens,
        "Usage metered"
    );

    Ok(Json(GenerateResponse {
        response,
        input_tokens,
        output_tokens,
    }))
}

/// Create the generation routes.
pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_words() {
        assert_eq!(estimate_tokens("tell me  a\tjoke\n", "gpt-3"), (4, 20));
        assert_eq!(estimate_tokens("", "gpt-3"), (0, 20));
    }

    #[test]
    fn test_estimate_large_model_output() {
        assert_eq!(estimate_tokens("hello", "gpt-4"), (1, 50));
        assert_eq!(estimate_tokens("hello", "gpt-4o"), (1, 20));
    }
}
