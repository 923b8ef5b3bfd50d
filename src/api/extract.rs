//! Extractors whose rejections use the JSON error body

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::Json;

use super::ApiError;

/// `Json` that rejects with [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` that rejects with [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
