//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Engine operations convert
//! shared-tier errors into fail-open outcomes; these variants surface only at
//! the `SharedStore` seam and in the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Shared tier returned an error or dropped the connection
    #[error("Shared tier error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Shared tier is not reachable
    #[error("Shared tier unavailable: {0}")]
    Unavailable(String),

    /// Glob pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    /// Key not found in any tier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Admission denied by the sliding-window limiter
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Redis(_) | CacheError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidPattern(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
