//! Rate Limit Middleware
//!
//! Admits requests through the engine's sliding-window limiter, keyed by the
//! client address from `x-forwarded-for`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::handlers::AppState;
use crate::error::{CacheError, Result};

/// Client key used when the request carries no forwarded address.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Rejects the request with 429 once the client exceeds the configured rule.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let client = client_key(request.headers());
    let rule = state.engine.config().rate_limit;

    let key = format!("rate_limit:{}", client);
    if !state.engine.limiter().check(&key, &rule).await {
        warn!(client = %client, limit = rule.limit, window = rule.window_secs, "Rate limit exceeded");
        return Err(CacheError::RateLimited(client));
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-ratelimit-limit", HeaderValue::from(rule.limit));
    Ok(response)
}

/// First address in `x-forwarded-for`, or [`ANONYMOUS_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}
