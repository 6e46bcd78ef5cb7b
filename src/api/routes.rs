//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    analytics_handler, clear_handler, delete_handler, get_handler, health_handler, set_handler,
    stats_handler, AppState,
};
use super::middleware::rate_limit_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Rate limiting: every route except `/health` goes through the limiter
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = Router::new()
        .route("/stats", get(stats_handler))
        .route("/analytics", get(analytics_handler))
        .route("/cache", put(set_handler).delete(clear_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(limited)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
