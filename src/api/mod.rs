//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics service.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Base cache and tier statistics
//! - `GET /analytics` - Adaptive manager analytics
//! - `PUT /cache` - Tiered set
//! - `GET /cache/:key` - Tiered get
//! - `DELETE /cache/:key` - Invalidate a key in every tier
//! - `DELETE /cache?pattern=<glob>` - Clear matching keys

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
