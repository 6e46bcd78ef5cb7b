//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use globset::Glob;

use crate::adaptive::CacheAnalytics;
use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearQuery, ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};
use crate::tiered::DEFAULT_TIERS;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }
}

/// Handler for PUT /cache
///
/// Writes a value through the tiered cache with the requested tiers and strategy.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let tiers = req.tiers();
    let strategy = req.strategy();
    state
        .engine
        .tiered()
        .set(&req.key, &req.value, req.ttl, &tiers, strategy)
        .await;

    Ok(Json(SetResponse::new(req.key, tiers, strategy)))
}

/// Handler for GET /cache/:key
///
/// Reads through the default tier order, backfilling the local tier on a shared hit.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .engine
        .tiered()
        .get(&key, &DEFAULT_TIERS)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let removed = state.engine.tiered().invalidate(&key, &DEFAULT_TIERS).await;
    Json(DeleteResponse { key, removed })
}

/// Handler for DELETE /cache?pattern=<glob>
pub async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<ClearResponse>> {
    if query.pattern.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Pattern cannot be empty".to_string(),
        ));
    }
    Glob::new(&query.pattern)?;

    let removed = state.engine.tiered().clear_pattern(&query.pattern).await;
    Ok(Json(ClearResponse {
        pattern: query.pattern,
        removed,
    }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let tiered = state.engine.tiered();
    let cache = state.engine.base().get_stats().await;

    Json(StatsResponse {
        cache,
        tiered_local_size: tiered.local_len(),
        pending_write_backs: tiered.pending_write_backs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Handler for GET /analytics
pub async fn analytics_handler(State(state): State<AppState>) -> Json<CacheAnalytics> {
    Json(state.engine.adaptive().get_analytics())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        state.engine.base().is_shared_connected(),
    ))
}
