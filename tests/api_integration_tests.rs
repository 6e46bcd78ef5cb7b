//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint against an engine
//! backed by the in-process shared store.

use std::convert::Infallible;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tiered_cache::{
    cache::{MemoryStore, SharedStore},
    create_router, AppState, CacheEngine, Config, RateLimitRule,
};
use tower::ServiceExt;

// == Helper Functions ==

struct TestApp {
    app: Router,
    engine: Arc<CacheEngine>,
    store: Arc<MemoryStore>,
}

fn create_test_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();
    let engine = Arc::new(CacheEngine::with_shared(config, Some(shared)));
    let app = create_router(AppState::new(Arc::clone(&engine)));
    TestApp { app, engine, store }
}

fn create_test_app() -> TestApp {
    create_test_app_with(Config::default())
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/cache")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET / GET Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let t = create_test_app();
    let value = json!({"title": "Summarise", "tags": ["a", "b"], "score": 3});

    let response = t
        .app
        .clone()
        .oneshot(put_json(json!({"key": "prompt:1:detail", "value": value})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("prompt:1:detail"));
    assert_eq!(json["strategy"], "write_through");

    let response = t.app.oneshot(get("/cache/prompt:1:detail")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "prompt:1:detail");
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_get_missing_key_returns_404() {
    let t = create_test_app();

    let response = t.app.oneshot(get("/cache/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_set_with_ttl_expires() {
    let t = create_test_app();

    let response = t
        .app
        .clone()
        .oneshot(put_json(json!({"key": "short", "value": 1, "ttl": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    sleep(Duration::from_millis(1100));

    let response = t.app.oneshot(get("/cache/short")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_hit_backfills_local_tier() {
    let t = create_test_app();

    let response = t
        .app
        .clone()
        .oneshot(put_json(
            json!({"key": "hot", "value": "v", "tiers": ["shared"], "strategy": "cache_aside"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.engine.tiered().local_len(), 0);

    let response = t.app.clone().oneshot(get("/cache/hot")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t.app.oneshot(get("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["tiered_local_size"], 1);
}

#[tokio::test]
async fn test_write_back_reaches_shared_tier_after_drain() {
    let t = create_test_app();

    let response = t
        .app
        .oneshot(put_json(
            json!({"key": "wb", "value": [1, 2], "strategy": "write_back"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.engine.tiered().local_len(), 1);

    t.engine.tiered().drain().await;

    assert_eq!(t.store.get("wb").await.unwrap(), Some("[1,2]".to_string()));
}

#[tokio::test]
async fn test_write_around_invalidates_existing_value() {
    let t = create_test_app();

    t.app
        .clone()
        .oneshot(put_json(json!({"key": "k", "value": "old"})))
        .await
        .unwrap();
    t.app
        .clone()
        .oneshot(put_json(
            json!({"key": "k", "value": "new", "strategy": "write_around"}),
        ))
        .await
        .unwrap();

    let response = t.app.oneshot(get("/cache/k")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Validation Tests ==

#[tokio::test]
async fn test_set_empty_key_rejected() {
    let t = create_test_app();

    let response = t
        .app
        .oneshot(put_json(json!({"key": "", "value": 1})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("Key cannot be empty"));
}

#[tokio::test]
async fn test_set_unknown_strategy_rejected() {
    let t = create_test_app();

    let response = t
        .app
        .oneshot(put_json(
            json!({"key": "k", "value": 1, "strategy": "write_sideways"}),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_set_malformed_json_rejected() {
    let t = create_test_app();

    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/cache")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"key": "k", "value": "#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_key() {
    let t = create_test_app();
    t.app
        .clone()
        .oneshot(put_json(json!({"key": "gone", "value": 1})))
        .await
        .unwrap();

    let response = t.app.clone().oneshot(delete("/cache/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], true);

    let response = t.app.clone().oneshot(delete("/cache/gone")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], false);

    let response = t.app.oneshot(get("/cache/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_pattern() {
    let t = create_test_app();
    for key in ["user:1:a", "user:1:b", "user:2:a"] {
        t.app
            .clone()
            .oneshot(put_json(json!({"key": key, "value": 1})))
            .await
            .unwrap();
    }

    let response = t
        .app
        .clone()
        .oneshot(delete("/cache?pattern=user:1:*"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    // two keys, each in the local and shared tiers
    assert_eq!(json["removed"], 4);

    let response = t.app.oneshot(get("/cache/user:2:a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // the store also holds the limiter's window, so count cache keys only
    assert_eq!(t.store.keys("user:*").await.unwrap(), vec!["user:2:a".to_string()]);
    assert!(t.store.exists("user:2:a").await.unwrap());
}

#[tokio::test]
async fn test_clear_invalid_pattern_rejected() {
    let t = create_test_app();

    let response = t
        .app
        .oneshot(delete("/cache?pattern=user:%5B"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid pattern"));
}

// == Diagnostics Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let t = create_test_app();

    let response = t.app.oneshot(get("/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"]["shared_connected"], true);
    assert_eq!(json["cache"]["local_cache_max_size"], 1000);
    assert!(json["cache"]["shared_server"]["total_commands_processed"].is_u64());
    assert_eq!(json["pending_write_backs"], 0);
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_analytics_endpoint() {
    let t = create_test_app();
    for _ in 0..3 {
        let loaded: Result<_, Infallible> = t
            .engine
            .adaptive()
            .get_or_load("report:1", || async { Ok(Some(json!({"rows": 10}))) })
            .await;
        assert_eq!(loaded.unwrap(), Some(json!({"rows": 10})));
    }

    let response = t.app.oneshot(get("/analytics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_keys"], 1);
    assert_eq!(json["top_accessed_keys"][0]["key"], "report:1");
    assert_eq!(json["top_accessed_keys"][0]["count"], 3);
    assert_eq!(json["cache_efficiency"]["report:1"]["total_requests"], 3);
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app();

    let response = t.app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["shared_connected"], true);
}

#[tokio::test]
async fn test_health_degraded_without_shared_tier() {
    let engine = Arc::new(CacheEngine::with_shared(Config::default(), None));
    let app = create_router(AppState::new(engine));

    let response = app.oneshot(get("/health")).await.unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["shared_connected"], false);
}

// == Rate Limit Tests ==

#[tokio::test]
async fn test_rate_limit_per_client() {
    let config = Config {
        rate_limit: RateLimitRule {
            limit: 3,
            window_secs: 60,
        },
        ..Config::default()
    };
    let t = create_test_app_with(config);

    let request = |client: &str| {
        Request::builder()
            .uri("/stats")
            .header("x-forwarded-for", client.to_string())
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..3 {
        let response = t.app.clone().oneshot(request("192.0.2.10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = t.app.clone().oneshot(request("192.0.2.10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Rate limit exceeded"));

    // another client has its own window
    let response = t.app.oneshot(request("192.0.2.11")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_fails_open_without_shared_tier() {
    let config = Config {
        rate_limit: RateLimitRule {
            limit: 1,
            window_secs: 60,
        },
        ..Config::default()
    };
    let engine = Arc::new(CacheEngine::with_shared(config, None));
    let app = create_router(AppState::new(engine));

    for _ in 0..5 {
        let response = app.clone().oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
