//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use piggybook_cache::ContentCache;
use piggybook_core::provider::{ImageGenerator, StoryGenerator};
use piggybook_core::retry::BackoffPolicy;
use piggybook_core::store::CacheStore;
use piggybook_generation::StoryOrchestrator;
use piggybook_test_support::FixedClock;
use tower::ServiceExt;

use piggybook_api::state::AppState;

/// Build the full app router over the given store and providers, with the
/// same routes and layers as `main.rs`.
pub fn build_test_app(
    store: Arc<dyn CacheStore>,
    stories: Arc<dyn StoryGenerator>,
    images: Arc<dyn ImageGenerator>,
) -> Router {
    let orchestrator = StoryOrchestrator::new(
        ContentCache::new(store, Arc::new(FixedClock::default())),
        stories,
        images,
        BackoffPolicy::new(3, std::time::Duration::ZERO),
    );
    piggybook_api::app(AppState::new(Arc::new(orchestrator)))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };
    (status, json)
}
