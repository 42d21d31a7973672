use super::*;
use crate::config::DownloadConfig;
use crate::coordinator::test_helpers::{Harness, candidates, harness, scan_result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

mod sessions;

/// Router over a fresh in-memory harness, with the default service config
fn test_app(settings: DownloadConfig) -> (Harness, Router) {
    let h = harness(settings);
    let app = create_router(
        Arc::new(h.coordinator.clone()),
        Arc::new(Config::default()),
        bridge_of(&h),
    );
    (h, app)
}

/// Page bridge over the harness's scan provider and converter
fn bridge_of(h: &Harness) -> PageBridge {
    PageBridge::from_parts(h.scanner.clone(), h.converter.clone())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let h = harness(DownloadConfig::default());

    let mut config = Config::default();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let coordinator = Arc::new(h.coordinator.clone());
        let pages = bridge_of(&h);
        async move { start_api_server(coordinator, config, pages).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be serving");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (_h, app) = test_app(DownloadConfig::default());

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "chrome-extension://abcdef")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_specific_origins() {
    let h = harness(DownloadConfig::default());
    let mut config = Config::default();
    config.server.api.cors_origins = vec!["http://localhost:3000".to_string()];
    let app = create_router(Arc::new(h.coordinator.clone()), Arc::new(config), bridge_of(&h));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let h = harness(DownloadConfig::default());
    let mut config = Config::default();
    config.server.api.cors_enabled = false;
    let app = create_router(Arc::new(h.coordinator.clone()), Arc::new(config), bridge_of(&h));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (_h, app) = test_app(DownloadConfig::default());
    let response = app.oneshot(get("/downloads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
