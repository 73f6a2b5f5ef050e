// Router-level tests for the pipeline endpoints

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use feedline_server::api;
use feedline_server::config::{Roster, Topology};
use feedline_server::feeds::{Fault, InMemoryFeedService};
use feedline_server::pipeline::{Pipeline, SeedOptions};
use feedline_server::state::AppState;

fn app(service: &InMemoryFeedService) -> Router {
    let pipeline = Pipeline::new(
        Arc::new(service.clone()),
        Topology::load(None).unwrap(),
        Roster::load(None).unwrap(),
        100,
        1000,
        SeedOptions::default(),
    );
    api::router(AppState::new(pipeline))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let service = InMemoryFeedService::new();
    let response = app(&service)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_setup_reports_definitions() {
    let service = InMemoryFeedService::new();
    let response = app(&service)
        .oneshot(post_json("/feeds/setup", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["feed_groups"].as_array().unwrap().len(),
        service.feed_group_ids().len()
    );
}

#[tokio::test]
async fn test_reset_and_seed_returns_report() {
    let service = InMemoryFeedService::new();
    let response = app(&service)
        .oneshot(post_json("/feeds/reset-and-seed", json!({ "user_id": "operator" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["reset"]["activities_deleted"], 0);
    assert_eq!(body["data"]["seed"]["activity_ids"].as_array().unwrap().len(), 5);
    assert_eq!(service.activity_count(), 5);
}

#[tokio::test]
async fn test_seed_requires_user_id() {
    let service = InMemoryFeedService::new();
    let response = app(&service)
        .oneshot(post_json("/feeds/seed", json!({ "user_id": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(service.activity_count(), 0);
}

#[tokio::test]
async fn test_fatal_failure_is_a_server_error() {
    let service = InMemoryFeedService::new();
    service.inject(Fault::UpsertUsers);

    let response = app(&service)
        .oneshot(post_json("/feeds/seed", json!({ "user_id": "operator" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().starts_with("seed phase failed"));
}

#[tokio::test]
async fn test_degraded_seed_is_still_ok() {
    let service = InMemoryFeedService::new();
    service.inject(Fault::AddComment);

    let response = app(&service)
        .oneshot(post_json("/feeds/seed", json!({ "user_id": "operator" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["seed"]["failures"].as_array().unwrap().len(), 2);
    assert!(body["message"].as_str().unwrap().contains("skipped steps"));
}
