use std::sync::Arc;

use api_adapters::{router, AppState, RouterOptions};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use services::FishService;
use storage_adapters::InMemoryFishStore;
use tower::ServiceExt;

fn app() -> Router {
    let service = Arc::new(FishService::new(Arc::new(InMemoryFishStore::default())));
    router(AppState::new(service), &RouterOptions::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submit_then_list() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json(
            "/fish",
            json!({ "label": "nemo", "content": "data:image/png;base64,AAAA", "confidence": 0.42 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, list) = send(&app, get("/fishes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["label"], "nemo");
    assert_eq!(list[0]["reportCount"], 0);
}

#[tokio::test]
async fn legacy_field_names_are_accepted() {
    let app = app();
    let (status, _) = send(
        &app,
        post_json(
            "/fish",
            json!({ "nickname": "dory", "imageBase64": "data:image/png;base64,AAAA", "prob": 0.9 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admission_errors_are_bad_requests() {
    let app = app();

    let (status, body) = send(
        &app,
        post_json("/fish", json!({ "label": "b", "content": "x", "confidence": 0.005 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "low_confidence");
    assert!(body["error"].as_str().unwrap().contains("0.50%"));

    let (status, body) = send(
        &app,
        post_json("/fish", json!({ "label": "b", "content": "NSFW", "confidence": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "inappropriate_content");

    let (status, body) = send(&app, post_json("/fish", json!({ "label": "b" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");

    let (status, body) = send(
        &app,
        post_json("/fish", json!({ "label": "b", "content": "x", "confidence": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn report_unknown_fish_is_not_found() {
    let app = app();
    let (status, body) = send(&app, post_json("/fish/nope/report", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn reported_fish_disappear_from_listing_and_stats() {
    let app = app();
    let (_, body) = send(
        &app,
        post_json("/fish", json!({ "label": "a", "content": "x", "confidence": 0.5 })),
    )
    .await;
    let id = body["id"].as_str().unwrap().to_string();

    for expected in 1..=4 {
        let (status, body) = send(&app, post_json(&format!("/fish/{id}/report"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reports"], expected);
    }

    let (_, list) = send(&app, get("/fishes")).await;
    assert_eq!(list, json!([]));

    let (status, stats) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["active"], 0);
    assert_eq!(stats["hidden"], 1);
}

#[tokio::test]
async fn list_honours_since_and_limit() {
    let app = app();
    let mut ids = Vec::new();
    for label in ["one", "two", "three"] {
        let (_, body) = send(
            &app,
            post_json("/fish", json!({ "label": label, "content": "x", "confidence": 0.5 })),
        )
        .await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (_, list) = send(&app, get("/fishes?limit=1")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["label"], "three");

    let (_, list) = send(&app, get(&format!("/fishes?since={}", ids[1]))).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["label"], "three");
}

#[tokio::test]
async fn malformed_list_query_is_a_json_bad_request() {
    let app = app();
    for uri in ["/fishes?limit=abc", "/fishes?limit=-1"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["kind"], "invalid_input", "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn health_and_metrics_respond() {
    let app = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("fishtank_observers"), "{text}");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let service = Arc::new(FishService::new(Arc::new(InMemoryFishStore::default())));
    let app = router(
        AppState::new(service),
        &RouterOptions {
            body_limit: 64,
            static_dir: None,
        },
    );
    let content = "A".repeat(1024);
    let (status, body) = send(
        &app,
        post_json("/fish", json!({ "label": "big", "content": content, "confidence": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["kind"], "payload_too_large");
}
