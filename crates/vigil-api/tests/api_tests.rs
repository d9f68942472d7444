//! API integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use tower::ServiceExt;

use vigil_api::{create_router, ApiConfig, AppState};
use vigil_detector::StaticDetector;
use vigil_media::{to_data_uri, Frame};
use vigil_pipeline::{AdmissionController, FramePipeline};

fn frame_uri() -> String {
    let frame = Frame::from_image(RgbImage::from_pixel(80, 60, Rgb([30, 30, 30]))).unwrap();
    to_data_uri(frame.encoded())
}

fn state_with(detectors: Vec<StaticDetector>) -> AppState {
    let pipeline = detectors
        .into_iter()
        .fold(FramePipeline::builder(), |b, d| b.detector(Arc::new(d)))
        .build()
        .unwrap();
    AppState::with_pipeline(ApiConfig::default(), Arc::new(pipeline))
}

fn router(state: AppState) -> Router {
    create_router(state, None)
}

fn detect_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/detect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
    assert!(response.headers().contains_key("X-Request-ID"));
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_detectors_and_capacity() {
    let state = state_with(vec![StaticDetector::empty("firesmoke"), StaticDetector::empty("gunonly")]);
    let _subscriber = state.hub().register();

    let response = router(state)
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["detectors"]["gunonly"]["status"], "ok");
    assert_eq!(body["checks"]["admission"]["pool_size"], 1);
    assert_eq!(body["checks"]["subscribers"], 1);
}

#[tokio::test]
async fn test_camera_page() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/detect"));
    assert!(html.contains("/ws"));
}

#[tokio::test]
async fn test_detect_without_detections_returns_empty_stats() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke"), StaticDetector::empty("gunonly")]));

    let response = app.oneshot(detect_request(json!({ "image": frame_uri() }))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "image": null, "stats": {} }));
}

#[tokio::test]
async fn test_detect_alert_is_returned_and_broadcast() {
    let state = state_with(vec![
        StaticDetector::empty("firesmoke")
            .with("fire", 0.91, [4, 4, 40, 40])
            .with("smoke", 0.76, [0, 0, 20, 20]),
        StaticDetector::empty("gunonly").with("pistol", 0.60, [10, 10, 20, 20]),
    ]);
    let mut subscriber = state.hub().register();

    let response = router(state.clone())
        .oneshot(detect_request(json!({ "image": frame_uri() })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    assert_eq!(body["stats"]["counts"], json!({ "fire": 1 }));
    assert!(body["stats"]["processing_time"].is_number());
    assert!(body["stats"]["timestamp"].is_number());
    assert!(body.get("degraded").is_none());

    let pushed = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(pushed.log_text.contains("Fire (conf: 0.91)"));
    assert_eq!(Some(pushed.encoded_image.as_str()), body["image"].as_str());
}

#[tokio::test]
async fn test_detect_immediate_weapon() {
    let app = router(state_with(vec![
        StaticDetector::empty("firesmoke").with("fire", 0.95, [0, 0, 30, 30]),
        StaticDetector::empty("gunonly").with("pistol", 0.90, [5, 5, 25, 25]),
    ]));

    let response = app.oneshot(detect_request(json!({ "image": frame_uri() }))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["stats"]["counts"], json!({ "pistol": 1 }));
}

#[tokio::test]
async fn test_detect_degraded_when_all_detectors_fail() {
    let app = router(state_with(vec![
        StaticDetector::failing("firesmoke", "down"),
        StaticDetector::failing("gunonly", "down"),
    ]));

    let response = app.oneshot(detect_request(json!({ "image": frame_uri() }))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["degraded"], true);
    assert_eq!(body["failed_models"], json!(["firesmoke", "gunonly"]));
    assert_eq!(body["image"], Value::Null);
}

#[tokio::test]
async fn test_detect_rejects_invalid_frame() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app
        .oneshot(detect_request(json!({ "image": "data:image/jpeg;base64,bm90IGFuIGltYWdl" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_input");
}

#[tokio::test]
async fn test_detect_rejects_malformed_body() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app.oneshot(detect_request(json!({ "frame": "x" }))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "bad_request");
}

#[tokio::test]
async fn test_detect_overloaded_is_retryable() {
    let admission = AdmissionController::new(1, Duration::from_millis(20));
    let pipeline = FramePipeline::builder()
        .detector(Arc::new(StaticDetector::empty("firesmoke")))
        .admission(admission.clone())
        .build()
        .unwrap();
    let app = router(AppState::with_pipeline(ApiConfig::default(), Arc::new(pipeline)));

    let _held = admission.acquire().await.unwrap();
    let response = app.oneshot(detect_request(json!({ "image": frame_uri() }))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    assert_eq!(json_body(response).await["code"], "overloaded");
}

#[tokio::test]
async fn test_detect_rate_limited_per_ip() {
    let mut state = state_with(vec![StaticDetector::empty("firesmoke")]);
    state.config.rate_limit_rps = 1;
    let app = router(state);

    let request = || {
        let mut request = detect_request(json!({ "image": frame_uri() }));
        request
            .headers_mut()
            .insert("X-Forwarded-For", "192.168.1.100".parse().unwrap());
        request
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_metrics_route_absent_without_handle() {
    let app = router(state_with(vec![StaticDetector::empty("firesmoke")]));

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
