//! HTTP surface driven through the router with `oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use feature_cache::cache::{CacheProvider, CacheStore};
use feature_cache::config::{ExecutorConfig, ServiceConfig};
use feature_cache::constants::{signatures, PROCESSING_TIME_HEADER, REQUEST_ID_HEADER};
use feature_cache::executor::ComputeExecutor;
use feature_cache::extraction::LumaGridExtractor;
use feature_cache::orchestrator::Orchestrator;
use feature_cache::web::{create_app, state::AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "feature-cache-test-boundary";

fn state_with(config: ServiceConfig, executor: ExecutorConfig) -> AppState {
    let cache = Arc::new(CacheStore::new(
        CacheProvider::moka(1_000, Duration::from_secs(300)),
        Duration::from_secs(300),
    ));
    let executor = Arc::new(ComputeExecutor::new(
        Arc::new(LumaGridExtractor::default()),
        &executor,
    ));
    let orchestrator = Arc::new(Orchestrator::new(cache, executor, Duration::from_secs(5)));
    let state = AppState::new(orchestrator, Arc::new(config));
    state.mark_extractor_ready();
    state
}

fn app() -> (Router, AppState) {
    let state = state_with(ServiceConfig::default(), ExecutorConfig::default());
    (create_app(state.clone()), state)
}

/// A PNG signature followed by a checkerboard luminance plane
fn png_image() -> Vec<u8> {
    let mut data = signatures::PNG.to_vec();
    data.extend((0..64u32 * 64).map(|i| {
        if ((i % 64) / 8 + (i / 64) / 8) % 2 == 0 {
            16u8
        } else {
            240u8
        }
    }));
    data
}

fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/v1/features/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_detect_miss_then_hit() {
    let (app, state) = app();

    let response = app
        .clone()
        .oneshot(multipart_request("image", "board.png", &png_image()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert!(response.headers().contains_key(PROCESSING_TIME_HEADER));

    let first = json_body(response).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert!(first["keypoints"].as_u64().unwrap() > 0);
    assert_eq!(first["descriptors_shape"][1], 32);
    assert_eq!(first["fingerprint"].as_str().unwrap().len(), 64);

    let fp = feature_cache::Fingerprint::from_hex(first["fingerprint"].as_str().unwrap()).unwrap();
    for _ in 0..100 {
        if state.orchestrator.cache().get(&fp).await.is_found() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let second = json_body(
        app.oneshot(multipart_request("image", "board.png", &png_image()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["keypoints"], first["keypoints"]);
    assert_eq!(second["fingerprint"], first["fingerprint"]);
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let (app, _) = app();
    let mut request = multipart_request("image", "notes.txt", b"hello");
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, "client-req-42".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "client-req-42"
    );

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "INVALID_IMAGE");
    assert_eq!(body["request_id"], "client-req-42");
}

#[tokio::test]
async fn test_rejects_bad_uploads() {
    let (app, _) = app();

    let wrong_signature = app
        .clone()
        .oneshot(multipart_request("image", "fake.jpg", b"definitely not a jpeg"))
        .await
        .unwrap();
    assert_eq!(wrong_signature.status(), StatusCode::BAD_REQUEST);

    let missing_field = app
        .clone()
        .oneshot(multipart_request("file", "board.png", &png_image()))
        .await
        .unwrap();
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(missing_field).await["error_code"], "INVALID_IMAGE");

    let empty = app
        .oneshot(multipart_request("image", "empty.png", &[]))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let mut config = ServiceConfig::default();
    config.web.max_image_size_mb = 1;
    let app = create_app(state_with(config, ExecutorConfig::default()));

    let mut data = signatures::JPEG.to_vec();
    data.resize(1024 * 1024 + 10, 0);
    let response = app
        .oneshot(multipart_request("image", "big.jpg", &data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["error_code"], "IMAGE_TOO_LARGE");
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _) = app();

    let health = get(&app, "/health").await;
    assert_eq!(health.status(), StatusCode::OK);
    let body = json_body(health).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache_provider"], "moka");
    assert_eq!(body["extractor_ready"], true);

    assert_eq!(get(&app, "/health/live").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/health/ready").await.status(), StatusCode::OK);

    let metrics = json_body(get(&app, "/metrics").await).await;
    assert_eq!(metrics["orchestrator"]["requests"], 0);
    assert_eq!(metrics["executor"]["workers"], 4);
    // a local backend has no breaker
    assert!(metrics["cache_circuit_breaker"].is_null());

    let root = json_body(get(&app, "/").await).await;
    assert_eq!(root["service"], "feature-cache");
}

#[tokio::test]
async fn test_not_ready_before_warm_up() {
    let cache = Arc::new(CacheStore::new(CacheProvider::noop(), Duration::from_secs(60)));
    let executor = Arc::new(ComputeExecutor::new(
        Arc::new(LumaGridExtractor::default()),
        &ExecutorConfig::default(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(cache, executor, Duration::from_secs(1)));
    let app = create_app(AppState::new(orchestrator, Arc::new(ServiceConfig::default())));

    let ready = get(&app, "/health/ready").await;
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

    // a disabled cache still reports healthy
    let health = json_body(get(&app, "/health").await).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["cache_connected"], false);
}

#[tokio::test]
async fn test_cache_admin_endpoints() {
    let (app, _) = app();
    app.clone()
        .oneshot(multipart_request("image", "board.png", &png_image()))
        .await
        .unwrap();

    let stats = json_body(get(&app, "/api/v1/cache/stats").await).await;
    assert_eq!(stats["success"], true);
    assert_eq!(stats["provider"], "moka");
    assert_eq!(stats["misses"], 1);

    let reset = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/cache/stats/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    let stats = json_body(get(&app, "/api/v1/cache/stats").await).await;
    assert_eq!(stats["misses"], 0);

    let bad_fp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/cache/not-hex")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad_fp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(bad_fp).await["error_code"], "INVALID_FINGERPRINT");

    let missing = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/cache/{}", "ab".repeat(32)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::OK);
    assert_eq!(json_body(missing).await["deleted"], false);

    let flush = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(flush.status(), StatusCode::OK);
    assert_eq!(json_body(flush).await["success"], true);
}
