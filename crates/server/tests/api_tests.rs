//! Router-level tests for the EcoTag HTTP API.
//!
//! The vision provider is replaced by `MockExtractor` and storage by an
//! in-memory SQLite pool, so every test runs offline.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use ecotag_core::FactorTable;
use ecotag_scan::{MockExtractor, ResponseCache, ScanHistory, TagPipeline};
use ecotag_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "ecotag-test-boundary";

fn mock_tag() -> Value {
    json!({
        "country": "Portugal",
        "materials": [{"fiber": "Cotton", "pct": 70.0}, {"fiber": "Polyester", "pct": 30.0}],
        "care": {"washing": "machine_wash_cold", "drying": "line_dry", "ironing": "iron_low", "dry_cleaning": null}
    })
}

/// Test helper: router over a fresh in-memory database.
async fn setup_app(extractor: Arc<MockExtractor>) -> axum::Router {
    setup_app_with_limit(extractor, 10 * 1024 * 1024).await
}

async fn setup_app_with_limit(extractor: Arc<MockExtractor>, max_upload_bytes: usize) -> axum::Router {
    let pool = ecotag_storage::create_memory_db().await.expect("Should create database");
    let pipeline = TagPipeline::new(
        extractor,
        ResponseCache::new(pool.clone(), 100),
        Arc::new(FactorTable::default()),
    )
    .with_history(ScanHistory::new(pool));
    build_router(AppState::new(pipeline), max_upload_bytes)
}

enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"tag.jpg\"\r\n\
                         Content-Type: image/jpeg\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}").as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn tag_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tag")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// POST /api/tag
// =============================================================================

#[tokio::test]
async fn test_missing_image_returns_exact_400_body() {
    let extractor = Arc::new(MockExtractor::new(mock_tag()));
    let app = setup_app(extractor.clone()).await;

    let response = app.oneshot(tag_request(&[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        extract_json(response.into_body()).await,
        json!({"error": {"code": "MISSING_IMAGE", "message": "An image file is required in field 'image'."}})
    );
    assert_eq!(extractor.calls(), 0);
}

#[tokio::test]
async fn test_other_fields_without_image_are_rejected() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let request = tag_request(&[Part::Text("category", "jeans"), Part::File("photo", b"bytes")]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "MISSING_IMAGE");
}

#[tokio::test]
async fn test_empty_image_is_missing() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let response = app.oneshot(tag_request(&[Part::File("image", b"")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_multipart_body_is_missing_image() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/tag")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "MISSING_IMAGE");
}

#[tokio::test]
async fn test_upstream_failure_returns_502_without_detail() {
    let app = setup_app(Arc::new(MockExtractor::failing("OpenAI upstream timeout"))).await;

    let response = app.oneshot(tag_request(&[Part::File("image", b"tag photo")])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body,
        json!({"error": {"code": "UPSTREAM_ERROR", "message": "Failed to analyze image with AI provider."}})
    );
    let text = body.to_string();
    assert!(!text.contains("timeout"));
    assert!(!text.contains("stack"));
}

#[tokio::test]
async fn test_tag_analysis_returns_parsed_and_emissions() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let response = app.oneshot(tag_request(&[Part::File("image", b"tag photo")])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["parsed"], mock_tag());

    let emissions = &body["emissions"];
    let total = emissions["total_kgco2e"].as_f64().unwrap();
    assert!(total > 0.0);
    let breakdown_sum: f64 = emissions["breakdown"]
        .as_object()
        .unwrap()
        .values()
        .filter_map(Value::as_f64)
        .sum();
    assert!((breakdown_sum - total).abs() < 1e-6);
}

#[tokio::test]
async fn test_malformed_care_returns_200_with_null_care() {
    let extractor = Arc::new(MockExtractor::new(json!({
        "country": "Portugal",
        "materials": [{"fiber": "Cotton", "pct": 100.0}],
        "care": "machine_wash_cold"
    })));
    let app = setup_app(extractor).await;

    let response = app.oneshot(tag_request(&[Part::File("image", b"tag photo")])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["parsed"]["care"],
        json!({"washing": null, "drying": null, "ironing": null, "dry_cleaning": null})
    );
}

#[tokio::test]
async fn test_repeat_upload_is_served_from_cache() {
    let extractor = Arc::new(MockExtractor::new(mock_tag()));
    let app = setup_app(extractor.clone()).await;

    let first = app.clone().oneshot(tag_request(&[Part::File("image", b"same photo")])).await.unwrap();
    let second = app.oneshot(tag_request(&[Part::File("image", b"same photo")])).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        extract_json(first.into_body()).await["parsed"],
        extract_json(second.into_body()).await["parsed"]
    );
    assert_eq!(extractor.calls(), 1);
}

#[tokio::test]
async fn test_oversized_upload_returns_413_not_missing_image() {
    let extractor = Arc::new(MockExtractor::new(mock_tag()));
    let app = setup_app_with_limit(extractor.clone(), 64).await;

    let photo = vec![0xffu8; 256];
    let response = app.oneshot(tag_request(&[Part::File("image", photo.as_slice())])).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        extract_json(response.into_body()).await,
        json!({"error": {"code": "PAYLOAD_TOO_LARGE", "message": "Uploaded image exceeds the size limit."}})
    );
    assert_eq!(extractor.calls(), 0);
}

#[tokio::test]
async fn test_same_photo_with_different_fields_is_not_shared() {
    let extractor = Arc::new(MockExtractor::new(mock_tag()));
    let app = setup_app(extractor.clone()).await;

    let heavy = app
        .clone()
        .oneshot(tag_request(&[Part::File("image", b"photo"), Part::Text("weight_g", "2000")]))
        .await
        .unwrap();
    let plain = app.oneshot(tag_request(&[Part::File("image", b"photo")])).await.unwrap();

    let heavy = extract_json(heavy.into_body()).await;
    let plain = extract_json(plain.into_body()).await;
    assert_eq!(heavy["emissions"]["assumptions"]["weight"], "2000g supplied");
    assert_eq!(plain["emissions"]["assumptions"]["weight"], "200g estimated");
    assert_eq!(extractor.calls(), 2);
}

#[tokio::test]
async fn test_supplied_weight_is_used() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let request = tag_request(&[
        Part::File("image", b"tag photo"),
        Part::Text("weight_g", "400"),
        Part::Text("washes_per_month", "not a number"),
    ]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["emissions"]["assumptions"]["weight"], "400g supplied");
    assert_eq!(body["emissions"]["assumptions"]["washes"], "2 per month over 2 years");
}

// =============================================================================
// GET /health, GET /api/history
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_history_lists_scans_newest_first() {
    let app = setup_app(Arc::new(MockExtractor::new(mock_tag()))).await;

    app.clone().oneshot(tag_request(&[Part::File("image", b"first")])).await.unwrap();
    app.clone().oneshot(tag_request(&[Part::File("image", b"second")])).await.unwrap();

    let response = app.clone().oneshot(get_request("/api/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let scans = body.as_array().unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0]["success"], true);
    assert_eq!(scans[0]["display_name"], "70% Cotton + 30% Polyester");

    let response = app.clone().oneshot(get_request("/api/history?limit=1")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let response = app.oneshot(get_request("/api/history?limit=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}
