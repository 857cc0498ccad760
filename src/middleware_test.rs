// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for middleware module

use super::middleware::*;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower::ServiceExt;

async fn test_handler() -> impl IntoResponse {
    (StatusCode::OK, "success")
}

async fn test_handler_error() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "error")
}

fn request_count(method: &str, path: &str, status: &str) -> f64 {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status])
        .get()
}

#[tokio::test]
async fn test_track_metrics_uses_route_template() {
    let app = Router::new()
        .route("/mw-test/zones/{zone}/records", get(test_handler))
        .layer(middleware::from_fn(track_metrics));

    let before = request_count("GET", "/mw-test/zones/{zone}/records", "200");

    for zone in ["example.com", "example.org"] {
        let request = Request::builder()
            .uri(format!("/mw-test/zones/{}/records", zone))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let after = request_count("GET", "/mw-test/zones/{zone}/records", "200");
    assert!(after >= before + 2.0);

    let metrics_output = crate::metrics::gather_metrics().unwrap();
    assert!(!metrics_output.contains("/mw-test/zones/example.com/records"));
}

#[tokio::test]
async fn test_track_metrics_error_response() {
    let app = Router::new()
        .route("/mw-error", get(test_handler_error))
        .layer(middleware::from_fn(track_metrics));

    let before = request_count("GET", "/mw-error", "502");

    let request = Request::builder()
        .uri("/mw-error")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    assert!(request_count("GET", "/mw-error", "502") >= before + 1.0);
}

#[tokio::test]
async fn test_track_metrics_unmatched_route() {
    let app = Router::new()
        .route("/mw-known", get(test_handler))
        .layer(middleware::from_fn(track_metrics));

    let before = request_count("GET", "unmatched", "404");

    let request = Request::builder()
        .uri("/mw-unknown/some/path")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(request_count("GET", "unmatched", "404") >= before + 1.0);
}

#[tokio::test]
async fn test_track_metrics_duration() {
    let app = Router::new()
        .route("/mw-duration", get(test_handler))
        .layer(middleware::from_fn(track_metrics));

    let request = Request::builder()
        .uri("/mw-duration")
        .body(Body::empty())
        .unwrap();

    let _ = app.oneshot(request).await.unwrap();

    let metrics_output = crate::metrics::gather_metrics().unwrap();
    assert!(metrics_output.contains("zonekeeper_http_request_duration_seconds"));
}
