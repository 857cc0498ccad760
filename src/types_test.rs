// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for types module

use super::types::*;
use crate::formatter::FormatError;
use crate::keyfile::KeyFileManager;
use crate::keyring::Keyring;
use crate::orchestrator::{EngineError, ZoneOrchestrator};
use crate::record::ValidationResult;
use crate::transport::BindToolsTransport;
use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Duration;

async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_app_state_clone() {
    let orchestrator = ZoneOrchestrator::new(
        KeyFileManager::new("/tmp/zonekeeper-test-keys"),
        Arc::new(BindToolsTransport::new("dig", "nsupdate", Duration::from_secs(1))),
    );
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        keyring: Arc::new(Keyring::default()),
    };

    let cloned = state.clone();
    assert!(Arc::ptr_eq(&cloned.orchestrator, &state.orchestrator));
    assert!(cloned.keyring.is_empty());
}

#[test]
fn test_error_response_serialization() {
    let mut response = ErrorResponse::new("Test error");
    response.details = Some("Details here".to_string());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Test error");
    assert_eq!(json["details"], "Details here");
    // Empty error lists are omitted
    assert!(json.get("errors").is_none());
}

#[test]
fn test_error_response_without_details() {
    let json = serde_json::to_string(&ErrorResponse::new("Test error")).unwrap();
    assert!(json.contains("Test error"));
    assert!(json.contains("null")); // None is serialized as null
}

#[tokio::test]
async fn test_api_error_invalid_request() {
    let error = ApiError::InvalidRequest("Invalid zone name".to_string());
    assert_eq!(error.to_string(), "Invalid request: Invalid zone name");

    let (status, body) = body_json(error).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request: Invalid zone name");
}

#[tokio::test]
async fn test_api_error_rejected_lists_every_error() {
    let result = ValidationResult::from_errors(vec![
        "Change 1 (ADD): Invalid IPv4 address: 999.0.0.1".to_string(),
        "Change 2 (DELETE): cannot delete the SOA record at the zone apex: it is a required record"
            .to_string(),
    ]);

    let (status, body) = body_json(ApiError::Rejected(result)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed with 2 error(s)");
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_api_error_key_resolution() {
    let (status, body) = body_json(ApiError::UnknownKey("missing".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown TSIG key: missing");

    let (status, _) = body_json(ApiError::NoKey).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_error_operation_failed_is_generic() {
    let (status, body) = body_json(ApiError::OperationFailed(
        "update failed: nsupdate failed: Zone refused the update".to_string(),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], OPERATION_FAILED);
    assert!(body["details"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn test_api_error_internal() {
    let (status, body) = body_json(ApiError::InternalError("disk full".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], OPERATION_FAILED);
}

#[test]
fn test_from_engine_error() {
    let rejected = ValidationResult::from_errors(vec!["bad".to_string()]);
    assert!(matches!(
        ApiError::from(EngineError::Rejected(rejected)),
        ApiError::Rejected(_)
    ));

    assert!(matches!(
        ApiError::from(EngineError::Format(FormatError::InvalidIpv4("1.2.3".to_string()))),
        ApiError::InvalidRequest(_)
    ));

    match ApiError::from(EngineError::Process {
        operation: "transfer",
        message: "dig timed out after 30s".to_string(),
    }) {
        ApiError::OperationFailed(details) => {
            assert_eq!(details, "transfer failed: dig timed out after 30s")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
