// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common types and errors used by the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    keyring::Keyring, orchestrator::EngineError, orchestrator::ZoneOrchestrator,
    record::ValidationResult,
};

/// Message returned for failed external operations; details are redacted
pub const OPERATION_FAILED: &str = "operation failed";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Transfer/update orchestrator
    pub orchestrator: Arc<ZoneOrchestrator>,
    /// TSIG keys and server bindings
    pub keyring: Arc<Keyring>,
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub details: Option<String>,
    /// Every validation problem, when the request was rejected
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
            errors: Vec::new(),
        }
    }
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed with {} error(s)", .0.errors().len())]
    Rejected(ValidationResult),

    #[error("Unknown TSIG key: {0}")]
    UnknownKey(String),

    #[error("No keyId given and no default key configured")]
    NoKey,

    /// External tool failure; the detail string is already redacted
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Rejected(result) => ApiError::Rejected(result),
            EngineError::Format(e) => ApiError::InvalidRequest(e.to_string()),
            EngineError::Process { .. } => ApiError::OperationFailed(e.to_string()),
            EngineError::KeyFile(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new(self.to_string()))
            }
            ApiError::Rejected(result) => {
                let errors = result.into_errors();
                let mut body = ErrorResponse::new(format!(
                    "Validation failed with {} error(s)",
                    errors.len()
                ));
                body.errors = errors;
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::UnknownKey(_) => (StatusCode::NOT_FOUND, ErrorResponse::new(self.to_string())),
            ApiError::NoKey => (StatusCode::BAD_REQUEST, ErrorResponse::new(self.to_string())),
            ApiError::OperationFailed(details) => {
                error!("Operation failed: {}", details);
                let mut body = ErrorResponse::new(OPERATION_FAILED);
                body.details = Some(details);
                (StatusCode::BAD_GATEWAY, body)
            }
            ApiError::InternalError(details) => {
                error!("Internal error: {}", details);
                let mut body = ErrorResponse::new(OPERATION_FAILED);
                body.details = Some(details);
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };

        (status, Json(body)).into_response()
    }
}
