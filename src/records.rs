// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record management API handlers
//!
//! This module implements HTTP handlers for record operations on a zone:
//! - Listing records (zone transfer)
//! - Adding, updating and removing single records
//! - Applying a change set atomically, or validating it without applying
//!
//! Every write goes through the conflict detector against the live zone and
//! is applied with one `nsupdate` transaction authenticated by the request's
//! TSIG key.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    conflict::ConflictDetector,
    record::{Change, DnsRecord, PendingChange, ValidationResult},
    transfer_parser::ParseWarning,
    tsig::{TsigKey, ZoneConfig},
    types::{ApiError, AppState, ErrorResponse},
    validator,
};

/// Request carrying a single record (add, delete)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub record: DnsRecord,

    /// Keyring id of the TSIG key (default key if omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Request to replace one record with another
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    pub old_record: DnsRecord,
    pub new_record: DnsRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// One entry of a change set
///
/// `{"action": "ADD", "record": {...}}`, `{"action": "MODIFY", "originalRecord":
/// {...}, "newRecord": {...}}` or `{"action": "DELETE", "record": {...}}`.
/// `zone` defaults to the zone in the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(flatten)]
    pub change: Change,
}

/// Change set request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetRequest {
    #[schema(value_type = Vec<Object>)]
    pub changes: Vec<ChangeEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Records of a zone
#[derive(Debug, Serialize, ToSchema)]
pub struct RecordsResponse {
    pub records: Vec<DnsRecord>,
    /// Transfer lines that could not be parsed
    pub warnings: Vec<ParseWarning>,
}

/// Response from write operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct KeyQuery {
    /// Keyring id of the TSIG key (default key if omitted)
    pub key_id: Option<String>,
}

/// Routes under `/api/v1`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/zones/{zone}/records",
            get(list_records)
                .post(add_record)
                .put(update_record)
                .delete(delete_record),
        )
        .route("/zones/{zone}/changes", post(apply_changes))
        .route("/zones/{zone}/changes/validate", post(validate_changes))
}

/// Zone names must be plain hostnames
fn check_zone(zone: &str) -> Result<String, ApiError> {
    let zone = zone.trim().trim_end_matches('.');
    if !validator::is_valid_hostname(zone) {
        return Err(ApiError::InvalidRequest(format!("Invalid zone name: {}", zone)));
    }
    Ok(zone.to_string())
}

/// Look up the key a request names (or the default key)
fn resolve_key(
    state: &AppState,
    requested: Option<&str>,
) -> Result<(String, ZoneConfig, TsigKey), ApiError> {
    let key_id = state
        .keyring
        .resolve_key_id(requested)
        .ok_or(ApiError::NoKey)?
        .to_string();
    let config = state
        .keyring
        .zone_config(&key_id)
        .ok_or_else(|| ApiError::UnknownKey(key_id.clone()))?;
    let key = state
        .keyring
        .key(&key_id)
        .ok_or_else(|| ApiError::UnknownKey(key_id.clone()))?;
    Ok((key_id, config, key))
}

/// Validate against the live zone and apply as one transaction
async fn apply(
    state: &AppState,
    zone: &str,
    key_id: Option<&str>,
    build: impl FnOnce(&str) -> Vec<PendingChange>,
) -> Result<usize, ApiError> {
    let (key_id, config, key) = resolve_key(state, key_id)?;
    let changes = build(&key_id);

    debug!(
        "Applying {} changes to zone {} with key {}",
        changes.len(),
        zone,
        key_id
    );

    let outcome = state
        .orchestrator
        .apply_changes_checked(&config, zone, &key, &changes)
        .await?;
    Ok(outcome.applied)
}

/// List the records of a zone
#[utoipa::path(
    get,
    path = "/api/v1/zones/{zone}/records",
    params(
        ("zone" = String, Path, description = "Zone name"),
        KeyQuery
    ),
    responses(
        (status = 200, description = "Zone records", body = RecordsResponse),
        (status = 400, description = "Invalid zone name or no key"),
        (status = 404, description = "Unknown TSIG key"),
        (status = 502, description = "Zone transfer failed"),
    ),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let zone = check_zone(&zone)?;
    let (_, config, key) = resolve_key(&state, query.key_id.as_deref())?;

    let output = state.orchestrator.list_records(&config, &zone, &key).await?;

    Ok(Json(RecordsResponse {
        records: output.records,
        warnings: output.warnings,
    }))
}

/// Add a record
#[utoipa::path(
    post,
    path = "/api/v1/zones/{zone}/records",
    request_body = RecordRequest,
    params(
        ("zone" = String, Path, description = "Zone name")
    ),
    responses(
        (status = 201, description = "Record added", body = RecordResponse),
        (status = 400, description = "Invalid record or conflicting change", body = ErrorResponse),
        (status = 404, description = "Unknown TSIG key"),
        (status = 502, description = "Update failed"),
    ),
    tag = "records"
)]
pub async fn add_record(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(request): Json<RecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let zone = check_zone(&zone)?;
    info!("Adding record to zone {}: {}", zone, request.record);

    let record = request.record.clone();
    apply(&state, &zone, request.key_id.as_deref(), |key_id| {
        vec![PendingChange::add(&zone, key_id, record)]
    })
    .await?;

    info!("Record added successfully to zone {}", zone);

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse {
            success: true,
            message: Some(format!("Record added to zone {}", zone)),
            details: Some(serde_json::json!({
                "zone": zone,
                "record": request.record,
            })),
        }),
    ))
}

/// Replace a record
#[utoipa::path(
    put,
    path = "/api/v1/zones/{zone}/records",
    request_body = UpdateRecordRequest,
    params(
        ("zone" = String, Path, description = "Zone name")
    ),
    responses(
        (status = 200, description = "Record updated", body = RecordResponse),
        (status = 400, description = "Invalid record or conflicting change", body = ErrorResponse),
        (status = 404, description = "Unknown TSIG key"),
        (status = 502, description = "Update failed"),
    ),
    tag = "records"
)]
pub async fn update_record(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let zone = check_zone(&zone)?;
    info!(
        "Updating record in zone {}: {} -> {}",
        zone, request.old_record, request.new_record
    );

    let (old, new) = (request.old_record.clone(), request.new_record.clone());
    apply(&state, &zone, request.key_id.as_deref(), |key_id| {
        vec![PendingChange::modify(&zone, key_id, old, new)]
    })
    .await?;

    info!("Record updated successfully in zone {}", zone);

    Ok(Json(RecordResponse {
        success: true,
        message: Some(format!("Record updated in zone {}", zone)),
        details: Some(serde_json::json!({
            "zone": zone,
            "oldRecord": request.old_record,
            "newRecord": request.new_record,
        })),
    }))
}

/// Remove a record
#[utoipa::path(
    delete,
    path = "/api/v1/zones/{zone}/records",
    request_body = RecordRequest,
    params(
        ("zone" = String, Path, description = "Zone name")
    ),
    responses(
        (status = 200, description = "Record removed", body = RecordResponse),
        (status = 400, description = "Invalid record or required record", body = ErrorResponse),
        (status = 404, description = "Unknown TSIG key"),
        (status = 502, description = "Update failed"),
    ),
    tag = "records"
)]
pub async fn delete_record(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(request): Json<RecordRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let zone = check_zone(&zone)?;
    info!("Removing record from zone {}: {}", zone, request.record);

    let record = request.record.clone();
    apply(&state, &zone, request.key_id.as_deref(), |key_id| {
        vec![PendingChange::delete(&zone, key_id, record)]
    })
    .await?;

    info!("Record removed successfully from zone {}", zone);

    Ok(Json(RecordResponse {
        success: true,
        message: Some(format!("Record removed from zone {}", zone)),
        details: Some(serde_json::json!({
            "zone": zone,
            "record": request.record,
        })),
    }))
}

/// Apply a change set atomically
#[utoipa::path(
    post,
    path = "/api/v1/zones/{zone}/changes",
    request_body = ChangeSetRequest,
    params(
        ("zone" = String, Path, description = "Zone name")
    ),
    responses(
        (status = 200, description = "Change set applied", body = RecordResponse),
        (status = 400, description = "Change set rejected; all problems listed", body = ErrorResponse),
        (status = 404, description = "Unknown TSIG key"),
        (status = 502, description = "Update failed"),
    ),
    tag = "records"
)]
pub async fn apply_changes(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(request): Json<ChangeSetRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let zone = check_zone(&zone)?;
    if request.changes.is_empty() {
        return Err(ApiError::InvalidRequest("Change set is empty".to_string()));
    }
    info!(
        "Applying change set of {} changes to zone {}",
        request.changes.len(),
        zone
    );

    let entries = request.changes;
    let applied = apply(&state, &zone, request.key_id.as_deref(), |key_id| {
        bind_changes(entries, &zone, key_id)
    })
    .await?;

    Ok(Json(RecordResponse {
        success: true,
        message: Some(format!("Applied {} changes to zone {}", applied, zone)),
        details: Some(serde_json::json!({
            "zone": zone,
            "applied": applied,
        })),
    }))
}

/// Validate a change set without applying it
#[utoipa::path(
    post,
    path = "/api/v1/zones/{zone}/changes/validate",
    request_body = ChangeSetRequest,
    params(
        ("zone" = String, Path, description = "Zone name")
    ),
    responses(
        (status = 200, description = "Validation result", body = ValidationResult),
        (status = 400, description = "Invalid zone name"),
    ),
    tag = "records"
)]
pub async fn validate_changes(
    Path(zone): Path<String>,
    Json(request): Json<ChangeSetRequest>,
) -> Result<Json<ValidationResult>, ApiError> {
    let zone = check_zone(&zone)?;
    let key_id = request.key_id.clone().unwrap_or_default();
    let changes = bind_changes(request.changes, &zone, &key_id);

    let result = ConflictDetector::new(&zone).validate(&changes);
    debug!(
        "Dry run of {} changes for zone {}: valid={}",
        changes.len(),
        zone,
        result.is_valid()
    );

    Ok(Json(result))
}

/// Bind request entries to their zone (the path zone unless given) and key
fn bind_changes(entries: Vec<ChangeEntry>, zone: &str, key_id: &str) -> Vec<PendingChange> {
    entries
        .into_iter()
        .map(|entry| PendingChange {
            zone: entry.zone.unwrap_or_else(|| zone.to_string()),
            key_id: key_id.to_string(),
            change: entry.change,
        })
        .collect()
}

