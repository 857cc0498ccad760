// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! zonekeeper API server
//!
//! A lightweight HTTP REST API server that manages the records of DNS zones by:
//! - Reading zones with TSIG-authenticated zone transfers (`dig AXFR`)
//! - Validating change sets and applying them with `nsupdate`
//! - Loading TSIG secrets from a keyring file, writing them to disk only for
//!   the duration of a single tool invocation

use anyhow::Context;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use zonekeeper::{
    config::EngineConfig,
    keyfile::KeyFileManager,
    keyring::load_keyring,
    metrics, middleware,
    orchestrator::ZoneOrchestrator,
    record::{DnsRecord, ValidationResult},
    records,
    transfer_parser::ParseWarning,
    transport::BindToolsTransport,
    types::{AppState, ErrorResponse},
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        records::list_records,
        records::add_record,
        records::update_record,
        records::delete_record,
        records::apply_changes,
        records::validate_changes,
    ),
    components(
        schemas(
            records::RecordRequest,
            records::UpdateRecordRequest,
            records::ChangeSetRequest,
            records::RecordsResponse,
            records::RecordResponse,
            DnsRecord,
            ParseWarning,
            ValidationResult,
            ErrorResponse,
        )
    ),
    tags(
        (name = "records", description = "Zone record endpoints"),
    ),
    info(
        title = "zonekeeper API",
        version = "0.1.0",
        description = "HTTP REST API for TSIG-authenticated DNS record management",
        license(name = "MIT")
    )
)]
struct ApiDoc;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    keys: usize,
}

/// Health check endpoint
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        keys: state.keyring.len(),
    })
}

/// Metrics endpoint for Prometheus scraping
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_text,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to gather metrics: {}", e))),
        )
            .into_response(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("starting zonekeeper api server v{}", env!("CARGO_PKG_VERSION"));

    metrics::init_metrics();

    let config = EngineConfig::from_env();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        return Err(anyhow::anyhow!("invalid configuration: {}", e));
    }

    info!("api port: {}", config.api_port);
    info!("key directory: {}", config.key_dir.display());
    info!("operation timeout: {}s", config.operation_timeout_secs);
    info!("fallback dns server: {}", config.dns_server);

    let keyring = load_keyring(&config.keyring_path)
        .with_context(|| {
            format!(
                "failed to load tsig keyring from {} (set TSIG_KEYRING)",
                config.keyring_path.display()
            )
        })?
        .with_fallback_server(config.dns_server.clone());

    if keyring.is_empty() {
        warn!("keyring contains no keys; every record request will be rejected");
    }
    for key_id in keyring.key_ids() {
        if let Some(zone_config) = keyring.zone_config(key_id) {
            info!(
                "tsig key {} ({}) -> {}",
                key_id, zone_config.algorithm, zone_config.server
            );
        }
    }

    let transport = BindToolsTransport::new(
        config.dig_path.clone(),
        config.nsupdate_path.clone(),
        config.operation_timeout(),
    );
    let orchestrator = ZoneOrchestrator::new(
        KeyFileManager::new(config.key_dir.clone()),
        Arc::new(transport),
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        keyring: Arc::new(keyring),
    };

    // build main router
    let app = Router::new()
        .merge(SwaggerUi::new("/api/v1/docs").url("/api/v1/openapi.json", ApiDoc::openapi()))
        .route("/api/v1/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", records::routes())
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);

    info!("zonekeeper api server listening on {}", addr);
    info!("swagger ui available at http://{}/api/v1/docs", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
