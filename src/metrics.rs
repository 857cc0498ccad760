// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for zonekeeper
//!
//! - HTTP request metrics (count, duration, status codes) by matched route
//! - External command metrics (`dig`, `nsupdate`) by tool and result
//! - Change-set outcomes (applied, rejected, failed)
//! - Number of TSIG key files currently on disk

use lazy_static::lazy_static;
use prometheus::{
    opts, register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// HTTP request counter by method, route, and status code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        opts!(
            "zonekeeper_http_requests_total",
            "Total number of HTTP requests processed"
        ),
        &["method", "path", "status"]
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration histogram
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "zonekeeper_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// External command counter by tool and result
    pub static ref COMMANDS_TOTAL: CounterVec = register_counter_vec!(
        opts!(
            "zonekeeper_commands_total",
            "Total number of external DNS tool invocations"
        ),
        &["tool", "result"]
    )
    .expect("Failed to create COMMANDS_TOTAL metric");

    /// External command duration histogram
    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "zonekeeper_command_duration_seconds",
        "External DNS tool execution duration in seconds",
        &["tool"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create COMMAND_DURATION_SECONDS metric");

    /// Change-set counter by outcome
    pub static ref CHANGE_BATCHES_TOTAL: CounterVec = register_counter_vec!(
        opts!(
            "zonekeeper_change_batches_total",
            "Total number of change sets submitted"
        ),
        &["outcome"]
    )
    .expect("Failed to create CHANGE_BATCHES_TOTAL metric");

    /// TSIG key files currently materialized
    pub static ref KEY_FILES_ACTIVE: IntGauge = register_int_gauge!(
        opts!(
            "zonekeeper_key_files_active",
            "Number of TSIG key files currently on disk"
        )
    )
    .expect("Failed to create KEY_FILES_ACTIVE metric");

    /// Application info metric
    pub static ref APP_INFO: CounterVec = register_counter_vec!(
        opts!(
            "zonekeeper_app_info",
            "Application information"
        ),
        &["version"]
    )
    .expect("Failed to create APP_INFO metric");
}

/// Initialize metrics with application info
pub fn init_metrics() {
    APP_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .inc();
}

/// Generate metrics output in Prometheus format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record an external tool invocation
pub fn record_command(tool: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    COMMANDS_TOTAL.with_label_values(&[tool, result]).inc();
    COMMAND_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(duration);
}

/// Record the outcome of a change set ("applied", "rejected", "failed")
pub fn record_change_batch(outcome: &str) {
    CHANGE_BATCHES_TOTAL.with_label_values(&[outcome]).inc();
}
