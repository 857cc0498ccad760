// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for metrics module

use super::metrics::*;

#[test]
fn test_init_metrics() {
    init_metrics();
    // Verify app info metric was set
    let metrics = gather_metrics().unwrap();
    assert!(metrics.contains("zonekeeper_app_info"));
    assert!(metrics.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_record_http_request() {
    record_http_request("GET", "/api/v1/zones/{zone}/records", 200, 0.123);
    record_http_request("POST", "/api/v1/zones/{zone}/changes", 400, 0.456);
    record_http_request("PUT", "/api/v1/zones/{zone}/records", 502, 1.234);

    let metrics = gather_metrics().unwrap();
    assert!(metrics.contains("zonekeeper_http_requests_total"));
    assert!(metrics.contains("zonekeeper_http_request_duration_seconds"));
    assert!(metrics.contains("status=\"502\""));
}

#[test]
fn test_record_command() {
    record_command("dig", true, 0.05);
    record_command("nsupdate", false, 2.5);

    let metrics = gather_metrics().unwrap();
    assert!(metrics.contains("zonekeeper_commands_total"));
    assert!(metrics.contains("zonekeeper_command_duration_seconds"));
    assert!(metrics.contains("tool=\"nsupdate\""));
    assert!(metrics.contains("result=\"error\""));
}

#[test]
fn test_record_command_duration_buckets() {
    for duration in [0.001, 0.1, 1.0, 10.0, 60.0] {
        record_command("dig", true, duration);
    }

    let before = COMMAND_DURATION_SECONDS
        .with_label_values(&["dig"])
        .get_sample_count();
    record_command("dig", true, 0.2);
    let after = COMMAND_DURATION_SECONDS
        .with_label_values(&["dig"])
        .get_sample_count();
    assert!(after > before);
}

#[test]
fn test_record_change_batch() {
    let before = CHANGE_BATCHES_TOTAL.with_label_values(&["rejected"]).get();
    record_change_batch("rejected");
    record_change_batch("applied");
    let after = CHANGE_BATCHES_TOTAL.with_label_values(&["rejected"]).get();
    assert!(after >= before + 1.0);

    let metrics = gather_metrics().unwrap();
    assert!(metrics.contains("zonekeeper_change_batches_total"));
    assert!(metrics.contains("outcome=\"applied\""));
}

#[test]
fn test_all_metrics_registered() {
    // Trigger all metrics at least once
    init_metrics();
    record_http_request("GET", "/api/v1/health", 200, 0.1);
    record_command("dig", true, 0.1);
    record_change_batch("applied");
    KEY_FILES_ACTIVE.get();

    let metrics = gather_metrics().unwrap();

    // Verify all metric families are present
    assert!(metrics.contains("zonekeeper_http_requests_total"));
    assert!(metrics.contains("zonekeeper_http_request_duration_seconds"));
    assert!(metrics.contains("zonekeeper_commands_total"));
    assert!(metrics.contains("zonekeeper_command_duration_seconds"));
    assert!(metrics.contains("zonekeeper_change_batches_total"));
    assert!(metrics.contains("zonekeeper_key_files_active"));
    assert!(metrics.contains("zonekeeper_app_info"));
}
