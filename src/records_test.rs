// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for record management handlers

#[cfg(test)]
mod tests {
    use crate::keyfile::KeyFileManager;
    use crate::keyring::{parse_keyring_str, Keyring};
    use crate::orchestrator::ZoneOrchestrator;
    use crate::record::{Change, RecordType, RecordValue};
    use crate::records::{routes, ChangeSetRequest, RecordRequest, UpdateRecordRequest};
    use crate::transport::{TransportError, ZoneTransport};
    use crate::types::AppState;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const KEYRING: &str = r#"
key "update-key" {
    algorithm hmac-sha256;
    secret "cmVjb3Jkcy10ZXN0LXNlY3JldA==";
};
server 10.0.0.53 {
    key "update-key";
};
"#;

    const ZONE_DATA: &str = "\
example.com. 3600 IN SOA ns1.example.com. admin.example.com. 2024010100 3600 900 604800 86400
example.com. 3600 IN NS ns1.example.com.
docs.example.com. 300 IN CNAME www.example.com.
www.example.com. 300 IN A 192.0.2.10
example.com. 3600 IN SOA ns1.example.com. admin.example.com. 2024010100 3600 900 604800 86400
";

    #[derive(Default)]
    struct StubTransport {
        fail_updates: bool,
        scripts: Mutex<Vec<String>>,
        transfers: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ZoneTransport for StubTransport {
        async fn transfer(
            &self,
            server: &str,
            zone: &str,
            _key_file: &Path,
        ) -> Result<String, TransportError> {
            self.transfers
                .lock()
                .unwrap()
                .push((server.to_string(), zone.to_string()));
            Ok(ZONE_DATA.to_string())
        }

        async fn update(
            &self,
            _server: &str,
            script: &str,
            _key_file: &Path,
        ) -> Result<String, TransportError> {
            self.scripts.lock().unwrap().push(script.to_string());
            if self.fail_updates {
                return Err(TransportError::Failed {
                    tool: "nsupdate",
                    message: "Zone refused the update (check allow-update configuration)"
                        .to_string(),
                });
            }
            Ok(String::new())
        }
    }

    struct TestApp {
        _tmp: TempDir,
        router: Router,
        transport: Arc<StubTransport>,
    }

    fn app_with(keyring: Keyring, transport: StubTransport) -> TestApp {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(transport);
        let orchestrator =
            ZoneOrchestrator::new(KeyFileManager::new(tmp.path().join("keys")), transport.clone());
        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            keyring: Arc::new(keyring),
        };
        TestApp {
            _tmp: tmp,
            router: Router::new().nest("/api/v1", routes()).with_state(state),
            transport,
        }
    }

    fn app() -> TestApp {
        app_with(parse_keyring_str(KEYRING).unwrap(), StubTransport::default())
    }

    async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[test]
    fn test_record_request_deserialization() {
        let request: RecordRequest = serde_json::from_value(json!({
            "record": {"name": "www", "type": "a", "value": "192.0.2.1"},
            "keyId": "update-key"
        }))
        .unwrap();

        assert_eq!(request.key_id.as_deref(), Some("update-key"));
        assert_eq!(request.record.record_type, RecordType::A);
        assert_eq!(request.record.ttl, 3600);
        assert_eq!(request.record.class, "IN");
    }

    #[test]
    fn test_record_request_with_structured_value() {
        let request: RecordRequest = serde_json::from_value(json!({
            "record": {
                "name": "@",
                "type": "MX",
                "value": {"priority": 10, "target": "mail.example.com."},
                "ttl": 300
            }
        }))
        .unwrap();

        assert!(request.key_id.is_none());
        assert!(matches!(request.record.value, RecordValue::Mx(_)));

        let txt: RecordRequest = serde_json::from_value(json!({
            "record": {"name": "@", "type": "TXT", "value": ["part one", "part two"]}
        }))
        .unwrap();
        assert!(matches!(txt.record.value, RecordValue::Strings(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_update_record_request_serialization() {
        let request: UpdateRecordRequest = serde_json::from_value(json!({
            "oldRecord": {"name": "www", "type": "A", "value": "192.0.2.1"},
            "newRecord": {"name": "www", "type": "A", "value": "192.0.2.2", "ttl": 60}
        }))
        .unwrap();

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"oldRecord\""));
        assert!(json.contains("\"newRecord\""));
        // keyId is omitted when None
        assert!(!json.contains("keyId"));
    }

    #[test]
    fn test_change_set_request_deserialization() {
        let request: ChangeSetRequest = serde_json::from_value(json!({
            "changes": [
                {"action": "ADD", "record": {"name": "api", "type": "A", "value": "192.0.2.5"}},
                {
                    "action": "MODIFY",
                    "originalRecord": {"name": "www", "type": "A", "value": "192.0.2.10"},
                    "newRecord": {"name": "www", "type": "A", "value": "192.0.2.11"}
                },
                {"action": "DELETE", "zone": "example.com", "record": {"name": "old", "type": "TXT", "value": "x"}}
            ]
        }))
        .unwrap();

        assert_eq!(request.changes.len(), 3);
        assert!(matches!(request.changes[0].change, Change::Add { .. }));
        assert!(matches!(request.changes[1].change, Change::Modify { .. }));
        assert!(matches!(request.changes[2].change, Change::Delete { .. }));
        assert_eq!(request.changes[2].zone.as_deref(), Some("example.com"));
        assert!(request.changes[0].zone.is_none());
    }

    #[test]
    fn test_change_set_request_rejects_unknown_action() {
        let result = serde_json::from_value::<ChangeSetRequest>(json!({
            "changes": [{"action": "UPSERT", "record": {"name": "a", "type": "A", "value": "192.0.2.1"}}]
        }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_records() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/v1/zones/example.com/records", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"].as_array().unwrap().len(), 5);
        assert_eq!(body["records"][3]["name"], "www.example.com.");
        assert_eq!(body["records"][3]["type"], "A");
        assert_eq!(body["warnings"].as_array().unwrap().len(), 0);

        let transfers = app.transport.transfers.lock().unwrap().clone();
        assert_eq!(transfers, vec![("10.0.0.53".to_string(), "example.com".to_string())]);
    }

    #[tokio::test]
    async fn test_list_records_invalid_zone() {
        let app = app();
        let (status, body) =
            send(&app, Method::GET, "/api/v1/zones/bad_zone!/records", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid zone name"));
        assert!(app.transport.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/zones/example.com/records?keyId=nope",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_key_is_bad_request() {
        let app = app_with(Keyring::default(), StubTransport::default());
        let (status, body) =
            send(&app, Method::GET, "/api/v1/zones/example.com/records", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("No keyId"));
    }

    #[tokio::test]
    async fn test_add_record() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/records",
            Some(json!({"record": {"name": "api", "type": "A", "value": "192.0.2.20", "ttl": 300}})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);

        let scripts = app.transport.scripts.lock().unwrap().clone();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with("server 10.0.0.53 53\nzone example.com.\n"));
        assert!(scripts[0].contains("update add api.example.com. 300 IN A 192.0.2.20\n"));
    }

    #[tokio::test]
    async fn test_add_record_conflicting_with_live_cname() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/records",
            Some(json!({"record": {"name": "docs", "type": "A", "value": "192.0.2.20"}})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_str().unwrap().contains("cannot coexist"));
        assert!(app.transport.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_record() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/v1/zones/example.com/records",
            Some(json!({
                "oldRecord": {"name": "www", "type": "A", "value": "192.0.2.10", "ttl": 300},
                "newRecord": {"name": "www", "type": "A", "value": "192.0.2.11", "ttl": 300}
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let scripts = app.transport.scripts.lock().unwrap().clone();
        assert!(scripts[0].contains("update delete www.example.com. A 192.0.2.10\n"));
        assert!(scripts[0].contains("update add www.example.com. 300 IN A 192.0.2.11\n"));
    }

    #[tokio::test]
    async fn test_delete_apex_soa_is_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::DELETE,
            "/api/v1/zones/example.com/records",
            Some(json!({"record": {
                "name": "@",
                "type": "SOA",
                "value": "ns1.example.com. admin.example.com. 2024010100 3600 900 604800 86400"
            }})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"][0]
            .as_str()
            .unwrap()
            .contains("required record"));
    }

    #[tokio::test]
    async fn test_apply_changes() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/changes",
            Some(json!({
                "keyId": "update-key",
                "changes": [
                    {"action": "ADD", "record": {"name": "api", "type": "A", "value": "192.0.2.5"}},
                    {"action": "DELETE", "record": {"name": "www", "type": "A", "value": "192.0.2.10"}}
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"]["applied"], 2);
        assert_eq!(app.transport.scripts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_empty_change_set() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/changes",
            Some(json!({"changes": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_apply_changes_reports_every_error() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/changes",
            Some(json!({
                "changes": [
                    {"action": "ADD", "record": {"name": "new", "type": "CNAME", "value": "www.example.com."}},
                    {"action": "ADD", "record": {"name": "new", "type": "A", "value": "192.0.2.5"}},
                    {"action": "ADD", "record": {"name": "bad", "type": "A", "value": "300.0.0.1"}}
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
        assert!(app.transport.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_failure_is_bad_gateway() {
        let app = app_with(
            parse_keyring_str(KEYRING).unwrap(),
            StubTransport {
                fail_updates: true,
                ..StubTransport::default()
            },
        );
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/records",
            Some(json!({"record": {"name": "api", "type": "A", "value": "192.0.2.20"}})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "operation failed");
        assert!(!body.to_string().contains("cmVjb3Jkcy10ZXN0LXNlY3JldA=="));
    }

    #[tokio::test]
    async fn test_validate_changes_is_a_dry_run() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/changes/validate",
            Some(json!({
                "changes": [
                    {"action": "ADD", "record": {"name": "www", "type": "CNAME", "value": "web.example.com."}},
                    {"action": "ADD", "record": {"name": "www", "type": "A", "value": "192.0.2.10"}}
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
        assert!(app.transport.transfers.lock().unwrap().is_empty());
        assert!(app.transport.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_changes_accepts_valid_set() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/zones/example.com/changes/validate",
            Some(json!({
                "changes": [
                    {"action": "ADD", "record": {"name": "api", "type": "AAAA", "value": "2001:db8::5"}}
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], true);
        assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    }
}
