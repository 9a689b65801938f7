use axum::http::{Method, StatusCode};
use serde_json::json;

use scan_orchestrator::services::ScriptedRandom;

mod common;
use common::{harness, send, today_id};

#[tokio::test]
async fn test_health_check() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "scan-orchestrator");
    assert_eq!(body["active_scans"], 0);
    assert_eq!(body["checks"]["store"]["healthy"], true);

    let (status, body) = send(&app, Method::GET, "/api/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alive"], true);
}

#[tokio::test]
async fn test_health_check_reports_unavailable_store() {
    let h = harness(ScriptedRandom::new()).await;
    h.store.set_fail_writes(true);

    let (status, body) = send(&h.router(), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["store"]["healthy"], false);
}

#[tokio::test]
async fn test_start_scan_and_conflicts() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://example.com", "modules": ["xss"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scan_id"], today_id(1));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["message"], "Scan started");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_ACTIVE_SCAN");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "not a url" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_scans"], 1);
    assert!(body["last_error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to create scan"));
}

#[tokio::test]
async fn test_scan_status_and_active_list() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(&app, Method::GET, "/api/scan/status/SCN-20240101-001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://example.com" })),
    )
    .await;

    let uri = format!("/api/scan/status/{}", today_id(1));
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://example.com");
    assert_eq!(body["progress"], 0);
    assert_eq!(body["modules"], json!(["sql_injection", "xss", "csrf"]));

    let (status, body) = send(&app, Method::GET, "/api/scan/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_then_delete_scan() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();
    send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://example.com" })),
    )
    .await;
    let id = today_id(1);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/scans/{}", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CANNOT_DELETE_ACTIVE");

    let cancel_uri = format!("/api/scans/{}/cancel", id);
    let (status, body) = send(&app, Method::POST, &cancel_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(&app, Method::POST, &cancel_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = send(&app, Method::DELETE, &format!("/api/scans/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Scan deleted");

    let (_, body) = send(&app, Method::GET, "/api/scans", None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::DELETE, &format!("/api/scans/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrency_limit_returns_429() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/config",
        Some(json!({ "concurrent_scans": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["concurrent_scans"], 1);

    send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://a.example.com" })),
    )
    .await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://b.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "CONCURRENCY_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_batch_scan_endpoint() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/batch",
        Some(json!({ "urls": ["https://a.example.com", "gopher://b.example.com"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcomes = body.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["scan_id"], today_id(1));
    assert!(outcomes[0]["error"].is_null());
    assert!(outcomes[1]["scan_id"].is_null());
    assert!(outcomes[1]["error"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/scan/batch",
        Some(json!({ "urls": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_config_endpoints() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(&app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["concurrent_scans"], 3);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/config",
        Some(json!({ "timeout": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/config/vulnerabilities/xss",
        Some(json!({ "severity": "critical" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["severity"], "critical");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/config/vulnerabilities/ssrf",
        Some(json!({ "severity": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_MODULE");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/config/vulnerabilities/ssrf",
        Some(json!({
            "severity": "high",
            "description": "Server-side request forgery",
            "patterns": ["169.254.169.254"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/config/vulnerabilities", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["xss"]["severity"], "critical");
    assert_eq!(body["ssrf"]["patterns"], json!(["169.254.169.254"]));

    let (status, body) = send(&app, Method::POST, "/api/config/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vulnerability_definitions"]["xss"]["severity"], "medium");
    assert!(body["vulnerability_definitions"]["ssrf"].is_null());
}

#[tokio::test]
async fn test_report_endpoints_when_empty() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    let (status, body) = send(&app, Method::GET, "/api/report", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::GET, "/api/report/summary/recent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 7);
    assert_eq!(body["total_scans"], 0);
    assert_eq!(
        body["severity_counts"],
        json!({ "low": 0, "medium": 0, "high": 0, "critical": 0 })
    );

    let (status, _) = send(&app, Method::GET, "/api/report/summary/recent?days=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&app, Method::GET, "/api/report/summary/recent?days=100000000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 100000000);
    assert_eq!(body["total_scans"], 0);

    let (status, body) = send(&app, Method::GET, "/api/report/stats/vulnerability_types", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, _) = send(&app, Method::GET, "/api/report/SCN-20240101-001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/api/report/SCN-20240101-001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_completed_scan_shows_up_in_reports() {
    // xss: one finding; csrf: two findings
    let h = harness(ScriptedRandom::new().with_integers([1, 0, 2])).await;
    let app = h.router();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://shop.example.com", "modules": ["xss", "csrf"] })),
    )
    .await;
    let id = body["scan_id"].as_str().unwrap().to_string();
    h.state.scan_service.wait_for_scan(&id).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/report/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["vulnerabilities"].as_array().unwrap().len(), 3);
    assert_eq!(body["vulnerabilities"][0]["type"], "xss");

    let (_, body) = send(&app, Method::GET, "/api/report/summary/recent?days=1", None).await;
    assert_eq!(body["total_scans"], 1);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["vulnerability_summary"], json!({ "csrf": 2, "xss": 1 }));
    assert_eq!(body["severity_counts"]["medium"], 3);

    let (_, body) = send(&app, Method::GET, "/api/report/stats/vulnerability_types", None).await;
    assert_eq!(body, json!({ "csrf": 2, "xss": 1 }));

    let (status, _) = send(&app, Method::DELETE, &format!("/api/report/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/api/report", None).await;
    assert_eq!(body, json!([]));

    // the scan record itself is untouched by report deletion
    let (status, body) = send(&app, Method::GET, &format!("/api/scan/status/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test(start_paused = true)]
async fn test_clear_scans_endpoint() {
    let h = harness(ScriptedRandom::new()).await;
    let app = h.router();

    send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://done.example.com" })),
    )
    .await;
    h.state.scan_service.wait_for_scan(&today_id(1)).await;
    send(
        &app,
        Method::POST,
        "/api/scan/start",
        Some(json!({ "url": "https://busy.example.com" })),
    )
    .await;

    let (status, body) = send(&app, Method::DELETE, "/api/scans", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, body) = send(&app, Method::GET, "/api/scans", None).await;
    let scans = body.as_array().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0]["id"], today_id(2));

    let (_, body) = send(&app, Method::GET, "/api/report", None).await;
    assert_eq!(body, json!([]));
}
