use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::AppState;

/// Store reachability plus live scan counters. Responds 503 when the store
/// cannot be reached.
pub async fn health_check(State(app_state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store = match app_state.scan_service.check_store().await {
        Ok(()) => json!({ "healthy": true }),
        Err(e) => {
            tracing::error!(error = %e, "state store health check failed");
            json!({ "healthy": false, "error": e.to_string() })
        }
    };
    let healthy = store["healthy"].as_bool().unwrap_or(false);

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "scan-orchestrator",
        "active_scans": app_state.scan_service.active_scans_count().await,
        "last_error": app_state.scan_service.last_error(),
        "checks": { "store": store },
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

pub async fn liveness_check() -> Json<Value> {
    Json(json!({
        "alive": true,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
