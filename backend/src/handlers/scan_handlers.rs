use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    models::{BatchScanCreate, BatchScanOutcome, ScanCreate, ScanRecord, ScanStartResponse},
    AppState,
};

pub async fn start_scan(
    State(app_state): State<AppState>,
    Json(payload): Json<ScanCreate>,
) -> Result<Json<ScanStartResponse>, ApiError> {
    let response = app_state.scans.start_scan(payload).await?;
    Ok(Json(response))
}

pub async fn batch_scan(
    State(app_state): State<AppState>,
    Json(payload): Json<BatchScanCreate>,
) -> Result<Json<Vec<BatchScanOutcome>>, ApiError> {
    let outcomes = app_state.scans.batch_scan(payload).await?;
    Ok(Json(outcomes))
}

pub async fn get_scan_status(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanRecord>, ApiError> {
    let scan = app_state.scans.get_scan_status(&id).await?;
    Ok(Json(scan))
}

pub async fn get_active_scans(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<ScanRecord>>, ApiError> {
    let scans = app_state.scans.get_active_scans().await?;
    Ok(Json(scans))
}

pub async fn list_scans(State(app_state): State<AppState>) -> Json<Vec<ScanRecord>> {
    Json(app_state.scan_service.get_all_scans().await)
}

pub async fn cancel_scan(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanRecord>, ApiError> {
    let scan = app_state.scan_service.cancel_scan(&id).await?;
    Ok(Json(scan))
}

pub async fn delete_scan(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    app_state.scan_service.delete_scan(&id).await?;
    Ok(Json(json!({ "id": id, "message": "Scan deleted" })))
}

/// Remove all finished scans and every stored report.
pub async fn clear_scans(State(app_state): State<AppState>) -> Json<Value> {
    let removed = app_state.scan_service.clear_all_scans().await;
    Json(json!({ "removed": removed, "message": "Finished scans cleared" }))
}
