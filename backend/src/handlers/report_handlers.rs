use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    models::{RecentSummary, ScanResult, VulnerabilityStats},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct RecentSummaryQuery {
    pub days: Option<i64>,
}

pub async fn list_reports(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<ScanResult>>, ApiError> {
    Ok(Json(app_state.reports.list_reports().await?))
}

pub async fn get_report(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanResult>, ApiError> {
    Ok(Json(app_state.reports.get_report(&id).await?))
}

pub async fn recent_summary(
    State(app_state): State<AppState>,
    Query(query): Query<RecentSummaryQuery>,
) -> Result<Json<RecentSummary>, ApiError> {
    Ok(Json(app_state.reports.recent_summary(query.days).await?))
}

pub async fn delete_report(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    app_state.reports.delete_report(&id).await?;
    Ok(Json(json!({ "id": id, "message": "Report deleted" })))
}

pub async fn vulnerability_stats(
    State(app_state): State<AppState>,
) -> Result<Json<VulnerabilityStats>, ApiError> {
    Ok(Json(app_state.reports.vulnerability_stats().await?))
}
