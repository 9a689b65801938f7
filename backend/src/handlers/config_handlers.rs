use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::{
    config::{
        ScanConfig, ScanConfigPatch, VulnerabilityDefinition, VulnerabilityLibrary,
        VulnerabilityRulePatch,
    },
    error::ApiError,
    AppState,
};

pub async fn get_config(State(app_state): State<AppState>) -> Result<Json<ScanConfig>, ApiError> {
    Ok(Json(app_state.config.get_config().await?))
}

pub async fn update_config(
    State(app_state): State<AppState>,
    Json(patch): Json<ScanConfigPatch>,
) -> Result<Json<ScanConfig>, ApiError> {
    Ok(Json(app_state.config.update_config(patch).await?))
}

pub async fn get_vulnerability_library(
    State(app_state): State<AppState>,
) -> Result<Json<VulnerabilityLibrary>, ApiError> {
    Ok(Json(app_state.config.get_vulnerability_library().await?))
}

pub async fn update_vulnerability_rule(
    State(app_state): State<AppState>,
    Path(module): Path<String>,
    Json(patch): Json<VulnerabilityRulePatch>,
) -> Result<Json<VulnerabilityDefinition>, ApiError> {
    let rule = app_state
        .config
        .update_vulnerability_rule(&module, patch)
        .await?;
    Ok(Json(rule))
}

pub async fn reset_config(State(app_state): State<AppState>) -> Result<Json<ScanConfig>, ApiError> {
    Ok(Json(app_state.config.reset_config().await?))
}
