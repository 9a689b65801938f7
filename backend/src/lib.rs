use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::{
    config::Settings,
    error::ApiError,
    repositories::{SqlxStateStore, StateStore},
    services::{ConfigBackend, RandomSource, ReportBackend, ScanBackend, ScanService, ThreadRandom},
};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub scan_service: Arc<ScanService>,
    pub scans: Arc<dyn ScanBackend>,
    pub reports: Arc<dyn ReportBackend>,
    pub config: Arc<dyn ConfigBackend>,
}

impl AppState {
    /// Build state backed by the SQLite store at `settings.database_url`.
    pub async fn new(settings: Settings) -> Result<Self, ApiError> {
        let pool = crate::database::create_connection_pool(&settings.database_url).await?;
        let store: Arc<dyn StateStore + Send + Sync> = Arc::new(SqlxStateStore::new(pool));
        Self::with_store(settings, store, Arc::new(ThreadRandom)).await
    }

    /// Build state over an explicit store and random source.
    pub async fn with_store(
        settings: Settings,
        store: Arc<dyn StateStore + Send + Sync>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self, ApiError> {
        let scan_service = Arc::new(ScanService::initialize(store, &settings, rng).await?);

        Ok(Self {
            settings: Arc::new(settings),
            scans: scan_service.clone(),
            reports: scan_service.clone(),
            config: scan_service.clone(),
            scan_service,
        })
    }
}

/// API routes without transport layers (CORS, tracing).
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health_check))
        .route("/api/health/live", get(handlers::liveness_check))
        // Scan service
        .route("/api/scan/start", post(handlers::scan_handlers::start_scan))
        .route("/api/scan/batch", post(handlers::scan_handlers::batch_scan))
        .route("/api/scan/status/:id", get(handlers::scan_handlers::get_scan_status))
        .route("/api/scan/active", get(handlers::scan_handlers::get_active_scans))
        // Scan registry
        .route(
            "/api/scans",
            get(handlers::scan_handlers::list_scans).delete(handlers::scan_handlers::clear_scans),
        )
        .route("/api/scans/:id", delete(handlers::scan_handlers::delete_scan))
        .route("/api/scans/:id/cancel", post(handlers::scan_handlers::cancel_scan))
        // Reports
        .route("/api/report", get(handlers::report_handlers::list_reports))
        .route(
            "/api/report/:id",
            get(handlers::report_handlers::get_report).delete(handlers::report_handlers::delete_report),
        )
        .route("/api/report/summary/recent", get(handlers::report_handlers::recent_summary))
        .route(
            "/api/report/stats/vulnerability_types",
            get(handlers::report_handlers::vulnerability_stats),
        )
        // Scan configuration
        .route(
            "/api/config",
            get(handlers::config_handlers::get_config).patch(handlers::config_handlers::update_config),
        )
        .route(
            "/api/config/vulnerabilities",
            get(handlers::config_handlers::get_vulnerability_library),
        )
        .route(
            "/api/config/vulnerabilities/:module",
            patch(handlers::config_handlers::update_vulnerability_rule),
        )
        .route("/api/config/reset", post(handlers::config_handlers::reset_config))
        .with_state(app_state)
}
