//! Service surfaces consumed by the HTTP layer. The local simulator backend
//! implements all three, so callers never depend on which engine runs scans.

use async_trait::async_trait;

use crate::{
    config::{ScanConfig, ScanConfigPatch, VulnerabilityDefinition, VulnerabilityLibrary, VulnerabilityRulePatch},
    error::ApiError,
    models::{
        BatchScanCreate, BatchScanOutcome, RecentSummary, ScanCreate, ScanRecord, ScanResult,
        ScanStartResponse, VulnerabilityStats,
    },
};

#[async_trait]
pub trait ScanBackend: Send + Sync {
    async fn start_scan(&self, request: ScanCreate) -> Result<ScanStartResponse, ApiError>;
    async fn batch_scan(&self, request: BatchScanCreate) -> Result<Vec<BatchScanOutcome>, ApiError>;
    async fn get_scan_status(&self, id: &str) -> Result<ScanRecord, ApiError>;
    async fn get_active_scans(&self) -> Result<Vec<ScanRecord>, ApiError>;
}

#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn list_reports(&self) -> Result<Vec<ScanResult>, ApiError>;
    async fn get_report(&self, id: &str) -> Result<ScanResult, ApiError>;
    async fn recent_summary(&self, days: Option<i64>) -> Result<RecentSummary, ApiError>;
    async fn delete_report(&self, id: &str) -> Result<(), ApiError>;
    async fn vulnerability_stats(&self) -> Result<VulnerabilityStats, ApiError>;
}

#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn get_config(&self) -> Result<ScanConfig, ApiError>;
    async fn update_config(&self, patch: ScanConfigPatch) -> Result<ScanConfig, ApiError>;
    async fn get_vulnerability_library(&self) -> Result<VulnerabilityLibrary, ApiError>;
    async fn update_vulnerability_rule(
        &self,
        module: &str,
        patch: VulnerabilityRulePatch,
    ) -> Result<VulnerabilityDefinition, ApiError>;
    async fn reset_config(&self) -> Result<ScanConfig, ApiError>;
}
