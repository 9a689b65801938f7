use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::{
        ConfigManager, ScanConfig, ScanConfigPatch, Settings, VulnerabilityDefinition,
        VulnerabilityLibrary, VulnerabilityRulePatch,
    },
    error::{ApiError, LastError},
    models::{
        BatchScanCreate, BatchScanOutcome, RecentSummary, ScanCreate, ScanRecord, ScanResult,
        ScanStartResponse, ScanStatus, VulnerabilityStats,
    },
    repositories::StateStore,
    services::{
        backend::{ConfigBackend, ReportBackend, ScanBackend},
        random::RandomSource,
        report_service::ReportService,
        scan_registry::ScanRegistry,
        simulator::{ScanSimulator, SimulatorTiming},
        task_manager::TaskManager,
    },
};

const INTERRUPTED_AT_STARTUP: &str = "Scan interrupted by a service restart";
const INTERRUPTED_AT_SHUTDOWN: &str = "Scan interrupted by service shutdown";

/// Dependency root for scan orchestration: owns the registry, the scan
/// configuration and the simulator tasks, and exposes the scan, report and
/// config surfaces.
pub struct ScanService {
    registry: Arc<ScanRegistry>,
    config: Arc<ConfigManager>,
    reports: ReportService,
    simulator: Arc<ScanSimulator>,
    task_manager: Arc<TaskManager>,
    store: Arc<dyn StateStore + Send + Sync>,
    last_error: Arc<LastError>,
    shutdown_grace: Duration,
}

impl ScanService {
    /// Restore state from `store` and wire the simulator.
    pub async fn initialize(
        store: Arc<dyn StateStore + Send + Sync>,
        settings: &Settings,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self, ApiError> {
        let last_error = Arc::new(LastError::new());
        let config = Arc::new(ConfigManager::initialize(store.clone(), last_error.clone()).await?);
        let registry = Arc::new(
            ScanRegistry::load(store.clone(), last_error.clone(), settings.seed_demo_data).await?,
        );

        // Nothing drives scans left active by a previous process.
        registry.fail_interrupted_scans(INTERRUPTED_AT_STARTUP).await;

        let simulator = Arc::new(ScanSimulator::new(
            registry.clone(),
            config.shared_config(),
            rng,
            SimulatorTiming::from_settings(settings),
        ));

        Ok(Self {
            reports: ReportService::new(registry.clone()),
            registry,
            config,
            simulator,
            task_manager: Arc::new(TaskManager::new()),
            store,
            last_error,
            shutdown_grace: Duration::from_millis(settings.shutdown_grace_ms),
        })
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.task_manager
    }

    /// Message from the most recent failed mutating operation.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }

    /// Register a scan and schedule its simulated lifecycle.
    pub async fn create_scan(
        &self,
        url: &str,
        modules: Option<Vec<String>>,
    ) -> Result<ScanRecord, ApiError> {
        let config = self.config.snapshot();
        let record = self.registry.create_scan(url, modules, &config).await?;

        let simulator = self.simulator.clone();
        let scan_id = record.id.clone();
        self.task_manager
            .submit(&record.id, async move { simulator.run(scan_id).await })
            .await;

        Ok(record)
    }

    /// Cancel a pending or running scan. Its simulator observes the new status
    /// under the registry lock and is aborted as well.
    pub async fn cancel_scan(&self, id: &str) -> Result<ScanRecord, ApiError> {
        let record = self.registry.cancel_scan(id).await?;
        self.task_manager.cancel(id).await;
        Ok(record)
    }

    pub async fn delete_scan(&self, id: &str) -> Result<(), ApiError> {
        self.registry.delete_scan(id).await
    }

    pub async fn clear_all_scans(&self) -> usize {
        self.registry.clear_all_scans().await
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        self.registry.delete_report(id).await
    }

    pub async fn active_scans_count(&self) -> usize {
        self.registry.active_scans_count().await
    }

    pub async fn get_all_scans(&self) -> Vec<ScanRecord> {
        self.registry.get_all_scans().await
    }

    pub async fn get_all_results(&self) -> Vec<ScanResult> {
        self.registry.get_all_results().await
    }

    /// Wait for the simulator of `id` to finish. Mostly useful in tests.
    pub async fn wait_for_scan(&self, id: &str) {
        self.task_manager.wait_for(id).await;
    }

    pub async fn check_store(&self) -> Result<(), ApiError> {
        self.store.ping().await
    }

    /// Stop all simulators, fail the scans they were driving and flush every
    /// slot. Storage errors are returned, not swallowed.
    pub async fn shutdown(&self) -> Result<(), ApiError> {
        let aborted = self.task_manager.shutdown(self.shutdown_grace).await;
        let interrupted = self
            .registry
            .fail_interrupted_scans(INTERRUPTED_AT_SHUTDOWN)
            .await;

        self.registry.flush().await.map_err(|e| {
            self.last_error
                .capture("Failed to flush scans during shutdown", e)
        })?;
        self.config.flush().await.map_err(|e| {
            self.last_error
                .capture("Failed to flush scan configuration during shutdown", e)
        })?;

        tracing::info!(aborted, interrupted, "scan service shut down");
        Ok(())
    }
}

#[async_trait]
impl ScanBackend for ScanService {
    async fn start_scan(&self, request: ScanCreate) -> Result<ScanStartResponse, ApiError> {
        let record = self.create_scan(&request.url, request.modules).await?;
        Ok(ScanStartResponse {
            scan_id: record.id,
            status: ScanStatus::Pending,
            message: "Scan started".to_string(),
        })
    }

    async fn batch_scan(&self, request: BatchScanCreate) -> Result<Vec<BatchScanOutcome>, ApiError> {
        if request.urls.is_empty() {
            return Err(ApiError::validation("urls must not be empty"));
        }

        let total = request.urls.len();
        let mut outcomes = Vec::with_capacity(total);
        for url in request.urls {
            let outcome = match self.create_scan(&url, request.modules.clone()).await {
                Ok(record) => BatchScanOutcome {
                    url,
                    scan_id: Some(record.id),
                    error: None,
                },
                Err(e) => BatchScanOutcome {
                    url,
                    scan_id: None,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed > 0 {
            self.last_error
                .set(format!("Failed to start {} of {} scans", failed, total));
        }
        tracing::info!(total, failed, "batch scan submitted");
        Ok(outcomes)
    }

    async fn get_scan_status(&self, id: &str) -> Result<ScanRecord, ApiError> {
        self.registry.get_scan_status(id).await
    }

    async fn get_active_scans(&self) -> Result<Vec<ScanRecord>, ApiError> {
        Ok(self.registry.get_active_scans().await)
    }
}

#[async_trait]
impl ReportBackend for ScanService {
    async fn list_reports(&self) -> Result<Vec<ScanResult>, ApiError> {
        Ok(self.reports.list_reports().await)
    }

    async fn get_report(&self, id: &str) -> Result<ScanResult, ApiError> {
        self.reports.get_report(id).await
    }

    async fn recent_summary(&self, days: Option<i64>) -> Result<RecentSummary, ApiError> {
        self.reports.recent_summary(days).await
    }

    async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        self.reports.delete_report(id).await
    }

    async fn vulnerability_stats(&self) -> Result<VulnerabilityStats, ApiError> {
        Ok(self.reports.vulnerability_stats().await)
    }
}

#[async_trait]
impl ConfigBackend for ScanService {
    async fn get_config(&self) -> Result<ScanConfig, ApiError> {
        Ok(self.config.get_config())
    }

    async fn update_config(&self, patch: ScanConfigPatch) -> Result<ScanConfig, ApiError> {
        self.config.update_config(patch).await
    }

    async fn get_vulnerability_library(&self) -> Result<VulnerabilityLibrary, ApiError> {
        Ok(self.config.get_vulnerability_library())
    }

    async fn update_vulnerability_rule(
        &self,
        module: &str,
        patch: VulnerabilityRulePatch,
    ) -> Result<VulnerabilityDefinition, ApiError> {
        self.config.update_vulnerability_rule(module, patch).await
    }

    async fn reset_config(&self) -> Result<ScanConfig, ApiError> {
        Ok(self.config.reset_config().await)
    }
}
