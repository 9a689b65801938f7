use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::ApiError,
    models::{RecentSummary, ScanResult, ScanStatus, VulnerabilityStats},
    services::scan_registry::ScanRegistry,
};

pub const DEFAULT_SUMMARY_DAYS: i64 = 7;

/// Summarise results started after `now - days`. Finding tallies only
/// include completed scans. A window reaching past the representable range
/// covers all results.
pub fn summarize_recent(results: &[ScanResult], days: i64, now: DateTime<Utc>) -> RecentSummary {
    let cutoff = Duration::try_days(days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut summary = RecentSummary {
        days,
        ..Default::default()
    };

    for result in results.iter().filter(|r| r.scan.start_time > cutoff) {
        summary.total_scans += 1;
        match result.scan.status {
            ScanStatus::Completed => summary.completed += 1,
            ScanStatus::Failed => summary.failed += 1,
            _ => {}
        }
        if result.scan.status != ScanStatus::Completed {
            continue;
        }
        for finding in &result.scan.vulnerabilities {
            *summary
                .vulnerability_summary
                .entry(finding.finding_type.clone())
                .or_insert(0) += 1;
            summary.severity_counts.record(finding.severity);
        }
    }

    summary
}

pub fn vulnerability_type_counts(results: &[ScanResult]) -> VulnerabilityStats {
    let mut counts = VulnerabilityStats::new();
    for result in results
        .iter()
        .filter(|r| r.scan.status == ScanStatus::Completed)
    {
        for finding in &result.scan.vulnerabilities {
            *counts.entry(finding.finding_type.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Read side over completed scan results.
pub struct ReportService {
    registry: Arc<ScanRegistry>,
}

impl ReportService {
    pub fn new(registry: Arc<ScanRegistry>) -> Self {
        Self { registry }
    }

    pub async fn list_reports(&self) -> Vec<ScanResult> {
        self.registry.get_all_results().await
    }

    pub async fn get_report(&self, id: &str) -> Result<ScanResult, ApiError> {
        self.registry
            .get_result(id)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Report {} not found", id)))
    }

    pub async fn recent_summary(&self, days: Option<i64>) -> Result<RecentSummary, ApiError> {
        let days = days.unwrap_or(DEFAULT_SUMMARY_DAYS);
        if days < 0 {
            return Err(ApiError::validation("days must not be negative"));
        }
        let results = self.registry.get_all_results().await;
        Ok(summarize_recent(&results, days, Utc::now()))
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        self.registry.delete_report(id).await
    }

    pub async fn vulnerability_stats(&self) -> VulnerabilityStats {
        vulnerability_type_counts(&self.registry.get_all_results().await)
    }
}
