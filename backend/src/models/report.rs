use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Severity;

/// Finding counts per severity; every level is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

/// Aggregate over the scan results started within a recent window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentSummary {
    pub days: i64,
    pub total_scans: usize,
    pub completed: usize,
    pub failed: usize,
    pub vulnerability_summary: BTreeMap<String, usize>,
    pub severity_counts: SeverityCounts,
}

/// Finding counts keyed by module/type.
pub type VulnerabilityStats = BTreeMap<String, usize>;
