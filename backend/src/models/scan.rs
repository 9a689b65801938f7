use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Finding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    /// Pending and running scans count against the concurrency limit.
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Pending | ScanStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
            ScanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

pub const SCAN_ID_PREFIX: &str = "SCN";

/// Render a scan id as `SCN-YYYYMMDD-NNN`.
pub fn format_scan_id(date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:03}", SCAN_ID_PREFIX, date.format("%Y%m%d"), sequence)
}

/// Split a scan id into its calendar day and sequence number.
pub fn parse_scan_id(id: &str) -> Option<(NaiveDate, u32)> {
    let mut parts = id.splitn(3, '-');
    if parts.next()? != SCAN_ID_PREFIX {
        return None;
    }
    let date = NaiveDate::parse_from_str(parts.next()?, "%Y%m%d").ok()?;
    let sequence = parts.next()?.parse::<u32>().ok()?;
    Some((date, sequence))
}

/// Mutable representation of one scan request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub modules: Vec<String>,
    pub status: ScanStatus,
    #[serde(default)]
    pub progress: u8,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vulnerabilities: Vec<Finding>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScanRecord {
    pub fn new(id: String, url: String, modules: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            url,
            modules,
            status: ScanStatus::Pending,
            progress: 0,
            start_time: now,
            end_time: None,
            vulnerabilities: Vec::new(),
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Merge every field present in `update` into the record.
    pub fn apply(&mut self, update: ScanUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(end_time) = update.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(vulnerabilities) = update.vulnerabilities {
            self.vulnerabilities = vulnerabilities;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}

/// Partial update applied atomically to a [`ScanRecord`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanUpdate {
    pub status: Option<ScanStatus>,
    pub progress: Option<u8>,
    pub end_time: Option<DateTime<Utc>>,
    pub vulnerabilities: Option<Vec<Finding>>,
    pub error: Option<String>,
}

impl ScanUpdate {
    pub fn status(status: ScanStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn completed(vulnerabilities: Vec<Finding>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::Completed),
            progress: Some(100),
            end_time: Some(at),
            vulnerabilities: Some(vulnerabilities),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::Failed),
            end_time: Some(at),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(ScanStatus::Cancelled),
            end_time: Some(at),
            ..Default::default()
        }
    }
}

/// Immutable snapshot of a scan taken when it completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(flatten)]
    pub scan: ScanRecord,
}

impl ScanResult {
    pub fn id(&self) -> &str {
        &self.scan.id
    }
}

impl From<ScanRecord> for ScanResult {
    fn from(scan: ScanRecord) -> Self {
        Self { scan }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanCreate {
    pub url: String,
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchScanCreate {
    pub urls: Vec<String>,
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

/// Response for a single accepted scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStartResponse {
    pub scan_id: String,
    pub status: ScanStatus,
    pub message: String,
}

/// Per-URL outcome of a batch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScanOutcome {
    pub url: String,
    pub scan_id: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ScanRecord {
        ScanRecord::new(
            "SCN-20240301-001".to_string(),
            "https://example.com".to_string(),
            vec!["xss".to_string()],
            Utc::now(),
        )
    }

    #[test]
    fn test_scan_id_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(format_scan_id(date, 1), "SCN-20240301-001");
        assert_eq!(format_scan_id(date, 42), "SCN-20240301-042");
        assert_eq!(format_scan_id(date, 1234), "SCN-20240301-1234");
    }

    #[test]
    fn test_scan_id_parse() {
        let date = NaiveDate::from_ymd_opt(2023, 10, 20).unwrap();
        assert_eq!(parse_scan_id("SCN-20231020-007"), Some((date, 7)));
        assert_eq!(parse_scan_id("SCN-2023-0001"), None);
        assert_eq!(parse_scan_id("JOB-20231020-001"), None);
        assert_eq!(parse_scan_id("SCN-20231020-abc"), None);
    }

    #[test]
    fn test_status_activity() {
        assert!(ScanStatus::Pending.is_active());
        assert!(ScanStatus::Running.is_active());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(ScanStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut scan = record();
        scan.apply(ScanUpdate::progress(40));
        assert_eq!(scan.progress, 40);
        assert_eq!(scan.status, ScanStatus::Pending);

        scan.apply(ScanUpdate::status(ScanStatus::Running));
        assert_eq!(scan.progress, 40);
        assert_eq!(scan.status, ScanStatus::Running);
        assert!(scan.end_time.is_none());
    }

    #[test]
    fn test_completed_update_sets_terminal_fields() {
        let mut scan = record();
        let now = Utc::now();
        scan.apply(ScanUpdate::completed(Vec::new(), now));
        assert_eq!(scan.status, ScanStatus::Completed);
        assert_eq!(scan.progress, 100);
        assert_eq!(scan.end_time, Some(now));
    }

    #[test]
    fn test_result_serializes_flat() {
        let result = ScanResult::from(record());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["id"], "SCN-20240301-001");
        assert_eq!(value["status"], "pending");
        let back: ScanResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
