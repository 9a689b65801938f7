use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::{
    config::{normalize_modules, ScanConfig},
    error::{ApiError, LastError},
    models::{
        format_scan_id, parse_scan_id, Finding, ScanRecord, ScanResult, ScanStatus, ScanUpdate,
        Severity,
    },
    repositories::{load_typed, save_typed, StateSlot, StateStore},
    utils::validate_scan_url,
};

/// Monotonic per-day sequence. Never hands out a number twice within a day,
/// even after records for that day are deleted.
#[derive(Debug, Default)]
struct DailySequence {
    day: Option<NaiveDate>,
    last: u32,
}

impl DailySequence {
    fn next<'a>(&mut self, today: NaiveDate, existing: impl Iterator<Item = &'a str>) -> u32 {
        if self.day != Some(today) {
            self.day = Some(today);
            self.last = 0;
        }
        let highest = existing
            .filter_map(parse_scan_id)
            .filter(|(day, _)| *day == today)
            .map(|(_, sequence)| sequence)
            .max()
            .unwrap_or(0);
        self.last = self.last.max(highest) + 1;
        self.last
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    scans: Vec<ScanRecord>,
    results: Vec<ScanResult>,
    sequence: DailySequence,
}

impl RegistryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.scans.iter().position(|s| s.id == id)
    }

    fn result_position(&self, id: &str) -> Option<usize> {
        self.results.iter().position(|r| r.id() == id)
    }

    fn active_count(&self) -> usize {
        self.scans.iter().filter(|s| s.is_active()).count()
    }
}

/// Authoritative collection of scan records and completed results.
///
/// Every mutation is a read-modify-write under one write lock and is
/// persisted before the lock is released, so no update is ever computed from
/// a stale snapshot.
pub struct ScanRegistry {
    state: RwLock<RegistryState>,
    store: Arc<dyn StateStore + Send + Sync>,
    last_error: Arc<LastError>,
}

impl ScanRegistry {
    /// Restore records and results from the store. With `seed_demo` set, an
    /// empty scan slot is filled with illustrative historical records.
    pub async fn load(
        store: Arc<dyn StateStore + Send + Sync>,
        last_error: Arc<LastError>,
        seed_demo: bool,
    ) -> Result<Self, ApiError> {
        let scans: Vec<ScanRecord> = load_typed(store.as_ref(), StateSlot::Scans)
            .await?
            .unwrap_or_default();
        let results: Vec<ScanResult> = load_typed(store.as_ref(), StateSlot::ScanResults)
            .await?
            .unwrap_or_default();

        let registry = Self {
            state: RwLock::new(RegistryState {
                scans,
                results,
                sequence: DailySequence::default(),
            }),
            store,
            last_error,
        };

        if seed_demo {
            let mut state = registry.state.write().await;
            if state.scans.is_empty() {
                state.scans = demo_scans();
                tracing::info!(count = state.scans.len(), "seeded demo scan records");
                registry.persist_scans(&state.scans).await;
            }
        }

        {
            let state = registry.state.read().await;
            tracing::info!(
                scans = state.scans.len(),
                results = state.results.len(),
                "scan registry loaded"
            );
        }

        Ok(registry)
    }

    /// Register a new pending scan. Scheduling its lifecycle is the caller's job.
    pub async fn create_scan(
        &self,
        url: &str,
        modules: Option<Vec<String>>,
        config: &ScanConfig,
    ) -> Result<ScanRecord, ApiError> {
        self.last_error.clear();
        self.try_create_scan(url, modules, config)
            .await
            .map_err(|e| self.last_error.capture("Failed to create scan", e))
    }

    async fn try_create_scan(
        &self,
        url: &str,
        modules: Option<Vec<String>>,
        config: &ScanConfig,
    ) -> Result<ScanRecord, ApiError> {
        let url = validate_scan_url(url)?;
        let modules = match modules.map(|m| normalize_modules(&m)) {
            Some(m) if !m.is_empty() => m,
            _ => normalize_modules(&config.default_modules),
        };
        if modules.is_empty() {
            return Err(ApiError::validation("At least one scan module is required"));
        }

        let mut state = self.state.write().await;

        if state.scans.iter().any(|s| s.url == url && s.is_active()) {
            return Err(ApiError::DuplicateActiveScan(url));
        }
        if state.active_count() >= config.concurrent_scans as usize {
            return Err(ApiError::ConcurrencyLimitExceeded(config.concurrent_scans));
        }

        let now = Utc::now();
        let today = now.with_timezone(&Local).date_naive();
        let sequence = {
            let RegistryState {
                scans,
                results,
                sequence,
            } = &mut *state;
            let existing = scans
                .iter()
                .map(|s| s.id.as_str())
                .chain(results.iter().map(|r| r.id()));
            sequence.next(today, existing)
        };

        let record = ScanRecord::new(format_scan_id(today, sequence), url, modules, now);
        state.scans.push(record.clone());
        self.persist_scans(&state.scans).await;

        tracing::info!(scan_id = %record.id, url = %record.url, modules = ?record.modules, "scan created");
        Ok(record)
    }

    /// Merge `update` into the record. Returns false when no record matches.
    pub async fn update_scan_status(&self, id: &str, update: ScanUpdate) -> bool {
        let mut state = self.state.write().await;
        let Some(index) = state.position(id) else {
            return false;
        };
        state.scans[index].apply(update);
        self.persist_scans(&state.scans).await;
        true
    }

    /// Apply `update` only while the record is in `expected` status.
    pub async fn update_if_status(&self, id: &str, expected: ScanStatus, update: ScanUpdate) -> bool {
        let mut state = self.state.write().await;
        let Some(index) = state.position(id) else {
            return false;
        };
        if state.scans[index].status != expected {
            return false;
        }
        state.scans[index].apply(update);
        self.persist_scans(&state.scans).await;
        true
    }

    /// Complete a running scan and snapshot it into the results in one step.
    /// Returns `None` if the scan is gone or no longer running.
    pub async fn complete_scan<F>(&self, id: &str, generate_findings: F) -> Option<ScanResult>
    where
        F: FnOnce(&ScanRecord) -> Vec<Finding>,
    {
        let mut state = self.state.write().await;
        let index = state.position(id)?;
        if state.scans[index].status != ScanStatus::Running {
            return None;
        }

        let findings = generate_findings(&state.scans[index]);
        state.scans[index].apply(ScanUpdate::completed(findings, Utc::now()));

        let result = ScanResult::from(state.scans[index].clone());
        match state.result_position(id) {
            Some(existing) => state.results[existing] = result.clone(),
            None => state.results.push(result.clone()),
        }

        self.persist_scans(&state.scans).await;
        self.persist_results(&state.results).await;
        Some(result)
    }

    pub async fn cancel_scan(&self, id: &str) -> Result<ScanRecord, ApiError> {
        self.last_error.clear();

        let mut state = self.state.write().await;
        let Some(index) = state.position(id) else {
            return Err(self.last_error.capture(
                "Failed to cancel scan",
                ApiError::not_found(format!("Scan {} not found", id)),
            ));
        };

        let status = state.scans[index].status;
        if !status.is_active() {
            return Err(self.last_error.capture(
                "Failed to cancel scan",
                ApiError::invalid_transition(format!("scan {} is already {}", id, status)),
            ));
        }

        state.scans[index].apply(ScanUpdate::cancelled(Utc::now()));
        let record = state.scans[index].clone();
        self.persist_scans(&state.scans).await;

        tracing::info!(scan_id = %id, previous = %status, "scan cancelled");
        Ok(record)
    }

    pub async fn delete_scan(&self, id: &str) -> Result<(), ApiError> {
        self.last_error.clear();

        let mut state = self.state.write().await;
        let scan_index = state.position(id);
        if let Some(index) = scan_index {
            if state.scans[index].is_active() {
                return Err(self.last_error.capture(
                    "Failed to delete scan",
                    ApiError::CannotDeleteActive(id.to_string()),
                ));
            }
        }
        let result_index = state.result_position(id);

        if scan_index.is_none() && result_index.is_none() {
            return Err(self.last_error.capture(
                "Failed to delete scan",
                ApiError::not_found(format!("Scan {} not found", id)),
            ));
        }

        if let Some(index) = scan_index {
            state.scans.remove(index);
            self.persist_scans(&state.scans).await;
        }
        if let Some(index) = result_index {
            state.results.remove(index);
            self.persist_results(&state.results).await;
        }

        tracing::info!(scan_id = %id, "scan deleted");
        Ok(())
    }

    /// Drop every terminal record and all results. Active scans are kept.
    pub async fn clear_all_scans(&self) -> usize {
        self.last_error.clear();

        let mut state = self.state.write().await;
        let before = state.scans.len();
        state.scans.retain(|s| s.is_active());
        let removed = before - state.scans.len();
        let results_removed = state.results.len();
        state.results.clear();

        self.persist_scans(&state.scans).await;
        self.persist_results(&state.results).await;

        tracing::info!(removed, results_removed, "cleared terminal scans");
        removed
    }

    /// Mark every pending or running scan as failed. Used when no simulator
    /// will ever advance them again.
    pub async fn fail_interrupted_scans(&self, reason: &str) -> usize {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut failed = 0;
        for scan in state.scans.iter_mut().filter(|s| s.is_active()) {
            scan.apply(ScanUpdate::failed(reason, now));
            failed += 1;
        }
        if failed > 0 {
            self.persist_scans(&state.scans).await;
            tracing::warn!(failed, reason = %reason, "marked interrupted scans as failed");
        }
        failed
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        self.last_error.clear();

        let mut state = self.state.write().await;
        let Some(index) = state.result_position(id) else {
            return Err(self.last_error.capture(
                "Failed to delete report",
                ApiError::not_found(format!("Report {} not found", id)),
            ));
        };
        state.results.remove(index);
        self.persist_results(&state.results).await;

        tracing::info!(scan_id = %id, "report deleted");
        Ok(())
    }

    pub async fn active_scans_count(&self) -> usize {
        self.state.read().await.active_count()
    }

    pub async fn get_all_scans(&self) -> Vec<ScanRecord> {
        self.state.read().await.scans.clone()
    }

    pub async fn get_all_results(&self) -> Vec<ScanResult> {
        self.state.read().await.results.clone()
    }

    pub async fn get_active_scans(&self) -> Vec<ScanRecord> {
        self.state
            .read()
            .await
            .scans
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    pub async fn get_scan(&self, id: &str) -> Option<ScanRecord> {
        let state = self.state.read().await;
        state.position(id).map(|index| state.scans[index].clone())
    }

    pub async fn get_result(&self, id: &str) -> Option<ScanResult> {
        let state = self.state.read().await;
        state.result_position(id).map(|index| state.results[index].clone())
    }

    /// Look in the live registry first, then in the results.
    pub async fn get_scan_status(&self, id: &str) -> Result<ScanRecord, ApiError> {
        let state = self.state.read().await;
        if let Some(index) = state.position(id) {
            return Ok(state.scans[index].clone());
        }
        if let Some(index) = state.result_position(id) {
            return Ok(state.results[index].scan.clone());
        }
        Err(ApiError::not_found(format!("Scan {} not found", id)))
    }

    /// Write both slots, surfacing the first storage error.
    pub async fn flush(&self) -> Result<(), ApiError> {
        let state = self.state.read().await;
        save_typed(self.store.as_ref(), StateSlot::Scans, &state.scans).await?;
        save_typed(self.store.as_ref(), StateSlot::ScanResults, &state.results).await?;
        tracing::debug!("scan registry flushed");
        Ok(())
    }

    async fn persist_scans(&self, scans: &[ScanRecord]) {
        if let Err(e) = save_typed(self.store.as_ref(), StateSlot::Scans, scans).await {
            tracing::error!(slot = %StateSlot::Scans, error = %e, "failed to persist scans");
            self.last_error.set(format!("Failed to save scans: {}", e));
        }
    }

    async fn persist_results(&self, results: &[ScanResult]) {
        if let Err(e) = save_typed(self.store.as_ref(), StateSlot::ScanResults, results).await {
            tracing::error!(slot = %StateSlot::ScanResults, error = %e, "failed to persist scan results");
            self.last_error.set(format!("Failed to save scan results: {}", e));
        }
    }
}

fn utc(date: (i32, u32, u32), time: (u32, u32, u32)) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .and_then(|d| d.and_hms_opt(time.0, time.1, time.2))
        .map(|naive| naive.and_utc())
}

fn demo_finding(url: &str, finding_type: &str, severity: Severity, description: &str) -> Finding {
    Finding {
        finding_type: finding_type.to_string(),
        severity,
        description: description.to_string(),
        url: url.to_string(),
        test_url: String::new(),
        details: String::new(),
    }
}

/// Historical records shown on a fresh install.
fn demo_scans() -> Vec<ScanRecord> {
    struct Demo {
        id: &'static str,
        url: &'static str,
        day: (i32, u32, u32),
        started: (u32, u32, u32),
        ended: (u32, u32, u32),
        error: Option<&'static str>,
        findings: &'static [(&'static str, Severity, &'static str)],
    }

    const DEMOS: [Demo; 6] = [
        Demo {
            id: "SCN-20231020-001",
            url: "https://secure-demo.org",
            day: (2023, 10, 20),
            started: (22, 15, 0),
            ended: (22, 18, 30),
            error: None,
            findings: &[],
        },
        Demo {
            id: "SCN-20231010-003",
            url: "https://test-site.com",
            day: (2023, 10, 10),
            started: (14, 20, 0),
            ended: (14, 22, 15),
            error: Some("Connection timed out"),
            findings: &[],
        },
        Demo {
            id: "SCN-20231005-004",
            url: "https://blog.example.org",
            day: (2023, 10, 5),
            started: (9, 30, 0),
            ended: (9, 38, 22),
            error: None,
            findings: &[
                ("csrf", Severity::Medium, "Cross-site request forgery"),
                ("misconfiguration", Severity::Low, "Security misconfiguration"),
            ],
        },
        Demo {
            id: "SCN-20231001-005",
            url: "https://shop.example.com",
            day: (2023, 10, 1),
            started: (11, 45, 0),
            ended: (11, 52, 10),
            error: None,
            findings: &[
                ("xss", Severity::Medium, "Cross-site scripting"),
                ("file_inclusion", Severity::High, "File inclusion"),
                ("path_traversal", Severity::High, "Directory traversal"),
                ("information_disclosure", Severity::Medium, "Sensitive information disclosure"),
            ],
        },
        Demo {
            id: "SCN-20230925-006",
            url: "https://api.test.com",
            day: (2023, 9, 25),
            started: (15, 20, 0),
            ended: (15, 23, 45),
            error: None,
            findings: &[],
        },
        Demo {
            id: "SCN-20230920-007",
            url: "https://admin.example.org",
            day: (2023, 9, 20),
            started: (8, 10, 0),
            ended: (8, 15, 32),
            error: Some("Authentication failed"),
            findings: &[],
        },
    ];

    let modules = ScanConfig::default().default_modules;

    DEMOS
        .iter()
        .filter_map(|demo| {
            let start_time = utc(demo.day, demo.started)?;
            let end_time = utc(demo.day, demo.ended)?;
            let (status, progress) = match demo.error {
                Some(_) => (ScanStatus::Failed, 0),
                None => (ScanStatus::Completed, 100),
            };
            Some(ScanRecord {
                id: demo.id.to_string(),
                url: demo.url.to_string(),
                modules: modules.clone(),
                status,
                progress,
                start_time,
                end_time: Some(end_time),
                vulnerabilities: demo
                    .findings
                    .iter()
                    .map(|(kind, severity, description)| {
                        demo_finding(demo.url, kind, *severity, description)
                    })
                    .collect(),
                error: demo.error.map(str::to_string),
            })
        })
        .collect()
}
