use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{Settings, SharedScanConfig, VulnerabilityLibrary},
    models::{Finding, ScanStatus, ScanUpdate},
    services::{random::RandomSource, scan_registry::ScanRegistry},
};

/// Upper bound on findings drawn per module, exclusive.
const MAX_FINDINGS_PER_MODULE: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct SimulatorTiming {
    pub start_delay: Duration,
    pub tick: Duration,
    pub max_step: f64,
}

impl SimulatorTiming {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            start_delay: Duration::from_millis(settings.scan_start_delay_ms),
            tick: Duration::from_millis(settings.progress_tick_ms),
            max_step: settings.max_progress_step,
        }
    }
}

impl Default for SimulatorTiming {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(500),
            tick: Duration::from_millis(1000),
            max_step: 15.0,
        }
    }
}

/// Progress shown while a scan is still running. 100 is reserved for
/// completion.
pub fn visible_progress(accumulated: f64) -> u8 {
    accumulated.round().clamp(0.0, 99.0) as u8
}

/// Draw findings for `modules` against the configured rules.
///
/// Each module gets an independent count in `[0, 4)`. Modules with no rule
/// still consume their count draw but yield nothing.
pub fn generate_findings(
    url: &str,
    modules: &[String],
    library: &VulnerabilityLibrary,
    rng: &dyn RandomSource,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for module in modules {
        let count = rng.next_below(MAX_FINDINGS_PER_MODULE);
        let Some(rule) = library.get(module) else {
            continue;
        };

        for index in 0..count {
            let details = if rule.patterns.is_empty() {
                format!("Possible {} found during testing.", rule.description)
            } else {
                let pattern = &rule.patterns[rng.next_below(rule.patterns.len())];
                format!(
                    "Possible {} found during testing. Matched pattern: \"{}\"",
                    rule.description, pattern
                )
            };

            findings.push(Finding {
                finding_type: module.clone(),
                severity: rule.severity,
                description: rule.description.clone(),
                url: url.to_string(),
                test_url: Finding::test_url_for(url, module, index),
                details,
            });
        }
    }

    findings
}

/// Local stand-in for a scanning backend: walks one scan from pending to
/// completed, writing every step through the registry.
pub struct ScanSimulator {
    registry: Arc<ScanRegistry>,
    config: SharedScanConfig,
    rng: Arc<dyn RandomSource>,
    timing: SimulatorTiming,
}

impl ScanSimulator {
    pub fn new(
        registry: Arc<ScanRegistry>,
        config: SharedScanConfig,
        rng: Arc<dyn RandomSource>,
        timing: SimulatorTiming,
    ) -> Self {
        Self {
            registry,
            config,
            rng,
            timing,
        }
    }

    /// Drive `scan_id` to completion. Returns early, without writing, once
    /// the scan has left the status the next step expects.
    pub async fn run(&self, scan_id: String) {
        tokio::time::sleep(self.timing.start_delay).await;

        let started = self
            .registry
            .update_if_status(&scan_id, ScanStatus::Pending, ScanUpdate::status(ScanStatus::Running))
            .await;
        if !started {
            tracing::debug!(scan_id = %scan_id, "scan no longer pending, simulator not started");
            return;
        }
        tracing::info!(scan_id = %scan_id, "scan running");

        let mut progress = 0.0_f64;
        loop {
            tokio::time::sleep(self.timing.tick).await;
            progress += self.rng.next_unit() * self.timing.max_step;

            if progress >= 100.0 {
                self.finish(&scan_id).await;
                return;
            }

            let visible = visible_progress(progress);
            let written = self
                .registry
                .update_if_status(&scan_id, ScanStatus::Running, ScanUpdate::progress(visible))
                .await;
            if !written {
                tracing::info!(scan_id = %scan_id, progress = visible, "scan no longer running, simulator halted");
                return;
            }
            tracing::debug!(scan_id = %scan_id, progress = visible, "scan progress");
        }
    }

    async fn finish(&self, scan_id: &str) {
        let config = self.config.load_full();
        let rng = self.rng.clone();

        let completed = self
            .registry
            .complete_scan(scan_id, |scan| {
                generate_findings(
                    &scan.url,
                    &scan.modules,
                    &config.vulnerability_definitions,
                    rng.as_ref(),
                )
            })
            .await;

        match completed {
            Some(result) => tracing::info!(
                scan_id = %scan_id,
                findings = result.scan.vulnerabilities.len(),
                "scan completed"
            ),
            None => tracing::info!(scan_id = %scan_id, "scan no longer running, completion skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::models::Severity;
    use crate::services::random::ScriptedRandom;

    fn modules(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_findings_follow_module_order_and_counts() {
        let library = ScanConfig::default().vulnerability_definitions;
        // counts: xss=2 (patterns 1, 3), csrf=0, sql_injection=1 (pattern 0)
        let rng = ScriptedRandom::new().with_integers([2, 1, 3, 0, 1, 0]);

        let findings = generate_findings(
            "https://example.com",
            &modules(&["xss", "csrf", "sql_injection"]),
            &library,
            &rng,
        );

        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].finding_type, "xss");
        assert_eq!(findings[0].test_url, "https://example.com?id=xss_test_1");
        assert!(findings[0].details.contains("javascript:alert"));
        assert_eq!(findings[1].test_url, "https://example.com?id=xss_test_2");
        assert!(findings[1].details.contains("document.cookie"));
        assert_eq!(findings[2].finding_type, "sql_injection");
        assert_eq!(findings[2].severity, Severity::High);
        assert!(findings[2].details.contains("SQL syntax"));
    }

    #[test]
    fn test_unconfigured_module_yields_nothing() {
        let library = ScanConfig::default().vulnerability_definitions;
        let rng = ScriptedRandom::new().with_integers([3, 1]);

        let findings = generate_findings(
            "https://example.com",
            &modules(&["port_scan", "csrf"]),
            &library,
            &rng,
        );

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_type, "csrf");
    }

    #[test]
    fn test_visible_progress_caps_at_99() {
        assert_eq!(visible_progress(0.0), 0);
        assert_eq!(visible_progress(7.5), 8);
        assert_eq!(visible_progress(98.4), 98);
        assert_eq!(visible_progress(99.5), 99);
        assert_eq!(visible_progress(99.99), 99);
    }

    #[test]
    fn test_counts_stay_below_four() {
        let library = ScanConfig::default().vulnerability_definitions;
        let rng = crate::services::random::ThreadRandom;
        for _ in 0..50 {
            let findings =
                generate_findings("https://example.com", &modules(&["xss"]), &library, &rng);
            assert!(findings.len() < MAX_FINDINGS_PER_MODULE);
        }
    }
}
