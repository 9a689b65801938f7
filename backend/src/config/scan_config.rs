use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::ApiError, models::Severity};

fn default_timeout() -> u64 {
    60
}

fn default_concurrent_scans() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_modules() -> Vec<String> {
    vec![
        "sql_injection".to_string(),
        "xss".to_string(),
        "csrf".to_string(),
    ]
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn default_vulnerability_definitions() -> VulnerabilityLibrary {
    let mut library = BTreeMap::new();
    library.insert(
        "sql_injection".to_string(),
        VulnerabilityDefinition {
            severity: Severity::High,
            description: "SQL injection lets an attacker inject malicious SQL into application queries, which can leak or corrupt data".to_string(),
            patterns: strings(&[
                "SQL syntax",
                "mysql_fetch_array",
                "You have an error in your SQL syntax",
                "ORA-",
                "PostgreSQL",
                "SQLite3::",
                "microsoft JET Database",
            ]),
        },
    );
    library.insert(
        "xss".to_string(),
        VulnerabilityDefinition {
            severity: Severity::Medium,
            description: "Cross-site scripting lets an attacker inject and execute malicious scripts in a victim's browser".to_string(),
            patterns: strings(&[
                "<script>alert",
                "javascript:alert",
                "onerror=alert",
                "document.cookie",
                "eval(",
                "document.domain",
                "document.write",
            ]),
        },
    );
    library.insert(
        "csrf".to_string(),
        VulnerabilityDefinition {
            severity: Severity::Medium,
            description: "Cross-site request forgery lets an attacker trick users into performing unintended actions".to_string(),
            patterns: strings(&["no CSRF token", "missing CSRF", "csrf verification failed"]),
        },
    );
    library.insert(
        "file_upload".to_string(),
        VulnerabilityDefinition {
            severity: Severity::High,
            description: "Insecure file upload lets an attacker upload malicious files, possibly leading to remote code execution".to_string(),
            patterns: strings(&[".php", ".jsp", ".asp", ".exe", ".sh", ".py"]),
        },
    );
    library
}

/// Detection rule for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityDefinition {
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Module id to detection rule, iterated in module-id order.
pub type VulnerabilityLibrary = BTreeMap<String, VulnerabilityDefinition>;

/// Scan configuration edited from the dashboard and persisted in the
/// `scan_config` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Seconds; enforced by a real backend, not by the simulator
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_concurrent_scans")]
    pub concurrent_scans: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_modules")]
    pub default_modules: Vec<String>,
    #[serde(default = "default_vulnerability_definitions")]
    pub vulnerability_definitions: VulnerabilityLibrary,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            concurrent_scans: default_concurrent_scans(),
            user_agent: default_user_agent(),
            default_modules: default_modules(),
            vulnerability_definitions: default_vulnerability_definitions(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.timeout == 0 {
            return Err(ApiError::validation("timeout must be greater than 0"));
        }
        if self.concurrent_scans == 0 {
            return Err(ApiError::validation(
                "concurrent_scans must be greater than 0",
            ));
        }
        if self.default_modules.is_empty() {
            return Err(ApiError::validation("default_modules must not be empty"));
        }
        Ok(())
    }

    /// Shallow merge: fields absent from `patch` keep their current value.
    pub fn merged(&self, patch: ScanConfigPatch) -> Self {
        let mut next = self.clone();
        if let Some(timeout) = patch.timeout {
            next.timeout = timeout;
        }
        if let Some(concurrent_scans) = patch.concurrent_scans {
            next.concurrent_scans = concurrent_scans;
        }
        if let Some(user_agent) = patch.user_agent {
            next.user_agent = user_agent.trim().to_string();
        }
        if let Some(modules) = patch.default_modules {
            next.default_modules = normalize_modules(&modules);
        }
        if let Some(definitions) = patch.vulnerability_definitions {
            next.vulnerability_definitions = definitions;
        }
        next
    }
}

/// Top-level fields of [`ScanConfig`] that an update may replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfigPatch {
    pub timeout: Option<u64>,
    pub concurrent_scans: Option<u32>,
    pub user_agent: Option<String>,
    pub default_modules: Option<Vec<String>>,
    pub vulnerability_definitions: Option<VulnerabilityLibrary>,
}

/// Partial rule update for a single module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnerabilityRulePatch {
    pub severity: Option<Severity>,
    pub description: Option<String>,
    pub patterns: Option<Vec<String>>,
}

impl VulnerabilityRulePatch {
    pub fn apply_to(self, rule: &mut VulnerabilityDefinition) {
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(description) = self.description {
            rule.description = description;
        }
        if let Some(patterns) = self.patterns {
            rule.patterns = patterns;
        }
    }

    /// A complete rule, if every field is present.
    pub fn into_definition(self) -> Option<VulnerabilityDefinition> {
        Some(VulnerabilityDefinition {
            severity: self.severity?,
            description: self.description?,
            patterns: self.patterns?,
        })
    }
}

/// Trim module ids, drop empties and duplicates, keep first-seen order.
pub fn normalize_modules(modules: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(modules.len());
    for module in modules {
        let trimmed = module.trim();
        if !trimmed.is_empty() && !seen.iter().any(|m: &String| m == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}
